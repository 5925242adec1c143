//! Minimal CSS selector matching for the headless host
//!
//! Supports selector lists of compound selectors: `tag`, `*`, `.class`, `#id`,
//! `[attr]` and `[attr="value"]`. Combinators are rejected.

use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

fn compound_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^(?P<tag>[A-Za-z][\w-]*|\*)?(?P<rest>(?:[.#][\w-]+|\[[^\]]+\])*)$"#)
            .expect("static selector pattern")
    })
}

fn part_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?P<kind>[.#])(?P<name>[\w-]+)|\[\s*(?P<attr>[\w-]+)\s*(?:=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[\w-]+))\s*)?\]"#)
            .expect("static selector pattern")
    })
}

/// What a single element exposes to selector matching
pub trait Matchable {
    fn tag(&self) -> &str;
    fn has_class(&self, class: &str) -> bool;
    fn attr(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        if let Some(ref tag) = self.tag {
            if !tag.eq_ignore_ascii_case(el.tag()) {
                return false;
            }
        }
        self.ids.iter().all(|id| el.attr("id") == Some(id.as_str()))
            && self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|(name, value)| match (el.attr(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            })
    }
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let mut alternatives = Vec::new();
        for raw in source.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(Error::Selector(format!("empty selector in '{}'", source)));
            }
            alternatives.push(parse_compound(raw).ok_or_else(|| {
                Error::Selector(format!("unsupported selector '{}'", raw))
            })?);
        }
        Ok(Self { alternatives })
    }

    pub fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        self.alternatives.iter().any(|c| c.matches(el))
    }
}

fn parse_compound(raw: &str) -> Option<Compound> {
    let caps = compound_pattern().captures(raw)?;
    let mut compound = Compound {
        tag: caps
            .name("tag")
            .map(|m| m.as_str())
            .filter(|t| *t != "*")
            .map(str::to_string),
        ..Default::default()
    };

    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    let mut consumed = 0;
    for part in part_pattern().captures_iter(rest) {
        let whole = part.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        if let (Some(kind), Some(name)) = (part.name("kind"), part.name("name")) {
            let name = name.as_str().to_string();
            if kind.as_str() == "#" {
                compound.ids.push(name);
            } else {
                compound.classes.push(name);
            }
        } else if let Some(attr) = part.name("attr") {
            let value = part
                .name("dq")
                .or_else(|| part.name("sq"))
                .or_else(|| part.name("bare"))
                .map(|m| m.as_str().to_string());
            compound.attrs.push((attr.as_str().to_string(), value));
        }
    }
    if consumed != rest.len() {
        return None;
    }
    if compound == Compound::default() && !raw.starts_with('*') {
        return None;
    }
    Some(compound)
}
