use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::easing::Easing;

/// Attribute that opts a container out of automatic management
pub const DISABLE_ATTRIBUTE: &str = "data-elastic";

/// Value of [`DISABLE_ATTRIBUTE`] that marks a container as disabled
pub const DISABLE_VALUE: &str = "false";

/// Marker class added to every managed scroll target
pub const CONTENT_CLASS: &str = "elastic-bounce-content";

/// Identifier of the shared style sheet node
pub const STYLE_ELEMENT_ID: &str = "elastic-bounce-styles";

/// Per-container elastic behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollOptions {
    /// Upper bound on visual scale growth (0.15 = at most 115%)
    #[serde(default = "default_max_stretch")]
    pub max_stretch: f64,
    /// Fraction of the drag distance fed into the stretch curve
    #[serde(default = "default_resistance")]
    pub resistance: f64,
    /// Recovery transition duration in milliseconds
    #[serde(default = "default_animation_duration")]
    pub animation_duration_ms: u64,
    /// CSS timing function used for the recovery transition
    #[serde(default = "default_animation_function")]
    pub animation_function: String,
    /// Reserved for gesture filtering; not consulted yet
    #[serde(default = "default_touch_threshold")]
    pub touch_threshold: f64,
    /// Touches starting inside any of these never trigger the effect
    #[serde(default)]
    pub exclude_selectors: Vec<String>,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            max_stretch: default_max_stretch(),
            resistance: default_resistance(),
            animation_duration_ms: default_animation_duration(),
            animation_function: default_animation_function(),
            touch_threshold: default_touch_threshold(),
            exclude_selectors: Vec::new(),
        }
    }
}

impl ScrollOptions {
    /// Recovery duration as a `Duration`
    #[inline]
    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    /// Parsed easing curve for the recovery transition
    pub fn easing(&self) -> Easing {
        Easing::parse_or_default(&self.animation_function)
    }

    /// CSS `transition` value used while recovering
    pub fn transition_css(&self) -> String {
        format!(
            "transform {}ms {}",
            self.animation_duration_ms, self.animation_function
        )
    }

    /// Apply the fields present in `patch`
    pub fn merge(&mut self, patch: &ScrollOptionsPatch) {
        if let Some(v) = patch.max_stretch {
            self.max_stretch = v;
        }
        if let Some(v) = patch.resistance {
            self.resistance = v;
        }
        if let Some(v) = patch.animation_duration {
            self.animation_duration_ms = v;
        }
        if let Some(ref v) = patch.animation_function {
            self.animation_function = v.clone();
        }
        if let Some(v) = patch.touch_threshold {
            self.touch_threshold = v;
        }
        if let Some(ref v) = patch.exclude_selectors {
            self.exclude_selectors = v.clone();
        }
    }

    /// Copy of `self` with `patch` applied
    pub fn merged(&self, patch: &ScrollOptionsPatch) -> Self {
        let mut merged = self.clone();
        merged.merge(patch);
        merged
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !self.max_stretch.is_finite() || self.max_stretch < 0.0 {
            return Err(crate::Error::Config(format!(
                "max_stretch must be a non-negative number, got {}",
                self.max_stretch
            )));
        }
        if !self.resistance.is_finite() || self.resistance < 0.0 {
            return Err(crate::Error::Config(format!(
                "resistance must be a non-negative number, got {}",
                self.resistance
            )));
        }
        if self.animation_function.trim().is_empty() {
            return Err(crate::Error::Config(
                "animation_function must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fleet-wide options: container selector plus the per-container defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceOptions {
    /// Selector identifying managed containers
    #[serde(default = "default_container")]
    pub container: String,
    /// Push option updates into already-running controllers
    #[serde(default)]
    pub propagate_to_existing: bool,
    #[serde(flatten)]
    pub scroll: ScrollOptions,
}

impl Default for BounceOptions {
    fn default() -> Self {
        Self {
            container: default_container(),
            propagate_to_existing: false,
            scroll: ScrollOptions::default(),
        }
    }
}

impl BounceOptions {
    pub fn merge(&mut self, patch: &BounceOptionsPatch) {
        if let Some(ref v) = patch.container {
            self.container = v.clone();
        }
        if let Some(v) = patch.propagate_to_existing {
            self.propagate_to_existing = v;
        }
        self.scroll.merge(&patch.scroll);
    }

    pub fn merged(&self, patch: &BounceOptionsPatch) -> Self {
        let mut merged = self.clone();
        merged.merge(patch);
        merged
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.container.trim().is_empty() {
            return Err(crate::Error::Config(
                "container selector must not be empty".to_string(),
            ));
        }
        self.scroll.validate()
    }

    /// Body of the shared style sheet
    pub fn style_sheet(&self) -> String {
        format!(
            ".{class} {{\n  transform-origin: top;\n  transition: {transition};\n  will-change: transform;\n  height: 100%;\n  -webkit-overflow-scrolling: touch;\n}}\n",
            class = CONTENT_CLASS,
            transition = self.scroll.transition_css(),
        )
    }
}

/// Partial update of [`ScrollOptions`]
///
/// Keys are camelCase as seen from JavaScript; snake_case is accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollOptionsPatch {
    #[serde(default, alias = "max_stretch", skip_serializing_if = "Option::is_none")]
    pub max_stretch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resistance: Option<f64>,
    #[serde(
        default,
        alias = "animation_duration",
        alias = "animation_duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub animation_duration: Option<u64>,
    #[serde(
        default,
        alias = "animation_function",
        skip_serializing_if = "Option::is_none"
    )]
    pub animation_function: Option<String>,
    #[serde(default, alias = "touch_threshold", skip_serializing_if = "Option::is_none")]
    pub touch_threshold: Option<f64>,
    #[serde(
        default,
        alias = "exclude_selectors",
        skip_serializing_if = "Option::is_none"
    )]
    pub exclude_selectors: Option<Vec<String>>,
}

impl ScrollOptionsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Partial update of [`BounceOptions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BounceOptionsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(
        default,
        alias = "propagate_to_existing",
        skip_serializing_if = "Option::is_none"
    )]
    pub propagate_to_existing: Option<bool>,
    #[serde(flatten)]
    pub scroll: ScrollOptionsPatch,
}

impl BounceOptionsPatch {
    /// Parse a patch from a JSON object such as `{"maxStretch": 0.2}`
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElasticConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub bounce: BounceOptions,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Parameters for the headless gesture simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Interval between rendered frames in milliseconds
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Default container height when a script does not set one
    #[serde(default = "default_container_height")]
    pub container_height: f64,
    /// Default content height when a script does not set one
    #[serde(default = "default_scroll_height")]
    pub scroll_height: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            container_height: default_container_height(),
            scroll_height: default_scroll_height(),
        }
    }
}

fn default_container() -> String {
    ".elastic-container".to_string()
}

fn default_max_stretch() -> f64 {
    0.15
}

fn default_resistance() -> f64 {
    0.3
}

fn default_animation_duration() -> u64 {
    300
}

fn default_animation_function() -> String {
    "ease-out".to_string()
}

fn default_touch_threshold() -> f64 {
    5.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_frame_interval() -> u64 {
    16 // ~60fps
}

fn default_container_height() -> f64 {
    400.0
}

fn default_scroll_height() -> f64 {
    1200.0
}

impl ElasticConfig {
    /// Load configuration from the default path or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.bounce.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> crate::Result<PathBuf> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, self.to_toml()?)?;

        Ok(config_path)
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/elastic-bounce/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("elastic-bounce")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BounceOptions::default();
        assert_eq!(options.container, ".elastic-container");
        assert!(!options.propagate_to_existing);
        assert_eq!(options.scroll.max_stretch, 0.15);
        assert_eq!(options.scroll.resistance, 0.3);
        assert_eq!(options.scroll.animation_duration_ms, 300);
        assert_eq!(options.scroll.animation_function, "ease-out");
        assert_eq!(options.scroll.touch_threshold, 5.0);
        assert!(options.scroll.exclude_selectors.is_empty());
    }

    #[test]
    fn test_patch_from_camel_case_json() {
        let patch = BounceOptionsPatch::from_json(
            r#"{"container": ".list", "maxStretch": 0.2, "animationDuration": 500,
                "excludeSelectors": [".map"], "propagateToExisting": true}"#,
        )
        .unwrap();
        let merged = BounceOptions::default().merged(&patch);
        assert_eq!(merged.container, ".list");
        assert_eq!(merged.scroll.max_stretch, 0.2);
        assert_eq!(merged.scroll.animation_duration_ms, 500);
        assert_eq!(merged.scroll.exclude_selectors, vec![".map".to_string()]);
        assert!(merged.propagate_to_existing);
        // untouched fields keep their previous values
        assert_eq!(merged.scroll.resistance, 0.3);
    }

    #[test]
    fn test_patch_accepts_snake_case() {
        let patch = BounceOptionsPatch::from_json(r#"{"max_stretch": 0.3}"#).unwrap();
        assert_eq!(patch.scroll.max_stretch, Some(0.3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = ScrollOptions::default();
        options.max_stretch = -1.0;
        assert!(options.validate().is_err());

        let mut options = ScrollOptions::default();
        options.resistance = f64::NAN;
        assert!(options.validate().is_err());

        let mut options = ScrollOptions::default();
        options.animation_function = "  ".to_string();
        assert!(options.validate().is_err());

        let mut options = BounceOptions::default();
        options.container = String::new();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_with_partial_file() {
        let config: ElasticConfig = toml::from_str(
            r#"
            [bounce]
            container = ".scroller"
            max_stretch = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.bounce.container, ".scroller");
        assert_eq!(config.bounce.scroll.max_stretch, 0.25);
        assert_eq!(config.bounce.scroll.animation_duration_ms, 300);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.simulation.frame_interval_ms, 16);
    }

    #[test]
    fn test_easing_follows_animation_function() {
        let mut options = ScrollOptions::default();
        assert_eq!(options.easing(), Easing::EASE_OUT);
        options.animation_function = "linear".to_string();
        assert_eq!(options.easing(), Easing::Linear);
        options.animation_function = "wobbly".to_string();
        assert_eq!(options.easing(), Easing::EASE_OUT);
    }

    #[test]
    fn test_style_sheet_reflects_transition() {
        let mut options = BounceOptions::default();
        options.scroll.animation_duration_ms = 450;
        options.scroll.animation_function = "linear".to_string();
        let css = options.style_sheet();
        assert!(css.contains(".elastic-bounce-content"));
        assert!(css.contains("transition: transform 450ms linear;"));
        assert!(css.contains("will-change: transform;"));
    }
}
