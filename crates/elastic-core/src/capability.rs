//! Runtime feature detection.
//!
//! Both the per-container controller and the fleet manager probe the host once
//! and downgrade themselves to a no-op if something they rely on is missing.

use serde::{Deserialize, Serialize};

/// A single runtime feature the engine may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TouchEvents,
    ClassList,
    Transform,
    ComputedStyle,
    AnimationFrame,
    MutationObserver,
    QuerySelector,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::TouchEvents => "touch events",
            Capability::ClassList => "classList",
            Capability::Transform => "CSS transform",
            Capability::ComputedStyle => "getComputedStyle",
            Capability::AnimationFrame => "requestAnimationFrame",
            Capability::MutationObserver => "MutationObserver",
            Capability::QuerySelector => "querySelector",
        }
    }
}

/// Features required by a single `ElasticScroll` controller
pub const CONTROLLER_REQUIREMENTS: &[Capability] = &[
    Capability::TouchEvents,
    Capability::ClassList,
    Capability::Transform,
    Capability::ComputedStyle,
    Capability::AnimationFrame,
];

/// Features required by the `ElasticBounce` fleet manager
pub const FLEET_REQUIREMENTS: &[Capability] = &[
    Capability::MutationObserver,
    Capability::QuerySelector,
    Capability::ClassList,
];

/// Set of features the host reports as available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub touch_events: bool,
    pub class_list: bool,
    pub transform: bool,
    pub computed_style: bool,
    pub animation_frame: bool,
    pub mutation_observer: bool,
    pub query_selector: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            touch_events: true,
            class_list: true,
            transform: true,
            computed_style: true,
            animation_frame: true,
            mutation_observer: true,
            query_selector: true,
        }
    }

    pub fn none() -> Self {
        Self {
            touch_events: false,
            class_list: false,
            transform: false,
            computed_style: false,
            animation_frame: false,
            mutation_observer: false,
            query_selector: false,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::TouchEvents => self.touch_events,
            Capability::ClassList => self.class_list,
            Capability::Transform => self.transform,
            Capability::ComputedStyle => self.computed_style,
            Capability::AnimationFrame => self.animation_frame,
            Capability::MutationObserver => self.mutation_observer,
            Capability::QuerySelector => self.query_selector,
        }
    }

    /// Return a copy with one capability switched off
    pub fn without(mut self, capability: Capability) -> Self {
        match capability {
            Capability::TouchEvents => self.touch_events = false,
            Capability::ClassList => self.class_list = false,
            Capability::Transform => self.transform = false,
            Capability::ComputedStyle => self.computed_style = false,
            Capability::AnimationFrame => self.animation_frame = false,
            Capability::MutationObserver => self.mutation_observer = false,
            Capability::QuerySelector => self.query_selector = false,
        }
        self
    }

    /// Required capabilities that are not available, in declaration order
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required.iter().copied().filter(|c| !self.has(*c)).collect()
    }
}
