use std::fmt;

/// Registered touch listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Scheduled display-refresh callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// Scheduled timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Live mutation subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

pub type Callback = Box<dyn FnOnce()>;

pub type TouchHandler<E> = Box<dyn FnMut(&TouchInput<E>) -> EventOutcome>;

pub type MutationHandler<E> = Box<dyn FnMut(&[MutationRecord<E>])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchKind {
    Start,
    Move,
    End,
    Cancel,
}

impl TouchKind {
    pub const ALL: [TouchKind; 4] = [
        TouchKind::Start,
        TouchKind::Move,
        TouchKind::End,
        TouchKind::Cancel,
    ];

    /// DOM event type
    pub fn event_name(&self) -> &'static str {
        match self {
            TouchKind::Start => "touchstart",
            TouchKind::Move => "touchmove",
            TouchKind::End => "touchend",
            TouchKind::Cancel => "touchcancel",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.event_name() == name)
    }
}

impl fmt::Display for TouchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
    /// Passive listeners cannot suppress the native scroll
    pub passive: bool,
}

impl ListenerOptions {
    pub fn passive() -> Self {
        Self { passive: true }
    }

    pub fn active() -> Self {
        Self { passive: false }
    }
}

/// Host-independent view of a touch event
#[derive(Debug, Clone)]
pub struct TouchInput<E> {
    pub kind: TouchKind,
    /// Element the touch originated on
    pub target: Option<E>,
    /// `clientY` of the first active touch, absent for end/cancel
    pub client_y: Option<f64>,
    pub cancelable: bool,
}

/// Listener verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOutcome {
    #[default]
    Continue,
    /// Suppress the browser's default scroll for this event
    PreventDefault,
}

/// One batch of subtree changes
#[derive(Debug, Clone)]
pub struct MutationRecord<E> {
    pub added: Vec<E>,
    pub removed: Vec<E>,
}

impl<E> Default for MutationRecord<E> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Computed `overflow-y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Auto,
    Scroll,
}

impl Overflow {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "hidden" => Overflow::Hidden,
            "clip" => Overflow::Clip,
            "auto" | "overlay" => Overflow::Auto,
            "scroll" => Overflow::Scroll,
            _ => Overflow::Visible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Overflow::Visible => "visible",
            Overflow::Hidden => "hidden",
            Overflow::Clip => "clip",
            Overflow::Auto => "auto",
            Overflow::Scroll => "scroll",
        }
    }

    /// Whether this value lets the user scroll content
    #[inline]
    pub fn allows_scroll(&self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}

/// Vertical scroll geometry of an element
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    #[inline]
    pub fn max_scroll(&self) -> f64 {
        self.scroll_height - self.client_height
    }

    #[inline]
    pub fn overflows(&self) -> bool {
        self.scroll_height > self.client_height
    }

    #[inline]
    pub fn is_at_top(&self) -> bool {
        self.scroll_top <= 0.0
    }

    /// Within one pixel of the maximum scroll offset
    #[inline]
    pub fn is_at_bottom(&self) -> bool {
        (self.scroll_top - self.max_scroll()).abs() < 1.0
    }

    /// Whether a drag of `delta_y` pushes further past an edge already reached
    ///
    /// Positive deltas drag content down (pulling past the top), negative
    /// deltas drag it up (pulling past the bottom).
    #[inline]
    pub fn is_pulling_past_edge(&self, delta_y: f64) -> bool {
        (self.is_at_top() && delta_y > 0.0) || (self.is_at_bottom() && delta_y < 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let top = ScrollMetrics::new(0.0, 1200.0, 400.0);
        assert!(top.is_at_top());
        assert!(!top.is_at_bottom());

        let bottom = ScrollMetrics::new(799.5, 1200.0, 400.0);
        assert!(!bottom.is_at_top());
        assert!(bottom.is_at_bottom());

        let middle = ScrollMetrics::new(300.0, 1200.0, 400.0);
        assert!(!middle.is_pulling_past_edge(10.0));
        assert!(!middle.is_pulling_past_edge(-10.0));
    }

    #[test]
    fn test_pulling_direction() {
        let top = ScrollMetrics::new(0.0, 1200.0, 400.0);
        assert!(top.is_pulling_past_edge(5.0));
        assert!(!top.is_pulling_past_edge(-5.0));
        assert!(!top.is_pulling_past_edge(0.0));

        // content that fits is at both edges at once
        let short = ScrollMetrics::new(0.0, 300.0, 400.0);
        assert!(!short.is_at_bottom());
        let exact = ScrollMetrics::new(0.0, 400.0, 400.0);
        assert!(exact.is_pulling_past_edge(5.0));
        assert!(exact.is_pulling_past_edge(-5.0));
    }

    #[test]
    fn test_overflow_parse() {
        assert!(Overflow::parse("auto").allows_scroll());
        assert!(Overflow::parse("scroll").allows_scroll());
        assert!(!Overflow::parse("hidden").allows_scroll());
        assert_eq!(Overflow::parse("bogus"), Overflow::Visible);
    }

    #[test]
    fn test_touch_kind_names() {
        for kind in TouchKind::ALL {
            assert_eq!(TouchKind::from_event_name(kind.event_name()), Some(kind));
        }
    }
}
