//! Host abstraction
//!
//! The engine never touches a real DOM directly. Everything it needs from the
//! page (element queries, inline styles, touch listeners, frame and timer
//! scheduling, subtree mutation notifications) goes through the traits in this
//! module. `elastic-web` implements them over `web-sys`; [`crate::headless`]
//! implements them in memory for tests and the simulator.
//!
//! Hosts are single-threaded. Callbacks handed to a host are invoked later from
//! the host's own event loop, never re-entrantly from inside the call that
//! registered them.

mod types;

use std::fmt;
use std::time::Duration;

use crate::capability::Capabilities;
use crate::Result;

pub use types::{
    Callback, EventOutcome, FrameId, ListenerId, ListenerOptions, MutationHandler,
    MutationRecord, ObserverId, Overflow, ScrollMetrics, TimerId, TouchHandler, TouchInput,
    TouchKind,
};

/// Element tree, styling and touch listener access
pub trait Dom {
    /// Handle to an element. Equality must be identity, never structural.
    type Element: Clone + PartialEq + fmt::Debug + 'static;

    /// Features this host provides
    fn capabilities(&self) -> Capabilities;

    /// All elements in the document matching `selector`, in document order
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Descendants of `root` (excluding `root`) matching `selector`
    fn query_all_within(&self, root: &Self::Element, selector: &str)
        -> Result<Vec<Self::Element>>;

    fn matches(&self, element: &Self::Element, selector: &str) -> Result<bool>;

    /// Nearest inclusive ancestor matching `selector`
    fn closest(&self, element: &Self::Element, selector: &str) -> Result<Option<Self::Element>>;

    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Whether `node` is `ancestor` or lies inside it
    fn contains(&self, ancestor: &Self::Element, node: &Self::Element) -> bool;

    fn is_body(&self, element: &Self::Element) -> bool;

    fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    fn set_attribute(&self, element: &Self::Element, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&self, element: &Self::Element, name: &str) -> Result<()>;

    fn add_class(&self, element: &Self::Element, class: &str) -> Result<()>;

    fn remove_class(&self, element: &Self::Element, class: &str) -> Result<()>;

    /// Inline style property, `None` when unset or empty
    fn style(&self, element: &Self::Element, property: &str) -> Option<String>;

    fn set_style(&self, element: &Self::Element, property: &str, value: &str) -> Result<()>;

    fn remove_style(&self, element: &Self::Element, property: &str) -> Result<()>;

    /// Computed `overflow-y`
    fn overflow_y(&self, element: &Self::Element) -> Result<Overflow>;

    fn scroll_metrics(&self, element: &Self::Element) -> ScrollMetrics;

    fn style_sheet_exists(&self, id: &str) -> bool;

    /// Append a `<style id=..>` node to the document head
    fn insert_style_sheet(&self, id: &str, css: &str) -> Result<()>;

    /// Replace the text of an existing style node
    fn set_style_sheet_text(&self, id: &str, css: &str) -> Result<()>;

    /// Remove the style node, returning whether one existed
    fn remove_style_sheet(&self, id: &str) -> Result<bool>;

    fn listen(
        &self,
        element: &Self::Element,
        kind: TouchKind,
        options: ListenerOptions,
        handler: TouchHandler<Self::Element>,
    ) -> Result<ListenerId>;

    fn unlisten(&self, id: ListenerId);
}

/// Display-refresh and timer scheduling
pub trait Scheduler {
    /// Run `callback` at the next display refresh
    fn request_frame(&self, callback: Callback) -> Result<FrameId>;

    /// Cancel a frame that has not run yet; unknown ids are ignored
    fn cancel_frame(&self, id: FrameId);

    fn set_timeout(&self, delay: Duration, callback: Callback) -> Result<TimerId>;

    /// Cancel a timer that has not fired yet; unknown ids are ignored
    fn clear_timeout(&self, id: TimerId);

    /// Monotonic clock
    fn now(&self) -> Duration;
}

/// Subtree mutation notifications for the whole document
pub trait MutationSource: Dom {
    fn observe(&self, handler: MutationHandler<Self::Element>) -> Result<ObserverId>;

    fn disconnect(&self, id: ObserverId);
}

/// Everything the engine needs from a host
pub trait Platform: Dom + Scheduler + MutationSource + 'static {}

impl<T> Platform for T where T: Dom + Scheduler + MutationSource + 'static {}
