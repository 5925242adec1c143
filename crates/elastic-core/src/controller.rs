//! Per-container touch state machine
//!
//! An [`ElasticScroll`] owns one element. It listens for touches, stretches the
//! element with a `scaleY` transform while the user drags past a scroll edge,
//! and animates it back on release.
//!
//! ```text
//!   idle --touchstart--> touching --touchmove--> touching
//!     ^                                             |
//!     +------------- touchend / touchcancel --------+
//! ```
//!
//! Moves are throttled to one per [`FRAME_WINDOW`]; end and cancel share a
//! debounce with the same window. All DOM writes happen inside animation
//! frames scheduled on the platform.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::capability::CONTROLLER_REQUIREMENTS;
use crate::config::{ScrollOptions, ScrollOptionsPatch, CONTENT_CLASS};
use crate::host::{
    Dom, EventOutcome, FrameId, ListenerId, ListenerOptions, Platform, TimerId, TouchHandler,
    TouchInput, TouchKind,
};
use crate::status::Status;
use crate::stretch::StretchFrame;
use crate::timing::{debounce, throttle, Debounced, FRAME_WINDOW};
use crate::{Error, Result};

/// Whether `element` can scroll vertically on its own
///
/// Requires a computed `overflow-y` of `auto` or `scroll` and content taller
/// than the viewport.
pub fn is_scrollable<D: Dom + ?Sized>(dom: &D, element: &D::Element) -> Result<bool> {
    Ok(dom.overflow_y(element)?.allows_scroll() && dom.scroll_metrics(element).overflows())
}

#[derive(Debug, Clone, Copy, Default)]
struct TouchSession {
    start_y: f64,
    last_y: f64,
    is_touching: bool,
    /// A stretch frame was scheduled during this session
    stretched: bool,
}

struct Inner<P: Platform> {
    platform: Rc<P>,
    element: P::Element,
    options: ScrollOptions,
    session: TouchSession,
    pending_frame: Option<FrameId>,
    cleanup_timer: Option<TimerId>,
    listeners: Vec<ListenerId>,
    settle: Option<Rc<Debounced<P, ()>>>,
    /// Inline properties set by init that destroy must remove
    added_styles: Vec<&'static str>,
    supported: bool,
    destroyed: bool,
    status: Status,
}

impl<P: Platform> Inner<P> {
    #[inline]
    fn is_live(&self) -> bool {
        self.supported && !self.destroyed
    }

    fn fail(&mut self, context: &str, error: Error) {
        warn!("{} on {:?}: {}", context, self.element, error);
        self.status.record(&error);
    }

    fn set_style(&mut self, property: &str, value: &str) {
        if let Err(e) = self.platform.set_style(&self.element, property, value) {
            self.fail("Failed to set style", e);
        }
    }

    fn remove_style(&mut self, property: &str) {
        if let Err(e) = self.platform.remove_style(&self.element, property) {
            self.fail("Failed to clear style", e);
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(id) = self.pending_frame.take() {
            self.platform.cancel_frame(id);
        }
    }

    /// Target sits in an excluded region (itself or any ancestor matches)
    fn is_excluded(&mut self, target: Option<&P::Element>) -> bool {
        let Some(target) = target else {
            return false;
        };
        let mut failure = None;
        let excluded = self.options.exclude_selectors.iter().any(|selector| {
            match self.platform.closest(target, selector) {
                Ok(found) => found.is_some(),
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        });
        if let Some(e) = failure {
            self.fail("Invalid exclude selector", e);
        }
        excluded
    }

    /// Nearest scrollable element between `target` and the container
    fn nested_scroller(&self, target: &P::Element) -> Result<Option<P::Element>> {
        let mut current = Some(target.clone());
        while let Some(node) = current {
            if node == self.element || self.platform.is_body(&node) {
                return Ok(None);
            }
            if is_scrollable(&*self.platform, &node)? {
                return Ok(Some(node));
            }
            current = self.platform.parent(&node);
        }
        Ok(None)
    }

    fn schedule(this: &Rc<RefCell<Self>>, inner: &mut Self, work: impl FnOnce(&mut Self) + 'static) {
        inner.cancel_frame();
        let weak = Rc::downgrade(this);
        let result = inner.platform.request_frame(Box::new(move || {
            if let Some(this) = weak.upgrade() {
                let mut inner = this.borrow_mut();
                inner.pending_frame = None;
                if !inner.destroyed {
                    work(&mut inner);
                }
            }
        }));
        match result {
            Ok(id) => inner.pending_frame = Some(id),
            Err(e) => inner.fail("Failed to request animation frame", e),
        }
    }

    fn touch_start(this: &Rc<RefCell<Self>>, input: &TouchInput<P::Element>) -> EventOutcome {
        let mut inner = this.borrow_mut();
        if !inner.is_live() || inner.is_excluded(input.target.as_ref()) {
            return EventOutcome::Continue;
        }
        let Some(y) = input.client_y else {
            return EventOutcome::Continue;
        };

        inner.session = TouchSession {
            start_y: y,
            last_y: y,
            is_touching: true,
            stretched: false,
        };
        // a release still settling belongs to the previous gesture
        if let Some(settle) = inner.settle.as_ref() {
            settle.cancel();
        }
        inner.cancel_frame();
        inner.set_style("transition", "none");
        inner.set_style("transform", "none");
        EventOutcome::Continue
    }

    fn touch_move(this: &Rc<RefCell<Self>>, input: &TouchInput<P::Element>) -> EventOutcome {
        let mut inner = this.borrow_mut();
        if !inner.is_live() || !inner.session.is_touching {
            return EventOutcome::Continue;
        }
        if inner.is_excluded(input.target.as_ref()) {
            return EventOutcome::Continue;
        }
        let Some(y) = input.client_y else {
            return EventOutcome::Continue;
        };

        let delta_y = y - inner.session.last_y;
        let total_delta = y - inner.session.start_y;

        if let Some(target) = input.target.as_ref() {
            match inner.nested_scroller(target) {
                Ok(Some(scroller)) => {
                    if !inner.platform.scroll_metrics(&scroller).is_pulling_past_edge(delta_y) {
                        return EventOutcome::Continue;
                    }
                }
                Ok(None) => {}
                Err(e) => inner.fail("Failed to inspect nested scroller", e),
            }
        }

        let metrics = inner.platform.scroll_metrics(&inner.element);
        let mut outcome = EventOutcome::Continue;
        // content that fits sits at both edges, so direction decides a reversal
        let reversed = inner.session.stretched
            && delta_y != 0.0
            && delta_y.signum() != total_delta.signum();

        if reversed {
            // drag reversed: drop the stretch and measure the next one from here
            inner.session.stretched = false;
            inner.session.start_y = y;
            Self::schedule(this, &mut inner, |inner| {
                inner.set_style("transform", "none");
            });
        } else if metrics.is_pulling_past_edge(delta_y) {
            if input.cancelable {
                outcome = EventOutcome::PreventDefault;
            }
            let frame = StretchFrame::compute(
                total_delta,
                inner.options.resistance,
                inner.options.max_stretch,
                metrics.client_height,
            );
            inner.session.stretched = true;
            Self::schedule(this, &mut inner, move |inner| {
                inner.set_style("transform", &frame.transform_css());
                inner.set_style("transform-origin", frame.origin.as_css());
            });
        }

        inner.session.last_y = y;
        outcome
    }

    fn touch_finish(this: &Rc<RefCell<Self>>) {
        let mut inner = this.borrow_mut();
        if !inner.is_live() || !inner.session.is_touching {
            return;
        }
        inner.session.is_touching = false;
        inner.session.stretched = false;

        let transition = inner.options.transition_css();
        let duration = inner.options.animation_duration();
        let weak = Rc::downgrade(this);
        Self::schedule(this, &mut inner, move |inner| {
            inner.set_style("transition", &transition);
            inner.set_style("transform", "none");
            inner.schedule_cleanup(weak, duration);
        });
    }

    /// Clear the recovery transition once it has run, unless a new gesture began
    fn schedule_cleanup(&mut self, weak: Weak<RefCell<Self>>, duration: Duration) {
        if let Some(id) = self.cleanup_timer.take() {
            self.platform.clear_timeout(id);
        }
        let result = self.platform.set_timeout(
            duration,
            Box::new(move || {
                if let Some(this) = weak.upgrade() {
                    let mut inner = this.borrow_mut();
                    inner.cleanup_timer = None;
                    if !inner.destroyed && !inner.session.is_touching {
                        inner.set_style("transition", "none");
                    }
                }
            }),
        );
        match result {
            Ok(id) => self.cleanup_timer = Some(id),
            Err(e) => self.fail("Failed to schedule transition cleanup", e),
        }
    }

    /// Undo whatever init managed to apply
    fn rollback(&mut self) {
        for id in std::mem::take(&mut self.listeners) {
            self.platform.unlisten(id);
        }
        if let Some(settle) = self.settle.take() {
            settle.cancel();
        }
        let _ = self.platform.remove_class(&self.element, CONTENT_CLASS);
        for property in std::mem::take(&mut self.added_styles) {
            let _ = self.platform.remove_style(&self.element, property);
        }
    }
}

/// Elastic overscroll on a single container
///
/// Cloning yields another handle to the same controller.
pub struct ElasticScroll<P: Platform> {
    inner: Rc<RefCell<Inner<P>>>,
}

impl<P: Platform> Clone for ElasticScroll<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Platform> ElasticScroll<P> {
    /// Attach to `element`
    ///
    /// Never fails: a runtime missing required features, or an init step that
    /// errors, leaves an inert controller whose [`status`](Self::status) says why.
    pub fn new(platform: Rc<P>, element: P::Element, options: ScrollOptions) -> Self {
        let missing = platform.capabilities().missing(CONTROLLER_REQUIREMENTS);
        let supported = missing.is_empty();
        let controller = Self {
            inner: Rc::new(RefCell::new(Inner {
                platform,
                element,
                options,
                session: TouchSession::default(),
                pending_frame: None,
                cleanup_timer: None,
                listeners: Vec::new(),
                settle: None,
                added_styles: Vec::new(),
                supported,
                destroyed: false,
                status: Status::Idle,
            })),
        };

        if !supported {
            let error = Error::Unsupported(missing);
            let mut inner = controller.inner.borrow_mut();
            warn!("Elastic scroll disabled for {:?}: {}", inner.element, error);
            inner.status.record(&error);
            drop(inner);
            return controller;
        }

        match controller.init() {
            Ok(()) => {
                let mut inner = controller.inner.borrow_mut();
                inner.status = Status::Ready;
                debug!("Elastic scroll attached to {:?}", inner.element);
            }
            Err(e) => {
                let mut inner = controller.inner.borrow_mut();
                inner.rollback();
                inner.supported = false;
                inner.fail("Failed to initialize elastic scroll", e);
            }
        }
        controller
    }

    fn init(&self) -> Result<()> {
        let (platform, element) = {
            let inner = self.inner.borrow();
            (Rc::clone(&inner.platform), inner.element.clone())
        };

        if !is_scrollable(&*platform, &element)? {
            for (property, value) in [("overflow-y", "auto"), ("-webkit-overflow-scrolling", "touch")] {
                platform.set_style(&element, property, value)?;
                self.inner.borrow_mut().added_styles.push(property);
            }
        }
        platform.add_class(&element, CONTENT_CLASS)?;

        let weak = Rc::downgrade(&self.inner);

        let on_start = {
            let weak = weak.clone();
            move |input: &TouchInput<P::Element>| match weak.upgrade() {
                Some(this) => Inner::touch_start(&this, input),
                None => EventOutcome::Continue,
            }
        };
        self.register(TouchKind::Start, ListenerOptions::passive(), Box::new(on_start))?;

        let mut throttled_move = throttle(&platform, FRAME_WINDOW, {
            let weak = weak.clone();
            move |input: TouchInput<P::Element>| match weak.upgrade() {
                Some(this) => Inner::touch_move(&this, &input),
                None => EventOutcome::Continue,
            }
        });
        let on_move = move |input: &TouchInput<P::Element>| {
            throttled_move(input.clone()).unwrap_or_default()
        };
        self.register(TouchKind::Move, ListenerOptions::active(), Box::new(on_move))?;

        let settle = Rc::new(debounce(&platform, FRAME_WINDOW, {
            let weak = weak.clone();
            move |_: ()| {
                if let Some(this) = weak.upgrade() {
                    Inner::touch_finish(&this);
                }
            }
        }));
        self.inner.borrow_mut().settle = Some(Rc::clone(&settle));

        for kind in [TouchKind::End, TouchKind::Cancel] {
            let settle = Rc::clone(&settle);
            let weak = weak.clone();
            let on_finish = move |_: &TouchInput<P::Element>| {
                if let Err(e) = settle.call(()) {
                    if let Some(this) = weak.upgrade() {
                        this.borrow_mut().fail("Failed to schedule touch end", e);
                    }
                }
                EventOutcome::Continue
            };
            self.register(kind, ListenerOptions::active(), Box::new(on_finish))?;
        }
        Ok(())
    }

    fn register(
        &self,
        kind: TouchKind,
        options: ListenerOptions,
        handler: TouchHandler<P::Element>,
    ) -> Result<()> {
        let (platform, element) = {
            let inner = self.inner.borrow();
            (Rc::clone(&inner.platform), inner.element.clone())
        };
        let id = platform.listen(&element, kind, options, handler)?;
        self.inner.borrow_mut().listeners.push(id);
        Ok(())
    }

    /// Merge `patch` into the options used by future frames
    ///
    /// A frame already scheduled keeps the values it captured.
    pub fn update_options(&self, patch: &ScrollOptionsPatch) {
        let mut inner = self.inner.borrow_mut();
        if !inner.is_live() {
            return;
        }
        let merged = inner.options.merged(patch);
        match merged.validate() {
            Ok(()) => inner.options = merged,
            Err(e) => inner.fail("Rejected option update", e),
        }
    }

    /// Detach from the element and restore its inline styles
    ///
    /// Idempotent; safe on a controller that never initialized.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.session = TouchSession::default();
        inner.cancel_frame();
        if let Some(settle) = inner.settle.take() {
            settle.cancel();
        }
        if let Some(id) = inner.cleanup_timer.take() {
            inner.platform.clear_timeout(id);
        }
        for id in std::mem::take(&mut inner.listeners) {
            inner.platform.unlisten(id);
        }

        if inner.supported {
            if let Err(e) = inner.platform.remove_class(&inner.element, CONTENT_CLASS) {
                inner.fail("Failed to remove marker class", e);
            }
            for property in ["transform", "transform-origin", "transition"] {
                inner.remove_style(property);
            }
        }
        for property in std::mem::take(&mut inner.added_styles) {
            inner.remove_style(property);
        }

        debug!("Elastic scroll detached from {:?}", inner.element);
        inner.status = Status::Destroyed;
    }

    pub fn element(&self) -> P::Element {
        self.inner.borrow().element.clone()
    }

    pub fn options(&self) -> ScrollOptions {
        self.inner.borrow().options.clone()
    }

    #[inline]
    pub fn is_supported(&self) -> bool {
        self.inner.borrow().supported
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.inner.borrow().session.is_touching
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Capability};
    use crate::headless::{HeadlessDom, HostOperation, NodeId};
    use crate::stretch::parse_scale_y;

    fn setup() -> (Rc<HeadlessDom>, NodeId, ElasticScroll<HeadlessDom>) {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom
            .element("div")
            .class("elastic-container")
            .scrollable(0.0, 1200.0, 400.0)
            .append_to(dom.body());
        let controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());
        (dom, el, controller)
    }

    fn scale_of(dom: &HeadlessDom, el: NodeId) -> f64 {
        dom.style(&el, "transform")
            .and_then(|t| parse_scale_y(&t))
            .unwrap_or(1.0)
    }

    /// Drag from `from` through `to` in `steps` frames, one move per frame
    fn drag(dom: &HeadlessDom, el: NodeId, from: f64, to: f64, steps: u32) -> Vec<f64> {
        let mut scales = Vec::new();
        for i in 1..=steps {
            let y = from + (to - from) * f64::from(i) / f64::from(steps);
            dom.touch_move(el, y);
            dom.advance(FRAME_WINDOW);
            scales.push(scale_of(dom, el));
        }
        scales
    }

    #[test]
    fn test_init_marks_container() {
        let (dom, el, controller) = setup();
        assert!(controller.is_supported());
        assert_eq!(controller.status(), Status::Ready);
        assert!(dom.has_class(el, CONTENT_CLASS));
        assert_eq!(dom.listener_count(el), 4);
        assert_eq!(
            dom.listener_options(el, TouchKind::Start),
            vec![ListenerOptions::passive()]
        );
        assert_eq!(
            dom.listener_options(el, TouchKind::Move),
            vec![ListenerOptions::active()]
        );
        // already scrollable, so no inline overflow
        assert!(dom.style(&el, "overflow-y").is_none());
    }

    #[test]
    fn test_worked_example() {
        let (dom, el, _controller) = setup();
        dom.touch_start(el, 100.0);
        let result = dom.touch_move(el, 200.0);
        assert!(result.default_prevented);

        dom.advance(FRAME_WINDOW);
        let scale = scale_of(&dom, el);
        assert!((scale - 1.0395).abs() < 0.002, "scale was {}", scale);
        assert_eq!(dom.style(&el, "transform-origin").as_deref(), Some("top"));
    }

    #[test]
    fn test_stretch_is_monotonic_and_capped() {
        let (dom, el, _controller) = setup();
        dom.touch_start(el, 0.0);
        let scales = drag(&dom, el, 0.0, 1500.0, 40);

        assert!(scales.windows(2).all(|w| w[1] >= w[0]));
        assert!(scales.iter().all(|s| *s <= 1.15 + 1e-9));
        assert!((scales[scales.len() - 1] - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_bottom_edge_anchors_bottom() {
        let (dom, el, _controller) = setup();
        dom.set_scroll_top(el, 800.0);
        dom.touch_start(el, 500.0);
        assert!(dom.touch_move(el, 400.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        assert!(scale_of(&dom, el) > 1.0);
        assert_eq!(dom.style(&el, "transform-origin").as_deref(), Some("bottom"));
    }

    #[test]
    fn test_middle_of_content_is_left_to_native_scroll() {
        let (dom, el, _controller) = setup();
        dom.set_scroll_top(el, 300.0);
        dom.touch_start(el, 0.0);
        assert!(!dom.touch_move(el, 80.0).default_prevented);
        assert_eq!(dom.pending_frame_count(), 0);
    }

    #[test]
    fn test_reversal_resets_transform() {
        let (dom, el, _controller) = setup();
        dom.touch_start(el, 0.0);
        let stretched = drag(&dom, el, 0.0, 200.0, 4);
        let peak = stretched[stretched.len() - 1];
        assert!(peak > 1.0);

        dom.touch_move(el, 150.0);
        dom.advance(FRAME_WINDOW);
        assert_eq!(dom.style(&el, "transform").as_deref(), Some("none"));
        assert_eq!(dom.rendered_scale(el), 1.0);

        // the next stretch is measured from the turning point
        dom.touch_move(el, 200.0);
        dom.advance(FRAME_WINDOW);
        let again = scale_of(&dom, el);
        assert!(again > 1.0 && again < peak);
    }

    #[test]
    fn test_reversal_resets_when_content_fits() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom
            .element("div")
            .scrollable(0.0, 400.0, 400.0)
            .append_to(dom.body());
        let _controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());

        dom.touch_start(el, 0.0);
        let stretched = drag(&dom, el, 0.0, 200.0, 4);
        assert!(stretched[stretched.len() - 1] > 1.0);
        assert_eq!(dom.style(&el, "transform-origin").as_deref(), Some("top"));

        dom.touch_move(el, 150.0);
        dom.advance(FRAME_WINDOW);
        assert_eq!(dom.style(&el, "transform").as_deref(), Some("none"));
        assert_eq!(dom.rendered_scale(el), 1.0);

        // continuing upward pulls past the bottom edge from the turning point
        dom.touch_move(el, 100.0);
        dom.advance(FRAME_WINDOW);
        assert!(scale_of(&dom, el) > 1.0);
        assert_eq!(dom.style(&el, "transform-origin").as_deref(), Some("bottom"));
    }

    #[test]
    fn test_release_recovers_and_clears_transition() {
        let (dom, el, controller) = setup();
        dom.touch_start(el, 0.0);
        drag(&dom, el, 0.0, 300.0, 5);
        let peak = dom.rendered_scale(el);
        assert!(peak > 1.0);

        dom.touch_end(el);
        assert!(controller.is_touching());
        // settle window, then the recovery frame
        dom.advance(FRAME_WINDOW * 2);
        assert!(!controller.is_touching());
        assert_eq!(
            dom.style(&el, "transition").as_deref(),
            Some("transform 300ms ease-out")
        );
        assert_eq!(dom.style(&el, "transform").as_deref(), Some("none"));

        dom.advance(Duration::from_millis(150));
        let midway = dom.rendered_scale(el);
        assert!(midway > 1.0 && midway < peak);

        dom.advance(Duration::from_millis(150));
        assert_eq!(dom.rendered_scale(el), 1.0);
        assert_eq!(dom.style(&el, "transition").as_deref(), Some("none"));
        assert_eq!(dom.pending_timer_count(), 0);
    }

    #[test]
    fn test_cleanup_skipped_while_new_gesture_runs() {
        let (dom, el, controller) = setup();
        dom.touch_start(el, 0.0);
        drag(&dom, el, 0.0, 100.0, 2);
        dom.touch_end(el);
        dom.advance(FRAME_WINDOW * 2);

        dom.touch_start(el, 0.0);
        dom.touch_move(el, 60.0);
        dom.advance(Duration::from_millis(400));
        assert!(controller.is_touching());
        assert_eq!(dom.style(&el, "transition").as_deref(), Some("none"));
        assert!(scale_of(&dom, el) > 1.0);
    }

    #[test]
    fn test_cancel_behaves_like_end() {
        let (dom, el, controller) = setup();
        dom.touch_start(el, 0.0);
        dom.touch_cancel(el);
        dom.advance(FRAME_WINDOW);
        assert!(!controller.is_touching());
    }

    #[test]
    fn test_throttle_drops_rapid_moves() {
        let (dom, el, _controller) = setup();
        dom.touch_start(el, 0.0);
        assert!(dom.touch_move(el, 50.0).default_prevented);
        // same frame window: dropped, so nothing is prevented
        assert!(!dom.touch_move(el, 60.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        let expected = StretchFrame::compute(50.0, 0.3, 0.15, 400.0).scale;
        assert!((scale_of(&dom, el) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_nested_scroller_takes_precedence() {
        let (dom, el, _controller) = setup();
        let inner = dom
            .element("ul")
            .scrollable(200.0, 1000.0, 300.0)
            .append_to(el);
        let item = dom.element("li").append_to(inner);

        dom.touch_start(item, 0.0);
        assert!(!dom.touch_move(item, 50.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        assert_eq!(dom.pending_frame_count(), 0);

        // once the inner list is at its own top the outer effect engages
        dom.set_scroll_top(inner, 0.0);
        assert!(dom.touch_move(item, 100.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        let expected = StretchFrame::compute(100.0, 0.3, 0.15, 400.0).scale;
        assert!((scale_of(&dom, el) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_region_is_ignored() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom
            .element("div")
            .scrollable(0.0, 1200.0, 400.0)
            .append_to(dom.body());
        let slider = dom.element("div").class("slider").append_to(el);
        let knob = dom.element("span").append_to(slider);
        let options = ScrollOptions {
            exclude_selectors: vec![".slider".to_string()],
            ..Default::default()
        };
        let controller = ElasticScroll::new(Rc::clone(&dom), el, options);

        dom.touch_start(knob, 0.0);
        assert!(!controller.is_touching());
        assert!(!dom.touch_move(knob, 100.0).default_prevented);
        assert_eq!(dom.pending_frame_count(), 0);
    }

    #[test]
    fn test_non_cancelable_move_still_stretches() {
        let (dom, el, _controller) = setup();
        dom.set_touch_cancelable(false);
        dom.touch_start(el, 0.0);
        assert!(!dom.touch_move(el, 100.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        assert!(scale_of(&dom, el) > 1.0);
    }

    #[test]
    fn test_zero_height_container_hits_cap() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom
            .element("div")
            .overflow(crate::host::Overflow::Auto)
            .metrics(0.0, 0.0, 0.0)
            .append_to(dom.body());
        let _controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());
        dom.touch_start(el, 0.0);
        dom.touch_move(el, 10.0);
        dom.advance(FRAME_WINDOW);
        assert!((scale_of(&dom, el) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_destroy_restores_element() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom.element("div").metrics(0.0, 300.0, 400.0).append_to(dom.body());
        let controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());
        assert_eq!(dom.style(&el, "overflow-y").as_deref(), Some("auto"));
        assert_eq!(
            dom.style(&el, "-webkit-overflow-scrolling").as_deref(),
            Some("touch")
        );

        dom.touch_start(el, 0.0);
        dom.touch_move(el, 40.0);
        dom.touch_end(el);

        controller.destroy();
        assert!(controller.is_destroyed());
        assert_eq!(controller.status(), Status::Destroyed);
        assert_eq!(dom.listener_count(el), 0);
        assert!(!dom.has_class(el, CONTENT_CLASS));
        assert!(dom.inline_styles(el).is_empty());
        assert_eq!(dom.pending_frame_count(), 0);
        assert_eq!(dom.pending_timer_count(), 0);

        controller.destroy();
        dom.advance(Duration::from_secs(1));
        assert!(dom.inline_styles(el).is_empty());
    }

    #[test]
    fn test_unsupported_runtime_is_inert() {
        let dom = Rc::new(HeadlessDom::with_capabilities(
            Capabilities::all().without(Capability::TouchEvents),
        ));
        let el = dom.element("div").append_to(dom.body());
        let controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());

        assert!(!controller.is_supported());
        assert_eq!(
            controller.status(),
            Status::Unsupported {
                missing: vec![Capability::TouchEvents]
            }
        );
        assert_eq!(dom.listener_count(el), 0);
        assert!(!dom.has_class(el, CONTENT_CLASS));

        controller.update_options(&ScrollOptionsPatch {
            max_stretch: Some(0.5),
            ..Default::default()
        });
        assert_eq!(controller.options().max_stretch, 0.15);

        controller.destroy();
        controller.destroy();
        assert!(dom.inline_styles(el).is_empty());
    }

    #[test]
    fn test_failed_init_rolls_back() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom.element("div").append_to(dom.body());
        dom.fail_operation(HostOperation::Listen);
        let controller = ElasticScroll::new(Rc::clone(&dom), el, ScrollOptions::default());
        dom.clear_failures();

        assert!(!controller.is_supported());
        assert!(controller.status().is_degraded());
        assert!(!dom.has_class(el, CONTENT_CLASS));
        assert!(dom.inline_styles(el).is_empty());
        assert_eq!(dom.listener_count(el), 0);
        controller.destroy();
    }

    #[test]
    fn test_update_options_applies_to_next_frame() {
        let (dom, el, controller) = setup();
        controller.update_options(&ScrollOptionsPatch {
            max_stretch: Some(0.05),
            ..Default::default()
        });
        dom.touch_start(el, 0.0);
        drag(&dom, el, 0.0, 1000.0, 4);
        assert!((scale_of(&dom, el) - 1.05).abs() < 1e-9);

        controller.update_options(&ScrollOptionsPatch {
            resistance: Some(-1.0),
            ..Default::default()
        });
        assert_eq!(controller.options().resistance, 0.3);
        assert!(controller.status().is_degraded());
    }

    #[test]
    fn test_scheduled_frame_keeps_captured_options() {
        let (dom, el, controller) = setup();
        dom.touch_start(el, 0.0);
        dom.touch_move(el, 1000.0);
        controller.update_options(&ScrollOptionsPatch {
            max_stretch: Some(0.01),
            ..Default::default()
        });
        dom.advance(FRAME_WINDOW);
        assert!((scale_of(&dom, el) - 1.15).abs() < 1e-9);
    }
}
