//! Host traits over the real DOM
//!
//! Listener, frame and timer handles are owned here and keyed by id. A frame
//! or timer marks itself finished only after its callback returns, and
//! finished handles are dropped on the next scheduling call, so no handle is
//! ever freed while its own callback runs.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::render::{request_animation_frame, AnimationFrame};
use gloo::timers::callback::Timeout;
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, HtmlElement, MutationObserver, MutationObserverInit, Node, NodeList,
    TouchEvent, Window,
};

use elastic_core::host::{
    Callback, EventOutcome, FrameId, ListenerId, ListenerOptions, MutationHandler,
    MutationRecord, ObserverId, Overflow, ScrollMetrics, TimerId, TouchHandler, TouchInput,
    TouchKind,
};
use elastic_core::{Capabilities, Dom, Error, MutationSource, Result, Scheduler};

type ObserverCallback = Closure<dyn FnMut(Array, JsValue)>;

struct ObserverEntry {
    observer: MutationObserver,
    callback: ObserverCallback,
}

#[derive(Debug, Clone, Copy)]
enum Finished {
    Frame(u64),
    Timer(u64),
}

/// Browser [`Platform`](elastic_core::Platform) backed by `web-sys` and `gloo`
pub struct WebPlatform {
    window: Window,
    document: Document,
    capabilities: Capabilities,
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<u64, EventListener>>,
    frames: RefCell<HashMap<u64, AnimationFrame>>,
    timers: RefCell<HashMap<u64, Timeout>>,
    observers: RefCell<HashMap<u64, ObserverEntry>>,
    finished: Rc<RefCell<Vec<Finished>>>,
    /// Observer callbacks kept alive until the next scheduling call
    retired: RefCell<Vec<ObserverCallback>>,
}

impl WebPlatform {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Dom("no global window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| Error::Dom("window has no document".to_string()))?;
        let capabilities = detect_capabilities(&window, &document);

        Ok(Self {
            window,
            document,
            capabilities,
            next_id: Cell::new(0),
            listeners: RefCell::new(HashMap::new()),
            frames: RefCell::new(HashMap::new()),
            timers: RefCell::new(HashMap::new()),
            observers: RefCell::new(HashMap::new()),
            finished: Rc::new(RefCell::new(Vec::new())),
            retired: RefCell::new(Vec::new()),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    /// Drop handles whose callbacks have completed
    fn prune(&self) {
        let finished: Vec<Finished> = self.finished.borrow_mut().drain(..).collect();
        for entry in finished {
            match entry {
                Finished::Frame(id) => drop(self.frames.borrow_mut().remove(&id)),
                Finished::Timer(id) => drop(self.timers.borrow_mut().remove(&id)),
            }
        }
        self.retired.borrow_mut().clear();
    }

    fn inline_style(&self, element: &Element) -> Result<web_sys::CssStyleDeclaration> {
        element
            .dyn_ref::<HtmlElement>()
            .map(HtmlElement::style)
            .ok_or_else(|| Error::Dom(format!("{:?} has no inline style", element)))
    }
}

fn has_property(target: &Object, name: &str) -> bool {
    Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
}

fn detect_capabilities(window: &Window, document: &Document) -> Capabilities {
    let root = document.document_element();
    Capabilities {
        touch_events: has_property(window.unchecked_ref(), "ontouchstart"),
        class_list: root
            .as_ref()
            .is_some_and(|r| has_property(r.unchecked_ref(), "classList")),
        transform: root
            .as_ref()
            .and_then(|r| r.dyn_ref::<HtmlElement>())
            .is_some_and(|r| has_property(r.style().unchecked_ref(), "transform")),
        computed_style: has_property(window.unchecked_ref(), "getComputedStyle"),
        animation_frame: has_property(window.unchecked_ref(), "requestAnimationFrame"),
        mutation_observer: has_property(window.unchecked_ref(), "MutationObserver"),
        query_selector: has_property(document.unchecked_ref(), "querySelector"),
    }
}

/// Readable text for a thrown JS value
fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{:?}", value)
}

fn dom_error(context: &str, value: JsValue) -> Error {
    Error::Dom(format!("{}: {}", context, describe(&value)))
}

fn selector_error(selector: &str, value: JsValue) -> Error {
    Error::Selector(format!("'{}': {}", selector, describe(&value)))
}

fn collect_elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn touch_input(kind: TouchKind, event: &Event) -> TouchInput<Element> {
    let client_y = event
        .dyn_ref::<TouchEvent>()
        .and_then(|e| e.touches().get(0))
        .map(|touch| f64::from(touch.client_y()));
    TouchInput {
        kind,
        target: event.target().and_then(|t| t.dyn_into::<Element>().ok()),
        client_y,
        cancelable: event.cancelable(),
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

impl Dom for WebPlatform {
    type Element = Element;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Element>> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| selector_error(selector, e))?;
        Ok(collect_elements(&list))
    }

    fn query_all_within(&self, root: &Element, selector: &str) -> Result<Vec<Element>> {
        let list = root
            .query_selector_all(selector)
            .map_err(|e| selector_error(selector, e))?;
        Ok(collect_elements(&list))
    }

    fn matches(&self, element: &Element, selector: &str) -> Result<bool> {
        element
            .matches(selector)
            .map_err(|e| selector_error(selector, e))
    }

    fn closest(&self, element: &Element, selector: &str) -> Result<Option<Element>> {
        element
            .closest(selector)
            .map_err(|e| selector_error(selector, e))
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn contains(&self, ancestor: &Element, node: &Element) -> bool {
        ancestor.contains(Some(AsRef::<Node>::as_ref(node)))
    }

    fn is_body(&self, element: &Element) -> bool {
        self.document
            .body()
            .is_some_and(|body| AsRef::<Element>::as_ref(&body) == element)
    }

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        Ok(element.get_attribute(name))
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) -> Result<()> {
        element
            .set_attribute(name, value)
            .map_err(|e| dom_error("setAttribute", e))
    }

    fn remove_attribute(&self, element: &Element, name: &str) -> Result<()> {
        element
            .remove_attribute(name)
            .map_err(|e| dom_error("removeAttribute", e))
    }

    fn add_class(&self, element: &Element, class: &str) -> Result<()> {
        element
            .class_list()
            .add_1(class)
            .map_err(|e| dom_error("classList.add", e))
    }

    fn remove_class(&self, element: &Element, class: &str) -> Result<()> {
        element
            .class_list()
            .remove_1(class)
            .map_err(|e| dom_error("classList.remove", e))
    }

    fn style(&self, element: &Element, property: &str) -> Option<String> {
        self.inline_style(element)
            .ok()?
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style(&self, element: &Element, property: &str, value: &str) -> Result<()> {
        self.inline_style(element)?
            .set_property(property, value)
            .map_err(|e| dom_error("style.setProperty", e))
    }

    fn remove_style(&self, element: &Element, property: &str) -> Result<()> {
        self.inline_style(element)?
            .remove_property(property)
            .map(|_| ())
            .map_err(|e| dom_error("style.removeProperty", e))
    }

    fn overflow_y(&self, element: &Element) -> Result<Overflow> {
        let computed = self
            .window
            .get_computed_style(element)
            .map_err(|e| dom_error("getComputedStyle", e))?
            .ok_or_else(|| Error::Dom(format!("no computed style for {:?}", element)))?;
        let value = computed
            .get_property_value("overflow-y")
            .map_err(|e| dom_error("getPropertyValue", e))?;
        Ok(Overflow::parse(&value))
    }

    fn scroll_metrics(&self, element: &Element) -> ScrollMetrics {
        ScrollMetrics::new(
            f64::from(element.scroll_top()),
            f64::from(element.scroll_height()),
            f64::from(element.client_height()),
        )
    }

    fn style_sheet_exists(&self, id: &str) -> bool {
        self.document.get_element_by_id(id).is_some()
    }

    fn insert_style_sheet(&self, id: &str, css: &str) -> Result<()> {
        let head = self
            .document
            .head()
            .ok_or_else(|| Error::Dom("document has no head".to_string()))?;
        let style = self
            .document
            .create_element("style")
            .map_err(|e| dom_error("createElement", e))?;
        style.set_id(id);
        style.set_text_content(Some(css));
        head.append_child(&style)
            .map(|_| ())
            .map_err(|e| dom_error("appendChild", e))
    }

    fn set_style_sheet_text(&self, id: &str, css: &str) -> Result<()> {
        let style = self
            .document
            .get_element_by_id(id)
            .ok_or_else(|| Error::Dom(format!("no style sheet with id '{}'", id)))?;
        style.set_text_content(Some(css));
        Ok(())
    }

    fn remove_style_sheet(&self, id: &str) -> Result<bool> {
        match self.document.get_element_by_id(id) {
            Some(style) => {
                style.remove();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn listen(
        &self,
        element: &Element,
        kind: TouchKind,
        options: ListenerOptions,
        handler: TouchHandler<Element>,
    ) -> Result<ListenerId> {
        let id = self.next_id();
        let mut handler = handler;
        let listener = EventListener::new_with_options(
            element,
            kind.event_name(),
            EventListenerOptions {
                phase: EventListenerPhase::Bubble,
                passive: options.passive,
            },
            move |event: &Event| {
                let input = touch_input(kind, event);
                if handler(&input) == EventOutcome::PreventDefault && event.cancelable() {
                    event.prevent_default();
                }
            },
        );
        self.listeners.borrow_mut().insert(id, listener);
        Ok(ListenerId(id))
    }

    fn unlisten(&self, id: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&id.0);
        drop(removed);
    }
}

impl Scheduler for WebPlatform {
    fn request_frame(&self, callback: Callback) -> Result<FrameId> {
        self.prune();
        let id = self.next_id();
        let finished = Rc::clone(&self.finished);
        let handle = request_animation_frame(move |_timestamp| {
            callback();
            finished.borrow_mut().push(Finished::Frame(id));
        });
        self.frames.borrow_mut().insert(id, handle);
        Ok(FrameId(id))
    }

    fn cancel_frame(&self, id: FrameId) {
        let removed = self.frames.borrow_mut().remove(&id.0);
        drop(removed);
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> Result<TimerId> {
        self.prune();
        let id = self.next_id();
        let finished = Rc::clone(&self.finished);
        let timeout = Timeout::new(millis(delay), move || {
            callback();
            finished.borrow_mut().push(Finished::Timer(id));
        });
        self.timers.borrow_mut().insert(id, timeout);
        Ok(TimerId(id))
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(timeout) = self.timers.borrow_mut().remove(&id.0) {
            timeout.cancel();
        }
    }

    fn now(&self) -> Duration {
        let ms = self
            .window
            .performance()
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now);
        Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }
}

impl MutationSource for WebPlatform {
    fn observe(&self, handler: MutationHandler<Element>) -> Result<ObserverId> {
        self.prune();
        let root = self
            .document
            .body()
            .ok_or_else(|| Error::Dom("document has no body".to_string()))?;

        let mut handler = handler;
        let callback = ObserverCallback::new(move |records: Array, _observer: JsValue| {
            let batch: Vec<MutationRecord<Element>> = records
                .iter()
                .filter_map(|r| r.dyn_into::<web_sys::MutationRecord>().ok())
                .map(|r| MutationRecord {
                    added: collect_elements(&r.added_nodes()),
                    removed: collect_elements(&r.removed_nodes()),
                })
                .collect();
            handler(&batch);
        });

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| dom_error("MutationObserver", e))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(&root, &init)
            .map_err(|e| dom_error("MutationObserver.observe", e))?;

        let id = self.next_id();
        self.observers
            .borrow_mut()
            .insert(id, ObserverEntry { observer, callback });
        Ok(ObserverId(id))
    }

    fn disconnect(&self, id: ObserverId) {
        let removed = self.observers.borrow_mut().remove(&id.0);
        if let Some(entry) = removed {
            entry.observer.disconnect();
            self.retired.borrow_mut().push(entry.callback);
        }
    }
}
