//! In-memory host
//!
//! `HeadlessDom` implements every host trait without a browser: a small node
//! tree with inline styles and scroll geometry, bubbling touch dispatch, a
//! virtual clock driving frames and timers, and queued mutation records. The
//! test suites and the CLI simulator both run the real engine against it.
//!
//! Frames run on a fixed cadence (16ms by default). Timers and frames fire in
//! due-time order while [`HeadlessDom::advance`] moves the clock forward.

mod selector;
mod simulate;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::capability::Capabilities;
use crate::easing::Easing;
use crate::host::{
    Callback, Dom, EventOutcome, FrameId, ListenerId, ListenerOptions, MutationHandler,
    MutationRecord, MutationSource, ObserverId, Overflow, Scheduler, ScrollMetrics, TimerId,
    TouchHandler, TouchInput, TouchKind,
};
use crate::stretch::parse_scale_y;
use crate::timing::{lerp, progress, FRAME_WINDOW};
use crate::{Error, Result};

pub use selector::{Matchable, Selector};
pub use simulate::{
    ContainerSpec, FrameSample, GestureAction, GestureScript, GestureStep, Simulation,
    SimulationReport,
};

/// Handle to a headless node; equality is identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Host operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostOperation {
    Query,
    Attribute,
    ClassList,
    Style,
    ComputedStyle,
    StyleSheet,
    Listen,
    Frame,
    Timer,
    Observe,
}

/// Result of dispatching one touch event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchResult {
    pub listeners_invoked: usize,
    pub default_prevented: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTransition {
    from: f64,
    to: f64,
    start: Duration,
    duration: Duration,
    easing: Easing,
}

#[derive(Debug)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    overflow_y: Overflow,
    metrics: ScrollMetrics,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transition: Option<ActiveTransition>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            overflow_y: Overflow::Visible,
            metrics: ScrollMetrics::default(),
            parent: None,
            children: Vec::new(),
            transition: None,
        }
    }
}

impl Matchable for Node {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

struct ListenerEntry {
    node: NodeId,
    kind: TouchKind,
    options: ListenerOptions,
    handler: Rc<RefCell<TouchHandler<NodeId>>>,
}

/// Subscriber plus the records queued since it subscribed
struct ObserverEntry {
    handler: Rc<RefCell<MutationHandler<NodeId>>>,
    pending: Vec<MutationRecord<NodeId>>,
}

struct State {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    style_sheets: BTreeMap<String, String>,
    listeners: BTreeMap<u64, ListenerEntry>,
    frames: BTreeMap<u64, (Duration, Callback)>,
    timers: BTreeMap<u64, (Duration, Callback)>,
    observers: BTreeMap<u64, ObserverEntry>,
    clock: Duration,
    frame_interval: Duration,
    next_id: u64,
    capabilities: Capabilities,
    failing: BTreeSet<HostOperation>,
    touch_cancelable: bool,
}

impl State {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: HostOperation) -> Result<()> {
        if self.failing.contains(&op) {
            Err(Error::Dom(format!("injected failure in {:?}", op)))
        } else {
            Ok(())
        }
    }

    /// Only observers subscribed at the time of the change see it
    fn queue_mutation(&mut self, record: MutationRecord<NodeId>) {
        for entry in self.observers.values_mut() {
            entry.pending.push(record.clone());
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    /// Descendants of `root` in document order, `root` excluded
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(root).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            let was_connected = self.is_connected(id);
            self.node_mut(parent).children.retain(|c| *c != id);
            self.node_mut(id).parent = None;
            if was_connected {
                self.queue_mutation(MutationRecord {
                    added: Vec::new(),
                    removed: vec![id],
                });
            }
        }
    }

    fn rendered_scale(&self, id: NodeId) -> f64 {
        let node = self.node(id);
        if let Some(t) = node.transition {
            let p = progress(self.clock.saturating_sub(t.start), t.duration);
            if p < 1.0 {
                return lerp(t.from, t.to, t.easing.apply(p));
            }
        }
        node.style
            .get("transform")
            .and_then(|t| parse_scale_y(t))
            .unwrap_or(1.0)
    }

    fn next_frame_due(&self) -> Duration {
        let interval = self.frame_interval.as_nanos().max(1);
        let ticks = self.clock.as_nanos() / interval + 1;
        Duration::from_nanos((ticks * interval) as u64)
    }
}

/// Parse `transform 300ms ease-out` into duration and curve
fn parse_transition(value: &str) -> Option<(Duration, Easing)> {
    let mut parts = value.split_whitespace();
    let property = parts.next()?;
    if property != "transform" && property != "all" {
        return None;
    }
    let duration = parts.next()?;
    let duration = if let Some(ms) = duration.strip_suffix("ms") {
        Duration::from_secs_f64(ms.parse::<f64>().ok()? / 1000.0)
    } else if let Some(s) = duration.strip_suffix('s') {
        Duration::from_secs_f64(s.parse::<f64>().ok()?)
    } else {
        return None;
    };
    let rest: Vec<&str> = parts.collect();
    let easing = if rest.is_empty() {
        Easing::EASE
    } else {
        Easing::parse_or_default(&rest.join(" "))
    };
    Some((duration, easing))
}

/// In-memory document implementing [`Dom`], [`Scheduler`] and [`MutationSource`]
pub struct HeadlessDom {
    state: RefCell<State>,
}

impl Default for HeadlessDom {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDom {
    /// Empty document with `html`, `head` and `body`
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let mut nodes = vec![Node::new("html"), Node::new("head"), Node::new("body")];
        let (root, head, body) = (NodeId(0), NodeId(1), NodeId(2));
        nodes[0].children = vec![head, body];
        nodes[1].parent = Some(root);
        nodes[2].parent = Some(root);

        Self {
            state: RefCell::new(State {
                nodes,
                root,
                head,
                body,
                style_sheets: BTreeMap::new(),
                listeners: BTreeMap::new(),
                frames: BTreeMap::new(),
                timers: BTreeMap::new(),
                observers: BTreeMap::new(),
                clock: Duration::ZERO,
                frame_interval: FRAME_WINDOW,
                next_id: 0,
                capabilities,
                failing: BTreeSet::new(),
                touch_cancelable: true,
            }),
        }
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.state.borrow_mut().capabilities = capabilities;
    }

    /// Change the frame cadence (default 16ms)
    pub fn set_frame_interval(&self, interval: Duration) {
        self.state.borrow_mut().frame_interval = interval.max(Duration::from_millis(1));
    }

    /// Make every subsequent `op` fail until [`HeadlessDom::clear_failures`]
    pub fn fail_operation(&self, op: HostOperation) {
        self.state.borrow_mut().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failing.clear();
    }

    /// Whether dispatched touch events report `cancelable`
    pub fn set_touch_cancelable(&self, cancelable: bool) {
        self.state.borrow_mut().touch_cancelable = cancelable;
    }

    pub fn root(&self) -> NodeId {
        self.state.borrow().root
    }

    pub fn head(&self) -> NodeId {
        self.state.borrow().head
    }

    pub fn body(&self) -> NodeId {
        self.state.borrow().body
    }

    // ----- tree editing -----

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId(state.nodes.len() as u32);
        state.nodes.push(Node::new(tag));
        id
    }

    /// Start building a detached element
    pub fn element(&self, tag: &str) -> ElementBuilder<'_> {
        ElementBuilder {
            dom: self,
            id: self.create_element(tag),
        }
    }

    /// Move `child` under `parent`, queueing mutation records for connected trees
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.borrow_mut();
        if state.contains(child, parent) {
            debug!("Refusing to append {:?} into its own subtree", child);
            return;
        }
        state.detach(child);
        state.node_mut(parent).children.push(child);
        state.node_mut(child).parent = Some(parent);
        if state.is_connected(child) {
            state.queue_mutation(MutationRecord {
                added: vec![child],
                removed: Vec::new(),
            });
        }
    }

    /// Detach `node` (and its subtree) from its parent
    pub fn remove(&self, node: NodeId) {
        self.state.borrow_mut().detach(node);
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.state.borrow().is_connected(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state.borrow().node(node).children.clone()
    }

    pub fn set_metrics(&self, node: NodeId, metrics: ScrollMetrics) {
        self.state.borrow_mut().node_mut(node).metrics = metrics;
    }

    pub fn set_scroll_top(&self, node: NodeId, scroll_top: f64) {
        self.state.borrow_mut().node_mut(node).metrics.scroll_top = scroll_top;
    }

    /// Set the `overflow-y` a style sheet would give the node
    pub fn set_overflow(&self, node: NodeId, overflow: Overflow) {
        self.state.borrow_mut().node_mut(node).overflow_y = overflow;
    }

    // ----- inspection -----

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.state.borrow().node(node).has_class(class)
    }

    /// Every inline style property currently set on the node
    pub fn inline_styles(&self, node: NodeId) -> BTreeMap<String, String> {
        self.state.borrow().node(node).style.clone()
    }

    /// Visual vertical scale, following any running transition
    pub fn rendered_scale(&self, node: NodeId) -> f64 {
        self.state.borrow().rendered_scale(node)
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.state
            .borrow()
            .listeners
            .values()
            .filter(|l| l.node == node)
            .count()
    }

    pub fn total_listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Listener options registered on `node` for `kind`
    pub fn listener_options(&self, node: NodeId, kind: TouchKind) -> Vec<ListenerOptions> {
        self.state
            .borrow()
            .listeners
            .values()
            .filter(|l| l.node == node && l.kind == kind)
            .map(|l| l.options)
            .collect()
    }

    pub fn pending_frame_count(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn pending_timer_count(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    pub fn style_sheet(&self, id: &str) -> Option<String> {
        self.state.borrow().style_sheets.get(id).cloned()
    }

    pub fn style_sheet_count(&self) -> usize {
        self.state.borrow().style_sheets.len()
    }

    // ----- touch dispatch -----

    pub fn touch_start(&self, target: NodeId, client_y: f64) -> DispatchResult {
        self.dispatch_touch(target, TouchKind::Start, Some(client_y))
    }

    pub fn touch_move(&self, target: NodeId, client_y: f64) -> DispatchResult {
        self.dispatch_touch(target, TouchKind::Move, Some(client_y))
    }

    pub fn touch_end(&self, target: NodeId) -> DispatchResult {
        self.dispatch_touch(target, TouchKind::End, None)
    }

    pub fn touch_cancel(&self, target: NodeId) -> DispatchResult {
        self.dispatch_touch(target, TouchKind::Cancel, None)
    }

    /// Dispatch a touch event at `target`, bubbling to the root
    pub fn dispatch_touch(
        &self,
        target: NodeId,
        kind: TouchKind,
        client_y: Option<f64>,
    ) -> DispatchResult {
        let (input, entries) = {
            let state = self.state.borrow();
            let input = TouchInput {
                kind,
                target: Some(target),
                client_y,
                cancelable: state.touch_cancelable,
            };

            let mut path = Vec::new();
            let mut current = Some(target);
            while let Some(id) = current {
                path.push(id);
                current = state.node(id).parent;
            }

            let mut entries = Vec::new();
            for node in &path {
                for (id, listener) in &state.listeners {
                    if listener.node == *node && listener.kind == kind {
                        entries.push((*id, listener.options.passive, Rc::clone(&listener.handler)));
                    }
                }
            }
            (input, entries)
        };

        let mut result = DispatchResult::default();
        for (id, passive, handler) in entries {
            if !self.state.borrow().listeners.contains_key(&id) {
                continue;
            }
            let outcome = (&mut *handler.borrow_mut())(&input);
            result.listeners_invoked += 1;
            if outcome == EventOutcome::PreventDefault && input.cancelable && !passive {
                result.default_prevented = true;
            }
        }
        self.flush_mutations();
        result
    }

    // ----- virtual clock -----

    /// Move the clock without running anything
    pub fn advance_clock(&self, by: Duration) {
        self.state.borrow_mut().clock += by;
    }

    /// Move the clock forward, running due timers and frames in order
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.flush_mutations();
        while let Some(task) = self.take_next_task(target) {
            task();
            self.flush_mutations();
        }
        let mut state = self.state.borrow_mut();
        if state.clock < target {
            state.clock = target;
        }
    }

    /// Advance by `count` frame intervals
    pub fn advance_frames(&self, count: u32) {
        let interval = self.state.borrow().frame_interval;
        self.advance(interval * count);
    }

    fn take_next_task(&self, limit: Duration) -> Option<Callback> {
        let mut state = self.state.borrow_mut();
        let timer = state.timers.iter().map(|(id, (due, _))| (*due, *id)).min();
        let frame = state.frames.iter().map(|(id, (due, _))| (*due, *id)).min();

        // timers win ties with frames
        let (due, id, is_timer) = match (timer, frame) {
            (Some((t_due, t_id)), Some((f_due, _))) if t_due <= f_due => (t_due, t_id, true),
            (_, Some((f_due, f_id))) => (f_due, f_id, false),
            (Some((t_due, t_id)), None) => (t_due, t_id, true),
            (None, None) => return None,
        };
        if due > limit {
            return None;
        }

        let callback = if is_timer {
            state.timers.remove(&id)
        } else {
            state.frames.remove(&id)
        };
        if state.clock < due {
            state.clock = due;
        }
        callback.map(|(_, cb)| cb)
    }

    /// Deliver queued mutation records to observers; returns records delivered
    pub fn flush_mutations(&self) -> usize {
        let mut delivered = 0;
        loop {
            let batches: Vec<_> = {
                let mut state = self.state.borrow_mut();
                state
                    .observers
                    .iter_mut()
                    .filter(|(_, entry)| !entry.pending.is_empty())
                    .map(|(id, entry)| {
                        (*id, Rc::clone(&entry.handler), std::mem::take(&mut entry.pending))
                    })
                    .collect()
            };
            if batches.is_empty() {
                break;
            }
            for (id, handler, records) in batches {
                if !self.state.borrow().observers.contains_key(&id) {
                    continue;
                }
                (&mut *handler.borrow_mut())(&records);
                delivered += records.len();
            }
        }
        delivered
    }
}

impl Dom for HeadlessDom {
    type Element = NodeId;

    fn capabilities(&self) -> Capabilities {
        self.state.borrow().capabilities
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let state = self.state.borrow();
        state.check(HostOperation::Query)?;
        let selector = Selector::parse(selector)?;
        let root = state.root;
        let mut matches = Vec::new();
        if selector.matches(state.node(root)) {
            matches.push(root);
        }
        matches.extend(
            state
                .descendants(root)
                .into_iter()
                .filter(|id| selector.matches(state.node(*id))),
        );
        Ok(matches)
    }

    fn query_all_within(&self, root: &NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let state = self.state.borrow();
        state.check(HostOperation::Query)?;
        let selector = Selector::parse(selector)?;
        Ok(state
            .descendants(*root)
            .into_iter()
            .filter(|id| selector.matches(state.node(*id)))
            .collect())
    }

    fn matches(&self, element: &NodeId, selector: &str) -> Result<bool> {
        let state = self.state.borrow();
        state.check(HostOperation::Query)?;
        Ok(Selector::parse(selector)?.matches(state.node(*element)))
    }

    fn closest(&self, element: &NodeId, selector: &str) -> Result<Option<NodeId>> {
        let state = self.state.borrow();
        state.check(HostOperation::Query)?;
        let selector = Selector::parse(selector)?;
        let mut current = Some(*element);
        while let Some(id) = current {
            if selector.matches(state.node(id)) {
                return Ok(Some(id));
            }
            current = state.node(id).parent;
        }
        Ok(None)
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.state.borrow().node(*element).parent
    }

    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        self.state.borrow().contains(*ancestor, *node)
    }

    fn is_body(&self, element: &NodeId) -> bool {
        *element == self.state.borrow().body
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Result<Option<String>> {
        let state = self.state.borrow();
        state.check(HostOperation::Attribute)?;
        Ok(state.node(*element).attributes.get(name).cloned())
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Attribute)?;
        state
            .node_mut(*element)
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, element: &NodeId, name: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Attribute)?;
        state.node_mut(*element).attributes.remove(name);
        Ok(())
    }

    fn add_class(&self, element: &NodeId, class: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::ClassList)?;
        let node = state.node_mut(*element);
        if !node.has_class(class) {
            node.classes.push(class.to_string());
        }
        Ok(())
    }

    fn remove_class(&self, element: &NodeId, class: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::ClassList)?;
        state.node_mut(*element).classes.retain(|c| c != class);
        Ok(())
    }

    fn style(&self, element: &NodeId, property: &str) -> Option<String> {
        self.state
            .borrow()
            .node(*element)
            .style
            .get(property)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set_style(&self, element: &NodeId, property: &str, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Style)?;
        if value.is_empty() {
            drop(state);
            return self.remove_style(element, property);
        }

        match property {
            "transform" => {
                let from = state.rendered_scale(*element);
                let clock = state.clock;
                let node = state.node_mut(*element);
                let to = parse_scale_y(value).unwrap_or(1.0);
                node.transition = node
                    .style
                    .get("transition")
                    .and_then(|t| parse_transition(t))
                    .filter(|(duration, _)| !duration.is_zero())
                    .map(|(duration, easing)| ActiveTransition {
                        from,
                        to,
                        start: clock,
                        duration,
                        easing,
                    });
            }
            "transition" if parse_transition(value).is_none() => {
                state.node_mut(*element).transition = None;
            }
            _ => {}
        }
        state
            .node_mut(*element)
            .style
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn remove_style(&self, element: &NodeId, property: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Style)?;
        let node = state.node_mut(*element);
        node.style.remove(property);
        if property == "transition" || property == "transform" {
            node.transition = None;
        }
        Ok(())
    }

    fn overflow_y(&self, element: &NodeId) -> Result<Overflow> {
        let state = self.state.borrow();
        state.check(HostOperation::ComputedStyle)?;
        let node = state.node(*element);
        Ok(node
            .style
            .get("overflow-y")
            .map(|v| Overflow::parse(v))
            .unwrap_or(node.overflow_y))
    }

    fn scroll_metrics(&self, element: &NodeId) -> ScrollMetrics {
        self.state.borrow().node(*element).metrics
    }

    fn style_sheet_exists(&self, id: &str) -> bool {
        self.state.borrow().style_sheets.contains_key(id)
    }

    fn insert_style_sheet(&self, id: &str, css: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::StyleSheet)?;
        state.style_sheets.insert(id.to_string(), css.to_string());
        Ok(())
    }

    fn set_style_sheet_text(&self, id: &str, css: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::StyleSheet)?;
        match state.style_sheets.get_mut(id) {
            Some(text) => {
                *text = css.to_string();
                Ok(())
            }
            None => Err(Error::Dom(format!("no style sheet with id '{}'", id))),
        }
    }

    fn remove_style_sheet(&self, id: &str) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::StyleSheet)?;
        Ok(state.style_sheets.remove(id).is_some())
    }

    fn listen(
        &self,
        element: &NodeId,
        kind: TouchKind,
        options: ListenerOptions,
        handler: TouchHandler<NodeId>,
    ) -> Result<ListenerId> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Listen)?;
        let id = state.next_id();
        state.listeners.insert(
            id,
            ListenerEntry {
                node: *element,
                kind,
                options,
                handler: Rc::new(RefCell::new(handler)),
            },
        );
        Ok(ListenerId(id))
    }

    fn unlisten(&self, id: ListenerId) {
        // the handler may own closures that call back into the host on drop
        let removed = self.state.borrow_mut().listeners.remove(&id.0);
        drop(removed);
    }
}

impl Scheduler for HeadlessDom {
    fn request_frame(&self, callback: Callback) -> Result<FrameId> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Frame)?;
        let id = state.next_id();
        let due = state.next_frame_due();
        state.frames.insert(id, (due, callback));
        Ok(FrameId(id))
    }

    fn cancel_frame(&self, id: FrameId) {
        let removed = self.state.borrow_mut().frames.remove(&id.0);
        drop(removed);
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> Result<TimerId> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Timer)?;
        let id = state.next_id();
        let due = state.clock + delay;
        state.timers.insert(id, (due, callback));
        Ok(TimerId(id))
    }

    fn clear_timeout(&self, id: TimerId) {
        let removed = self.state.borrow_mut().timers.remove(&id.0);
        drop(removed);
    }

    fn now(&self) -> Duration {
        self.state.borrow().clock
    }
}

impl MutationSource for HeadlessDom {
    fn observe(&self, handler: MutationHandler<NodeId>) -> Result<ObserverId> {
        let mut state = self.state.borrow_mut();
        state.check(HostOperation::Observe)?;
        let id = state.next_id();
        state.observers.insert(
            id,
            ObserverEntry {
                handler: Rc::new(RefCell::new(handler)),
                pending: Vec::new(),
            },
        );
        Ok(ObserverId(id))
    }

    fn disconnect(&self, id: ObserverId) {
        let removed = self.state.borrow_mut().observers.remove(&id.0);
        drop(removed);
    }
}

/// Fluent construction of headless elements
pub struct ElementBuilder<'a> {
    dom: &'a HeadlessDom,
    id: NodeId,
}

impl<'a> ElementBuilder<'a> {
    pub fn class(self, class: &str) -> Self {
        self.dom
            .state
            .borrow_mut()
            .node_mut(self.id)
            .classes
            .push(class.to_string());
        self
    }

    pub fn attr(self, name: &str, value: &str) -> Self {
        self.dom
            .state
            .borrow_mut()
            .node_mut(self.id)
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn overflow(self, overflow: Overflow) -> Self {
        self.dom.set_overflow(self.id, overflow);
        self
    }

    /// Scroll geometry: offset, content height, viewport height
    pub fn metrics(self, scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        self.dom.set_metrics(
            self.id,
            ScrollMetrics::new(scroll_top, scroll_height, client_height),
        );
        self
    }

    /// Scrollable box: `overflow-y: auto` with the given geometry
    pub fn scrollable(self, scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        self.overflow(Overflow::Auto)
            .metrics(scroll_top, scroll_height, client_height)
    }

    pub fn append_to(self, parent: NodeId) -> NodeId {
        self.dom.append_child(parent, self.id);
        self.id
    }

    /// Finish without attaching
    pub fn build(self) -> NodeId {
        self.id
    }
}
