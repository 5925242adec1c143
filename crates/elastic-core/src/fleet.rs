//! Multi-container lifecycle
//!
//! [`ElasticBounce`] finds every element matching the container selector,
//! attaches an [`ElasticScroll`] to each, and keeps the set in step with the
//! document through a mutation subscription.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::capability::FLEET_REQUIREMENTS;
use crate::config::{
    BounceOptions, BounceOptionsPatch, DISABLE_ATTRIBUTE, DISABLE_VALUE, STYLE_ELEMENT_ID,
};
use crate::controller::ElasticScroll;
use crate::host::{MutationRecord, ObserverId, Platform};
use crate::status::Status;
use crate::Error;

/// Element-keyed association compared by identity
///
/// Host element handles are not hashable in general (a JS object reference
/// only offers `===`), so lookups are linear.
struct Registry<E, V> {
    entries: Vec<(E, V)>,
}

impl<E: PartialEq, V> Registry<E, V> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn get(&self, key: &E) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn contains(&self, key: &E) -> bool {
        self.get(key).is_some()
    }

    /// Insert unless `key` is present; returns whether it was inserted
    fn insert(&mut self, key: E, value: V) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    fn remove(&mut self, key: &E) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    fn keys(&self) -> impl Iterator<Item = &E> {
        self.entries.iter().map(|(k, _)| k)
    }

    fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    fn drain(&mut self) -> Vec<(E, V)> {
        std::mem::take(&mut self.entries)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Fleet<P: Platform> {
    platform: Rc<P>,
    defaults: BounceOptions,
    options: BounceOptions,
    instances: Registry<P::Element, ElasticScroll<P>>,
    observer: Option<ObserverId>,
    /// This fleet inserted the shared style node and removes it on destroy
    owns_style_sheet: bool,
    initialized: bool,
    status: Status,
}

impl<P: Platform> Fleet<P> {
    #[inline]
    fn is_active(&self) -> bool {
        self.initialized && self.status.is_supported()
    }

    fn fail(&mut self, context: &str, error: Error) {
        warn!("{}: {}", context, error);
        self.status.record(&error);
    }

    fn install_style_sheet(&mut self) {
        if self.platform.style_sheet_exists(STYLE_ELEMENT_ID) {
            return;
        }
        match self
            .platform
            .insert_style_sheet(STYLE_ELEMENT_ID, &self.options.style_sheet())
        {
            Ok(()) => {
                self.owns_style_sheet = true;
                debug!("Installed style sheet #{}", STYLE_ELEMENT_ID);
            }
            Err(e) => self.fail("Failed to install style sheet", e),
        }
    }

    fn refresh_style_sheet(&mut self) {
        let css = self.options.style_sheet();
        let result = if self.platform.style_sheet_exists(STYLE_ELEMENT_ID) {
            self.platform.set_style_sheet_text(STYLE_ELEMENT_ID, &css)
        } else {
            let inserted = self.platform.insert_style_sheet(STYLE_ELEMENT_ID, &css);
            self.owns_style_sheet |= inserted.is_ok();
            inserted
        };
        if let Err(e) = result {
            self.fail("Failed to refresh style sheet", e);
        }
    }

    fn is_opted_out(&mut self, element: &P::Element) -> bool {
        match self.platform.attribute(element, DISABLE_ATTRIBUTE) {
            Ok(value) => value.as_deref() == Some(DISABLE_VALUE),
            Err(e) => {
                self.fail("Failed to read container attribute", e);
                true
            }
        }
    }

    fn init_container(&mut self, element: &P::Element) {
        if self.instances.contains(element) || self.is_opted_out(element) {
            return;
        }
        let controller = ElasticScroll::new(
            Rc::clone(&self.platform),
            element.clone(),
            self.options.scroll.clone(),
        );
        if controller.status().is_degraded() {
            let error = Error::Other(format!(
                "controller for {:?} is {}",
                element,
                controller.status()
            ));
            self.status.record(&error);
        }
        self.instances.insert(element.clone(), controller);
        debug!("Registered container {:?} ({} total)", element, self.instances.len());
    }

    fn destroy_container(&mut self, element: &P::Element) {
        if let Some(controller) = self.instances.remove(element) {
            controller.destroy();
            debug!("Released container {:?} ({} left)", element, self.instances.len());
        }
    }

    /// Initialize every matching element not yet registered
    fn scan(&mut self) {
        match self.platform.query_all(&self.options.container) {
            Ok(elements) => {
                for element in &elements {
                    self.init_container(element);
                }
            }
            Err(e) => self.fail("Failed to scan for containers", e),
        }
    }

    fn handle_mutations(&mut self, records: &[MutationRecord<P::Element>]) {
        if !self.is_active() {
            return;
        }
        let selector = self.options.container.clone();
        for record in records {
            for node in &record.added {
                match self.platform.matches(node, &selector) {
                    Ok(true) => self.init_container(node),
                    Ok(false) => {}
                    Err(e) => self.fail("Failed to match added node", e),
                }
                match self.platform.query_all_within(node, &selector) {
                    Ok(found) => {
                        for element in &found {
                            self.init_container(element);
                        }
                    }
                    Err(e) => self.fail("Failed to scan added subtree", e),
                }
            }

            for node in &record.removed {
                let gone: Vec<P::Element> = self
                    .instances
                    .keys()
                    .filter(|registered| self.platform.contains(node, registered))
                    .cloned()
                    .collect();
                for element in &gone {
                    self.destroy_container(element);
                }
            }
        }
        debug!(
            "Processed {} mutation records, {} containers managed",
            records.len(),
            self.instances.len()
        );
    }
}

/// Manager for every elastic container in a document
///
/// Cloning yields another handle to the same fleet.
pub struct ElasticBounce<P: Platform> {
    inner: Rc<RefCell<Fleet<P>>>,
}

impl<P: Platform> Clone for ElasticBounce<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Platform> ElasticBounce<P> {
    /// Uninitialized fleet using the built-in defaults
    pub fn new(platform: Rc<P>) -> Self {
        Self::with_defaults(platform, BounceOptions::default())
    }

    /// Uninitialized fleet whose [`init`](Self::init) merges onto `defaults`
    pub fn with_defaults(platform: Rc<P>, defaults: BounceOptions) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Fleet {
                platform,
                options: defaults.clone(),
                defaults,
                instances: Registry::new(),
                observer: None,
                owns_style_sheet: false,
                initialized: false,
                status: Status::Idle,
            })),
        }
    }

    /// Merge `patch` onto the defaults, install the shared styles and start
    /// managing containers
    ///
    /// Calling it again replaces the previous observer.
    pub fn init(&self, patch: &BounceOptionsPatch) {
        let mut fleet = self.inner.borrow_mut();

        let missing = fleet.platform.capabilities().missing(FLEET_REQUIREMENTS);
        if !missing.is_empty() {
            fleet.fail("Elastic bounce unavailable", Error::Unsupported(missing));
            return;
        }

        let options = fleet.defaults.merged(patch);
        if let Err(e) = options.validate() {
            fleet.fail("Rejected elastic bounce options", e);
            return;
        }

        if let Some(id) = fleet.observer.take() {
            fleet.platform.disconnect(id);
        }
        fleet.options = options;
        fleet.initialized = true;
        fleet.status = Status::Ready;
        fleet.install_style_sheet();

        let weak = Rc::downgrade(&self.inner);
        let observed = fleet.platform.observe(Box::new(
            move |records: &[MutationRecord<P::Element>]| {
                if let Some(fleet) = weak.upgrade() {
                    fleet.borrow_mut().handle_mutations(records);
                }
            },
        ));
        match observed {
            Ok(id) => fleet.observer = Some(id),
            Err(e) => fleet.fail("Failed to observe document", e),
        }

        fleet.scan();
        debug!(
            "Elastic bounce initialized for '{}' with {} containers",
            fleet.options.container,
            fleet.instances.len()
        );
    }

    /// Pick up matching containers that are not managed yet
    pub fn update(&self) {
        let mut fleet = self.inner.borrow_mut();
        if fleet.is_active() {
            fleet.scan();
        }
    }

    /// Merge `patch` into the global options and refresh the shared styles
    ///
    /// Running controllers keep their options unless `propagate_to_existing`
    /// is set; new containers always use the merged options.
    pub fn update_options(&self, patch: &BounceOptionsPatch) {
        let mut fleet = self.inner.borrow_mut();
        if !fleet.is_active() {
            return;
        }

        let merged = fleet.options.merged(patch);
        if let Err(e) = merged.validate() {
            fleet.fail("Rejected option update", e);
            return;
        }
        fleet.options = merged;
        fleet.refresh_style_sheet();

        if fleet.options.propagate_to_existing && !patch.scroll.is_empty() {
            for controller in fleet.instances.values() {
                controller.update_options(&patch.scroll);
            }
        }
        fleet.scan();
    }

    /// Stop observing, tear down every controller and remove the shared styles
    pub fn destroy(&self) {
        let mut fleet = self.inner.borrow_mut();
        if !fleet.initialized {
            return;
        }
        if let Some(id) = fleet.observer.take() {
            fleet.platform.disconnect(id);
        }
        let snapshot = fleet.instances.drain();
        for (_, controller) in &snapshot {
            controller.destroy();
        }
        if fleet.owns_style_sheet {
            fleet.owns_style_sheet = false;
            if let Err(e) = fleet.platform.remove_style_sheet(STYLE_ELEMENT_ID) {
                fleet.fail("Failed to remove style sheet", e);
            }
        }
        fleet.initialized = false;
        fleet.status = Status::Destroyed;
        debug!("Elastic bounce destroyed, released {} containers", snapshot.len());
    }

    /// Clear the opt-out marker and manage `element`
    pub fn enable_elastic(&self, element: &P::Element) {
        let mut fleet = self.inner.borrow_mut();
        if !fleet.is_active() {
            return;
        }
        if let Err(e) = fleet.platform.remove_attribute(element, DISABLE_ATTRIBUTE) {
            fleet.fail("Failed to enable container", e);
            return;
        }
        fleet.init_container(element);
    }

    /// Mark `element` as opted out and release its controller
    pub fn disable_elastic(&self, element: &P::Element) {
        let mut fleet = self.inner.borrow_mut();
        if !fleet.is_active() {
            return;
        }
        if let Err(e) = fleet
            .platform
            .set_attribute(element, DISABLE_ATTRIBUTE, DISABLE_VALUE)
        {
            fleet.fail("Failed to disable container", e);
            return;
        }
        fleet.destroy_container(element);
    }

    /// Whether `element` currently has a controller
    pub fn is_enabled(&self, element: &P::Element) -> bool {
        self.inner.borrow().instances.contains(element)
    }

    pub fn contains(&self, element: &P::Element) -> bool {
        self.is_enabled(element)
    }

    pub fn controller(&self, element: &P::Element) -> Option<ElasticScroll<P>> {
        self.inner.borrow().instances.get(element).cloned()
    }

    pub fn elements(&self) -> Vec<P::Element> {
        self.inner.borrow().instances.keys().cloned().collect()
    }

    pub fn instance_count(&self) -> usize {
        self.inner.borrow().instances.len()
    }

    pub fn options(&self) -> BounceOptions {
        self.inner.borrow().options.clone()
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().status.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.borrow().initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Capability};
    use crate::config::{ScrollOptionsPatch, CONTENT_CLASS};
    use crate::headless::{HeadlessDom, HostOperation, NodeId};
    use crate::host::Dom;
    use crate::timing::FRAME_WINDOW;

    fn container(dom: &HeadlessDom, parent: NodeId) -> NodeId {
        dom.element("div")
            .class("elastic-container")
            .scrollable(0.0, 1200.0, 400.0)
            .append_to(parent)
    }

    fn started(dom: &Rc<HeadlessDom>) -> ElasticBounce<HeadlessDom> {
        let fleet = ElasticBounce::new(Rc::clone(dom));
        fleet.init(&BounceOptionsPatch::default());
        fleet
    }

    #[test]
    fn test_discovery_creates_one_controller_per_container() {
        let dom = Rc::new(HeadlessDom::new());
        let a = container(&dom, dom.body());
        let b = container(&dom, dom.body());
        let opted_out = dom
            .element("div")
            .class("elastic-container")
            .attr("data-elastic", "false")
            .append_to(dom.body());
        let unrelated = dom.element("div").class("other").append_to(dom.body());

        let fleet = started(&dom);
        assert!(fleet.is_initialized());
        assert_eq!(fleet.status(), Status::Ready);
        assert_eq!(fleet.instance_count(), 2);
        assert!(fleet.contains(&a) && fleet.contains(&b));
        assert!(!fleet.contains(&opted_out) && !fleet.contains(&unrelated));
        assert!(dom.has_class(a, CONTENT_CLASS));

        let css = dom.style_sheet(STYLE_ELEMENT_ID).unwrap();
        assert!(css.contains(".elastic-bounce-content"));
        assert!(css.contains("transition: transform 300ms ease-out;"));

        // re-init keeps a single observer and never doubles controllers
        fleet.init(&BounceOptionsPatch::default());
        assert_eq!(fleet.instance_count(), 2);
        assert_eq!(dom.observer_count(), 1);
        assert_eq!(dom.listener_count(a), 4);
        assert_eq!(dom.style_sheet_count(), 1);
    }

    #[test]
    fn test_identical_containers_are_distinct() {
        let dom = Rc::new(HeadlessDom::new());
        let a = container(&dom, dom.body());
        let b = container(&dom, dom.body());
        let fleet = started(&dom);
        fleet.disable_elastic(&a);
        assert!(!fleet.contains(&a));
        assert!(fleet.contains(&b));
    }

    #[test]
    fn test_added_containers_are_picked_up() {
        let dom = Rc::new(HeadlessDom::new());
        let fleet = started(&dom);
        assert_eq!(fleet.instance_count(), 0);

        let direct = container(&dom, dom.body());
        let wrapper = dom.element("section").build();
        let nested = container(&dom, wrapper);
        dom.append_child(dom.body(), wrapper);
        dom.flush_mutations();

        assert_eq!(fleet.instance_count(), 2);
        assert!(fleet.contains(&direct));
        assert!(fleet.contains(&nested));
    }

    #[test]
    fn test_removed_containers_are_destroyed() {
        let dom = Rc::new(HeadlessDom::new());
        let a = container(&dom, dom.body());
        let wrapper = dom.element("section").append_to(dom.body());
        let nested = container(&dom, wrapper);
        let fleet = started(&dom);
        assert_eq!(fleet.instance_count(), 2);

        let controller = fleet.controller(&a).unwrap();
        dom.remove(a);
        assert_eq!(fleet.instance_count(), 2);
        dom.flush_mutations();
        assert_eq!(fleet.instance_count(), 1);
        assert!(controller.is_destroyed());
        assert_eq!(dom.listener_count(a), 0);

        dom.remove(wrapper);
        dom.flush_mutations();
        assert_eq!(fleet.instance_count(), 0);
        assert_eq!(dom.listener_count(nested), 0);
        assert!(!dom.has_class(nested, CONTENT_CLASS));
    }

    #[test]
    fn test_disable_then_enable() {
        let dom = Rc::new(HeadlessDom::new());
        let el = container(&dom, dom.body());
        let fleet = started(&dom);

        fleet.disable_elastic(&el);
        assert!(!fleet.is_enabled(&el));
        assert_eq!(dom.attribute(&el, "data-elastic").unwrap().as_deref(), Some("false"));
        assert_eq!(dom.listener_count(el), 0);

        // a rescan honours the opt-out
        fleet.update();
        assert!(!fleet.is_enabled(&el));

        fleet.enable_elastic(&el);
        assert!(fleet.is_enabled(&el));
        assert_eq!(dom.attribute(&el, "data-elastic").unwrap(), None);
        assert_eq!(dom.listener_count(el), 4);

        // disabling something unmanaged only sets the marker
        let stray = dom.element("div").append_to(dom.body());
        fleet.disable_elastic(&stray);
        assert_eq!(fleet.instance_count(), 1);
    }

    #[test]
    fn test_update_rescans() {
        let dom = Rc::new(HeadlessDom::new());
        let el = dom
            .element("div")
            .class("elastic-container")
            .attr("data-elastic", "false")
            .scrollable(0.0, 1200.0, 400.0)
            .append_to(dom.body());
        let fleet = started(&dom);
        assert_eq!(fleet.instance_count(), 0);

        // attribute edits produce no child-list records
        dom.remove_attribute(&el, "data-elastic").unwrap();
        dom.flush_mutations();
        assert_eq!(fleet.instance_count(), 0);

        fleet.update();
        assert_eq!(fleet.instance_count(), 1);
        fleet.update();
        assert_eq!(fleet.instance_count(), 1);
    }

    #[test]
    fn test_update_options_without_propagation() {
        let dom = Rc::new(HeadlessDom::new());
        let old = container(&dom, dom.body());
        let fleet = started(&dom);

        fleet.update_options(&BounceOptionsPatch {
            scroll: ScrollOptionsPatch {
                max_stretch: Some(0.3),
                animation_duration: Some(500),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(fleet.options().scroll.max_stretch, 0.3);
        assert_eq!(fleet.controller(&old).unwrap().options().max_stretch, 0.15);
        let css = dom.style_sheet(STYLE_ELEMENT_ID).unwrap();
        assert!(css.contains("transform 500ms ease-out"));
        assert_eq!(dom.style_sheet_count(), 1);

        let fresh = container(&dom, dom.body());
        dom.flush_mutations();
        assert_eq!(fleet.controller(&fresh).unwrap().options().max_stretch, 0.3);
    }

    #[test]
    fn test_update_options_with_propagation() {
        let dom = Rc::new(HeadlessDom::new());
        let el = container(&dom, dom.body());
        let fleet = started(&dom);

        fleet.update_options(&BounceOptionsPatch {
            propagate_to_existing: Some(true),
            scroll: ScrollOptionsPatch {
                max_stretch: Some(0.05),
                ..Default::default()
            },
            ..Default::default()
        });
        let controller = fleet.controller(&el).unwrap();
        assert_eq!(controller.options().max_stretch, 0.05);

        dom.touch_start(el, 0.0);
        dom.touch_move(el, 1000.0);
        dom.advance(FRAME_WINDOW);
        assert!((dom.rendered_scale(el) - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_shared_style_sheet_outlives_second_fleet() {
        let dom = Rc::new(HeadlessDom::new());
        container(&dom, dom.body());
        let first = started(&dom);
        let second = ElasticBounce::new(Rc::clone(&dom));
        second.init(&BounceOptionsPatch {
            container: Some("#none".to_string()),
            ..Default::default()
        });
        assert_eq!(dom.style_sheet_count(), 1);

        second.destroy();
        assert!(dom.style_sheet_exists(STYLE_ELEMENT_ID));
        assert_eq!(first.status(), Status::Ready);

        first.destroy();
        assert!(!dom.style_sheet_exists(STYLE_ELEMENT_ID));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let dom = Rc::new(HeadlessDom::new());
        container(&dom, dom.body());
        let fleet = started(&dom);

        fleet.update_options(&BounceOptionsPatch {
            scroll: ScrollOptionsPatch {
                resistance: Some(f64::NAN),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(fleet.options().scroll.resistance, 0.3);
        assert!(fleet.status().is_degraded());

        let other = ElasticBounce::new(Rc::new(HeadlessDom::new()));
        other.init(&BounceOptionsPatch {
            container: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(!other.is_initialized());
        assert!(other.status().is_degraded());
    }

    #[test]
    fn test_destroy_releases_everything() {
        let dom = Rc::new(HeadlessDom::new());
        let a = container(&dom, dom.body());
        container(&dom, dom.body());
        let fleet = started(&dom);

        dom.touch_start(a, 0.0);
        dom.touch_move(a, 50.0);
        fleet.destroy();

        assert_eq!(fleet.status(), Status::Destroyed);
        assert_eq!(fleet.instance_count(), 0);
        assert_eq!(dom.total_listener_count(), 0);
        assert_eq!(dom.observer_count(), 0);
        assert_eq!(dom.pending_frame_count(), 0);
        assert!(!dom.style_sheet_exists(STYLE_ELEMENT_ID));

        fleet.destroy();
        container(&dom, dom.body());
        dom.flush_mutations();
        assert_eq!(fleet.instance_count(), 0);

        // reusable after teardown
        fleet.init(&BounceOptionsPatch::default());
        assert_eq!(fleet.instance_count(), 3);
    }

    #[test]
    fn test_destroy_before_init() {
        let dom = Rc::new(HeadlessDom::new());
        let fleet = ElasticBounce::new(Rc::clone(&dom));
        fleet.destroy();
        fleet.update();
        assert_eq!(fleet.status(), Status::Idle);
    }

    #[test]
    fn test_unsupported_runtime() {
        let dom = Rc::new(HeadlessDom::with_capabilities(
            Capabilities::all().without(Capability::MutationObserver),
        ));
        let el = container(&dom, dom.body());
        let fleet = started(&dom);

        assert!(!fleet.status().is_supported());
        assert!(!fleet.is_initialized());
        assert_eq!(fleet.instance_count(), 0);
        assert_eq!(dom.style_sheet_count(), 0);

        fleet.enable_elastic(&el);
        fleet.update();
        fleet.destroy();
        assert_eq!(fleet.instance_count(), 0);

        // a later init on a capable runtime starts normally
        dom.set_capabilities(Capabilities::all());
        fleet.init(&BounceOptionsPatch::default());
        assert_eq!(fleet.status(), Status::Ready);
        assert!(fleet.is_enabled(&el));
    }

    #[test]
    fn test_custom_selector_and_defaults() {
        let dom = Rc::new(HeadlessDom::new());
        let list = dom
            .element("ul")
            .id("feed")
            .scrollable(0.0, 900.0, 300.0)
            .append_to(dom.body());
        let defaults = BounceOptions {
            container: "#feed".to_string(),
            ..Default::default()
        };
        let fleet = ElasticBounce::with_defaults(Rc::clone(&dom), defaults);
        fleet.init(&BounceOptionsPatch::default());
        assert!(fleet.contains(&list));
        assert_eq!(fleet.elements(), vec![list]);
    }

    #[test]
    fn test_style_sheet_failure_degrades() {
        let dom = Rc::new(HeadlessDom::new());
        container(&dom, dom.body());
        dom.fail_operation(HostOperation::StyleSheet);
        let fleet = started(&dom);
        assert!(fleet.is_initialized());
        assert!(fleet.status().is_degraded());
        assert_eq!(fleet.instance_count(), 1);
    }

    #[test]
    fn test_gesture_through_fleet() {
        let dom = Rc::new(HeadlessDom::new());
        let el = container(&dom, dom.body());
        let _fleet = started(&dom);

        dom.touch_start(el, 0.0);
        assert!(dom.touch_move(el, 100.0).default_prevented);
        dom.advance(FRAME_WINDOW);
        assert!(dom.rendered_scale(el) > 1.0);
    }
}
