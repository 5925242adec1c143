//! Browser binding
//!
//! ```js
//! import init, { ElasticBounce, initLogging } from "./elastic_web.js";
//!
//! await init();
//! initLogging("debug");
//! const bounce = new ElasticBounce();
//! bounce.init({ container: ".feed", maxStretch: 0.2 });
//! ```

pub mod logging;
pub mod platform;

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::Element;

use elastic_core::{BounceOptionsPatch, ElasticBounce};

pub use platform::WebPlatform;

/// Parse an optional JS options object into a patch
fn patch_from_js(value: &JsValue) -> Result<BounceOptionsPatch, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(BounceOptionsPatch::default());
    }
    let json = js_sys::JSON::stringify(value)?;
    let json = String::from(json);
    BounceOptionsPatch::from_json(&json).map_err(to_js_error)
}

fn to_js_error(e: elastic_core::Error) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

/// Fleet manager exported to JavaScript as `ElasticBounce`
#[wasm_bindgen(js_name = ElasticBounce)]
pub struct ElasticBounceHandle {
    fleet: ElasticBounce<WebPlatform>,
}

#[wasm_bindgen(js_class = ElasticBounce)]
impl ElasticBounceHandle {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ElasticBounceHandle, JsValue> {
        let platform = WebPlatform::new().map_err(to_js_error)?;
        Ok(Self {
            fleet: ElasticBounce::new(Rc::new(platform)),
        })
    }

    /// Start managing containers, optionally with an options object
    pub fn init(&self, options: JsValue) -> Result<(), JsValue> {
        let patch = patch_from_js(&options)?;
        self.fleet.init(&patch);
        Ok(())
    }

    /// Pick up containers added since the last scan
    pub fn update(&self) {
        self.fleet.update();
    }

    #[wasm_bindgen(js_name = updateOptions)]
    pub fn update_options(&self, options: JsValue) -> Result<(), JsValue> {
        let patch = patch_from_js(&options)?;
        self.fleet.update_options(&patch);
        Ok(())
    }

    pub fn destroy(&self) {
        self.fleet.destroy();
    }

    #[wasm_bindgen(js_name = enableElastic)]
    pub fn enable_elastic(&self, element: &Element) {
        self.fleet.enable_elastic(element);
    }

    #[wasm_bindgen(js_name = disableElastic)]
    pub fn disable_elastic(&self, element: &Element) {
        self.fleet.disable_elastic(element);
    }

    #[wasm_bindgen(js_name = isEnabled)]
    pub fn is_enabled(&self, element: &Element) -> bool {
        self.fleet.is_enabled(element)
    }

    #[wasm_bindgen(js_name = instanceCount)]
    pub fn instance_count(&self) -> usize {
        self.fleet.instance_count()
    }

    /// `idle`, `ready`, `degraded (n failures)`, `unsupported (...)` or `destroyed`
    pub fn status(&self) -> String {
        self.fleet.status().to_string()
    }
}
