//! Tracing output routed to the browser console

use std::fmt::{self, Write as _};
use std::sync::OnceLock;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use wasm_bindgen::prelude::*;

const PREFIX: &str = "[elastic-bounce]";
const DEFAULT_LEVEL: &str = "warn";

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Collects the message and any structured fields of one event
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}

struct ConsoleLayer;

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let line = JsValue::from_str(&format!("{} {}{}", PREFIX, visitor.message, visitor.fields));

        match *event.metadata().level() {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }
}

/// Install the console subscriber once; later calls are ignored
pub fn init(level: Option<&str>) {
    if INSTALLED.get().is_some() {
        return;
    }
    let filter = EnvFilter::try_new(level.unwrap_or(DEFAULT_LEVEL))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    if tracing_subscriber::registry()
        .with(filter)
        .with(ConsoleLayer)
        .try_init()
        .is_ok()
    {
        let _ = INSTALLED.set(());
    }
}

/// Route engine diagnostics to the console at `level` (default `warn`)
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) {
    init(level.as_deref());
}
