pub mod capability;
pub mod config;
pub mod controller;
pub mod easing;
pub mod error;
pub mod fleet;
pub mod headless;
pub mod host;
pub mod status;
pub mod stretch;
pub mod timing;

pub use capability::{Capabilities, Capability};
pub use config::{BounceOptions, BounceOptionsPatch, ElasticConfig, ScrollOptions, ScrollOptionsPatch};
pub use controller::ElasticScroll;
pub use easing::Easing;
pub use error::{Error, Result};
pub use fleet::ElasticBounce;
pub use host::{Dom, MutationSource, Platform, Scheduler};
pub use status::Status;
pub use stretch::StretchFrame;
