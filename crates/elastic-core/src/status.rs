//! Inspectable health of a controller or fleet.
//!
//! Public operations never return errors to the host page. Instead each
//! failure is logged and folded into a `Status` the caller can query.

use std::fmt;

use crate::capability::Capability;
use crate::error::Error;

/// Maximum number of failures retained while degraded
pub const MAX_RECORDED_FAILURES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// Not initialized yet
    #[default]
    Idle,
    /// Running with no recorded failures
    Ready,
    /// Running, but some operations failed
    Degraded { failures: Vec<String> },
    /// Runtime lacks required features; every operation is a no-op
    Unsupported { missing: Vec<Capability> },
    /// Torn down
    Destroyed,
}

impl Status {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Status::Unsupported { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Status::Degraded { .. })
    }

    /// Failures recorded since the last reset (empty unless degraded)
    pub fn failures(&self) -> &[String] {
        match self {
            Status::Degraded { failures } => failures,
            _ => &[],
        }
    }

    /// Fold an operation failure into the status
    ///
    /// Unsupported is sticky and swallows further failures.
    pub fn record(&mut self, error: &Error) {
        if let Error::Unsupported(missing) = error {
            *self = Status::Unsupported {
                missing: missing.clone(),
            };
            return;
        }
        match self {
            Status::Unsupported { .. } => {}
            Status::Degraded { failures } => {
                if failures.len() >= MAX_RECORDED_FAILURES {
                    failures.remove(0);
                }
                failures.push(error.to_string());
            }
            _ => {
                *self = Status::Degraded {
                    failures: vec![error.to_string()],
                };
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "idle"),
            Status::Ready => write!(f, "ready"),
            Status::Degraded { failures } => {
                write!(f, "degraded ({} failures)", failures.len())
            }
            Status::Unsupported { missing } => {
                let names: Vec<_> = missing.iter().map(|c| c.name()).collect();
                write!(f, "unsupported ({})", names.join(", "))
            }
            Status::Destroyed => write!(f, "destroyed"),
        }
    }
}
