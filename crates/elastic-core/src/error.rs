use thiserror::Error;

use crate::capability::Capability;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported runtime, missing: {}", format_missing(.0))]
    Unsupported(Vec<Capability>),

    #[error("DOM operation failed: {0}")]
    Dom(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Scheduling error: {0}")]
    Schedule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn format_missing(missing: &[Capability]) -> String {
    missing
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
