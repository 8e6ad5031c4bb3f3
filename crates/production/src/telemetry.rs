//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: default_filter.to_string(),
            reason: e.to_string(),
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
}
