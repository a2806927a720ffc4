//! Error types for worker collaborators.

use std::time::Duration;
use thiserror::Error;

/// Telemetry storage failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Telemetry storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Device scan failures.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan duration {requested:?} outside (0, {max:?}]")]
    InvalidDuration { requested: Duration, max: Duration },

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("Bluetooth adapter error: {0}")]
    Adapter(String),

    #[error("Failed to start scan runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
