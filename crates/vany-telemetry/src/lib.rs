//! # Vany Telemetry
//!
//! Structured logging and Prometheus metrics shared by every vany node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vany_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // Nodes log and count from here on
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VANY_SERVICE_NAME` | `vany` | Service name in log lines |
//! | `VANY_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `VANY_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `VANY_JSON_LOGS` | `false` | JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, BATTERY_SAMPLES,
    BT_DEVICES_DISCOVERED, BT_SCANS, BUS_DECODE_FAILURES, BUS_MESSAGES_PUBLISHED,
    BUS_MESSAGES_RECEIVED, GATEWAY_DELIVERY_FAILURES, GATEWAY_PENDING_REQUESTS,
    GATEWAY_REQUESTS_FORWARDED, GATEWAY_REQUEST_TIMEOUTS, GATEWAY_RESPONSES_DELIVERED,
    GATEWAY_SESSIONS, HANDLER_DURATION, HANDLER_INVOCATIONS, NODES_RUNNING,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard holding the metrics handle; keep it for the lifetime of
/// the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// Metrics handle for exposition endpoints.
    #[must_use]
    pub fn metrics(&self) -> MetricsHandle {
        self.metrics.clone()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Span carrying a node name, used around a node's run loop.
///
/// ```rust,ignore
/// let _span = vany_telemetry::node_span!("run", node = "Gateway").entered();
/// ```
#[macro_export]
macro_rules! node_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
