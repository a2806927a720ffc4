//! Prometheus metrics for vany nodes.
//!
//! All metrics follow the naming convention: `vany_<component>_<metric>_<unit>`
//!
//! Node-level metrics carry a `node` label so one process hosting several
//! nodes still reports them separately.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Envelopes published, by node
    pub static ref BUS_MESSAGES_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("vany_bus_messages_published_total", "Envelopes published to the bus"),
        &["node"]
    ).expect("metric creation failed");

    /// Envelopes received, by node
    pub static ref BUS_MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("vany_bus_messages_received_total", "Envelopes received from the bus"),
        &["node"]
    ).expect("metric creation failed");

    /// Payloads that failed to decode, by node
    pub static ref BUS_DECODE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("vany_bus_decode_failures_total", "Bus payloads that failed to decode"),
        &["node"]
    ).expect("metric creation failed");

    // =========================================================================
    // NODE METRICS
    // =========================================================================

    /// Nodes currently inside their run loop
    pub static ref NODES_RUNNING: Gauge = Gauge::new(
        "vany_nodes_running",
        "Number of nodes currently running"
    ).expect("metric creation failed");

    /// Handler invocations by node, message type and outcome
    pub static ref HANDLER_INVOCATIONS: CounterVec = CounterVec::new(
        Opts::new("vany_node_handler_invocations_total", "Handler invocations"),
        &["node", "type", "outcome"]  // outcome: ok/error
    ).expect("metric creation failed");

    /// Handler latency by message type
    pub static ref HANDLER_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "vany_node_handler_duration_seconds",
            "Time spent inside a capability handler"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["type"]
    ).expect("metric creation failed");

    // =========================================================================
    // GATEWAY METRICS
    // =========================================================================

    /// Client requests forwarded to the bus
    pub static ref GATEWAY_REQUESTS_FORWARDED: Counter = Counter::new(
        "vany_gateway_requests_forwarded_total",
        "Client requests forwarded to the bus"
    ).expect("metric creation failed");

    /// Responses delivered to clients, by mode
    pub static ref GATEWAY_RESPONSES_DELIVERED: CounterVec = CounterVec::new(
        Opts::new("vany_gateway_responses_delivered_total", "Responses delivered to clients"),
        &["mode"]  // mode: session/broadcast
    ).expect("metric creation failed");

    /// Deliveries the client transport rejected
    pub static ref GATEWAY_DELIVERY_FAILURES: Counter = Counter::new(
        "vany_gateway_delivery_failures_total",
        "Responses the client transport failed to deliver"
    ).expect("metric creation failed");

    /// Session requests that saw no response in time
    pub static ref GATEWAY_REQUEST_TIMEOUTS: Counter = Counter::new(
        "vany_gateway_request_timeouts_total",
        "Session requests that expired without a response"
    ).expect("metric creation failed");

    /// Session requests awaiting their first response
    pub static ref GATEWAY_PENDING_REQUESTS: Gauge = Gauge::new(
        "vany_gateway_pending_requests",
        "Session requests awaiting a response"
    ).expect("metric creation failed");

    /// Connected client sessions
    pub static ref GATEWAY_SESSIONS: Gauge = Gauge::new(
        "vany_gateway_sessions",
        "Client sessions currently connected"
    ).expect("metric creation failed");

    // =========================================================================
    // WORKER METRICS
    // =========================================================================

    /// Battery telemetry samples taken
    pub static ref BATTERY_SAMPLES: Counter = Counter::new(
        "vany_battery_samples_total",
        "Battery telemetry samples recorded"
    ).expect("metric creation failed");

    /// Bluetooth scans performed, by outcome
    pub static ref BT_SCANS: CounterVec = CounterVec::new(
        Opts::new("vany_bt_scans_total", "Bluetooth scans performed"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Devices reported by Bluetooth scans
    pub static ref BT_DEVICES_DISCOVERED: Counter = Counter::new(
        "vany_bt_devices_discovered_total",
        "Devices reported across all Bluetooth scans"
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics were registered with.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_registry(&self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bus
        Box::new(BUS_MESSAGES_PUBLISHED.clone()),
        Box::new(BUS_MESSAGES_RECEIVED.clone()),
        Box::new(BUS_DECODE_FAILURES.clone()),
        // Node
        Box::new(NODES_RUNNING.clone()),
        Box::new(HANDLER_INVOCATIONS.clone()),
        Box::new(HANDLER_DURATION.clone()),
        // Gateway
        Box::new(GATEWAY_REQUESTS_FORWARDED.clone()),
        Box::new(GATEWAY_RESPONSES_DELIVERED.clone()),
        Box::new(GATEWAY_DELIVERY_FAILURES.clone()),
        Box::new(GATEWAY_REQUEST_TIMEOUTS.clone()),
        Box::new(GATEWAY_PENDING_REQUESTS.clone()),
        Box::new(GATEWAY_SESSIONS.clone()),
        // Workers
        Box::new(BATTERY_SAMPLES.clone()),
        Box::new(BT_SCANS.clone()),
        Box::new(BT_DEVICES_DISCOVERED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    encode_registry(&REGISTRY)
}

fn encode_registry(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }

    /// Start a timer on the handler-duration histogram for `kind`.
    pub fn handler(kind: &str) -> Self {
        Self::new(&HANDLER_DURATION.with_label_values(&[kind]))
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
