//! Process wiring: one bus, the worker nodes and the gateway.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use vany_bus::InMemoryBus;
use vany_gateway::{Gateway, GatewayConfig, GatewayHandle, SessionRegistry};
use vany_node::{Node, NodeError, NodeHandle};
use vany_workers::{
    BatteryConfig, BatteryMonitor, BluetoothScanner, DeviceScanner, JsonLinesTelemetrySink,
    ScanError, ScannerConfig, SimulatedScanner, SinkError, TelemetrySink, BATTERY_NODE_NAME,
};

use crate::config::{RuntimeConfig, ScannerBackend};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("Failed to open telemetry store: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to create scanner: {0}")]
    Scan(#[from] ScanError),

    #[error("BLE scanning requested but this build has no `ble` feature")]
    BleUnavailable,
}

/// A running set of nodes sharing one in-memory bus.
pub struct VanyRuntime {
    bus: Arc<InMemoryBus>,
    sessions: Arc<SessionRegistry>,
    gateway: GatewayHandle,
    nodes: Vec<NodeHandle>,
}

impl VanyRuntime {
    /// Start with the scanner and telemetry store named by `config`.
    pub fn start(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let sink = JsonLinesTelemetrySink::open(&config.data_dir, BATTERY_NODE_NAME)?;
        let scanner = build_scanner(config.scanner)?;
        Self::start_with(config, sink, scanner)
    }

    /// Start with caller-supplied collaborators.
    pub fn start_with(
        config: &RuntimeConfig,
        sink: impl TelemetrySink + 'static,
        scanner: impl DeviceScanner + 'static,
    ) -> Result<Self, RuntimeError> {
        let bus = Arc::new(InMemoryBus::new());
        let sessions = Arc::new(SessionRegistry::new());
        let node_config = config.node_config();
        let mut nodes = Vec::with_capacity(3);

        let battery = BatteryMonitor::new(
            BatteryConfig {
                simulate: config.simulate,
                sample_interval: config.sample_interval,
                ..BatteryConfig::default()
            },
            sink,
        );
        nodes.push(Node::spawn(battery, bus.clone(), node_config.clone())?);

        let scanner = BluetoothScanner::new(
            ScannerConfig {
                max_duration: config.max_scan,
                default_duration: ScannerConfig::default().default_duration.min(config.max_scan),
                ..ScannerConfig::default()
            },
            scanner,
        );
        nodes.push(Node::spawn(scanner, bus.clone(), node_config.clone())?);

        let (gateway, handle) = Gateway::new(
            GatewayConfig {
                request_timeout: config.request_timeout,
                ..GatewayConfig::default()
            },
            sessions.clone(),
        );
        nodes.push(Node::spawn(gateway, bus.clone(), node_config)?);

        info!(
            topic = %config.topic,
            nodes = ?nodes.iter().map(NodeHandle::name).collect::<Vec<_>>(),
            "Runtime started"
        );

        Ok(Self {
            bus,
            sessions,
            gateway: handle,
            nodes,
        })
    }

    #[must_use]
    pub fn bus(&self) -> Arc<InMemoryBus> {
        self.bus.clone()
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    #[must_use]
    pub fn gateway(&self) -> GatewayHandle {
        self.gateway.clone()
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Stop every node, wait for them and close the bus.
    ///
    /// Blocks while node threads finish their current iteration.
    pub fn shutdown(self) -> Result<(), RuntimeError> {
        info!("Initiating shutdown");
        for node in &self.nodes {
            node.stop();
        }

        let mut first_error = None;
        for node in self.nodes {
            let name = node.name().to_string();
            if let Err(e) = node.join() {
                warn!(node = %name, error = %e, "Node did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        self.bus.close();
        info!("Shutdown complete");

        first_error.map_or(Ok(()), |e| Err(e.into()))
    }
}

fn build_scanner(backend: ScannerBackend) -> Result<Box<dyn DeviceScanner>, RuntimeError> {
    match backend {
        ScannerBackend::Simulated => Ok(Box::new(SimulatedScanner::demo().realtime(true))),
        #[cfg(feature = "ble")]
        ScannerBackend::Ble => Ok(Box::new(vany_workers::BtleplugScanner::new()?)),
        #[cfg(not(feature = "ble"))]
        ScannerBackend::Ble => Err(RuntimeError::BleUnavailable),
    }
}
