//! # Bluetooth Scanner
//!
//! Answers `btscan` by running a duration-bounded scan. The scan blocks this
//! node for its whole duration; other nodes are unaffected.

use serde_json::json;
use std::time::Duration;
use tracing::info;
use vany_bus::{Capability, Message};
use vany_node::{Actor, DispatchTable, HandlerError, NodeContext};
use vany_telemetry::{BT_DEVICES_DISCOVERED, BT_SCANS};

use crate::domain::ScanRequest;
use crate::ports::DeviceScanner;

/// Node name the scanner publishes under.
pub const SCANNER_NODE_NAME: &str = "BluetoothScanner";

/// Scan length when a request does not give one.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(3);

/// Longest scan a request may ask for.
pub const MAX_SCAN_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub name: String,
    pub default_duration: Duration,
    pub max_duration: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            name: SCANNER_NODE_NAME.to_string(),
            default_duration: DEFAULT_SCAN_DURATION,
            max_duration: MAX_SCAN_DURATION,
        }
    }
}

/// Device scanning worker.
pub struct BluetoothScanner {
    config: ScannerConfig,
    scanner: Box<dyn DeviceScanner>,
}

impl BluetoothScanner {
    pub fn new(config: ScannerConfig, scanner: impl DeviceScanner + 'static) -> Self {
        Self {
            config,
            scanner: Box::new(scanner),
        }
    }

    fn on_btscan(&mut self, message: &Message, ctx: &NodeContext) -> Result<(), HandlerError> {
        let request = ScanRequest::from_data(
            &message.data,
            self.config.default_duration,
            self.config.max_duration,
        )
        .map_err(|e| {
            BT_SCANS.with_label_values(&["rejected"]).inc();
            HandlerError::InvalidData(e.to_string())
        })?;

        info!(
            node = %self.config.name,
            hash = %message.hash,
            sid = ?message.sid,
            duration = ?request.duration,
            "Starting device scan"
        );

        let devices = self.scanner.scan(request.duration).map_err(|e| {
            BT_SCANS.with_label_values(&["failed"]).inc();
            HandlerError::Collaborator(e.to_string())
        })?;

        BT_SCANS.with_label_values(&["ok"]).inc();
        BT_DEVICES_DISCOVERED.inc_by(devices.len() as f64);

        ctx.reply(message, json!({ "discovered_devices": devices }))?;
        Ok(())
    }
}

impl Actor for BluetoothScanner {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn register(table: &mut DispatchTable<Self>) {
        table.register(Capability::BtScan, Self::on_btscan);
    }
}
