//! # Vany Workers
//!
//! Worker nodes. Each registers one capability next to the base `hello`,
//! calls its collaborator synchronously and replies through `make_response`
//! so the hash and sid survive.
//!
//! | Node | Capability | Request data | Response data |
//! |------|------------|--------------|---------------|
//! | `TeslaBattery` | `voltage` | `{}` | `{volts, amps, ts}` or `null` |
//! | `BluetoothScanner` | `btscan` | `{time: seconds}` | `{discovered_devices: [{addr, rssi, name}]}` |
//!
//! ## Architecture
//!
//! - `domain/` - Samples, devices, request parsing
//! - `ports/` - `TelemetrySink`, `DeviceScanner`
//! - `adapters/` - In-memory and JSON-lines sinks, simulated and BLE scanners

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod battery;
pub mod domain;
pub mod error;
pub mod ports;
pub mod scanner;

pub use adapters::{InMemoryTelemetrySink, JsonLinesTelemetrySink, SimulatedScanner};
#[cfg(feature = "ble")]
pub use adapters::BtleplugScanner;
pub use battery::{BatteryConfig, BatteryMonitor, BATTERY_NODE_NAME, DEFAULT_SAMPLE_INTERVAL};
pub use domain::{simulated_sample, BatterySample, DiscoveredDevice, ScanRequest};
pub use error::{ScanError, SinkError};
pub use ports::{DeviceScanner, TelemetrySink};
pub use scanner::{
    BluetoothScanner, ScannerConfig, DEFAULT_SCAN_DURATION, MAX_SCAN_DURATION, SCANNER_NODE_NAME,
};
