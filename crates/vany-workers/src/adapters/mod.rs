//! Adapters for the worker ports.

mod jsonl;
mod memory;
mod simulated;

#[cfg(feature = "ble")]
mod ble;

pub use jsonl::JsonLinesTelemetrySink;
pub use memory::InMemoryTelemetrySink;
pub use simulated::SimulatedScanner;

#[cfg(feature = "ble")]
pub use ble::BtleplugScanner;
