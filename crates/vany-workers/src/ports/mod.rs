//! Outbound Ports (Driven Ports)
//!
//! Collaborators the workers call synchronously from inside a handler or
//! tick. Each worker owns its collaborator exclusively.

use std::time::Duration;

use crate::domain::{BatterySample, DiscoveredDevice};
use crate::{ScanError, SinkError};

/// Append-only store for battery telemetry.
pub trait TelemetrySink: Send {
    /// Persist one sample.
    fn append(&mut self, sample: &BatterySample) -> Result<(), SinkError>;

    /// Most recent sample, if any were recorded.
    fn latest(&self) -> Option<BatterySample>;
}

/// Duration-bounded device discovery.
///
/// Blocks the calling node for up to `duration`.
pub trait DeviceScanner: Send {
    fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError>;
}

impl<S: DeviceScanner + ?Sized> DeviceScanner for Box<S> {
    fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        (**self).scan(duration)
    }
}
