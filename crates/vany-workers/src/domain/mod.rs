//! Domain values produced by the workers.

mod battery;
mod device;

pub use battery::{simulated_sample, BatterySample};
pub use device::{DiscoveredDevice, ScanRequest};
