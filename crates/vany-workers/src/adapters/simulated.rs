use std::time::Duration;
use tracing::debug;

use crate::domain::DiscoveredDevice;
use crate::ports::DeviceScanner;
use crate::ScanError;

/// Scanner returning a fixed device list.
#[derive(Debug, Clone)]
pub struct SimulatedScanner {
    devices: Vec<DiscoveredDevice>,
    /// Sleep for the requested duration like a real scan would.
    realtime: bool,
    scan_count: u64,
    last_duration: Option<Duration>,
}

impl SimulatedScanner {
    /// Scanner reporting `devices` immediately.
    pub fn new(devices: Vec<DiscoveredDevice>) -> Self {
        Self {
            devices,
            realtime: false,
            scan_count: 0,
            last_duration: None,
        }
    }

    /// A small, plausible neighbourhood.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(vec![
            DiscoveredDevice::new("AA:BB:CC:DD:EE:01", Some(-48), Some("Model 3".into())),
            DiscoveredDevice::new("AA:BB:CC:DD:EE:02", Some(-71), None),
            DiscoveredDevice::new("AA:BB:CC:DD:EE:03", Some(-85), Some("Headphones".into())),
        ])
    }

    /// Block for the requested duration on every scan.
    #[must_use]
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Scans performed so far.
    #[must_use]
    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }

    /// Duration of the most recent scan.
    #[must_use]
    pub fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }
}

impl DeviceScanner for SimulatedScanner {
    fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredDevice>, ScanError> {
        self.scan_count += 1;
        self.last_duration = Some(duration);
        if self.realtime {
            std::thread::sleep(duration);
        }
        debug!(?duration, devices = self.devices.len(), "Simulated scan finished");
        Ok(self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_configured_devices() {
        let device = DiscoveredDevice::new("AA:BB", Some(-60), Some("Device1".into()));
        let mut scanner = SimulatedScanner::new(vec![device.clone()]);

        assert_eq!(scanner.scan(Duration::from_secs(3)).unwrap(), vec![device]);
        assert_eq!(scanner.scan_count(), 1);
        assert_eq!(scanner.last_duration(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_history_does_not_grow() {
        let mut scanner = SimulatedScanner::demo();
        for secs in 1..=500u64 {
            scanner.scan(Duration::from_millis(secs)).unwrap();
        }
        assert_eq!(scanner.scan_count(), 500);
        assert_eq!(scanner.last_duration(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_realtime_blocks() {
        let mut scanner = SimulatedScanner::demo().realtime(true);
        let start = std::time::Instant::now();
        scanner.scan(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
