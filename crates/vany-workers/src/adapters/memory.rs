use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::BatterySample;
use crate::ports::TelemetrySink;
use crate::SinkError;

/// Telemetry kept in memory.
///
/// Clones share storage, so a test can keep one clone and hand the other to
/// a worker.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTelemetrySink {
    samples: Arc<Mutex<Vec<BatterySample>>>,
}

impl InMemoryTelemetrySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sample recorded so far, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<BatterySample> {
        self.samples.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn append(&mut self, sample: &BatterySample) -> Result<(), SinkError> {
        self.samples.lock().push(sample.clone());
        Ok(())
    }

    fn latest(&self) -> Option<BatterySample> {
        self.samples.lock().last().cloned()
    }
}
