//! # Battery Monitor
//!
//! Samples (simulated) battery telemetry on a fixed interval and answers
//! `voltage` with the latest reading.

use chrono::Utc;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vany_bus::{Capability, Message};
use vany_node::{Actor, DispatchTable, HandlerError, NodeContext};
use vany_telemetry::BATTERY_SAMPLES;

use crate::domain::simulated_sample;
use crate::ports::TelemetrySink;

/// Node name the battery monitor publishes under.
pub const BATTERY_NODE_NAME: &str = "TeslaBattery";

/// Default time between simulated samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryConfig {
    pub name: String,
    /// Generate synthetic samples. Without it the monitor only answers
    /// `voltage` from whatever the sink already holds.
    pub simulate: bool,
    pub sample_interval: Duration,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            name: BATTERY_NODE_NAME.to_string(),
            simulate: true,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// Battery telemetry worker.
pub struct BatteryMonitor {
    config: BatteryConfig,
    sink: Box<dyn TelemetrySink>,
    last_sample: Option<Instant>,
}

impl BatteryMonitor {
    pub fn new(config: BatteryConfig, sink: impl TelemetrySink + 'static) -> Self {
        Self {
            config,
            sink: Box::new(sink),
            last_sample: None,
        }
    }

    fn sample_due(&self, now: Instant) -> bool {
        self.config.simulate
            && self
                .last_sample
                .map_or(true, |last| now.duration_since(last) >= self.config.sample_interval)
    }

    fn record_sample(&mut self) {
        let sample = simulated_sample(Utc::now());
        match self.sink.append(&sample) {
            Ok(()) => {
                BATTERY_SAMPLES.inc();
                debug!(node = %self.config.name, volts = sample.volts, amps = sample.amps, "Recorded battery sample");
            }
            Err(e) => warn!(node = %self.config.name, error = %e, "Failed to record battery sample"),
        }
    }

    fn on_voltage(&mut self, message: &Message, ctx: &NodeContext) -> Result<(), HandlerError> {
        let data = match self.sink.latest() {
            Some(sample) => json!({
                "volts": sample.volts,
                "amps": sample.amps,
                "ts": sample.ts,
            }),
            None => serde_json::Value::Null,
        };
        ctx.reply(message, data)?;
        Ok(())
    }
}

impl Actor for BatteryMonitor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn register(table: &mut DispatchTable<Self>) {
        table.register(Capability::Voltage, Self::on_voltage);
    }

    fn tick(&mut self, _ctx: &NodeContext) {
        let now = Instant::now();
        if self.sample_due(now) {
            // Throttled on attempt, not on success.
            self.last_sample = Some(now);
            self.record_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTelemetrySink;

    #[test]
    fn test_sample_due() {
        let sink = InMemoryTelemetrySink::new();
        let mut monitor = BatteryMonitor::new(BatteryConfig::default(), sink);
        let now = Instant::now();

        assert!(monitor.sample_due(now));
        monitor.last_sample = Some(now);
        assert!(!monitor.sample_due(now + Duration::from_secs(1)));
        assert!(monitor.sample_due(now + Duration::from_secs(3)));
    }

    #[test]
    fn test_no_samples_without_simulation() {
        let config = BatteryConfig {
            simulate: false,
            ..BatteryConfig::default()
        };
        let monitor = BatteryMonitor::new(config, InMemoryTelemetrySink::new());
        assert!(!monitor.sample_due(Instant::now()));
    }
}
