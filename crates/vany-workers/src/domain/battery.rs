use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One battery telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySample {
    pub ts: DateTime<Utc>,
    pub volts: f64,
    pub amps: f64,
}

/// Synthetic reading for `now`: a slow sine around 10 V, amps at half volts.
#[must_use]
pub fn simulated_sample(now: DateTime<Utc>) -> BatterySample {
    let secs = now.timestamp_millis() as f64 / 1000.0;
    let volts = (secs / 10.0).sin() + 10.0;
    BatterySample {
        ts: now,
        volts,
        amps: volts / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_simulated_sample_at_epoch() {
        let sample = simulated_sample(Utc.timestamp_opt(0, 0).unwrap());
        assert!((sample.volts - 10.0).abs() < 1e-9);
        assert!((sample.amps - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_simulated_sample_bounds() {
        for secs in [1, 17, 1_700_000_000, 1_700_000_123] {
            let sample = simulated_sample(Utc.timestamp_opt(secs, 0).unwrap());
            assert!((9.0..=11.0).contains(&sample.volts));
            assert!((sample.amps * 2.0 - sample.volts).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sample_json_shape() {
        let sample = simulated_sample(Utc.timestamp_opt(0, 0).unwrap());
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["ts"], "1970-01-01T00:00:00Z");
        assert!(value["volts"].is_f64());
        assert!(value["amps"].is_f64());
    }
}
