use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ScanError;

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub addr: String,
    /// Signal strength in dBm; `null` if the stack did not report one.
    pub rssi: Option<i16>,
    /// Advertised complete local name.
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(addr: impl Into<String>, rssi: Option<i16>, name: Option<String>) -> Self {
        Self {
            addr: addr.into(),
            rssi,
            name,
        }
    }
}

/// Parsed `btscan` request data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRequest {
    pub duration: Duration,
}

impl ScanRequest {
    /// Read `{time: seconds}` from request data.
    ///
    /// A missing or null `time` means `default`. Integer and fractional
    /// seconds are accepted; anything else, non-positive or above `max`, is
    /// rejected.
    pub fn from_data(
        data: &serde_json::Value,
        default: Duration,
        max: Duration,
    ) -> Result<Self, ScanError> {
        let duration = match data.get("time") {
            None | Some(serde_json::Value::Null) => default,
            Some(value) => {
                let secs = value.as_f64().filter(|s| s.is_finite() && *s > 0.0);
                match secs {
                    Some(secs) if secs <= max.as_secs_f64() => Duration::from_secs_f64(secs),
                    Some(secs) => {
                        return Err(ScanError::InvalidDuration {
                            requested: Duration::try_from_secs_f64(secs)
                                .unwrap_or(Duration::MAX),
                            max,
                        })
                    }
                    None => {
                        return Err(ScanError::InvalidDuration {
                            requested: Duration::ZERO,
                            max,
                        })
                    }
                }
            }
        };
        Ok(Self { duration })
    }
}
