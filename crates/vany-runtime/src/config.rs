//! Runtime configuration from `VANY_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use vany_bus::DEFAULT_TOPIC;
use vany_gateway::DEFAULT_REQUEST_TIMEOUT;
use vany_node::{NodeConfig, DEFAULT_POLL_INTERVAL};
use vany_telemetry::parse_flag;
use vany_workers::{DEFAULT_SAMPLE_INTERVAL, MAX_SCAN_DURATION};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Where device scans come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerBackend {
    Simulated,
    Ble,
}

impl FromStr for ScannerBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(Self::Simulated),
            "ble" | "bluetooth" => Ok(Self::Ble),
            _ => Err(()),
        }
    }
}

/// Everything the `vany` binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bus topic shared by every node.
    pub topic: String,
    /// Node run-loop idle interval.
    pub poll_interval: Duration,
    /// HTTP/WebSocket listen address.
    pub listen_addr: SocketAddr,
    /// Session request timeout; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Battery sampling interval.
    pub sample_interval: Duration,
    /// Generate synthetic battery samples.
    pub simulate: bool,
    /// Directory for telemetry logs.
    pub data_dir: PathBuf,
    /// Longest scan a client may request.
    pub max_scan: Duration,
    pub scanner: ScannerBackend,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            simulate: true,
            data_dir: PathBuf::from("./db"),
            max_scan: MAX_SCAN_DURATION,
            scanner: ScannerBackend::Simulated,
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VANY_TOPIC` | `vany` |
    /// | `VANY_POLL_INTERVAL_MS` | `1` |
    /// | `VANY_LISTEN_ADDR` | `127.0.0.1:5000` |
    /// | `VANY_REQUEST_TIMEOUT_SECS` | `30` (`0` disables) |
    /// | `VANY_SAMPLE_INTERVAL_SECS` | `3` |
    /// | `VANY_SIMULATE` | `true` |
    /// | `VANY_DATA_DIR` | `./db` |
    /// | `VANY_MAX_SCAN_SECS` | `30` |
    /// | `VANY_SCANNER` | `simulated` (or `ble`) |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(topic) = lookup("VANY_TOPIC") {
            config.topic = topic;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "VANY_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(addr) = parse_var::<SocketAddr>(&lookup, "VANY_LISTEN_ADDR")? {
            config.listen_addr = addr;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "VANY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "VANY_SAMPLE_INTERVAL_SECS")? {
            config.sample_interval = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup("VANY_SIMULATE") {
            config.simulate = parse_flag(&flag);
        }
        if let Some(dir) = lookup("VANY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "VANY_MAX_SCAN_SECS")? {
            config.max_scan = Duration::from_secs(secs);
        }
        if let Some(backend) = parse_var::<ScannerBackend>(&lookup, "VANY_SCANNER")? {
            config.scanner = backend;
        }

        Ok(config)
    }

    /// Reject settings the nodes cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.is_empty() {
            return Err(ConfigError::Validation("topic must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Validation("poll interval must be non-zero".into()));
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Validation("sample interval must be non-zero".into()));
        }
        if self.max_scan.is_zero() {
            return Err(ConfigError::Validation("max scan must be non-zero".into()));
        }
        Ok(())
    }

    /// Node settings derived from this config.
    #[must_use]
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::with_topic(self.topic.clone()).poll_interval(self.poll_interval)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
