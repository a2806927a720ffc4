//! Per-node configuration.

use std::time::Duration;
use vany_bus::DEFAULT_TOPIC;

use crate::NodeError;

/// Default idle time between run-loop iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Settings shared by every node regardless of role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Bus topic the node subscribes and publishes to.
    pub topic: String,

    /// Idle time at the end of each run-loop iteration. Upper bound on how
    /// long a queued message waits before the node sees it.
    pub poll_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl NodeConfig {
    /// Config on a non-default topic.
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Override the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reject settings the run loop cannot work with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.topic.is_empty() {
            return Err(NodeError::Config("topic must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(NodeError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}
