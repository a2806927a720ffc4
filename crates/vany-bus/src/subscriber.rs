//! # Bus Subscriber
//!
//! Non-blocking subscription handle. Nodes drain it with `poll()` once per
//! run-loop iteration.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed and every buffered payload has been consumed.
    #[error("Bus closed")]
    Closed,
}

/// A subscription to one topic.
///
/// Owned by exactly one node; dropping it unsubscribes.
pub struct Subscription {
    /// Topic this subscription listens on.
    topic: String,

    /// The broadcast receiver.
    receiver: broadcast::Receiver<Bytes>,

    /// Payloads skipped because this subscriber fell behind.
    lagged: u64,
}

impl Subscription {
    /// Wrap a broadcast receiver.
    ///
    /// Public so other `BusClient` implementations can hand out subscriptions.
    #[must_use]
    pub fn new(topic: String, receiver: broadcast::Receiver<Bytes>) -> Self {
        Self {
            topic,
            receiver,
            lagged: 0,
        }
    }

    /// Take the next queued payload without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))` - A payload was queued
    /// - `Ok(None)` - Nothing queued right now
    /// - `Err(SubscriptionError::Closed)` - The bus is gone
    pub fn poll(&mut self) -> Result<Option<Bytes>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    debug!(topic = %self.topic, "Subscription observed closed bus");
                    return Err(SubscriptionError::Closed);
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.lagged += count;
                    warn!(topic = %self.topic, lagged = count, "Subscriber lagged, payloads dropped");
                }
            }
        }
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Result<Vec<Bytes>, SubscriptionError> {
        let mut drained = Vec::new();
        while let Some(payload) = self.poll()? {
            drained.push(payload);
        }
        Ok(drained)
    }

    /// Topic name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Total payloads lost to lagging.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("lagged", &self.lagged)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "Subscription dropped");
    }
}
