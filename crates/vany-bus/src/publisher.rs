//! # Bus Publisher
//!
//! The `BusClient` port every node is constructed with, and the in-process
//! implementation backed by `tokio::sync::broadcast`.

use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been shut down; no new subscriptions or publishes.
    #[error("Bus closed")]
    Closed,

    /// Topic names must be non-empty.
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),
}

/// Connection to a publish/subscribe bus.
///
/// Each node owns one client and one subscription; nothing else is shared.
pub trait BusClient: Send + Sync {
    /// Publish a payload to every live subscription on `topic`.
    ///
    /// Fire-and-forget. Returns the number of subscriptions the payload was
    /// handed to; `0` means it was dropped.
    fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError>;

    /// Open a new subscription on `topic`.
    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

/// In-process broadcast bus.
///
/// One `broadcast` channel per topic, created on first subscription.
/// Publishing to a topic nobody subscribed to drops the payload.
pub struct InMemoryBus {
    /// Broadcast sender per topic.
    topics: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,

    /// Set once by `close()`.
    closed: AtomicBool,

    /// Total publish attempts.
    messages_published: AtomicU64,

    /// Per-subscriber buffer size.
    capacity: usize,
}

impl InMemoryBus {
    /// Create a bus with the default per-subscriber capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            messages_published: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total publish attempts, including dropped ones.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Per-subscriber capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the bus down.
    ///
    /// Existing subscriptions observe [`crate::SubscriptionError::Closed`] once
    /// drained; later subscribes and publishes fail with [`BusError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.topics.write().clear();
        debug!("Bus closed");
    }

    fn check_topic(topic: &str) -> Result<(), BusError> {
        if topic.is_empty() {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusClient for InMemoryBus {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError> {
        Self::check_topic(topic)?;
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let topics = self.topics.read();
        let Some(sender) = topics.get(topic) else {
            warn!(topic = topic, "Payload dropped (topic has no subscribers)");
            return Ok(0);
        };

        match sender.send(payload) {
            Ok(receivers) => {
                debug!(topic = topic, receivers = receivers, "Payload published");
                Ok(receivers)
            }
            Err(_) => {
                warn!(topic = topic, "Payload dropped (no receivers)");
                Ok(0)
            }
        }
    }

    fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        Self::check_topic(topic)?;
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let mut topics = self.topics.write();
        let receiver = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!(topic = topic, "New subscription created");
        Ok(Subscription::new(topic.to_string(), receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_no_subscribers() {
        let bus = InMemoryBus::new();
        let receivers = bus.publish("vany", Bytes::from_static(b"x")).unwrap();
        assert_eq!(receivers, 0);
        assert_eq!(bus.messages_published(), 1);
    }

    #[test]
    fn test_fan_out_to_every_subscriber() {
        let bus = InMemoryBus::new();
        let mut subs: Vec<_> = (0..3).map(|_| bus.subscribe("vany").unwrap()).collect();

        let receivers = bus.publish("vany", Bytes::from_static(b"ping")).unwrap();
        assert_eq!(receivers, 3);

        for sub in &mut subs {
            assert_eq!(sub.poll().unwrap().as_deref(), Some(&b"ping"[..]));
            assert_eq!(sub.poll().unwrap(), None);
        }
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("a").unwrap();
        let mut b = bus.subscribe("b").unwrap();

        bus.publish("a", Bytes::from_static(b"1")).unwrap();

        assert!(a.poll().unwrap().is_some());
        assert!(b.poll().unwrap().is_none());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_publish() {
        let bus = InMemoryBus::new();
        let _early = bus.subscribe("vany").unwrap();
        bus.publish("vany", Bytes::from_static(b"early")).unwrap();

        let mut late = bus.subscribe("vany").unwrap();
        assert!(late.poll().unwrap().is_none());
    }

    #[test]
    fn test_per_publisher_order() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("vany").unwrap();
        for i in 0..10u8 {
            bus.publish("vany", Bytes::from(vec![i])).unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(sub.poll().unwrap().unwrap()[0], i);
        }
    }

    #[test]
    fn test_closed_bus_rejects() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("vany").unwrap();
        bus.close();

        assert_eq!(bus.subscribe("vany").unwrap_err(), BusError::Closed);
        assert_eq!(
            bus.publish("vany", Bytes::from_static(b"x")).unwrap_err(),
            BusError::Closed
        );
        assert!(sub.poll().is_err());
    }

    #[test]
    fn test_empty_topic_rejected() {
        let bus = InMemoryBus::new();
        assert!(matches!(bus.subscribe(""), Err(BusError::InvalidTopic(_))));
    }

    #[test]
    fn test_subscriber_count_tracks_drop() {
        let bus = InMemoryBus::new();
        {
            let _s1 = bus.subscribe("vany").unwrap();
            let _s2 = bus.subscribe("vany").unwrap();
            assert_eq!(bus.subscriber_count("vany"), 2);
        }
        assert_eq!(bus.subscriber_count("vany"), 0);
    }
}
