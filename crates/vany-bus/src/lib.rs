//! # Vany Bus - Broadcast Bus for Inter-Node Communication
//!
//! Every node in a deployment subscribes to one shared topic and sees every
//! message published on it, including its own.
//!
//! ## Publish / Subscribe
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Node A     │                    │   Node B     │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │ poll()
//!                  │ Broadcast    │          │
//!                  │ Bus (topic)  │ ─────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Wire Format
//!
//! A bus payload is the JSON array `[header, data]`:
//!
//! ```text
//! [{"version":1,"from":"Gateway","to":"All","type":"btscan","hash":1234,"sid":"s1"},
//!  {"time":3}]
//! ```
//!
//! - Fan-out to every live subscription, per-publisher ordering only
//! - No persistence: a subscription created after a publish never sees it
//! - Payloads are opaque [`bytes::Bytes`]; decoding happens in the node

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod codec;
pub mod message;
pub mod publisher;
pub mod subscriber;

pub use codec::{decode, encode, CodecError, DecodeError};
pub use message::{
    Capability, CorrelationHash, Message, MessageHeader, MessageType, SessionId,
    UnknownCapability,
};
pub use publisher::{BusClient, BusError, InMemoryBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Current protocol version stamped on every message.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payloads buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Topic used when a deployment does not configure one.
pub const DEFAULT_TOPIC: &str = "vany";

/// Recipient marker for messages addressed to every node.
pub const BROADCAST_RECIPIENT: &str = "All";

/// Suffix appended to a request type to form its response type.
pub const RESPONSE_SUFFIX: &str = "_response";
