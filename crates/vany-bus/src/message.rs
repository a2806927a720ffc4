//! # Messages
//!
//! The envelope every node publishes. A request and the response derived from
//! it share the same [`CorrelationHash`] and [`SessionId`]; the response type is
//! always the request type plus [`RESPONSE_SUFFIX`].

use crate::{BROADCAST_RECIPIENT, PROTOCOL_VERSION, RESPONSE_SUFFIX};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Request/response pairs a node can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Liveness probe answered by every node.
    Hello,
    /// Bluetooth device scan.
    BtScan,
    /// Latest battery telemetry sample.
    Voltage,
}

impl Capability {
    /// Every capability known to this protocol version.
    pub const ALL: [Capability; 3] = [Self::Hello, Self::BtScan, Self::Voltage];

    /// Wire name of the request type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::BtScan => "btscan",
            Self::Voltage => "voltage",
        }
    }

    /// Whether responses must be routed back to the requesting session only.
    ///
    /// `hello` is answered by every node and fanned out to every session.
    #[must_use]
    pub fn is_session_scoped(&self) -> bool {
        !matches!(self, Self::Hello)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `type` string that names no known capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

// =============================================================================
// MESSAGE TYPE
// =============================================================================

/// The `type` field of a message.
///
/// Parsed once at decode time so dispatch is a typed lookup. Strings that do
/// not name a known capability are kept verbatim so they survive a round trip.
///
/// Equality and hashing go by wire name, so a hand-built `Other("hello")` is
/// the same type as `Request(Capability::Hello)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// A request for a capability.
    Request(Capability),
    /// The response to a capability request.
    Response(Capability),
    /// Any other type string.
    Other(String),
}

impl MessageType {
    /// The type a response to this message carries.
    #[must_use]
    pub fn response(&self) -> MessageType {
        match self {
            Self::Request(cap) => Self::Response(*cap),
            other => Self::from(format!("{other}{RESPONSE_SUFFIX}")),
        }
    }

    /// Whether the wire name ends in `_response`.
    #[must_use]
    pub fn is_response(&self) -> bool {
        match self {
            Self::Request(_) => false,
            Self::Response(_) => true,
            Self::Other(s) => s.ends_with(RESPONSE_SUFFIX),
        }
    }

    /// The capability this type belongs to, if any.
    #[must_use]
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::Request(cap) | Self::Response(cap) => Some(*cap),
            Self::Other(_) => None,
        }
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Request(a), Self::Request(b)) | (Self::Response(a), Self::Response(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Eq for MessageType {}

impl std::hash::Hash for MessageType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(cap) => write!(f, "{cap}"),
            Self::Response(cap) => write!(f, "{cap}{RESPONSE_SUFFIX}"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        if let Ok(cap) = s.parse::<Capability>() {
            return Self::Request(cap);
        }
        s.strip_suffix(RESPONSE_SUFFIX)
            .and_then(|base| base.parse::<Capability>().ok())
            .map_or_else(|| Self::Other(s.to_string()), Self::Response)
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        kind.to_string()
    }
}

impl From<Capability> for MessageType {
    fn from(cap: Capability) -> Self {
        Self::Request(cap)
    }
}

// =============================================================================
// CORRELATION HASH
// =============================================================================

/// 128-bit random identifier shared by a request and its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationHash(u128);

impl CorrelationHash {
    /// Draw a fresh random hash.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Wrap an existing value.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// The raw value.
    #[must_use]
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for CorrelationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// =============================================================================
// SESSION ID
// =============================================================================

/// Opaque identifier of one external client session.
///
/// Serialized as a JSON string. Integer sids are accepted on decode and kept
/// as their decimal representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a transport-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SessionIdVisitor;

        impl Visitor<'_> for SessionIdVisitor {
            type Value = SessionId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a session id string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SessionId::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(SessionId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(SessionId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SessionId(v.to_string()))
            }
        }

        deserializer.deserialize_any(SessionIdVisitor)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Header half of the `[header, data]` wire pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub version: u32,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub hash: CorrelationHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<SessionId>,
}

/// A unit of communication on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Protocol version.
    pub version: u32,
    /// Name of the originating node.
    pub from: String,
    /// Intended recipient or [`BROADCAST_RECIPIENT`]. Informational only.
    pub to: String,
    /// Request or response type; drives dispatch.
    pub kind: MessageType,
    /// Correlation hash, echoed by responses.
    pub hash: CorrelationHash,
    /// Originating external session, if any.
    pub sid: Option<SessionId>,
    /// Payload, opaque to the bus.
    pub data: serde_json::Value,
}

impl Message {
    /// Create a message with a fresh correlation hash and no session.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: impl Into<MessageType>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            hash: CorrelationHash::generate(),
            sid: None,
            data,
        }
    }

    /// Create a request addressed to every node.
    pub fn broadcast(
        from: impl Into<String>,
        kind: impl Into<MessageType>,
        data: serde_json::Value,
    ) -> Self {
        Self::new(from, BROADCAST_RECIPIENT, kind, data)
    }

    /// Attach an external session.
    #[must_use]
    pub fn with_sid(mut self, sid: Option<SessionId>) -> Self {
        self.sid = sid;
        self
    }

    /// Override the correlation hash.
    #[must_use]
    pub fn with_hash(mut self, hash: CorrelationHash) -> Self {
        self.hash = hash;
        self
    }

    /// Build the response to this message.
    ///
    /// The response echoes `hash` and `sid` and its type is derived from ours.
    pub fn make_response(&self, from: impl Into<String>, data: serde_json::Value) -> Message {
        Message {
            version: PROTOCOL_VERSION,
            from: from.into(),
            to: self.from.clone(),
            kind: self.kind.response(),
            hash: self.hash,
            sid: self.sid.clone(),
            data,
        }
    }

    /// Split off the wire header.
    #[must_use]
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            version: self.version,
            from: self.from.clone(),
            to: self.to.clone(),
            kind: self.kind.clone(),
            hash: self.hash,
            sid: self.sid.clone(),
        }
    }

    /// Reassemble a message from its wire halves.
    #[must_use]
    pub fn from_parts(header: MessageHeader, data: serde_json::Value) -> Self {
        Self {
            version: header.version,
            from: header.from,
            to: header.to,
            kind: header.kind,
            hash: header.hash,
            sid: header.sid,
            data,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "V:{}, F:{}, T:{}, TY:{}, {}",
            self.version, self.from, self.to, self.kind, self.hash
        )
    }
}
