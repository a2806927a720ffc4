//! Client transport port.
//!
//! The gateway hands frames to the transport; the transport owns the
//! sessions and decides how a frame reaches a client.

use serde::Serialize;
use vany_bus::{CorrelationHash, Message, MessageType, SessionId};

use crate::DeliveryError;

/// Event name used when a session request expires.
pub const REQUEST_TIMEOUT_EVENT: &str = "request_timeout";

/// One frame for one client.
///
/// The payload is kept as JSON text: correlation hashes are 128-bit and do
/// not fit in a `serde_json::Value` number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Event name: the response type, or [`REQUEST_TIMEOUT_EVENT`].
    pub event: String,
    /// JSON text. For responses, the `[header, data]` pair exactly as on the bus.
    pub payload: String,
}

#[derive(Serialize)]
struct TimeoutPayload<'a> {
    hash: CorrelationHash,
    #[serde(rename = "type")]
    kind: &'a MessageType,
}

impl OutboundFrame {
    /// Frame carrying a bus response.
    pub fn response(message: &Message) -> Result<Self, DeliveryError> {
        let payload = serde_json::to_string(&(message.header(), &message.data))
            .map_err(|e| DeliveryError::Encode(e.to_string()))?;
        Ok(Self {
            event: message.kind.to_string(),
            payload,
        })
    }

    /// Frame telling a session its request saw no response in time.
    pub fn request_timeout(hash: CorrelationHash, kind: &MessageType) -> Result<Self, DeliveryError> {
        let payload = serde_json::to_string(&TimeoutPayload { hash, kind })
            .map_err(|e| DeliveryError::Encode(e.to_string()))?;
        Ok(Self {
            event: REQUEST_TIMEOUT_EVENT.to_string(),
            payload,
        })
    }

    /// `{"event": .., "payload": ..}` as one JSON document.
    pub fn to_json(&self) -> Result<String, DeliveryError> {
        let event =
            serde_json::to_string(&self.event).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        Ok(format!("{{\"event\":{event},\"payload\":{}}}", self.payload))
    }
}

/// Delivery side of the external transport.
pub trait ClientTransport: Send + Sync {
    /// Deliver to exactly one session.
    fn emit_to(&self, sid: &SessionId, frame: OutboundFrame) -> Result<(), DeliveryError>;

    /// Deliver to every connected session. Returns how many accepted it.
    fn broadcast(&self, frame: OutboundFrame) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use vany_bus::Capability;

    #[test]
    fn test_response_frame_carries_wire_pair() {
        let request = Message::broadcast("Gateway", Capability::BtScan, json!({"time": 3}))
            .with_hash(CorrelationHash::from_u128(9))
            .with_sid(Some(SessionId::new("s1")));
        let response = request.make_response("BluetoothScanner", json!({"discovered_devices": []}));

        let frame = OutboundFrame::response(&response).unwrap();
        assert_eq!(frame.event, "btscan_response");

        let payload: Value = serde_json::from_str(&frame.payload).unwrap();
        assert_eq!(payload[0]["hash"], 9);
        assert_eq!(payload[0]["sid"], "s1");
        assert_eq!(payload[0]["type"], "btscan_response");
        assert_eq!(payload[1], json!({"discovered_devices": []}));
    }

    #[test]
    fn test_full_width_hash_in_frame() {
        let response = Message::broadcast("A", Capability::Hello, json!({}))
            .with_hash(CorrelationHash::from_u128(u128::MAX))
            .make_response("B", json!({}));
        let frame = OutboundFrame::response(&response).unwrap();
        assert!(frame.payload.contains(&u128::MAX.to_string()));
    }

    #[test]
    fn test_timeout_frame() {
        let frame = OutboundFrame::request_timeout(
            CorrelationHash::from_u128(5),
            &MessageType::from("btscan"),
        )
        .unwrap();
        assert_eq!(frame.event, "request_timeout");

        let doc: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(doc, json!({"event": "request_timeout", "payload": {"hash": 5, "type": "btscan"}}));
    }
}
