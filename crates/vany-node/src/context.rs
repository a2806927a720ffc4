//! What a handler sees of its node: identity and a way to publish.

use std::sync::Arc;
use tracing::debug;
use vany_bus::{encode, BusClient, Message};
use vany_telemetry::BUS_MESSAGES_PUBLISHED;

use crate::PublishError;

/// Publishing side of a node, handed to every hook and handler.
#[derive(Clone)]
pub struct NodeContext {
    name: String,
    topic: String,
    bus: Arc<dyn BusClient>,
}

impl NodeContext {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, bus: Arc<dyn BusClient>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            bus,
        }
    }

    /// The node's name, used as `from` on everything it publishes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and publish a message on the node's topic.
    ///
    /// Returns the number of subscriptions it reached.
    pub fn publish(&self, message: &Message) -> Result<usize, PublishError> {
        let payload = encode(message)?;
        let receivers = self.bus.publish(&self.topic, payload)?;
        BUS_MESSAGES_PUBLISHED.with_label_values(&[self.name.as_str()]).inc();
        debug!(
            node = %self.name,
            hash = %message.hash,
            sid = ?message.sid,
            kind = %message.kind,
            receivers,
            "Published message"
        );
        Ok(receivers)
    }

    /// Publish the response to `request`, echoing its hash and sid.
    pub fn reply(
        &self,
        request: &Message,
        data: serde_json::Value,
    ) -> Result<usize, PublishError> {
        self.publish(&request.make_response(self.name.as_str(), data))
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vany_bus::{decode, Capability, InMemoryBus, SessionId};

    #[test]
    fn test_reply_echoes_correlation() {
        let bus = Arc::new(InMemoryBus::new());
        let mut sub = bus.subscribe("vany").unwrap();
        let ctx = NodeContext::new("Worker", "vany", bus.clone());

        let request = Message::broadcast("Gateway", Capability::Hello, json!({}))
            .with_sid(Some(SessionId::new("s1")));
        assert_eq!(ctx.reply(&request, json!({})).unwrap(), 1);

        let response = decode(&sub.poll().unwrap().unwrap()).unwrap();
        assert_eq!(response.hash, request.hash);
        assert_eq!(response.sid, request.sid);
        assert_eq!(response.from, "Worker");
        assert_eq!(response.to, "Gateway");
        assert_eq!(response.kind.to_string(), "hello_response");
    }

    #[test]
    fn test_publish_on_closed_bus_fails() {
        let bus = Arc::new(InMemoryBus::new());
        let ctx = NodeContext::new("Worker", "vany", bus.clone());
        bus.close();

        let msg = Message::broadcast("Worker", Capability::Hello, json!({}));
        assert!(matches!(ctx.publish(&msg), Err(PublishError::Bus(_))));
    }
}
