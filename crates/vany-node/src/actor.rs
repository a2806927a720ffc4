//! The behaviour a node runs.

use vany_bus::Message;

use crate::{DispatchTable, NodeContext};

/// A node's role-specific behaviour.
///
/// Every hook runs on the node's own thread, one at a time.
pub trait Actor: Send + 'static {
    /// Name published as `from`.
    fn name(&self) -> &str;

    /// Add this role's capabilities. `hello` is already registered.
    fn register(_table: &mut DispatchTable<Self>)
    where
        Self: Sized,
    {
    }

    /// Called once on the node thread before the first iteration.
    fn on_start(&mut self, _ctx: &NodeContext) {}

    /// Observe every decoded message before dispatch, including responses
    /// and types this node has no handler for.
    fn on_message(&mut self, _message: &Message, _ctx: &NodeContext) {}

    /// Periodic work, once per iteration after the subscription is drained.
    fn tick(&mut self, _ctx: &NodeContext) {}

    /// Called once after the loop exits.
    fn on_stop(&mut self, _ctx: &NodeContext) {}
}

/// A node with nothing but the base `hello` capability.
#[derive(Debug, Clone)]
pub struct BasicNode {
    name: String,
}

impl BasicNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Actor for BasicNode {
    fn name(&self) -> &str {
        &self.name
    }
}
