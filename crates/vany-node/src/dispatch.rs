//! Typed dispatch table.
//!
//! Built once before the run loop starts and then moved into the node's
//! thread; nothing can reach it to mutate it afterwards.

use std::collections::HashMap;
use std::fmt;
use vany_bus::{Capability, Message, MessageType};

use crate::{HandlerError, NodeContext};

/// A capability handler. Runs to completion on the node's own thread.
pub type HandlerFn<A> = fn(&mut A, &Message, &NodeContext) -> Result<(), HandlerError>;

/// Mapping from request capability to handler.
///
/// Only request types dispatch; responses and unknown types never match.
pub struct DispatchTable<A> {
    handlers: HashMap<Capability, HandlerFn<A>>,
}

impl<A> DispatchTable<A> {
    /// Table holding the base `hello` capability.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.register(Capability::Hello, hello::<A>);
        table
    }

    /// Table with no handlers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `capability`, returning any handler it replaced.
    pub fn register(
        &mut self,
        capability: Capability,
        handler: HandlerFn<A>,
    ) -> Option<HandlerFn<A>> {
        self.handlers.insert(capability, handler)
    }

    /// Remove the handler for `capability`.
    pub fn unregister(&mut self, capability: Capability) -> Option<HandlerFn<A>> {
        self.handlers.remove(&capability)
    }

    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.handlers.contains_key(&capability)
    }

    /// Registered capabilities, sorted by wire name.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<_> = self.handlers.keys().copied().collect();
        caps.sort_by_key(Capability::as_str);
        caps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler for a message type, if it is a registered request.
    #[must_use]
    pub fn lookup(&self, kind: &MessageType) -> Option<HandlerFn<A>> {
        match kind {
            MessageType::Request(cap) => self.handlers.get(cap).copied(),
            MessageType::Response(_) | MessageType::Other(_) => None,
        }
    }
}

impl<A> Default for DispatchTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for DispatchTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Base capability: answer `hello` with an empty `hello_response`.
pub fn hello<A>(_actor: &mut A, message: &Message, ctx: &NodeContext) -> Result<(), HandlerError> {
    ctx.reply(message, serde_json::json!({}))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    fn noop(_: &mut Probe, _: &Message, _: &NodeContext) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn test_new_has_hello() {
        let table = DispatchTable::<Probe>::new();
        assert!(table.contains(Capability::Hello));
        assert_eq!(table.len(), 1);
        assert!(DispatchTable::<Probe>::empty().is_empty());
    }

    #[test]
    fn test_lookup_only_matches_requests() {
        let mut table = DispatchTable::<Probe>::new();
        table.register(Capability::Voltage, noop);

        assert!(table.lookup(&MessageType::from("voltage")).is_some());
        assert!(table.lookup(&MessageType::from("hello")).is_some());
        assert!(table.lookup(&MessageType::from("voltage_response")).is_none());
        assert!(table.lookup(&MessageType::from("btscan")).is_none());
        assert!(table.lookup(&MessageType::from("custom")).is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut table = DispatchTable::<Probe>::new();
        assert!(table.register(Capability::Hello, noop).is_some());
        assert!(table.unregister(Capability::Hello).is_some());
        assert!(!table.contains(Capability::Hello));
    }

    #[test]
    fn test_capabilities_sorted() {
        let mut table = DispatchTable::<Probe>::new();
        table.register(Capability::Voltage, noop);
        table.register(Capability::BtScan, noop);
        assert_eq!(
            table.capabilities(),
            vec![Capability::BtScan, Capability::Hello, Capability::Voltage]
        );
    }
}
