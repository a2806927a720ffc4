//! # Vany Node - Actor Base
//!
//! A node is an independently scheduled actor: it owns one bus subscription,
//! dispatches every decoded message whose type matches a registered
//! capability, and publishes responses that echo the request's hash and sid.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──spawn()──→ Running ──stop()──→ Stopping ──loop exits──→ Stopped
//! ```
//!
//! ## Run Loop
//!
//! ```text
//! loop {
//!     if stop requested { break }
//!     while let Some(payload) = subscription.poll() {
//!         decode → on_message → dispatch table lookup → handler
//!     }
//!     actor.tick()
//!     sleep(poll_interval)
//! }
//! ```
//!
//! Handlers on one node never overlap. Handlers on different nodes run fully
//! concurrently. A failing or panicking handler is logged with the message
//! hash and the loop continues; only a failed subscription at spawn time is
//! fatal.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod actor;
mod config;
mod context;
mod dispatch;
mod error;
mod node;

pub use actor::{Actor, BasicNode};
pub use config::{NodeConfig, DEFAULT_POLL_INTERVAL};
pub use context::NodeContext;
pub use dispatch::{hello, DispatchTable, HandlerFn};
pub use error::{HandlerError, NodeError, PublishError};
pub use node::{Node, NodeHandle, NodeState, NodeStatsSnapshot};
