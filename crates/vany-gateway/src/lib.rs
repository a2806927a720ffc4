//! # Vany Gateway
//!
//! The node that connects external client sessions to the bus.
//!
//! - [`Gateway`]: the actor. Forwards queued client requests and routes
//!   responses back by `sid`.
//! - [`GatewayHandle`]: thread-safe intake used from transport tasks.
//! - [`ClientTransport`]: where frames go. [`SessionRegistry`] is the
//!   in-process implementation backed by one channel per session.
//! - [`PendingRequestStore`]: per-request bookkeeping for timeouts.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod gateway;
mod pending;
mod sessions;
mod transport;

pub use error::{DeliveryError, GatewayError};
pub use gateway::{
    ClientRequest, Gateway, GatewayConfig, GatewayHandle, GatewayStatsSnapshot,
    DEFAULT_REQUEST_TIMEOUT, GATEWAY_NODE_NAME,
};
pub use pending::{ExpiredRequest, PendingRequestStore, PendingStatsSnapshot};
pub use sessions::{SessionReceiver, SessionRegistry};
pub use transport::{ClientTransport, OutboundFrame, REQUEST_TIMEOUT_EVENT};
