//! Gateway error types.

use thiserror::Error;
use vany_bus::SessionId;

/// Errors returned to callers of the gateway handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway node has stopped; its request queue is gone.
    #[error("Gateway is not running")]
    Closed,
}

/// A frame could not be handed to a client session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Session closed: {0}")]
    SessionClosed(SessionId),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}
