//! Error types for nodes and handlers.

use thiserror::Error;
use vany_bus::{BusError, CodecError};

/// Errors that abort node startup or surface from `join`.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The bus subscription could not be established. Fatal for this node.
    #[error("Failed to connect to bus: {0}")]
    BusConnect(#[from] BusError),

    #[error("Invalid node configuration: {0}")]
    Config(String),

    #[error("Failed to spawn node thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Node thread panicked: {0}")]
    Panicked(String),
}

/// Failure to put a message on the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Failure inside a capability handler.
///
/// Absorbed at the dispatch boundary: logged with the message hash, counted,
/// and the run loop moves on.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid request data: {0}")]
    InvalidData(String),

    #[error("Failed to publish response: {0}")]
    Publish(#[from] PublishError),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Short label used in metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidData(_) => "invalid_data",
            Self::Publish(_) => "publish",
            Self::Collaborator(_) => "collaborator",
            Self::Panicked(_) => "panic",
        }
    }
}
