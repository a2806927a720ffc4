//! # Envelope Codec
//!
//! `encode` writes the `[header, data]` JSON pair; `decode` is its inverse.

use crate::message::{Message, MessageHeader};
use bytes::Bytes;
use thiserror::Error;

/// Errors raised while encoding a message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while decoding a bus payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serialize a message to its wire form.
pub fn encode(message: &Message) -> Result<Bytes, CodecError> {
    let header = message.header();
    let bytes = serde_json::to_vec(&(&header, &message.data))?;
    Ok(Bytes::from(bytes))
}

/// Parse a wire payload back into a message.
pub fn decode(payload: &[u8]) -> Result<Message, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let (header, data): (MessageHeader, serde_json::Value) = serde_json::from_slice(payload)?;
    Ok(Message::from_parts(header, data))
}
