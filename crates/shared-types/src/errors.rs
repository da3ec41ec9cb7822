//! # Error Types

use thiserror::Error;

/// Errors produced while turning wire payloads into headers and back.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not a well-formed header document.
    #[error("malformed header payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded to an empty document (`null`).
    #[error("no header in message")]
    MissingHeader,

    /// A hex quantity field could not be parsed.
    #[error("invalid hex quantity: {0:?}")]
    InvalidQuantity(String),
}
