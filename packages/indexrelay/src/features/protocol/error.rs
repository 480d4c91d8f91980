//! Protocol error types

use thiserror::Error;

use crate::features::deletion_query::DeletionQueryError;

/// Failure to encode or decode a message
///
/// Fatal for the message: nothing from a message that fails to decode is
/// ever applied.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload written by a newer (or foreign) protocol
    #[error("Unsupported protocol version {major}.{minor} (this node reads {supported_major}.0 to {supported_major}.{supported_minor})")]
    UnsupportedVersion {
        major: u8,
        minor: u8,
        supported_major: u8,
        supported_minor: u8,
    },

    /// Frame shorter than its header or declared body length
    #[error("Truncated message: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Operation, field, identifier or attribute kind this node does not know
    #[error("Unknown kind '{0}'")]
    UnknownKind(String),

    /// Body decoded but is structurally wrong
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Body could not be encoded
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Deletion query string array rejected
    #[error("Deletion query: {0}")]
    DeletionQuery(#[from] DeletionQueryError),
}

impl ProtocolError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
