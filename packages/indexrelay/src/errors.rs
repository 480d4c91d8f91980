//! Error types for indexrelay
//!
//! Provides unified error handling across the crate. Each layer owns its own
//! error enum; `IndexRelayError` is what crosses module boundaries.

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::backend::ports::{BackendError, TransportError};
use crate::features::deletion_query::DeletionQueryError;
use crate::features::engine::EngineError;
use crate::features::protocol::ProtocolError;

/// Main error type for indexrelay operations
#[derive(Debug, Error)]
pub enum IndexRelayError {
    /// Start-up configuration error (fatal)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Wire protocol error (fatal for the message)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error (remote timeout, queue unavailable)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The index engine rejected a mutation
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Deletion query conversion error
    #[error("Deletion query error: {0}")]
    DeletionQuery(#[from] DeletionQueryError),

    /// Processor lifecycle misuse
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexRelayError {
    /// Whether the error is a start-up configuration problem
    pub fn is_config(&self) -> bool {
        matches!(self, IndexRelayError::Config(_))
    }

    /// Whether retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IndexRelayError::Transport(TransportError::Timeout { .. })
                | IndexRelayError::Transport(TransportError::DestinationUnavailable(_))
        )
    }
}

/// Result type alias for indexrelay operations
pub type Result<T> = std::result::Result<T, IndexRelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: IndexRelayError = ConfigError::UnknownBackend("doesNotExist".to_string()).into();
        assert!(err.is_config());
        assert!(err.to_string().contains("doesNotExist"));
    }

    #[test]
    fn test_timeout_is_transient() {
        let err: IndexRelayError = TransportError::Timeout {
            target: "node-b".to_string(),
            timeout_ms: 10,
        }
        .into();
        assert!(err.is_transient());
        assert!(!err.is_config());
    }

    #[test]
    fn test_protocol_error_is_not_transient() {
        let err: IndexRelayError = ProtocolError::UnknownKind("Reindex".to_string()).into();
        assert!(!err.is_transient());
        assert!(err.to_string().starts_with("Protocol error"));
    }
}
