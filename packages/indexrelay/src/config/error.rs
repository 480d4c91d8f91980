//! Configuration error types

use thiserror::Error;

/// Configuration error type
///
/// Every variant is fatal at start-up: an index manager whose configuration
/// fails to resolve never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Backend name matched neither a built-in nor a registered backend
    #[error("Unknown backend '{0}'. Valid backends: lucene, jms, blackhole, jgroupsMaster, jgroupsSlave, jgroups, or a registered implementation name")]
    UnknownBackend(String),

    /// A property value could not be parsed
    #[error("Invalid value '{value}' for property '{key}'. {hint}")]
    InvalidValue {
        key: String,
        value: String,
        hint: String,
    },

    /// A backend needs a collaborator the build context does not provide
    #[error("Backend '{backend}' requires {missing} in the worker build context")]
    MissingCollaborator { backend: String, missing: String },

    /// Two index managers under the same name
    #[error("Index '{0}' already has an index manager")]
    DuplicateIndex(String),

    /// Deletion query registry is inconsistent
    #[error("Deletion query registry error: {0}")]
    Registry(String),

    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create an invalid value error with a hint
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            hint: hint.into(),
        }
    }

    /// Create a missing collaborator error
    pub fn missing_collaborator(backend: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::MissingCollaborator {
            backend: backend.into(),
            missing: missing.into(),
        }
    }
}
