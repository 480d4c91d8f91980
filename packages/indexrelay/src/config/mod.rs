//! Backend configuration
//!
//! Two sources feed the same resolution path:
//! - a flat property map (`default.backend = jms`, `books.worker.execution = async`)
//! - a versioned YAML file flattened into that map
//!
//! # Examples
//!
//! ```rust,ignore
//! use indexrelay::config::{IndexProperties, WorkerSettings};
//!
//! let props = indexrelay::config::load_properties("indexing.yaml")?;
//! let books = IndexProperties::from_global(&props, "books");
//! let settings = WorkerSettings::from_properties(&books)?;
//! ```

pub mod error;
pub mod io;
pub mod properties;
pub mod worker;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use io::{load_properties, parse_properties, ConfigFileV1};
pub use properties::{keys, IndexProperties, Properties, DEFAULT_SCOPE};
pub use worker::{ExecutionMode, WorkerSettings, DEFAULT_THREAD_POOL_SIZE};
