//! Index engine port and adapters
//!
//! Backends never talk to a search library directly; they go through
//! `IndexEngine`. Two adapters ship with the crate:
//!
//! - `InMemoryEngine`: staged operations replayed on commit (tests, benchmarks)
//! - `TantivyEngine`: a tantivy index in RAM or on disk

pub mod memory_engine;
pub mod ports;
pub mod tantivy_engine;

pub use memory_engine::InMemoryEngine;
pub use ports::{DocumentKey, EngineError, EngineQuery, IndexEngine};
pub use tantivy_engine::{EngineSchema, FieldType, TantivyEngine};
