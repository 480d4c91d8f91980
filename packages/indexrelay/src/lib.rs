/*
 * indexrelay - Index Mutation Propagation
 *
 * Feature-First Hexagonal Architecture:
 * - config/    : Index-scoped properties, worker settings, YAML loading
 * - features/  : Vertical slices (work → deletion_query → protocol → backend)
 * - errors     : Unified error type
 *
 * A producer hands ordered batches of Work to an IndexManager; the configured
 * backend applies them locally, forwards them to the cluster node owning the
 * index, publishes them to a queue, or drops them.
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Processor constructors take full context
#![allow(clippy::type_complexity)] // Constructor registries
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::upper_case_acronyms)] // JMS, UTF naming

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Backend configuration
pub mod config;

/// Error types
pub mod errors;

/// Feature modules (work, deletion_query, protocol, engine, backend)
pub mod features;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{ConfigError, ExecutionMode, IndexProperties, Properties, WorkerSettings};
pub use errors::{IndexRelayError, Result};
pub use features::backend::{
    BackendFactory, BackendQueueProcessor, IndexManager, IndexManagerHolder, WorkerBuildContext,
};
pub use features::deletion_query::{DeletionQuery, DeletionQueryRegistry};
pub use features::engine::{IndexEngine, InMemoryEngine, TantivyEngine};
pub use features::protocol::WorkSerializer;
pub use features::work::{Document, EntityId, Field, Work, WorkVisitor};
