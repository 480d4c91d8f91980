//! Work Model
//!
//! Every index mutation is a `Work` value. Backends never inspect the variant
//! directly; they implement `WorkVisitor` and let `Work::accept_visitor` pick
//! the method.
//!
//! ```text
//! producer ──► Vec<Work> ──► BackendQueueProcessor
//!                               │
//!                               ├─ local:   WorkVisitor → executor → IndexEngine
//!                               └─ remote:  WorkVisitor → Serializer → bytes
//! ```

pub mod describe;
pub mod domain;
pub mod visitor;

pub use describe::{describe, WorkDescriber};
pub use domain::*;
pub use visitor::WorkVisitor;
