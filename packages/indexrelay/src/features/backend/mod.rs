//! Backend Queue Processors
//!
//! The pluggable strategy deciding where and how a batch of `Work` is
//! applied: this node's index, a remote cluster owner, a message queue,
//! or nowhere.
//!
//! # Architecture
//!
//! ```text
//! IndexManager::perform_operations
//!        │
//!        ▼
//! BackendFactory ──► Box<dyn BackendQueueProcessor>
//!                        ├─ local      → IndexWorkspace (WorkExecutor + FlushBarrier)
//!                        ├─ cluster    → ClusterChannel → ClusterReceiver → IndexWorkspace
//!                        ├─ queue      → QueueBroker → QueueDrainer → IndexWorkspace
//!                        └─ blackhole  → (discarded)
//! ```

pub mod blackhole;
pub mod cluster;
pub mod error_handler;
pub mod factory;
pub mod index_manager;
pub mod lifecycle;
pub mod local;
pub mod ports;
pub mod queue;
pub mod workspace;

pub use blackhole::BlackholeBackendQueueProcessor;
pub use cluster::{
    ClusterBackendQueueProcessor, ClusterChannel, ClusterNode, ClusterReceiver, NodeAddress,
    NodeSelector, SelectorKind,
};
pub use error_handler::{ErrorContext, ErrorHandler, LogErrorHandler};
pub use factory::{names, BackendConstructor, BackendFactory, BackendRegistry};
pub use index_manager::{IndexManager, IndexManagerHolder};
pub use local::{LocalBackendQueueProcessor, WorkerPool};
pub use ports::{
    BackendError, BackendQueueProcessor, CountingMonitor, IndexingMonitor, TransportError,
    WorkerBuildContext,
};
pub use queue::{DrainStats, QueueBackendQueueProcessor, QueueBroker, QueueDrainer, QueueMessage};
pub use workspace::{BatchFailure, IndexWorkspace};
