// Ports: backend queue processor, indexing monitor, build context

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::cluster::ClusterNode;
use super::error_handler::{ErrorHandler, LogErrorHandler};
use super::queue::QueueBroker;
use super::workspace::IndexWorkspace;
use crate::config::IndexProperties;
use crate::errors::Result;
use crate::features::deletion_query::DeletionQueryRegistry;
use crate::features::protocol::{MsgpackSerializationProvider, WorkSerializer};
use crate::features::work::domain::Work;

/// Stateful strategy applying batches of work for one index manager
///
/// Lifecycle: `initialize` exactly once, then any number of concurrent
/// `apply_work` / `apply_streaming_work` calls, then `close`. Calls outside
/// that window fail with `BackendError`.
pub trait BackendQueueProcessor: Send + Sync {
    /// Backend name as configured (for logging)
    fn name(&self) -> &str;

    fn initialize(
        &self,
        props: &IndexProperties,
        context: &WorkerBuildContext,
        workspace: Arc<IndexWorkspace>,
    ) -> Result<()>;

    /// Apply one ordered batch; the batch is committed once it completes
    fn apply_work(&self, works: Vec<Work>, monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()>;

    /// Apply a single work without committing (mass indexing path)
    fn apply_streaming_work(&self, work: Work, monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()>;

    /// Entity mappings of the index changed; drop anything derived from them
    fn index_mapping_changed(&self) {}

    /// Whether work arriving from another node may be applied here
    fn accepts_remote_work(&self) -> bool {
        false
    }

    /// Stop accepting work and wait for queued work to finish
    fn close(&self) -> Result<()>;
}

/// Progress callback for producers
pub trait IndexingMonitor: Send + Sync {
    fn documents_added(&self, count: u64);
}

/// Monitor counting added documents
#[derive(Debug, Default)]
pub struct CountingMonitor {
    added: AtomicU64,
}

impl CountingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(&self) -> u64 {
        self.added.load(Ordering::Acquire)
    }
}

impl IndexingMonitor for CountingMonitor {
    fn documents_added(&self, count: u64) {
        self.added.fetch_add(count, Ordering::AcqRel);
    }
}

/// Processor lifecycle misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{backend} backend is not initialized")]
    NotInitialized { backend: String },

    #[error("{backend} backend is already initialized")]
    AlreadyInitialized { backend: String },

    #[error("{backend} backend is closed")]
    Closed { backend: String },

    #[error("Worker pool '{0}' is shut down")]
    PoolShutDown(String),
}

/// Failure talking to another node or to the message queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Destination unavailable: {0}")]
    DestinationUnavailable(String),

    #[error("No acknowledgement from {target} within {timeout_ms}ms")]
    Timeout { target: String, timeout_ms: u64 },

    #[error("Disconnected from {0}")]
    Disconnected(String),

    #[error("No node owns index '{0}'")]
    NoMaster(String),

    #[error("Remote node failed: {0}")]
    Remote(String),
}

/// Collaborators handed to every processor at `initialize`
///
/// The cluster node and queue broker are optional: only the backends that
/// need them ask, and fail start-up when they are missing.
#[derive(Clone)]
pub struct WorkerBuildContext {
    error_handler: Arc<dyn ErrorHandler>,
    serializer: WorkSerializer,
    cluster_node: Option<Arc<ClusterNode>>,
    broker: Option<Arc<QueueBroker>>,
}

impl WorkerBuildContext {
    pub fn new(serializer: WorkSerializer) -> Self {
        Self {
            error_handler: Arc::new(LogErrorHandler),
            serializer,
            cluster_node: None,
            broker: None,
        }
    }

    /// msgpack protocol, built-in deletion queries, logging error handler
    pub fn standard() -> Self {
        Self::new(WorkSerializer::new(
            Arc::new(MsgpackSerializationProvider),
            Arc::new(DeletionQueryRegistry::standard()),
        ))
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn with_cluster_node(mut self, node: Arc<ClusterNode>) -> Self {
        self.cluster_node = Some(node);
        self
    }

    pub fn with_broker(mut self, broker: Arc<QueueBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn error_handler(&self) -> &Arc<dyn ErrorHandler> {
        &self.error_handler
    }

    pub fn serializer(&self) -> &WorkSerializer {
        &self.serializer
    }

    pub fn registry(&self) -> &Arc<DeletionQueryRegistry> {
        self.serializer.registry()
    }

    pub fn cluster_node(&self) -> Option<&Arc<ClusterNode>> {
        self.cluster_node.as_ref()
    }

    pub fn broker(&self) -> Option<&Arc<QueueBroker>> {
        self.broker.as_ref()
    }
}

impl Default for WorkerBuildContext {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for WorkerBuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBuildContext")
            .field("serializer", &self.serializer)
            .field("cluster_node", &self.cluster_node.as_ref().map(|n| n.address().clone()))
            .field("broker", &self.broker.is_some())
            .finish()
    }
}
