//! Local backend: work applied to this node's engine

pub mod executors;
pub mod flush_barrier;
pub mod processor;
pub mod worker_pool;

pub use executors::WorkExecutor;
pub use flush_barrier::{BatchTicket, FlushBarrier};
pub use processor::LocalBackendQueueProcessor;
pub use worker_pool::WorkerPool;
