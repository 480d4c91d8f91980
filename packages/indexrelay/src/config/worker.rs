//! Worker execution settings derived from index properties

use serde::{Deserialize, Serialize};

use super::error::ConfigResult;
use super::properties::{keys, IndexProperties};

/// Default number of worker threads for async local execution
pub const DEFAULT_THREAD_POOL_SIZE: usize = 1;

/// How a processor executes work relative to the producing thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Block the producer until the work is applied (default)
    #[default]
    Sync,
    /// Hand the work to a worker pool and return immediately
    Async,
}

impl ExecutionMode {
    /// Anything other than `async` (case-insensitive) means sync.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("async") => ExecutionMode::Async,
            Some(value) if !value.eq_ignore_ascii_case("sync") => {
                tracing::warn!(
                    value,
                    "unrecognized worker.execution value, falling back to sync"
                );
                ExecutionMode::Sync
            }
            _ => ExecutionMode::Sync,
        }
    }
}

/// Execution settings shared by every processor of an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub execution: ExecutionMode,
    pub thread_pool_size: usize,
    /// `None` means unbounded
    pub work_queue_size: Option<usize>,
}

impl WorkerSettings {
    pub fn from_properties(props: &IndexProperties) -> ConfigResult<Self> {
        let execution = ExecutionMode::parse(props.get(keys::WORKER_EXECUTION));
        let thread_pool_size = props
            .get_positive(keys::THREAD_POOL_SIZE)?
            .unwrap_or(DEFAULT_THREAD_POOL_SIZE);
        let work_queue_size = props.get_positive(keys::WORK_QUEUE_SIZE)?;

        Ok(Self {
            execution,
            thread_pool_size,
            work_queue_size,
        })
    }

    pub fn is_sync(&self) -> bool {
        self.execution == ExecutionMode::Sync
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::Sync,
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            work_queue_size: None,
        }
    }
}
