//! Local backend: applies work to this node's index
//!
//! Sync mode runs the batch on the producer's thread and returns its error.
//! Async mode hands the batch to the worker pool and reports failures to the
//! error handler.

use std::sync::Arc;

use parking_lot::Mutex;

use super::worker_pool::WorkerPool;
use crate::config::{IndexProperties, WorkerSettings};
use crate::errors::Result;
use crate::features::backend::error_handler::{ErrorContext, ErrorHandler};
use crate::features::backend::lifecycle::Lifecycle;
use crate::features::backend::ports::{BackendQueueProcessor, IndexingMonitor, WorkerBuildContext};
use crate::features::backend::workspace::IndexWorkspace;
use crate::features::work::domain::Work;

struct LocalState {
    workspace: Arc<IndexWorkspace>,
    settings: WorkerSettings,
    pool: Option<WorkerPool>,
    /// Held across ticket and enqueue so the pool sees jobs in ticket order
    submit: Mutex<()>,
    error_handler: Arc<dyn ErrorHandler>,
}

pub struct LocalBackendQueueProcessor {
    lifecycle: Lifecycle<LocalState>,
}

impl LocalBackendQueueProcessor {
    pub const NAME: &'static str = "local";

    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(Self::NAME),
        }
    }

    /// Execution settings resolved at `initialize`
    pub fn settings(&self) -> Option<WorkerSettings> {
        self.lifecycle.ready().ok().map(|s| s.settings.clone())
    }
}

impl Default for LocalBackendQueueProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendQueueProcessor for LocalBackendQueueProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(
        &self,
        props: &IndexProperties,
        context: &WorkerBuildContext,
        workspace: Arc<IndexWorkspace>,
    ) -> Result<()> {
        self.lifecycle.initialize(|| {
            let settings = WorkerSettings::from_properties(props)?;
            let pool = if settings.is_sync() {
                None
            } else {
                Some(WorkerPool::new(
                    props.index_name(),
                    settings.thread_pool_size,
                    settings.work_queue_size,
                )?)
            };
            tracing::info!(
                index = %props.index_name(),
                execution = ?settings.execution,
                threads = settings.thread_pool_size,
                "local backend ready"
            );
            Ok(LocalState {
                workspace,
                settings,
                pool,
                submit: Mutex::new(()),
                error_handler: Arc::clone(context.error_handler()),
            })
        })?;
        Ok(())
    }

    fn apply_work(&self, works: Vec<Work>, monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let state = self.lifecycle.ready()?;
        if works.is_empty() {
            return Ok(());
        }

        match &state.pool {
            None => {
                let ticket = state.workspace.begin_batch();
                state
                    .workspace
                    .run_batch(ticket, &works, monitor.as_deref())
                    .map_err(|failure| failure.error)
            }
            Some(pool) => {
                let _order = state.submit.lock();
                let ticket = state.workspace.begin_batch();
                let workspace = Arc::clone(&state.workspace);
                let handler = Arc::clone(&state.error_handler);
                pool.execute(move || {
                    if let Err(failure) = workspace.run_batch(ticket, &works, monitor.as_deref()) {
                        handler.handle(failure.into_context(workspace.index_name(), works));
                    }
                })?;
                Ok(())
            }
        }
    }

    fn apply_streaming_work(&self, work: Work, monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let state = self.lifecycle.ready()?;

        match &state.pool {
            None => {
                let ticket = state.workspace.begin_batch();
                state.workspace.run_streaming(ticket, &work, monitor.as_deref())
            }
            Some(pool) => {
                let _order = state.submit.lock();
                let ticket = state.workspace.begin_batch();
                let workspace = Arc::clone(&state.workspace);
                let handler = Arc::clone(&state.error_handler);
                pool.execute(move || {
                    if let Err(error) = workspace.run_streaming(ticket, &work, monitor.as_deref()) {
                        handler.handle(ErrorContext {
                            index_name: workspace.index_name().to_string(),
                            failing_work: Some(work),
                            unprocessed: Vec::new(),
                            error,
                        });
                    }
                })?;
                Ok(())
            }
        }
    }

    fn index_mapping_changed(&self) {
        if let Ok(state) = self.lifecycle.ready() {
            tracing::debug!(index = %state.workspace.index_name(), "mapping changed");
        }
    }

    fn close(&self) -> Result<()> {
        if let Some(state) = self.lifecycle.close() {
            if let Some(pool) = &state.pool {
                pool.shutdown();
            }
            tracing::info!(index = %state.workspace.index_name(), "local backend closed");
        }
        Ok(())
    }
}
