//! Queue backend: serialize each batch and publish it to a destination
//!
//! A `QueueDrainer` on the consuming side applies the messages. Publishing
//! is retried `transport.retries` times before the failure surfaces.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::broker::{QueueBroker, QueueMessage};
use crate::config::{keys, ConfigError, IndexProperties, WorkerSettings};
use crate::errors::Result;
use crate::features::backend::error_handler::{ErrorContext, ErrorHandler};
use crate::features::backend::lifecycle::Lifecycle;
use crate::features::backend::local::WorkerPool;
use crate::features::backend::ports::{BackendQueueProcessor, IndexingMonitor, WorkerBuildContext};
use crate::features::backend::workspace::IndexWorkspace;
use crate::features::protocol::WorkSerializer;
use crate::features::work::domain::Work;

const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Destination used when `jms.queue` is not set
pub fn default_destination(index_name: &str) -> String {
    format!("indexrelay.{}", index_name)
}

struct Publisher {
    index_name: String,
    destination: String,
    broker: Arc<QueueBroker>,
    serializer: WorkSerializer,
    retries: usize,
}

impl Publisher {
    fn publish(&self, works: &[Work]) -> Result<()> {
        let payload = self.serializer.to_serialized_model(works)?;
        let mut attempt = 0;
        loop {
            let message = QueueMessage {
                index_name: self.index_name.clone(),
                payload: payload.clone(),
            };
            match self.broker.publish(&self.destination, message) {
                Ok(()) => {
                    tracing::debug!(index = %self.index_name, destination = %self.destination, works = works.len(), "published batch");
                    return Ok(());
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(destination = %self.destination, attempt, error = %e, "publish failed, retrying");
                    thread::sleep(RETRY_BACKOFF * attempt as u32);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

struct QueueState {
    publisher: Arc<Publisher>,
    pool: Option<WorkerPool>,
    error_handler: Arc<dyn ErrorHandler>,
}

pub struct QueueBackendQueueProcessor {
    lifecycle: Lifecycle<QueueState>,
}

impl QueueBackendQueueProcessor {
    pub const NAME: &'static str = "jms";

    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(Self::NAME),
        }
    }

    /// Destination resolved at `initialize`
    pub fn destination(&self) -> Option<&str> {
        self.lifecycle
            .ready()
            .ok()
            .map(|s| s.publisher.destination.as_str())
    }

    fn dispatch(&self, state: &QueueState, works: Vec<Work>) -> Result<()> {
        match &state.pool {
            None => state.publisher.publish(&works),
            Some(pool) => {
                let publisher = Arc::clone(&state.publisher);
                let handler = Arc::clone(&state.error_handler);
                pool.execute(move || {
                    if let Err(error) = publisher.publish(&works) {
                        handler.handle(ErrorContext {
                            index_name: publisher.index_name.clone(),
                            failing_work: None,
                            unprocessed: works,
                            error,
                        });
                    }
                })?;
                Ok(())
            }
        }
    }
}

impl Default for QueueBackendQueueProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendQueueProcessor for QueueBackendQueueProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(
        &self,
        props: &IndexProperties,
        context: &WorkerBuildContext,
        _workspace: Arc<IndexWorkspace>,
    ) -> Result<()> {
        self.lifecycle.initialize(|| {
            let broker = context
                .broker()
                .cloned()
                .ok_or_else(|| ConfigError::missing_collaborator(Self::NAME, "a queue broker"))?;
            let settings = WorkerSettings::from_properties(props)?;
            let destination = props
                .get(keys::JMS_QUEUE)
                .map(str::to_string)
                .unwrap_or_else(|| default_destination(props.index_name()));
            let retries = props.get_usize(keys::TRANSPORT_RETRIES)?.unwrap_or(0);
            broker.declare(&destination);

            let pool = if settings.is_sync() {
                None
            } else {
                Some(WorkerPool::new(
                    format!("{}-publish", props.index_name()),
                    settings.thread_pool_size,
                    settings.work_queue_size,
                )?)
            };

            tracing::info!(index = %props.index_name(), %destination, retries, "queue backend ready");
            Ok(QueueState {
                publisher: Arc::new(Publisher {
                    index_name: props.index_name().to_string(),
                    destination,
                    broker,
                    serializer: context.serializer().clone(),
                    retries,
                }),
                pool,
                error_handler: Arc::clone(context.error_handler()),
            })
        })?;
        Ok(())
    }

    fn apply_work(&self, works: Vec<Work>, _monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let state = self.lifecycle.ready()?;
        if works.is_empty() {
            return Ok(());
        }
        self.dispatch(state, works)
    }

    fn apply_streaming_work(&self, work: Work, _monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let state = self.lifecycle.ready()?;
        self.dispatch(state, vec![work])
    }

    fn close(&self) -> Result<()> {
        if let Some(state) = self.lifecycle.close() {
            if let Some(pool) = &state.pool {
                pool.shutdown();
            }
            tracing::info!(index = %state.publisher.index_name, "queue backend closed");
        }
        Ok(())
    }
}
