//! Queue drainer: consumes a destination and applies each message locally
//!
//! Runs on tokio. Index application is blocking work, so each message is
//! decoded and applied on the blocking pool.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use super::broker::{QueueBroker, QueueMessage};
use crate::errors::IndexRelayError;
use crate::features::backend::error_handler::ErrorContext;
use crate::features::backend::index_manager::IndexManagerHolder;
use crate::features::backend::ports::TransportError;
use crate::features::protocol::WorkSerializer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: u64,
    /// Messages for indexes this process does not host
    pub skipped: u64,
    pub failed: u64,
}

enum Failure {
    Decode(IndexRelayError),
    Batch(ErrorContext),
}

pub struct QueueDrainer {
    destination: String,
    inbox: UnboundedReceiver<QueueMessage>,
    holder: Arc<IndexManagerHolder>,
    serializer: WorkSerializer,
    stats: DrainStats,
}

impl QueueDrainer {
    /// Become the consumer of `destination`
    pub fn new(
        broker: &QueueBroker,
        destination: impl Into<String>,
        holder: Arc<IndexManagerHolder>,
        serializer: WorkSerializer,
    ) -> Result<Self, TransportError> {
        let destination = destination.into();
        let inbox = broker.subscribe(&destination)?;
        Ok(Self {
            destination,
            inbox,
            holder,
            serializer,
            stats: DrainStats::default(),
        })
    }

    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Consume until the broker drops the destination
    pub async fn run(mut self) -> DrainStats {
        tracing::info!(destination = %self.destination, "queue drainer started");
        while let Some(message) = self.inbox.recv().await {
            self.handle(message).await;
        }
        tracing::info!(destination = %self.destination, stats = ?self.stats, "queue drainer stopped");
        self.stats
    }

    /// Apply whatever is already queued, then return
    pub async fn drain_pending(&mut self) -> DrainStats {
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message).await;
        }
        self.stats
    }

    async fn handle(&mut self, message: QueueMessage) {
        let Some(manager) = self.holder.get(&message.index_name) else {
            tracing::warn!(destination = %self.destination, index = %message.index_name, "no such index here, message skipped");
            self.stats.skipped += 1;
            return;
        };

        let serializer = self.serializer.clone();
        let index_name = message.index_name.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<usize, Failure> {
            let works = serializer.to_works(&message.payload).map_err(|e| Failure::Decode(e.into()))?;
            match manager.workspace().apply_now(&works, None) {
                Ok(()) => Ok(works.len()),
                Err(failure) => Err(Failure::Batch(failure.into_context(manager.name(), works))),
            }
        })
        .await;

        match outcome {
            Ok(Ok(works)) => {
                tracing::debug!(destination = %self.destination, index = %index_name, works, "applied queued batch");
                self.stats.applied += 1;
            }
            Ok(Err(Failure::Decode(error))) => {
                self.holder
                    .context()
                    .error_handler()
                    .handle_exception(&format!("undecodable queued batch for '{}'", index_name), &error);
                self.stats.failed += 1;
            }
            Ok(Err(Failure::Batch(context))) => {
                self.holder.context().error_handler().handle(context);
                self.stats.failed += 1;
            }
            Err(join_error) => {
                tracing::error!(destination = %self.destination, index = %index_name, error = %join_error, "apply task panicked");
                self.stats.failed += 1;
            }
        }
    }
}
