//! Cluster backend
//!
//! The owner of an index applies work through an embedded local processor.
//! Everyone else serializes the batch and forwards it to the owner, or
//! broadcasts when no owner is known. With `cluster.block_waiting_ack` the
//! producer waits for the owner's acknowledgement up to
//! `cluster.messages_timeout`.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use super::channel::ClusterNode;
use super::node_selector::{NodeSelector, SelectorKind};
use crate::config::{keys, ConfigError, IndexProperties, WorkerSettings};
use crate::errors::Result;
use crate::features::backend::error_handler::{ErrorContext, ErrorHandler};
use crate::features::backend::lifecycle::Lifecycle;
use crate::features::backend::local::{LocalBackendQueueProcessor, WorkerPool};
use crate::features::backend::ports::{
    BackendQueueProcessor, IndexingMonitor, TransportError, WorkerBuildContext,
};
use crate::features::backend::workspace::IndexWorkspace;
use crate::features::protocol::WorkSerializer;
use crate::features::work::domain::Work;

pub const DEFAULT_MESSAGES_TIMEOUT_MS: u64 = 20_000;

struct Forwarder {
    index_name: String,
    node: Arc<ClusterNode>,
    selector: Box<dyn NodeSelector>,
    serializer: WorkSerializer,
    block_waiting_ack: bool,
    timeout: Duration,
}

impl Forwarder {
    fn forward(&self, works: &[Work]) -> Result<()> {
        let payload = self.serializer.to_serialized_model(works)?;
        let (reply_to, acks) = if self.block_waiting_ack {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let target = match self.selector.owner(&self.index_name) {
            Some(owner) => {
                tracing::debug!(index = %self.index_name, to = %owner, works = works.len(), "forwarding batch");
                self.node.send(&owner, &self.index_name, payload, reply_to)?;
                owner.to_string()
            }
            None => {
                let reached = self.node.broadcast(&self.index_name, &payload, reply_to)?;
                if reached == 0 {
                    return Err(TransportError::NoMaster(self.index_name.clone()).into());
                }
                tracing::debug!(index = %self.index_name, reached, "broadcast batch, owner unknown");
                "cluster".to_string()
            }
        };

        let Some(acks) = acks else {
            return Ok(());
        };
        match acks.recv_timeout(self.timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(remote)) => Err(TransportError::Remote(remote).into()),
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout {
                target,
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .into()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(TransportError::NoMaster(self.index_name.clone()).into())
            }
        }
    }
}

struct ClusterState {
    forwarder: Arc<Forwarder>,
    local: LocalBackendQueueProcessor,
    pool: Option<WorkerPool>,
    error_handler: Arc<dyn ErrorHandler>,
}

pub struct ClusterBackendQueueProcessor {
    kind: SelectorKind,
    lifecycle: Lifecycle<ClusterState>,
}

impl ClusterBackendQueueProcessor {
    pub fn new(kind: SelectorKind) -> Self {
        let name = match kind {
            SelectorKind::Master => "jgroupsMaster",
            SelectorKind::Slave => "jgroupsSlave",
            SelectorKind::Auto => "jgroups",
        };
        Self {
            kind,
            lifecycle: Lifecycle::new(name),
        }
    }

    pub fn master() -> Self {
        Self::new(SelectorKind::Master)
    }

    pub fn slave() -> Self {
        Self::new(SelectorKind::Slave)
    }

    pub fn auto() -> Self {
        Self::new(SelectorKind::Auto)
    }

    pub fn selector_kind(&self) -> SelectorKind {
        self.kind
    }

    fn owns(&self, state: &ClusterState) -> bool {
        state.forwarder.selector.is_index_owner(&state.forwarder.index_name)
    }

    fn dispatch_remote(&self, state: &ClusterState, works: Vec<Work>) -> Result<()> {
        match &state.pool {
            None => state.forwarder.forward(&works),
            Some(pool) => {
                let forwarder = Arc::clone(&state.forwarder);
                let handler = Arc::clone(&state.error_handler);
                pool.execute(move || {
                    if let Err(error) = forwarder.forward(&works) {
                        let mut works = works;
                        let failing_work = if works.is_empty() { None } else { Some(works.remove(0)) };
                        handler.handle(ErrorContext {
                            index_name: forwarder.index_name.clone(),
                            failing_work,
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

impl BackendQueueProcessor for ClusterBackendQueueProcessor {
    fn name(&self) -> &str {
        self.lifecycle.backend()
    }

    fn initialize(
        &self,
        props: &IndexProperties,
        context: &WorkerBuildContext,
        workspace: Arc<IndexWorkspace>,
    ) -> Result<()> {
        self.lifecycle.initialize(|| {
            let node = context.cluster_node().cloned().ok_or_else(|| {
                ConfigError::missing_collaborator(self.lifecycle.backend(), "a cluster node")
            })?;
            let settings = WorkerSettings::from_properties(props)?;
            let block_waiting_ack = props
                .get_bool(keys::CLUSTER_BLOCK_WAITING_ACK)?
                .unwrap_or(settings.is_sync());
            let timeout_ms = props
                .get_u64(keys::CLUSTER_MESSAGES_TIMEOUT)?
                .unwrap_or(DEFAULT_MESSAGES_TIMEOUT_MS);

            let selector = self.kind.build(Arc::clone(&node));
            selector.on_start(props.index_name());

            let local = LocalBackendQueueProcessor::new();
            local.initialize(props, context, workspace)?;

            let pool = if settings.is_sync() {
                None
            } else {
                Some(WorkerPool::new(
                    format!("{}-forward", props.index_name()),
                    settings.thread_pool_size,
                    settings.work_queue_size,
                )?)
            };

            tracing::info!(
                index = %props.index_name(),
                node = %node.address(),
                selector = ?self.kind,
                block_waiting_ack,
                timeout_ms,
                "cluster backend ready"
            );
            Ok(ClusterState {
                forwarder: Arc::new(Forwarder {
                    index_name: props.index_name().to_string(),
                    node,
                    selector,
                    serializer: context.serializer().clone(),
                    block_waiting_ack,
                    timeout: Duration::from_millis(timeout_ms),
                }),
                local,
                pool,
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
        if self.owns(state) {
            state.local.apply_work(works, monitor)
        } else {
            self.dispatch_remote(state, works)
        }
    }

    fn apply_streaming_work(&self, work: Work, monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let state = self.lifecycle.ready()?;
        if self.owns(state) {
            state.local.apply_streaming_work(work, monitor)
        } else {
            self.dispatch_remote(state, vec![work])
        }
    }

    fn index_mapping_changed(&self) {
        if let Ok(state) = self.lifecycle.ready() {
            state.local.index_mapping_changed();
        }
    }

    fn accepts_remote_work(&self) -> bool {
        self.lifecycle
            .ready()
            .map(|state| self.owns(state))
            .unwrap_or(false)
    }

    fn close(&self) -> Result<()> {
        let Some(state) = self.lifecycle.close() else {
            return Ok(());
        };
        if let Some(pool) = &state.pool {
            pool.shutdown();
        }
        state.local.close()?;
        tracing::info!(index = %state.forwarder.index_name, "cluster backend closed");
        Ok(())
    }
}
