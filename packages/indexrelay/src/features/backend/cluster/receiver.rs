//! Cluster receiver: applies forwarded batches for indexes this node owns

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::channel::{Ack, Envelope, NodeAddress};
use crate::features::backend::index_manager::IndexManagerHolder;
use crate::features::protocol::WorkSerializer;

#[derive(Debug, Default)]
pub struct ReceiverStats {
    applied: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl ReceiverStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }
}

pub struct ClusterReceiver {
    address: NodeAddress,
    holder: Arc<IndexManagerHolder>,
    serializer: WorkSerializer,
    stats: Arc<ReceiverStats>,
}

impl ClusterReceiver {
    pub fn new(address: NodeAddress, holder: Arc<IndexManagerHolder>, serializer: WorkSerializer) -> Self {
        Self {
            address,
            holder,
            serializer,
            stats: Arc::new(ReceiverStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.stats)
    }

    /// Handle one envelope; `None` when it was ignored
    pub fn handle(&self, envelope: &Envelope) -> Option<Ack> {
        let Some(manager) = self.holder.get(&envelope.index_name) else {
            tracing::warn!(node = %self.address, from = %envelope.from, index = %envelope.index_name, "no such index here, message ignored");
            self.stats.ignored.fetch_add(1, Ordering::AcqRel);
            return None;
        };
        if !manager.accepts_remote_work() {
            tracing::warn!(node = %self.address, from = %envelope.from, index = %envelope.index_name, "not the index owner, message ignored");
            self.stats.ignored.fetch_add(1, Ordering::AcqRel);
            return None;
        }

        let works = match self.serializer.to_works(&envelope.payload) {
            Ok(works) => works,
            Err(e) => {
                let reply = e.to_string();
                self.holder
                    .context()
                    .error_handler()
                    .handle_exception("undecodable cluster message", &e.into());
                self.stats.failed.fetch_add(1, Ordering::AcqRel);
                return Some(Err(reply));
            }
        };

        match manager.workspace().apply_now(&works, None) {
            Ok(()) => {
                tracing::debug!(from = %envelope.from, index = %envelope.index_name, works = works.len(), "applied remote batch");
                self.stats.applied.fetch_add(1, Ordering::AcqRel);
                Some(Ok(()))
            }
            Err(failure) => {
                let reply = failure.error.to_string();
                let context = failure.into_context(&envelope.index_name, works);
                self.holder.context().error_handler().handle(context);
                self.stats.failed.fetch_add(1, Ordering::AcqRel);
                Some(Err(reply))
            }
        }
    }

    /// Run until the node leaves the channel
    pub fn run(self, inbox: Receiver<Envelope>) {
        for envelope in inbox {
            if let Some(ack) = self.handle(&envelope) {
                if let Some(reply_to) = &envelope.reply_to {
                    // sender may have timed out already
                    let _ = reply_to.send(ack);
                }
            }
        }
        tracing::debug!(node = %self.address, "cluster receiver stopped");
    }

    pub fn spawn(self, inbox: Receiver<Envelope>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("indexrelay-receiver-{}", self.address))
            .spawn(move || self.run(inbox))
    }
}
