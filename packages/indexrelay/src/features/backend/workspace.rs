//! Index workspace: one engine plus the flush barrier of its index manager

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error_handler::ErrorContext;
use super::local::executors::WorkExecutor;
use super::local::flush_barrier::{BatchTicket, FlushBarrier};
use super::ports::IndexingMonitor;
use crate::errors::IndexRelayError;
use crate::features::deletion_query::DeletionQueryRegistry;
use crate::features::engine::IndexEngine;
use crate::features::work::domain::{Work, WorkKind};

/// A batch that stopped part-way
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the failing work; `None` when the commit failed
    pub failed_at: Option<usize>,
    pub error: IndexRelayError,
}

impl BatchFailure {
    pub fn into_context(self, index_name: &str, mut works: Vec<Work>) -> ErrorContext {
        let (failing_work, unprocessed) = match self.failed_at {
            Some(pos) if pos < works.len() => {
                let rest = works.split_off(pos + 1);
                (works.pop(), rest)
            }
            _ => (None, works),
        };
        ErrorContext {
            index_name: index_name.to_string(),
            failing_work,
            unprocessed,
            error: self.error,
        }
    }
}

pub struct IndexWorkspace {
    index_name: String,
    engine: Arc<dyn IndexEngine>,
    registry: Arc<DeletionQueryRegistry>,
    barrier: Arc<FlushBarrier>,
    /// Held while a batch stages and commits or rolls back
    apply: Mutex<()>,
    /// Streaming work staged but not yet committed
    streamed: AtomicBool,
}

impl IndexWorkspace {
    pub fn new(
        index_name: impl Into<String>,
        engine: Arc<dyn IndexEngine>,
        registry: Arc<DeletionQueryRegistry>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            engine,
            registry,
            barrier: FlushBarrier::new(),
            apply: Mutex::new(()),
            streamed: AtomicBool::new(false),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn engine(&self) -> &Arc<dyn IndexEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &DeletionQueryRegistry {
        &self.registry
    }

    pub fn barrier(&self) -> &Arc<FlushBarrier> {
        &self.barrier
    }

    /// Take a place in submission order (call on the producer's thread)
    pub fn begin_batch(&self) -> BatchTicket {
        self.barrier.register()
    }

    /// Apply a batch holding `ticket`, then commit
    ///
    /// Batches containing a flush first wait for every earlier ticket. A
    /// batch that fails part-way is rolled back, so none of its writes
    /// outlive the failure (unless a flush inside it already committed them).
    pub fn run_batch(
        &self,
        ticket: BatchTicket,
        works: &[Work],
        monitor: Option<&dyn IndexingMonitor>,
    ) -> Result<(), BatchFailure> {
        if works.iter().any(|w| w.kind() == WorkKind::Flush) {
            self.barrier.wait_for_predecessors(&ticket);
        }

        let _apply = self.apply.lock();
        if self.streamed.swap(false, Ordering::AcqRel) {
            self.engine.commit().map_err(|e| BatchFailure {
                failed_at: None,
                error: e.into(),
            })?;
        }

        tracing::debug!(index = %self.index_name, works = works.len(), "applying batch");
        let mut executor = WorkExecutor::new(monitor);
        for (pos, work) in works.iter().enumerate() {
            if let Err(error) = work.accept_visitor(&mut executor, self) {
                self.rollback(pos);
                return Err(BatchFailure {
                    failed_at: Some(pos),
                    error,
                });
            }
        }
        if let Err(e) = self.engine.commit() {
            self.rollback(works.len());
            return Err(BatchFailure {
                failed_at: None,
                error: e.into(),
            });
        }
        drop(ticket);
        Ok(())
    }

    fn rollback(&self, applied: usize) {
        match self.engine.rollback() {
            Ok(()) => {
                tracing::debug!(index = %self.index_name, applied, "failed batch rolled back");
            }
            Err(e) => {
                tracing::error!(index = %self.index_name, error = %e, "rollback of failed batch failed");
            }
        }
    }

    /// Register and apply in one step (caller's thread)
    pub fn apply_now(&self, works: &[Work], monitor: Option<&dyn IndexingMonitor>) -> Result<(), BatchFailure> {
        let ticket = self.begin_batch();
        self.run_batch(ticket, works, monitor)
    }

    /// Apply a single work without committing
    pub fn run_streaming(
        &self,
        ticket: BatchTicket,
        work: &Work,
        monitor: Option<&dyn IndexingMonitor>,
    ) -> crate::errors::Result<()> {
        if work.kind() == WorkKind::Flush {
            self.barrier.wait_for_predecessors(&ticket);
        }
        let _apply = self.apply.lock();
        let mut executor = WorkExecutor::new(monitor);
        work.accept_visitor(&mut executor, self)?;
        self.streamed
            .store(work.kind() != WorkKind::Flush, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for IndexWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWorkspace")
            .field("index_name", &self.index_name)
            .field("engine", &self.engine.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::engine::{DocumentKey, EngineError, InMemoryEngine};
    use crate::features::work::domain::{Document, Field};

    fn workspace() -> (Arc<InMemoryEngine>, IndexWorkspace) {
        let engine = Arc::new(InMemoryEngine::new("books"));
        let ws = IndexWorkspace::new(
            "books",
            engine.clone(),
            Arc::new(DeletionQueryRegistry::standard()),
        );
        (engine, ws)
    }

    fn doc(title: &str) -> Document {
        Document::new().field(Field::text("title", title))
    }

    #[test]
    fn test_batch_is_committed() {
        let (engine, ws) = workspace();
        ws.apply_now(&[Work::add("Book", 1, doc("Dune"))], None).unwrap();
        assert_eq!(engine.document_count(None).unwrap(), 1);
        assert_eq!(engine.commit_count(), 1);
        assert_eq!(ws.barrier().in_flight(), 0);
    }

    #[test]
    fn test_failure_reports_position() {
        let (engine, ws) = workspace();
        engine.reject_type("Magazine");
        let batch = vec![
            Work::add("Book", 1, doc("Dune")),
            Work::add("Magazine", 2, doc("Wired")),
            Work::add("Book", 3, doc("Emma")),
        ];
        let failure = ws.apply_now(&batch, None).unwrap_err();
        assert_eq!(failure.failed_at, Some(1));
        assert!(matches!(
            failure.error,
            IndexRelayError::Engine(EngineError::Rejected(_))
        ));
        assert!(!engine
            .contains_document(&DocumentKey::new("Book", None, "3"))
            .unwrap());

        let context = failure.into_context("books", batch);
        assert_eq!(
            context.failing_work.as_ref().and_then(|w| w.id_in_string()),
            Some("2")
        );
        assert_eq!(context.unprocessed.len(), 1);
        assert_eq!(ws.barrier().in_flight(), 0);
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let (engine, ws) = workspace();
        engine.reject_type("Magazine");
        ws.apply_now(
            &[
                Work::add("Book", 1, doc("Dune")),
                Work::add("Magazine", 2, doc("Wired")),
            ],
            None,
        )
        .unwrap_err();
        assert_eq!(engine.pending_count(), 0);

        ws.apply_now(&[Work::add("Book", 3, doc("Emma"))], None).unwrap();
        assert_eq!(engine.keys(), vec![DocumentKey::new("Book", None, "3")]);
    }

    #[test]
    fn test_streamed_work_survives_failed_batch() {
        let (engine, ws) = workspace();
        engine.reject_type("Magazine");
        let ticket = ws.begin_batch();
        ws.run_streaming(ticket, &Work::add("Book", 1, doc("Dune")), None)
            .unwrap();

        ws.apply_now(&[Work::add("Magazine", 2, doc("Wired"))], None)
            .unwrap_err();
        assert_eq!(engine.keys(), vec![DocumentKey::new("Book", None, "1")]);
    }

    #[test]
    fn test_streaming_does_not_commit() {
        let (engine, ws) = workspace();
        let ticket = ws.begin_batch();
        ws.run_streaming(ticket, &Work::add("Book", 1, doc("Dune")), None)
            .unwrap();
        assert_eq!(engine.commit_count(), 0);
        assert_eq!(engine.pending_count(), 1);
    }
}
