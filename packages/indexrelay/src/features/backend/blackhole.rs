//! Blackhole backend: accepts everything, applies nothing
//!
//! Used to measure producer-side overhead without index I/O.

use std::sync::Arc;

use crate::config::IndexProperties;
use crate::errors::Result;
use crate::features::backend::lifecycle::Lifecycle;
use crate::features::backend::ports::{BackendQueueProcessor, IndexingMonitor, WorkerBuildContext};
use crate::features::backend::workspace::IndexWorkspace;
use crate::features::work::domain::Work;

pub struct BlackholeBackendQueueProcessor {
    lifecycle: Lifecycle<String>,
}

impl BlackholeBackendQueueProcessor {
    pub const NAME: &'static str = "blackhole";

    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(Self::NAME),
        }
    }
}

impl Default for BlackholeBackendQueueProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendQueueProcessor for BlackholeBackendQueueProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(
        &self,
        props: &IndexProperties,
        _context: &WorkerBuildContext,
        _workspace: Arc<IndexWorkspace>,
    ) -> Result<()> {
        self.lifecycle.initialize(|| {
            tracing::warn!(index = %props.index_name(), "blackhole backend: index will not be updated");
            Ok(props.index_name().to_string())
        })?;
        Ok(())
    }

    fn apply_work(&self, works: Vec<Work>, _monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let index = self.lifecycle.ready()?;
        tracing::debug!(%index, works = works.len(), "discarding batch");
        Ok(())
    }

    fn apply_streaming_work(&self, work: Work, _monitor: Option<Arc<dyn IndexingMonitor>>) -> Result<()> {
        let index = self.lifecycle.ready()?;
        tracing::trace!(%index, kind = ?work.kind(), "discarding work");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(index) = self.lifecycle.close() {
            tracing::debug!(%index, "blackhole backend closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::deletion_query::DeletionQueryRegistry;
    use crate::features::engine::{IndexEngine, InMemoryEngine};
    use crate::features::work::domain::Document;

    #[test]
    fn test_discards_everything() {
        let engine = Arc::new(InMemoryEngine::new("books"));
        let workspace = Arc::new(IndexWorkspace::new(
            "books",
            engine.clone(),
            Arc::new(DeletionQueryRegistry::standard()),
        ));
        let processor = BlackholeBackendQueueProcessor::new();
        assert!(processor.apply_work(vec![], None).is_err());

        processor
            .initialize(&IndexProperties::empty("books"), &WorkerBuildContext::standard(), workspace)
            .unwrap();
        processor
            .apply_work(vec![Work::add("Book", 1, Document::new()), Work::flush(None)], None)
            .unwrap();
        assert_eq!(engine.document_count(None).unwrap(), 0);
        assert_eq!(engine.commit_count(), 0);

        processor.close().unwrap();
        assert!(processor.apply_work(vec![], None).is_err());
    }
}
