//! Per-variant work executors against an `IndexWorkspace`
//!
//! Add and Update both upsert: replaying the same Add leaves one document.

use crate::errors::Result;
use crate::features::backend::ports::IndexingMonitor;
use crate::features::backend::workspace::IndexWorkspace;
use crate::features::engine::DocumentKey;
use crate::features::work::domain::{
    AddWork, DeleteByQueryWork, DeleteWork, FlushWork, OptimizeWork, PurgeAllWork, UpdateWork,
};
use crate::features::work::WorkVisitor;

pub struct WorkExecutor<'m> {
    monitor: Option<&'m dyn IndexingMonitor>,
}

impl<'m> WorkExecutor<'m> {
    pub fn new(monitor: Option<&'m dyn IndexingMonitor>) -> Self {
        Self { monitor }
    }

    fn added(&self) {
        if let Some(monitor) = self.monitor {
            monitor.documents_added(1);
        }
    }
}

impl<'w> WorkVisitor<&'w IndexWorkspace, Result<()>> for WorkExecutor<'_> {
    fn visit_add_work(&mut self, work: &AddWork, ws: &'w IndexWorkspace) -> Result<()> {
        let key = DocumentKey::new(&work.entity_type, work.tenant_id.as_deref(), &work.id_in_string);
        ws.engine()
            .upsert_document(&key, &work.document, work.field_to_analyzer_map.as_ref())?;
        self.added();
        Ok(())
    }

    fn visit_update_work(&mut self, work: &UpdateWork, ws: &'w IndexWorkspace) -> Result<()> {
        let key = DocumentKey::new(&work.entity_type, work.tenant_id.as_deref(), &work.id_in_string);
        ws.engine()
            .upsert_document(&key, &work.document, work.field_to_analyzer_map.as_ref())?;
        self.added();
        Ok(())
    }

    fn visit_delete_work(&mut self, work: &DeleteWork, ws: &'w IndexWorkspace) -> Result<()> {
        let key = DocumentKey::new(&work.entity_type, work.tenant_id.as_deref(), &work.id_in_string);
        ws.engine().delete_document(&key)?;
        Ok(())
    }

    fn visit_delete_by_query_work(&mut self, work: &DeleteByQueryWork, ws: &'w IndexWorkspace) -> Result<()> {
        let query = ws.registry().to_engine_query(&work.query)?;
        ws.engine()
            .delete_by_query(&work.entity_type, work.tenant_id.as_deref(), &query)?;
        Ok(())
    }

    fn visit_purge_all_work(&mut self, work: &PurgeAllWork, ws: &'w IndexWorkspace) -> Result<()> {
        ws.engine()
            .purge_all(work.entity_type.as_deref(), work.tenant_id.as_deref())?;
        Ok(())
    }

    fn visit_optimize_work(&mut self, _work: &OptimizeWork, ws: &'w IndexWorkspace) -> Result<()> {
        ws.engine().optimize()?;
        Ok(())
    }

    fn visit_flush_work(&mut self, _work: &FlushWork, ws: &'w IndexWorkspace) -> Result<()> {
        ws.engine().commit()?;
        Ok(())
    }
}
