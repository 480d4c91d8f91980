//! Human-readable work descriptions for logs and error reports

use super::domain::{
    AddWork, DeleteByQueryWork, DeleteWork, FlushWork, OptimizeWork, PurgeAllWork, UpdateWork,
    Work,
};
use super::visitor::WorkVisitor;

pub struct WorkDescriber;

fn scope(entity_type: Option<&str>) -> &str {
    entity_type.unwrap_or("*")
}

fn tenant(tenant_id: Option<&str>) -> String {
    tenant_id.map(|t| format!(" tenant={}", t)).unwrap_or_default()
}

impl WorkVisitor<(), String> for WorkDescriber {
    fn visit_add_work(&mut self, work: &AddWork, _: ()) -> String {
        format!(
            "add {}#{} ({} fields){}",
            work.entity_type,
            work.id_in_string,
            work.document.len(),
            tenant(work.tenant_id.as_deref())
        )
    }

    fn visit_update_work(&mut self, work: &UpdateWork, _: ()) -> String {
        format!(
            "update {}#{} ({} fields){}",
            work.entity_type,
            work.id_in_string,
            work.document.len(),
            tenant(work.tenant_id.as_deref())
        )
    }

    fn visit_delete_work(&mut self, work: &DeleteWork, _: ()) -> String {
        format!(
            "delete {}#{}{}",
            work.entity_type,
            work.id_in_string,
            tenant(work.tenant_id.as_deref())
        )
    }

    fn visit_delete_by_query_work(&mut self, work: &DeleteByQueryWork, _: ()) -> String {
        format!(
            "delete {} where {:?}{}",
            work.entity_type,
            work.query,
            tenant(work.tenant_id.as_deref())
        )
    }

    fn visit_purge_all_work(&mut self, work: &PurgeAllWork, _: ()) -> String {
        format!(
            "purge {}{}",
            scope(work.entity_type.as_deref()),
            tenant(work.tenant_id.as_deref())
        )
    }

    fn visit_optimize_work(&mut self, work: &OptimizeWork, _: ()) -> String {
        format!("optimize {}", scope(work.entity_type.as_deref()))
    }

    fn visit_flush_work(&mut self, work: &FlushWork, _: ()) -> String {
        format!("flush {}", scope(work.entity_type.as_deref()))
    }
}

pub fn describe(work: &Work) -> String {
    work.accept_visitor(&mut WorkDescriber, ())
}
