//! Work visitor (double dispatch)
//!
//! One method per work variant. Adding a variant to `Work` breaks every
//! implementation at compile time, so no backend can silently skip it.

use super::domain::work::{
    AddWork, DeleteByQueryWork, DeleteWork, FlushWork, OptimizeWork, PurgeAllWork, UpdateWork,
};

/// Operation-specific handler selected by `Work::accept_visitor`
pub trait WorkVisitor<P, R> {
    fn visit_add_work(&mut self, work: &AddWork, p: P) -> R;
    fn visit_update_work(&mut self, work: &UpdateWork, p: P) -> R;
    fn visit_delete_work(&mut self, work: &DeleteWork, p: P) -> R;
    fn visit_delete_by_query_work(&mut self, work: &DeleteByQueryWork, p: P) -> R;
    fn visit_purge_all_work(&mut self, work: &PurgeAllWork, p: P) -> R;
    fn visit_optimize_work(&mut self, work: &OptimizeWork, p: P) -> R;
    fn visit_flush_work(&mut self, work: &FlushWork, p: P) -> R;
}
