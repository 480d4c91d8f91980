//! Work: one discrete index mutation
//!
//! # Invariants
//!
//! Carried by the variant structs rather than checked at runtime:
//! - Add / Update / Delete always hold an id, its string form and a type
//! - PurgeAll / Optimize / Flush hold an optional type (`None` = every type)
//! - DeleteByQuery holds a `DeletionQuery` and a type instead of an id
//!
//! Work is immutable once built and cheap to share across threads.

use std::collections::BTreeMap;
use std::fmt;

use super::document::Document;
use super::entity_id::EntityId;
use crate::features::deletion_query::DeletionQuery;
use crate::features::work::visitor::WorkVisitor;

/// Per-field analyzer override (field name → analyzer name)
pub type FieldAnalyzers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct AddWork {
    pub tenant_id: Option<String>,
    pub id: EntityId,
    pub id_in_string: String,
    pub entity_type: String,
    pub document: Document,
    pub field_to_analyzer_map: Option<FieldAnalyzers>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateWork {
    pub tenant_id: Option<String>,
    pub id: EntityId,
    pub id_in_string: String,
    pub entity_type: String,
    pub document: Document,
    pub field_to_analyzer_map: Option<FieldAnalyzers>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteWork {
    pub tenant_id: Option<String>,
    pub id: EntityId,
    pub id_in_string: String,
    pub entity_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteByQueryWork {
    pub tenant_id: Option<String>,
    pub entity_type: String,
    pub query: DeletionQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurgeAllWork {
    pub tenant_id: Option<String>,
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeWork {
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlushWork {
    pub entity_type: Option<String>,
}

/// A single index mutation instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Work {
    Add(AddWork),
    Update(UpdateWork),
    Delete(DeleteWork),
    DeleteByQuery(DeleteByQueryWork),
    PurgeAll(PurgeAllWork),
    Optimize(OptimizeWork),
    Flush(FlushWork),
}

impl Work {
    pub fn add(
        entity_type: impl Into<String>,
        id: impl Into<EntityId>,
        document: Document,
    ) -> Self {
        let id = id.into();
        Work::Add(AddWork {
            tenant_id: None,
            id_in_string: id.to_string(),
            id,
            entity_type: entity_type.into(),
            document,
            field_to_analyzer_map: None,
        })
    }

    pub fn update(
        entity_type: impl Into<String>,
        id: impl Into<EntityId>,
        document: Document,
    ) -> Self {
        let id = id.into();
        Work::Update(UpdateWork {
            tenant_id: None,
            id_in_string: id.to_string(),
            id,
            entity_type: entity_type.into(),
            document,
            field_to_analyzer_map: None,
        })
    }

    pub fn delete(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        let id = id.into();
        Work::Delete(DeleteWork {
            tenant_id: None,
            id_in_string: id.to_string(),
            id,
            entity_type: entity_type.into(),
        })
    }

    pub fn delete_by_query(entity_type: impl Into<String>, query: DeletionQuery) -> Self {
        Work::DeleteByQuery(DeleteByQueryWork {
            tenant_id: None,
            entity_type: entity_type.into(),
            query,
        })
    }

    /// Purge one type, or every type when `entity_type` is `None`
    pub fn purge_all(entity_type: Option<String>) -> Self {
        Work::PurgeAll(PurgeAllWork {
            tenant_id: None,
            entity_type,
        })
    }

    pub fn optimize(entity_type: Option<String>) -> Self {
        Work::Optimize(OptimizeWork { entity_type })
    }

    pub fn flush(entity_type: Option<String>) -> Self {
        Work::Flush(FlushWork { entity_type })
    }

    /// Attach a tenant; ignored by Optimize and Flush, which are tenant-agnostic
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        let tenant = Some(tenant_id.into());
        match &mut self {
            Work::Add(w) => w.tenant_id = tenant,
            Work::Update(w) => w.tenant_id = tenant,
            Work::Delete(w) => w.tenant_id = tenant,
            Work::DeleteByQuery(w) => w.tenant_id = tenant,
            Work::PurgeAll(w) => w.tenant_id = tenant,
            Work::Optimize(_) | Work::Flush(_) => {}
        }
        self
    }

    /// Override the identifier's string form supplied by the mapping layer
    pub fn with_id_string(mut self, id_in_string: impl Into<String>) -> Self {
        let id_in_string = id_in_string.into();
        match &mut self {
            Work::Add(w) => w.id_in_string = id_in_string,
            Work::Update(w) => w.id_in_string = id_in_string,
            Work::Delete(w) => w.id_in_string = id_in_string,
            _ => {}
        }
        self
    }

    /// Attach per-field analyzer overrides (Add/Update only)
    pub fn with_field_analyzers(mut self, analyzers: FieldAnalyzers) -> Self {
        match &mut self {
            Work::Add(w) => w.field_to_analyzer_map = Some(analyzers),
            Work::Update(w) => w.field_to_analyzer_map = Some(analyzers),
            _ => {}
        }
        self
    }

    /// Double dispatch: call the visitor method matching this variant
    pub fn accept_visitor<P, R, V>(&self, visitor: &mut V, parameter: P) -> R
    where
        V: WorkVisitor<P, R> + ?Sized,
    {
        match self {
            Work::Add(w) => visitor.visit_add_work(w, parameter),
            Work::Update(w) => visitor.visit_update_work(w, parameter),
            Work::Delete(w) => visitor.visit_delete_work(w, parameter),
            Work::DeleteByQuery(w) => visitor.visit_delete_by_query_work(w, parameter),
            Work::PurgeAll(w) => visitor.visit_purge_all_work(w, parameter),
            Work::Optimize(w) => visitor.visit_optimize_work(w, parameter),
            Work::Flush(w) => visitor.visit_flush_work(w, parameter),
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Work::Add(w) => w.tenant_id.as_deref(),
            Work::Update(w) => w.tenant_id.as_deref(),
            Work::Delete(w) => w.tenant_id.as_deref(),
            Work::DeleteByQuery(w) => w.tenant_id.as_deref(),
            Work::PurgeAll(w) => w.tenant_id.as_deref(),
            Work::Optimize(_) | Work::Flush(_) => None,
        }
    }

    pub fn id(&self) -> Option<&EntityId> {
        match self {
            Work::Add(w) => Some(&w.id),
            Work::Update(w) => Some(&w.id),
            Work::Delete(w) => Some(&w.id),
            _ => None,
        }
    }

    pub fn id_in_string(&self) -> Option<&str> {
        match self {
            Work::Add(w) => Some(&w.id_in_string),
            Work::Update(w) => Some(&w.id_in_string),
            Work::Delete(w) => Some(&w.id_in_string),
            _ => None,
        }
    }

    /// Entity type; `None` means the work targets every type
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Work::Add(w) => Some(&w.entity_type),
            Work::Update(w) => Some(&w.entity_type),
            Work::Delete(w) => Some(&w.entity_type),
            Work::DeleteByQuery(w) => Some(&w.entity_type),
            Work::PurgeAll(w) => w.entity_type.as_deref(),
            Work::Optimize(w) => w.entity_type.as_deref(),
            Work::Flush(w) => w.entity_type.as_deref(),
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Work::Add(w) => Some(&w.document),
            Work::Update(w) => Some(&w.document),
            _ => None,
        }
    }

    pub fn field_to_analyzer_map(&self) -> Option<&FieldAnalyzers> {
        match self {
            Work::Add(w) => w.field_to_analyzer_map.as_ref(),
            Work::Update(w) => w.field_to_analyzer_map.as_ref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> WorkKind {
        match self {
            Work::Add(_) => WorkKind::Add,
            Work::Update(_) => WorkKind::Update,
            Work::Delete(_) => WorkKind::Delete,
            Work::DeleteByQuery(_) => WorkKind::DeleteByQuery,
            Work::PurgeAll(_) => WorkKind::PurgeAll,
            Work::Optimize(_) => WorkKind::Optimize,
            Work::Flush(_) => WorkKind::Flush,
        }
    }
}

/// Variant tag, for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Add,
    Update,
    Delete,
    DeleteByQuery,
    PurgeAll,
    Optimize,
    Flush,
}

impl WorkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Add => "add",
            WorkKind::Update => "update",
            WorkKind::Delete => "delete",
            WorkKind::DeleteByQuery => "delete_by_query",
            WorkKind::PurgeAll => "purge_all",
            WorkKind::Optimize => "optimize",
            WorkKind::Flush => "flush",
        }
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind().as_str())?;
        match (self.entity_type(), self.id_in_string()) {
            (Some(t), Some(id)) => write!(f, "({}#{})", t, id)?,
            (Some(t), None) => write!(f, "({})", t)?,
            (None, _) => write!(f, "(*)")?,
        }
        if let Some(tenant) = self.tenant_id() {
            write!(f, "@{}", tenant)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::work::domain::document::Field;

    #[test]
    fn test_add_carries_id_and_type() {
        let work = Work::add("Book", 1i64, Document::new().field(Field::text("title", "x")));
        assert_eq!(work.entity_type(), Some("Book"));
        assert_eq!(work.id(), Some(&EntityId::Long(1)));
        assert_eq!(work.id_in_string(), Some("1"));
        assert!(work.document().is_some());
    }

    #[test]
    fn test_untyped_purge_targets_every_type() {
        let work = Work::purge_all(None);
        assert_eq!(work.entity_type(), None);
        assert_eq!(work.id(), None);
        assert_eq!(work.to_string(), "purge_all(*)");
    }

    #[test]
    fn test_tenant_is_ignored_for_flush() {
        let work = Work::flush(Some("Book".to_string())).with_tenant("acme");
        assert_eq!(work.tenant_id(), None);

        let work = Work::delete("Book", 3i64).with_tenant("acme");
        assert_eq!(work.tenant_id(), Some("acme"));
        assert_eq!(work.to_string(), "delete(Book#3)@acme");
    }

    #[test]
    fn test_id_string_override() {
        let work = Work::delete("Book", EntityId::Opaque(vec![1, 2])).with_id_string("1-2");
        assert_eq!(work.id_in_string(), Some("1-2"));
    }

    #[test]
    fn test_field_analyzers_only_on_documents() {
        let mut analyzers = FieldAnalyzers::new();
        analyzers.insert("title".to_string(), "english".to_string());

        let add = Work::add("Book", 1, Document::new()).with_field_analyzers(analyzers.clone());
        assert_eq!(add.field_to_analyzer_map(), Some(&analyzers));

        let delete = Work::delete("Book", 1).with_field_analyzers(analyzers);
        assert_eq!(delete.field_to_analyzer_map(), None);
    }
}
