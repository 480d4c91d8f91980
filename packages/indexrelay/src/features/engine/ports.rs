// Ports: the index engine seen by backends

use std::ops::Bound;

use thiserror::Error;

use crate::features::work::domain::{Document, FieldAnalyzers, NumericKind, NumericValue};

/// Identity of one logical document inside an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub entity_type: String,
    pub tenant_id: Option<String>,
    pub id: String,
}

impl DocumentKey {
    pub fn new(
        entity_type: impl Into<String>,
        tenant_id: Option<&str>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            tenant_id: tenant_id.map(str::to_string),
            id: id.into(),
        }
    }

    /// Single-string form used as the engine's unique key term
    pub fn encoded(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.entity_type,
            self.tenant_id.as_deref().unwrap_or(""),
            self.id
        )
    }
}

/// Engine-independent query tree deletion queries convert into
#[derive(Debug, Clone, PartialEq)]
pub enum EngineQuery {
    Term {
        field: String,
        value: String,
    },
    Range {
        field: String,
        kind: NumericKind,
        lower: Bound<NumericValue>,
        upper: Bound<NumericValue>,
    },
    All,
    And(Vec<EngineQuery>),
}

impl EngineQuery {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        EngineQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Mutation interface of the underlying search engine
///
/// Mutations are staged until `commit`; reads (`document_count`,
/// `contains_document`) see committed state only.
pub trait IndexEngine: Send + Sync {
    /// Engine name (for logging)
    fn name(&self) -> &str;

    /// Insert or replace the document stored under `key`
    fn upsert_document(
        &self,
        key: &DocumentKey,
        document: &Document,
        analyzers: Option<&FieldAnalyzers>,
    ) -> Result<(), EngineError>;

    fn delete_document(&self, key: &DocumentKey) -> Result<(), EngineError>;

    /// Delete every document of `entity_type` (and tenant, if given) matching `query`
    fn delete_by_query(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        query: &EngineQuery,
    ) -> Result<(), EngineError>;

    /// Delete every document of `entity_type`, or of every type when `None`
    fn purge_all(&self, entity_type: Option<&str>, tenant_id: Option<&str>)
        -> Result<(), EngineError>;

    /// Make staged mutations durable and visible
    fn commit(&self) -> Result<(), EngineError>;

    /// Discard every mutation staged since the last commit
    fn rollback(&self) -> Result<(), EngineError>;

    /// Compact storage; never changes visible content
    fn optimize(&self) -> Result<(), EngineError>;

    fn document_count(&self, entity_type: Option<&str>) -> Result<usize, EngineError>;

    fn contains_document(&self, key: &DocumentKey) -> Result<bool, EngineError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused the mutation
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Document field not known to the engine schema
    #[error("Unsupported field: {0}")]
    UnsupportedField(String),

    /// Query cannot be expressed against the engine schema
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_key_separates_tenants() {
        let a = DocumentKey::new("Book", Some("acme"), "1");
        let b = DocumentKey::new("Book", None, "1");
        assert_ne!(a.encoded(), b.encoded());
        assert!(a.encoded().starts_with("Book"));
    }

    #[test]
    fn test_engine_error_display() {
        assert_eq!(
            EngineError::Rejected("Magazine".to_string()).to_string(),
            "Rejected: Magazine"
        );
        assert_eq!(
            EngineError::Storage("disk full".to_string()).to_string(),
            "Storage error: disk full"
        );
    }
}
