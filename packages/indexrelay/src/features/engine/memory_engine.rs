//! In-memory engine
//!
//! Staged mutations are kept in submission order and replayed on `commit`,
//! so the visible state only ever moves from one commit to the next.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::ports::{DocumentKey, EngineError, EngineQuery, IndexEngine};
use crate::features::work::domain::{Document, Field, FieldAnalyzers, NumericValue};

#[derive(Debug, Clone)]
enum PendingOp {
    Upsert(DocumentKey, Document),
    Delete(DocumentKey),
    DeleteByQuery {
        entity_type: String,
        tenant_id: Option<String>,
        query: EngineQuery,
    },
    Purge {
        entity_type: Option<String>,
        tenant_id: Option<String>,
    },
}

pub struct InMemoryEngine {
    name: String,
    committed: RwLock<BTreeMap<DocumentKey, Document>>,
    pending: Mutex<Vec<PendingOp>>,
    rejected_types: RwLock<HashSet<String>>,
    commits: AtomicU64,
    optimizations: AtomicU64,
}

impl InMemoryEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            committed: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(Vec::new()),
            rejected_types: RwLock::new(HashSet::new()),
            commits: AtomicU64::new(0),
            optimizations: AtomicU64::new(0),
        }
    }

    /// Refuse every upsert of `entity_type` from now on
    pub fn reject_type(&self, entity_type: impl Into<String>) {
        self.rejected_types.write().insert(entity_type.into());
    }

    /// Committed document stored under `key`
    pub fn get_document(&self, key: &DocumentKey) -> Option<Document> {
        self.committed.read().get(key).cloned()
    }

    /// Committed keys, sorted
    pub fn keys(&self) -> Vec<DocumentKey> {
        self.committed.read().keys().cloned().collect()
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    pub fn optimize_count(&self) -> u64 {
        self.optimizations.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn stage(&self, op: PendingOp) {
        self.pending.lock().push(op);
    }
}

fn tenant_matches(filter: Option<&str>, key: &DocumentKey) -> bool {
    match filter {
        None => true,
        Some(t) => key.tenant_id.as_deref() == Some(t),
    }
}

fn field_matches_term(field: &Field, value: &str) -> bool {
    match field {
        Field::Text(f) => f.value == value,
        Field::Numeric(f) => f.value.to_string() == value,
        Field::Reader(f) => f.content == value,
        Field::TokenStream(f) => f.tokens.iter().any(|t| t.char_term() == Some(value)),
        Field::Binary(_) | Field::Custom(_) => false,
    }
}

fn within(value: f64, lower: &Bound<NumericValue>, upper: &Bound<NumericValue>) -> bool {
    let above = match lower {
        Bound::Included(l) => value >= l.as_f64(),
        Bound::Excluded(l) => value > l.as_f64(),
        Bound::Unbounded => true,
    };
    let below = match upper {
        Bound::Included(u) => value <= u.as_f64(),
        Bound::Excluded(u) => value < u.as_f64(),
        Bound::Unbounded => true,
    };
    above && below
}

/// Evaluate `query` against a stored document
pub(crate) fn query_matches(query: &EngineQuery, document: &Document) -> bool {
    match query {
        EngineQuery::All => true,
        EngineQuery::Term { field, value } => document
            .get_all(field)
            .any(|f| field_matches_term(f, value)),
        EngineQuery::Range {
            field,
            kind,
            lower,
            upper,
        } => document.get_all(field).any(|f| match f {
            Field::Numeric(n) if n.value.kind() == *kind => within(n.value.as_f64(), lower, upper),
            _ => false,
        }),
        EngineQuery::And(parts) => parts.iter().all(|q| query_matches(q, document)),
    }
}

impl IndexEngine for InMemoryEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert_document(
        &self,
        key: &DocumentKey,
        document: &Document,
        _analyzers: Option<&FieldAnalyzers>,
    ) -> Result<(), EngineError> {
        if self.rejected_types.read().contains(&key.entity_type) {
            return Err(EngineError::Rejected(format!(
                "{} does not accept documents of type {}",
                self.name, key.entity_type
            )));
        }
        self.stage(PendingOp::Upsert(key.clone(), document.clone()));
        Ok(())
    }

    fn delete_document(&self, key: &DocumentKey) -> Result<(), EngineError> {
        self.stage(PendingOp::Delete(key.clone()));
        Ok(())
    }

    fn delete_by_query(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        query: &EngineQuery,
    ) -> Result<(), EngineError> {
        self.stage(PendingOp::DeleteByQuery {
            entity_type: entity_type.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            query: query.clone(),
        });
        Ok(())
    }

    fn purge_all(
        &self,
        entity_type: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<(), EngineError> {
        self.stage(PendingOp::Purge {
            entity_type: entity_type.map(str::to_string),
            tenant_id: tenant_id.map(str::to_string),
        });
        Ok(())
    }

    fn commit(&self) -> Result<(), EngineError> {
        let ops = std::mem::take(&mut *self.pending.lock());
        let mut committed = self.committed.write();

        for op in ops {
            match op {
                PendingOp::Upsert(key, doc) => {
                    committed.insert(key, doc);
                }
                PendingOp::Delete(key) => {
                    committed.remove(&key);
                }
                PendingOp::DeleteByQuery {
                    entity_type,
                    tenant_id,
                    query,
                } => committed.retain(|key, doc| {
                    !(key.entity_type == entity_type
                        && tenant_matches(tenant_id.as_deref(), key)
                        && query_matches(&query, doc))
                }),
                PendingOp::Purge {
                    entity_type,
                    tenant_id,
                } => committed.retain(|key, _| {
                    let type_hit = entity_type.as_deref().map_or(true, |t| key.entity_type == t);
                    !(type_hit && tenant_matches(tenant_id.as_deref(), key))
                }),
            }
        }

        self.commits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn rollback(&self) -> Result<(), EngineError> {
        self.pending.lock().clear();
        Ok(())
    }

    fn optimize(&self) -> Result<(), EngineError> {
        self.optimizations.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn document_count(&self, entity_type: Option<&str>) -> Result<usize, EngineError> {
        let committed = self.committed.read();
        Ok(match entity_type {
            None => committed.len(),
            Some(t) => committed.keys().filter(|k| k.entity_type == t).count(),
        })
    }

    fn contains_document(&self, key: &DocumentKey) -> Result<bool, EngineError> {
        Ok(self.committed.read().contains_key(key))
    }
}
