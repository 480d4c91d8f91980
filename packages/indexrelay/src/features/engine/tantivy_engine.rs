//! Tantivy-backed engine
//!
//! # Schema
//!
//! Declared up front through `EngineSchema`. Three reserved raw-token fields
//! identify a document:
//!
//! 1. `_key` - encoded `DocumentKey` (unique, used for upsert/delete)
//! 2. `_type` - entity type (purge and delete-by-query filters)
//! 3. `_tenant` - tenant id, empty when absent
//!
//! Document fields whose name is not declared are rejected.

use std::collections::HashMap;
use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;
use tantivy::collector::Count;
use tantivy::query::{AllQuery, BooleanQuery, Query, RangeQuery, TermQuery};
use tantivy::schema::{
    Field as SchemaField, IndexRecordOption, Schema, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use super::ports::{DocumentKey, EngineError, EngineQuery, IndexEngine};
use crate::features::work::domain::{Document, Field, FieldAnalyzers, NumericValue};

pub const FIELD_KEY: &str = "_key";
pub const FIELD_TYPE: &str = "_type";
pub const FIELD_TENANT: &str = "_tenant";

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Value type of a declared schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Tokenized text
    Text,
    /// Untokenized text (exact match)
    Keyword,
    /// Int and Long values
    I64,
    /// Float and Double values
    F64,
    /// Binary and custom payloads
    Bytes,
}

/// User fields the engine accepts
#[derive(Debug, Clone, Default)]
pub struct EngineSchema {
    fields: Vec<(String, FieldType)>,
}

impl EngineSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push((name.into(), field_type));
        self
    }

    fn build(&self) -> Result<(Schema, HashMap<String, (SchemaField, FieldType)>), EngineError> {
        let mut builder = Schema::builder();
        for reserved in [FIELD_KEY, FIELD_TYPE, FIELD_TENANT] {
            builder.add_text_field(reserved, STRING | STORED);
        }

        let mut declared = HashMap::new();
        for (name, field_type) in &self.fields {
            if name.starts_with('_') || declared.contains_key(name) {
                return Err(EngineError::UnsupportedField(format!(
                    "'{}' is reserved or declared twice",
                    name
                )));
            }
            let handle = match field_type {
                FieldType::Text => builder.add_text_field(name, TEXT | STORED),
                FieldType::Keyword => builder.add_text_field(name, STRING | STORED),
                FieldType::I64 => builder.add_i64_field(name, INDEXED | STORED | FAST),
                FieldType::F64 => builder.add_f64_field(name, INDEXED | STORED | FAST),
                FieldType::Bytes => builder.add_bytes_field(name, STORED),
            };
            declared.insert(name.clone(), (handle, *field_type));
        }

        Ok((builder.build(), declared))
    }
}

struct ReservedFields {
    key: SchemaField,
    entity_type: SchemaField,
    tenant: SchemaField,
}

pub struct TantivyEngine {
    name: String,
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    reserved: ReservedFields,
    fields: HashMap<String, (SchemaField, FieldType)>,
}

fn storage<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> EngineError + '_ {
    move |e| EngineError::Storage(format!("{}: {}", context, e))
}

impl TantivyEngine {
    /// RAM-backed index
    pub fn in_memory(name: impl Into<String>, schema: &EngineSchema) -> Result<Self, EngineError> {
        let (tantivy_schema, fields) = schema.build()?;
        let index = Index::create_in_ram(tantivy_schema);
        Self::from_index(name.into(), index, fields)
    }

    /// Index stored in `dir`, created when missing
    pub fn open_in_dir(
        name: impl Into<String>,
        dir: &Path,
        schema: &EngineSchema,
    ) -> Result<Self, EngineError> {
        let (tantivy_schema, fields) = schema.build()?;
        let index = if dir.join("meta.json").exists() {
            Index::open_in_dir(dir).map_err(storage("Failed to open index"))?
        } else {
            std::fs::create_dir_all(dir).map_err(storage("Failed to create index dir"))?;
            Index::create_in_dir(dir, tantivy_schema).map_err(storage("Failed to create index"))?
        };
        Self::from_index(name.into(), index, fields)
    }

    fn from_index(
        name: String,
        index: Index,
        fields: HashMap<String, (SchemaField, FieldType)>,
    ) -> Result<Self, EngineError> {
        let schema = index.schema();
        let reserved_field = |n: &str| {
            schema
                .get_field(n)
                .map_err(|_| EngineError::Storage(format!("index is missing reserved field {}", n)))
        };
        let reserved = ReservedFields {
            key: reserved_field(FIELD_KEY)?,
            entity_type: reserved_field(FIELD_TYPE)?,
            tenant: reserved_field(FIELD_TENANT)?,
        };
        // Handles come from the opened index, which may predate this process
        let fields = fields
            .into_iter()
            .map(|(name, (_, field_type))| {
                let handle = schema.get_field(&name).map_err(|_| {
                    EngineError::UnsupportedField(format!("{} is not in the stored schema", name))
                })?;
                Ok((name, (handle, field_type)))
            })
            .collect::<Result<HashMap<_, _>, EngineError>>()?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(storage("Failed to create writer"))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(storage("Failed to create reader"))?;

        Ok(Self {
            name,
            index,
            writer: Mutex::new(writer),
            reader,
            reserved,
            fields,
        })
    }

    fn declared(&self, name: &str) -> Result<(SchemaField, FieldType), EngineError> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnsupportedField(format!("{} in {}", name, self.name)))
    }

    fn build_document(&self, key: &DocumentKey, document: &Document) -> Result<TantivyDocument, EngineError> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.reserved.key, key.encoded());
        doc.add_text(self.reserved.entity_type, &key.entity_type);
        doc.add_text(self.reserved.tenant, key.tenant_id.as_deref().unwrap_or(""));

        for field in &document.fields {
            let (handle, field_type) = self.declared(field.name())?;
            match (field, field_type) {
                (Field::Text(f), FieldType::Text | FieldType::Keyword) => {
                    doc.add_text(handle, &f.value)
                }
                (Field::Reader(f), FieldType::Text | FieldType::Keyword) => {
                    doc.add_text(handle, &f.content)
                }
                (Field::TokenStream(f), FieldType::Text | FieldType::Keyword) => {
                    let terms: Vec<&str> = f.tokens.iter().filter_map(|t| t.char_term()).collect();
                    doc.add_text(handle, terms.join(" "))
                }
                (Field::Numeric(f), FieldType::I64) => match f.value {
                    NumericValue::Int(v) => doc.add_i64(handle, v as i64),
                    NumericValue::Long(v) => doc.add_i64(handle, v),
                    other => return Err(mismatch(field.name(), other.kind().as_str(), field_type)),
                },
                (Field::Numeric(f), FieldType::F64) => doc.add_f64(handle, f.value.as_f64()),
                (Field::Binary(f), FieldType::Bytes) => doc.add_bytes(handle, f.window()),
                (Field::Custom(f), FieldType::Bytes) => doc.add_bytes(handle, f.data.as_slice()),
                (other, _) => return Err(mismatch(other.name(), field_kind(other), field_type)),
            }
        }
        Ok(doc)
    }

    fn term_query(field: SchemaField, value: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        ))
    }

    /// `_type` and `_tenant` filters combined with `query`
    fn scoped(&self, entity_type: Option<&str>, tenant_id: Option<&str>, query: Box<dyn Query>) -> Box<dyn Query> {
        let mut clauses = Vec::new();
        if let Some(t) = entity_type {
            clauses.push(Self::term_query(self.reserved.entity_type, t));
        }
        if let Some(t) = tenant_id {
            clauses.push(Self::term_query(self.reserved.tenant, t));
        }
        if clauses.is_empty() {
            return query;
        }
        clauses.push(query);
        Box::new(BooleanQuery::intersection(clauses))
    }

    fn convert(&self, query: &EngineQuery) -> Result<Box<dyn Query>, EngineError> {
        match query {
            EngineQuery::All => Ok(Box::new(AllQuery)),
            EngineQuery::And(parts) => {
                let clauses = parts
                    .iter()
                    .map(|q| self.convert(q))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(BooleanQuery::intersection(clauses)))
            }
            EngineQuery::Term { field, value } => {
                let (handle, field_type) = self.declared(field)?;
                let term = match field_type {
                    FieldType::Text | FieldType::Keyword => Term::from_field_text(handle, value),
                    FieldType::I64 => Term::from_field_i64(handle, parse_query_value(field, value)?),
                    FieldType::F64 => Term::from_field_f64(handle, parse_query_value(field, value)?),
                    FieldType::Bytes => {
                        return Err(EngineError::InvalidQuery(format!("{} is not searchable", field)))
                    }
                };
                Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
            }
            EngineQuery::Range {
                field,
                lower,
                upper,
                ..
            } => {
                let (_, field_type) = self.declared(field)?;
                match field_type {
                    FieldType::I64 => Ok(Box::new(RangeQuery::new_i64_bounds(
                        field.clone(),
                        map_bound(lower, as_i64),
                        map_bound(upper, as_i64),
                    ))),
                    FieldType::F64 => Ok(Box::new(RangeQuery::new_f64_bounds(
                        field.clone(),
                        map_bound(lower, |v| v.as_f64()),
                        map_bound(upper, |v| v.as_f64()),
                    ))),
                    _ => Err(EngineError::InvalidQuery(format!(
                        "range on non-numeric field {}",
                        field
                    ))),
                }
            }
        }
    }

    fn count(&self, query: &dyn Query) -> Result<usize, EngineError> {
        self.reader.reload().map_err(storage("Failed to reload reader"))?;
        self.reader
            .searcher()
            .search(query, &Count)
            .map_err(storage("Search failed"))
    }
}

fn field_kind(field: &Field) -> &'static str {
    match field {
        Field::Binary(_) => "binary",
        Field::Text(_) => "text",
        Field::Numeric(_) => "numeric",
        Field::Reader(_) => "reader",
        Field::TokenStream(_) => "token stream",
        Field::Custom(_) => "custom",
    }
}

fn mismatch(name: &str, kind: &str, field_type: FieldType) -> EngineError {
    EngineError::UnsupportedField(format!(
        "{} value for {} declared as {:?}",
        kind, name, field_type
    ))
}

fn parse_query_value<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, EngineError> {
    raw.parse()
        .map_err(|_| EngineError::InvalidQuery(format!("'{}' is not a value of {}", raw, field)))
}

fn as_i64(value: &NumericValue) -> i64 {
    match *value {
        NumericValue::Int(v) => v as i64,
        NumericValue::Long(v) => v,
        NumericValue::Float(v) => v as i64,
        NumericValue::Double(v) => v as i64,
    }
}

fn map_bound<T>(bound: &Bound<NumericValue>, f: impl Fn(&NumericValue) -> T) -> Bound<T> {
    match bound {
        Bound::Included(v) => Bound::Included(f(v)),
        Bound::Excluded(v) => Bound::Excluded(f(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl IndexEngine for TantivyEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert_document(
        &self,
        key: &DocumentKey,
        document: &Document,
        _analyzers: Option<&FieldAnalyzers>,
    ) -> Result<(), EngineError> {
        let doc = self.build_document(key, document)?;
        let writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.reserved.key, &key.encoded()));
        writer
            .add_document(doc)
            .map_err(storage("Failed to add document"))?;
        Ok(())
    }

    fn delete_document(&self, key: &DocumentKey) -> Result<(), EngineError> {
        self.writer
            .lock()
            .delete_term(Term::from_field_text(self.reserved.key, &key.encoded()));
        Ok(())
    }

    fn delete_by_query(
        &self,
        entity_type: &str,
        tenant_id: Option<&str>,
        query: &EngineQuery,
    ) -> Result<(), EngineError> {
        let query = self.scoped(Some(entity_type), tenant_id, self.convert(query)?);
        self.writer
            .lock()
            .delete_query(query)
            .map_err(storage("Failed to delete by query"))?;
        Ok(())
    }

    fn purge_all(
        &self,
        entity_type: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let query = self.scoped(entity_type, tenant_id, Box::new(AllQuery));
        self.writer
            .lock()
            .delete_query(query)
            .map_err(storage("Failed to purge"))?;
        Ok(())
    }

    fn commit(&self) -> Result<(), EngineError> {
        self.writer
            .lock()
            .commit()
            .map_err(storage("Failed to commit"))?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), EngineError> {
        self.writer
            .lock()
            .rollback()
            .map_err(storage("Failed to roll back"))?;
        Ok(())
    }

    fn optimize(&self) -> Result<(), EngineError> {
        let segments = self
            .index
            .searchable_segment_ids()
            .map_err(storage("Failed to list segments"))?;
        if segments.len() < 2 {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        writer
            .merge(&segments)
            .wait()
            .map_err(storage("Failed to merge segments"))?;
        Ok(())
    }

    fn document_count(&self, entity_type: Option<&str>) -> Result<usize, EngineError> {
        let query = self.scoped(entity_type, None, Box::new(AllQuery));
        self.count(query.as_ref())
    }

    fn contains_document(&self, key: &DocumentKey) -> Result<bool, EngineError> {
        let query = Self::term_query(self.reserved.key, &key.encoded());
        Ok(self.count(query.as_ref())? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::work::domain::NumericKind;

    fn schema() -> EngineSchema {
        EngineSchema::new()
            .field("title", FieldType::Text)
            .field("isbn", FieldType::Keyword)
            .field("year", FieldType::I64)
            .field("price", FieldType::F64)
            .field("cover", FieldType::Bytes)
    }

    fn book(isbn: &str, year: i32) -> Document {
        Document::new()
            .field(Field::text("title", "Dune"))
            .field(Field::keyword("isbn", isbn))
            .field(Field::numeric("year", NumericValue::Int(year)))
            .field(Field::numeric("price", NumericValue::Double(9.5)))
            .field(Field::binary("cover", vec![1, 2, 3]))
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let engine = TantivyEngine::in_memory("books", &schema()).unwrap();
        let key = DocumentKey::new("Book", None, "1");

        engine.upsert_document(&key, &book("a", 1965), None).unwrap();
        engine.upsert_document(&key, &book("a", 1965), None).unwrap();
        engine.commit().unwrap();

        assert_eq!(engine.document_count(None).unwrap(), 1);
        assert!(engine.contains_document(&key).unwrap());
    }

    #[test]
    fn test_rollback_discards_uncommitted_writes() {
        let engine = TantivyEngine::in_memory("books", &schema()).unwrap();
        let first = DocumentKey::new("Book", None, "1");
        let second = DocumentKey::new("Book", None, "2");
        engine.upsert_document(&first, &book("a", 1965), None).unwrap();
        engine.commit().unwrap();

        engine.upsert_document(&second, &book("b", 1969), None).unwrap();
        engine.rollback().unwrap();
        engine.commit().unwrap();

        assert!(engine.contains_document(&first).unwrap());
        assert!(!engine.contains_document(&second).unwrap());
    }

    #[test]
    fn test_delete_and_purge() {
        let engine = TantivyEngine::in_memory("books", &schema()).unwrap();
        for id in ["1", "2", "3"] {
            engine
                .upsert_document(&DocumentKey::new("Book", None, id), &book(id, 2000), None)
                .unwrap();
        }
        engine
            .upsert_document(&DocumentKey::new("Author", None, "1"), &Document::new(), None)
            .unwrap();
        engine.commit().unwrap();
        assert_eq!(engine.document_count(Some("Book")).unwrap(), 3);

        engine.delete_document(&DocumentKey::new("Book", None, "2")).unwrap();
        engine.purge_all(Some("Author"), None).unwrap();
        engine.commit().unwrap();

        assert_eq!(engine.document_count(Some("Book")).unwrap(), 2);
        assert_eq!(engine.document_count(Some("Author")).unwrap(), 0);
    }

    #[test]
    fn test_delete_by_keyword_term_and_range() {
        let engine = TantivyEngine::in_memory("books", &schema()).unwrap();
        engine
            .upsert_document(&DocumentKey::new("Book", None, "1"), &book("isbn-1", 1950), None)
            .unwrap();
        engine
            .upsert_document(&DocumentKey::new("Book", None, "2"), &book("isbn-2", 1990), None)
            .unwrap();
        engine
            .upsert_document(&DocumentKey::new("Book", None, "3"), &book("isbn-3", 2020), None)
            .unwrap();
        engine.commit().unwrap();

        engine
            .delete_by_query("Book", None, &EngineQuery::term("isbn", "isbn-1"))
            .unwrap();
        let range = EngineQuery::Range {
            field: "year".to_string(),
            kind: NumericKind::Int,
            lower: Bound::Included(NumericValue::Int(2000)),
            upper: Bound::Unbounded,
        };
        engine.delete_by_query("Book", None, &range).unwrap();
        engine.commit().unwrap();

        assert_eq!(engine.document_count(None).unwrap(), 1);
        assert!(engine
            .contains_document(&DocumentKey::new("Book", None, "2"))
            .unwrap());
    }

    #[test]
    fn test_undeclared_field_is_rejected() {
        let engine = TantivyEngine::in_memory("books", &schema()).unwrap();
        let doc = Document::new().field(Field::text("subtitle", "x"));
        let err = engine
            .upsert_document(&DocumentKey::new("Book", None, "1"), &doc, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedField(_)));
    }

    #[test]
    fn test_reserved_names_cannot_be_declared() {
        let schema = EngineSchema::new().field("_type", FieldType::Keyword);
        assert!(TantivyEngine::in_memory("books", &schema).is_err());
    }

    #[test]
    fn test_on_disk_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = TantivyEngine::open_in_dir("books", dir.path(), &schema()).unwrap();
            engine
                .upsert_document(&DocumentKey::new("Book", None, "1"), &book("a", 1), None)
                .unwrap();
            engine.commit().unwrap();
        }
        let engine = TantivyEngine::open_in_dir("books", dir.path(), &schema()).unwrap();
        assert_eq!(engine.document_count(None).unwrap(), 1);
    }
}
