//! Deletion query registry
//!
//! One `DeletionQueryMapping` per query key, holding the four components a
//! key needs: type name, engine-query builder, string encoder and string
//! decoder. A mapping missing any of them never makes it into a registry.
//!
//! ```text
//! DeletionQueryRegistry::builder()
//!     .with_builtins()
//!     .custom_behavior("by-author", Arc::new(ByAuthor))
//!     .build()?
//! ```

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use super::domain::{
    self, DeletionQuery, DeletionQueryError, CUSTOM_KEY, NUMERIC_RANGE_KEY, SINGULAR_TERM_KEY,
};
use crate::config::{ConfigError, ConfigResult};
use crate::features::engine::EngineQuery;
use crate::features::work::domain::NumericValue;

/// Custom deletion logic, resolved by name at conversion time
pub trait CustomDeletionBehavior: Send + Sync {
    fn to_engine_query(&self, data: &[String]) -> Result<EngineQuery, DeletionQueryError>;
}

const BUILTIN_KEYS: [u8; 3] = [SINGULAR_TERM_KEY, NUMERIC_RANGE_KEY, CUSTOM_KEY];

pub type Behaviors = HashMap<String, Arc<dyn CustomDeletionBehavior>>;

pub type ToEngineQueryFn = fn(&DeletionQuery, &Behaviors) -> Result<EngineQuery, DeletionQueryError>;
pub type ToStringArrayFn = fn(&DeletionQuery) -> Result<Vec<String>, DeletionQueryError>;
pub type FromStringArrayFn = fn(&[String]) -> Result<DeletionQuery, DeletionQueryError>;

/// Registration record for one query key (components are checked at build)
#[derive(Clone, Default)]
pub struct DeletionQueryMapping {
    key: u8,
    type_name: Option<&'static str>,
    to_engine_query: Option<ToEngineQueryFn>,
    to_string_array: Option<ToStringArrayFn>,
    from_string_array: Option<FromStringArrayFn>,
}

impl DeletionQueryMapping {
    pub fn new(key: u8) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn type_name(mut self, name: &'static str) -> Self {
        self.type_name = Some(name);
        self
    }

    pub fn to_engine_query(mut self, f: ToEngineQueryFn) -> Self {
        self.to_engine_query = Some(f);
        self
    }

    pub fn to_string_array(mut self, f: ToStringArrayFn) -> Self {
        self.to_string_array = Some(f);
        self
    }

    pub fn from_string_array(mut self, f: FromStringArrayFn) -> Self {
        self.from_string_array = Some(f);
        self
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn singular_term() -> Self {
        Self::new(SINGULAR_TERM_KEY)
            .type_name("SingularTermDeletionQuery")
            .to_engine_query(term_to_engine)
            .to_string_array(domain::term_to_strings)
            .from_string_array(domain::term_from_strings)
    }

    pub fn numeric_range() -> Self {
        Self::new(NUMERIC_RANGE_KEY)
            .type_name("NumericRangeDeletionQuery")
            .to_engine_query(range_to_engine)
            .to_string_array(domain::range_to_strings)
            .from_string_array(domain::range_from_strings)
    }

    pub fn custom() -> Self {
        Self::new(CUSTOM_KEY)
            .type_name("CustomBehaviorDeletionQuery")
            .to_engine_query(custom_to_engine)
            .to_string_array(domain::custom_to_strings)
            .from_string_array(domain::custom_from_strings)
    }

    /// Complete record, or the name of the first missing component
    fn complete(&self) -> Result<MappingRecord, &'static str> {
        Ok(MappingRecord {
            type_name: self.type_name.ok_or("type name")?,
            to_engine_query: self.to_engine_query.ok_or("engine query builder")?,
            to_string_array: self.to_string_array.ok_or("string array encoder")?,
            from_string_array: self.from_string_array.ok_or("string array decoder")?,
        })
    }
}

fn term_to_engine(query: &DeletionQuery, _: &Behaviors) -> Result<EngineQuery, DeletionQueryError> {
    match query {
        DeletionQuery::SingularTerm { field_name, value } => {
            Ok(EngineQuery::term(field_name.as_str(), value.as_str()))
        }
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

fn range_to_engine(query: &DeletionQuery, _: &Behaviors) -> Result<EngineQuery, DeletionQueryError> {
    match query {
        DeletionQuery::NumericRange {
            field_name,
            kind,
            min,
            max,
            include_min,
            include_max,
            ..
        } => {
            let bound = |value: &Option<NumericValue>, inclusive: bool| match value {
                None => Bound::Unbounded,
                Some(v) if inclusive => Bound::Included(*v),
                Some(v) => Bound::Excluded(*v),
            };
            Ok(EngineQuery::Range {
                field: field_name.clone(),
                kind: *kind,
                lower: bound(min, *include_min),
                upper: bound(max, *include_max),
            })
        }
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

fn custom_to_engine(query: &DeletionQuery, behaviors: &Behaviors) -> Result<EngineQuery, DeletionQueryError> {
    match query {
        DeletionQuery::Custom { behavior, data } => behaviors
            .get(behavior)
            .ok_or_else(|| DeletionQueryError::UnknownBehavior(behavior.clone()))?
            .to_engine_query(data),
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

#[derive(Clone, Copy)]
struct MappingRecord {
    type_name: &'static str,
    to_engine_query: ToEngineQueryFn,
    to_string_array: ToStringArrayFn,
    from_string_array: FromStringArrayFn,
}

#[derive(Default)]
pub struct DeletionQueryRegistryBuilder {
    mappings: Vec<DeletionQueryMapping>,
    behaviors: Behaviors,
}

impl DeletionQueryRegistryBuilder {
    pub fn register(mut self, mapping: DeletionQueryMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Register the term, range and custom mappings
    pub fn with_builtins(self) -> Self {
        self.register(DeletionQueryMapping::singular_term())
            .register(DeletionQueryMapping::numeric_range())
            .register(DeletionQueryMapping::custom())
    }

    pub fn custom_behavior(
        mut self,
        name: impl Into<String>,
        behavior: Arc<dyn CustomDeletionBehavior>,
    ) -> Self {
        self.behaviors.insert(name.into(), behavior);
        self
    }

    /// Validate and freeze
    ///
    /// Fails on an incomplete mapping, a key registered twice, a key with no
    /// `DeletionQuery` variant, or a built-in key left unregistered. New
    /// deletion logic goes through `custom_behavior` under the custom key.
    pub fn build(self) -> ConfigResult<DeletionQueryRegistry> {
        let mut records = BTreeMap::new();
        for mapping in &self.mappings {
            if !BUILTIN_KEYS.contains(&mapping.key) {
                return Err(ConfigError::Registry(format!(
                    "query key {} has no deletion query variant",
                    mapping.key
                )));
            }
            let record = mapping.complete().map_err(|missing| {
                ConfigError::Registry(format!("query key {} has no {}", mapping.key, missing))
            })?;
            if records.insert(mapping.key, record).is_some() {
                return Err(ConfigError::Registry(format!(
                    "query key {} registered twice",
                    mapping.key
                )));
            }
        }

        for key in BUILTIN_KEYS {
            if !records.contains_key(&key) {
                return Err(ConfigError::Registry(format!(
                    "built-in query key {} is not registered",
                    key
                )));
            }
        }

        tracing::debug!(
            keys = records.len(),
            behaviors = self.behaviors.len(),
            "deletion query registry built"
        );

        Ok(DeletionQueryRegistry {
            records,
            behaviors: self.behaviors,
        })
    }
}

/// Immutable key → mapping table
pub struct DeletionQueryRegistry {
    records: BTreeMap<u8, MappingRecord>,
    behaviors: Behaviors,
}

impl std::fmt::Debug for DeletionQueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueryRegistry")
            .field("keys", &self.records.keys().collect::<Vec<_>>())
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DeletionQueryRegistry {
    pub fn builder() -> DeletionQueryRegistryBuilder {
        DeletionQueryRegistryBuilder::default()
    }

    /// Registry with the built-in mappings and no custom behaviours
    pub fn standard() -> Self {
        let records = [
            DeletionQueryMapping::singular_term(),
            DeletionQueryMapping::numeric_range(),
            DeletionQueryMapping::custom(),
        ]
        .iter()
        .filter_map(|m| m.complete().ok().map(|r| (m.key, r)))
        .collect();
        Self {
            records,
            behaviors: Behaviors::new(),
        }
    }

    fn record(&self, key: u8) -> Result<&MappingRecord, DeletionQueryError> {
        self.records
            .get(&key)
            .ok_or(DeletionQueryError::UnknownQueryKey(key))
    }

    pub fn keys(&self) -> Vec<u8> {
        self.records.keys().copied().collect()
    }

    pub fn type_name(&self, key: u8) -> Option<&'static str> {
        self.records.get(&key).map(|r| r.type_name)
    }

    pub fn to_engine_query(&self, query: &DeletionQuery) -> Result<EngineQuery, DeletionQueryError> {
        (self.record(query.query_key())?.to_engine_query)(query, &self.behaviors)
    }

    pub fn to_string_array(&self, query: &DeletionQuery) -> Result<Vec<String>, DeletionQueryError> {
        (self.record(query.query_key())?.to_string_array)(query)
    }

    pub fn from_string_array(&self, key: u8, parts: &[String]) -> Result<DeletionQuery, DeletionQueryError> {
        (self.record(key)?.from_string_array)(parts)
    }
}
