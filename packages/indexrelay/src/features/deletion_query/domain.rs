//! Engine-independent deletion queries
//!
//! A deletion query says "delete every document of this type matching X"
//! without holding an engine query object. Each variant is identified by a
//! small integer key that also selects its mapping record in the registry.

use std::hash::{Hash, Hasher};

use thiserror::Error;

use crate::features::work::domain::{NumericKind, NumericValue};

/// Term equality
pub const SINGULAR_TERM_KEY: u8 = 0;
/// Numeric range
pub const NUMERIC_RANGE_KEY: u8 = 1;
/// Named custom behaviour
pub const CUSTOM_KEY: u8 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeletionQueryError {
    /// String encoding has the wrong number of elements
    #[error("{query} expects {expected} string elements, found {found}")]
    Arity {
        query: &'static str,
        expected: usize,
        found: usize,
    },

    /// An element could not be parsed
    #[error("Invalid {query} element: {reason}")]
    InvalidValue { query: &'static str, reason: String },

    /// No mapping registered for the key
    #[error("No deletion query registered for key {0}")]
    UnknownQueryKey(u8),

    /// Custom query names a behaviour nobody registered
    #[error("Unknown custom deletion behavior '{0}'")]
    UnknownBehavior(String),
}

impl DeletionQueryError {
    fn invalid(query: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            query,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeletionQuery {
    /// Delete documents whose `field_name` holds exactly `value`
    SingularTerm { field_name: String, value: String },

    /// Delete documents whose numeric `field_name` lies in the range
    ///
    /// `kind` takes part in equality: an int range and a long range with the
    /// same bounds are different queries.
    NumericRange {
        field_name: String,
        kind: NumericKind,
        min: Option<NumericValue>,
        max: Option<NumericValue>,
        include_min: bool,
        include_max: bool,
        precision_step: Option<u32>,
    },

    /// Delegate to a behaviour registered under `behavior`
    Custom { behavior: String, data: Vec<String> },
}

impl Eq for DeletionQuery {}

impl Hash for DeletionQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query_key().hash(state);
        match self {
            DeletionQuery::SingularTerm { field_name, value } => {
                field_name.hash(state);
                value.hash(state);
            }
            DeletionQuery::NumericRange {
                field_name,
                kind,
                min,
                max,
                include_min,
                include_max,
                precision_step,
            } => {
                field_name.hash(state);
                kind.hash(state);
                min.map(|v| v.hash_bits()).hash(state);
                max.map(|v| v.hash_bits()).hash(state);
                include_min.hash(state);
                include_max.hash(state);
                precision_step.hash(state);
            }
            DeletionQuery::Custom { behavior, data } => {
                behavior.hash(state);
                data.hash(state);
            }
        }
    }
}

impl DeletionQuery {
    pub fn term(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        DeletionQuery::SingularTerm {
            field_name: field_name.into(),
            value: value.into(),
        }
    }

    /// Inclusive-or-exclusive numeric range; either bound may be open
    ///
    /// Bounds must be of `kind`.
    pub fn numeric_range(
        field_name: impl Into<String>,
        kind: NumericKind,
        min: Option<NumericValue>,
        max: Option<NumericValue>,
        include_min: bool,
        include_max: bool,
    ) -> Result<Self, DeletionQueryError> {
        for bound in min.iter().chain(max.iter()) {
            if bound.kind() != kind {
                return Err(DeletionQueryError::invalid(
                    "NumericRange",
                    format!("bound {} is a {}, range is {}", bound, bound.kind(), kind),
                ));
            }
        }
        Ok(DeletionQuery::NumericRange {
            field_name: field_name.into(),
            kind,
            min,
            max,
            include_min,
            include_max,
            precision_step: None,
        })
    }

    pub fn custom(behavior: impl Into<String>, data: Vec<String>) -> Self {
        DeletionQuery::Custom {
            behavior: behavior.into(),
            data,
        }
    }

    /// Attach a precision step hint; no-op for non-range queries
    pub fn with_precision_step(mut self, step: u32) -> Self {
        if let DeletionQuery::NumericRange { precision_step, .. } = &mut self {
            *precision_step = Some(step);
        }
        self
    }

    pub fn query_key(&self) -> u8 {
        match self {
            DeletionQuery::SingularTerm { .. } => SINGULAR_TERM_KEY,
            DeletionQuery::NumericRange { .. } => NUMERIC_RANGE_KEY,
            DeletionQuery::Custom { .. } => CUSTOM_KEY,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// String-array codecs for the built-in variants
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn term_to_strings(query: &DeletionQuery) -> Result<Vec<String>, DeletionQueryError> {
    match query {
        DeletionQuery::SingularTerm { field_name, value } => {
            Ok(vec![field_name.clone(), value.clone()])
        }
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

pub(crate) fn term_from_strings(parts: &[String]) -> Result<DeletionQuery, DeletionQueryError> {
    match parts {
        [field_name, value] => Ok(DeletionQuery::term(field_name.as_str(), value.as_str())),
        _ => Err(DeletionQueryError::Arity {
            query: "SingularTerm",
            expected: 2,
            found: parts.len(),
        }),
    }
}

const RANGE_ARITY: usize = 7;

pub(crate) fn range_to_strings(query: &DeletionQuery) -> Result<Vec<String>, DeletionQueryError> {
    match query {
        DeletionQuery::NumericRange {
            field_name,
            kind,
            min,
            max,
            include_min,
            include_max,
            precision_step,
        } => Ok(vec![
            field_name.clone(),
            kind.as_str().to_string(),
            min.map(|v| v.to_string()).unwrap_or_default(),
            max.map(|v| v.to_string()).unwrap_or_default(),
            include_min.to_string(),
            include_max.to_string(),
            precision_step.map(|s| s.to_string()).unwrap_or_default(),
        ]),
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

pub(crate) fn range_from_strings(parts: &[String]) -> Result<DeletionQuery, DeletionQueryError> {
    const NAME: &str = "NumericRange";

    if parts.len() != RANGE_ARITY {
        return Err(DeletionQueryError::Arity {
            query: NAME,
            expected: RANGE_ARITY,
            found: parts.len(),
        });
    }

    let kind = NumericKind::parse(&parts[1])
        .ok_or_else(|| DeletionQueryError::invalid(NAME, format!("unknown kind '{}'", parts[1])))?;
    let bound = |raw: &str| -> Result<Option<NumericValue>, DeletionQueryError> {
        if raw.is_empty() {
            return Ok(None);
        }
        NumericValue::parse(kind, raw)
            .map(Some)
            .map_err(|e| DeletionQueryError::invalid(NAME, e))
    };
    let flag = |raw: &str| -> Result<bool, DeletionQueryError> {
        raw.parse::<bool>()
            .map_err(|_| DeletionQueryError::invalid(NAME, format!("'{}' is not a boolean", raw)))
    };
    let precision_step = if parts[6].is_empty() {
        None
    } else {
        Some(parts[6].parse::<u32>().map_err(|_| {
            DeletionQueryError::invalid(NAME, format!("'{}' is not a precision step", parts[6]))
        })?)
    };

    Ok(DeletionQuery::NumericRange {
        field_name: parts[0].clone(),
        kind,
        min: bound(&parts[2])?,
        max: bound(&parts[3])?,
        include_min: flag(&parts[4])?,
        include_max: flag(&parts[5])?,
        precision_step,
    })
}

pub(crate) fn custom_to_strings(query: &DeletionQuery) -> Result<Vec<String>, DeletionQueryError> {
    match query {
        DeletionQuery::Custom { behavior, data } => {
            let mut parts = Vec::with_capacity(data.len() + 1);
            parts.push(behavior.clone());
            parts.extend(data.iter().cloned());
            Ok(parts)
        }
        other => Err(DeletionQueryError::UnknownQueryKey(other.query_key())),
    }
}

pub(crate) fn custom_from_strings(parts: &[String]) -> Result<DeletionQuery, DeletionQueryError> {
    match parts.split_first() {
        Some((behavior, data)) => Ok(DeletionQuery::custom(behavior.as_str(), data.to_vec())),
        None => Err(DeletionQueryError::Arity {
            query: "Custom",
            expected: 1,
            found: 0,
        }),
    }
}
