//! Wire model
//!
//! Serialization-safe mirror of a batch of work. Every record is a named
//! msgpack map, so:
//! - fields a reader does not know are skipped
//! - fields a writer did not send take the defaults below
//!
//! # Version history (append-only)
//!
//! | Version | Change |
//! |---------|--------|
//! | 1.0 | Add, Update, Delete, PurgeAll, OptimizeAll; all field kinds |
//! | 1.1 | tenant ids; Flush; numeric `boost`, `omit_norms`, `omit_term_freq_and_positions` |
//! | 1.2 | DeleteByQuery |
//!
//! Numeric attributes missing from a 1.0 payload decode as boost 1.0 with
//! norms and term frequencies omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use crate::features::work::domain::{IndexMode, Store, TermVector, DEFAULT_PRECISION_STEP};

/// `major.minor` tag written in front of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const V1_0: Self = Self::new(1, 0);
    pub const V1_1: Self = Self::new(1, 1);
    pub const V1_2: Self = Self::new(1, 2);
    pub const CURRENT: Self = Self::V1_2;

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Older minors of the current major are always readable
    pub fn check_readable(&self) -> Result<(), ProtocolError> {
        if self.major != Self::CURRENT.major || self.minor > Self::CURRENT.minor {
            return Err(ProtocolError::UnsupportedVersion {
                major: self.major,
                minor: self.minor,
                supported_major: Self::CURRENT.major,
                supported_minor: Self::CURRENT.minor,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

pub const OPERATION_KINDS: &[&str] = &[
    "Add",
    "Update",
    "Delete",
    "DeleteByQuery",
    "PurgeAll",
    "Flush",
    "OptimizeAll",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Operation {
    Add(DocumentOperation),
    Update(DocumentOperation),
    Delete(DeleteOperation),
    DeleteByQuery(DeleteByQueryOperation),
    PurgeAll(PurgeAllOperation),
    Flush(ScopedOperation),
    OptimizeAll(ScopedOperation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOperation {
    pub entity_type: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub id: WireId,
    #[serde(default)]
    pub id_in_string: Option<String>,
    pub document: WireDocument,
    #[serde(default)]
    pub field_analyzers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteOperation {
    pub entity_type: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub id: WireId,
    #[serde(default)]
    pub id_in_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteByQueryOperation {
    pub entity_type: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub query_key: u8,
    pub query: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeAllOperation {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedOperation {
    #[serde(default)]
    pub entity_type: Option<String>,
}

pub const ID_KINDS: &[&str] = &["Int", "Long", "Float", "Double", "String", "Bytes"];

/// Identifier, one variant per primitive plus opaque bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum WireId {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

fn default_boost() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_precision_step() -> u32 {
    DEFAULT_PRECISION_STEP
}

fn default_term_vector() -> String {
    term_vector_to_wire(TermVector::No).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDocument {
    #[serde(default = "default_boost")]
    pub boost: f32,
    #[serde(default)]
    pub fields: Vec<WireField>,
}

pub const FIELD_KINDS: &[&str] = &[
    "Binary",
    "String",
    "Int",
    "Long",
    "Float",
    "Double",
    "Reader",
    "TokenStream",
    "Custom",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireField {
    Binary {
        name: String,
        value: Vec<u8>,
        offset: u32,
        length: u32,
    },
    String {
        name: String,
        value: String,
        store: String,
        index: String,
        #[serde(default = "default_term_vector")]
        term_vector: String,
        #[serde(default = "default_boost")]
        boost: f32,
        #[serde(default)]
        omit_norms: bool,
        #[serde(default)]
        omit_term_freq_and_positions: bool,
    },
    Int {
        name: String,
        value: i32,
        #[serde(default)]
        attrs: NumericAttrs,
    },
    Long {
        name: String,
        value: i64,
        #[serde(default)]
        attrs: NumericAttrs,
    },
    Float {
        name: String,
        value: f32,
        #[serde(default)]
        attrs: NumericAttrs,
    },
    Double {
        name: String,
        value: f64,
        #[serde(default)]
        attrs: NumericAttrs,
    },
    Reader {
        name: String,
        value: String,
        #[serde(default = "default_term_vector")]
        term_vector: String,
    },
    TokenStream {
        name: String,
        tokens: Vec<WireToken>,
        #[serde(default = "default_term_vector")]
        term_vector: String,
    },
    Custom {
        name: String,
        type_name: String,
        data: Vec<u8>,
    },
}

/// Numeric field attributes needed to rebuild an index-compatible field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericAttrs {
    #[serde(default = "default_precision_step")]
    pub precision_step: u32,
    #[serde(default)]
    pub store: bool,
    #[serde(default = "default_true")]
    pub indexed: bool,
    /// Since 1.1
    #[serde(default = "default_boost")]
    pub boost: f32,
    /// Since 1.1
    #[serde(default = "default_true")]
    pub omit_norms: bool,
    /// Since 1.1
    #[serde(default = "default_true")]
    pub omit_term_freq_and_positions: bool,
}

impl Default for NumericAttrs {
    fn default() -> Self {
        Self {
            precision_step: default_precision_step(),
            store: false,
            indexed: true,
            boost: default_boost(),
            omit_norms: true,
            omit_term_freq_and_positions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireToken {
    #[serde(default)]
    pub attributes: Vec<WireAttribute>,
}

pub const ATTRIBUTE_KINDS: &[&str] = &[
    "CharTerm",
    "Payload",
    "Keyword",
    "PositionIncrement",
    "Flags",
    "Type",
    "Offset",
    "Custom",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireAttribute {
    CharTerm { term: String },
    Payload { data: Vec<u8> },
    Keyword { keyword: bool },
    PositionIncrement { increment: u32 },
    Flags { flags: u32 },
    Type { token_type: String },
    Offset { start: u32, end: u32 },
    Custom { type_name: String, data: Vec<u8> },
}

// ═══════════════════════════════════════════════════════════════════════════
// Field attribute codes
// ═══════════════════════════════════════════════════════════════════════════

pub fn store_to_wire(store: Store) -> &'static str {
    match store {
        Store::No => "no",
        Store::Yes => "yes",
        Store::Compress => "compress",
    }
}

pub fn store_from_wire(raw: &str) -> Result<Store, ProtocolError> {
    match raw {
        "no" => Ok(Store::No),
        "yes" => Ok(Store::Yes),
        "compress" => Ok(Store::Compress),
        other => Err(ProtocolError::UnknownKind(format!("store '{}'", other))),
    }
}

pub fn index_to_wire(index: IndexMode) -> &'static str {
    match index {
        IndexMode::No => "no",
        IndexMode::Analyzed => "analyzed",
        IndexMode::NotAnalyzed => "not_analyzed",
        IndexMode::AnalyzedNoNorms => "analyzed_no_norms",
        IndexMode::NotAnalyzedNoNorms => "not_analyzed_no_norms",
    }
}

pub fn index_from_wire(raw: &str) -> Result<IndexMode, ProtocolError> {
    match raw {
        "no" => Ok(IndexMode::No),
        "analyzed" => Ok(IndexMode::Analyzed),
        "not_analyzed" => Ok(IndexMode::NotAnalyzed),
        "analyzed_no_norms" => Ok(IndexMode::AnalyzedNoNorms),
        "not_analyzed_no_norms" => Ok(IndexMode::NotAnalyzedNoNorms),
        other => Err(ProtocolError::UnknownKind(format!("index mode '{}'", other))),
    }
}

pub fn term_vector_to_wire(term_vector: TermVector) -> &'static str {
    match term_vector {
        TermVector::No => "no",
        TermVector::Yes => "yes",
        TermVector::WithOffsets => "with_offsets",
        TermVector::WithPositions => "with_positions",
        TermVector::WithPositionsOffsets => "with_positions_offsets",
    }
}

pub fn term_vector_from_wire(raw: &str) -> Result<TermVector, ProtocolError> {
    match raw {
        "no" => Ok(TermVector::No),
        "yes" => Ok(TermVector::Yes),
        "with_offsets" => Ok(TermVector::WithOffsets),
        "with_positions" => Ok(TermVector::WithPositions),
        "with_positions_offsets" => Ok(TermVector::WithPositionsOffsets),
        other => Err(ProtocolError::UnknownKind(format!("term vector '{}'", other))),
    }
}
