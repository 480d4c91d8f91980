//! Work domain model (pure data, no I/O)

pub mod document;
pub mod entity_id;
pub mod work;

pub use document::{
    BinaryField, CustomField, Document, Field, IndexMode, NumericField, NumericKind,
    NumericValue, ReaderField, Store, TermVector, TextField, Token, TokenAttribute,
    TokenStreamField, DEFAULT_PRECISION_STEP,
};
pub use entity_id::EntityId;
pub use work::{
    AddWork, DeleteByQueryWork, DeleteWork, FieldAnalyzers, FlushWork, OptimizeWork,
    PurgeAllWork, UpdateWork, Work, WorkKind,
};
