//! Deletion Query Model
//!
//! Serializable "delete everything matching X" descriptions and the registry
//! that converts them to engine queries and to/from string arrays.

pub mod domain;
pub mod registry;

pub use domain::{
    DeletionQuery, DeletionQueryError, CUSTOM_KEY, NUMERIC_RANGE_KEY, SINGULAR_TERM_KEY,
};
pub use registry::{
    CustomDeletionBehavior, DeletionQueryMapping, DeletionQueryRegistry,
    DeletionQueryRegistryBuilder,
};
