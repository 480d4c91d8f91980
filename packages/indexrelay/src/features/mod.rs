//! Feature modules
//!
//! - work/           - Work model and visitor
//! - deletion_query/ - Deletion query model and registry
//! - protocol/       - Wire protocol (framing, msgpack, builder contract)
//! - engine/         - Index engine port and adapters
//! - backend/        - Backend queue processors, factory, index managers

pub mod backend;
pub mod deletion_query;
pub mod engine;
pub mod protocol;
pub mod work;
