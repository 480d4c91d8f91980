//! Serialization Protocol
//!
//! Versioned binary encoding of work batches exchanged between nodes.
//!
//! # Architecture
//!
//! ```text
//! Vec<Work> ──WorkSerializer──► Serializer (msgpack) ──► frame bytes
//! frame bytes ──► Deserializer ──► WorkBuilder (WorkHydrator) ──► Vec<Work>
//! ```

pub mod error;
pub mod framing;
pub mod hydrator;
pub mod model;
pub mod msgpack;
pub mod ports;
pub mod work_serializer;

pub use error::ProtocolError;
pub use framing::{read_frame, write_frame, HEADER_LEN};
pub use hydrator::WorkHydrator;
pub use model::{Message, Operation, ProtocolVersion};
pub use msgpack::{MsgpackDeserializer, MsgpackSerializationProvider, MsgpackSerializer};
pub use ports::{Deserializer, ProtocolResult, SerializationProvider, Serializer, WorkBuilder};
pub use work_serializer::WorkSerializer;
