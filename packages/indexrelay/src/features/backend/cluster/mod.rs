//! Cluster backend: one writer per index, other nodes forward
//!
//! ```text
//! slave ── apply_work ──► serialize ──► ClusterChannel ──► ClusterReceiver (owner)
//!                                                              │
//!                                                              ▼
//!                                                       IndexWorkspace
//! ```

pub mod channel;
pub mod node_selector;
pub mod processor;
pub mod receiver;

pub use channel::{Ack, ClusterChannel, ClusterNode, Envelope, NodeAddress};
pub use node_selector::{
    AutoNodeSelector, MasterNodeSelector, NodeSelector, SelectorKind, SlaveNodeSelector,
};
pub use processor::{ClusterBackendQueueProcessor, DEFAULT_MESSAGES_TIMEOUT_MS};
pub use receiver::{ClusterReceiver, ReceiverStats};
