//! Queue backend: producers publish, a drainer applies
//!
//! ```text
//! IndexManager ── apply_work ──► QueueBackendQueueProcessor ──► QueueBroker
//!                                                                  │ destination
//!                                                                  ▼
//!                                            QueueDrainer ──► IndexWorkspace
//! ```

pub mod broker;
pub mod drainer;
pub mod processor;

pub use broker::{QueueBroker, QueueMessage};
pub use drainer::{DrainStats, QueueDrainer};
pub use processor::{default_destination, QueueBackendQueueProcessor};
