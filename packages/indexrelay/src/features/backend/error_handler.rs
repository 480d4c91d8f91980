//! Error handling for work applied off the producer's thread

use crate::errors::IndexRelayError;
use crate::features::work::{describe, Work};

/// A failed batch: the work that failed and what was never attempted
#[derive(Debug)]
pub struct ErrorContext {
    pub index_name: String,
    /// `None` when every work applied but the commit failed
    pub failing_work: Option<Work>,
    pub unprocessed: Vec<Work>,
    pub error: IndexRelayError,
}

impl ErrorContext {
    /// Failing work followed by the unprocessed rest
    pub fn affected_works(&self) -> impl Iterator<Item = &Work> {
        self.failing_work.iter().chain(self.unprocessed.iter())
    }
}

/// Receives asynchronous failures; must not block
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, context: ErrorContext);

    /// Failure not tied to a batch (transport, decoding)
    fn handle_exception(&self, message: &str, error: &IndexRelayError);
}

/// Default handler: logs through `tracing` and drops the work
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, context: ErrorContext) {
        let failing = context
            .failing_work
            .as_ref()
            .map(describe)
            .unwrap_or_else(|| "commit".to_string());
        tracing::error!(
            index = %context.index_name,
            failing = %failing,
            unprocessed = context.unprocessed.len(),
            error = %context.error,
            "indexing work failed"
        );
        for work in &context.unprocessed {
            tracing::debug!(index = %context.index_name, work = %describe(work), "work not applied");
        }
    }

    fn handle_exception(&self, message: &str, error: &IndexRelayError) {
        tracing::error!(error = %error, "{}", message);
    }
}
