//! Common test utilities for indexrelay
//!
//! Fixtures shared by the integration suites: documents, engines, index
//! managers and an error handler that records what it was given.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use indexrelay::config::{keys, IndexProperties};
use indexrelay::errors::IndexRelayError;
use indexrelay::features::backend::{
    BackendFactory, ErrorContext, ErrorHandler, IndexManager, IndexManagerHolder,
    WorkerBuildContext,
};
use indexrelay::features::engine::{DocumentKey, IndexEngine, InMemoryEngine};
use indexrelay::features::work::{Document, Field, NumericValue, WorkKind};

// ═══════════════════════════════════════════════════════════════════════════
// Fixtures
// ═══════════════════════════════════════════════════════════════════════════

pub fn book(title: &str, isbn: &str, year: i32) -> Document {
    Document::new()
        .field(Field::text("title", title))
        .field(Field::keyword("isbn", isbn))
        .field(Field::numeric("year", NumericValue::Int(year)))
}

pub fn book_key(id: i32) -> DocumentKey {
    DocumentKey::new("Book", None, id.to_string())
}

pub fn memory_engine(name: &str) -> Arc<InMemoryEngine> {
    Arc::new(InMemoryEngine::new(name))
}

pub fn holder() -> IndexManagerHolder {
    IndexManagerHolder::new(BackendFactory::standard(), WorkerBuildContext::standard())
}

pub fn holder_with(context: WorkerBuildContext) -> IndexManagerHolder {
    IndexManagerHolder::new(BackendFactory::standard(), context)
}

/// `books` index on `engine` with the given backend and extra properties
pub fn books_manager(
    holder: &IndexManagerHolder,
    engine: Arc<InMemoryEngine>,
    backend: &str,
    extra: &[(&str, &str)],
) -> Arc<IndexManager> {
    let mut props = IndexProperties::empty("books").with(keys::BACKEND, backend);
    for (key, value) in extra {
        props = props.with(*key, *value);
    }
    holder
        .build_with_properties(&props, engine)
        .expect("index manager should start")
}

pub fn count(engine: &InMemoryEngine) -> usize {
    engine.document_count(None).expect("count")
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ═══════════════════════════════════════════════════════════════════════════
// Recording error handler
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RecordedFailure {
    pub index_name: String,
    pub failing_kind: Option<WorkKind>,
    pub unprocessed: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RecordingErrorHandler {
    failures: Mutex<Vec<RecordedFailure>>,
    exceptions: Mutex<Vec<String>>,
}

impl RecordingErrorHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().clone()
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().clone()
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn handle(&self, context: ErrorContext) {
        self.failures.lock().push(RecordedFailure {
            index_name: context.index_name.clone(),
            failing_kind: context.failing_work.as_ref().map(|w| w.kind()),
            unprocessed: context.unprocessed.len(),
            message: context.error.to_string(),
        });
    }

    fn handle_exception(&self, message: &str, error: &IndexRelayError) {
        self.exceptions.lock().push(format!("{}: {}", message, error));
    }
}
