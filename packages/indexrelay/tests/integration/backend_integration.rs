//! Backend integration tests
//!
//! Index managers end to end: backend selection, batch ordering, sync and
//! async failure handling, the queue round trip and the tantivy adapter.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;

use indexrelay::config::{keys, parse_properties, ExecutionMode, IndexProperties, WorkerSettings};
use indexrelay::errors::IndexRelayError;
use indexrelay::features::backend::{
    BackendFactory, BackendRegistry, BlackholeBackendQueueProcessor, CountingMonitor,
    IndexManagerHolder, IndexingMonitor, QueueBroker, QueueDrainer, WorkerBuildContext,
};
use indexrelay::features::deletion_query::DeletionQuery;
use indexrelay::features::engine::{
    DocumentKey, EngineSchema, FieldType, IndexEngine, TantivyEngine,
};
use indexrelay::features::work::{NumericKind, NumericValue, Work, WorkKind};
use indexrelay::ConfigError;

// ═══════════════════════════════════════════════════════════════════════════
// Backend selection
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_unknown_backend_fails_fast() {
    let holder = holder();
    let props = IndexProperties::empty("books").with(keys::BACKEND, "doesNotExist");
    let err = holder
        .build_with_properties(&props, memory_engine("books"))
        .unwrap_err();
    assert!(matches!(err, IndexRelayError::Config(ConfigError::UnknownBackend(_))));
    assert!(holder.get("books").is_none());
}

#[test]
fn test_execution_mode_defaults_to_sync() {
    let unset = WorkerSettings::from_properties(&IndexProperties::empty("books")).unwrap();
    assert_eq!(unset.execution, ExecutionMode::Sync);

    let asynchronous = WorkerSettings::from_properties(
        &IndexProperties::empty("books").with(keys::WORKER_EXECUTION, "async"),
    )
    .unwrap();
    assert_eq!(asynchronous.execution, ExecutionMode::Async);
}

#[test]
fn test_yaml_configuration_selects_backends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("indexing.yaml");
    std::fs::write(
        &path,
        "version: 1\ndefault:\n  backend: blackhole\nindexes:\n  books:\n    backend: lucene\n",
    )
    .unwrap();

    let global = indexrelay::config::load_properties(&path).unwrap();
    let holder = holder();
    let books = holder
        .build_index_manager(&global, "books", memory_engine("books"))
        .unwrap();
    let authors = holder
        .build_index_manager(&global, "authors", memory_engine("authors"))
        .unwrap();
    assert_eq!(books.backend_name(), "local");
    assert_eq!(authors.backend_name(), "blackhole");
}

#[test]
fn test_yaml_without_version_is_rejected() {
    let err = parse_properties("default:\n  backend: jms\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingVersion));
}

#[test]
fn test_registered_backend_is_used() {
    let registry = BackendRegistry::new();
    registry.register("org.example.NullBackend", || {
        Box::new(BlackholeBackendQueueProcessor::new())
    });
    let holder = IndexManagerHolder::new(BackendFactory::new(registry), WorkerBuildContext::standard());
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "org.example.NullBackend", &[]);

    manager
        .perform_operations(vec![Work::add("Book", 1, book("Dune", "1", 1965))], None)
        .unwrap();
    assert_eq!(count(&engine), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Local backend, sync
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_batch_applies_in_submission_order() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "lucene", &[]);

    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::delete("Book", 1),
                Work::delete("Book", 2),
                Work::add("Book", 2, book("Emma", "2", 1815)),
                Work::add("Book", 3, book("Ulysses", "3", 1922)),
                Work::update("Book", 3, book("Ulysses (annotated)", "3", 1922)),
            ],
            None,
        )
        .unwrap();

    assert_eq!(engine.keys(), vec![book_key(2), book_key(3)]);
    assert_eq!(
        engine.get_document(&book_key(3)),
        Some(book("Ulysses (annotated)", "3", 1922))
    );
}

#[test]
fn test_replaying_add_keeps_one_document() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "lucene", &[]);
    let add = Work::add("Book", 7, book("Dune", "7", 1965));

    manager.perform_operations(vec![add.clone()], None).unwrap();
    manager.perform_operations(vec![add], None).unwrap();
    assert_eq!(count(&engine), 1);
}

#[test]
fn test_deletion_queries_remove_matching_documents() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "lucene", &[]);
    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "978-0441013593", 1965)),
                Work::add("Book", 2, book("Emma", "978-0141439587", 1815)),
                Work::add("Book", 3, book("Ulysses", "978-0199535675", 1922)),
            ],
            None,
        )
        .unwrap();

    let nineteenth_century = DeletionQuery::numeric_range(
        "year",
        NumericKind::Int,
        Some(NumericValue::Int(1800)),
        Some(NumericValue::Int(1900)),
        true,
        false,
    )
    .unwrap();
    manager
        .perform_operations(
            vec![
                Work::delete_by_query("Book", DeletionQuery::term("isbn", "978-0441013593")),
                Work::delete_by_query("Book", nineteenth_century),
            ],
            None,
        )
        .unwrap();

    assert_eq!(engine.keys(), vec![book_key(3)]);
}

#[test]
fn test_sync_engine_failure_propagates() {
    let holder = holder();
    let engine = memory_engine("books");
    engine.reject_type("Secret");
    let manager = books_manager(&holder, engine.clone(), "lucene", &[]);

    let err = manager
        .perform_operations(vec![Work::add("Secret", 1, book("x", "x", 1))], None)
        .unwrap_err();
    assert!(matches!(err, IndexRelayError::Engine(_)));
}

#[test]
fn test_monitor_counts_added_documents() {
    let holder = holder();
    let manager = books_manager(&holder, memory_engine("books"), "lucene", &[]);
    let monitor = Arc::new(CountingMonitor::new());
    let shared: Arc<dyn IndexingMonitor> = monitor.clone();

    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::update("Book", 1, book("Dune", "1", 1966)),
                Work::delete("Book", 2),
            ],
            Some(shared),
        )
        .unwrap();
    assert_eq!(monitor.added(), 2);
}

#[test]
fn test_streaming_work_waits_for_flush() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "lucene", &[]);

    for id in 0..5 {
        manager
            .perform_streaming_operation(Work::add("Book", id, book("t", "i", 2000)), None)
            .unwrap();
    }
    assert_eq!(count(&engine), 0);

    manager.perform_operations(vec![Work::flush(None)], None).unwrap();
    assert_eq!(count(&engine), 5);
}

// ═══════════════════════════════════════════════════════════════════════════
// Local backend, async
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_async_batches_all_land_after_close() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(
        &holder,
        engine.clone(),
        "lucene",
        &[
            (keys::WORKER_EXECUTION, "async"),
            (keys::THREAD_POOL_SIZE, "4"),
            (keys::WORK_QUEUE_SIZE, "8"),
        ],
    );

    for batch in 0..25 {
        let works = (0..4)
            .map(|i| {
                let id = batch * 4 + i;
                Work::add("Book", id, book("t", &id.to_string(), 2000))
            })
            .collect();
        manager.perform_operations(works, None).unwrap();
    }
    manager.perform_operations(vec![Work::flush(None)], None).unwrap();
    holder.close_all().unwrap();

    assert_eq!(count(&engine), 100);
}

#[test]
fn test_async_failure_goes_to_error_handler() {
    let handler = RecordingErrorHandler::new();
    let holder = holder_with(WorkerBuildContext::standard().with_error_handler(handler.clone()));
    let engine = memory_engine("books");
    engine.reject_type("Secret");
    let manager = books_manager(&holder, engine, "lucene", &[(keys::WORKER_EXECUTION, "async")]);

    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::add("Secret", 2, book("x", "x", 1)),
                Work::delete("Book", 3),
            ],
            None,
        )
        .unwrap();
    holder.close_all().unwrap();

    let failures = handler.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index_name, "books");
    assert_eq!(failures[0].failing_kind, Some(WorkKind::Add));
    assert_eq!(failures[0].unprocessed, 1);
}

#[test]
fn test_closed_manager_rejects_work() {
    let holder = holder();
    let manager = books_manager(&holder, memory_engine("books"), "lucene", &[]);
    manager.close().unwrap();
    assert!(matches!(
        manager.perform_operations(vec![Work::flush(None)], None),
        Err(IndexRelayError::Backend(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// Blackhole
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_blackhole_discards_batches() {
    let holder = holder();
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), "blackhole", &[]);
    manager
        .perform_operations(
            vec![Work::add("Book", 1, book("Dune", "1", 1965)), Work::flush(None)],
            None,
        )
        .unwrap();
    assert_eq!(count(&engine), 0);
    assert_eq!(engine.commit_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Queue backend
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_queue_round_trip_applies_on_consumer() {
    let broker = Arc::new(QueueBroker::new());

    let producer = holder_with(WorkerBuildContext::standard().with_broker(Arc::clone(&broker)));
    let producer_engine = memory_engine("books");
    let manager = books_manager(&producer, producer_engine.clone(), "jms", &[]);

    let consumer = Arc::new(holder());
    let consumer_engine = memory_engine("books");
    books_manager(&consumer, consumer_engine.clone(), "lucene", &[]);

    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::add("Book", 2, book("Emma", "2", 1815)),
            ],
            None,
        )
        .unwrap();
    manager.perform_operations(vec![Work::delete("Book", 2)], None).unwrap();

    let mut drainer = QueueDrainer::new(
        &broker,
        "indexrelay.books",
        Arc::clone(&consumer),
        consumer.context().serializer().clone(),
    )
    .unwrap();
    let stats = drainer.drain_pending().await;

    assert_eq!(stats.applied, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(consumer_engine.keys(), vec![book_key(1)]);
    assert_eq!(count(&producer_engine), 0);
}

#[tokio::test]
async fn test_drainer_skips_unknown_index_and_stops_on_close() {
    let broker = Arc::new(QueueBroker::new());
    let producer = holder_with(WorkerBuildContext::standard().with_broker(Arc::clone(&broker)));
    let manager = books_manager(
        &producer,
        memory_engine("books"),
        "jms",
        &[(keys::JMS_QUEUE, "shared")],
    );
    manager.perform_operations(vec![Work::purge_all(None)], None).unwrap();

    let consumer = Arc::new(holder());
    let drainer = QueueDrainer::new(
        &broker,
        "shared",
        Arc::clone(&consumer),
        consumer.context().serializer().clone(),
    )
    .unwrap();
    let running = tokio::spawn(drainer.run());
    broker.close();

    let stats = running.await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.applied, 0);
}

#[tokio::test]
async fn test_drainer_reports_failing_work_to_handler() {
    let broker = Arc::new(QueueBroker::new());
    let producer = holder_with(WorkerBuildContext::standard().with_broker(Arc::clone(&broker)));
    let manager = books_manager(&producer, memory_engine("books"), "jms", &[]);

    let handler = RecordingErrorHandler::new();
    let consumer = Arc::new(holder_with(
        WorkerBuildContext::standard().with_error_handler(handler.clone()),
    ));
    let consumer_engine = memory_engine("books");
    consumer_engine.reject_type("Magazine");
    books_manager(&consumer, consumer_engine.clone(), "lucene", &[]);

    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::add("Magazine", 2, book("Wired", "2", 1993)),
                Work::delete("Book", 3),
            ],
            None,
        )
        .unwrap();

    let mut drainer = QueueDrainer::new(
        &broker,
        "indexrelay.books",
        Arc::clone(&consumer),
        consumer.context().serializer().clone(),
    )
    .unwrap();
    let stats = drainer.drain_pending().await;

    assert_eq!(stats.failed, 1);
    let failures = handler.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index_name, "books");
    assert_eq!(failures[0].failing_kind, Some(WorkKind::Add));
    assert_eq!(failures[0].unprocessed, 1);
    assert!(handler.exceptions().is_empty());
    assert_eq!(count(&consumer_engine), 0);
}

#[test]
fn test_queue_backend_without_broker_fails_start_up() {
    let holder = holder();
    let err = holder
        .build_with_properties(
            &IndexProperties::empty("books").with(keys::BACKEND, "jms"),
            memory_engine("books"),
        )
        .unwrap_err();
    assert!(err.is_config());
}

// ═══════════════════════════════════════════════════════════════════════════
// Tantivy adapter
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_local_backend_on_tantivy_directory() {
    let dir = tempfile::tempdir().unwrap();
    let schema = EngineSchema::new()
        .field("title", FieldType::Text)
        .field("isbn", FieldType::Keyword)
        .field("year", FieldType::I64);
    let engine = Arc::new(TantivyEngine::open_in_dir("books", dir.path(), &schema).unwrap());

    let holder = holder();
    let manager = holder
        .build_with_properties(&IndexProperties::empty("books"), engine.clone())
        .unwrap();
    manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "978-0441013593", 1965)),
                Work::add("Book", 2, book("Emma", "978-0141439587", 1815)),
                Work::add("Book", 1, book("Dune", "978-0441013593", 1965)),
            ],
            None,
        )
        .unwrap();
    assert_eq!(engine.document_count(None).unwrap(), 2);

    manager
        .perform_operations(
            vec![Work::delete_by_query("Book", DeletionQuery::term("isbn", "978-0141439587"))],
            None,
        )
        .unwrap();
    assert!(engine
        .contains_document(&DocumentKey::new("Book", None, "1"))
        .unwrap());
    assert!(!engine
        .contains_document(&DocumentKey::new("Book", None, "2"))
        .unwrap());
}
