//! indexrelay Benchmark CLI
//!
//! Measures producer-side cost of pushing batches through a backend.
//!
//! # Usage
//!
//! ```bash
//! # Producer overhead only (default backend: blackhole)
//! cargo run --bin relay-bench --release -- run --batches 1000 --batch-size 50
//!
//! # Local backend into tantivy, async with 4 workers
//! cargo run --bin relay-bench --release -- run --backend lucene --engine tantivy --execution async --threads 4
//!
//! # Wire protocol encode/decode throughput
//! cargo run --bin relay-bench --release -- protocol --batches 1000
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use indexrelay::config::{keys, IndexProperties};
use indexrelay::features::backend::{
    BackendFactory, CountingMonitor, IndexManagerHolder, IndexingMonitor, WorkerBuildContext,
};
use indexrelay::features::engine::{
    EngineSchema, FieldType, IndexEngine, InMemoryEngine, TantivyEngine,
};
use indexrelay::features::work::{Document, Field, NumericValue, Work};

#[derive(Parser)]
#[command(name = "relay-bench")]
#[command(about = "indexrelay Benchmark - producer throughput per backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push synthetic Add batches through a backend
    Run {
        /// Backend name
        #[arg(short, long, default_value = "blackhole")]
        backend: String,

        /// Engine behind the local backend
        #[arg(long, value_enum, default_value_t = EngineKind::Memory)]
        engine: EngineKind,

        /// sync or async
        #[arg(long, default_value = "sync")]
        execution: String,

        /// Worker threads for async execution
        #[arg(long, default_value = "1")]
        threads: usize,

        /// Number of batches
        #[arg(long, default_value = "1000")]
        batches: usize,

        /// Works per batch
        #[arg(long, default_value = "20")]
        batch_size: usize,
    },

    /// Serialize and deserialize synthetic batches
    Protocol {
        /// Number of batches
        #[arg(long, default_value = "1000")]
        batches: usize,

        /// Works per batch
        #[arg(long, default_value = "20")]
        batch_size: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineKind {
    Memory,
    Tantivy,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            backend,
            engine,
            execution,
            threads,
            batches,
            batch_size,
        } => {
            run_backend(&backend, engine, &execution, threads, batches, batch_size)?;
        }
        Commands::Protocol {
            batches,
            batch_size,
        } => {
            run_protocol(batches, batch_size)?;
        }
    }

    Ok(())
}

fn synthetic_batch(batch: usize, batch_size: usize) -> Vec<Work> {
    (0..batch_size)
        .map(|i| {
            let id = (batch * batch_size + i) as i64;
            let document = Document::new()
                .field(Field::text("title", format!("Synthetic title {}", id)))
                .field(Field::keyword("isbn", format!("isbn-{:08}", id)))
                .field(Field::numeric("year", NumericValue::Long(1900 + id % 120)));
            Work::add("Book", id, document)
        })
        .collect()
}

fn build_engine(kind: EngineKind) -> Result<Arc<dyn IndexEngine>, Box<dyn std::error::Error>> {
    let engine: Arc<dyn IndexEngine> = match kind {
        EngineKind::Memory => Arc::new(InMemoryEngine::new("bench")),
        EngineKind::Tantivy => {
            let schema = EngineSchema::new()
                .field("title", FieldType::Text)
                .field("isbn", FieldType::Keyword)
                .field("year", FieldType::I64);
            Arc::new(TantivyEngine::in_memory("bench", &schema)?)
        }
    };
    Ok(engine)
}

fn run_backend(
    backend: &str,
    engine: EngineKind,
    execution: &str,
    threads: usize,
    batches: usize,
    batch_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let props = IndexProperties::empty("bench")
        .with(keys::BACKEND, backend)
        .with(keys::WORKER_EXECUTION, execution)
        .with(keys::THREAD_POOL_SIZE, threads.to_string());

    let engine = build_engine(engine)?;
    let holder = IndexManagerHolder::new(BackendFactory::standard(), WorkerBuildContext::standard());
    let manager = holder.build_with_properties(&props, Arc::clone(&engine))?;
    let monitor = Arc::new(CountingMonitor::new());

    println!("🚀 relay-bench: backend={} execution={} threads={}", manager.backend_name(), execution, threads);

    let start = Instant::now();
    for batch in 0..batches {
        let monitor: Arc<dyn IndexingMonitor> = monitor.clone();
        manager.perform_operations(synthetic_batch(batch, batch_size), Some(monitor))?;
    }
    let submitted = start.elapsed();
    holder.close_all()?;
    let drained = start.elapsed();

    report("submit", batches * batch_size, submitted);
    report("submit + drain", batches * batch_size, drained);
    println!("   documents added: {}", monitor.added());
    println!("   documents in index: {}", engine.document_count(None)?);
    Ok(())
}

fn run_protocol(batches: usize, batch_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let context = WorkerBuildContext::standard();
    let serializer = context.serializer();

    let start = Instant::now();
    let mut bytes = 0usize;
    let mut decoded = 0usize;
    for batch in 0..batches {
        let payload = serializer.to_serialized_model(&synthetic_batch(batch, batch_size))?;
        bytes += payload.len();
        decoded += serializer.to_works(&payload)?.len();
    }
    let elapsed = start.elapsed();

    report("encode + decode", decoded, elapsed);
    println!("   wire bytes: {} ({:.1} per work)", bytes, bytes as f64 / decoded.max(1) as f64);
    Ok(())
}

fn report(label: &str, works: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    println!(
        "   {:<16} {:>8} works in {:>8.2?} ({:.0} works/s)",
        label,
        works,
        elapsed,
        works as f64 / secs
    );
}
