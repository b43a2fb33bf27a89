//! Batched trip-record ingestion and query benchmarks over an embedded KV store.
//!
//! Two independent pipelines share one store: the ingestion drivers turn a
//! tabular trip file into atomic key-value batches (chunked bulk load or a
//! paced, perturbed stream), and the benchmark driver replays a fixed query
//! catalog over a snapshot of whatever the store holds. Both append one JSON
//! line of timing and resource telemetry per batch or query.

mod observability;

/// Trip records and field helpers.
pub mod record;

/// CSV record source and sample cache.
pub mod source;

/// Rule-based randomization of sampled records.
pub mod perturb;

/// Key-value store seam and its backends.
pub mod store;

/// Staging and atomic flushing of key-value batches.
pub mod writer;

/// Key assignment policies.
pub mod keys;

/// Batch size and delay of the streaming modes.
pub mod pacing;

/// Chunked and streaming ingestion drivers.
pub mod ingest;

/// Process and container resource sampling.
pub mod resource;

/// JSON Lines telemetry records and log.
pub mod telemetry;

/// Query catalog and store snapshot.
pub mod query;

/// Benchmark driver.
pub mod bench;

/// Run configuration.
pub mod option;

pub use crate::{
    bench::{benchmark_store, run_benchmark, BenchError, BenchmarkSummary},
    ingest::{ingest_file, run_chunked, run_streaming, stream_file, IngestError, IngestSummary},
    option::{BenchmarkOptions, IngestOptions, StoreOptions, StreamOptions},
    pacing::StreamMode,
    query::{Query, QueryCatalog, Snapshot},
    record::Record,
    resource::ResourceSampler,
    store::{open_store, KvStore, StoreError, StoreKind},
    telemetry::TelemetryLog,
};
