//! Ingestion driver.
//!
//! Two pipelines feed the [`BatchWriter`]: a chunked bulk load that walks a
//! record source once with sequential keys, and a streaming producer that
//! samples cached rows at a paced rate with time keys. Both emit one
//! telemetry line per flush and keep going after a failed batch.

use std::{
    io::Write,
    time::{Duration, Instant},
};

use chrono::Utc;
use thiserror::Error;

use crate::{
    keys::{sequential_key, time_key},
    observability::{log_info, log_warn},
    option::{IngestOptions, StreamOptions},
    pacing::StreamMode,
    perturb::perturb_in_place,
    record::{round2, Record},
    resource::{cpu_percent, ProcessIo, ResourceMetrics, ResourceSampler},
    source::{load_sample, CsvSource, SourceError},
    store::{KvStore, StoreError},
    telemetry::{
        new_run_id, now_iso8601, round4, BatchTelemetry, Status, TelemetryError, TelemetryLog,
    },
    writer::{rate, BatchWriter, FlushOutcome},
};

pub const CHUNKED_MODE: &str = "chunked";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("cannot encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no sample rows to stream from")]
    EmptySample,
}

/// Totals of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub run_id: String,
    pub mode: &'static str,
    pub batches: u64,
    pub failed_batches: u64,
    /// Rows accepted by the store.
    pub rows: u64,
    /// Sum of flush durations.
    pub write_time: Duration,
    pub wall_time: Duration,
}

impl IngestSummary {
    fn new(mode: &'static str) -> Self {
        IngestSummary {
            run_id: new_run_id(),
            mode,
            batches: 0,
            failed_batches: 0,
            rows: 0,
            write_time: Duration::ZERO,
            wall_time: Duration::ZERO,
        }
    }

    /// Accepted rows per second of write time.
    pub fn average_rate(&self) -> f64 {
        rate(self.rows, self.write_time.as_secs_f64())
    }

    /// Folds one flush into the totals and builds its telemetry line.
    fn record_flush(
        &mut self,
        outcome: &FlushOutcome,
        chunk_index: Option<u64>,
        before: &ResourceMetrics,
        after: ResourceMetrics,
        io_delta: Option<ProcessIo>,
    ) -> BatchTelemetry {
        self.batches += 1;
        self.rows += outcome.accepted as u64;
        self.write_time += outcome.duration;
        if !outcome.is_success() {
            self.failed_batches += 1;
        }

        let seconds = outcome.duration.as_secs_f64();
        BatchTelemetry {
            timestamp: now_iso8601(),
            run_id: self.run_id.clone(),
            mode: self.mode,
            chunk_index,
            status: if outcome.is_success() {
                Status::Success
            } else {
                Status::Error
            },
            error: outcome.error.as_ref().map(ToString::to_string),
            rows_ingested: outcome.accepted as u64,
            rows_attempted: outcome.attempted as u64,
            time_taken_seconds: round4(seconds),
            ingestion_rate_rows_per_sec: round2(outcome.rate()),
            total_rows_ingested_so_far: self.rows,
            total_time_taken_so_far: round4(self.write_time.as_secs_f64()),
            cpu_percent: cpu_percent(before, &after, seconds, 1),
            system_metrics: after,
            disk_io_delta_bytes: io_delta,
        }
    }

    fn log_flush(&self, line: &BatchTelemetry) {
        match &line.error {
            None => log_info!(
                component = "ingest",
                event = "batch_ingested",
                mode = self.mode,
                batch = self.batches,
                rows = line.rows_ingested,
                seconds = line.time_taken_seconds,
                rows_per_sec = line.ingestion_rate_rows_per_sec,
                total_rows = self.rows,
            ),
            Some(error) => log_warn!(
                component = "ingest",
                event = "batch_failed",
                mode = self.mode,
                batch = self.batches,
                rows_attempted = line.rows_attempted,
                error = %error,
            ),
        }
    }

    fn log_finished(&self) {
        log_info!(
            component = "ingest",
            event = "ingest_finished",
            run_id = %self.run_id,
            mode = self.mode,
            batches = self.batches,
            failed_batches = self.failed_batches,
            rows = self.rows,
            write_seconds = self.write_time.as_secs_f64(),
            wall_seconds = self.wall_time.as_secs_f64(),
        );
    }
}

/// Loads `records` in chunks of `chunk_size` with `row_<n>` keys.
///
/// Ends when a chunk attempt yields no record. The last chunk may be short.
/// A source error aborts the run; rows staged for the current chunk are not
/// written.
pub fn run_chunked<S, W>(
    store: &mut S,
    records: impl IntoIterator<Item = Result<Record, SourceError>>,
    chunk_size: usize,
    log: &mut TelemetryLog<W>,
    sampler: &ResourceSampler,
) -> Result<IngestSummary, IngestError>
where
    S: KvStore + ?Sized,
    W: Write,
{
    let started = Instant::now();
    let chunk_size = chunk_size.max(1);
    let mut summary = IngestSummary::new(CHUNKED_MODE);
    let mut writer = BatchWriter::new(store);
    let mut records = records.into_iter();
    let mut global_index = 0u64;
    let mut chunk_index = 0u64;

    loop {
        for record in records.by_ref().take(chunk_size) {
            let record = record?;
            writer.put(sequential_key(global_index), serde_json::to_vec(&record)?);
            global_index += 1;
        }
        if writer.staged() == 0 {
            break;
        }
        chunk_index += 1;

        let io_before = sampler.process_io();
        let before = sampler.sample();
        let outcome = writer.flush();
        let after = sampler.sample();
        let io_delta = sampler
            .process_io()
            .zip(io_before)
            .map(|(now, then)| now.delta_since(&then));

        let line = summary.record_flush(&outcome, Some(chunk_index), &before, after, io_delta);
        summary.log_flush(&line);
        log.append(&line)?;
    }

    summary.wall_time = started.elapsed();
    summary.log_finished();
    Ok(summary)
}

/// Streams perturbed samples of `sample` until a budget is reached.
///
/// Budgets are checked at the top of each iteration; the batch of an
/// iteration is clamped so a row budget is met exactly. The only await point
/// is the inter-batch delay, which is skipped once the row budget is met.
pub async fn run_streaming<S, W>(
    store: &mut S,
    sample: &[Record],
    options: &StreamOptions,
    log: &mut TelemetryLog<W>,
    sampler: &ResourceSampler,
    rng: &mut fastrand::Rng,
) -> Result<IngestSummary, IngestError>
where
    S: KvStore + ?Sized,
    W: Write,
{
    if sample.is_empty() {
        return Err(IngestError::EmptySample);
    }
    let started = tokio::time::Instant::now();
    let perturb = options.perturb && options.mode == StreamMode::Random;
    let mut summary = IngestSummary::new(options.mode.as_str());
    let mut writer = BatchWriter::new(store);

    loop {
        let elapsed = started.elapsed();
        if options.max_rows.is_some_and(|max| summary.rows >= max) {
            log_info!(component = "ingest", event = "row_budget_reached", rows = summary.rows);
            break;
        }
        if options.max_duration.is_some_and(|max| elapsed >= max) {
            log_info!(
                component = "ingest",
                event = "time_budget_reached",
                seconds = elapsed.as_secs_f64(),
            );
            break;
        }

        let plan = options
            .mode
            .plan(elapsed, options.delay_min..=options.delay_max, rng)
            .clamp_rows(options.max_rows.map(|max| max - summary.rows));

        for batch_index in 0..plan.rows {
            let mut row = sample[rng.usize(..sample.len())].clone();
            if perturb {
                perturb_in_place(&mut row, rng);
            }
            writer.put(
                time_key(Utc::now(), batch_index),
                serde_json::to_vec(&row)?,
            );
        }

        let before = sampler.sample();
        let outcome = writer.flush();
        let after = sampler.sample();
        let line = summary.record_flush(&outcome, None, &before, after, None);
        summary.log_flush(&line);
        log.append(&line)?;

        if options.max_rows.is_some_and(|max| summary.rows >= max) {
            continue;
        }
        tokio::time::sleep(plan.delay).await;
    }

    summary.wall_time = started.elapsed();
    summary.log_finished();
    Ok(summary)
}

/// Chunked load of the file named by `options`.
pub fn ingest_file<S: KvStore + ?Sized>(
    store: &mut S,
    options: &IngestOptions,
    sampler: &ResourceSampler,
) -> Result<IngestSummary, IngestError> {
    let mut source = CsvSource::open(&options.source)?;
    let mut log = TelemetryLog::open(&options.log_path)?;
    let summary = run_chunked(store, &mut source, options.chunk_size, &mut log, sampler)?;
    if source.skipped() > 0 {
        log_warn!(
            component = "ingest",
            event = "rows_skipped",
            skipped = source.skipped(),
        );
    }
    Ok(summary)
}

/// Streaming run over a cached sample of the file named by `options`.
pub async fn stream_file<S: KvStore + ?Sized>(
    store: &mut S,
    options: &StreamOptions,
    sampler: &ResourceSampler,
) -> Result<IngestSummary, IngestError> {
    let sample = load_sample(&options.source, options.sample_rows)?;
    let mut log = TelemetryLog::open(&options.log_path)?;
    let mut rng = fastrand::Rng::with_seed(options.seed);
    log_info!(
        component = "ingest",
        event = "stream_started",
        mode = options.mode.as_str(),
        sample_rows = sample.len(),
        seed = options.seed,
    );
    run_streaming(store, &sample, options, &mut log, sampler, &mut rng).await
}
