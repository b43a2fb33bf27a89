//! Benchmark driver: timed replay of the query catalog over a snapshot.
//!
//! A run is `rounds` rounds of [`OUTER_LOOPS`] groups. Each group executes
//! the first [`NORMAL_PER_GROUP`] entries of a fresh shuffle of the normal
//! catalog, then one heavy query chosen uniformly. Every execution becomes
//! one telemetry line.

use std::{
    collections::BTreeMap,
    io::Write,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    observability::{log_debug, log_info, log_warn},
    option::BenchmarkOptions,
    query::{Query, QueryCatalog, Snapshot},
    resource::{available_cores, cpu_percent, ResourceMetrics, ResourceSampler},
    store::{KvStore, StoreError},
    telemetry::{new_run_id, now_iso8601, QueryTelemetry, TelemetryError, TelemetryLog},
};

pub const OUTER_LOOPS: usize = 10;
pub const NORMAL_PER_GROUP: usize = 5;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// One timed execution.
#[derive(Debug, Clone)]
pub struct QueryRun {
    pub query: Query,
    pub row_count: usize,
    pub duration: Duration,
    pub cpu_percent: f64,
    /// Sample taken right after the query returned.
    pub after: ResourceMetrics,
}

/// Executes `query` between two resource samples.
pub fn run_query(
    query: Query,
    snapshot: &Snapshot,
    rng: &mut fastrand::Rng,
    sampler: &ResourceSampler,
    cores: usize,
) -> QueryRun {
    let before = sampler.sample();
    let start = Instant::now();
    let row_count = query.execute(snapshot, rng);
    let duration = start.elapsed();
    let after = sampler.sample();

    QueryRun {
        query,
        row_count,
        duration,
        cpu_percent: cpu_percent(&before, &after, duration.as_secs_f64(), cores),
        after,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryStats {
    pub executions: u64,
    pub total_time: Duration,
    pub max_time: Duration,
}

impl QueryStats {
    pub fn mean_time(&self) -> Duration {
        if self.executions == 0 {
            return Duration::ZERO;
        }
        self.total_time.div_f64(self.executions as f64)
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkSummary {
    pub run_id: String,
    pub rounds_completed: u64,
    pub executions: u64,
    pub total_query_time: Duration,
    pub wall_time: Duration,
    /// Telemetry lines that could not be written.
    pub log_failures: u64,
    pub per_query: BTreeMap<&'static str, QueryStats>,
}

impl BenchmarkSummary {
    fn new() -> Self {
        BenchmarkSummary {
            run_id: new_run_id(),
            rounds_completed: 0,
            executions: 0,
            total_query_time: Duration::ZERO,
            wall_time: Duration::ZERO,
            log_failures: 0,
            per_query: BTreeMap::new(),
        }
    }

    fn record(&mut self, run: &QueryRun) {
        self.executions += 1;
        self.total_query_time += run.duration;
        let stats = self.per_query.entry(run.query.query_type()).or_default();
        stats.executions += 1;
        stats.total_time += run.duration;
        stats.max_time = stats.max_time.max(run.duration);
    }
}

struct Driver<'a, W: Write> {
    snapshot: &'a Snapshot,
    sampler: &'a ResourceSampler,
    log: &'a mut TelemetryLog<W>,
    rng: &'a mut fastrand::Rng,
    cores: usize,
    summary: BenchmarkSummary,
}

impl<W: Write> Driver<'_, W> {
    fn execute(&mut self, query: Query, round: u64, group: usize) {
        let run = run_query(query, self.snapshot, self.rng, self.sampler, self.cores);
        self.summary.record(&run);
        log_debug!(
            component = "bench",
            event = "query_executed",
            query_type = query.query_type(),
            round,
            group,
            rows = run.row_count,
            seconds = run.duration.as_secs_f64(),
        );

        let line = QueryTelemetry {
            timestamp: now_iso8601(),
            run_id: self.summary.run_id.clone(),
            round,
            group,
            query: query.description(),
            query_type: query.query_type(),
            class: query.class(),
            row_count: run.row_count,
            time_taken_seconds: run.duration.as_secs_f64(),
            cpu_percent: run.cpu_percent,
            memory_percent: run.after.memory_percent,
            memory_used_gb: run.after.memory_used_gb,
        };
        if let Err(err) = self.log.append(&line) {
            self.summary.log_failures += 1;
            log_warn!(
                component = "bench",
                event = "telemetry_write_failed",
                query_type = query.query_type(),
                error = %err,
            );
        }
    }
}

/// Replays `catalog` over `snapshot`. The time budget, if any, is checked
/// once per round; a started round always completes.
pub fn run_benchmark<W: Write>(
    snapshot: &Snapshot,
    catalog: &QueryCatalog,
    options: &BenchmarkOptions,
    log: &mut TelemetryLog<W>,
    sampler: &ResourceSampler,
    rng: &mut fastrand::Rng,
) -> BenchmarkSummary {
    let started = Instant::now();
    let mut driver = Driver {
        snapshot,
        sampler,
        log,
        rng,
        cores: available_cores(),
        summary: BenchmarkSummary::new(),
    };
    log_info!(
        component = "bench",
        event = "benchmark_started",
        run_id = %driver.summary.run_id,
        rows = snapshot.len(),
        rounds = options.rounds,
    );

    for round in 1..=options.rounds {
        if options.max_duration.is_some_and(|max| started.elapsed() >= max) {
            log_info!(
                component = "bench",
                event = "time_budget_reached",
                rounds_completed = driver.summary.rounds_completed,
            );
            break;
        }
        for group in 1..=OUTER_LOOPS {
            let mut normal = catalog.normal().to_vec();
            driver.rng.shuffle(&mut normal);
            for query in normal.into_iter().take(NORMAL_PER_GROUP) {
                driver.execute(query, round, group);
            }
            if !catalog.heavy().is_empty() {
                let heavy = catalog.heavy()[driver.rng.usize(..catalog.heavy().len())];
                driver.execute(heavy, round, group);
            }
        }
        driver.summary.rounds_completed += 1;
    }

    let mut summary = driver.summary;
    summary.wall_time = started.elapsed();
    log_info!(
        component = "bench",
        event = "benchmark_finished",
        run_id = %summary.run_id,
        rounds = summary.rounds_completed,
        executions = summary.executions,
        query_seconds = summary.total_query_time.as_secs_f64(),
        log_failures = summary.log_failures,
    );
    summary
}

/// Loads a snapshot of `store` and benchmarks the standard catalog over it.
pub fn benchmark_store<S: KvStore + ?Sized>(
    store: &S,
    options: &BenchmarkOptions,
    sampler: &ResourceSampler,
) -> Result<BenchmarkSummary, BenchError> {
    let snapshot = Snapshot::load(store)?;
    let mut log = TelemetryLog::open(&options.log_path)?;
    let mut rng = fastrand::Rng::with_seed(options.seed);
    Ok(run_benchmark(
        &snapshot,
        &QueryCatalog::standard(),
        options,
        &mut log,
        sampler,
        &mut rng,
    ))
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::{query::QueryClass, record::synthetic_trip};

    fn snapshot(n: usize) -> Snapshot {
        let mut rng = fastrand::Rng::with_seed(5);
        Snapshot::from_records((0..n).map(|i| synthetic_trip(&mut rng, i)).collect())
    }

    struct BrokenLog;

    impl Write for BrokenLog {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn one_round_runs_ten_groups_of_six() {
        let snapshot = snapshot(200);
        let options = BenchmarkOptions::new("unused.jsonl").rounds(1);
        let mut log = TelemetryLog::new(Vec::new());
        let mut rng = fastrand::Rng::with_seed(22);

        let summary = run_benchmark(
            &snapshot,
            &QueryCatalog::standard(),
            &options,
            &mut log,
            &ResourceSampler::default(),
            &mut rng,
        );
        assert_eq!(summary.rounds_completed, 1);
        assert_eq!(summary.executions, (OUTER_LOOPS * (NORMAL_PER_GROUP + 1)) as u64);

        let text = String::from_utf8(log.into_inner()).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json"))
            .collect();
        assert_eq!(lines.len(), 60);
        for group in lines.chunks(NORMAL_PER_GROUP + 1) {
            let (heavy, normal) = group.split_last().expect("group");
            assert!(normal.iter().all(|line| line["class"] == "normal"));
            assert_eq!(heavy["class"], "heavy");
            let distinct: std::collections::HashSet<&str> = normal
                .iter()
                .map(|line| line["query_type"].as_str().expect("type"))
                .collect();
            assert_eq!(distinct.len(), NORMAL_PER_GROUP);
        }
        for key in [
            "timestamp",
            "run_id",
            "query",
            "row_count",
            "time_taken_seconds",
            "cpu_percent",
            "memory_percent",
            "memory_used_gb",
        ] {
            assert!(lines[0].get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn same_seed_same_query_sequence() {
        let snapshot = snapshot(50);
        let options = BenchmarkOptions::new("unused.jsonl").rounds(2);
        let sequence = || {
            let mut log = TelemetryLog::new(Vec::new());
            let mut rng = fastrand::Rng::with_seed(7);
            run_benchmark(
                &snapshot,
                &QueryCatalog::standard(),
                &options,
                &mut log,
                &ResourceSampler::default(),
                &mut rng,
            );
            String::from_utf8(log.into_inner())
                .expect("utf8")
                .lines()
                .map(|line| {
                    let value: serde_json::Value = serde_json::from_str(line).expect("json");
                    (value["query_type"].to_string(), value["row_count"].clone())
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(sequence(), sequence());
    }

    #[test]
    fn log_failures_do_not_stop_the_run() {
        let snapshot = snapshot(20);
        let options = BenchmarkOptions::new("unused.jsonl").rounds(1);
        let mut log = TelemetryLog::new(BrokenLog);
        let mut rng = fastrand::Rng::with_seed(1);
        let summary = run_benchmark(
            &snapshot,
            &QueryCatalog::standard(),
            &options,
            &mut log,
            &ResourceSampler::default(),
            &mut rng,
        );
        assert_eq!(summary.executions, 60);
        assert_eq!(summary.log_failures, 60);
    }

    #[test]
    fn zero_time_budget_runs_no_round() {
        let snapshot = snapshot(10);
        let options = BenchmarkOptions::new("unused.jsonl").rounds(3);
        let options = BenchmarkOptions {
            max_duration: Some(Duration::ZERO),
            ..options
        };
        let mut log = TelemetryLog::new(Vec::new());
        let mut rng = fastrand::Rng::with_seed(1);
        let summary = run_benchmark(
            &snapshot,
            &QueryCatalog::standard(),
            &options,
            &mut log,
            &ResourceSampler::default(),
            &mut rng,
        );
        assert_eq!(summary.rounds_completed, 0);
        assert_eq!(log.lines(), 0);
    }

    #[test]
    fn mean_time_survives_execution_counts_past_u32() {
        let stats = QueryStats {
            executions: 2,
            total_time: Duration::from_secs(3),
            max_time: Duration::from_secs(2),
        };
        assert_eq!(stats.mean_time(), Duration::from_millis(1500));

        let executions = u64::from(u32::MAX) + 1;
        let stats = QueryStats {
            executions,
            total_time: Duration::from_secs(executions),
            max_time: Duration::from_secs(1),
        };
        assert_eq!(stats.mean_time(), Duration::from_secs(1));
        assert_eq!(QueryStats::default().mean_time(), Duration::ZERO);
    }

    #[test]
    fn run_query_measures_one_execution() {
        let snapshot = snapshot(30);
        let mut rng = fastrand::Rng::with_seed(1);
        let run = run_query(
            Query::BasicWindow,
            &snapshot,
            &mut rng,
            &ResourceSampler::default(),
            available_cores(),
        );
        assert_eq!(run.row_count, 30);
        assert_eq!(run.query.class(), QueryClass::Heavy);
        assert!(run.cpu_percent >= 0.0);
    }
}
