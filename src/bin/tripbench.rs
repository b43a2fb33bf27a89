//! Command-line entrypoint: bulk load, paced streaming and query benchmark.
//! Single-threaded; the only await point is the streaming delay.

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tripbench::{
    benchmark_store, ingest_file, open_store, option::DEFAULT_SEED, source::DEFAULT_SAMPLE_ROWS,
    stream_file, BenchmarkOptions, BenchmarkSummary, IngestOptions, IngestSummary, KvStore,
    ResourceSampler, StoreKind, StoreOptions, StreamMode, StreamOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trip-record ingestion and query benchmarks")]
struct Cli {
    /// Format of diagnostic output on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Store directory; `load` and `stream` create it, `query` requires it.
    #[arg(long, env = "TRIPBENCH_DB")]
    db: PathBuf,
    /// Backend, overriding the config file.
    #[arg(long, value_enum)]
    store: Option<StoreKind>,
    /// YAML file with store tuning.
    #[arg(long, env = "TRIPBENCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a whole CSV file in fixed-size chunks with sequential keys.
    Load {
        #[command(flatten)]
        store: StoreArgs,
        /// Trip CSV file with a header row.
        #[arg(long)]
        csv: PathBuf,
        /// Telemetry log (JSON Lines, appended).
        #[arg(long, env = "TRIPBENCH_LOG")]
        log: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        chunk_size: usize,
        /// Destroy an existing store before loading.
        #[arg(long)]
        fresh: bool,
    },
    /// Replay sampled rows as a paced stream with time keys.
    Stream {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, env = "TRIPBENCH_LOG")]
        log: PathBuf,
        #[arg(long, value_enum, default_value_t = StreamMode::Random)]
        mode: StreamMode,
        /// Stop after this many rows (0 = unbounded).
        #[arg(long, default_value_t = 0)]
        max_rows: u64,
        /// Stop after this many seconds (0 = unbounded).
        #[arg(long, default_value_t = 0)]
        max_seconds: u64,
        /// Lower bound of the random-mode delay, in seconds.
        #[arg(long, default_value_t = 0.1)]
        delay_min: f64,
        /// Upper bound of the random-mode delay, in seconds.
        #[arg(long, default_value_t = 1.0)]
        delay_max: f64,
        /// Rows cached from the CSV for sampling.
        #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        sample_rows: usize,
        /// Write sampled rows unchanged in random mode.
        #[arg(long)]
        no_perturb: bool,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Snapshot the store and benchmark the query catalog over it.
    Query {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, env = "TRIPBENCH_LOG")]
        log: PathBuf,
        #[arg(long, default_value_t = i32::MAX as u64)]
        rounds: u64,
        /// Stop starting new rounds after this many seconds (0 = unbounded).
        #[arg(long, default_value_t = 0)]
        max_seconds: u64,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;
    let sampler = ResourceSampler::default();

    match cli.command {
        Command::Load {
            store,
            csv,
            log,
            chunk_size,
            fresh,
        } => {
            if fresh {
                tripbench::store::destroy(&store.db)
                    .with_context(|| format!("removing store at {}", store.db.display()))?;
            }
            let mut db = open(&store, true)?;
            let options = IngestOptions::new(csv, log).chunk_size(chunk_size);
            let summary = ingest_file(&mut *db, &options, &sampler).context("chunked load")?;
            db.close().context("closing store")?;
            print_ingest(&summary);
        }
        Command::Stream {
            store,
            csv,
            log,
            mode,
            max_rows,
            max_seconds,
            delay_min,
            delay_max,
            sample_rows,
            no_perturb,
            seed,
        } => {
            let delay_min = Duration::try_from_secs_f64(delay_min).context("invalid --delay-min")?;
            let delay_max = Duration::try_from_secs_f64(delay_max).context("invalid --delay-max")?;
            let mut db = open(&store, true)?;
            let options = StreamOptions::new(csv, log)
                .mode(mode)
                .max_rows(max_rows)
                .max_duration(Duration::from_secs(max_seconds))
                .delay_range(delay_min, delay_max)
                .sample_rows(sample_rows)
                .perturb(!no_perturb)
                .seed(seed);
            let summary = stream_file(&mut *db, &options, &sampler)
                .await
                .context("streaming ingest")?;
            db.close().context("closing store")?;
            print_ingest(&summary);
        }
        Command::Query {
            store,
            log,
            rounds,
            max_seconds,
            seed,
        } => {
            let db = open(&store, false)?;
            let options = BenchmarkOptions::new(log)
                .rounds(rounds)
                .max_duration(Duration::from_secs(max_seconds))
                .seed(seed);
            let summary = benchmark_store(&*db, &options, &sampler).context("query benchmark")?;
            db.close().context("closing store")?;
            print_benchmark(&summary);
        }
    }
    Ok(())
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("installing log subscriber")
}

/// Opens the store named on the command line. With `create` off, a missing
/// store is an error instead of a fresh empty one.
fn open(args: &StoreArgs, create: bool) -> anyhow::Result<Box<dyn KvStore>> {
    let mut options = match &args.config {
        Some(path) => StoreOptions::from_yaml_file(path)?,
        None => StoreOptions::default(),
    }
    .create_if_missing(create);
    if let Some(kind) = args.store {
        options = options.kind(kind);
    }
    open_store(&args.db, &options)
        .with_context(|| format!("opening store at {}", args.db.display()))
}

fn print_ingest(summary: &IngestSummary) {
    let mut table = Table::new();
    table.set_header([
        "run", "mode", "batches", "failed", "rows", "write s", "wall s", "rows/s",
    ]);
    table.add_row([
        summary.run_id.clone(),
        summary.mode.to_string(),
        summary.batches.to_string(),
        summary.failed_batches.to_string(),
        summary.rows.to_string(),
        format!("{:.4}", summary.write_time.as_secs_f64()),
        format!("{:.2}", summary.wall_time.as_secs_f64()),
        format!("{:.2}", summary.average_rate()),
    ]);
    println!();
    println!("{table}");
}

fn print_benchmark(summary: &BenchmarkSummary) {
    let mut table = Table::new();
    table.set_header(["query", "executions", "mean ms", "max ms"]);
    for (query_type, stats) in &summary.per_query {
        table.add_row([
            query_type.to_string(),
            stats.executions.to_string(),
            format!("{:.3}", stats.mean_time().as_secs_f64() * 1_000.0),
            format!("{:.3}", stats.max_time.as_secs_f64() * 1_000.0),
        ]);
    }
    println!();
    println!("{table}");
    println!(
        "run {}: {} rounds, {} executions, {:.3}s in queries, {} unwritten log lines",
        summary.run_id,
        summary.rounds_completed,
        summary.executions,
        summary.total_query_time.as_secs_f64(),
        summary.log_failures,
    );
}
