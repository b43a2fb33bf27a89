use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{pacing::StreamMode, source::DEFAULT_SAMPLE_ROWS, store::StoreKind};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 22;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Backend tuning. Every field has a default so a config file only needs the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub(crate) kind: StoreKind,
    /// When false, opening a path that holds no store fails instead of
    /// creating an empty one.
    pub(crate) create_if_missing: bool,
    pub(crate) sled_cache_capacity: u64,
    pub(crate) sled_flush_every_ms: Option<u64>,
    pub(crate) rocksdb_max_open_files: i32,
    pub(crate) rocksdb_write_buffer_size: usize,
    pub(crate) rocksdb_max_write_buffer_number: i32,
    pub(crate) rocksdb_target_file_size_base: u64,
    pub(crate) rocksdb_block_cache_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            kind: StoreKind::default(),
            create_if_missing: true,
            sled_cache_capacity: 512 * 1024 * 1024,
            sled_flush_every_ms: Some(500),
            rocksdb_max_open_files: 10_000,
            rocksdb_write_buffer_size: 64 * 1024 * 1024,
            rocksdb_max_write_buffer_number: 3,
            rocksdb_target_file_size_base: 64 * 1024 * 1024,
            rocksdb_block_cache_size: 40 * 1024 * 1024,
        }
    }
}

impl StoreOptions {
    /// Reads overrides from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn kind(self, kind: StoreKind) -> Self {
        StoreOptions { kind, ..self }
    }

    pub fn create_if_missing(self, create_if_missing: bool) -> Self {
        StoreOptions {
            create_if_missing,
            ..self
        }
    }

    pub fn sled_cache_capacity(self, sled_cache_capacity: u64) -> Self {
        StoreOptions {
            sled_cache_capacity,
            ..self
        }
    }

    pub fn sled_flush_every_ms(self, sled_flush_every_ms: Option<u64>) -> Self {
        StoreOptions {
            sled_flush_every_ms,
            ..self
        }
    }

    pub fn rocksdb_max_open_files(self, rocksdb_max_open_files: i32) -> Self {
        StoreOptions {
            rocksdb_max_open_files,
            ..self
        }
    }

    pub fn rocksdb_write_buffer_size(self, rocksdb_write_buffer_size: usize) -> Self {
        StoreOptions {
            rocksdb_write_buffer_size,
            ..self
        }
    }

    pub fn get_kind(&self) -> StoreKind {
        self.kind
    }
}

/// Chunked bulk load of a whole tabular file.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub(crate) source: PathBuf,
    pub(crate) log_path: PathBuf,
    pub(crate) chunk_size: usize,
}

impl IngestOptions {
    pub fn new(source: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        IngestOptions {
            source: source.into(),
            log_path: log_path.into(),
            chunk_size: 10_000,
        }
    }

    pub fn chunk_size(self, chunk_size: usize) -> Self {
        IngestOptions {
            chunk_size: chunk_size.max(1),
            ..self
        }
    }
}

/// Simulated live producer.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub(crate) source: PathBuf,
    pub(crate) log_path: PathBuf,
    pub(crate) mode: StreamMode,
    pub(crate) max_rows: Option<u64>,
    pub(crate) max_duration: Option<Duration>,
    pub(crate) delay_min: Duration,
    pub(crate) delay_max: Duration,
    pub(crate) sample_rows: usize,
    pub(crate) perturb: bool,
    pub(crate) seed: u64,
}

impl StreamOptions {
    pub fn new(source: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        StreamOptions {
            source: source.into(),
            log_path: log_path.into(),
            mode: StreamMode::Random,
            max_rows: None,
            max_duration: None,
            delay_min: Duration::from_millis(100),
            delay_max: Duration::from_secs(1),
            sample_rows: DEFAULT_SAMPLE_ROWS,
            perturb: true,
            seed: DEFAULT_SEED,
        }
    }

    pub fn mode(self, mode: StreamMode) -> Self {
        StreamOptions { mode, ..self }
    }

    /// Zero means unbounded.
    pub fn max_rows(self, max_rows: u64) -> Self {
        StreamOptions {
            max_rows: (max_rows > 0).then_some(max_rows),
            ..self
        }
    }

    /// Zero means unbounded.
    pub fn max_duration(self, max_duration: Duration) -> Self {
        StreamOptions {
            max_duration: (!max_duration.is_zero()).then_some(max_duration),
            ..self
        }
    }

    /// Delay range of the `random` mode. A reversed range is swapped.
    pub fn delay_range(self, min: Duration, max: Duration) -> Self {
        let (delay_min, delay_max) = if min <= max { (min, max) } else { (max, min) };
        StreamOptions {
            delay_min,
            delay_max,
            ..self
        }
    }

    pub fn sample_rows(self, sample_rows: usize) -> Self {
        StreamOptions {
            sample_rows: sample_rows.max(1),
            ..self
        }
    }

    pub fn perturb(self, perturb: bool) -> Self {
        StreamOptions { perturb, ..self }
    }

    pub fn seed(self, seed: u64) -> Self {
        StreamOptions { seed, ..self }
    }
}

/// Query replay over a snapshot of the store.
#[derive(Debug, Clone)]
pub struct BenchmarkOptions {
    pub(crate) log_path: PathBuf,
    pub(crate) rounds: u64,
    pub(crate) max_duration: Option<Duration>,
    pub(crate) seed: u64,
}

impl BenchmarkOptions {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        BenchmarkOptions {
            log_path: log_path.into(),
            rounds: i32::MAX as u64,
            max_duration: None,
            seed: DEFAULT_SEED,
        }
    }

    pub fn rounds(self, rounds: u64) -> Self {
        BenchmarkOptions { rounds, ..self }
    }

    /// Zero means unbounded.
    pub fn max_duration(self, max_duration: Duration) -> Self {
        BenchmarkOptions {
            max_duration: (!max_duration.is_zero()).then_some(max_duration),
            ..self
        }
    }

    pub fn seed(self, seed: u64) -> Self {
        BenchmarkOptions { seed, ..self }
    }
}
