//! Key-value store seam.
//!
//! The drivers only need four operations from a store: open, atomic batch
//! write, full scan and close. [`KvStore`] captures those; each backend maps
//! them onto its native batch and iterator types.

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;
#[cfg(feature = "sled")]
pub mod sled;

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

pub use self::memory::MemStore;
use crate::{observability::log_info, option::StoreOptions};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open {kind} store at {path}: {message}")]
    Open {
        kind: StoreKind,
        path: PathBuf,
        message: String,
    },
    #[error("{kind} support is not compiled in (enable the `{kind}` feature)")]
    Unavailable { kind: StoreKind },
    /// Store text for a rejected batch, reported verbatim.
    #[error("{0}")]
    Write(String),
    #[error("{0}")]
    Read(String),
    #[error("store io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sled,
    Rocksdb,
    Memory,
}

impl Default for StoreKind {
    fn default() -> Self {
        if cfg!(feature = "sled") {
            StoreKind::Sled
        } else if cfg!(feature = "rocksdb") {
            StoreKind::Rocksdb
        } else {
            StoreKind::Memory
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::Sled => "sled",
            StoreKind::Rocksdb => "rocksdb",
            StoreKind::Memory => "memory",
        })
    }
}

/// One staged put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Ordered entries committed as one unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<Entry>,
}

impl Batch {
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push(Entry {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub type ScanItem = Result<(String, Vec<u8>), StoreError>;

pub trait KvStore {
    fn store_type_name(&self) -> &'static str;

    /// Applies every entry of `batch` or none of them.
    fn write_batch(&mut self, batch: Batch) -> Result<(), StoreError>;

    /// Iterates all entries in key order over a consistent view.
    fn scan(&self) -> Box<dyn Iterator<Item = ScanItem> + '_>;

    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens the backend named by `options`. `path` is created if it is absent,
/// unless `create_if_missing` is off, in which case a path without store
/// files is an open error.
pub fn open_store(
    path: impl AsRef<Path>,
    options: &StoreOptions,
) -> Result<Box<dyn KvStore>, StoreError> {
    let path = path.as_ref();
    let kind = options.get_kind();
    if kind != StoreKind::Memory {
        if options.create_if_missing {
            fs::create_dir_all(path)?;
        } else if !holds_store(path) {
            return Err(StoreError::Open {
                kind,
                path: path.to_path_buf(),
                message: "no existing store at this path".to_string(),
            });
        }
    }
    let store: Box<dyn KvStore> = match kind {
        StoreKind::Memory => Box::new(MemStore::new()),
        #[cfg(feature = "sled")]
        StoreKind::Sled => Box::new(self::sled::SledStore::open(path, options)?),
        #[cfg(feature = "rocksdb")]
        StoreKind::Rocksdb => Box::new(self::rocksdb::RocksdbStore::open(path, options)?),
        #[allow(unreachable_patterns)]
        kind => return Err(StoreError::Unavailable { kind }),
    };
    log_info!(
        component = "store",
        event = "store_opened",
        kind = store.store_type_name(),
        path = %path.display(),
    );
    Ok(store)
}

fn holds_store(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Removes an existing store directory so the next open starts empty.
pub fn destroy(path: impl AsRef<Path>) -> Result<(), StoreError> {
    let path = path.as_ref();
    match fs::remove_dir_all(path) {
        Ok(()) => {
            log_info!(
                component = "store",
                event = "store_destroyed",
                path = %path.display(),
            );
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
