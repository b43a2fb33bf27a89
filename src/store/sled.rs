use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use super::{Batch, KvStore, ScanItem, StoreError, StoreKind};
use crate::option::StoreOptions;

pub struct SledStore {
    db: sled::Db,
    db_dir: PathBuf,
}

impl SledStore {
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(options.sled_cache_capacity)
            .flush_every_ms(options.sled_flush_every_ms)
            .open()
            .map_err(|err| StoreError::Open {
                kind: StoreKind::Sled,
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(SledStore {
            db,
            db_dir: path.to_path_buf(),
        })
    }
}

impl KvStore for SledStore {
    fn store_type_name(&self) -> &'static str {
        "sled"
    }

    fn write_batch(&mut self, batch: Batch) -> Result<(), StoreError> {
        let mut native = sled::Batch::default();
        for entry in batch {
            native.insert(entry.key.as_bytes(), entry.value);
        }
        self.db
            .apply_batch(native)
            .map_err(|err| StoreError::Write(err.to_string()))
    }

    fn scan(&self) -> Box<dyn Iterator<Item = ScanItem> + '_> {
        Box::new(self.db.iter().map(|item| {
            item.map(|(key, value)| {
                (
                    String::from_utf8_lossy(&key).into_owned(),
                    value.to_vec(),
                )
            })
            .map_err(|err| StoreError::Read(err.to_string()))
        }))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|err| StoreError::Write(err.to_string()))?;
        // sled only issues sync_file_range(); fsync the files so a later
        // process sees everything. See https://github.com/spacejam/sled/issues/1351
        for entry in fs::read_dir(&self.db_dir)? {
            let path = entry?.path();
            if path.is_file() {
                File::open(&path)?.sync_all()?;
            }
        }
        Ok(())
    }
}
