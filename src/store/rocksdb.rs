use std::path::Path;

use rocksdb::{
    BlockBasedOptions, Cache, DBCompactionStyle, DBCompressionType, IteratorMode, Options,
    WriteBatch, DB,
};

use super::{Batch, KvStore, ScanItem, StoreError, StoreKind};
use crate::option::StoreOptions;

pub struct RocksdbStore {
    db: DB,
}

impl RocksdbStore {
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        let mut bb = BlockBasedOptions::default();
        bb.set_block_cache(&Cache::new_lru_cache(options.rocksdb_block_cache_size));

        let mut opts = Options::default();
        opts.set_block_based_table_factory(&bb);
        opts.create_if_missing(options.create_if_missing);
        opts.set_compaction_style(DBCompactionStyle::Level);
        opts.set_compression_type(DBCompressionType::Lz4);
        opts.set_max_open_files(options.rocksdb_max_open_files);
        opts.set_write_buffer_size(options.rocksdb_write_buffer_size);
        opts.set_max_write_buffer_number(options.rocksdb_max_write_buffer_number);
        opts.set_target_file_size_base(options.rocksdb_target_file_size_base);

        let db = DB::open(&opts, path).map_err(|err| StoreError::Open {
            kind: StoreKind::Rocksdb,
            path: path.to_path_buf(),
            message: err.into_string(),
        })?;
        Ok(RocksdbStore { db })
    }
}

impl KvStore for RocksdbStore {
    fn store_type_name(&self) -> &'static str {
        "rocksdb"
    }

    fn write_batch(&mut self, batch: Batch) -> Result<(), StoreError> {
        let mut native = WriteBatch::default();
        for entry in batch {
            native.put(entry.key.as_bytes(), &entry.value);
        }
        self.db
            .write(native)
            .map_err(|err| StoreError::Write(err.into_string()))
    }

    fn scan(&self) -> Box<dyn Iterator<Item = ScanItem> + '_> {
        let snapshot_iter = self.db.iterator(IteratorMode::Start);
        Box::new(snapshot_iter.map(|item| {
            item.map(|(key, value)| {
                (
                    String::from_utf8_lossy(&key).into_owned(),
                    value.into_vec(),
                )
            })
            .map_err(|err| StoreError::Read(err.into_string()))
        }))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|err| StoreError::Write(err.into_string()))
    }
}
