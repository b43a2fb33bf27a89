use std::collections::BTreeMap;

use super::{Batch, KvStore, ScanItem, StoreError};

/// In-process backend for dry runs and tests.
///
/// Counts write calls and can be told to reject the next few batches, which
/// is how the writer and drivers are exercised against failing flushes.
#[derive(Debug, Default)]
pub struct MemStore {
    entries: BTreeMap<String, Vec<u8>>,
    write_calls: usize,
    fail_next: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the next `count` batches without applying them.
    pub fn fail_next_writes(&mut self, count: usize) {
        self.fail_next = count;
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl KvStore for MemStore {
    fn store_type_name(&self) -> &'static str {
        "memory"
    }

    fn write_batch(&mut self, batch: Batch) -> Result<(), StoreError> {
        self.write_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Write(format!(
                "injected write failure for batch of {} entries",
                batch.len()
            )));
        }
        for entry in batch {
            self.entries.insert(entry.key, entry.value);
        }
        Ok(())
    }

    fn scan(&self) -> Box<dyn Iterator<Item = ScanItem> + '_> {
        Box::new(
            self.entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), value.clone()))),
        )
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_batches_leave_no_entries() {
        let mut store = MemStore::new();
        store.fail_next_writes(1);

        let mut batch = Batch::default();
        batch.put("k1", b"v1".to_vec());
        batch.put("k2", b"v2".to_vec());
        let err = store.write_batch(batch.clone()).expect_err("injected");
        assert!(err.to_string().contains("2 entries"));
        assert!(store.is_empty());

        store.write_batch(batch).expect("second write");
        assert_eq!(store.write_calls(), 2);
        assert_eq!(store.get("k2"), Some(&b"v2"[..]));
    }
}
