use std::{
    mem,
    time::{Duration, Instant},
};

use crate::{
    observability::log_debug,
    store::{Batch, KvStore, StoreError},
};

/// Result of one [`BatchWriter::flush`].
#[derive(Debug)]
pub struct FlushOutcome {
    /// Entries handed to the store.
    pub attempted: usize,
    /// Entries the store accepted: all of them or none.
    pub accepted: usize,
    /// Wall time of the store write alone.
    pub duration: Duration,
    pub error: Option<StoreError>,
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Accepted rows per second, 0 when the write took no measurable time.
    pub fn rate(&self) -> f64 {
        rate(self.accepted as u64, self.duration.as_secs_f64())
    }
}

/// `count / seconds`, guarded against non-positive durations.
pub fn rate(count: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

/// Stages puts and commits them as one atomic store batch.
///
/// The writer never decides when to flush and never retries; a failed batch
/// is reported and dropped.
pub struct BatchWriter<'s, S: KvStore + ?Sized> {
    store: &'s mut S,
    staged: Batch,
}

impl<'s, S: KvStore + ?Sized> BatchWriter<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        BatchWriter {
            store,
            staged: Batch::default(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.staged.put(key, value);
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Writes everything staged in exactly one store call. Staging is empty
    /// afterwards whatever the outcome.
    pub fn flush(&mut self) -> FlushOutcome {
        let batch = mem::take(&mut self.staged);
        let attempted = batch.len();

        let start = Instant::now();
        let result = self.store.write_batch(batch);
        let duration = start.elapsed();

        log_debug!(
            component = "writer",
            event = "batch_flushed",
            store = self.store.store_type_name(),
            rows = attempted,
            seconds = duration.as_secs_f64(),
            ok = result.is_ok(),
        );
        match result {
            Ok(()) => FlushOutcome {
                attempted,
                accepted: attempted,
                duration,
                error: None,
            },
            Err(error) => FlushOutcome {
                attempted,
                accepted: 0,
                duration,
                error: Some(error),
            },
        }
    }

    pub fn store(&self) -> &S {
        &*self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn one_store_write_per_flush() {
        let mut store = MemStore::new();
        let mut writer = BatchWriter::new(&mut store);
        for n in 1..=4 {
            for i in 0..n {
                writer.put(format!("k{n}_{i}"), b"{}".to_vec());
            }
            let outcome = writer.flush();
            assert!(outcome.is_success());
            assert_eq!(outcome.accepted, n);
            assert_eq!(writer.staged(), 0);
        }
        assert_eq!(writer.store().write_calls(), 4);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn failed_flush_clears_staging_and_reports_store_text() {
        let mut store = MemStore::new();
        store.fail_next_writes(1);
        let mut writer = BatchWriter::new(&mut store);
        writer.put("a", b"1".to_vec());
        writer.put("b", b"2".to_vec());

        let outcome = writer.flush();
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rate(), 0.0);
        let error = outcome.error.expect("injected failure");
        assert!(error.to_string().starts_with("injected write failure"));
        assert_eq!(writer.staged(), 0);

        writer.put("c", b"3".to_vec());
        assert!(writer.flush().is_success());
        assert_eq!(writer.store().write_calls(), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn rate_guards_zero_duration() {
        assert_eq!(rate(10, 0.0), 0.0);
        assert_eq!(rate(10, -1.0), 0.0);
        assert_eq!(rate(10, 2.0), 5.0);
    }
}
