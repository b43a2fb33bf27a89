use chrono::{DateTime, Utc};

/// `row_<global_index>`, the key of the chunked load.
pub fn sequential_key(global_index: u64) -> String {
    format!("row_{global_index}")
}

/// `<utc timestamp>_<index within batch>`, the key of the streaming modes.
///
/// Keys are never derived from record content. Time keys carry no run
/// identifier, so two batches inside the same microsecond could produce the
/// same key; that case is overwritten by the store, not detected.
pub fn time_key(now: DateTime<Utc>, batch_index: usize) -> String {
    format!("{}_{batch_index}", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
}
