//! Append-only JSON Lines telemetry.
//!
//! One object per flushed batch or executed query. Lines are written whole
//! and flushed before `append` returns, so a crash loses at most the event
//! in flight. Files are opened in append mode and accumulate across runs;
//! `run_id` tells the runs apart.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::{
    query::QueryClass,
    resource::{ProcessIo, ResourceMetrics},
};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("cannot open telemetry log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot encode telemetry record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot write telemetry record: {0}")]
    Write(#[from] io::Error),
}

/// UTC `YYYYmmddHHMMSS-mmm`.
pub fn new_run_id() -> String {
    let now = Utc::now();
    let millis = now.timestamp_subsec_millis();
    format!("{}-{millis:03}", now.format("%Y%m%d%H%M%S"))
}

/// ISO-8601 UTC with microseconds.
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Seconds rounded to four decimals, the precision the logs carry.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchTelemetry {
    pub timestamp: String,
    pub run_id: String,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rows_ingested: u64,
    pub rows_attempted: u64,
    pub time_taken_seconds: f64,
    pub ingestion_rate_rows_per_sec: f64,
    pub total_rows_ingested_so_far: u64,
    pub total_time_taken_so_far: f64,
    pub cpu_percent: f64,
    pub system_metrics: ResourceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_io_delta_bytes: Option<ProcessIo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryTelemetry {
    pub timestamp: String,
    pub run_id: String,
    pub round: u64,
    pub group: usize,
    /// SQL-like description of what ran.
    pub query: &'static str,
    pub query_type: &'static str,
    pub class: QueryClass,
    pub row_count: usize,
    pub time_taken_seconds: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
}

pub struct TelemetryLog<W: Write> {
    out: W,
    lines: u64,
}

impl TelemetryLog<File> {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let open = || -> io::Result<File> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new().create(true).append(true).open(path)
        };
        let file = open().map_err(|source| TelemetryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(TelemetryLog::new(file))
    }
}

impl<W: Write> TelemetryLog<W> {
    pub fn new(out: W) -> Self {
        TelemetryLog { out, lines: 0 }
    }

    /// Writes `record` as one line and flushes it.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), TelemetryError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.out.write_all(&line)?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }

    /// Lines appended through this handle.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceSampler;

    fn batch(status: Status, error: Option<String>) -> BatchTelemetry {
        BatchTelemetry {
            timestamp: now_iso8601(),
            run_id: new_run_id(),
            mode: "chunked",
            chunk_index: Some(1),
            status,
            error,
            rows_ingested: 0,
            rows_attempted: 2,
            time_taken_seconds: round4(0.123456),
            ingestion_rate_rows_per_sec: 0.0,
            total_rows_ingested_so_far: 0,
            total_time_taken_so_far: 0.0,
            cpu_percent: 0.0,
            system_metrics: ResourceSampler::default().sample(),
            disk_io_delta_bytes: None,
        }
    }

    #[test]
    fn one_json_object_per_line() {
        let mut log = TelemetryLog::new(Vec::new());
        log.append(&batch(Status::Success, None)).expect("append");
        log.append(&batch(Status::Error, Some("boom".into())))
            .expect("append");
        assert_eq!(log.lines(), 2);

        let text = String::from_utf8(log.into_inner()).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "SUCCESS");
        assert!(lines[0].get("error").is_none());
        assert!(lines[0].get("disk_io_delta_bytes").is_none());
        assert_eq!(lines[1]["status"], "ERROR");
        assert_eq!(lines[1]["error"], "boom");
        assert_eq!(lines[1]["time_taken_seconds"], 0.1235);
        assert!(lines[1]["system_metrics"]["memory_percent"].is_number());
    }

    #[test]
    fn open_appends_across_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs/nested/ingest.jsonl");
        for _ in 0..2 {
            let mut log = TelemetryLog::open(&path).expect("open");
            log.append(&batch(Status::Success, None)).expect("append");
        }
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn timestamps_and_run_ids_have_fixed_shape() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000000Z".len());
        let run_id = new_run_id();
        assert_eq!(run_id.len(), "20240101000000-000".len());
        assert_eq!(&run_id[14..15], "-");
    }
}
