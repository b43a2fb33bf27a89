mod common;

use std::{collections::BTreeSet, time::Duration};

use tripbench::{
    record::Record, source::load_sample, store::MemStore, stream_file, IngestError,
    ResourceSampler, StreamMode, StreamOptions,
};

#[tokio::test(start_paused = true)]
async fn fixed_rows_stops_at_the_row_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = common::write_trips_csv(dir.path(), 20);
    let log = dir.path().join("stream.jsonl");

    let mut store = MemStore::new();
    let options = StreamOptions::new(&csv, &log)
        .mode(StreamMode::FixedRows)
        .max_rows(25);
    let summary = stream_file(&mut store, &options, &ResourceSampler::default())
        .await
        .expect("stream");

    assert_eq!(summary.rows, 25);
    assert_eq!(store.write_calls(), 3);
    let lines = common::read_log(&log);
    let sizes: Vec<u64> = lines
        .iter()
        .map(|line| line["rows_ingested"].as_u64().expect("rows"))
        .collect();
    assert_eq!(sizes, [10, 10, 5]);
    assert!(lines.iter().all(|line| line["mode"] == "fixed_rows"));
    assert!(lines.iter().all(|line| line.get("chunk_index").is_none()));
}

#[tokio::test(start_paused = true)]
async fn scheduled_pattern_follows_the_elapsed_minute() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = common::write_trips_csv(dir.path(), 20);
    let log = dir.path().join("stream.jsonl");

    let mut store = MemStore::new();
    let options = StreamOptions::new(&csv, &log)
        .mode(StreamMode::ScheduledPattern)
        .max_duration(Duration::from_secs(125));
    let summary = stream_file(&mut store, &options, &ResourceSampler::default())
        .await
        .expect("stream");

    // One batch per second: 60 of one row, 60 of two, 5 of three.
    assert_eq!(summary.batches, 125);
    assert_eq!(summary.rows, 60 + 120 + 15);
    let lines = common::read_log(&log);
    assert_eq!(lines[0]["rows_ingested"], 1);
    assert_eq!(lines[60]["rows_ingested"], 2);
    assert_eq!(lines[124]["rows_ingested"], 3);
}

#[tokio::test(start_paused = true)]
async fn scheduled_pattern_stops_at_the_row_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = common::write_trips_csv(dir.path(), 20);
    let log = dir.path().join("stream.jsonl");

    let mut store = MemStore::new();
    let options = StreamOptions::new(&csv, &log)
        .mode(StreamMode::ScheduledPattern)
        .max_rows(100);
    let summary = stream_file(&mut store, &options, &ResourceSampler::default())
        .await
        .expect("stream");

    // 60 one-row batches in minute 0, then 20 two-row batches.
    assert_eq!(summary.rows, 100);
    assert_eq!(summary.batches, 80);
    assert_eq!(store.write_calls(), 80);
    let lines = common::read_log(&log);
    assert_eq!(lines.last().expect("lines")["total_rows_ingested_so_far"], 100);
}

#[tokio::test(start_paused = true)]
async fn unperturbed_random_rows_come_from_the_sample() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = common::write_trips_csv(dir.path(), 30);
    let log = dir.path().join("stream.jsonl");

    let mut store = MemStore::new();
    let options = StreamOptions::new(&csv, &log)
        .mode(StreamMode::Random)
        .max_rows(300)
        .perturb(false)
        .seed(9);
    let summary = stream_file(&mut store, &options, &ResourceSampler::default())
        .await
        .expect("stream");
    assert_eq!(summary.rows, 300);

    let sample: BTreeSet<Record> = load_sample(&csv, 5000)
        .expect("sample")
        .into_iter()
        .collect();
    let snapshot = tripbench::Snapshot::load(&store).expect("snapshot");
    assert!(!snapshot.is_empty());
    assert!(snapshot.rows().iter().all(|row| sample.contains(row)));
}

#[tokio::test(start_paused = true)]
async fn header_only_file_cannot_stream() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = common::write_trips_csv(dir.path(), 0);
    let log = dir.path().join("stream.jsonl");

    let options = StreamOptions::new(&csv, &log).max_rows(10);
    let err = stream_file(&mut MemStore::new(), &options, &ResourceSampler::default())
        .await
        .expect_err("empty sample");
    assert!(
        matches!(err, IngestError::Source(_) | IngestError::EmptySample),
        "{err}"
    );
}
