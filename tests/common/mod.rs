//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use tripbench::record::{fields, synthetic_trip};

/// Header cells as published, mixed case included.
const HEADER: [(&str, &str); 12] = [
    ("VendorID", fields::VENDOR_ID),
    ("tpep_pickup_datetime", fields::PICKUP_DATETIME),
    ("tpep_dropoff_datetime", fields::DROPOFF_DATETIME),
    ("passenger_count", fields::PASSENGER_COUNT),
    ("trip_distance", fields::TRIP_DISTANCE),
    ("RatecodeID", fields::RATECODE_ID),
    ("PULocationID", fields::PU_LOCATION_ID),
    ("DOLocationID", fields::DO_LOCATION_ID),
    ("payment_type", fields::PAYMENT_TYPE),
    ("fare_amount", fields::FARE_AMOUNT),
    ("tip_amount", fields::TIP_AMOUNT),
    ("total_amount", fields::TOTAL_AMOUNT),
];

/// Writes `rows` synthetic trips to `dir/trips.csv`.
pub fn write_trips_csv(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("trips.csv");
    let mut writer = csv::Writer::from_path(&path).expect("create csv");
    writer
        .write_record(HEADER.iter().map(|(header, _)| *header))
        .expect("write header");
    let mut rng = fastrand::Rng::with_seed(3);
    for index in 0..rows {
        let trip = synthetic_trip(&mut rng, index);
        writer
            .write_record(HEADER.iter().map(|(_, field)| trip[*field].as_str()))
            .expect("write row");
    }
    writer.flush().expect("flush csv");
    path
}

/// Parses every line of a JSON Lines file.
pub fn read_log(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .expect("read log")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}
