//! Trip records and the field vocabulary shared by perturbation and queries.
//!
//! A [`Record`] keeps every value as text, exactly as the tabular source
//! encodes it. Numeric and datetime interpretation happens at the point of
//! use and a value that does not parse is simply skipped there.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Field name -> textual value. Field names are lower-cased on load.
pub type Record = BTreeMap<String, String>;

/// Lower-cased field names of the yellow-taxi trip schema.
pub mod fields {
    pub const VENDOR_ID: &str = "vendorid";
    pub const PICKUP_DATETIME: &str = "tpep_pickup_datetime";
    pub const DROPOFF_DATETIME: &str = "tpep_dropoff_datetime";
    pub const PASSENGER_COUNT: &str = "passenger_count";
    pub const TRIP_DISTANCE: &str = "trip_distance";
    pub const RATECODE_ID: &str = "ratecodeid";
    pub const PU_LOCATION_ID: &str = "pulocationid";
    pub const DO_LOCATION_ID: &str = "dolocationid";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const FARE_AMOUNT: &str = "fare_amount";
    pub const TIP_AMOUNT: &str = "tip_amount";
    pub const TOTAL_AMOUNT: &str = "total_amount";
}

/// Datetime layouts accepted in trip files, tried in order.
///
/// The first is the layout of the published CSV exports; the rest cover
/// ISO-style exports. `%.f` also matches a missing fraction.
pub const DATETIME_FORMATS: [&str; 3] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Case-normalizes a header cell into a field name.
pub fn normalize_field_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Parses `field` as a finite float.
pub fn field_f64(record: &Record, field: &str) -> Option<f64> {
    record
        .get(field)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Parses `field` as an integer.
pub fn field_i64(record: &Record, field: &str) -> Option<i64> {
    record
        .get(field)
        .and_then(|value| value.trim().parse::<i64>().ok())
}

/// Parses a trip timestamp, returning the value and the layout it matched.
pub fn parse_datetime(value: &str) -> Option<(NaiveDateTime, &'static str)> {
    let value = value.trim();
    DATETIME_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|parsed| (parsed, *format))
    })
}

/// Parses `field` as a trip timestamp.
pub fn field_datetime(record: &Record, field: &str) -> Option<NaiveDateTime> {
    record
        .get(field)
        .and_then(|value| parse_datetime(value))
        .map(|(parsed, _)| parsed)
}

/// Rounds to two decimal places, the precision of monetary and distance fields.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds a plausible trip row. Used for fixtures and the catalog bench.
pub fn synthetic_trip(rng: &mut fastrand::Rng, index: usize) -> Record {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let pickup = base + Duration::seconds(index as i64 * 37 + rng.i64(0..30));
    let dropoff = pickup + Duration::minutes(rng.i64(3..45));
    let distance = round2(rng.f64() * 12.0 + 0.3);
    let fare = round2(3.0 + distance * 2.5);
    let tip = if rng.bool() { round2(rng.f64() * 6.0) } else { 0.0 };
    let total = round2(fare + tip + 3.5);

    let mut record = Record::new();
    let mut put = |field: &str, value: String| {
        record.insert(field.to_string(), value);
    };
    put(fields::VENDOR_ID, rng.u8(1..=2).to_string());
    put(
        fields::PICKUP_DATETIME,
        pickup.format(DATETIME_FORMATS[0]).to_string(),
    );
    put(
        fields::DROPOFF_DATETIME,
        dropoff.format(DATETIME_FORMATS[0]).to_string(),
    );
    put(fields::PASSENGER_COUNT, rng.u8(1..=4).to_string());
    put(fields::TRIP_DISTANCE, format!("{distance:.2}"));
    put(fields::RATECODE_ID, "1".to_string());
    put(fields::PU_LOCATION_ID, rng.u16(1..=40).to_string());
    put(fields::DO_LOCATION_ID, rng.u16(1..=40).to_string());
    put(fields::PAYMENT_TYPE, rng.u8(1..=4).to_string());
    put(fields::FARE_AMOUNT, format!("{fare:.2}"));
    put(fields::TIP_AMOUNT, format!("{tip:.2}"));
    put(fields::TOTAL_AMOUNT, format!("{total:.2}"));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_and_iso_layouts() {
        let (us, format) = parse_datetime("01/02/2023 01:15:00 PM").expect("us layout");
        assert_eq!(format, DATETIME_FORMATS[0]);
        assert_eq!(us.to_string(), "2023-01-02 13:15:00");

        let (iso, format) = parse_datetime("2023-01-02 13:15:00").expect("iso layout");
        assert_eq!(format, DATETIME_FORMATS[1]);
        assert_eq!(iso, us);

        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn numeric_helpers_reject_garbage() {
        let mut record = Record::new();
        record.insert(fields::TRIP_DISTANCE.into(), " 2.50 ".into());
        record.insert(fields::TIP_AMOUNT.into(), "n/a".into());
        record.insert(fields::TOTAL_AMOUNT.into(), "NaN".into());

        assert_eq!(field_f64(&record, fields::TRIP_DISTANCE), Some(2.5));
        assert_eq!(field_f64(&record, fields::TIP_AMOUNT), None);
        assert_eq!(field_f64(&record, fields::TOTAL_AMOUNT), None);
        assert_eq!(field_f64(&record, fields::FARE_AMOUNT), None);
    }

    #[test]
    fn synthetic_trips_are_reproducible() {
        let mut a = fastrand::Rng::with_seed(9);
        let mut b = fastrand::Rng::with_seed(9);
        for i in 0..16 {
            assert_eq!(synthetic_trip(&mut a, i), synthetic_trip(&mut b, i));
        }
        let trip = synthetic_trip(&mut a, 0);
        assert!(field_datetime(&trip, fields::PICKUP_DATETIME).is_some());
        assert!(field_i64(&trip, fields::PU_LOCATION_ID).is_some());
    }
}
