//! Rule-based randomization of sampled trip records.
//!
//! Each rule touches one field and only when that field is present and parses
//! as its expected type; anything else is passed through untouched. All draws
//! come from the caller's generator, so a fixed seed replays the same sequence.

use std::ops::RangeInclusive;

use chrono::Duration;

use crate::record::{fields, parse_datetime, round2, Record};

/// Multiplicative jitter applied to the trip distance.
pub const DISTANCE_FACTOR: RangeInclusive<f64> = 0.8..=1.2;
/// Additive offset applied to the total amount.
pub const TOTAL_OFFSET: RangeInclusive<f64> = -5.0..=5.0;
/// Replacement range for the passenger count.
pub const PASSENGER_COUNT: RangeInclusive<u32> = 1..=4;
/// Replacement range for the tip amount.
pub const TIP_AMOUNT: RangeInclusive<f64> = 0.0..=5.0;
/// Minutes added to the pickup timestamp.
pub const PICKUP_SHIFT_MINUTES: RangeInclusive<i64> = 1..=30;
/// Minutes added to the dropoff timestamp.
pub const DROPOFF_SHIFT_MINUTES: RangeInclusive<i64> = 5..=20;

/// Returns a perturbed copy of `record`.
pub fn perturb(record: &Record, rng: &mut fastrand::Rng) -> Record {
    let mut out = record.clone();
    perturb_in_place(&mut out, rng);
    out
}

/// Applies every rule to `record` in a fixed field order.
pub fn perturb_in_place(record: &mut Record, rng: &mut fastrand::Rng) {
    update_f64(record, fields::TRIP_DISTANCE, |distance| {
        round2(distance * uniform(rng, &DISTANCE_FACTOR))
    });
    update_f64(record, fields::TOTAL_AMOUNT, |total| {
        round2(total + uniform(rng, &TOTAL_OFFSET))
    });
    if let Some(value) = record.get_mut(fields::PASSENGER_COUNT) {
        if value.trim().parse::<i64>().is_ok() {
            *value = rng.u32(PASSENGER_COUNT).to_string();
        }
    }
    update_f64(record, fields::TIP_AMOUNT, |_| {
        round2(uniform(rng, &TIP_AMOUNT))
    });
    shift_datetime(record, fields::PICKUP_DATETIME, rng, PICKUP_SHIFT_MINUTES);
    shift_datetime(record, fields::DROPOFF_DATETIME, rng, DROPOFF_SHIFT_MINUTES);
}

/// Uniform draw from a closed float interval.
pub(crate) fn uniform(rng: &mut fastrand::Rng, range: &RangeInclusive<f64>) -> f64 {
    let (low, high) = (*range.start(), *range.end());
    (low + (high - low) * rng.f64()).min(high)
}

fn update_f64(record: &mut Record, field: &str, f: impl FnOnce(f64) -> f64) {
    let Some(value) = record.get_mut(field) else {
        return;
    };
    let Some(parsed) = value.trim().parse::<f64>().ok().filter(|v| v.is_finite()) else {
        return;
    };
    *value = format!("{:.2}", f(parsed));
}

fn shift_datetime(
    record: &mut Record,
    field: &str,
    rng: &mut fastrand::Rng,
    minutes: RangeInclusive<i64>,
) {
    let Some(value) = record.get_mut(field) else {
        return;
    };
    let Some((parsed, format)) = parse_datetime(value) else {
        return;
    };
    let shifted = parsed + Duration::minutes(rng.i64(minutes));
    *value = shifted.format(format).to_string();
}
