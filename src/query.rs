//! Query catalog over an in-memory snapshot of trip records.
//!
//! Every query is a scan function returning a cardinality. "Normal" queries
//! are cheap and selective; "heavy" queries model window-function and
//! complex-aggregation cost by running the corresponding pass over the whole
//! snapshot and returning the row count (2 for the whole-dataset quantiles).

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hint::black_box,
};

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::Serialize;

use crate::{
    observability::{log_info, log_warn},
    perturb::uniform,
    record::{field_datetime, field_f64, field_i64, fields, Record},
    store::{KvStore, StoreError},
};

/// Cap of [`Query::PointLookup`].
pub const POINT_LOOKUP_LIMIT: usize = 5;
/// Cap of [`Query::DatetimeRange`] and [`Query::MultiColumnFilter`].
pub const FILTER_LIMIT: usize = 10;
/// `k` of [`Query::AggregationTopk`].
pub const TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    Normal,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    SingleColumnGroupby,
    MultiColumnGroupby,
    AggregationTopk,
    FilterRange,
    PointLookup,
    DatetimeRange,
    MultiColumnFilter,
    NonzeroTipGroupby,
    BasicWindow,
    SortedWindow,
    QuantilesEntireDataset,
    PartitionByWindow,
    LeadAndLag,
    MovingAverages,
    RollingSum,
    RangeBetween,
    QuantilesPartitionBy,
    MultiColumnComplexAggregation,
}

pub const NORMAL_QUERIES: [Query; 8] = [
    Query::SingleColumnGroupby,
    Query::MultiColumnGroupby,
    Query::AggregationTopk,
    Query::FilterRange,
    Query::PointLookup,
    Query::DatetimeRange,
    Query::MultiColumnFilter,
    Query::NonzeroTipGroupby,
];

pub const HEAVY_QUERIES: [Query; 10] = [
    Query::BasicWindow,
    Query::SortedWindow,
    Query::QuantilesEntireDataset,
    Query::PartitionByWindow,
    Query::LeadAndLag,
    Query::MovingAverages,
    Query::RollingSum,
    Query::RangeBetween,
    Query::QuantilesPartitionBy,
    Query::MultiColumnComplexAggregation,
];

impl Query {
    pub fn query_type(&self) -> &'static str {
        match self {
            Query::SingleColumnGroupby => "single_column_groupby",
            Query::MultiColumnGroupby => "multi_column_groupby",
            Query::AggregationTopk => "aggregation_topk",
            Query::FilterRange => "filter_range",
            Query::PointLookup => "point_lookup",
            Query::DatetimeRange => "datetime_range",
            Query::MultiColumnFilter => "multi_column_filter",
            Query::NonzeroTipGroupby => "nonzero_tip_groupby",
            Query::BasicWindow => "basic_window",
            Query::SortedWindow => "sorted_window",
            Query::QuantilesEntireDataset => "quantiles_entire_dataset",
            Query::PartitionByWindow => "partition_by_window",
            Query::LeadAndLag => "lead_and_lag",
            Query::MovingAverages => "moving_averages",
            Query::RollingSum => "rolling_sum",
            Query::RangeBetween => "range_between",
            Query::QuantilesPartitionBy => "quantiles_partition_by",
            Query::MultiColumnComplexAggregation => "multi_column_complex_aggregation",
        }
    }

    /// SQL-like rendering of what the scan computes.
    pub fn description(&self) -> &'static str {
        match self {
            Query::SingleColumnGroupby => "SELECT {col}, COUNT(*) FROM trips GROUP BY {col}",
            Query::MultiColumnGroupby => {
                "SELECT payment_type, passenger_count, COUNT(*) FROM trips \
                 GROUP BY payment_type, passenger_count"
            }
            Query::AggregationTopk => {
                "SELECT pulocationid, COUNT(*) FROM trips \
                 GROUP BY pulocationid ORDER BY COUNT(*) DESC LIMIT 10"
            }
            Query::FilterRange => "SELECT * FROM trips WHERE trip_distance > ? AND total_amount > ?",
            Query::PointLookup => "SELECT * FROM trips WHERE pulocationid = ? LIMIT 5",
            Query::DatetimeRange => {
                "SELECT vendorid, trip_distance, total_amount FROM trips \
                 WHERE tpep_pickup_datetime BETWEEN ? AND ? + INTERVAL 1 HOUR LIMIT 10"
            }
            Query::MultiColumnFilter => {
                "SELECT trip_distance, fare_amount, tip_amount FROM trips \
                 WHERE pulocationid = ? AND dolocationid = ? AND passenger_count = ? LIMIT 10"
            }
            Query::NonzeroTipGroupby => {
                "SELECT vendorid, AVG(tip_amount) FROM trips WHERE tip_amount > 0 GROUP BY vendorid"
            }
            Query::BasicWindow => "SELECT *, ROW_NUMBER() OVER () AS row_num FROM trips",
            Query::SortedWindow => {
                "SELECT *, ROW_NUMBER() OVER (ORDER BY trip_distance DESC) AS distance_rank FROM trips"
            }
            Query::QuantilesEntireDataset => {
                "SELECT quantile_cont(total_amount, 0.5) OVER () AS median_amount, \
                 quantile_cont(total_amount, 0.9) OVER () AS p90_amount FROM trips"
            }
            Query::PartitionByWindow => {
                "SELECT *, ROW_NUMBER() OVER (PARTITION BY payment_type ORDER BY trip_distance DESC) \
                 AS rank_within_payment FROM trips"
            }
            Query::LeadAndLag => {
                "SELECT passenger_count, \
                 LEAD(passenger_count) OVER (ORDER BY tpep_pickup_datetime) AS next_passenger, \
                 LAG(passenger_count) OVER (ORDER BY tpep_pickup_datetime) AS prev_passenger FROM trips"
            }
            Query::MovingAverages => {
                "SELECT tpep_pickup_datetime, AVG(total_amount) OVER (ORDER BY tpep_pickup_datetime \
                 ROWS BETWEEN 1 PRECEDING AND 1 FOLLOWING) AS moving_avg_amount FROM trips"
            }
            Query::RollingSum => {
                "SELECT tpep_pickup_datetime, SUM(total_amount) OVER (ORDER BY tpep_pickup_datetime \
                 ROWS BETWEEN 1 PRECEDING AND 1 FOLLOWING) AS rolling_sum_amount FROM trips"
            }
            Query::RangeBetween => {
                "SELECT tpep_pickup_datetime, SUM(total_amount) OVER (ORDER BY tpep_pickup_datetime \
                 RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS cumulative_income FROM trips"
            }
            Query::QuantilesPartitionBy => {
                "SELECT payment_type, quantile_cont(total_amount, 0.5) OVER (PARTITION BY payment_type) \
                 AS median_amount_within_payment FROM trips"
            }
            Query::MultiColumnComplexAggregation => {
                "SELECT passenger_count, payment_type, pulocationid, dolocationid, \
                 EXTRACT(year FROM tpep_pickup_datetime), EXTRACT(month FROM tpep_pickup_datetime), \
                 COUNT(*), SUM(total_amount), AVG(trip_distance), MAX(tip_amount), MIN(fare_amount) \
                 FROM trips GROUP BY 1, 2, 3, 4, 5, 6"
            }
        }
    }

    pub fn class(&self) -> QueryClass {
        if NORMAL_QUERIES.contains(self) {
            QueryClass::Normal
        } else {
            QueryClass::Heavy
        }
    }

    /// Runs the scan and returns its cardinality. Never mutates the snapshot.
    pub fn execute(&self, snapshot: &Snapshot, rng: &mut fastrand::Rng) -> usize {
        let rows = snapshot.rows();
        match self {
            Query::SingleColumnGroupby => single_column_groupby(rows, rng),
            Query::MultiColumnGroupby => multi_column_groupby(rows),
            Query::AggregationTopk => aggregation_topk(rows),
            Query::FilterRange => filter_range(rows, rng),
            Query::PointLookup => point_lookup(rows, rng),
            Query::DatetimeRange => datetime_range(rows, rng),
            Query::MultiColumnFilter => multi_column_filter(rows, rng),
            Query::NonzeroTipGroupby => nonzero_tip_groupby(rows),
            Query::BasicWindow => basic_window(rows),
            Query::SortedWindow => sorted_window(rows),
            Query::QuantilesEntireDataset => quantiles_entire_dataset(rows),
            Query::PartitionByWindow => partition_by_window(rows),
            Query::LeadAndLag => lead_and_lag(rows),
            Query::MovingAverages => moving_window(rows, Aggregate::Avg),
            Query::RollingSum => moving_window(rows, Aggregate::Sum),
            Query::RangeBetween => range_between(rows),
            Query::QuantilesPartitionBy => quantiles_partition_by(rows),
            Query::MultiColumnComplexAggregation => multi_column_complex_aggregation(rows),
        }
    }
}

/// The two catalogs, in registration order.
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    normal: Vec<Query>,
    heavy: Vec<Query>,
}

impl QueryCatalog {
    pub fn standard() -> Self {
        QueryCatalog {
            normal: NORMAL_QUERIES.to_vec(),
            heavy: HEAVY_QUERIES.to_vec(),
        }
    }

    pub fn normal(&self) -> &[Query] {
        &self.normal
    }

    pub fn heavy(&self) -> &[Query] {
        &self.heavy
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// All records of a store at the moment a benchmark starts.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    rows: Vec<Record>,
    skipped: usize,
}

impl Snapshot {
    pub fn from_records(rows: Vec<Record>) -> Self {
        Snapshot { rows, skipped: 0 }
    }

    /// Scans `store` and decodes every value. Undecodable values are skipped.
    pub fn load<S: KvStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let mut snapshot = Snapshot::default();
        for item in store.scan() {
            let (key, value) = item?;
            match serde_json::from_slice::<Record>(&value) {
                Ok(record) => snapshot.rows.push(record),
                Err(err) => {
                    snapshot.skipped += 1;
                    log_warn!(
                        component = "query",
                        event = "snapshot_row_skipped",
                        key = %key,
                        error = %err,
                    );
                }
            }
        }
        log_info!(
            component = "query",
            event = "snapshot_loaded",
            store = store.store_type_name(),
            rows = snapshot.rows.len(),
            skipped = snapshot.skipped,
        );
        Ok(snapshot)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn text<'r>(record: &'r Record, field: &str) -> Option<&'r str> {
    record
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn pick<T: Copy>(values: &BTreeSet<T>, rng: &mut fastrand::Rng) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.iter().nth(rng.usize(..values.len())).copied()
}

fn single_column_groupby(rows: &[Record], rng: &mut fastrand::Rng) -> usize {
    let field = if rng.bool() {
        fields::PAYMENT_TYPE
    } else {
        fields::PASSENGER_COUNT
    };
    rows.iter()
        .filter_map(|row| text(row, field))
        .collect::<HashSet<_>>()
        .len()
}

fn multi_column_groupby(rows: &[Record]) -> usize {
    rows.iter()
        .filter_map(|row| {
            Some((
                text(row, fields::PAYMENT_TYPE)?,
                text(row, fields::PASSENGER_COUNT)?,
            ))
        })
        .collect::<HashSet<_>>()
        .len()
}

fn aggregation_topk(rows: &[Record]) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for location in rows.iter().filter_map(|row| text(row, fields::PU_LOCATION_ID)) {
        *counts.entry(location).or_default() += 1;
    }
    let mut counts: Vec<usize> = counts.into_values().collect();
    let k = TOP_K.min(counts.len());
    if k > 0 && k < counts.len() {
        counts.select_nth_unstable_by(k - 1, |a, b| b.cmp(a));
    }
    black_box(&counts[..k]);
    k
}

/// Value at index `floor(q * (n - 1))` of `values` in ascending order.
fn percentile(values: &mut [f64], q: f64) -> f64 {
    let index = (q * (values.len() - 1) as f64).floor() as usize;
    *values.select_nth_unstable_by(index, f64::total_cmp).1
}

/// Percentile bounds `([p30, p90] distance, [p30, p90] total)` over rows
/// where both fields parse.
pub fn filter_bounds(rows: &[Record]) -> Option<((f64, f64), (f64, f64))> {
    let (mut distances, mut totals): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| {
            Some((
                field_f64(row, fields::TRIP_DISTANCE)?,
                field_f64(row, fields::TOTAL_AMOUNT)?,
            ))
        })
        .unzip();
    if distances.is_empty() {
        return None;
    }
    Some((
        (percentile(&mut distances, 0.3), percentile(&mut distances, 0.9)),
        (percentile(&mut totals, 0.3), percentile(&mut totals, 0.9)),
    ))
}

/// Draws the `(distance, total)` thresholds of one range filter.
pub fn filter_thresholds(rows: &[Record], rng: &mut fastrand::Rng) -> Option<(f64, f64)> {
    let ((d30, d90), (t30, t90)) = filter_bounds(rows)?;
    Some((uniform(rng, &(d30..=d90)), uniform(rng, &(t30..=t90))))
}

fn filter_range(rows: &[Record], rng: &mut fastrand::Rng) -> usize {
    let Some((distance_min, total_min)) = filter_thresholds(rows, rng) else {
        return 0;
    };
    rows.iter()
        .filter(|row| {
            matches!(
                (
                    field_f64(row, fields::TRIP_DISTANCE),
                    field_f64(row, fields::TOTAL_AMOUNT),
                ),
                (Some(distance), Some(total)) if distance > distance_min && total > total_min
            )
        })
        .count()
}

fn point_lookup(rows: &[Record], rng: &mut fastrand::Rng) -> usize {
    let locations: BTreeSet<i64> = rows
        .iter()
        .filter_map(|row| field_i64(row, fields::PU_LOCATION_ID))
        .collect();
    let Some(location) = pick(&locations, rng) else {
        return 0;
    };
    rows.iter()
        .filter(|row| field_i64(row, fields::PU_LOCATION_ID) == Some(location))
        .take(POINT_LOOKUP_LIMIT)
        .count()
}

fn datetime_range(rows: &[Record], rng: &mut fastrand::Rng) -> usize {
    let pickups: Vec<NaiveDateTime> = rows
        .iter()
        .filter_map(|row| field_datetime(row, fields::PICKUP_DATETIME))
        .collect();
    if pickups.is_empty() {
        return 0;
    }
    let start = pickups[rng.usize(..pickups.len())];
    let end = start + Duration::hours(1);
    pickups
        .iter()
        .filter(|pickup| (start..=end).contains(*pickup))
        .take(FILTER_LIMIT)
        .count()
}

fn observed<'r>(rows: &'r [Record], field: &str) -> BTreeSet<&'r str> {
    rows.iter().filter_map(|row| text(row, field)).collect()
}

fn multi_column_filter(rows: &[Record], rng: &mut fastrand::Rng) -> usize {
    let pu = pick(&observed(rows, fields::PU_LOCATION_ID), rng);
    let dropoff = pick(&observed(rows, fields::DO_LOCATION_ID), rng);
    let passengers = pick(&observed(rows, fields::PASSENGER_COUNT), rng);
    let (Some(pu), Some(dropoff), Some(passengers)) = (pu, dropoff, passengers) else {
        return 0;
    };
    rows.iter()
        .filter(|row| {
            text(row, fields::PU_LOCATION_ID) == Some(pu)
                && text(row, fields::DO_LOCATION_ID) == Some(dropoff)
                && text(row, fields::PASSENGER_COUNT) == Some(passengers)
        })
        .take(FILTER_LIMIT)
        .count()
}

fn nonzero_tip_groupby(rows: &[Record]) -> usize {
    rows.iter()
        .filter(|row| field_f64(row, fields::TIP_AMOUNT).is_some_and(|tip| tip > 0.0))
        .filter_map(|row| text(row, fields::VENDOR_ID))
        .collect::<HashSet<_>>()
        .len()
}

fn basic_window(rows: &[Record]) -> usize {
    for (row_num, row) in rows.iter().enumerate() {
        black_box((row_num + 1, row));
    }
    rows.len()
}

/// Descending, with unparseable values last.
fn desc_nulls_last(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sorted_window(rows: &[Record]) -> usize {
    let mut distances: Vec<(Option<f64>, usize)> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (field_f64(row, fields::TRIP_DISTANCE), i))
        .collect();
    distances.sort_by(|a, b| desc_nulls_last(&a.0, &b.0));
    let mut ranks = vec![0usize; rows.len()];
    for (rank, (_, i)) in distances.iter().enumerate() {
        ranks[*i] = rank + 1;
    }
    black_box(&ranks);
    rows.len()
}

/// Continuous quantile with linear interpolation between neighbours.
fn quantile_cont(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let position = q * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let (_, low, above) = values.select_nth_unstable_by(lower, f64::total_cmp);
    let low = *low;
    let high = if position > lower as f64 {
        above.iter().copied().fold(f64::INFINITY, f64::min)
    } else {
        low
    };
    Some(low + (high - low) * (position - lower as f64))
}

fn totals(rows: &[Record]) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| field_f64(row, fields::TOTAL_AMOUNT))
        .collect()
}

fn quantiles_entire_dataset(rows: &[Record]) -> usize {
    let mut amounts = totals(rows);
    black_box((
        quantile_cont(&mut amounts, 0.5),
        quantile_cont(&mut amounts, 0.9),
    ));
    2
}

fn partition_by_window(rows: &[Record]) -> usize {
    let mut partitions: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        partitions
            .entry(text(row, fields::PAYMENT_TYPE).unwrap_or(""))
            .or_default()
            .push(field_f64(row, fields::TRIP_DISTANCE));
    }
    for distances in partitions.values_mut() {
        distances.sort_by(desc_nulls_last);
        for (rank, distance) in distances.iter().enumerate() {
            black_box((rank + 1, distance));
        }
    }
    rows.len()
}

/// Row indices ordered by pickup time; unparseable times sort first.
fn pickup_order(rows: &[Record]) -> Vec<usize> {
    let keys: Vec<Option<NaiveDateTime>> = rows
        .iter()
        .map(|row| field_datetime(row, fields::PICKUP_DATETIME))
        .collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    order
}

fn lead_and_lag(rows: &[Record]) -> usize {
    let order = pickup_order(rows);
    let passengers: Vec<Option<&str>> = order
        .iter()
        .map(|&i| text(&rows[i], fields::PASSENGER_COUNT))
        .collect();
    for (i, current) in passengers.iter().enumerate() {
        let next = passengers.get(i + 1).copied().flatten();
        let prev = i
            .checked_sub(1)
            .and_then(|p| passengers.get(p).copied().flatten());
        black_box((current, next, prev));
    }
    rows.len()
}

#[derive(Clone, Copy)]
enum Aggregate {
    Avg,
    Sum,
}

/// `ROWS BETWEEN 1 PRECEDING AND 1 FOLLOWING` over pickup order.
fn moving_window(rows: &[Record], aggregate: Aggregate) -> usize {
    let amounts: Vec<Option<f64>> = pickup_order(rows)
        .into_iter()
        .map(|i| field_f64(&rows[i], fields::TOTAL_AMOUNT))
        .collect();
    for i in 0..amounts.len() {
        let frame = &amounts[i.saturating_sub(1)..(i + 2).min(amounts.len())];
        let (sum, count) = frame
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        let value = match aggregate {
            Aggregate::Sum => (count > 0).then_some(sum),
            Aggregate::Avg => (count > 0).then(|| sum / count as f64),
        };
        black_box(value);
    }
    rows.len()
}

/// Running total where rows with equal pickup time share one frame end.
fn range_between(rows: &[Record]) -> usize {
    let mut keyed: Vec<(Option<NaiveDateTime>, f64)> = rows
        .iter()
        .map(|row| {
            (
                field_datetime(row, fields::PICKUP_DATETIME),
                field_f64(row, fields::TOTAL_AMOUNT).unwrap_or(0.0),
            )
        })
        .collect();
    keyed.sort_by_key(|(pickup, _)| *pickup);

    let mut running = 0.0;
    let mut start = 0;
    while start < keyed.len() {
        let peers = keyed[start..]
            .iter()
            .take_while(|(pickup, _)| *pickup == keyed[start].0)
            .count();
        running += keyed[start..start + peers]
            .iter()
            .map(|(_, amount)| amount)
            .sum::<f64>();
        for _ in 0..peers {
            black_box(running);
        }
        start += peers;
    }
    rows.len()
}

fn quantiles_partition_by(rows: &[Record]) -> usize {
    let mut partitions: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(amount) = field_f64(row, fields::TOTAL_AMOUNT) {
            partitions
                .entry(text(row, fields::PAYMENT_TYPE).unwrap_or(""))
                .or_default()
                .push(amount);
        }
    }
    for amounts in partitions.values_mut() {
        black_box(quantile_cont(amounts, 0.5));
    }
    rows.len()
}

#[derive(Default)]
struct GroupAggregate {
    trips: usize,
    revenue: f64,
    distance_sum: f64,
    distance_count: usize,
    max_tip: Option<f64>,
    min_fare: Option<f64>,
}

fn multi_column_complex_aggregation(rows: &[Record]) -> usize {
    type GroupKey<'r> = (
        Option<&'r str>,
        Option<&'r str>,
        Option<&'r str>,
        Option<&'r str>,
        Option<(i32, u32)>,
    );
    let mut groups: HashMap<GroupKey<'_>, GroupAggregate> = HashMap::new();
    for row in rows {
        let key = (
            text(row, fields::PASSENGER_COUNT),
            text(row, fields::PAYMENT_TYPE),
            text(row, fields::PU_LOCATION_ID),
            text(row, fields::DO_LOCATION_ID),
            field_datetime(row, fields::PICKUP_DATETIME).map(|t| (t.year(), t.month())),
        );
        let group = groups.entry(key).or_default();
        group.trips += 1;
        group.revenue += field_f64(row, fields::TOTAL_AMOUNT).unwrap_or(0.0);
        if let Some(distance) = field_f64(row, fields::TRIP_DISTANCE) {
            group.distance_sum += distance;
            group.distance_count += 1;
        }
        if let Some(tip) = field_f64(row, fields::TIP_AMOUNT) {
            group.max_tip = Some(group.max_tip.map_or(tip, |max| max.max(tip)));
        }
        if let Some(fare) = field_f64(row, fields::FARE_AMOUNT) {
            group.min_fare = Some(group.min_fare.map_or(fare, |min| min.min(fare)));
        }
    }
    for group in groups.values() {
        let avg_distance =
            (group.distance_count > 0).then(|| group.distance_sum / group.distance_count as f64);
        black_box((
            group.trips,
            group.revenue,
            avg_distance,
            group.max_tip,
            group.min_fare,
        ));
    }
    rows.len()
}
