//! Batch size and inter-batch delay of the streaming modes.

use std::{fmt, ops::RangeInclusive, time::Duration};

use clap::ValueEnum;

/// Batch sizes drawn by [`StreamMode::Random`].
pub const RANDOM_BATCH_ROWS: RangeInclusive<usize> = 1..=100;
/// Batch size of [`StreamMode::FixedRows`].
pub const FIXED_BATCH_ROWS: usize = 10;
/// Delay of the fixed and scheduled modes.
pub const FIXED_DELAY: Duration = Duration::from_secs(1);
/// Period, in minutes, of the scheduled pattern.
pub const PATTERN_PERIOD_MINUTES: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamMode {
    /// Uniform batch size and uniform delay.
    #[value(name = "random")]
    Random,
    #[value(name = "fixed_rows")]
    FixedRows,
    /// Batch size follows the elapsed minute of the run.
    #[value(name = "scheduled_pattern")]
    ScheduledPattern,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Random => "random",
            StreamMode::FixedRows => "fixed_rows",
            StreamMode::ScheduledPattern => "scheduled_pattern",
        }
    }

    /// Plans the next iteration. Only the random mode draws from `rng`.
    pub fn plan(
        &self,
        elapsed: Duration,
        delay_range: RangeInclusive<Duration>,
        rng: &mut fastrand::Rng,
    ) -> BatchPlan {
        match self {
            StreamMode::Random => {
                let rows = rng.usize(RANDOM_BATCH_ROWS);
                let low = delay_range.start().as_secs_f64();
                let high = delay_range.end().as_secs_f64();
                let delay = Duration::from_secs_f64(low + (high - low) * rng.f64());
                BatchPlan { rows, delay }
            }
            StreamMode::FixedRows => BatchPlan {
                rows: FIXED_BATCH_ROWS,
                delay: FIXED_DELAY,
            },
            StreamMode::ScheduledPattern => BatchPlan {
                rows: scheduled_rows(elapsed),
                delay: FIXED_DELAY,
            },
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub rows: usize,
    pub delay: Duration,
}

impl BatchPlan {
    /// Caps the batch at what is left of a row budget.
    pub fn clamp_rows(self, remaining: Option<u64>) -> Self {
        match remaining {
            Some(remaining) => BatchPlan {
                rows: self.rows.min(usize::try_from(remaining).unwrap_or(usize::MAX)),
                ..self
            },
            None => self,
        }
    }
}

/// `(whole minutes elapsed mod 12) + 1`.
pub fn scheduled_rows(elapsed: Duration) -> usize {
    ((elapsed.as_secs() / 60) % PATTERN_PERIOD_MINUTES) as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAYS: RangeInclusive<Duration> = Duration::from_millis(100)..=Duration::from_secs(1);

    #[test]
    fn random_plans_stay_in_range() {
        let mut rng = fastrand::Rng::with_seed(22);
        for _ in 0..500 {
            let plan = StreamMode::Random.plan(Duration::ZERO, DELAYS, &mut rng);
            assert!(RANDOM_BATCH_ROWS.contains(&plan.rows));
            assert!(DELAYS.contains(&plan.delay), "{:?}", plan.delay);
        }
    }

    #[test]
    fn scheduled_pattern_cycles_every_twelve_minutes() {
        let minute = |m: u64| Duration::from_secs(m * 60);
        assert_eq!(scheduled_rows(Duration::ZERO), 1);
        assert_eq!(scheduled_rows(minute(1) - Duration::from_millis(1)), 1);
        assert_eq!(scheduled_rows(minute(1)), 2);
        assert_eq!(scheduled_rows(minute(11)), 12);
        assert_eq!(scheduled_rows(minute(12)), 1);
        assert_eq!(scheduled_rows(minute(25)), 2);

        let mut rng = fastrand::Rng::with_seed(1);
        let plan = StreamMode::ScheduledPattern.plan(minute(5), DELAYS, &mut rng);
        assert_eq!(plan, BatchPlan { rows: 6, delay: FIXED_DELAY });
    }

    #[test]
    fn fixed_rows_ignores_the_generator() {
        let mut a = fastrand::Rng::with_seed(4);
        let mut b = fastrand::Rng::with_seed(4);
        let plan = StreamMode::FixedRows.plan(Duration::from_secs(3600), DELAYS, &mut a);
        assert_eq!(plan.rows, FIXED_BATCH_ROWS);
        assert_eq!(a.u64(..), b.u64(..));
    }

    #[test]
    fn clamp_respects_remaining_budget() {
        let plan = BatchPlan { rows: 80, delay: FIXED_DELAY };
        assert_eq!(plan.clamp_rows(Some(7)).rows, 7);
        assert_eq!(plan.clamp_rows(Some(500)).rows, 80);
        assert_eq!(plan.clamp_rows(None).rows, 80);
    }
}
