//! Derived analytics
//!
//! Stateless projections of the hourly buckets used by display code:
//! - a 12-point sparkline (pairs of hours summed)
//! - a trend comparing the two halves of the elapsed day
//! - 7 normalized two-hour activity bars ending at the current window

use crate::types::{
    ActivityBar, DailyStepRecord, DerivedSnapshot, ACTIVITY_BAR_COUNT, HOURS_PER_DAY,
    SPARKLINE_POINTS,
};

/// Round half up, matching the display layer's rounding of .5 values
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Sum of the two hours making up window `index` (0 = hours 0-1)
fn window_sum(buckets: &[u32; HOURS_PER_DAY], index: usize) -> u32 {
    buckets[index * 2] + buckets[index * 2 + 1]
}

/// Downsample 24 hourly buckets into 12 points by summing adjacent pairs
pub fn sparkline(buckets: &[u32; HOURS_PER_DAY]) -> [u32; SPARKLINE_POINTS] {
    std::array::from_fn(|i| window_sum(buckets, i))
}

/// Percent change from the first to the second half of the elapsed hours.
///
/// Zero when fewer than two hours have elapsed or nothing was recorded; 100
/// when the first half is empty and the second is not.
pub fn trend_percent(buckets: &[u32; HOURS_PER_DAY], total_steps: u32, current_hour: usize) -> i32 {
    if current_hour <= 1 || total_steps == 0 {
        return 0;
    }
    let elapsed = current_hour.min(HOURS_PER_DAY);
    let midpoint = elapsed / 2;
    let first_half: u64 = buckets[..midpoint].iter().map(|&b| u64::from(b)).sum();
    let second_half: u64 = buckets[midpoint..elapsed].iter().map(|&b| u64::from(b)).sum();

    if first_half > 0 {
        let change = (second_half as f64 - first_half as f64) / first_half as f64;
        round_half_up(change * 100.0) as i32
    } else if second_half > 0 {
        100
    } else {
        0
    }
}

/// The 7 most recent two-hour windows up to and including the one holding
/// `current_hour`, left-padded with empty windows early in the day.
fn recent_windows(buckets: &[u32; HOURS_PER_DAY], current_hour: usize) -> [u32; ACTIVITY_BAR_COUNT] {
    let window_end = ((current_hour + 2) / 2).min(SPARKLINE_POINTS);
    let window_start = window_end.saturating_sub(ACTIVITY_BAR_COUNT);
    let count = window_end - window_start;

    let mut windows = [0; ACTIVITY_BAR_COUNT];
    for (slot, index) in (window_start..window_end).enumerate() {
        windows[ACTIVITY_BAR_COUNT - count + slot] = window_sum(buckets, index);
    }
    windows
}

/// Normalized activity bars for the recent windows.
///
/// Levels are scaled against the largest selected window (at least 1); a bar
/// is active when its raw value exceeds the median of the selected windows.
pub fn activity_bars(
    buckets: &[u32; HOURS_PER_DAY],
    current_hour: usize,
) -> [ActivityBar; ACTIVITY_BAR_COUNT] {
    let windows = recent_windows(buckets, current_hour);

    let max = windows.iter().copied().max().unwrap_or(0).max(1);
    let mut sorted = windows;
    sorted.sort_unstable();
    let median = sorted[ACTIVITY_BAR_COUNT / 2];

    windows.map(|value| ActivityBar {
        level: round_half_up(f64::from(value) / f64::from(max) * 100.0) as u8,
        active: value > median,
    })
}

impl DerivedSnapshot {
    /// Compute every projection for `record` as seen at `current_hour`
    pub fn compute(record: &DailyStepRecord, current_hour: usize) -> Self {
        let buckets = record.hourly_buckets();
        Self {
            sparkline: sparkline(buckets),
            trend_percent: trend_percent(buckets, record.total_steps(), current_hour),
            activity_bars: activity_bars(buckets, current_hour),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buckets(pairs: &[(usize, u32)]) -> [u32; HOURS_PER_DAY] {
        let mut buckets = [0; HOURS_PER_DAY];
        for &(hour, steps) in pairs {
            buckets[hour] = steps;
        }
        buckets
    }

    fn bar(level: u8, active: bool) -> ActivityBar {
        ActivityBar { level, active }
    }

    #[test]
    fn test_sparkline_sums_pairs() {
        let b = buckets(&[(0, 2), (1, 3), (6, 10), (23, 4)]);
        assert_eq!(sparkline(&b), [5, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 4]);
    }

    #[test]
    fn test_sparkline_empty_day() {
        assert_eq!(sparkline(&[0; HOURS_PER_DAY]), [0; SPARKLINE_POINTS]);
    }

    #[test]
    fn test_trend_insufficient_data() {
        let b = buckets(&[(0, 100)]);
        assert_eq!(trend_percent(&b, 100, 0), 0);
        assert_eq!(trend_percent(&b, 100, 1), 0);
        assert_eq!(trend_percent(&[0; HOURS_PER_DAY], 0, 15), 0);
    }

    #[test]
    fn test_trend_positive_and_negative() {
        // Hour 4: first half = hours 0-1, second half = hours 2-3
        let up = buckets(&[(0, 4), (3, 6)]);
        assert_eq!(trend_percent(&up, 10, 4), 50);

        let down = buckets(&[(1, 8), (2, 2)]);
        assert_eq!(trend_percent(&down, 10, 4), -75);
    }

    #[test]
    fn test_trend_from_nothing() {
        let b = buckets(&[(5, 12)]);
        assert_eq!(trend_percent(&b, 12, 8), 100);
    }

    #[test]
    fn test_trend_ignores_current_hour() {
        // Steps in the current (incomplete) hour are not part of either half
        let b = buckets(&[(0, 10), (1, 10), (2, 500)]);
        assert_eq!(trend_percent(&b, 520, 2), 0);
    }

    #[test]
    fn test_trend_odd_hour_split() {
        // Hour 3: midpoint 1, first half = hour 0, second half = hours 1-2
        let b = buckets(&[(0, 3), (1, 1), (2, 1)]);
        assert_eq!(trend_percent(&b, 5, 3), -33);
    }

    #[test]
    fn test_trend_rounds_half_up() {
        // (3 - 2) / 2 = 50%; (1 - 8) / 8 = -87.5% rounds to -87
        let up = buckets(&[(0, 2), (1, 3)]);
        assert_eq!(trend_percent(&up, 5, 2), 50);
        let down = buckets(&[(0, 8), (1, 1)]);
        assert_eq!(trend_percent(&down, 9, 2), -87);
    }

    #[test]
    fn test_bars_always_seven() {
        for hour in 0..HOURS_PER_DAY {
            assert_eq!(activity_bars(&[0; HOURS_PER_DAY], hour).len(), ACTIVITY_BAR_COUNT);
        }
    }

    #[test]
    fn test_bars_early_morning_padding() {
        // Hour 0: only window 0 has elapsed, padded with six empty windows
        let b = buckets(&[(0, 3), (1, 5)]);
        let bars = activity_bars(&b, 0);
        assert_eq!(
            bars,
            [
                bar(0, false),
                bar(0, false),
                bar(0, false),
                bar(0, false),
                bar(0, false),
                bar(0, false),
                bar(100, true),
            ]
        );
    }

    #[test]
    fn test_bars_late_day_window() {
        // Hour 23: windows 5..12 (hours 10-23), raw [10, 20, 40, 30, 5, 5, 1], median 10
        let b = buckets(&[(0, 99), (10, 10), (12, 20), (14, 40), (16, 30), (18, 5), (21, 5), (22, 1)]);
        let bars = activity_bars(&b, 23);
        assert_eq!(
            bars,
            [
                bar(25, false),
                bar(50, true),
                bar(100, true),
                bar(75, true),
                bar(13, false),
                bar(13, false),
                bar(3, false),
            ]
        );
    }

    #[test]
    fn test_bars_all_zero() {
        let bars = activity_bars(&[0; HOURS_PER_DAY], 13);
        assert!(bars.iter().all(|b| b.level == 0 && !b.active));
    }

    #[test]
    fn test_snapshot_compute() {
        let record = DailyStepRecord::from_buckets("2024-01-15", buckets(&[(8, 50), (9, 50)]));
        let snapshot = DerivedSnapshot::compute(&record, 11);
        assert_eq!(snapshot.sparkline[4], 100);
        assert_eq!(snapshot.trend_percent, 100);
        assert_eq!(snapshot.activity_bars[6], bar(0, false));
        assert_eq!(snapshot.activity_bars[5], bar(100, true));
    }
}
