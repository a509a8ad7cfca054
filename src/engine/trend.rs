//! Windowed trend summaries over a single metric series.
//!
//! Direction compares the mean of the first half of the windowed series
//! against the mean of the second half. The split index is `len / 2`, so for
//! odd lengths the extra point lands in the second half.

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub metric: String,
    pub points: Vec<TrendPoint>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub latest: Option<f64>,
    pub direction: TrendDirection,
}

impl TrendSummary {
    pub fn empty(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            points: Vec::new(),
            mean: None,
            min: None,
            max: None,
            latest: None,
            direction: TrendDirection::Stable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAnalyzer {
    tolerance: f64,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_RELATIVE_TOLERANCE)
    }
}

impl TrendAnalyzer {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Summarize the points within `window_days` of the latest timestamp.
    pub fn analyze(
        &self,
        metric: &str,
        series: &[(OffsetDateTime, f64)],
        window_days: u32,
    ) -> TrendSummary {
        let mut points: Vec<TrendPoint> = series
            .iter()
            .filter(|(_, value)| value.is_finite())
            .map(|&(timestamp, value)| TrendPoint { timestamp, value })
            .collect();
        let dropped = series.len() - points.len();
        if dropped > 0 {
            debug!(metric, dropped, "Ignoring non-finite trend values");
        }
        points.sort_by_key(|point| point.timestamp);

        let Some(latest) = points.last().map(|point| point.timestamp) else {
            return TrendSummary::empty(metric);
        };
        if let Some(cutoff) = window_start(latest, window_days) {
            points.retain(|point| point.timestamp >= cutoff);
        }

        let values: Vec<f64> = points.iter().map(|point| point.value).collect();
        let direction = self.direction(&values);

        TrendSummary {
            metric: metric.to_string(),
            mean: mean(&values),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            latest: values.last().copied(),
            points,
            direction,
        }
    }

    fn direction(&self, values: &[f64]) -> TrendDirection {
        let mid = values.len() / 2;
        let (Some(first), Some(second)) = (mean(&values[..mid]), mean(&values[mid..])) else {
            return TrendDirection::Stable;
        };
        let margin = self.tolerance * first.abs();
        if second - first > margin {
            TrendDirection::Increasing
        } else if first - second > margin {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

/// Earliest timestamp inside a `days` window ending at `latest`, or `None` when
/// the window reaches past the representable range and so covers everything.
pub fn window_start(latest: OffsetDateTime, days: u32) -> Option<OffsetDateTime> {
    latest.checked_sub(Duration::days(i64::from(days)))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2026-03-01 00:00 UTC);

    fn daily(values: &[f64]) -> Vec<(OffsetDateTime, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(day, value)| (START + Duration::days(day as i64), *value))
            .collect()
    }

    #[test]
    fn empty_series_is_stable_without_mean() {
        let summary = TrendAnalyzer::default().analyze("heart_rate", &[], 7);

        assert_eq!(summary.direction, TrendDirection::Stable);
        assert_eq!(summary.mean, None);
        assert!(summary.points.is_empty());
    }

    #[test]
    fn single_point_is_stable() {
        let summary = TrendAnalyzer::default().analyze("heart_rate", &daily(&[72.0]), 7);

        assert_eq!(summary.direction, TrendDirection::Stable);
        assert_eq!(summary.mean, Some(72.0));
    }

    #[test]
    fn rising_series_is_increasing() {
        let summary = TrendAnalyzer::default().analyze(
            "step_count",
            &daily(&[100.0, 110.0, 150.0, 170.0]),
            7,
        );

        assert_eq!(summary.direction, TrendDirection::Increasing);
        assert_eq!(summary.mean, Some(132.5));
    }

    #[test]
    fn falling_series_is_decreasing() {
        let summary = TrendAnalyzer::default().analyze(
            "step_count",
            &daily(&[170.0, 150.0, 110.0, 100.0]),
            7,
        );

        assert_eq!(summary.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn flat_series_is_stable() {
        let summary = TrendAnalyzer::default().analyze("body_temperature", &daily(&[36.8; 6]), 7);

        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn small_change_within_tolerance_is_stable() {
        // 4% rise against a 5% tolerance
        let summary = TrendAnalyzer::default().analyze(
            "heart_rate",
            &daily(&[100.0, 100.0, 104.0, 104.0]),
            7,
        );

        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn odd_length_puts_middle_point_in_second_half() {
        // first half [20], second half [10, 30]: means are equal
        let summary = TrendAnalyzer::default().analyze("m", &daily(&[20.0, 10.0, 30.0]), 7);

        assert_eq!(summary.direction, TrendDirection::Stable);
    }

    #[test]
    fn window_is_relative_to_latest_point() {
        let series = daily(&[500.0, 500.0, 500.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0]);

        let summary = TrendAnalyzer::default().analyze("m", &series, 6);

        // day 3 onwards (latest is day 9)
        assert_eq!(summary.points.len(), 7);
        assert_eq!(summary.points[0].value, 10.0);
        assert_eq!(summary.direction, TrendDirection::Increasing);
        assert_eq!(summary.latest, Some(20.0));
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(20.0));
    }

    #[test]
    fn unordered_input_is_sorted_before_analysis() {
        let mut series = daily(&[1.0, 2.0, 3.0, 4.0]);
        series.reverse();

        let summary = TrendAnalyzer::default().analyze("m", &series, 7);

        assert_eq!(summary.points[0].value, 1.0);
        assert_eq!(summary.direction, TrendDirection::Increasing);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let summary = TrendAnalyzer::default().analyze("m", &daily(&[f64::NAN, 5.0]), 7);

        assert_eq!(summary.points.len(), 1);
        assert_eq!(summary.mean, Some(5.0));
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let analyzer = TrendAnalyzer::default();
        let series = daily(&[3.0, 9.0, 4.0, 8.0, 1.0]);

        assert_eq!(analyzer.analyze("m", &series, 3), analyzer.analyze("m", &series, 3));
    }

    #[test]
    fn oversized_window_keeps_every_point() {
        let series = daily(&[60.0, 62.0, 90.0, 95.0]);

        let summary = TrendAnalyzer::default().analyze("heart_rate", &series, u32::MAX);

        assert_eq!(summary.points.len(), 4);
        assert_eq!(summary.direction, TrendDirection::Increasing);
    }

    #[test]
    fn window_start_is_none_past_representable_range() {
        let latest = START + Duration::days(9);

        assert_eq!(window_start(latest, 9), Some(START));
        assert_eq!(window_start(latest, 4_000_000_000), None);
    }

    #[test]
    fn zero_baseline_rise_is_increasing() {
        let summary = TrendAnalyzer::default().analyze(
            "step_count",
            &daily(&[0.0, 0.0, 5.0, 5.0]),
            7,
        );

        assert_eq!(summary.direction, TrendDirection::Increasing);
    }
}
