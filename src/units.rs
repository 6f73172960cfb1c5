//! Human-readable time units for segment summaries

use serde::{Deserialize, Serialize};

use crate::{
    segment::{Segment, TrendCategory},
    segmentation::{categorize, relative_slope},
    Percent, Result, TrendError,
};

/// Calendar-ish time units, months and years taken as 30 and 365 days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Largest first
    pub const DESCENDING: [TimeUnit; 7] = [
        TimeUnit::Year,
        TimeUnit::Month,
        TimeUnit::Week,
        TimeUnit::Day,
        TimeUnit::Hour,
        TimeUnit::Minute,
        TimeUnit::Second,
    ];

    pub const fn seconds(self) -> f64 {
        match self {
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3_600.0,
            TimeUnit::Day => 86_400.0,
            TimeUnit::Week => 604_800.0,
            TimeUnit::Month => 2_592_000.0,
            TimeUnit::Year => 31_536_000.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        }
    }

    /// Largest unit not longer than `seconds`
    pub fn largest_fitting(seconds: f64) -> TimeUnit {
        Self::DESCENDING
            .into_iter()
            .find(|unit| seconds >= unit.seconds())
            .unwrap_or(TimeUnit::Second)
    }

    /// Largest unit in which `seconds` reads as a tidy number.
    ///
    /// A unit qualifies when the value is at least 1 and within 0.1 of its
    /// one-decimal rounding; the returned value is that rounding. Falls back
    /// to seconds rounded to two decimals.
    pub fn appropriate(seconds: f64) -> (TimeUnit, f64) {
        for unit in Self::DESCENDING {
            let value = seconds / unit.seconds();
            if value >= 1.0 {
                let rounded = round_to(value, 1);
                if (rounded - value).abs() < 0.1 {
                    return (unit, round_to(rounded, 2));
                }
            }
        }
        (TimeUnit::Second, round_to(seconds, 2))
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// A segment re-expressed in a readable time unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub start_idx: usize,
    pub end_idx: usize,
    pub unit: TimeUnit,
    /// Duration in `unit`, two decimals
    pub duration: f64,
    /// Value change per `unit`, two decimals
    pub slope: f64,
    pub relative_slope: f64,
    pub category: TrendCategory,
}

/// Summarize a window of segments in the unit chosen from its shortest segment.
///
/// Segments that carry no classification are categorized against
/// `flat_threshold` using the window's own steepest slope.
pub fn summarize(window: &[Segment], flat_threshold: Percent) -> Result<Vec<SegmentSummary>> {
    let shortest = window
        .iter()
        .map(|s| s.duration)
        .reduce(f64::min)
        .ok_or_else(|| TrendError::InvalidArgument("cannot summarize an empty window".to_string()))?;
    let (unit, _) = TimeUnit::appropriate(shortest);
    let scale = unit.seconds();
    let steepest = window.iter().fold(0.0_f64, |acc, s| acc.max(s.slope.abs()));

    Ok(window
        .iter()
        .map(|s| {
            let rel = s.relative_slope.unwrap_or_else(|| relative_slope(s.slope, steepest));
            SegmentSummary {
                start_idx: s.start_idx,
                end_idx: s.end_idx,
                unit,
                duration: round_to(s.duration / scale, 2),
                slope: round_to(s.slope * scale, 2),
                relative_slope: rel,
                category: s
                    .category
                    .unwrap_or_else(|| categorize(s.slope, rel, flat_threshold)),
            }
        })
        .collect())
}
