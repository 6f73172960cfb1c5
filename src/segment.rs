//! Segment hierarchy produced by bottom-up segmentation
//!
//! A [`Segment`] is one linear piece of a series. Segmentation emits several
//! [`ApproximationSegments`] levels, from the finest (one segment per pair of
//! adjacent samples) to the coarsest requested resolution, gathered in an
//! [`ApproximationSegmentsContainer`] per named series.

use serde::{Deserialize, Serialize};

// ============================================================
// TREND CATEGORY
// ============================================================

/// Direction of a segment, or the wildcard used by query trends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendCategory {
    Flat,
    Up,
    Down,
    /// Query-side wildcard; segments are never classified as `Arbitrary`.
    Arbitrary,
}

impl TrendCategory {
    /// Returns true if a segment classified as `actual` satisfies this expected category.
    #[inline]
    pub fn admits(self, actual: TrendCategory) -> bool {
        matches!(self, TrendCategory::Arbitrary) || self == actual
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            TrendCategory::Flat => "flat",
            TrendCategory::Up => "up",
            TrendCategory::Down => "down",
            TrendCategory::Arbitrary => "arbitrary",
        }
    }
}

impl std::fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// SEGMENT
// ============================================================

/// A single linear piece of a series between two sample indices.
///
/// `relative_slope` and `category` stay `None` until the container is run
/// through [`classify`](crate::segmentation::classify).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub start_value: f64,
    pub end_value: f64,
    /// Largest raw value in `[start_idx, end_idx]`
    pub max_value: f64,
    /// Smallest raw value in `[start_idx, end_idx]`
    pub min_value: f64,
    pub slope: f64,
    pub duration: f64,
    /// Goodness of the least-squares fit over the spanned samples, 0.0..=1.0
    pub r2: f64,
    pub score: f64,
    /// `|slope|` as a percentage of the steepest finest-level segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TrendCategory>,
}

impl Segment {
    /// Number of sample intervals covered by this segment
    #[inline]
    pub fn span(&self) -> usize {
        self.end_idx - self.start_idx
    }

    #[inline]
    pub fn is_atomic(&self) -> bool {
        self.span() == 1
    }

    /// True when `next` starts exactly where this segment ends
    #[inline]
    pub fn is_adjacent_to(&self, next: &Segment) -> bool {
        self.end_idx == next.start_idx
    }

    #[inline]
    pub fn is_classified(&self) -> bool {
        self.relative_slope.is_some() && self.category.is_some()
    }
}

// ============================================================
// HIERARCHY
// ============================================================

/// One level of the hierarchy: a gap-free run of segments covering the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximationSegments {
    pub segments: Vec<Segment>,
    /// 0 is the finest level
    pub approximation_level: usize,
}

impl ApproximationSegments {
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Checks that consecutive segments share their boundary index and that
    /// the level spans `[0, last_idx]`.
    pub fn covers(&self, last_idx: usize) -> bool {
        let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) else {
            return false;
        };
        first.start_idx == 0
            && last.end_idx == last_idx
            && self
                .segments
                .windows(2)
                .all(|pair| pair[0].is_adjacent_to(&pair[1]))
    }
}

/// All approximation levels computed for one named series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximationSegmentsContainer {
    /// Name of the series these levels were computed from
    pub source: String,
    pub approximation_segments_list: Vec<ApproximationSegments>,
    pub max_approximation_level: usize,
}

impl ApproximationSegmentsContainer {
    /// The level-0 segments, one per pair of adjacent samples
    pub fn finest(&self) -> Option<&ApproximationSegments> {
        self.level(0)
    }

    pub fn coarsest(&self) -> Option<&ApproximationSegments> {
        self.approximation_segments_list.last()
    }

    pub fn level(&self, level: usize) -> Option<&ApproximationSegments> {
        self.approximation_segments_list
            .iter()
            .find(|a| a.approximation_level == level)
    }

    pub fn levels(&self) -> impl Iterator<Item = &ApproximationSegments> {
        self.approximation_segments_list.iter()
    }

    /// Number of raw samples the hierarchy was built from
    pub fn sample_count(&self) -> usize {
        self.finest()
            .and_then(|level| level.segments.last())
            .map_or(0, |s| s.end_idx + 1)
    }

    /// True once every segment of every level carries a relative slope and category
    pub fn is_classified(&self) -> bool {
        self.levels()
            .flat_map(|level| level.segments.iter())
            .all(Segment::is_classified)
    }
}

// ============================================================
// TESTS
// ============================================================
