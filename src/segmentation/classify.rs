//! Trend classification
//!
//! Relative slope is measured against the steepest finest-level segment of
//! the same series, and the same scale is applied to every coarser level.

use crate::{
    segment::{ApproximationSegmentsContainer, TrendCategory},
    Percent,
};

/// Relative slope (in percent) at or below which a segment counts as flat
pub const DEFAULT_FLAT_THRESHOLD: f64 = 5.0;

/// Largest `|slope|` among the finest-level segments, 0.0 if there are none
pub fn max_abs_slope(container: &ApproximationSegmentsContainer) -> f64 {
    container
        .finest()
        .map(|level| {
            level
                .segments
                .iter()
                .fold(0.0_f64, |acc, s| acc.max(s.slope.abs()))
        })
        .unwrap_or(0.0)
}

/// `|slope|` as a percentage of `max_abs_slope`
#[inline]
pub fn relative_slope(slope: f64, max_abs_slope: f64) -> f64 {
    if max_abs_slope > 0.0 {
        slope.abs() / max_abs_slope * 100.0
    } else {
        0.0
    }
}

/// Category for a segment given its slope and relative slope
#[inline]
pub fn categorize(slope: f64, relative_slope: f64, flat_threshold: Percent) -> TrendCategory {
    if relative_slope <= flat_threshold.get() {
        TrendCategory::Flat
    } else if slope > 0.0 {
        TrendCategory::Up
    } else {
        TrendCategory::Down
    }
}

/// Return the container with `relative_slope` and `category` filled in on
/// every segment of every level.
///
/// Existing classification is overwritten, so running this twice with the
/// same threshold yields the same container.
pub fn classify(
    mut container: ApproximationSegmentsContainer,
    flat_threshold: Percent,
) -> ApproximationSegmentsContainer {
    let max_abs = max_abs_slope(&container);
    for level in &mut container.approximation_segments_list {
        for segment in &mut level.segments {
            let rel = relative_slope(segment.slope, max_abs);
            segment.relative_slope = Some(rel);
            segment.category = Some(categorize(segment.slope, rel, flat_threshold));
        }
    }
    tracing::debug!(
        source = %container.source,
        max_abs_slope = max_abs,
        "classified segment hierarchy"
    );
    container
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::bottom_up_merge;

    fn threshold() -> Percent {
        Percent::new(DEFAULT_FLAT_THRESHOLD).unwrap()
    }

    #[test]
    fn test_relative_slope() {
        assert_eq!(relative_slope(-5.0, 10.0), 50.0);
        assert_eq!(relative_slope(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize(0.1, 1.0, threshold()), TrendCategory::Flat);
        assert_eq!(categorize(2.0, 5.0, threshold()), TrendCategory::Flat);
        assert_eq!(categorize(2.0, 20.0, threshold()), TrendCategory::Up);
        assert_eq!(categorize(-2.0, 20.0, threshold()), TrendCategory::Down);
    }

    #[test]
    fn test_classify_all_levels() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 10.0, 10.0, 0.0, 5.0];
        let container = classify(bottom_up_merge("s", &x, &y, 1).unwrap(), threshold());

        assert!(container.is_classified());
        let finest = container.finest().unwrap();
        let categories: Vec<_> = finest.segments.iter().map(|s| s.category.unwrap()).collect();
        assert_eq!(
            categories,
            vec![
                TrendCategory::Up,
                TrendCategory::Flat,
                TrendCategory::Down,
                TrendCategory::Up
            ]
        );
        assert_eq!(finest.segments[0].relative_slope, Some(100.0));
        assert_eq!(finest.segments[3].relative_slope, Some(50.0));

        // Coarse segments share the finest-level scale.
        let whole = &container.coarsest().unwrap().segments[0];
        assert!((whole.relative_slope.unwrap() - 12.5).abs() < 1e-9);
        assert_eq!(whole.category, Some(TrendCategory::Up));
    }

    #[test]
    fn test_flat_series() {
        let x = [0.0, 1.0, 2.0];
        let y = [3.0, 3.0, 3.0];
        let container = classify(bottom_up_merge("s", &x, &y, 1).unwrap(), threshold());
        for level in container.levels() {
            for s in &level.segments {
                assert_eq!(s.relative_slope, Some(0.0));
                assert_eq!(s.category, Some(TrendCategory::Flat));
            }
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 2.0, 8.0, 7.0, 7.5];
        let once = classify(bottom_up_merge("s", &x, &y, 2).unwrap(), threshold());
        let twice = classify(once.clone(), threshold());
        assert_eq!(once, twice);
    }
}
