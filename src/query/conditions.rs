//! Threshold and comparator evaluation shared by the window matcher, the scan
//! matcher and the query-by-example builder.

use super::{Comparator, Threshold};

/// Fraction of an attribute's spread within a window used as the `~=` tolerance
pub const DEFAULT_APPROX_THRESHOLD: f64 = 0.1;

// ============================================================
// THRESHOLDS
// ============================================================

/// `value` is not above `max` (strictly below when the bound is exclusive)
#[inline]
pub fn below_max(value: f64, max: Option<&Threshold>) -> bool {
    match max {
        Some(t) if t.inclusive => value <= t.value,
        Some(t) => value < t.value,
        None => true,
    }
}

/// `value` is not below `min` (strictly above when the bound is exclusive)
#[inline]
pub fn above_min(value: f64, min: Option<&Threshold>) -> bool {
    match min {
        Some(t) if t.inclusive => value >= t.value,
        Some(t) => value > t.value,
        None => true,
    }
}

/// Single value between both bounds
#[inline]
pub fn within_bounds(value: f64, min: Option<&Threshold>, max: Option<&Threshold>) -> bool {
    above_min(value, min) && below_max(value, max)
}

/// Interval check: `start` against the lower bound, `end` against the upper bound
#[inline]
pub fn span_within_bounds(
    start: f64,
    end: f64,
    min: Option<&Threshold>,
    max: Option<&Threshold>,
) -> bool {
    above_min(start, min) && below_max(end, max)
}

// ============================================================
// COMPARATORS
// ============================================================

/// Compare `a` with `b`. `tolerance` only applies to [`Comparator::ApproximatelyEqual`].
#[inline]
pub fn compare_values(a: f64, b: f64, comparator: Comparator, tolerance: f64) -> bool {
    match comparator {
        Comparator::Greater => a > b,
        Comparator::Less => a < b,
        Comparator::Equal => a == b,
        Comparator::NoGreater => a <= b,
        Comparator::NoLess => a >= b,
        Comparator::ApproximatelyEqual => (a - b).abs() <= tolerance,
    }
}

/// Describe how `a` relates to `b`; `~=` wins when the gap is under
/// `spread * approx_threshold`.
pub fn infer_comparator(a: f64, b: f64, spread: f64, approx_threshold: f64) -> Comparator {
    if (a - b).abs() < spread * approx_threshold {
        Comparator::ApproximatelyEqual
    } else if a == b {
        Comparator::Equal
    } else if a > b {
        Comparator::Greater
    } else {
        Comparator::Less
    }
}

// ============================================================
// SPREAD / EXTREMA
// ============================================================

/// `max - min` of the values, 0.0 when empty
pub fn spread<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo.is_finite() && hi.is_finite() {
        hi - lo
    } else {
        0.0
    }
}

/// `(min, max)` of the raw samples `start..=end`, `None` when `raw` is too short
pub fn raw_extrema(raw: &[f64], start: usize, end: usize) -> Option<(f64, f64)> {
    let extrema = raw
        .get(start..=end)?
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    Some(extrema)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_boundary() {
        let t = Threshold::inclusive(5.0);
        assert!(above_min(5.0, Some(&t)));
        assert!(below_max(5.0, Some(&t)));
    }

    #[test]
    fn test_exclusive_boundary() {
        let t = Threshold::exclusive(5.0);
        assert!(!above_min(5.0, Some(&t)));
        assert!(!below_max(5.0, Some(&t)));
        assert!(above_min(5.1, Some(&t)));
        assert!(below_max(4.9, Some(&t)));
    }

    #[test]
    fn test_unbounded() {
        assert!(within_bounds(f64::MAX, None, None));
        assert!(within_bounds(-1e300, None, Some(&Threshold::inclusive(0.0))));
    }

    #[test]
    fn test_span_bounds() {
        let lo = Threshold::inclusive(10.0);
        let hi = Threshold::exclusive(20.0);
        assert!(span_within_bounds(10.0, 19.0, Some(&lo), Some(&hi)));
        assert!(!span_within_bounds(9.0, 19.0, Some(&lo), Some(&hi)));
        assert!(!span_within_bounds(10.0, 20.0, Some(&lo), Some(&hi)));
    }

    #[test]
    fn test_compare_values() {
        assert!(compare_values(2.0, 1.0, Comparator::Greater, 0.0));
        assert!(compare_values(1.0, 2.0, Comparator::Less, 0.0));
        assert!(compare_values(1.0, 1.0, Comparator::Equal, 0.0));
        assert!(compare_values(1.0, 1.0, Comparator::NoGreater, 0.0));
        assert!(compare_values(1.0, 1.0, Comparator::NoLess, 0.0));
        assert!(compare_values(1.0, 1.4, Comparator::ApproximatelyEqual, 0.5));
        assert!(!compare_values(1.0, 1.6, Comparator::ApproximatelyEqual, 0.5));
    }

    #[test]
    fn test_infer_comparator() {
        assert_eq!(infer_comparator(10.0, 10.5, 100.0, 0.1), Comparator::ApproximatelyEqual);
        assert_eq!(infer_comparator(10.0, 30.0, 100.0, 0.1), Comparator::Less);
        assert_eq!(infer_comparator(30.0, 10.0, 100.0, 0.1), Comparator::Greater);
        assert_eq!(infer_comparator(3.0, 3.0, 0.0, 0.1), Comparator::Equal);
    }

    #[test]
    fn test_spread_and_extrema() {
        assert_eq!(spread([3.0, -1.0, 7.0]), 8.0);
        assert_eq!(spread(std::iter::empty()), 0.0);
        assert_eq!(raw_extrema(&[5.0, 1.0, 9.0, 2.0], 1, 3), Some((1.0, 9.0)));
        assert_eq!(raw_extrema(&[5.0, 1.0], 1, 3), None);
    }
}
