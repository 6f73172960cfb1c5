//! Linear fit helpers shared by the merge loop
//!
//! Every derived segment field is recomputed from the raw samples, so these
//! helpers take the full `x`/`y` arrays plus an inclusive index range.

use crate::{segment::Segment, Result, TrendError};

// ============================================================
// INPUT VALIDATION
// ============================================================

/// Check that `x`/`y` form a usable series: same length, at least two
/// samples, finite values and strictly increasing time.
pub fn validate_series(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(TrendError::InvalidArgument(format!(
            "time and value arrays differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if y.len() < 2 {
        return Err(TrendError::InvalidArgument(format!(
            "series needs at least 2 samples, got {}",
            y.len()
        )));
    }
    for (index, (&t, &v)) in x.iter().zip(y).enumerate() {
        if !t.is_finite() {
            return Err(TrendError::InvalidSeries {
                index,
                reason: "non-finite time",
            });
        }
        if !v.is_finite() {
            return Err(TrendError::InvalidSeries {
                index,
                reason: "non-finite value",
            });
        }
        if index > 0 && t <= x[index - 1] {
            return Err(TrendError::InvalidSeries {
                index,
                reason: "time is not strictly increasing",
            });
        }
    }
    Ok(())
}

// ============================================================
// LEAST-SQUARES FIT
// ============================================================

/// Residual statistics of the least-squares line over a sample range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    /// Sum of squared residuals
    pub sse: f64,
    /// Coefficient of determination, 1.0 when the values have zero variance
    pub r2: f64,
}

/// Fit a least-squares line over the samples `start..=end`.
///
/// Time is shifted by `x[start]` before accumulating, which keeps epoch-second
/// timestamps from swamping the variance terms.
pub fn fit_line(x: &[f64], y: &[f64], start: usize, end: usize) -> Result<LineFit> {
    if end <= start {
        return Err(TrendError::InvalidArgument(format!(
            "segment range [{start}, {end}] is empty"
        )));
    }
    let xs = &x[start..=end];
    let ys = &y[start..=end];
    let n = xs.len() as f64;
    let origin = xs[0];

    let mean_x = xs.iter().map(|t| t - origin).sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (sxx, sxy, syy) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0, 0.0), |(sxx, sxy, syy), (t, v)| {
            let dx = t - origin - mean_x;
            let dy = v - mean_y;
            (sxx + dx * dx, sxy + dx * dy, syy + dy * dy)
        });

    if sxx <= 0.0 {
        return Err(TrendError::DegenerateSegment {
            start_idx: start,
            end_idx: end,
        });
    }

    // Clamp: cancellation can leave a tiny negative residual.
    let sse = (syy - sxy * sxy / sxx).max(0.0);
    let r2 = if syy <= 0.0 {
        1.0
    } else {
        (1.0 - sse / syy).clamp(0.0, 1.0)
    };

    Ok(LineFit { sse, r2 })
}

// ============================================================
// SEGMENT CONSTRUCTION
// ============================================================

/// Build a segment over `start..=end`, returning it with the fit residual the
/// merge loop needs for cost bookkeeping.
pub fn build_segment(x: &[f64], y: &[f64], start: usize, end: usize) -> Result<(Segment, f64)> {
    let fit = fit_line(x, y, start, end)?;

    let start_time = x[start];
    let end_time = x[end];
    let duration = end_time - start_time;
    if duration <= 0.0 {
        return Err(TrendError::DegenerateSegment {
            start_idx: start,
            end_idx: end,
        });
    }

    let start_value = y[start];
    let end_value = y[end];
    let (min_value, max_value) = y[start..=end]
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let segment = Segment {
        start_idx: start,
        end_idx: end,
        start_time,
        end_time,
        start_value,
        end_value,
        max_value,
        min_value,
        slope: (end_value - start_value) / duration,
        duration,
        r2: fit.r2,
        score: fit.r2,
        relative_slope: None,
        category: None,
    };

    Ok((segment, fit.sse))
}

// ============================================================
// TESTS
// ============================================================
