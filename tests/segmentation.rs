//! Integration tests for segmentation and classification.

use trendscope::prelude::*;

fn linspace(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// Deterministic wavy series
fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            (t * 0.3).sin() * 20.0 + ((i * 7 + 3) % 11) as f64 * 0.5 + t * 0.1
        })
        .collect()
}

#[test]
fn test_peak_scenario() {
    let x = [0.0, 1.0, 2.0, 3.0];
    let y = [0.0, 10.0, 10.0, 0.0];
    let container = bottom_up_merge("peak", &x, &y, 2).unwrap();

    let finest = container.finest().unwrap();
    assert_eq!(finest.len(), 3);
    let slopes: Vec<f64> = finest.segments.iter().map(|s| s.slope).collect();
    assert_eq!(slopes, vec![10.0, 0.0, -10.0]);

    let last = container.coarsest().unwrap();
    assert_eq!(last.len(), 2);
    assert!(last.covers(3));
    // One of the two outer pieces absorbed the flat top.
    assert!(last.segments.iter().any(|s| s.span() == 2));
}

#[test]
fn test_every_level_covers_series() {
    let y = wave(200);
    let x = linspace(200);
    let container = bottom_up_merge("wave", &x, &y, 5).unwrap();

    assert_eq!(container.finest().unwrap().len(), 199);
    assert_eq!(container.coarsest().unwrap().len(), 5);
    assert_eq!(
        container.max_approximation_level,
        container.approximation_segments_list.len() - 1
    );
    let mut previous = usize::MAX;
    for (i, level) in container.levels().enumerate() {
        assert_eq!(level.approximation_level, i);
        assert!(level.covers(199), "level {i} leaves a gap");
        assert!(level.len() < previous);
        previous = level.len();
    }
}

#[test]
fn test_segment_fields_follow_raw_samples() {
    let x: Vec<f64> = (0..50).map(|i| 1_600_000_000.0 + i as f64 * 3_600.0).collect();
    let y = wave(50);
    let container = bottom_up_merge("hourly", &x, &y, 3).unwrap();

    for level in container.levels() {
        for s in &level.segments {
            assert_eq!(s.start_time, x[s.start_idx]);
            assert_eq!(s.end_time, x[s.end_idx]);
            assert_eq!(s.start_value, y[s.start_idx]);
            assert_eq!(s.end_value, y[s.end_idx]);
            let samples = &y[s.start_idx..=s.end_idx];
            assert_eq!(s.max_value, samples.iter().cloned().fold(f64::MIN, f64::max));
            assert_eq!(s.min_value, samples.iter().cloned().fold(f64::MAX, f64::min));
            assert!((s.duration - (s.end_time - s.start_time)).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&s.r2));
            assert_eq!(s.score, s.r2);
        }
    }
}

#[test]
fn test_invalid_inputs() {
    let x = [0.0, 1.0, 2.0];
    assert!(matches!(
        bottom_up_merge("s", &x, &[1.0, 2.0], 1),
        Err(TrendError::InvalidArgument(_))
    ));
    assert!(matches!(
        bottom_up_merge("s", &[0.0], &[1.0], 1),
        Err(TrendError::InvalidArgument(_))
    ));
    assert!(matches!(
        bottom_up_merge("s", &x, &[1.0, f64::NAN, 2.0], 1),
        Err(TrendError::InvalidSeries { index: 1, .. })
    ));
    assert!(matches!(
        bottom_up_merge("s", &[0.0, 2.0, 1.0], &[1.0, 2.0, 3.0], 1),
        Err(TrendError::InvalidSeries { index: 2, .. })
    ));
}

#[test]
fn test_classification_uses_finest_scale() {
    let y = wave(120);
    let x = linspace(120);
    let container = classify(
        bottom_up_merge("wave", &x, &y, 2).unwrap(),
        Percent::new(5.0).unwrap(),
    );

    let finest = container.finest().unwrap();
    let max_rel = finest
        .segments
        .iter()
        .map(|s| s.relative_slope.unwrap())
        .fold(0.0, f64::max);
    assert!((max_rel - 100.0).abs() < 1e-9);

    for s in container.levels().flat_map(|l| l.segments.iter()) {
        let rel = s.relative_slope.unwrap();
        let expected = match s.category.unwrap() {
            TrendCategory::Flat => rel <= 5.0,
            TrendCategory::Up => rel > 5.0 && s.slope > 0.0,
            TrendCategory::Down => rel > 5.0 && s.slope <= 0.0,
            TrendCategory::Arbitrary => false,
        };
        assert!(expected, "segment {}..{} misclassified", s.start_idx, s.end_idx);
    }
}

#[test]
fn test_container_json_roundtrip() {
    let x = linspace(6);
    let y = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
    let container = classify(
        bottom_up_merge("close", &x, &y, 2).unwrap(),
        Percent::new(5.0).unwrap(),
    );
    let json = serde_json::to_value(&container).unwrap();
    assert_eq!(json["source"], "close");
    assert_eq!(json["approximation_segments_list"][0]["segments"][0]["category"], "up");

    let back: ApproximationSegmentsContainer = serde_json::from_value(json).unwrap();
    assert_eq!(back, container);
}
