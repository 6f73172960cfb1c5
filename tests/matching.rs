//! Integration tests for trend-shape matching, scan mode and query-by-example.

use std::collections::{BTreeMap, HashMap};

use trendscope::prelude::*;

fn engine() -> TrendEngine {
    TrendEngine::default()
}

fn series(name: &str, y: &[f64]) -> (ApproximationSegmentsContainer, HashMap<String, Vec<f64>>) {
    let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    let container = engine().approximate(name, &x, y).unwrap();
    let raw = HashMap::from([(name.to_string(), y.to_vec())]);
    (container, raw)
}

fn zigzag_spec(comparator: Comparator) -> QuerySpec {
    QuerySpec::new()
        .trends([
            Trend::new(TrendCategory::Up),
            Trend::new(TrendCategory::Down),
            Trend::new(TrendCategory::Up),
            Trend::new(TrendCategory::Down),
        ])
        .relation(SingleRelation::new(0, 2, SingleAttribute::EndValue, comparator))
}

#[test]
fn test_zigzag_relation_scenario() {
    let (container, raw) = series("s", &[0.0, 10.0, 5.0, 12.0, 3.0]);
    let containers = [container];

    let results = engine()
        .query(&zigzag_spec(Comparator::Less), &containers, &raw)
        .unwrap();
    let level0 = &results["s"][&0];
    assert_eq!(level0.len(), 1);
    let bounds: Vec<(usize, usize)> = level0[0].iter().map(|s| (s.start_idx, s.end_idx)).collect();
    assert_eq!(bounds, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);

    let results = engine()
        .query(&zigzag_spec(Comparator::Greater), &containers, &raw)
        .unwrap();
    assert!(results["s"].is_empty());
}

#[test]
fn test_windows_slide_over_all_positions() {
    let (container, raw) = series("s", &[0.0, 4.0, 1.0, 5.0, 2.0, 6.0, 3.0]);
    let spec = QuerySpec::new().trends([
        Trend::new(TrendCategory::Up),
        Trend::new(TrendCategory::Down),
    ]);
    let results = engine().query(&spec, &[container], &raw).unwrap();
    let starts: Vec<usize> = results["s"][&0].iter().map(|w| w[0].start_idx).collect();
    assert_eq!(starts, vec![0, 2, 4]);
}

#[test]
fn test_arbitrary_matches_every_category() {
    let (container, raw) = series("s", &[1.0, 1.0, 5.0, 2.0]);
    let spec = QuerySpec::new().trend(Trend::new(TrendCategory::Arbitrary));
    let results = engine().query(&spec, &[container], &raw).unwrap();
    assert_eq!(results["s"][&0].len(), 3);
}

#[test]
fn test_scan_mode_scenario() {
    let (container, raw) = series("s", &[6.0, 7.0, 8.0, 2.0, 6.0, 9.0, 7.0, 1.0, 6.0]);
    let spec = QuerySpec::new().min_value_scope(ScopeCondition::at_least(5.0));
    let results = engine().query(&spec, &[container], &raw).unwrap();

    let levels = &results["s"];
    assert_eq!(levels.keys().copied().collect::<Vec<_>>(), vec![0]);
    let runs: Vec<Vec<usize>> = levels[&0]
        .iter()
        .map(|run| run.iter().map(|s| s.start_idx).collect())
        .collect();
    assert_eq!(runs, vec![vec![0, 1], vec![4, 5]]);
}

#[test]
fn test_scan_mode_without_survivors() {
    let (container, raw) = series("s", &[1.0, 2.0, 3.0]);
    let spec = QuerySpec::new().max_value_scope(ScopeCondition::above(100.0));
    let results = engine().query(&spec, &[container], &raw).unwrap();
    assert!(results["s"].is_empty());
}

#[test]
fn test_targets_restrict_series() {
    let (a, mut raw) = series("a", &[0.0, 2.0, 1.0, 3.0]);
    let (b, raw_b) = series("b", &[3.0, 1.0, 2.0, 0.0]);
    raw.extend(raw_b);
    let containers = [a, b];

    let spec = QuerySpec::new().target("b").trend(Trend::new(TrendCategory::Down));
    let results = engine().query(&spec, &containers, &raw).unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["b"]);

    let spec = QuerySpec::new().trend(Trend::new(TrendCategory::Down));
    let results = engine().query(&spec, &containers, &raw).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_btreemap_and_dataset_raw_sources() {
    let y = vec![0.0, 10.0, 5.0, 12.0, 3.0];
    let time: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    let dataset = Dataset::new(time).with_column("s", y.clone()).unwrap();
    let containers = engine().approximate_dataset(&dataset).unwrap();
    let spec = zigzag_spec(Comparator::Less);

    let from_dataset = engine().query(&spec, &containers, &dataset).unwrap();
    let raw: BTreeMap<String, Vec<f64>> = BTreeMap::from([("s".to_string(), y)]);
    let from_map = engine().query(&spec, &containers, &raw).unwrap();
    assert_eq!(from_dataset, from_map);
}

#[test]
fn test_double_bottom_with_approximate_lows() {
    let y = [10.0, 2.0, 7.0, 2.3, 9.0, 8.5, 9.5];
    let (container, raw) = series("s", &y);
    let spec = QuerySpec::new()
        .trends([
            Trend::new(TrendCategory::Down),
            Trend::new(TrendCategory::Up),
            Trend::new(TrendCategory::Down),
            Trend::new(TrendCategory::Up),
        ])
        .relation(SingleRelation::new(
            0,
            2,
            SingleAttribute::EndValue,
            Comparator::ApproximatelyEqual,
        ));
    let results = engine().query(&spec, &[container], &raw).unwrap();
    let level0 = &results["s"][&0];
    assert_eq!(level0.len(), 1);
    assert_eq!(level0[0][0].start_idx, 0);
}

#[test]
fn test_query_from_example_matches_source_window() {
    let y = [3.0, 8.0, 6.0, 11.0, 4.0, 4.1, 9.0, 2.0, 7.0, 5.0];
    let (container, raw) = series("s", &y);
    let e = engine();
    let finest = container.finest().unwrap().segments.clone();

    for start in 0..finest.len() - 3 {
        let window = &finest[start..start + 3];
        let spec = e
            .example("s", window)
            .unwrap()
            .constrain(1, TrendConstraint::Slope)
            .unwrap()
            .group(0, 1)
            .unwrap()
            .relate(0, 2, SingleAttribute::EndValue)
            .unwrap()
            .relate_groups((0, 0), (1, 2))
            .unwrap()
            .total_duration()
            .compare_start_end()
            .build();

        let results = e.query(&spec, std::slice::from_ref(&container), &raw).unwrap();
        let found = results["s"]
            .get(&0)
            .is_some_and(|windows| windows.iter().any(|w| w.as_slice() == window));
        assert!(found, "window starting at {start} not matched by its own query");
    }
}

#[test]
fn test_query_spec_json_drives_matching() {
    let (container, raw) = series("s", &[0.0, 10.0, 5.0, 12.0, 3.0]);
    let json = r#"{
        "targets": ["s"],
        "trends": [{"category": "up"}, {"category": "down"}, {"category": "up"}, {"category": "down"}],
        "single_relations": [{"id1": 0, "id2": 2, "attribute": "end_value", "comparator": "<"}],
        "comparator_between_start_end_value": "<"
    }"#;
    let spec: QuerySpec = serde_json::from_str(json).unwrap();
    let results = engine().query(&spec, &[container], &raw).unwrap();
    assert_eq!(results["s"][&0].len(), 1);
}

#[test]
fn test_invalid_group_rejected_before_matching() {
    let (container, raw) = series("s", &[0.0, 1.0, 0.0]);
    let spec = QuerySpec::new()
        .trend(Trend::new(TrendCategory::Up))
        .group(TrendGroup::new(1, 0));
    assert!(matches!(
        engine().query(&spec, &[container], &raw),
        Err(TrendError::InvalidQuery { .. })
    ));
}

#[test]
fn test_group_past_window_rejects_every_window() {
    let (container, raw) = series("s", &[0.0, 10.0, 5.0, 12.0, 3.0]);
    let containers = [container];
    let shape = || {
        QuerySpec::new().trends([
            Trend::new(TrendCategory::Up),
            Trend::new(TrendCategory::Down),
        ])
    };

    let results = engine().query(&shape(), &containers, &raw).unwrap();
    assert_eq!(results["s"][&0].len(), 2);

    let spec = shape().group(TrendGroup::new(0, 9));
    let results = engine().query(&spec, &containers, &raw).unwrap();
    assert!(results["s"].is_empty());
}
