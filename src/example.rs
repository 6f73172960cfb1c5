//! Query-by-example
//!
//! Builds a [`QuerySpec`] from a window of classified segments the user
//! selected. Every condition is derived from the observed values, so the
//! resulting spec always matches the window it was built from.

use crate::{
    query::{
        compiled::window_duration,
        conditions::{infer_comparator, spread},
        GroupAttribute, GroupRelation, QuerySpec, ScopeCondition, SingleAttribute, SingleRelation,
        Trend, TrendGroup,
    },
    segment::Segment,
    Ratio, Result, TrendError,
};

/// Relative width of the ranges built around observed values
pub const DEFAULT_FUZZY_FACTOR: f64 = 0.1;

/// Inclusive range `[v * (1 - fuzzy), v * (1 + fuzzy)]`, ordered so min <= max
pub fn scope_around(value: f64, fuzzy: f64) -> ScopeCondition {
    let a = value * (1.0 - fuzzy);
    let b = value * (1.0 + fuzzy);
    ScopeCondition::between(a.min(b), a.max(b))
}

/// Per-segment attribute that can be turned into a trend condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendConstraint {
    Slope,
    RelativeSlope,
    Duration,
}

/// Incremental builder turning a selected window into a query
#[derive(Debug, Clone)]
pub struct ExampleQueryBuilder<'a> {
    window: &'a [Segment],
    approx_threshold: f64,
    fuzzy_factor: f64,
    spec: QuerySpec,
}

impl<'a> ExampleQueryBuilder<'a> {
    /// Start from `window`, taken from the series `source`.
    ///
    /// The spec starts with one trend per segment carrying that segment's
    /// category and targets `source`.
    pub fn new(
        source: &str,
        window: &'a [Segment],
        approx_threshold: Ratio,
        fuzzy_factor: Ratio,
    ) -> Result<Self> {
        if window.is_empty() {
            return Err(TrendError::InvalidArgument(
                "cannot build a query from an empty window".to_string(),
            ));
        }
        let trends = window
            .iter()
            .map(|s| s.category.map(Trend::new))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TrendError::Unclassified(source.to_string()))?;

        Ok(Self {
            window,
            approx_threshold: approx_threshold.get(),
            fuzzy_factor: fuzzy_factor.get(),
            spec: QuerySpec::new().target(source).trends(trends),
        })
    }

    fn check_id(&self, field: &'static str, id: usize) -> Result<()> {
        if id >= self.window.len() {
            return Err(TrendError::InvalidQuery {
                field,
                reason: format!("id {id} outside a window of {} segments", self.window.len()),
            });
        }
        Ok(())
    }

    fn check_range(&self, field: &'static str, (lo, hi): (usize, usize)) -> Result<()> {
        if hi < lo {
            return Err(TrendError::InvalidQuery {
                field,
                reason: format!("ids [{lo}, {hi}] with hi < lo"),
            });
        }
        self.check_id(field, hi)
    }

    /// Constrain trend `id` to a range around the segment's observed value
    pub fn constrain(mut self, id: usize, constraint: TrendConstraint) -> Result<Self> {
        self.check_id("trends", id)?;
        let segment = &self.window[id];
        let trend = &mut self.spec.trends[id];
        match constraint {
            TrendConstraint::Slope => {
                trend.slope_scope_condition = Some(scope_around(segment.slope, self.fuzzy_factor));
            }
            TrendConstraint::RelativeSlope => {
                let value = segment.relative_slope.unwrap_or(0.0);
                trend.relative_slope_scope_condition = Some(scope_around(value, self.fuzzy_factor));
            }
            TrendConstraint::Duration => {
                trend.duration_condition = Some(scope_around(segment.duration, self.fuzzy_factor));
            }
        }
        Ok(self)
    }

    /// Group positions `lo..=hi` with a duration condition around their span
    pub fn group(mut self, lo: usize, hi: usize) -> Result<Self> {
        self.check_range("trend_groups", (lo, hi))?;
        let duration = GroupAttribute::Duration.aggregate(self.window, (lo, hi));
        let group = TrendGroup::new(lo, hi).duration(scope_around(duration, self.fuzzy_factor));
        match self.spec.trend_groups.iter_mut().find(|g| g.ids == (lo, hi)) {
            Some(existing) => *existing = group,
            None => self.spec.trend_groups.push(group),
        }
        Ok(self)
    }

    /// Relate two segments on `attribute` with the comparator their values imply.
    ///
    /// Relating the same pair on the same attribute again replaces the earlier relation.
    pub fn relate(mut self, id1: usize, id2: usize, attribute: SingleAttribute) -> Result<Self> {
        self.check_id("single_relations", id1)?;
        self.check_id("single_relations", id2)?;
        let accessor = attribute.accessor();
        let comparator = infer_comparator(
            accessor(&self.window[id1]),
            accessor(&self.window[id2]),
            spread(self.window.iter().map(accessor)),
            self.approx_threshold,
        );
        let relation = SingleRelation::new(id1, id2, attribute, comparator);
        match self
            .spec
            .single_relations
            .iter_mut()
            .find(|r| r.id1 == id1 && r.id2 == id2 && r.attribute == attribute)
        {
            Some(existing) => *existing = relation,
            None => self.spec.single_relations.push(relation),
        }
        Ok(self)
    }

    /// Compare the durations of two position ranges
    pub fn relate_groups(mut self, group1: (usize, usize), group2: (usize, usize)) -> Result<Self> {
        self.check_range("group_relations.group1", group1)?;
        self.check_range("group_relations.group2", group2)?;
        let attribute = GroupAttribute::Duration;
        let comparator = infer_comparator(
            attribute.aggregate(self.window, group1),
            attribute.aggregate(self.window, group2),
            spread(self.window.iter().map(attribute.member_accessor())),
            self.approx_threshold,
        );
        let relation = GroupRelation::new(group1, group2, attribute, comparator);
        match self
            .spec
            .group_relations
            .iter_mut()
            .find(|r| r.group1 == group1 && r.group2 == group2)
        {
            Some(existing) => *existing = relation,
            None => self.spec.group_relations.push(relation),
        }
        Ok(self)
    }

    /// Bound the whole window's duration around the observed span
    pub fn total_duration(mut self) -> Self {
        let duration = window_duration(self.window);
        self.spec.duration_condition = Some(scope_around(duration, self.fuzzy_factor));
        self
    }

    /// Relate the first start value to the last end value
    pub fn compare_start_end(mut self) -> Self {
        let (first, last) = (&self.window[0], &self.window[self.window.len() - 1]);
        let value_spread = spread(
            self.window
                .iter()
                .flat_map(|s| [s.max_value, s.min_value]),
        );
        self.spec.comparator_between_start_end_value = Some(infer_comparator(
            first.start_value,
            last.end_value,
            value_spread,
            self.approx_threshold,
        ));
        self
    }

    pub fn build(self) -> QuerySpec {
        self.spec
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{CompiledQuery, Comparator},
        segment::TrendCategory,
        segmentation::{bottom_up_merge, classify},
        Percent,
    };

    const Y: [f64; 6] = [0.0, 10.0, 5.0, 12.0, 3.0, 3.2];

    fn finest() -> Vec<Segment> {
        let x: Vec<f64> = (0..Y.len()).map(|i| i as f64).collect();
        let container = classify(bottom_up_merge("s", &x, &Y, 1).unwrap(), Percent::new(5.0).unwrap());
        container.finest().unwrap().segments.clone()
    }

    fn ratio(v: f64) -> Ratio {
        Ratio::new(v).unwrap()
    }

    fn builder(window: &[Segment]) -> ExampleQueryBuilder<'_> {
        ExampleQueryBuilder::new("s", window, ratio(0.1), ratio(DEFAULT_FUZZY_FACTOR)).unwrap()
    }

    #[test]
    fn test_scope_around_orders_bounds() {
        let up = scope_around(10.0, 0.1);
        assert!(up.contains(9.0) && up.contains(11.0) && !up.contains(11.5));
        let down = scope_around(-10.0, 0.1);
        assert!(down.contains(-11.0) && down.contains(-9.0) && !down.contains(-8.5));
        assert!(scope_around(0.0, 0.1).contains(0.0));
    }

    #[test]
    fn test_empty_and_unclassified_windows() {
        assert!(matches!(
            ExampleQueryBuilder::new("s", &[], ratio(0.1), ratio(0.1)),
            Err(TrendError::InvalidArgument(_))
        ));

        let x = [0.0, 1.0, 2.0];
        let raw = bottom_up_merge("s", &x, &[0.0, 1.0, 0.0], 1).unwrap();
        let window = &raw.finest().unwrap().segments;
        assert!(matches!(
            ExampleQueryBuilder::new("s", window, ratio(0.1), ratio(0.1)),
            Err(TrendError::Unclassified(_))
        ));
    }

    #[test]
    fn test_trends_follow_categories() {
        let segments = finest();
        let spec = builder(&segments[..4]).build();
        let categories: Vec<TrendCategory> = spec.trends.iter().map(|t| t.category).collect();
        assert_eq!(
            categories,
            vec![
                TrendCategory::Up,
                TrendCategory::Down,
                TrendCategory::Up,
                TrendCategory::Down
            ]
        );
        assert_eq!(spec.targets, vec!["s".to_string()]);
    }

    #[test]
    fn test_relation_inference_and_replacement() {
        let segments = finest();
        let spec = builder(&segments[..4])
            .relate(0, 2, SingleAttribute::EndValue)
            .unwrap()
            .relate(0, 2, SingleAttribute::EndValue)
            .unwrap()
            .relate(1, 3, SingleAttribute::Duration)
            .unwrap()
            .build();
        assert_eq!(spec.single_relations.len(), 2);
        // end values 10 and 12 against a tolerance of 0.9
        assert_eq!(spec.single_relations[0].comparator, Comparator::Less);
        // unit durations with zero spread are exactly equal
        assert_eq!(spec.single_relations[1].comparator, Comparator::Equal);
    }

    #[test]
    fn test_out_of_range_ids() {
        let segments = finest();
        assert!(matches!(
            builder(&segments[..3]).relate(0, 3, SingleAttribute::Slope),
            Err(TrendError::InvalidQuery { field: "single_relations", .. })
        ));
        assert!(matches!(
            builder(&segments[..3]).group(2, 1),
            Err(TrendError::InvalidQuery { field: "trend_groups", .. })
        ));
        assert!(matches!(
            builder(&segments[..3]).constrain(5, TrendConstraint::Slope),
            Err(TrendError::InvalidQuery { field: "trends", .. })
        ));
    }

    #[test]
    fn test_built_spec_matches_its_window() {
        let segments = finest();
        let window = &segments[1..5];
        let spec = builder(window)
            .constrain(0, TrendConstraint::Slope)
            .unwrap()
            .constrain(1, TrendConstraint::RelativeSlope)
            .unwrap()
            .constrain(3, TrendConstraint::Duration)
            .unwrap()
            .group(0, 1)
            .unwrap()
            .relate(0, 2, SingleAttribute::StartValue)
            .unwrap()
            .relate_groups((0, 1), (2, 3))
            .unwrap()
            .total_duration()
            .compare_start_end()
            .build();

        let query = CompiledQuery::compile(&spec, ratio(0.1)).unwrap();
        assert!(query.matches_window(window, &Y));
    }
}
