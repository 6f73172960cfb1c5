//! Query compilation and per-window evaluation
//!
//! Compiling validates the [`QuerySpec`] once and resolves every attribute
//! reference to a plain accessor, so evaluating a window does no lookups.

use super::{
    conditions::{raw_extrema, spread},
    Comparator, GroupAttribute, QuerySpec, ScopeCondition, Trend,
};
use crate::{segment::Segment, Ratio, Result};

type Accessor = fn(&Segment) -> f64;

#[derive(Debug, Clone, Copy)]
struct CompiledRelation {
    id1: usize,
    id2: usize,
    accessor: Accessor,
    comparator: Comparator,
}

#[derive(Debug, Clone, Copy)]
struct CompiledGroup {
    lo: usize,
    hi: usize,
    duration: Option<ScopeCondition>,
}

#[derive(Debug, Clone, Copy)]
struct CompiledGroupRelation {
    group1: (usize, usize),
    group2: (usize, usize),
    attribute: GroupAttribute,
    comparator: Comparator,
}

/// A validated query ready to be run against segment windows
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    spec: QuerySpec,
    approx_threshold: f64,
    relations: Vec<CompiledRelation>,
    groups: Vec<CompiledGroup>,
    group_relations: Vec<CompiledGroupRelation>,
}

impl CompiledQuery {
    /// Validate `spec` and resolve its attribute accessors.
    pub fn compile(spec: &QuerySpec, approx_threshold: Ratio) -> Result<Self> {
        spec.validate()?;

        let relations = spec
            .single_relations
            .iter()
            .map(|r| CompiledRelation {
                id1: r.id1,
                id2: r.id2,
                accessor: r.attribute.accessor(),
                comparator: r.comparator,
            })
            .collect();

        let groups = spec
            .trend_groups
            .iter()
            .map(|g| CompiledGroup {
                lo: g.ids.0,
                hi: g.ids.1,
                duration: g.duration_condition,
            })
            .collect();

        let group_relations = spec
            .group_relations
            .iter()
            .map(|r| CompiledGroupRelation {
                group1: r.group1,
                group2: r.group2,
                attribute: r.attribute,
                comparator: r.comparator,
            })
            .collect();

        Ok(Self {
            spec: spec.clone(),
            approx_threshold: approx_threshold.get(),
            relations,
            groups,
            group_relations,
        })
    }

    #[inline]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Number of segments in a window, 0 in scan mode
    #[inline]
    pub fn window_len(&self) -> usize {
        self.spec.trends.len()
    }

    #[inline]
    pub fn is_scan_mode(&self) -> bool {
        self.spec.is_scan_mode()
    }

    #[inline]
    pub fn approx_threshold(&self) -> f64 {
        self.approx_threshold
    }

    /// Run every check against one window.
    ///
    /// A window whose samples are not all present in `raw` never matches.
    pub fn matches_window(&self, window: &[Segment], raw: &[f64]) -> bool {
        if window.len() != self.window_len() || window.is_empty() {
            return false;
        }
        let Some(raw_range) = raw_extrema(raw, window[0].start_idx, window[window.len() - 1].end_idx)
        else {
            return false;
        };

        self.global_conditions(window, raw_range)
            && self.trend_sequence(window)
            && self.single_relations(window)
            && self.trend_groups(window)
            && self.group_relations(window)
            && self.total_duration(window)
            && self.start_end(window, raw_range)
    }

    fn global_conditions(&self, window: &[Segment], (raw_min, raw_max): (f64, f64)) -> bool {
        let spec = &self.spec;
        if let Some(c) = &spec.max_value_scope_condition {
            if !c.contains(raw_max) {
                return false;
            }
        }
        if let Some(c) = &spec.min_value_scope_condition {
            if !c.contains(raw_min) {
                return false;
            }
        }
        match &spec.time_scope_condition {
            Some(c) => c.contains_span(window[0].start_time, window[window.len() - 1].end_time),
            None => true,
        }
    }

    fn trend_sequence(&self, window: &[Segment]) -> bool {
        self.spec
            .trends
            .iter()
            .zip(window)
            .all(|(trend, segment): (&Trend, &Segment)| trend.matches(segment))
    }

    fn single_relations(&self, window: &[Segment]) -> bool {
        self.relations.iter().all(|r| {
            let (Some(a), Some(b)) = (window.get(r.id1), window.get(r.id2)) else {
                return false;
            };
            let tolerance = match r.comparator {
                Comparator::ApproximatelyEqual => {
                    spread(window.iter().map(r.accessor)) * self.approx_threshold
                }
                _ => 0.0,
            };
            r.comparator.compare((r.accessor)(a), (r.accessor)(b), tolerance)
        })
    }

    fn trend_groups(&self, window: &[Segment]) -> bool {
        self.groups.iter().all(|g| {
            if g.hi >= window.len() {
                return false;
            }
            match &g.duration {
                Some(c) => c.contains(GroupAttribute::Duration.aggregate(window, (g.lo, g.hi))),
                None => true,
            }
        })
    }

    fn group_relations(&self, window: &[Segment]) -> bool {
        self.group_relations.iter().all(|r| {
            if r.group1.1 >= window.len() || r.group2.1 >= window.len() {
                return false;
            }
            let a = r.attribute.aggregate(window, r.group1);
            let b = r.attribute.aggregate(window, r.group2);
            let tolerance = match r.comparator {
                Comparator::ApproximatelyEqual => {
                    spread(window.iter().map(r.attribute.member_accessor())) * self.approx_threshold
                }
                _ => 0.0,
            };
            r.comparator.compare(a, b, tolerance)
        })
    }

    fn total_duration(&self, window: &[Segment]) -> bool {
        match &self.spec.duration_condition {
            Some(c) => c.contains(window_duration(window)),
            None => true,
        }
    }

    fn start_end(&self, window: &[Segment], (raw_min, raw_max): (f64, f64)) -> bool {
        let Some(comparator) = self.spec.comparator_between_start_end_value else {
            return true;
        };
        let tolerance = (raw_max - raw_min) * self.approx_threshold;
        comparator.compare(
            window[0].start_value,
            window[window.len() - 1].end_value,
            tolerance,
        )
    }
}

/// `last.end_time - first.start_time`, 0.0 for an empty window
pub fn window_duration(window: &[Segment]) -> f64 {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) => last.end_time - first.start_time,
        _ => 0.0,
    }
}

// ============================================================
// TESTS
// ============================================================
