//! Declarative trend-shape queries
//!
//! A [`QuerySpec`] describes the shape to look for as an ordered list of
//! [`Trend`]s plus relations between them. It is pure data: it serializes with
//! the same field names the query-editing front end uses, and it is compiled
//! into a [`CompiledQuery`] before being run against a segment hierarchy.
//!
//! # Example
//!
//! ```rust
//! use trendscope::prelude::*;
//!
//! // Double bottom: down, up, down, up with both lows at about the same level
//! let spec = QuerySpec::new()
//!     .trend(Trend::new(TrendCategory::Down))
//!     .trend(Trend::new(TrendCategory::Up))
//!     .trend(Trend::new(TrendCategory::Down))
//!     .trend(Trend::new(TrendCategory::Up))
//!     .relation(SingleRelation::new(0, 2, SingleAttribute::EndValue, Comparator::ApproximatelyEqual));
//!
//! assert_eq!(spec.trends.len(), 4);
//! ```

pub mod compiled;
pub mod conditions;
pub mod matcher;
pub mod scan;

use serde::{Deserialize, Serialize};

pub use compiled::CompiledQuery;
pub use conditions::DEFAULT_APPROX_THRESHOLD;
pub use matcher::{LevelMatches, Matcher, QueryResults};

use crate::segment::{Segment, TrendCategory};

// ============================================================
// SCOPE CONDITIONS
// ============================================================

/// One bound of a [`ScopeCondition`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    /// Whether `value` itself satisfies the bound
    pub inclusive: bool,
}

impl Threshold {
    pub const fn inclusive(value: f64) -> Self {
        Self { value, inclusive: true }
    }

    pub const fn exclusive(value: f64) -> Self {
        Self { value, inclusive: false }
    }
}

/// Optional lower and upper bound on a numeric attribute
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Threshold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Threshold>,
}

impl ScopeCondition {
    /// Unbounded on both sides
    pub const fn any() -> Self {
        Self { min: None, max: None }
    }

    pub const fn at_least(value: f64) -> Self {
        Self { min: Some(Threshold::inclusive(value)), max: None }
    }

    pub const fn at_most(value: f64) -> Self {
        Self { min: None, max: Some(Threshold::inclusive(value)) }
    }

    pub const fn above(value: f64) -> Self {
        Self { min: Some(Threshold::exclusive(value)), max: None }
    }

    pub const fn below(value: f64) -> Self {
        Self { min: None, max: Some(Threshold::exclusive(value)) }
    }

    /// Inclusive on both ends
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(Threshold::inclusive(min)),
            max: Some(Threshold::inclusive(max)),
        }
    }

    pub fn with_min(mut self, min: Threshold) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: Threshold) -> Self {
        self.max = Some(max);
        self
    }

    /// Check a single value against both bounds
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        conditions::within_bounds(value, self.min.as_ref(), self.max.as_ref())
    }

    /// Check an interval: `start` against the lower bound and `end` against the upper one
    #[inline]
    pub fn contains_span(&self, start: f64, end: f64) -> bool {
        conditions::span_within_bounds(start, end, self.min.as_ref(), self.max.as_ref())
    }

    fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|t| t.value.is_finite())
    }
}

// ============================================================
// COMPARATORS / ATTRIBUTES
// ============================================================

/// Relation between two attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "<=")]
    NoGreater,
    #[serde(rename = ">=")]
    NoLess,
    /// Equal within a tolerance scaled to the attribute's spread in the window
    #[serde(rename = "~=")]
    ApproximatelyEqual,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::Equal => "=",
            Comparator::NoGreater => "<=",
            Comparator::NoLess => ">=",
            Comparator::ApproximatelyEqual => "~=",
        }
    }

    /// Evaluate `a <op> b`; `tolerance` is only read for `~=`
    #[inline]
    pub fn compare(self, a: f64, b: f64, tolerance: f64) -> bool {
        conditions::compare_values(a, b, self, tolerance)
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Comparator {
    type Err = crate::TrendError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            ">" => Ok(Comparator::Greater),
            "<" => Ok(Comparator::Less),
            "=" => Ok(Comparator::Equal),
            "<=" => Ok(Comparator::NoGreater),
            ">=" => Ok(Comparator::NoLess),
            "~=" => Ok(Comparator::ApproximatelyEqual),
            other => Err(crate::TrendError::InvalidQuery {
                field: "comparator",
                reason: format!("unknown comparator '{other}'"),
            }),
        }
    }
}

/// Per-segment attribute a [`SingleRelation`] compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleAttribute {
    Slope,
    StartValue,
    EndValue,
    Duration,
    RelativeSlope,
}

impl SingleAttribute {
    /// Accessor reading this attribute off a segment
    pub fn accessor(self) -> fn(&Segment) -> f64 {
        match self {
            SingleAttribute::Slope => |s| s.slope,
            SingleAttribute::StartValue => |s| s.start_value,
            SingleAttribute::EndValue => |s| s.end_value,
            SingleAttribute::Duration => |s| s.duration,
            SingleAttribute::RelativeSlope => |s| s.relative_slope.unwrap_or(0.0),
        }
    }

    #[inline]
    pub fn value(self, segment: &Segment) -> f64 {
        (self.accessor())(segment)
    }
}

/// Aggregate attribute a [`GroupRelation`] compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAttribute {
    /// `end_time` of the last segment minus `start_time` of the first
    Duration,
}

impl GroupAttribute {
    /// Aggregate value over `window[lo..=hi]`
    pub fn aggregate(self, window: &[Segment], (lo, hi): (usize, usize)) -> f64 {
        match self {
            GroupAttribute::Duration => window[hi].end_time - window[lo].start_time,
        }
    }

    /// Per-segment attribute whose spread sets the `~=` tolerance
    pub fn member_accessor(self) -> fn(&Segment) -> f64 {
        match self {
            GroupAttribute::Duration => |s| s.duration,
        }
    }
}

// ============================================================
// QUERY ELEMENTS
// ============================================================

/// Expected shape of one segment in the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub category: TrendCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_scope_condition: Option<ScopeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_slope_scope_condition: Option<ScopeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_condition: Option<ScopeCondition>,
}

impl Trend {
    pub const fn new(category: TrendCategory) -> Self {
        Self {
            category,
            slope_scope_condition: None,
            relative_slope_scope_condition: None,
            duration_condition: None,
        }
    }

    pub fn slope(mut self, condition: ScopeCondition) -> Self {
        self.slope_scope_condition = Some(condition);
        self
    }

    pub fn relative_slope(mut self, condition: ScopeCondition) -> Self {
        self.relative_slope_scope_condition = Some(condition);
        self
    }

    pub fn duration(mut self, condition: ScopeCondition) -> Self {
        self.duration_condition = Some(condition);
        self
    }

    /// Category and every present scope condition hold for `segment`
    pub fn matches(&self, segment: &Segment) -> bool {
        let Some(actual) = segment.category else {
            return false;
        };
        if !self.category.admits(actual) {
            return false;
        }
        let checks = [
            (self.slope_scope_condition, segment.slope),
            (
                self.relative_slope_scope_condition,
                segment.relative_slope.unwrap_or(0.0),
            ),
            (self.duration_condition, segment.duration),
        ];
        checks
            .iter()
            .all(|(condition, value)| condition.map_or(true, |c| c.contains(*value)))
    }
}

/// Pairwise constraint between two window-relative segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRelation {
    pub id1: usize,
    pub id2: usize,
    pub attribute: SingleAttribute,
    pub comparator: Comparator,
}

impl SingleRelation {
    pub const fn new(
        id1: usize,
        id2: usize,
        attribute: SingleAttribute,
        comparator: Comparator,
    ) -> Self {
        Self { id1, id2, attribute, comparator }
    }
}

/// Contiguous range of window positions `[lo, hi]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendGroup {
    pub ids: (usize, usize),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_condition: Option<ScopeCondition>,
}

impl TrendGroup {
    pub const fn new(lo: usize, hi: usize) -> Self {
        Self { ids: (lo, hi), duration_condition: None }
    }

    pub fn duration(mut self, condition: ScopeCondition) -> Self {
        self.duration_condition = Some(condition);
        self
    }
}

/// Comparison between the aggregates of two position ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRelation {
    pub group1: (usize, usize),
    pub group2: (usize, usize),
    pub comparator: Comparator,
    pub attribute: GroupAttribute,
}

impl GroupRelation {
    pub const fn new(
        group1: (usize, usize),
        group2: (usize, usize),
        attribute: GroupAttribute,
        comparator: Comparator,
    ) -> Self {
        Self { group1, group2, comparator, attribute }
    }
}

// ============================================================
// QUERY SPEC
// ============================================================

/// Full description of a trend-shape query.
///
/// An empty `trends` list switches matching to scan mode, where only the
/// global value/time/duration conditions apply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Series to search; empty searches every series
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub single_relations: Vec<SingleRelation>,
    #[serde(default)]
    pub trend_groups: Vec<TrendGroup>,
    #[serde(default)]
    pub group_relations: Vec<GroupRelation>,
    /// Bound on the whole window's duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_condition: Option<ScopeCondition>,
    /// Absolute bounds on the window's start and end time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scope_condition: Option<ScopeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value_scope_condition: Option<ScopeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value_scope_condition: Option<ScopeCondition>,
    /// Relation between the first start value and the last end value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator_between_start_end_value: Option<Comparator>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_scan_mode(&self) -> bool {
        self.trends.is_empty()
    }

    pub fn target(mut self, name: impl Into<String>) -> Self {
        self.targets.push(name.into());
        self
    }

    pub fn trend(mut self, trend: Trend) -> Self {
        self.trends.push(trend);
        self
    }

    pub fn trends(mut self, trends: impl IntoIterator<Item = Trend>) -> Self {
        self.trends.extend(trends);
        self
    }

    pub fn relation(mut self, relation: SingleRelation) -> Self {
        self.single_relations.push(relation);
        self
    }

    pub fn group(mut self, group: TrendGroup) -> Self {
        self.trend_groups.push(group);
        self
    }

    pub fn group_relation(mut self, relation: GroupRelation) -> Self {
        self.group_relations.push(relation);
        self
    }

    pub fn duration(mut self, condition: ScopeCondition) -> Self {
        self.duration_condition = Some(condition);
        self
    }

    pub fn time_scope(mut self, condition: ScopeCondition) -> Self {
        self.time_scope_condition = Some(condition);
        self
    }

    pub fn max_value_scope(mut self, condition: ScopeCondition) -> Self {
        self.max_value_scope_condition = Some(condition);
        self
    }

    pub fn min_value_scope(mut self, condition: ScopeCondition) -> Self {
        self.min_value_scope_condition = Some(condition);
        self
    }

    pub fn start_end(mut self, comparator: Comparator) -> Self {
        self.comparator_between_start_end_value = Some(comparator);
        self
    }

    /// Every scope condition in the query, tagged with the field it came from
    fn scope_conditions(&self) -> impl Iterator<Item = (&'static str, &ScopeCondition)> {
        let trend_conditions = self.trends.iter().flat_map(|t| {
            [
                ("trends.slope_scope_condition", t.slope_scope_condition.as_ref()),
                (
                    "trends.relative_slope_scope_condition",
                    t.relative_slope_scope_condition.as_ref(),
                ),
                ("trends.duration_condition", t.duration_condition.as_ref()),
            ]
        });
        let group_conditions = self
            .trend_groups
            .iter()
            .map(|g| ("trend_groups.duration_condition", g.duration_condition.as_ref()));
        let globals = [
            ("duration_condition", self.duration_condition.as_ref()),
            ("time_scope_condition", self.time_scope_condition.as_ref()),
            ("max_value_scope_condition", self.max_value_scope_condition.as_ref()),
            ("min_value_scope_condition", self.min_value_scope_condition.as_ref()),
        ];
        trend_conditions
            .chain(group_conditions)
            .chain(globals)
            .filter_map(|(field, c)| c.map(|c| (field, c)))
    }

    /// Structural validation: group ranges ordered, thresholds finite.
    ///
    /// Ids past the end of the trend list are not an error here; such
    /// references simply reject every window at match time.
    pub fn validate(&self) -> crate::Result<()> {
        for (i, group) in self.trend_groups.iter().enumerate() {
            check_range("trend_groups", i, group.ids)?;
        }
        for (i, relation) in self.group_relations.iter().enumerate() {
            check_range("group_relations.group1", i, relation.group1)?;
            check_range("group_relations.group2", i, relation.group2)?;
        }
        if let Some((field, _)) = self.scope_conditions().find(|(_, c)| !c.is_finite()) {
            return Err(crate::TrendError::InvalidQuery {
                field,
                reason: "threshold value must be finite".to_string(),
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, index: usize, (lo, hi): (usize, usize)) -> crate::Result<()> {
    if hi < lo {
        return Err(crate::TrendError::InvalidQuery {
            field,
            reason: format!("entry {index} has ids [{lo}, {hi}] with hi < lo"),
        });
    }
    Ok(())
}

// ============================================================
// TESTS
// ============================================================
