//! # trendscope - Trend-shape search over time series
//!
//! Segments time series into multi-resolution piecewise-linear hierarchies,
//! labels every segment as flat, up or down, and finds windows of segments
//! that match a declarative shape query.
//!
//! ## Quick Start
//!
//! ```rust
//! use trendscope::prelude::*;
//!
//! let time: Vec<f64> = (0..9).map(|i| i as f64).collect();
//! let dataset = Dataset::new(time)
//!     .with_column("price", vec![0.0, 10.0, 5.0, 12.0, 3.0, 4.0, 9.0, 6.0, 8.0])
//!     .unwrap();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let containers = engine.approximate_dataset(&dataset).unwrap();
//!
//! // Up, down, up, down with the second peak above the first
//! let spec = QuerySpec::new()
//!     .trend(Trend::new(TrendCategory::Up))
//!     .trend(Trend::new(TrendCategory::Down))
//!     .trend(Trend::new(TrendCategory::Up))
//!     .trend(Trend::new(TrendCategory::Down))
//!     .relation(SingleRelation::new(0, 2, SingleAttribute::EndValue, Comparator::Less));
//!
//! let results = engine.query(&spec, &containers, &dataset).unwrap();
//! assert_eq!(results["price"][&0].len(), 1);
//! ```

pub mod dataset;
pub mod example;
pub mod params;
pub mod query;
pub mod segment;
pub mod segmentation;
pub mod units;

pub mod prelude {
    pub use crate::{
        // Parallel
        approximate_parallel,
        // Data
        dataset::Dataset,
        // Query-by-example
        example::{ExampleQueryBuilder, TrendConstraint},
        // Parameters
        params::{ParamMeta, ParamType, Parameterized},
        // Queries
        query::{
            Comparator, CompiledQuery, GroupAttribute, GroupRelation, LevelMatches, Matcher,
            QueryResults, QuerySpec, ScopeCondition, SingleAttribute, SingleRelation, Threshold,
            Trend, TrendGroup,
        },
        // Segments
        segment::{ApproximationSegments, ApproximationSegmentsContainer, Segment, TrendCategory},
        segmentation::{bottom_up_merge, classify},
        units::{SegmentSummary, TimeUnit},
        ApproximationError,
        ApproximationResult,
        // Engine
        EngineBuilder,
        EngineConfig,
        Percent,
        Ratio,
        RawSeries,
        Result,
        SegmentCount,
        // Errors
        TrendError,
        TrendEngine,
    };
}

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    example::{ExampleQueryBuilder, DEFAULT_FUZZY_FACTOR},
    query::{Matcher, QueryResults, QuerySpec, DEFAULT_APPROX_THRESHOLD},
    segment::{ApproximationSegmentsContainer, Segment},
    segmentation::{bottom_up_merge, classify, DEFAULT_FLAT_THRESHOLD},
    units::SegmentSummary,
};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, TrendError>;

/// Errors raised while segmenting, classifying or querying series
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrendError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid series at index {index}: {reason}")]
    InvalidSeries { index: usize, reason: &'static str },

    #[error("Degenerate segment [{start_idx}, {end_idx}]: zero time span")]
    DegenerateSegment { start_idx: usize, end_idx: usize },

    #[error("Invalid query field `{field}`: {reason}")]
    InvalidQuery { field: &'static str, reason: String },

    #[error("Unknown series '{0}'")]
    UnknownSeries(String),

    #[error("Series '{0}' has not been classified")]
    Unclassified(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_nan() || value.is_infinite() {
        return Err(TrendError::InvalidValue("value cannot be NaN or infinite"));
    }
    if !(min..=max).contains(&value) {
        return Err(TrendError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Fraction in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Result<Self> {
        check_range("Ratio", value, 0.0, 1.0).map(Self)
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Percentage in range 0.0..=100.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    pub fn new(value: f64) -> Result<Self> {
        check_range("Percent", value, 0.0, 100.0).map(Self)
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

/// Number of segments (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentCount(usize);

impl SegmentCount {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(TrendError::InvalidValue("SegmentCount must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for SegmentCount {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for SegmentCount {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        SegmentCount::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// RAW VALUES
// ============================================================

/// Source of raw sample values by series name
pub trait RawSeries {
    fn values(&self, name: &str) -> Option<&[f64]>;
}

impl RawSeries for HashMap<String, Vec<f64>> {
    fn values(&self, name: &str) -> Option<&[f64]> {
        self.get(name).map(Vec::as_slice)
    }
}

impl RawSeries for BTreeMap<String, Vec<f64>> {
    fn values(&self, name: &str) -> Option<&[f64]> {
        self.get(name).map(Vec::as_slice)
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Relative slope at or below which a segment is flat
    pub flat_threshold: Percent,
    /// Fraction of an attribute's spread within a window treated as `~=`
    pub approx_threshold: Ratio,
    /// Segment count of the coarsest level
    pub target_segments: SegmentCount,
    /// Range width used by query-by-example
    pub fuzzy_factor: Ratio,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flat_threshold: Percent::new_const(DEFAULT_FLAT_THRESHOLD),
            approx_threshold: Ratio::new_const(DEFAULT_APPROX_THRESHOLD),
            target_segments: SegmentCount::new_const(1),
            fuzzy_factor: Ratio::new_const(DEFAULT_FUZZY_FACTOR),
        }
    }
}

/// Segmentation, classification and query front end
#[derive(Debug, Clone, Default)]
pub struct TrendEngine {
    config: EngineConfig,
}

impl TrendEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Segment one series down to the configured segment count and classify it.
    ///
    /// # Errors
    ///
    /// [`TrendError::InvalidArgument`] when the series has no more samples
    /// than the configured segment count.
    pub fn approximate(&self, source: &str, x: &[f64], y: &[f64]) -> Result<ApproximationSegmentsContainer> {
        let container = bottom_up_merge(source, x, y, self.config.target_segments.get())?;
        Ok(classify(container, self.config.flat_threshold))
    }

    /// Approximate every column of `dataset` in parallel, failing on the first error.
    pub fn approximate_dataset(&self, dataset: &Dataset) -> Result<Vec<ApproximationSegmentsContainer>> {
        let columns: Vec<(&str, &[f64])> = dataset.columns().collect();
        columns
            .into_par_iter()
            .map(|(name, values)| self.approximate(name, dataset.time(), values))
            .collect()
    }

    /// Run `spec` over `containers`, reading raw values from `raw`
    pub fn query<R: RawSeries + Sync + ?Sized>(
        &self,
        spec: &QuerySpec,
        containers: &[ApproximationSegmentsContainer],
        raw: &R,
    ) -> Result<QueryResults> {
        Matcher::new(containers, self.config.approx_threshold).query(spec, raw)
    }

    /// Start a query from a selected window of `source`
    pub fn example<'a>(&self, source: &str, window: &'a [Segment]) -> Result<ExampleQueryBuilder<'a>> {
        ExampleQueryBuilder::new(
            source,
            window,
            self.config.approx_threshold,
            self.config.fuzzy_factor,
        )
    }

    pub fn summarize(&self, window: &[Segment]) -> Result<Vec<SegmentSummary>> {
        units::summarize(window, self.config.flat_threshold)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`TrendEngine`]; values are validated in [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    flat_threshold: f64,
    approx_threshold: f64,
    target_segments: usize,
    fuzzy_factor: f64,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            flat_threshold: config.flat_threshold.get(),
            approx_threshold: config.approx_threshold.get(),
            target_segments: config.target_segments.get(),
            fuzzy_factor: config.fuzzy_factor.get(),
        }
    }

    /// Relative slope in percent at or below which a segment is flat
    pub fn flat_threshold(mut self, percent: f64) -> Self {
        self.flat_threshold = percent;
        self
    }

    /// Fraction of an attribute's spread accepted by `~=`
    pub fn approx_threshold(mut self, ratio: f64) -> Self {
        self.approx_threshold = ratio;
        self
    }

    pub fn target_segments(mut self, k: usize) -> Self {
        self.target_segments = k;
        self
    }

    pub fn fuzzy_factor(mut self, ratio: f64) -> Self {
        self.fuzzy_factor = ratio;
        self
    }

    pub fn build(self) -> Result<TrendEngine> {
        let config = EngineConfig {
            flat_threshold: Percent::new(self.flat_threshold)?,
            approx_threshold: Ratio::new(self.approx_threshold)?,
            target_segments: SegmentCount::new(self.target_segments)?,
            fuzzy_factor: Ratio::new(self.fuzzy_factor)?,
        };
        Ok(TrendEngine::new(config))
    }
}

// ============================================================
// PARALLEL APPROXIMATION
// ============================================================

/// Hierarchy computed for a single column
#[derive(Debug)]
pub struct ApproximationResult {
    pub column: String,
    pub container: ApproximationSegmentsContainer,
}

/// Error from approximating a single column
#[derive(Debug)]
pub struct ApproximationError {
    pub column: String,
    pub error: TrendError,
}

/// Approximate many columns sharing one time axis, collecting failures
/// instead of stopping at the first one.
pub fn approximate_parallel<'a, I>(
    engine: &TrendEngine,
    time: &'a [f64],
    columns: I,
) -> (Vec<ApproximationResult>, Vec<ApproximationError>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a [f64])>,
{
    let results: Vec<_> = columns
        .into_par_iter()
        .map(|(column, values)| {
            engine
                .approximate(column, time, values)
                .map(|container| ApproximationResult {
                    column: column.to_string(),
                    container,
                })
                .map_err(|error| ApproximationError {
                    column: column.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                tracing::warn!(column = %e.column, error = %e.error, "approximation failed");
                errors.push(e);
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
