//! Parameter metadata for engine tuning
//!
//! Describes every tunable of [`EngineConfig`] so callers can:
//! - sweep parameters in a grid search
//! - document or expose the knobs in a settings UI
//! - build a config from loosely typed key/value input
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use trendscope::params::Parameterized;
//! use trendscope::prelude::*;
//!
//! for param in EngineConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let config = EngineConfig::with_params(&HashMap::from([("flat_threshold", 8.0)])).unwrap();
//! assert_eq!(config.flat_threshold.get(), 8.0);
//! ```

use std::collections::HashMap;

use crate::{
  example::DEFAULT_FUZZY_FACTOR, query::DEFAULT_APPROX_THRESHOLD,
  segmentation::DEFAULT_FLAT_THRESHOLD, EngineConfig, Percent, Ratio, Result, SegmentCount,
  TrendError,
};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Percentage, 0.0..=100.0
  Percent,
  /// Fraction, 0.0..=1.0
  Ratio,
  /// Positive integer
  Count,
}

/// Metadata for a single tunable
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Tuning domain: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn percent(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Percent, default, range, description }
  }

  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn count(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Count, default, range, description }
  }

  /// All values of the tuning domain, min to max by step
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let count = ((max - min) / step + 1e-9).floor() as usize;
    (0..=count).map(|i| min + step * i as f64).collect()
  }

  /// Check a value against the tuning domain and the parameter type
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(TrendError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Count if value.fract() != 0.0 => {
        Err(TrendError::InvalidValue("count parameters must be whole numbers"))
      },
      _ => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Types built from a flat parameter map
pub trait Parameterized: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Missing parameters take their defaults; unknown keys are rejected.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

pub const FLAT_THRESHOLD: &str = "flat_threshold";
pub const APPROX_THRESHOLD: &str = "approx_threshold";
pub const TARGET_SEGMENTS: &str = "target_segments";
pub const FUZZY_FACTOR: &str = "fuzzy_factor";

static ENGINE_PARAMS: [ParamMeta; 4] = [
  ParamMeta::percent(
    FLAT_THRESHOLD,
    DEFAULT_FLAT_THRESHOLD,
    (0.0, 50.0, 2.5),
    "Relative slope (percent) at or below which a segment is flat",
  ),
  ParamMeta::ratio(
    APPROX_THRESHOLD,
    DEFAULT_APPROX_THRESHOLD,
    (0.0, 0.5, 0.05),
    "Fraction of an attribute's spread accepted as approximately equal",
  ),
  ParamMeta::count(TARGET_SEGMENTS, 1.0, (1.0, 256.0, 1.0), "Segment count of the coarsest level"),
  ParamMeta::ratio(
    FUZZY_FACTOR,
    DEFAULT_FUZZY_FACTOR,
    (0.0, 0.5, 0.05),
    "Relative width of ranges built by query-by-example",
  ),
];

impl Parameterized for EngineConfig {
  fn param_meta() -> &'static [ParamMeta] {
    &ENGINE_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    let metas = Self::param_meta();
    for (key, value) in params {
      let meta = metas
        .iter()
        .find(|m| m.name == *key)
        .ok_or_else(|| TrendError::InvalidArgument(format!("unknown parameter '{key}'")))?;
      meta.validate(*value)?;
    }

    Ok(Self {
      flat_threshold: get_percent(params, FLAT_THRESHOLD, DEFAULT_FLAT_THRESHOLD)?,
      approx_threshold: get_ratio(params, APPROX_THRESHOLD, DEFAULT_APPROX_THRESHOLD)?,
      target_segments: get_count(params, TARGET_SEGMENTS, 1)?,
      fuzzy_factor: get_ratio(params, FUZZY_FACTOR, DEFAULT_FUZZY_FACTOR)?,
    })
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

pub fn get_percent(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Percent> {
  Percent::new(params.get(key).copied().unwrap_or(default))
}

pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  Ratio::new(params.get(key).copied().unwrap_or(default))
}

pub fn get_count(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<SegmentCount> {
  match params.get(key).copied() {
    Some(v) if v < 1.0 || v.fract() != 0.0 => {
      Err(TrendError::InvalidValue("segment count must be a positive whole number"))
    },
    Some(v) => SegmentCount::new(v as usize),
    None => SegmentCount::new(default),
  }
}

// ============================================================
// TESTS
// ============================================================
