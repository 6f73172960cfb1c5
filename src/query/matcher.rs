//! Runs a query across classified segment hierarchies
//!
//! Targets are resolved and checked up front, then each series is matched
//! independently on the rayon pool.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::{scan::scan_runs, CompiledQuery, QuerySpec};
use crate::{
    segment::{ApproximationSegmentsContainer, Segment},
    Ratio, RawSeries, Result, TrendError,
};

/// Matching windows per approximation level; only levels with matches appear
pub type LevelMatches = BTreeMap<usize, Vec<Vec<Segment>>>;

/// Matching windows per series name
pub type QueryResults = BTreeMap<String, LevelMatches>;

/// Query runner over a set of classified containers
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    containers: &'a [ApproximationSegmentsContainer],
    approx_threshold: Ratio,
}

impl<'a> Matcher<'a> {
    pub fn new(containers: &'a [ApproximationSegmentsContainer], approx_threshold: Ratio) -> Self {
        Self {
            containers,
            approx_threshold,
        }
    }

    fn container(&self, name: &str) -> Option<&'a ApproximationSegmentsContainer> {
        self.containers.iter().find(|c| c.source == name)
    }

    /// Containers named by the query, or all of them when it names none
    fn resolve_targets(&self, spec: &QuerySpec) -> Result<Vec<&'a ApproximationSegmentsContainer>> {
        if spec.targets.is_empty() {
            return Ok(self.containers.iter().collect());
        }
        let mut resolved: Vec<&'a ApproximationSegmentsContainer> = Vec::with_capacity(spec.targets.len());
        for name in &spec.targets {
            let container = self
                .container(name)
                .ok_or_else(|| TrendError::UnknownSeries(name.clone()))?;
            if !resolved.iter().any(|c| c.source == container.source) {
                resolved.push(container);
            }
        }
        Ok(resolved)
    }

    /// Match `spec` against every target series.
    ///
    /// Every target gets an entry, empty when nothing matched.
    ///
    /// # Errors
    ///
    /// - [`TrendError::InvalidQuery`] if the query is structurally invalid
    /// - [`TrendError::UnknownSeries`] for a target without a container or raw values
    /// - [`TrendError::Unclassified`] for a container that was never classified
    /// - [`TrendError::InvalidArgument`] when raw values are shorter than the hierarchy
    pub fn query<R: RawSeries + Sync + ?Sized>(&self, spec: &QuerySpec, raw: &R) -> Result<QueryResults> {
        let query = CompiledQuery::compile(spec, self.approx_threshold)?;

        let mut jobs = Vec::new();
        for container in self.resolve_targets(spec)? {
            if !container.is_classified() {
                return Err(TrendError::Unclassified(container.source.clone()));
            }
            let values = raw
                .values(&container.source)
                .ok_or_else(|| TrendError::UnknownSeries(container.source.clone()))?;
            if values.len() < container.sample_count() {
                return Err(TrendError::InvalidArgument(format!(
                    "series '{}' has {} raw values but its segments span {} samples",
                    container.source,
                    values.len(),
                    container.sample_count()
                )));
            }
            jobs.push((container, values));
        }

        Ok(jobs
            .into_par_iter()
            .map(|(container, values)| {
                let matches = match_container(&query, container, values);
                (container.source.clone(), matches)
            })
            .collect())
    }
}

/// Matches for one series, keyed by level
pub fn match_container(
    query: &CompiledQuery,
    container: &ApproximationSegmentsContainer,
    raw: &[f64],
) -> LevelMatches {
    let mut results = LevelMatches::new();

    if query.is_scan_mode() {
        let runs = scan_runs(query, container);
        tracing::debug!(source = %container.source, runs = runs.len(), "scan mode runs");
        if !runs.is_empty() {
            results.insert(0, runs);
        }
        return results;
    }

    let m = query.window_len();
    for level in container.levels() {
        if level.len() < m {
            continue;
        }
        let windows: Vec<Vec<Segment>> = level
            .segments
            .windows(m)
            .filter(|window| query.matches_window(window, raw))
            .map(<[Segment]>::to_vec)
            .collect();
        tracing::debug!(
            source = %container.source,
            level = level.approximation_level,
            matches = windows.len(),
            "matched level"
        );
        if !windows.is_empty() {
            results.insert(level.approximation_level, windows);
        }
    }
    results
}

// ============================================================
// TESTS
// ============================================================
