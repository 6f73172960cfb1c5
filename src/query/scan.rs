//! Scan mode: queries without trends
//!
//! Finest-level segments are filtered on their own extrema and time span,
//! then consecutive survivors are joined into maximal runs.

use super::{compiled::window_duration, CompiledQuery};
use crate::segment::{ApproximationSegmentsContainer, Segment};

/// Maximal runs of adjacent level-0 segments passing the global conditions
pub fn scan_runs(query: &CompiledQuery, container: &ApproximationSegmentsContainer) -> Vec<Vec<Segment>> {
    let Some(finest) = container.finest() else {
        return Vec::new();
    };
    let spec = query.spec();

    let survivors = finest.segments.iter().filter(|s| {
        spec.max_value_scope_condition.map_or(true, |c| c.contains(s.max_value))
            && spec.min_value_scope_condition.map_or(true, |c| c.contains(s.min_value))
            && spec
                .time_scope_condition
                .map_or(true, |c| c.contains_span(s.start_time, s.end_time))
    });

    let mut runs: Vec<Vec<Segment>> = Vec::new();
    for segment in survivors {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|prev| prev.is_adjacent_to(segment)) => {
                run.push(segment.clone());
            }
            _ => runs.push(vec![segment.clone()]),
        }
    }

    if let Some(condition) = spec.duration_condition {
        runs.retain(|run| condition.contains(window_duration(run)));
    }
    runs
}
