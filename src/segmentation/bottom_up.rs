//! Bottom-up piecewise-linear approximation
//!
//! Starts from one segment per pair of adjacent samples and repeatedly merges
//! the adjacent pair whose merge loses the least fit quality, until `k`
//! segments remain. A snapshot is taken every time the segment count halves.
//!
//! Merge cost is `SSE(union) - (SSE(left) + SSE(right))`. It can be negative
//! when a merged line fits better than the two pieces did; nothing downstream
//! assumes it is non-negative.

use std::{cmp::Reverse, collections::BinaryHeap};

use ordered_float::OrderedFloat;

use super::fit::{build_segment, validate_series};
use crate::{
    segment::{ApproximationSegments, ApproximationSegmentsContainer, Segment},
    Result, TrendError,
};

/// Heap entry: `(cost, left id, right id)`, min-ordered.
type MergeCandidate = Reverse<(OrderedFloat<f64>, usize, usize)>;

/// A live or retired segment in the merge arena.
///
/// Ids are arena positions and are never reused, so a heap entry naming a
/// retired id is stale by construction.
#[derive(Debug)]
struct Node {
    segment: Segment,
    sse: f64,
    prev: Option<usize>,
    next: Option<usize>,
    alive: bool,
}

/// Working state for one segmentation run
struct MergeArena<'a> {
    x: &'a [f64],
    y: &'a [f64],
    nodes: Vec<Node>,
    head: Option<usize>,
    live: usize,
    heap: BinaryHeap<MergeCandidate>,
}

impl<'a> MergeArena<'a> {
    fn new(x: &'a [f64], y: &'a [f64]) -> Result<Self> {
        let count = y.len() - 1;
        let mut nodes = Vec::with_capacity(count * 2);
        for i in 0..count {
            let (segment, sse) = build_segment(x, y, i, i + 1)?;
            nodes.push(Node {
                segment,
                sse,
                prev: i.checked_sub(1),
                next: (i + 1 < count).then_some(i + 1),
                alive: true,
            });
        }

        let mut arena = Self {
            x,
            y,
            nodes,
            head: Some(0),
            live: count,
            heap: BinaryHeap::with_capacity(count),
        };
        arena.seed_costs()?;
        Ok(arena)
    }

    /// Push the merge cost of `left` and its current right neighbour.
    fn push_cost(&mut self, left: usize) -> Result<()> {
        let Some(right) = self.nodes[left].next else {
            return Ok(());
        };
        let (l, r) = (&self.nodes[left], &self.nodes[right]);
        let (_, union_sse) =
            build_segment(self.x, self.y, l.segment.start_idx, r.segment.end_idx)?;
        let cost = union_sse - (l.sse + r.sse);
        self.heap.push(Reverse((OrderedFloat(cost), left, right)));
        Ok(())
    }

    /// Drop every queued entry and recompute costs for all adjacent pairs.
    /// Returns the number of candidates queued.
    fn seed_costs(&mut self) -> Result<usize> {
        self.heap.clear();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            self.push_cost(id)?;
            cursor = self.nodes[id].next;
        }
        Ok(self.heap.len())
    }

    fn is_valid_pair(&self, left: usize, right: usize) -> bool {
        self.nodes[left].alive && self.nodes[right].alive && self.nodes[left].next == Some(right)
    }

    /// Pop the cheapest pair that is still live and adjacent, discarding stale entries.
    fn pop_valid(&mut self) -> Option<(usize, usize, f64)> {
        while let Some(Reverse((cost, left, right))) = self.heap.pop() {
            if self.is_valid_pair(left, right) {
                return Some((left, right, cost.0));
            }
        }
        None
    }

    /// Replace `left` and `right` with a single segment over their union.
    fn merge(&mut self, left: usize, right: usize) -> Result<()> {
        let start = self.nodes[left].segment.start_idx;
        let end = self.nodes[right].segment.end_idx;
        let (segment, sse) = build_segment(self.x, self.y, start, end)?;

        let prev = self.nodes[left].prev;
        let next = self.nodes[right].next;
        self.nodes[left].alive = false;
        self.nodes[right].alive = false;

        let id = self.nodes.len();
        self.nodes.push(Node {
            segment,
            sse,
            prev,
            next,
            alive: true,
        });

        match prev {
            Some(p) => self.nodes[p].next = Some(id),
            None => self.head = Some(id),
        }
        if let Some(n) = next {
            self.nodes[n].prev = Some(id);
        }
        self.live -= 1;

        if let Some(p) = prev {
            self.push_cost(p)?;
        }
        self.push_cost(id)
    }

    /// Current segments in series order
    fn snapshot(&self) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(self.live);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            segments.push(self.nodes[id].segment.clone());
            cursor = self.nodes[id].next;
        }
        segments
    }
}

/// Segment `y` sampled at times `x` into a multi-level hierarchy ending at `k` segments.
///
/// Level 0 holds `len(y) - 1` atomic segments; every later level is captured
/// when the count reaches half of the previously captured count, and the final
/// `k`-segment state is always the last level.
pub fn bottom_up_merge(
    source: &str,
    x: &[f64],
    y: &[f64],
    k: usize,
) -> Result<ApproximationSegmentsContainer> {
    validate_series(x, y)?;
    let n = y.len();
    if k == 0 || k >= n {
        return Err(TrendError::InvalidArgument(format!(
            "k = {k} must satisfy 1 <= k < {n} for series '{source}'"
        )));
    }

    let mut arena = MergeArena::new(x, y)?;
    let mut levels = vec![ApproximationSegments {
        segments: arena.snapshot(),
        approximation_level: 0,
    }];
    let mut captured_len = arena.live;

    while arena.live > k {
        let Some((left, right, cost)) = arena.pop_valid() else {
            tracing::warn!(
                source,
                live = arena.live,
                "merge queue exhausted; recomputing adjacent merge costs"
            );
            if arena.seed_costs()? == 0 {
                return Err(TrendError::InvalidArgument(format!(
                    "no adjacent segments left to merge in '{source}'"
                )));
            }
            continue;
        };

        arena.merge(left, right)?;
        tracing::trace!(source, left, right, cost, live = arena.live, "merged segments");

        if arena.live == captured_len / 2 {
            push_level(&mut levels, arena.snapshot(), source);
            captured_len = arena.live;
        }
    }

    if captured_len != k {
        push_level(&mut levels, arena.snapshot(), source);
    }

    let max_approximation_level = levels.len() - 1;
    Ok(ApproximationSegmentsContainer {
        source: source.to_string(),
        approximation_segments_list: levels,
        max_approximation_level,
    })
}

fn push_level(levels: &mut Vec<ApproximationSegments>, segments: Vec<Segment>, source: &str) {
    let approximation_level = levels.len();
    tracing::debug!(
        source,
        level = approximation_level,
        segments = segments.len(),
        "captured approximation level"
    );
    levels.push(ApproximationSegments {
        segments,
        approximation_level,
    });
}

// ============================================================
// TESTS
// ============================================================
