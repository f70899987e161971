use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::model::OptionId;

use super::hypothesis::{HypId, HypothesisArena, ScoreContext};

/// A materialised grid cell: a scored candidate hypothesis at position
/// `(x, y)` — predecessor axis × option axis.
#[derive(Debug, Clone, Copy)]
pub struct CubeCell {
    pub hyp: HypId,
    pub x: usize,
    pub y: usize,
    pub estimate: f32,
}

/// Heap ordering for frontier cells: estimate descending, then `(x + y)`
/// ascending, then `x` ascending, so earliest-discovered cells win ties
/// deterministically.
struct FrontierCell(CubeCell);

impl PartialEq for FrontierCell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierCell {}

impl PartialOrd for FrontierCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierCell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .estimate
            .total_cmp(&other.0.estimate)
            .then_with(|| (other.0.x + other.0.y).cmp(&(self.0.x + self.0.y)))
            .then_with(|| other.0.x.cmp(&self.0.x))
    }
}

/// One inbound transition of a bitmap container: a lazily explored grid of
/// (predecessor hypothesis × translation option) pairs.
///
/// The grid holds the top-K slice of each axis, taken by bounded iteration
/// over the already-sorted sources. Cells are materialised outward from
/// `(0, 0)`: popping a cell does not enqueue its successors — the caller
/// does that after admission, so repeated next-best scans across many
/// edges stay cheap. A cell is marked seen before any enqueue and is never
/// enqueued twice. A cell whose extension fails (coverage clash or a
/// broken linked group) is marked seen and skipped; it never re-enters
/// the frontier.
pub struct BackwardsEdge {
    hypotheses: Vec<HypId>,
    options: Vec<OptionId>,
    queue: BinaryHeap<FrontierCell>,
    seen: Vec<bool>,
    initialized: bool,
}

impl BackwardsEdge {
    /// `pred_hypotheses` and `ranked_options` must be sorted best-first;
    /// the edge keeps at most `cube_width` of each.
    pub fn new(pred_hypotheses: &[HypId], ranked_options: &[OptionId], cube_width: usize) -> Self {
        let hypotheses: Vec<HypId> = pred_hypotheses.iter().take(cube_width).copied().collect();
        let options: Vec<OptionId> = ranked_options.iter().take(cube_width).copied().collect();
        let seen = vec![false; hypotheses.len() * options.len()];
        Self {
            hypotheses,
            options,
            queue: BinaryHeap::new(),
            seen,
            initialized: false,
        }
    }

    fn in_grid(&self, x: usize, y: usize) -> bool {
        x < self.hypotheses.len() && y < self.options.len()
    }

    fn seen(&self, x: usize, y: usize) -> bool {
        self.seen[x * self.options.len() + y]
    }

    fn mark_seen(&mut self, x: usize, y: usize) {
        let idx = x * self.options.len() + y;
        self.seen[idx] = true;
    }

    /// Build the candidate for `(x, y)` and enqueue it. A failed extension
    /// consumes the cell silently.
    fn materialise(
        &mut self,
        x: usize,
        y: usize,
        arena: &mut HypothesisArena,
        ctx: &ScoreContext<'_>,
    ) {
        if !self.in_grid(x, y) || self.seen(x, y) {
            return;
        }
        self.mark_seen(x, y);
        if let Some(hyp) = arena.extend(self.hypotheses[x], self.options[y], ctx) {
            let estimate = arena.get(hyp).estimate;
            self.queue.push(FrontierCell(CubeCell { hyp, x, y, estimate }));
        }
    }

    fn ensure_initialized(&mut self, arena: &mut HypothesisArena, ctx: &ScoreContext<'_>) {
        if !self.initialized {
            self.initialized = true;
            self.materialise(0, 0, arena, ctx);
        }
    }

    /// Best unconsumed cell, or `None` once the frontier is drained. The
    /// first call materialises `(0, 0)`.
    pub fn peek(&mut self, arena: &mut HypothesisArena, ctx: &ScoreContext<'_>) -> Option<CubeCell> {
        self.ensure_initialized(arena, ctx);
        self.queue.peek().map(|cell| cell.0)
    }

    /// Remove and return the best cell. Successors are not enqueued here;
    /// call `push_successors` once the caller has dealt with the cell.
    pub fn pop(&mut self, arena: &mut HypothesisArena, ctx: &ScoreContext<'_>) -> Option<CubeCell> {
        self.ensure_initialized(arena, ctx);
        self.queue.pop().map(|cell| cell.0)
    }

    /// Materialise the two grid neighbours of a consumed cell.
    pub fn push_successors(
        &mut self,
        x: usize,
        y: usize,
        arena: &mut HypothesisArena,
        ctx: &ScoreContext<'_>,
    ) {
        self.materialise(x + 1, y, arena, ctx);
        self.materialise(x, y + 1, arena, ctx);
    }

    pub fn frontier_len(&self) -> usize {
        self.queue.len()
    }
}
