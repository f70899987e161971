use std::collections::HashMap;

use tracing::debug;

use crate::bitmap::Coverage;

use super::container::BitmapContainer;
use super::cube::CubeCell;
use super::driver::DecodeError;
use super::hypothesis::{HypId, HypothesisArena, ScoreContext};

/// Outcome of offering a hypothesis to a stack. Rejection is final either
/// way; the caller only distinguishes outcomes for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// New representative (possibly demoting an equal-key predecessor).
    Accepted,
    /// Merged into an existing representative with the same key.
    Recombined,
    /// Below the beam threshold, or evicted straight away by the size bound.
    Rejected,
}

/// One beam of the coverage lattice: every hypothesis covering exactly
/// `popcount` source words, grouped into containers by coverage bitmap.
pub struct HypothesisStack {
    popcount: usize,
    containers: Vec<BitmapContainer>,
    by_coverage: HashMap<Coverage, usize>,
    /// Best estimate admitted so far; the beam threshold hangs off this.
    best_estimate: f32,
    /// Representatives across all containers.
    size: usize,
    beam_width: f32,
    max_size: usize,
    position_sensitive: bool,
}

impl HypothesisStack {
    pub fn new(
        popcount: usize,
        beam_width: f32,
        max_size: usize,
        position_sensitive: bool,
    ) -> Self {
        Self {
            popcount,
            containers: Vec::new(),
            by_coverage: HashMap::new(),
            best_estimate: f32::NEG_INFINITY,
            size: 0,
            beam_width,
            max_size,
            position_sensitive,
        }
    }

    pub fn popcount(&self) -> usize {
        self.popcount
    }

    pub fn best_estimate(&self) -> f32 {
        self.best_estimate
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Containers in creation order.
    pub fn containers(&self) -> &[BitmapContainer] {
        &self.containers
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub(super) fn container_mut(&mut self, index: usize) -> &mut BitmapContainer {
        &mut self.containers[index]
    }

    /// Index of the container for `coverage`, creating it if absent.
    pub(super) fn container_index(&mut self, coverage: &Coverage) -> usize {
        if let Some(&index) = self.by_coverage.get(coverage) {
            return index;
        }
        let index = self.containers.len();
        self.containers.push(BitmapContainer::new(coverage.clone()));
        self.by_coverage.insert(coverage.clone(), index);
        index
    }

    /// Beam-pruned admission with recombination: threshold check first,
    /// then key lookup in the target container.
    /// A winning hypothesis replaces the old representative and inherits it
    /// as an alternative when `keep_alternatives` is set; a losing one is
    /// chained behind the representative or dropped.
    pub fn admit(
        &mut self,
        hyp: HypId,
        arena: &mut HypothesisArena,
        keep_alternatives: bool,
    ) -> Result<Admission, DecodeError> {
        let (estimate, score, coverage, key) = {
            let h = arena.get(hyp);
            (
                h.estimate,
                h.score,
                h.coverage.clone(),
                h.recomb_key(self.position_sensitive),
            )
        };

        if coverage.count() != self.popcount {
            return Err(DecodeError::Invariant(format!(
                "hypothesis covering {} words offered to stack {}",
                coverage.count(),
                self.popcount
            )));
        }

        if self.beam_width > 0.0 && estimate < self.best_estimate - self.beam_width {
            return Ok(Admission::Rejected);
        }

        let container_index = self.container_index(&coverage);
        let container = &mut self.containers[container_index];

        match container.representative_for(&key) {
            Some(existing) => {
                if score > arena.get(existing).score {
                    if keep_alternatives {
                        arena.get_mut(hyp).alternative = Some(existing);
                    }
                    container.replace_representative(existing, hyp, key, arena);
                } else {
                    if keep_alternatives {
                        let next = arena.get(existing).alternative;
                        arena.get_mut(hyp).alternative = next;
                        arena.get_mut(existing).alternative = Some(hyp);
                    }
                    return Ok(Admission::Recombined);
                }
            }
            None => {
                container.insert_representative(hyp, key, arena);
                self.size += 1;
            }
        }

        if estimate > self.best_estimate {
            self.best_estimate = estimate;
        }

        while self.size > self.max_size {
            self.evict_worst(arena);
        }

        Ok(Admission::Accepted)
    }

    /// Drop the worst representative across all containers. Ties keep the
    /// earlier container, so eviction order is deterministic.
    fn evict_worst(&mut self, arena: &HypothesisArena) {
        let mut worst: Option<(usize, f32)> = None;
        for (index, container) in self.containers.iter().enumerate() {
            if let Some(estimate) = container.worst_estimate(arena) {
                let beaten = match worst {
                    None => true,
                    Some((_, current)) => estimate < current,
                };
                if beaten {
                    worst = Some((index, estimate));
                }
            }
        }
        if let Some((index, estimate)) = worst {
            self.containers[index].evict_worst(self.position_sensitive, arena);
            self.size -= 1;
            debug!(stack = self.popcount, estimate, "evicted worst hypothesis");
        }
    }

    /// Run the pop-limit expansion loop over one container's inbound edges:
    /// peek every edge, pop the globally best cell, offer it to this stack,
    /// then materialise the popped cell's successors regardless of the
    /// admission outcome — a pruned parent can still have a better child
    /// under a non-monotone language model.
    pub(super) fn expand_container(
        &mut self,
        index: usize,
        arena: &mut HypothesisArena,
        ctx: &ScoreContext<'_>,
        pop_limit: usize,
        keep_alternatives: bool,
    ) -> Result<usize, DecodeError> {
        let mut edges = self.containers[index].take_edges();
        let mut popped = 0;

        let result = (|| {
            for _ in 0..pop_limit {
                let mut best: Option<(usize, CubeCell)> = None;
                for (edge_index, edge) in edges.iter_mut().enumerate() {
                    if let Some(cell) = edge.peek(arena, ctx) {
                        // strict comparison keeps the first-inserted edge on ties
                        let beaten = match &best {
                            None => true,
                            Some((_, current)) => cell.estimate > current.estimate,
                        };
                        if beaten {
                            best = Some((edge_index, cell));
                        }
                    }
                }
                let Some((edge_index, _)) = best else { break };

                let cell = edges[edge_index].pop(arena, ctx).ok_or_else(|| {
                    DecodeError::Invariant("edge drained between peek and pop".to_string())
                })?;
                popped += 1;

                self.admit(cell.hyp, arena, keep_alternatives)?;
                edges[edge_index].push_successors(cell.x, cell.y, arena, ctx);
            }
            Ok(popped)
        })();

        self.containers[index].restore_edges(edges);
        result
    }
}
