use std::collections::HashMap;

use crate::bitmap::Coverage;

use super::cube::BackwardsEdge;
use super::hypothesis::{HypId, HypothesisArena, RecombKey};

/// All hypotheses of one stack sharing an exact coverage bitmap, plus the
/// inbound transitions feeding them.
///
/// Representatives are kept sorted by descending estimate, ties in
/// insertion order, so edges can slice their top-K predecessors by bounded
/// iteration. The recombination index maps each key to its current
/// representative; alternatives hang off the representative as an arena
/// chain and never appear here.
pub struct BitmapContainer {
    coverage: Coverage,
    hypotheses: Vec<HypId>,
    recomb: HashMap<RecombKey, HypId>,
    edges: Vec<BackwardsEdge>,
}

impl BitmapContainer {
    pub fn new(coverage: Coverage) -> Self {
        Self {
            coverage,
            hypotheses: Vec::new(),
            recomb: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    /// Representatives, best estimate first.
    pub fn hypotheses(&self) -> &[HypId] {
        &self.hypotheses
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    pub fn add_edge(&mut self, edge: BackwardsEdge) {
        self.edges.push(edge);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(super) fn take_edges(&mut self) -> Vec<BackwardsEdge> {
        std::mem::take(&mut self.edges)
    }

    pub(super) fn restore_edges(&mut self, edges: Vec<BackwardsEdge>) {
        debug_assert!(self.edges.is_empty());
        self.edges = edges;
    }

    pub(super) fn representative_for(&self, key: &RecombKey) -> Option<HypId> {
        self.recomb.get(key).copied()
    }

    /// Insert a new representative, keeping the descending sort. Equal
    /// estimates land after existing entries, preserving insertion order.
    pub(super) fn insert_representative(
        &mut self,
        hyp: HypId,
        key: RecombKey,
        arena: &HypothesisArena,
    ) {
        let estimate = arena.get(hyp).estimate;
        let pos = self
            .hypotheses
            .partition_point(|&h| arena.get(h).estimate >= estimate);
        self.hypotheses.insert(pos, hyp);
        self.recomb.insert(key, hyp);
    }

    /// Swap the representative for `key` from `old` to `new`.
    pub(super) fn replace_representative(
        &mut self,
        old: HypId,
        new: HypId,
        key: RecombKey,
        arena: &HypothesisArena,
    ) {
        self.hypotheses.retain(|&h| h != old);
        let estimate = arena.get(new).estimate;
        let pos = self
            .hypotheses
            .partition_point(|&h| arena.get(h).estimate >= estimate);
        self.hypotheses.insert(pos, new);
        self.recomb.insert(key, new);
    }

    /// Drop the worst representative and return it.
    pub(super) fn evict_worst(&mut self, position_sensitive: bool, arena: &HypothesisArena) -> Option<HypId> {
        let worst = self.hypotheses.pop()?;
        let key = arena.get(worst).recomb_key(position_sensitive);
        self.recomb.remove(&key);
        Some(worst)
    }

    /// Estimate of the current worst representative.
    pub(super) fn worst_estimate(&self, arena: &HypothesisArena) -> Option<f32> {
        self.hypotheses.last().map(|&h| arena.get(h).estimate)
    }
}
