use crate::bitmap::{Coverage, CoverageRange};
use crate::model::{LmState, ModelSet, OptionCollection, OptionId};
use crate::settings::Weights;

use super::future::FutureScoreTable;

/// Index of a hypothesis in its sentence arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HypId(u32);

/// Additive decomposition of an accumulated hypothesis score. Every
/// component is already weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub phrase: f32,
    pub lm: f32,
    pub distortion: f32,
    pub word_penalty: f32,
    pub extra: f32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f32 {
        self.phrase + self.lm + self.distortion + self.word_penalty + self.extra
    }
}

/// One partial translation: a node in the derivation forest.
///
/// Immutable once created — extension and scoring happen in a single step
/// (`HypothesisArena::extend`), so a hypothesis visible to ranking or
/// pruning always carries a finished score and estimate. The only field
/// written later is `alternative`, the recombination chain link, which
/// never affects scores.
pub struct Hypothesis {
    pub prev: Option<HypId>,
    /// Head option of the extension that created this hypothesis; linked
    /// group members are reachable through the option's `linked` list.
    pub option: Option<OptionId>,
    pub coverage: Coverage,
    pub last_range: Option<CoverageRange>,
    pub breakdown: ScoreBreakdown,
    /// Accumulated weighted model score, equal to `breakdown.total()`.
    pub score: f32,
    /// `score` plus the heuristic estimate for the uncovered remainder;
    /// the ranking and pruning key.
    pub estimate: f32,
    pub lm_state: LmState,
    /// Next-worse hypothesis with the same recombination key, kept when
    /// n-best output is requested.
    pub alternative: Option<HypId>,
}

impl Hypothesis {
    /// Hypotheses with equal keys are interchangeable for all future
    /// extensions. Keys are only compared within one container, which
    /// already fixes the coverage bitmap, so the key carries the
    /// end position (when the distortion model cares) and the LM state.
    pub fn recomb_key(&self, position_sensitive: bool) -> RecombKey {
        RecombKey {
            last_end: if position_sensitive {
                self.last_range.map(|r| r.end)
            } else {
                None
            },
            lm_state: self.lm_state.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecombKey {
    last_end: Option<usize>,
    lm_state: LmState,
}

/// Read-only references every extension needs. Bundled so cube edges and
/// the driver loop can thread them through as one argument.
pub struct ScoreContext<'a> {
    pub models: &'a ModelSet,
    pub weights: &'a Weights,
    pub options: &'a OptionCollection,
    pub future: &'a FutureScoreTable,
}

/// Sentence-scoped storage for the derivation forest. Back-pointers and
/// recombination chains are arena indices; dropping the arena releases the
/// whole forest at once, including hypotheses pruned out of every stack.
#[derive(Default)]
pub struct HypothesisArena {
    nodes: Vec<Hypothesis>,
}

impl HypothesisArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: HypId) -> &Hypothesis {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: HypId) -> &mut Hypothesis {
        &mut self.nodes[id.0 as usize]
    }

    fn push(&mut self, hypothesis: Hypothesis) -> HypId {
        let id = HypId(self.nodes.len() as u32);
        self.nodes.push(hypothesis);
        id
    }

    /// The empty initial hypothesis: nothing covered, score 0, estimate
    /// equal to the whole-sentence heuristic.
    pub fn root(&mut self, source_len: usize, ctx: &ScoreContext<'_>) -> HypId {
        let coverage = Coverage::empty(source_len);
        let estimate = ctx.future.estimate(&coverage);
        self.push(Hypothesis {
            prev: None,
            option: None,
            coverage,
            last_range: None,
            breakdown: ScoreBreakdown::default(),
            score: 0.0,
            estimate,
            lm_state: ctx.models.lm.begin_state(),
            alternative: None,
        })
    }

    /// Extend `base` with `option`, applying any linked group atomically.
    ///
    /// Returns `None` when the option's range — or any linked member's
    /// range — overlaps the running coverage: a partially applied group is
    /// illegal, so the whole extension fails without exposing an
    /// intermediate hypothesis. On success the new hypothesis is fully
    /// scored against the future table before it is returned.
    pub fn extend(
        &mut self,
        base: HypId,
        option: OptionId,
        ctx: &ScoreContext<'_>,
    ) -> Option<HypId> {
        let mut group = vec![option];
        group.extend(ctx.options.get(option).linked.iter().copied());

        let (base_coverage, mut breakdown, mut lm_state, mut prev_range) = {
            let base_hyp = self.get(base);
            (
                base_hyp.coverage.clone(),
                base_hyp.breakdown,
                base_hyp.lm_state.clone(),
                base_hyp.last_range,
            )
        };

        // validate the whole group before scoring anything
        let mut coverage = base_coverage.clone();
        for &member in &group {
            let range = ctx.options.get(member).range;
            if coverage.overlaps(range) {
                return None;
            }
            coverage = coverage.with_range(range);
        }

        let mut last_range = None;
        for &member in &group {
            let opt = ctx.options.get(member);
            breakdown.phrase += opt.score;

            let (lm_delta, next_state) = ctx.models.lm.transition(&lm_state, &opt.target);
            breakdown.lm += ctx.weights.lm * lm_delta;
            lm_state = next_state;

            breakdown.distortion +=
                ctx.weights.distortion * ctx.models.distortion.cost(prev_range, opt.range);
            breakdown.word_penalty -= ctx.weights.word_penalty * opt.target.len() as f32;

            for (idx, feature) in ctx.models.features.iter().enumerate() {
                let weight = ctx.weights.extra.get(idx).copied().unwrap_or(0.0);
                breakdown.extra += weight * feature.score_transition(&base_coverage, opt);
            }

            prev_range = Some(opt.range);
            last_range = Some(opt.range);
        }

        if coverage.is_full() {
            breakdown.lm += ctx.weights.lm * ctx.models.lm.end_transition(&lm_state);
        }

        let score = breakdown.total();
        let estimate = score + ctx.future.estimate(&coverage);
        Some(self.push(Hypothesis {
            prev: Some(base),
            option: Some(option),
            coverage,
            last_range,
            breakdown,
            score,
            estimate,
            lm_state,
            alternative: None,
        }))
    }
}
