use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, debug_span};

use crate::bitmap::{Coverage, CoverageRange};
use crate::model::{ModelSet, OptionCollection, OptionId};
use crate::settings::DecoderConfig;

use super::cube::BackwardsEdge;
use super::future::FutureScoreTable;
use super::hypothesis::{HypId, HypothesisArena, ScoreBreakdown, ScoreContext};
use super::stack::HypothesisStack;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decoding was canceled")]
    Canceled,
    #[error("search invariant violated: {0}")]
    Invariant(String),
}

/// One aligned span of a finished translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSpan {
    pub source: CoverageRange,
    pub target: Vec<String>,
}

/// A finished translation, recovered by walking back-pointers from a
/// full-coverage hypothesis. Spans are ordered by source position, which
/// also linearises discontiguous linked units around later fills.
#[derive(Debug, Clone)]
pub struct Translation {
    pub words: Vec<String>,
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub spans: Vec<TranslatedSpan>,
}

/// Per-corpus decoder: immutable models and configuration. All per-sentence
/// state (arena, stacks, containers, edges) is created inside each call, so
/// one decoder can serve independent sentences from parallel threads.
pub struct Decoder {
    models: ModelSet,
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(models: ModelSet, config: DecoderConfig) -> Self {
        Self { models, config }
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a sentence, building the option collection from the phrase
    /// table. Returns up to `nbest` translations, best first; empty when no
    /// hypothesis reaches full coverage.
    pub fn decode(&self, source: &[String], nbest: usize) -> Result<Vec<Translation>, DecodeError> {
        let options = OptionCollection::from_table(
            &*self.models.phrase_table,
            source,
            self.config.search.max_phrase_len,
            &self.config.weights,
        );
        self.run(source, &options, nbest, None)
    }

    /// Decode with a caller-assembled option collection (e.g. carrying
    /// linked groups injected by input markup). The collection must be
    /// ranked and sized for this sentence.
    pub fn decode_with_options(
        &self,
        source: &[String],
        options: &OptionCollection,
        nbest: usize,
    ) -> Result<Vec<Translation>, DecodeError> {
        self.run(source, options, nbest, None)
    }

    /// Like `decode`, but checks `cancel` between stack expansions and
    /// between container expansions. A canceled sentence produces
    /// `DecodeError::Canceled` and no output.
    pub fn decode_cancellable(
        &self,
        source: &[String],
        nbest: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<Translation>, DecodeError> {
        let options = OptionCollection::from_table(
            &*self.models.phrase_table,
            source,
            self.config.search.max_phrase_len,
            &self.config.weights,
        );
        self.run(source, &options, nbest, Some(cancel))
    }

    fn run(
        &self,
        source: &[String],
        options: &OptionCollection,
        nbest: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Translation>, DecodeError> {
        let source_len = source.len();
        let _span = debug_span!("decode", source_len, nbest).entered();

        if options.source_len() != source_len {
            return Err(DecodeError::Invariant(format!(
                "option collection sized for {} source words, sentence has {source_len}",
                options.source_len()
            )));
        }
        if !options.is_ranked() {
            return Err(DecodeError::Invariant(
                "option collection must be ranked before decoding".to_string(),
            ));
        }
        if nbest == 0 {
            return Ok(Vec::new());
        }

        let future = FutureScoreTable::build(options);
        for feature in &self.models.features {
            feature.init_for_sentence(source);
        }
        let ctx = ScoreContext {
            models: &self.models,
            weights: &self.config.weights,
            options,
            future: &future,
        };

        let search = &self.config.search;
        let keep_alternatives = nbest > 1;
        let position_sensitive = self.models.distortion.position_sensitive();

        let mut arena = HypothesisArena::new();
        let mut stacks: Vec<HypothesisStack> = (0..=source_len)
            .map(|p| {
                HypothesisStack::new(p, search.beam_width, search.stack_size, position_sensitive)
            })
            .collect();

        let root = arena.root(source_len, &ctx);
        let result = (|| {
            stacks[0].admit(root, &mut arena, keep_alternatives)?;

            for popcount in 0..=source_len {
                if is_canceled(cancel) {
                    return Err(DecodeError::Canceled);
                }

                let container_count = stacks[popcount].container_count();
                let mut popped = 0;
                for index in 0..container_count {
                    if is_canceled(cancel) {
                        return Err(DecodeError::Canceled);
                    }
                    popped += stacks[popcount].expand_container(
                        index,
                        &mut arena,
                        &ctx,
                        search.pop_limit,
                        keep_alternatives,
                    )?;
                }
                debug!(
                    stack = popcount,
                    containers = container_count,
                    popped,
                    admitted = stacks[popcount].len(),
                    "stack expanded"
                );

                if popcount < source_len {
                    attach_edges(popcount, &mut stacks, &ctx, search.cube_width);
                }
            }
            Ok(())
        })();

        for feature in &self.models.features {
            feature.cleanup();
        }
        result?;

        Ok(collect_nbest(
            &stacks[source_len],
            &arena,
            options,
            nbest,
            keep_alternatives,
        ))
    }
}

fn is_canceled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Attach a backwards edge for every legal transition out of the (now
/// final) stack at `popcount`. Positions before the first uncovered one are
/// covered by definition, and the distortion window caps how far past it an
/// extension may start.
///
/// A span's options are partitioned by the coverage they produce: linked
/// groups reach past the span itself, so they target a different container
/// (and possibly a different stack) than the span's plain options. Options
/// whose group clashes with the container's coverage can never apply and
/// get no edge at all.
fn attach_edges(
    popcount: usize,
    stacks: &mut [HypothesisStack],
    ctx: &ScoreContext<'_>,
    cube_width: usize,
) {
    let source_len = ctx.options.source_len();
    let max_distortion = ctx.models.distortion.max_distortion();

    let (lower, upper) = stacks.split_at_mut(popcount + 1);
    let source_stack = &lower[popcount];

    for container in source_stack.containers() {
        if container.is_empty() {
            continue;
        }
        let coverage = container.coverage();
        let Some(gap) = coverage.first_uncovered() else {
            continue;
        };

        for start in gap..source_len {
            if max_distortion >= 0 && start > gap + max_distortion as usize {
                break;
            }
            for span in ctx.options.spans_from(start) {
                let mut by_coverage: Vec<(Coverage, Vec<OptionId>)> = Vec::new();
                'options: for &id in &span.ranked {
                    let mut next_coverage = coverage.clone();
                    let head = ctx.options.get(id);
                    for member in std::iter::once(&id).chain(head.linked.iter()) {
                        let range = ctx.options.get(*member).range;
                        if next_coverage.overlaps(range) {
                            continue 'options;
                        }
                        next_coverage = next_coverage.with_range(range);
                    }
                    match by_coverage.iter_mut().find(|(cov, _)| *cov == next_coverage) {
                        Some((_, ids)) => ids.push(id),
                        None => by_coverage.push((next_coverage, vec![id])),
                    }
                }

                for (next_coverage, ranked) in by_coverage {
                    let next_popcount = next_coverage.count();
                    let target = &mut upper[next_popcount - popcount - 1];
                    let index = target.container_index(&next_coverage);
                    let edge = BackwardsEdge::new(container.hypotheses(), &ranked, cube_width);
                    target.container_mut(index).add_edge(edge);
                }
            }
        }
    }
}

/// Full-coverage representatives plus (when requested) their recombination
/// chains, best score first. Ties keep discovery order.
fn collect_nbest(
    final_stack: &HypothesisStack,
    arena: &HypothesisArena,
    options: &OptionCollection,
    nbest: usize,
    keep_alternatives: bool,
) -> Vec<Translation> {
    let mut finals: Vec<HypId> = Vec::new();
    for container in final_stack.containers() {
        for &hyp in container.hypotheses() {
            finals.push(hyp);
            if keep_alternatives {
                let mut alt = arena.get(hyp).alternative;
                while let Some(id) = alt {
                    finals.push(id);
                    alt = arena.get(id).alternative;
                }
            }
        }
    }
    finals.sort_by(|&a, &b| arena.get(b).score.total_cmp(&arena.get(a).score));
    finals.truncate(nbest);
    finals
        .into_iter()
        .map(|hyp| trace_translation(arena, options, hyp))
        .collect()
}

/// Walk back-pointers to reconstruct the derivation, then order spans by
/// source position. Each linked group contributes one span per member, so
/// a later fill between a discontiguous pair lands between their targets.
pub fn trace_translation(
    arena: &HypothesisArena,
    options: &OptionCollection,
    hyp: HypId,
) -> Translation {
    let mut spans: Vec<TranslatedSpan> = Vec::new();
    let mut current = hyp;
    loop {
        let node = arena.get(current);
        if let Some(head) = node.option {
            let mut group = vec![head];
            group.extend(options.get(head).linked.iter().copied());
            for member in group {
                let opt = options.get(member);
                spans.push(TranslatedSpan {
                    source: opt.range,
                    target: opt.target.clone(),
                });
            }
        }
        match node.prev {
            Some(prev) => current = prev,
            None => break,
        }
    }
    spans.sort_by_key(|span| span.source.start);

    let node = arena.get(hyp);
    Translation {
        words: spans.iter().flat_map(|s| s.target.iter().cloned()).collect(),
        score: node.score,
        breakdown: node.breakdown,
        spans,
    }
}
