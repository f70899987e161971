use std::collections::HashMap;

use crate::bitmap::CoverageRange;
use crate::settings::Weights;

use super::features::FeatureVector;

/// Index of a translation option within its sentence collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionId(pub(crate) u32);

/// A precomputed target phrase for one source span.
#[derive(Debug, Clone)]
pub struct TranslationOption {
    pub range: CoverageRange,
    pub target: Vec<String>,
    pub features: FeatureVector,
    /// Weighted feature score, cached when the collection is ranked.
    pub score: f32,
    /// Other members of an atomic group, in application order. A linked
    /// group translates a discontiguous source unit; applying any member
    /// applies them all or fails.
    pub linked: Vec<OptionId>,
}

/// Ranked options sharing one source span.
#[derive(Debug, Clone)]
pub struct SpanOptions {
    pub end: usize,
    /// Option ids sorted by descending weighted score, ties in insertion order.
    pub ranked: Vec<OptionId>,
}

/// All translation options for one sentence, ranked and immutable during
/// search. Options are arena-stored and addressed by [`OptionId`] so that
/// hypotheses and cube edges carry compact indices instead of references.
pub struct OptionCollection {
    source_len: usize,
    options: Vec<TranslationOption>,
    /// by_start[s] = spans starting at s, ascending by end. Built by `rank`.
    by_start: Vec<Vec<SpanOptions>>,
    ranked: bool,
}

impl OptionCollection {
    pub fn new(source_len: usize) -> Self {
        Self {
            source_len,
            options: Vec::new(),
            by_start: vec![Vec::new(); source_len],
            ranked: false,
        }
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, id: OptionId) -> &TranslationOption {
        &self.options[id.0 as usize]
    }

    /// Add a standalone option. Scores are filled in by `rank`.
    pub fn add(
        &mut self,
        range: CoverageRange,
        target: Vec<String>,
        features: FeatureVector,
    ) -> OptionId {
        debug_assert!(range.end <= self.source_len);
        let id = OptionId(self.options.len() as u32);
        self.options.push(TranslationOption {
            range,
            target,
            features,
            score: 0.0,
            linked: Vec::new(),
        });
        self.ranked = false;
        id
    }

    /// Add an atomic group of options translating a discontiguous unit.
    /// Every member is linked to the others in group order, so applying any
    /// one of them applies the whole group.
    pub fn add_linked_group(
        &mut self,
        parts: Vec<(CoverageRange, Vec<String>, FeatureVector)>,
    ) -> Vec<OptionId> {
        let ids: Vec<OptionId> = parts
            .into_iter()
            .map(|(range, target, features)| self.add(range, target, features))
            .collect();
        for &id in &ids {
            let linked: Vec<OptionId> = ids.iter().copied().filter(|&o| o != id).collect();
            self.options[id.0 as usize].linked = linked;
        }
        ids
    }

    /// Compute weighted scores and rank every span's options descending.
    /// Must be called before the collection is handed to the search core.
    pub fn rank(&mut self, weights: &Weights) {
        for option in &mut self.options {
            option.score = weights.phrase_score(&option.features);
        }

        for spans in &mut self.by_start {
            spans.clear();
        }
        for (idx, option) in self.options.iter().enumerate() {
            let start = option.range.start;
            let end = option.range.end;
            let spans = &mut self.by_start[start];
            match spans.iter_mut().find(|s| s.end == end) {
                Some(span) => span.ranked.push(OptionId(idx as u32)),
                None => spans.push(SpanOptions {
                    end,
                    ranked: vec![OptionId(idx as u32)],
                }),
            }
        }
        let options = &self.options;
        for spans in &mut self.by_start {
            spans.sort_by_key(|s| s.end);
            for span in spans.iter_mut() {
                // stable sort keeps insertion order among equal scores
                span.ranked.sort_by(|&a, &b| {
                    let sa = options[a.0 as usize].score;
                    let sb = options[b.0 as usize].score;
                    sb.total_cmp(&sa)
                });
            }
        }
        self.ranked = true;
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked
    }

    /// Spans starting at `start`, ascending by end position.
    pub fn spans_from(&self, start: usize) -> &[SpanOptions] {
        &self.by_start[start]
    }

    /// Build a ranked collection by querying a phrase table for every span
    /// up to `max_phrase_len`.
    pub fn from_table(
        table: &dyn PhraseTable,
        source: &[String],
        max_phrase_len: usize,
        weights: &Weights,
    ) -> Self {
        let mut collection = Self::new(source.len());
        for start in 0..source.len() {
            let max_end = (start + max_phrase_len).min(source.len());
            for end in start + 1..=max_end {
                let range = CoverageRange::new(start, end);
                for (target, features) in table.lookup(source, range) {
                    collection.add(range, target, features);
                }
            }
        }
        collection.rank(weights);
        collection
    }
}

/// Source of translation options, queried once per sentence before search
/// starts. Linked groups come from the orchestrator (e.g. markup on the
/// input), not from table lookups, and are added to the collection directly.
pub trait PhraseTable: Send + Sync {
    /// All translations of `source[range]`, each with its raw feature scores.
    fn lookup(&self, source: &[String], range: CoverageRange)
        -> Vec<(Vec<String>, FeatureVector)>;
}

/// In-memory phrase table keyed by the source phrase.
pub struct MemoryPhraseTable {
    entries: HashMap<Vec<String>, Vec<(Vec<String>, FeatureVector)>>,
}

impl MemoryPhraseTable {
    pub fn from_entries(
        entries: impl IntoIterator<Item = (Vec<String>, Vec<(Vec<String>, FeatureVector)>)>,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl PhraseTable for MemoryPhraseTable {
    fn lookup(
        &self,
        source: &[String],
        range: CoverageRange,
    ) -> Vec<(Vec<String>, FeatureVector)> {
        self.entries
            .get(&source[range.start..range.end])
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DecoderConfig;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn rank_sorts_descending_with_stable_ties() {
        let weights = DecoderConfig::default().weights;
        let mut collection = OptionCollection::new(2);
        let low = collection.add(CoverageRange::new(0, 1), words("x"), FeatureVector::single(1.0));
        let high = collection.add(CoverageRange::new(0, 1), words("y"), FeatureVector::single(3.0));
        let tie_a = collection.add(CoverageRange::new(0, 1), words("z"), FeatureVector::single(1.0));
        collection.rank(&weights);

        let spans = collection.spans_from(0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].ranked, vec![high, low, tie_a]);
        assert_eq!(collection.get(high).score, 3.0);
    }

    #[test]
    fn spans_from_orders_by_end() {
        let weights = DecoderConfig::default().weights;
        let mut collection = OptionCollection::new(3);
        collection.add(CoverageRange::new(0, 3), words("long"), FeatureVector::single(0.0));
        collection.add(CoverageRange::new(0, 1), words("short"), FeatureVector::single(0.0));
        collection.rank(&weights);

        let ends: Vec<usize> = collection.spans_from(0).iter().map(|s| s.end).collect();
        assert_eq!(ends, vec![1, 3]);
    }

    #[test]
    fn linked_group_members_reference_each_other() {
        let mut collection = OptionCollection::new(3);
        let ids = collection.add_linked_group(vec![
            (CoverageRange::new(0, 1), words("X"), FeatureVector::single(1.0)),
            (CoverageRange::new(2, 3), words("Y"), FeatureVector::single(2.0)),
        ]);
        assert_eq!(collection.get(ids[0]).linked, vec![ids[1]]);
        assert_eq!(collection.get(ids[1]).linked, vec![ids[0]]);
    }

    #[test]
    fn from_table_covers_all_spans_up_to_limit() {
        let weights = DecoderConfig::default().weights;
        let table = MemoryPhraseTable::from_entries(vec![
            (words("a"), vec![(words("A"), FeatureVector::single(0.0))]),
            (words("a b"), vec![(words("AB"), FeatureVector::single(1.0))]),
            (words("b"), vec![(words("B"), FeatureVector::single(0.0))]),
        ]);
        let source = words("a b");
        let collection = OptionCollection::from_table(&table, &source, 7, &weights);
        assert_eq!(collection.len(), 3);
        assert!(collection.is_ranked());
        // span [0,2) exists alongside the two unigram spans
        assert_eq!(collection.spans_from(0).len(), 2);
        assert_eq!(collection.spans_from(1).len(), 1);
    }
}
