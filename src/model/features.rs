use crate::bitmap::Coverage;

use super::phrase::TranslationOption;

/// Raw per-option feature scores from the phrase table, in table column
/// order. Collapsed into a single score via `Weights::phrase_score`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// A one-column vector, the common case for toy tables.
    pub fn single(value: f32) -> Self {
        Self(vec![value])
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

/// An open-set scoring capability attached to the decoder at construction.
///
/// Implementations are registered in the `ModelSet` and iterated in
/// registration order, so scores are reproducible across runs. Stateful
/// implementations must use interior mutability; the registry is shared
/// read-only across decoding threads.
pub trait FeatureFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Called once before decoding each sentence, in registration order.
    fn init_for_sentence(&self, _source: &[String]) {}

    /// Unweighted score contribution for applying `option` to a hypothesis
    /// with the given coverage.
    fn score_transition(&self, prev_coverage: &Coverage, option: &TranslationOption) -> f32;

    /// Called once after the sentence completes, in registration order.
    fn cleanup(&self) {}
}
