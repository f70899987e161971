#![cfg(test)]

use crate::model::{
    FeatureVector, MemoryPhraseTable, ModelSet, MonotoneDistortion, UniformLm,
};
use crate::settings::{DecoderConfig, Weights};

/// Weights used across search tests: phrase and LM at 1, reordering and
/// length features switched off so expected scores reduce to option sums.
pub fn test_weights() -> Weights {
    Weights {
        phrase: vec![1.0],
        lm: 1.0,
        distortion: 0.0,
        word_penalty: 0.0,
        extra: Vec::new(),
    }
}

/// Config with `test_weights` and an effectively unbounded beam.
pub fn test_config() -> DecoderConfig {
    let mut config = DecoderConfig::default();
    config.weights = test_weights();
    config
}

/// Model set with a uniform LM, no reordering preference, an empty feature
/// registry, and an empty phrase table. Tests that need a table or a real
/// LM swap the field.
pub fn plain_models() -> ModelSet {
    ModelSet {
        phrase_table: Box::new(MemoryPhraseTable::from_entries(Vec::new())),
        lm: Box::new(UniformLm),
        distortion: Box::new(MonotoneDistortion),
        features: Vec::new(),
    }
}

/// Phrase table mapping each source word to scored single-word targets.
pub fn unigram_table(entries: &[(&str, &[(&str, f32)])]) -> MemoryPhraseTable {
    MemoryPhraseTable::from_entries(entries.iter().map(|(source, targets)| {
        (
            vec![source.to_string()],
            targets
                .iter()
                .map(|&(target, score)| {
                    (vec![target.to_string()], FeatureVector::single(score))
                })
                .collect(),
        )
    }))
}
