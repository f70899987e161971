//! Property-based tests: structural invariants of decoding under randomly
//! generated option tables.

use proptest::prelude::*;

use crate::bitmap::CoverageRange;
use crate::model::{FeatureVector, LinearDistortion, OptionCollection};
use crate::search::testutil::{plain_models, test_config};
use crate::search::{Decoder, Translation};

/// Per-position option scores: sentence of 1..=4 words, 1..=3 scored
/// targets each. Integer-valued floats keep score sums exact.
fn arb_option_scores() -> impl Strategy<Value = Vec<Vec<i8>>> {
    prop::collection::vec(prop::collection::vec(-5i8..=5, 1..=3), 1..=4)
}

fn build_collection(scores: &[Vec<i8>], decoder: &Decoder) -> OptionCollection {
    let mut options = OptionCollection::new(scores.len());
    for (pos, position_scores) in scores.iter().enumerate() {
        for (alt, &score) in position_scores.iter().enumerate() {
            options.add(
                CoverageRange::new(pos, pos + 1),
                vec![format!("w{pos}_{alt}")],
                FeatureVector::single(score as f32),
            );
        }
    }
    options.rank(&decoder.config().weights);
    options
}

fn monotone_decoder() -> Decoder {
    let mut models = plain_models();
    models.distortion = Box::new(LinearDistortion::new(0));
    Decoder::new(models, test_config())
}

fn source_for(scores: &[Vec<i8>]) -> Vec<String> {
    (0..scores.len()).map(|pos| format!("s{pos}")).collect()
}

fn fingerprint(results: &[Translation]) -> Vec<(Vec<String>, u32)> {
    results
        .iter()
        .map(|t| (t.words.clone(), t.score.to_bits()))
        .collect()
}

proptest! {
    #[test]
    fn repeated_runs_are_identical(scores in arb_option_scores()) {
        let decoder = monotone_decoder();
        let options = build_collection(&scores, &decoder);
        let source = source_for(&scores);
        let first = decoder.decode_with_options(&source, &options, 8).unwrap();
        let second = decoder.decode_with_options(&source, &options, 8).unwrap();
        prop_assert_eq!(fingerprint(&first), fingerprint(&second));
    }

    #[test]
    fn one_best_achieves_per_position_maximum(scores in arb_option_scores()) {
        // monotone unigram decoding degenerates to picking the best option
        // per position, so the 1-best score is the sum of column maxima
        let decoder = monotone_decoder();
        let options = build_collection(&scores, &decoder);
        let source = source_for(&scores);
        let results = decoder.decode_with_options(&source, &options, 1).unwrap();
        prop_assert_eq!(results.len(), 1);
        let expected: f32 = scores
            .iter()
            .map(|position| position.iter().copied().max().unwrap() as f32)
            .sum();
        prop_assert!((results[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn spans_partition_the_source(scores in arb_option_scores()) {
        let decoder = monotone_decoder();
        let options = build_collection(&scores, &decoder);
        let source = source_for(&scores);
        let results = decoder.decode_with_options(&source, &options, 8).unwrap();
        prop_assert!(!results.is_empty());
        for translation in &results {
            let mut covered = vec![false; source.len()];
            for span in &translation.spans {
                for pos in span.source.start..span.source.end {
                    prop_assert!(!covered[pos], "position {} covered twice", pos);
                    covered[pos] = true;
                }
            }
            prop_assert!(covered.iter().all(|&c| c), "positions left uncovered");
        }
    }

    #[test]
    fn nbest_is_sorted_and_bounded(scores in arb_option_scores(), nbest in 1usize..6) {
        let decoder = monotone_decoder();
        let options = build_collection(&scores, &decoder);
        let source = source_for(&scores);
        let results = decoder.decode_with_options(&source, &options, nbest).unwrap();
        prop_assert!(results.len() <= nbest);
        for pair in results.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score, "n-best out of order");
        }
    }
}
