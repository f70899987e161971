//! End-to-end decoding scenarios over toy model sets.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::bitmap::{Coverage, CoverageRange};
use crate::model::{
    BigramLm, FeatureFunction, FeatureVector, LinearDistortion, OptionCollection,
    TranslationOption, BOS,
};
use crate::search::testutil::{plain_models, test_config, unigram_table};
use crate::search::{DecodeError, Decoder, Translation};

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn surface(translation: &Translation) -> String {
    translation.words.join(" ")
}

#[test]
fn monotone_single_option_path() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 0.0)]),
        ("b", &[("B", 0.0)]),
        ("c", &[("C", 0.0)]),
    ]));
    models.distortion = Box::new(LinearDistortion::new(0));
    let decoder = Decoder::new(models, test_config());

    let results = decoder.decode(&words("a b c"), 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(surface(&results[0]), "A B C");
    assert_eq!(results[0].score, 0.0);
}

#[test]
fn monotone_single_option_path_has_single_derivation() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 0.0)]),
        ("b", &[("B", 0.0)]),
        ("c", &[("C", 0.0)]),
    ]));
    models.distortion = Box::new(LinearDistortion::new(0));
    let decoder = Decoder::new(models, test_config());

    // asking for more than exists must not fabricate paths
    let results = decoder.decode(&words("a b c"), 5).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn two_options_per_position_full_nbest() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 1.0), ("A'", 0.0)]),
        ("b", &[("B", 1.0), ("B'", 0.0)]),
    ]));
    // zero-score bigram model: scores stay put but target context keeps
    // alternative wordings apart during recombination
    models.lm = Box::new(BigramLm::new(0.0));
    models.distortion = Box::new(LinearDistortion::new(0));
    let mut config = test_config();
    config.search.pop_limit = 4;
    let decoder = Decoder::new(models, config);

    let results = decoder.decode(&words("a b"), 4).unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(surface(&results[0]), "A B");
    assert_eq!(results[0].score, 2.0);
    assert_eq!(surface(&results[3]), "A' B'");
    assert_eq!(results[3].score, 0.0);

    let middle: std::collections::HashSet<String> =
        [surface(&results[1]), surface(&results[2])].into();
    assert!(middle.contains("A B'"));
    assert!(middle.contains("A' B"));
    assert_eq!(results[1].score, 1.0);
    assert_eq!(results[2].score, 1.0);
}

#[test]
fn linked_group_translates_discontiguous_unit() {
    let mut models = plain_models();
    models.distortion = Box::new(LinearDistortion::new(-1));
    let config = test_config();

    let mut options = OptionCollection::new(3);
    options.add_linked_group(vec![
        (CoverageRange::new(0, 1), words("X"), FeatureVector::single(1.0)),
        (CoverageRange::new(2, 3), words("Y"), FeatureVector::single(2.0)),
    ]);
    options.add(CoverageRange::new(1, 2), words("Z"), FeatureVector::single(0.5));
    options.rank(&config.weights);

    let decoder = Decoder::new(models, config);
    let results = decoder
        .decode_with_options(&words("a b c"), &options, 1)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(surface(&results[0]), "X Z Y");
    assert!((results[0].score - 3.5).abs() < 1e-6);
    // alignment: each group member carries its own source span
    assert_eq!(results[0].spans[0].source, CoverageRange::new(0, 1));
    assert_eq!(results[0].spans[1].source, CoverageRange::new(1, 2));
    assert_eq!(results[0].spans[2].source, CoverageRange::new(2, 3));
}

#[test]
fn linked_group_never_partially_applied() {
    // the group spans more than what remains after covering c, so every
    // derivation either applies the whole group or avoids it
    let mut models = plain_models();
    models.distortion = Box::new(LinearDistortion::new(-1));
    let config = test_config();

    let mut options = OptionCollection::new(3);
    options.add_linked_group(vec![
        (CoverageRange::new(0, 1), words("X"), FeatureVector::single(-1.0)),
        (CoverageRange::new(1, 2), words("Y"), FeatureVector::single(-1.0)),
        (CoverageRange::new(2, 3), words("Z'"), FeatureVector::single(-1.0)),
    ]);
    options.add(CoverageRange::new(0, 1), words("A"), FeatureVector::single(0.0));
    options.add(CoverageRange::new(1, 2), words("B"), FeatureVector::single(0.0));
    options.add(CoverageRange::new(2, 3), words("C"), FeatureVector::single(0.0));
    options.rank(&config.weights);

    let decoder = Decoder::new(models, config);
    let results = decoder
        .decode_with_options(&words("a b c"), &options, 10)
        .unwrap();
    assert_eq!(surface(&results[0]), "A B C");
    for translation in &results {
        let s = surface(translation);
        let has_x = s.contains('X');
        let has_y = s.contains('Y');
        let has_z = s.contains("Z'");
        assert!(
            has_x == has_y && has_y == has_z,
            "partially applied group in {s:?}"
        );
    }
}

#[test]
fn recombination_exposes_alternative_only_with_nbest() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[("a", &[("A", 5.0), ("A'", 3.0)])]));
    let decoder = Decoder::new(models, test_config());

    // the uniform LM collapses both wordings onto one representative
    let one_best = decoder.decode(&words("a"), 1).unwrap();
    assert_eq!(one_best.len(), 1);
    assert_eq!(surface(&one_best[0]), "A");
    assert_eq!(one_best[0].score, 5.0);

    let two_best = decoder.decode(&words("a"), 2).unwrap();
    assert_eq!(two_best.len(), 2);
    assert_eq!(surface(&two_best[1]), "A'");
    assert_eq!(two_best[1].score, 3.0);
}

#[test]
fn non_monotone_lm_candidate_recovered_by_successor_expansion() {
    // static option order ranks P first, but its LM delta drops cell
    // (0, 0) to 2.0 while (0, 1) scores 4.0 — the cube pops the worse
    // cell first and must still surface the better successor
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[("a", &[("P", 5.0), ("Q", 4.0)])]));
    let mut lm = BigramLm::new(0.0);
    lm.set(BOS, "P", -3.0);
    lm.set(BOS, "Q", 0.0);
    models.lm = Box::new(lm);
    let decoder = Decoder::new(models, test_config());

    let results = decoder.decode(&words("a"), 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(surface(&results[0]), "Q");
    assert_eq!(results[0].score, 4.0);
    assert_eq!(surface(&results[1]), "P");
    assert_eq!(results[1].score, 2.0);
}

#[test]
fn empty_source_yields_single_empty_translation() {
    let decoder = Decoder::new(plain_models(), test_config());
    let results = decoder.decode(&[], 1).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].words.is_empty());
    assert_eq!(results[0].score, 0.0);
}

#[test]
fn pop_limit_one_still_finds_a_path() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 1.0), ("A'", 0.0)]),
        ("b", &[("B", 1.0), ("B'", 0.0)]),
    ]));
    models.lm = Box::new(BigramLm::new(0.0));
    models.distortion = Box::new(LinearDistortion::new(0));
    let mut config = test_config();
    config.search.pop_limit = 1;
    let decoder = Decoder::new(models, config);

    let results = decoder.decode(&words("a b"), 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(surface(&results[0]), "A B");
    assert_eq!(results[0].score, 2.0);
}

#[test]
fn empty_search_returns_empty_nbest() {
    let mut models = plain_models();
    // no options for "b": nothing reaches full coverage
    models.phrase_table = Box::new(unigram_table(&[("a", &[("A", 0.0)])]));
    let decoder = Decoder::new(models, test_config());
    let results = decoder.decode(&words("a b"), 5).unwrap();
    assert!(results.is_empty());
}

#[test]
fn nbest_zero_returns_nothing() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[("a", &[("A", 0.0)])]));
    let decoder = Decoder::new(models, test_config());
    assert!(decoder.decode(&words("a"), 0).unwrap().is_empty());
}

#[test]
fn repeated_decodes_are_bitwise_identical() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 1.25), ("A'", 1.0), ("A''", 0.75)]),
        ("b", &[("B", 0.5), ("B'", 0.25)]),
        ("c", &[("C", 2.0), ("C'", 1.5)]),
    ]));
    let mut lm = BigramLm::new(-0.125);
    lm.set(BOS, "A", -0.25);
    lm.set("A", "B", -0.5);
    lm.set("B", "C", -0.0625);
    lm.set_eos("C", -0.125);
    models.lm = Box::new(lm);
    models.distortion = Box::new(LinearDistortion::new(2));
    let mut config = test_config();
    config.weights.distortion = 1.0;
    let decoder = Decoder::new(models, config);

    let fingerprint = |results: &[Translation]| -> Vec<(String, u32)> {
        results
            .iter()
            .map(|t| (surface(t), t.score.to_bits()))
            .collect()
    };

    let first = decoder.decode(&words("a b c"), 10).unwrap();
    let second = decoder.decode(&words("a b c"), 10).unwrap();
    assert!(!first.is_empty());
    assert_eq!(fingerprint(&first), fingerprint(&second));
}

#[test]
fn one_best_rescores_to_its_recorded_score() {
    let mut models = plain_models();
    let mut lm = BigramLm::new(0.0);
    lm.set(BOS, "X1", -0.2);
    lm.set("X1", "Y1", -0.1);
    lm.set_eos("Y1", -0.4);
    models.lm = Box::new(lm);
    models.distortion = Box::new(LinearDistortion::new(0));
    let config = test_config();

    let mut options = OptionCollection::new(2);
    options.add(CoverageRange::new(0, 1), words("X1"), FeatureVector::single(1.0));
    options.add(CoverageRange::new(0, 1), words("X2"), FeatureVector::single(0.5));
    options.add(CoverageRange::new(1, 2), words("Y1"), FeatureVector::single(0.3));
    options.rank(&config.weights);

    let decoder = Decoder::new(models, config);
    let results = decoder
        .decode_with_options(&words("x y"), &options, 1)
        .unwrap();
    let best = &results[0];
    assert_eq!(surface(best), "X1 Y1");

    // replay the monotone derivation through the same models
    let lm = &decoder.models().lm;
    let weights = &decoder.config().weights;
    let mut state = lm.begin_state();
    let mut rescored = 0.0f32;
    for span in &best.spans {
        let option = find_option(&options, span);
        rescored += option.score;
        let (delta, next) = lm.transition(&state, &span.target);
        rescored += weights.lm * delta;
        state = next;
    }
    rescored += weights.lm * lm.end_transition(&state);
    assert!(
        (rescored - best.score).abs() < 1e-5,
        "rescored {rescored} vs recorded {}",
        best.score
    );
}

fn find_option<'a>(
    options: &'a OptionCollection,
    span: &crate::search::TranslatedSpan,
) -> &'a TranslationOption {
    for candidate in options.spans_from(span.source.start) {
        if candidate.end == span.source.end {
            for &id in &candidate.ranked {
                if options.get(id).target == span.target {
                    return options.get(id);
                }
            }
        }
    }
    panic!("no option for span {:?}", span.source);
}

#[test]
fn cancellation_aborts_before_output() {
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[("a", &[("A", 0.0)])]));
    let decoder = Decoder::new(models, test_config());

    let cancel = AtomicBool::new(true);
    let err = decoder
        .decode_cancellable(&words("a"), 1, &cancel)
        .unwrap_err();
    assert!(matches!(err, DecodeError::Canceled));

    let cancel = AtomicBool::new(false);
    let results = decoder.decode_cancellable(&words("a"), 1, &cancel).unwrap();
    assert_eq!(results.len(), 1);
}

#[derive(Default)]
struct FeatureCounters {
    inits: AtomicUsize,
    cleanups: AtomicUsize,
}

/// Charges a constant per applied option and counts lifecycle calls.
struct CountingFeature {
    counters: std::sync::Arc<FeatureCounters>,
}

impl FeatureFunction for CountingFeature {
    fn name(&self) -> &str {
        "counting"
    }

    fn init_for_sentence(&self, _source: &[String]) {
        self.counters.inits.fetch_add(1, Ordering::Relaxed);
    }

    fn score_transition(&self, _prev: &Coverage, _option: &TranslationOption) -> f32 {
        -1.0
    }

    fn cleanup(&self) {
        self.counters.cleanups.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn registered_feature_functions_score_and_observe_lifecycle() {
    let counters = std::sync::Arc::new(FeatureCounters::default());
    let mut models = plain_models();
    models.phrase_table = Box::new(unigram_table(&[
        ("a", &[("A", 0.0)]),
        ("b", &[("B", 0.0)]),
    ]));
    models.distortion = Box::new(LinearDistortion::new(0));
    models.features.push(Box::new(CountingFeature {
        counters: counters.clone(),
    }));
    let mut config = test_config();
    config.weights.extra = vec![2.0];
    let decoder = Decoder::new(models, config);

    let results = decoder.decode(&words("a b"), 1).unwrap();
    assert_eq!(results.len(), 1);
    // two applied options at -1.0 each, weighted by 2.0
    assert_eq!(results[0].score, -4.0);
    assert_eq!(results[0].breakdown.extra, -4.0);
    assert_eq!(counters.inits.load(Ordering::Relaxed), 1);
    assert_eq!(counters.cleanups.load(Ordering::Relaxed), 1);
}
