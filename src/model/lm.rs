use std::collections::HashMap;

/// Opaque language-model context: the target-side suffix the model
/// conditions on. Hypotheses with equal states are interchangeable for all
/// future LM scoring, so the state participates in recombination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LmState(Vec<String>);

impl LmState {
    pub fn new(words: Vec<String>) -> Self {
        Self(words)
    }

    pub fn words(&self) -> &[String] {
        &self.0
    }
}

/// Target-side language model. Scores are log-probabilities: higher is
/// better, deltas are added into the hypothesis score under the LM weight.
pub trait LanguageModel: Send + Sync {
    /// Context state of the empty hypothesis.
    fn begin_state(&self) -> LmState;

    /// Score appending `words` to a hypothesis in `state`; returns the
    /// log-probability delta and the successor state.
    fn transition(&self, state: &LmState, words: &[String]) -> (f32, LmState);

    /// Sentence-end delta, applied once when coverage completes.
    fn end_transition(&self, _state: &LmState) -> f32 {
        0.0
    }
}

/// Zero-cost model with an empty context. With this model the LM never
/// distinguishes hypotheses, so recombination collapses paths that differ
/// only in target wording.
pub struct UniformLm;

impl LanguageModel for UniformLm {
    fn begin_state(&self) -> LmState {
        LmState::default()
    }

    fn transition(&self, _state: &LmState, _words: &[String]) -> (f32, LmState) {
        (0.0, LmState::default())
    }
}

/// Sentence-boundary marker used by [`BigramLm`].
pub const BOS: &str = "<s>";

/// Bigram model over an in-memory pair table, with a one-word context
/// state. Pairs missing from the table score `default`.
pub struct BigramLm {
    pairs: HashMap<(String, String), f32>,
    eos: HashMap<String, f32>,
    default: f32,
}

impl BigramLm {
    pub fn new(default: f32) -> Self {
        Self {
            pairs: HashMap::new(),
            eos: HashMap::new(),
            default,
        }
    }

    pub fn set(&mut self, prev: &str, word: &str, score: f32) {
        self.pairs.insert((prev.to_string(), word.to_string()), score);
    }

    pub fn set_eos(&mut self, word: &str, score: f32) {
        self.eos.insert(word.to_string(), score);
    }

    fn pair_score(&self, prev: &str, word: &str) -> f32 {
        self.pairs
            .get(&(prev.to_string(), word.to_string()))
            .copied()
            .unwrap_or(self.default)
    }
}

impl LanguageModel for BigramLm {
    fn begin_state(&self) -> LmState {
        LmState::new(vec![BOS.to_string()])
    }

    fn transition(&self, state: &LmState, words: &[String]) -> (f32, LmState) {
        let mut prev = state
            .words()
            .last()
            .cloned()
            .unwrap_or_else(|| BOS.to_string());
        let mut delta = 0.0;
        for word in words {
            delta += self.pair_score(&prev, word);
            prev = word.clone();
        }
        (delta, LmState::new(vec![prev]))
    }

    fn end_transition(&self, state: &LmState) -> f32 {
        state
            .words()
            .last()
            .and_then(|w| self.eos.get(w))
            .copied()
            .unwrap_or(0.0)
    }
}
