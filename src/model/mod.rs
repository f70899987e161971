//! External collaborators the search core consumes: phrase table, language
//! model, distortion model, and the open set of extra feature functions.
//! Each concern is a `Send + Sync` trait with an in-memory reference
//! implementation; production systems supply their own backends.

mod distortion;
mod features;
mod lm;
mod phrase;

pub use distortion::{DistortionModel, LinearDistortion, MonotoneDistortion};
pub use features::{FeatureFunction, FeatureVector};
pub use lm::{BigramLm, LanguageModel, LmState, UniformLm, BOS};
pub use phrase::{
    MemoryPhraseTable, OptionCollection, OptionId, PhraseTable, SpanOptions, TranslationOption,
};

/// Everything the decoder consumes from the surrounding system. Shared
/// read-only across decoding threads; per-sentence state lives in the
/// search core, never in the models.
pub struct ModelSet {
    pub phrase_table: Box<dyn PhraseTable>,
    pub lm: Box<dyn LanguageModel>,
    pub distortion: Box<dyn DistortionModel>,
    /// Extra feature functions, scored in registration order with the
    /// matching `weights.extra` entry.
    pub features: Vec<Box<dyn FeatureFunction>>,
}
