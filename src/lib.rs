//! Phrase-based translation decoding with cube pruning.
//!
//! The `search` module holds the per-sentence beam search core; `model`
//! holds the interfaces the core consumes from the surrounding system
//! (phrase table, language model, distortion model, feature functions)
//! together with in-memory reference implementations.

pub mod bitmap;
pub mod model;
pub mod search;
pub mod settings;
pub mod trace_init;
