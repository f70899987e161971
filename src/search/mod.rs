//! Cube-pruning beam search over the coverage lattice.
//!
//! Decoding walks stacks indexed by the number of covered source words.
//! Containers group each stack's hypotheses by exact coverage bitmap and
//! collect inbound transitions as backwards edges; each edge lazily
//! explores its (predecessor × option) grid in approximately best-first
//! order. Admission into a stack is beam-pruned and recombines hypotheses
//! that are interchangeable for all future extensions.

mod container;
mod cube;
mod driver;
mod future;
mod hypothesis;
mod stack;
mod testutil;

#[cfg(test)]
mod tests;

pub use container::BitmapContainer;
pub use cube::{BackwardsEdge, CubeCell};
pub use driver::{trace_translation, DecodeError, Decoder, TranslatedSpan, Translation};
pub use future::FutureScoreTable;
pub use hypothesis::{
    HypId, Hypothesis, HypothesisArena, RecombKey, ScoreBreakdown, ScoreContext,
};
pub use stack::{Admission, HypothesisStack};
