//! Stage 5: repository and per-document complexity scores.

pub mod complexity;

pub use complexity::{score_repository, ScoringInputs};
