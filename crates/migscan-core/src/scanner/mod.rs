//! Stage 1: file inventory.

pub mod classifier;
pub mod filesystem;

pub use classifier::classify;
pub use filesystem::{scan_repository, ScannedFile};
