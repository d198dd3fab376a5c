//! Error types for the migscan core library.

use std::path::PathBuf;

/// Top-level error enum for the migscan core library.
///
/// Per-file problems (unreadable files, malformed XML, bad patterns) are
/// recorded on the affected records and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum MigscanError {
    #[error("Invalid repository root: {0}")]
    InvalidRoot(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MigscanResult<T> = Result<T, MigscanError>;
