//! Per-run context threaded through every pipeline stage.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::Span;

/// Identity and tracing span of one analysis run.
pub struct RunContext {
    pub run_id: String,
    pub root: PathBuf,
    pub span: Span,
}

impl RunContext {
    pub fn new(root: &Path) -> Self {
        let run_id = make_run_id(root);
        let span = tracing::info_span!("analyze", run_id = %run_id, root = %root.display());
        Self {
            run_id,
            root: root.to_path_buf(),
            span,
        }
    }

    /// Child span for one pipeline stage.
    pub fn stage(&self, name: &'static str) -> Span {
        tracing::info_span!(parent: &self.span, "stage", stage = name)
    }
}

fn make_run_id(root: &Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(nanos.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let ctx = RunContext::new(Path::new("/tmp/repo"));
        assert_eq!(ctx.run_id.len(), 16);
        assert!(ctx.run_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ctx.root, PathBuf::from("/tmp/repo"));
    }
}
