//! Repository walking, filtering, reading, and hashing.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::errors::{MigscanError, MigscanResult};
use crate::models::{FileEntry, FileKind, ParseStatus};
use crate::scanner::classifier::{classify, extension_of, CLASSIFY_HEAD_BYTES};

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", ".svn", ".hg"];

const BINARY_EXTENSIONS: &[&str] = &[
    "jar", "class", "so", "dll", "exe", "zip", "tar", "gz", "7z", "parquet", "orc", "avro",
    "snappy", "zst", "png", "jpg", "jpeg", "gif", "pdf", "docx", "pptx", "xlsx",
];

/// Bytes inspected for a NUL when sniffing binary content.
const SNIFF_BYTES: usize = 8 * 1024;

/// One inventory entry plus its decoded text, when it was read.
#[derive(Clone, Debug)]
pub struct ScannedFile {
    pub entry: FileEntry,
    pub content: Option<String>,
}

impl ScannedFile {
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn kind(&self) -> FileKind {
        self.entry.kind
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }
}

// ---------------------------------------------------------------------------
// Glob rules
// ---------------------------------------------------------------------------

struct GlobRules {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl GlobRules {
    fn new(config: &ScanConfig) -> Self {
        let include = if config.include_globs.is_empty() {
            None
        } else {
            Some(build_globset(&config.include_globs))
        };
        Self {
            include,
            exclude: build_globset(&config.exclude_globs),
        }
    }

    fn dir_excluded(&self, rel_dir: &str, name: &str) -> bool {
        self.exclude.is_match(rel_dir)
            || self.exclude.is_match(format!("{rel_dir}/"))
            || self.exclude.is_match(name)
    }

    fn file_selected(&self, rel_path: &str, name: &str) -> bool {
        if self.exclude.is_match(rel_path) || self.exclude.is_match(name) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(rel_path) || set.is_match(name),
            None => true,
        }
    }
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, error = %e, "dropping invalid glob"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "glob set failed to build; no globs applied");
        GlobSet::empty()
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_implicitly_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && IMPLICIT_IGNORED_DIRS
            .iter()
            .any(|d| entry.file_name().to_string_lossy() == *d)
}

/// SHA-256 of raw bytes as lower-case hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Largest prefix of `text` no longer than `max` bytes that ends on a char
/// boundary.
pub fn head_of(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn bare_entry(rel_path: String, file_name: String, size_bytes: u64) -> FileEntry {
    let extension = extension_of(&file_name);
    FileEntry {
        path: rel_path,
        file_name,
        extension,
        kind: FileKind::Unknown,
        signals: Vec::new(),
        size_bytes,
        lines_count: 0,
        words_count: 0,
        content_hash: String::new(),
        status: ParseStatus::Ok,
        status_message: None,
        has_streaming: false,
        has_dynamic_sql: false,
    }
}

fn scan_file(path: &Path, rel_path: String, file_name: String, config: &ScanConfig) -> ScannedFile {
    let size_bytes = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            let mut entry = bare_entry(rel_path, file_name, 0);
            (entry.kind, entry.signals) = classify(&entry.file_name, "");
            entry.status = ParseStatus::ReadError;
            entry.status_message = Some(e.to_string());
            return ScannedFile {
                entry,
                content: None,
            };
        }
    };
    let mut entry = bare_entry(rel_path, file_name, size_bytes);

    if BINARY_EXTENSIONS.contains(&entry.extension.as_str()) {
        entry.kind = FileKind::Binary;
        entry.signals.push(format!("ext_blocklist:.{}", entry.extension));
        entry.status = ParseStatus::SkippedBinary;
        debug!(path = %entry.path, "skipping blocklisted extension");
        return ScannedFile {
            entry,
            content: None,
        };
    }

    if size_bytes > config.max_file_bytes {
        (entry.kind, entry.signals) = classify(&entry.file_name, "");
        entry.status = ParseStatus::SkippedLarge;
        entry.status_message = Some(format!(
            "{size_bytes} bytes exceeds limit of {}",
            config.max_file_bytes
        ));
        debug!(path = %entry.path, size_bytes, "skipping oversized file");
        return ScannedFile {
            entry,
            content: None,
        };
    }

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            (entry.kind, entry.signals) = classify(&entry.file_name, "");
            entry.status = ParseStatus::ReadError;
            entry.status_message = Some(e.to_string());
            debug!(path = %entry.path, error = %e, "unreadable file");
            return ScannedFile {
                entry,
                content: None,
            };
        }
    };

    let sniff_len = bytes.len().min(SNIFF_BYTES);
    if bytes[..sniff_len].contains(&0) {
        entry.kind = FileKind::Binary;
        entry.signals.push("sniff:nul".to_string());
        entry.status = ParseStatus::SkippedBinary;
        return ScannedFile {
            entry,
            content: None,
        };
    }

    entry.content_hash = content_hash(&bytes);
    let text = String::from_utf8_lossy(&bytes).into_owned();
    entry.lines_count = text.lines().count();
    entry.words_count = text.split_whitespace().count();
    (entry.kind, entry.signals) = classify(&entry.file_name, head_of(&text, CLASSIFY_HEAD_BYTES));
    debug!(path = %entry.path, kind = entry.kind.as_str(), "classified");

    ScannedFile {
        entry,
        content: Some(text),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Walk `root` and return one [`ScannedFile`] per selected file, sorted by
/// relative path.
pub fn scan_repository(root: &Path, config: &ScanConfig) -> MigscanResult<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Err(MigscanError::InvalidRoot(root.to_path_buf()));
    }
    let rules = GlobRules::new(config);

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if is_implicitly_ignored(entry) {
                return false;
            }
            if entry.file_type().is_dir() {
                let rel_dir = relative_path(root, entry.path());
                let name = entry.file_name().to_string_lossy();
                return !rules.dir_excluded(&rel_dir, &name);
            }
            true
        });

    let mut files = Vec::new();
    for item in walker {
        let entry = match item {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "walk error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = relative_path(root, entry.path());
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !rules.file_selected(&rel_path, &file_name) {
            continue;
        }
        files.push(scan_file(entry.path(), rel_path, file_name, config));
    }

    files.sort_by(|a, b| a.entry.path.cmp(&b.entry.path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn paths(files: &[ScannedFile]) -> Vec<&str> {
        files.iter().map(|f| f.entry.path.as_str()).collect()
    }

    #[test]
    fn test_invalid_root() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = scan_repository(&missing, &ScanConfig::default());
        assert!(matches!(err, Err(MigscanError::InvalidRoot(_))));
    }

    #[test]
    fn test_scan_sorted_with_counts_and_hash() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b/query.sql", b"SELECT *\nFROM sales.orders\n");
        write(tmp.path(), "a.properties", b"db=sales\n");
        write(tmp.path(), ".git/config", b"[core]\n");

        let files = scan_repository(tmp.path(), &ScanConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["a.properties", "b/query.sql"]);

        let sql = &files[1];
        assert_eq!(sql.entry.kind, FileKind::Sql);
        assert_eq!(sql.entry.lines_count, 2);
        assert_eq!(sql.entry.words_count, 4);
        assert_eq!(sql.entry.content_hash.len(), 64);
        assert_eq!(sql.entry.status, ParseStatus::Ok);
        assert!(sql.text().unwrap().contains("sales.orders"));
    }

    #[test]
    fn test_exclude_prunes_directory_and_include_filters() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "build/out.sql", b"select 1");
        write(tmp.path(), "src/keep.sql", b"select 1");
        write(tmp.path(), "src/skip.py", b"print(1)");

        let config = ScanConfig {
            include_globs: vec!["*.sql".to_string()],
            exclude_globs: vec!["build".to_string(), "[invalid".to_string()],
            ..ScanConfig::default()
        };
        let files = scan_repository(tmp.path(), &config).unwrap();
        assert_eq!(paths(&files), vec!["src/keep.sql"]);
    }

    #[test]
    fn test_binary_and_large_files_not_read() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "lib/app.jar", b"PK\x03\x04");
        write(tmp.path(), "blob.dat", b"abc\0def");
        write(tmp.path(), "huge.sql", &vec![b'a'; 64]);

        let config = ScanConfig {
            max_file_bytes: 32,
            ..ScanConfig::default()
        };
        let files = scan_repository(tmp.path(), &config).unwrap();
        assert_eq!(paths(&files), vec!["blob.dat", "huge.sql", "lib/app.jar"]);

        assert_eq!(files[0].entry.status, ParseStatus::SkippedBinary);
        assert_eq!(files[0].entry.kind, FileKind::Binary);
        assert!(files[0].content.is_none());

        assert_eq!(files[1].entry.status, ParseStatus::SkippedLarge);
        assert_eq!(files[1].entry.kind, FileKind::Sql);
        assert!(files[1].entry.content_hash.is_empty());

        assert_eq!(files[2].entry.status, ParseStatus::SkippedBinary);
        assert_eq!(files[2].entry.extension, "jar");
    }

    #[test]
    fn test_lossy_utf8_decoding() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "notes.txt", b"caf\xe9 ok");
        let files = scan_repository(tmp.path(), &ScanConfig::default()).unwrap();
        assert_eq!(files[0].entry.status, ParseStatus::Ok);
        assert!(files[0].text().unwrap().ends_with(" ok"));
    }

    #[test]
    fn test_head_of_respects_char_boundary() {
        let text = "aé";
        assert_eq!(head_of(text, 2), "a");
        assert_eq!(head_of(text, 10), "aé");
    }

    #[test]
    fn test_unreadable_files_are_read_errors_and_skipped() {
        use crate::config::{PatternTables, RedactionMode};
        use crate::extract::lineage::extract_lineage;
        use crate::extract::patterns::{extract_findings, CompiledPatterns};
        use crate::resolution::collect_definitions;

        let dir = TempDir::new().unwrap();
        // A directory named like a file passes metadata but fails to read.
        fs::create_dir_all(dir.path().join("job.properties")).unwrap();
        fs::create_dir_all(dir.path().join("load.hql")).unwrap();
        let config = ScanConfig::default();

        let files = vec![
            scan_file(
                &dir.path().join("job.properties"),
                "job.properties".to_string(),
                "job.properties".to_string(),
                &config,
            ),
            scan_file(
                &dir.path().join("load.hql"),
                "load.hql".to_string(),
                "load.hql".to_string(),
                &config,
            ),
            scan_file(
                &dir.path().join("missing.properties"),
                "missing.properties".to_string(),
                "missing.properties".to_string(),
                &config,
            ),
        ];

        for file in &files {
            assert_eq!(file.entry.status, ParseStatus::ReadError, "{}", file.path());
            assert!(file.content.is_none());
            assert!(file.entry.status_message.is_some());
            assert!(file.entry.content_hash.is_empty());
        }
        assert_eq!(files[0].kind(), FileKind::Properties);
        assert_eq!(files[2].entry.size_bytes, 0);

        let compiled = CompiledPatterns::compile(&PatternTables::default());
        assert!(collect_definitions(&files).is_empty());
        assert!(extract_lineage(&files).is_empty());
        assert!(extract_findings(&files, &compiled, RedactionMode::default()).is_empty());
    }
}
