//! Configurable regex pattern scanning: secrets, connection strings, URLs,
//! Kafka bootstrap hints, storage paths, and language signatures.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::{PatternTables, RedactionMode};
use crate::extract::lineage::has_placeholder;
use crate::models::{Confidence, Finding, FindingGroup};
use crate::scanner::ScannedFile;

pub const REDACTED: &str = "***REDACTED***";

/// Replace a secret value with a redaction marker.
pub fn redact(value: &str, mode: RedactionMode) -> String {
    match mode {
        RedactionMode::Strict => REDACTED.to_string(),
        RedactionMode::Balanced => {
            let chars: Vec<char> = value.chars().collect();
            if chars.len() <= 4 {
                return REDACTED.to_string();
            }
            let tail: String = chars[chars.len() - 2..].iter().collect();
            format!("{REDACTED}({} chars..{tail})", chars.len())
        }
    }
}

/// Pattern tables compiled once per run.
#[derive(Debug, Default)]
pub struct CompiledPatterns {
    groups: Vec<(FindingGroup, Vec<Regex>)>,
    signatures: Vec<(String, Regex)>,
    /// Number of pattern strings that failed to compile.
    pub dropped: usize,
}

impl CompiledPatterns {
    pub fn compile(tables: &PatternTables) -> Self {
        let mut compiled = CompiledPatterns::default();
        for (group, sources) in [
            (FindingGroup::Secret, &tables.secrets),
            (FindingGroup::Jdbc, &tables.jdbc),
            (FindingGroup::Url, &tables.urls),
            (FindingGroup::KafkaBootstrap, &tables.kafka_bootstrap),
            (FindingGroup::StoragePath, &tables.storage_paths),
        ] {
            let mut regexes = Vec::with_capacity(sources.len());
            for source in sources {
                match Regex::new(source) {
                    Ok(rx) => regexes.push(rx),
                    Err(e) => {
                        warn!(group = ?group, pattern = %source, error = %e, "dropping invalid pattern");
                        compiled.dropped += 1;
                    }
                }
            }
            compiled.groups.push((group, regexes));
        }
        for (name, source) in &tables.language_signatures {
            match Regex::new(source) {
                Ok(rx) => compiled.signatures.push((name.clone(), rx)),
                Err(e) => {
                    warn!(signature = %name, error = %e, "dropping invalid language signature");
                    compiled.dropped += 1;
                }
            }
        }
        compiled
    }

    /// True when `name=value` would be reported as a secret.
    pub fn is_secret_assignment(&self, name: &str, value: &str) -> bool {
        let line = format!("{name}={value}");
        self.groups
            .iter()
            .filter(|(group, _)| *group == FindingGroup::Secret)
            .flat_map(|(_, regexes)| regexes)
            .any(|rx| rx.is_match(&line))
    }

    /// Apply every group line by line. Line numbers are 1-based.
    pub fn scan_text(&self, text: &str, file: &str, mode: RedactionMode) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut signatures_seen: HashSet<&str> = HashSet::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            for (group, regexes) in &self.groups {
                for rx in regexes {
                    for caps in rx.captures_iter(line) {
                        let Some(whole) = caps.get(0) else { continue };
                        let raw = match group {
                            FindingGroup::KafkaBootstrap => {
                                caps.get(1).map_or(whole.as_str(), |m| m.as_str())
                            }
                            _ => whole.as_str(),
                        };
                        let confidence = if has_placeholder(raw) {
                            Confidence::Medium
                        } else {
                            Confidence::High
                        };
                        let value = match group {
                            FindingGroup::Secret => redact(raw, mode),
                            _ => raw.to_string(),
                        };
                        findings.push(Finding {
                            group: *group,
                            value,
                            file: file.to_string(),
                            line: line_no,
                            confidence,
                            rule: None,
                        });
                    }
                }
            }
            for (name, rx) in &self.signatures {
                if signatures_seen.contains(name.as_str()) {
                    continue;
                }
                if let Some(m) = rx.find(line) {
                    signatures_seen.insert(name.as_str());
                    findings.push(Finding {
                        group: FindingGroup::LanguageSignal,
                        value: m.as_str().to_string(),
                        file: file.to_string(),
                        line: line_no,
                        confidence: Confidence::Medium,
                        rule: Some(name.clone()),
                    });
                }
            }
        }
        findings
    }
}

/// Scan every readable file in the inventory.
pub fn extract_findings(
    files: &[ScannedFile],
    compiled: &CompiledPatterns,
    mode: RedactionMode,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for file in files {
        let Some(text) = file.text() else { continue };
        let found = compiled.scan_text(text, file.path(), mode);
        if !found.is_empty() {
            debug!(path = file.path(), count = found.len(), "pattern findings");
        }
        findings.extend(found);
    }
    findings
}
