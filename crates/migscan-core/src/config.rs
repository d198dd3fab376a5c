//! Analyzer configuration: scan rules, pattern tables, scoring rubric,
//! resolution limits, and redaction mode.
//!
//! Every section has a `Default` and `#[serde(default)]`, so a JSON config
//! only needs to name the values it overrides.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{MigscanError, MigscanResult};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

// ---------------------------------------------------------------------------
// Scan rules
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_file_bytes: u64,
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_globs: Vec::new(),
            exclude_globs: vec![
                "target".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
                ".idea".to_string(),
            ],
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            follow_symlinks: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

/// Named groups of regular-expression pattern strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternTables {
    pub secrets: Vec<String>,
    pub jdbc: Vec<String>,
    pub urls: Vec<String>,
    pub kafka_bootstrap: Vec<String>,
    pub storage_paths: Vec<String>,
    pub language_signatures: IndexMap<String, String>,
}

impl Default for PatternTables {
    fn default() -> Self {
        let mut language_signatures = IndexMap::new();
        for (name, pattern) in [
            ("pyspark", r"(?i)\bfrom\s+pyspark\b|\bimport\s+pyspark\b"),
            ("spark_scala", r"\bimport\s+org\.apache\.spark\b"),
            ("spark_submit", r"\bspark-submit\b"),
            ("hive_cli", r"\b(?:beeline|hive\s+-[ef])\b"),
            ("impala_shell", r"\bimpala-shell\b"),
            ("sqoop", r"\bsqoop\s+(?:import|export)\b"),
            ("pig_latin", r"(?i)\bLOAD\s+'[^']+'\s+USING\b"),
            ("hbase", r"(?i)\borg\.apache\.hadoop\.hbase\b|\bhbase\s+shell\b"),
        ] {
            language_signatures.insert(name.to_string(), pattern.to_string());
        }
        Self {
            secrets: vec![
                r"(?i)(password|passwd|pwd|secret|api[_-]?key|token)\s*[=:]\s*\S+".to_string(),
            ],
            jdbc: vec![r#"jdbc:[a-zA-Z0-9]+:[^\s'"]+"#.to_string()],
            urls: vec![r#"https?://[^\s'"<>]+"#.to_string()],
            kafka_bootstrap: vec![
                r#"(?i)bootstrap[._]servers['"]?\s*[=:,]\s*['"]?([^\s'"]+)"#.to_string(),
            ],
            storage_paths: vec![
                r#"(?:hdfs|s3a?|s3n|abfss?|wasbs?|gs|dbfs|adl)://[^\s'"<>]+"#.to_string(),
            ],
            language_signatures,
        }
    }
}

/// How secret-like values are stored in findings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    #[default]
    Strict,
    Balanced,
}

// ---------------------------------------------------------------------------
// Scoring rubric
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPoints {
    pub oozie_action: u32,
    pub oozie_control_flow: u32,
    pub oozie_subworkflow: u32,
    pub coordinator_trigger: u32,
    pub bundle_coordinator: u32,
    pub multi_language_bonus: u32,
    pub external_system_bonus: u32,
    pub lineage_cap: u32,
    pub dynamic_sql_bonus: u32,
    pub multi_database_bonus: u32,
    pub high_table_usage_bonus: u32,
    pub high_sql_complexity_bonus: u32,
    pub moderate_sql_complexity_bonus: u32,
    pub many_complex_queries_bonus: u32,
    pub some_complex_queries_bonus: u32,
    pub correlated_subqueries_bonus: u32,
    pub cross_join_bonus: u32,
    pub many_joins_bonus: u32,
    pub streaming_bonus: u32,
    pub schedule_high_freq_bonus: u32,
    pub secrets_bonus: u32,
    pub url_cap: u32,
}

impl Default for ScoringPoints {
    fn default() -> Self {
        Self {
            oozie_action: 2,
            oozie_control_flow: 8,
            oozie_subworkflow: 6,
            coordinator_trigger: 4,
            bundle_coordinator: 4,
            multi_language_bonus: 10,
            external_system_bonus: 5,
            lineage_cap: 25,
            dynamic_sql_bonus: 10,
            multi_database_bonus: 10,
            high_table_usage_bonus: 8,
            high_sql_complexity_bonus: 15,
            moderate_sql_complexity_bonus: 8,
            many_complex_queries_bonus: 10,
            some_complex_queries_bonus: 5,
            correlated_subqueries_bonus: 8,
            cross_join_bonus: 10,
            many_joins_bonus: 6,
            streaming_bonus: 15,
            schedule_high_freq_bonus: 8,
            secrets_bonus: 15,
            url_cap: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringThresholds {
    pub low_max: u32,
    pub medium_max: u32,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            low_max: 39,
            medium_max: 69,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRubric {
    pub points: ScoringPoints,
    pub thresholds: ScoringThresholds,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Upper bound on substitution passes per string.
    pub max_iterations: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub scan: ScanConfig,
    pub patterns: PatternTables,
    pub scoring: ScoringRubric,
    pub resolution: ResolutionConfig,
    pub redaction: RedactionMode,
}

impl AnalyzerConfig {
    pub fn from_json_str(raw: &str) -> MigscanResult<Self> {
        let config: AnalyzerConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> MigscanResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MigscanError::Config(format!("cannot read {}: {e}", PathBuf::from(path).display()))
        })?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> MigscanResult<()> {
        if self.resolution.max_iterations == 0 {
            return Err(MigscanError::Config(
                "resolution.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.scoring.thresholds.low_max > self.scoring.thresholds.medium_max {
            return Err(MigscanError::Config(format!(
                "scoring.thresholds.low_max ({}) exceeds medium_max ({})",
                self.scoring.thresholds.low_max, self.scoring.thresholds.medium_max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AnalyzerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.scan.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
        assert_eq!(config.scoring.points.oozie_action, 2);
        assert_eq!(config.redaction, RedactionMode::Strict);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let raw = r#"{
            "scoring": {"points": {"secrets_bonus": 40}},
            "redaction": "balanced",
            "resolution": {"max_iterations": 3}
        }"#;
        let config = AnalyzerConfig::from_json_str(raw).unwrap();
        assert_eq!(config.scoring.points.secrets_bonus, 40);
        assert_eq!(config.scoring.points.url_cap, 10);
        assert_eq!(config.scoring.thresholds.low_max, 39);
        assert_eq!(config.redaction, RedactionMode::Balanced);
        assert_eq!(config.resolution.max_iterations, 3);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = AnalyzerConfig::from_json_str(r#"{"resolution": {"max_iterations": 0}}"#);
        assert!(matches!(err, Err(MigscanError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let err = AnalyzerConfig::from_json_str("{not json");
        assert!(matches!(err, Err(MigscanError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("migscan.json");
        std::fs::write(&path, r#"{"scan": {"include_globs": ["**/*.sql"]}}"#).unwrap();
        let config = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(config.scan.include_globs, vec!["**/*.sql".to_string()]);
        assert!(AnalyzerConfig::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_default_language_signatures_present() {
        let tables = PatternTables::default();
        assert!(tables.language_signatures.contains_key("pyspark"));
        assert_eq!(tables.secrets.len(), 1);
    }
}
