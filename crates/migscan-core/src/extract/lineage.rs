//! Keyword-context SQL lineage, streaming and dynamic-SQL flags, and
//! placeholder token helpers.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{FileKind, LineageRecord};
use crate::scanner::ScannedFile;

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// `${...}` token; group 1 is the raw inner text.
pub static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

static VARIABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.\-]*$").unwrap());

/// True for plain variable names. EL function calls such as
/// `coord:minutes(15)` or `wf:conf('x')` are evaluated by the scheduler at
/// run time and are not variables.
pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME_RE.is_match(name)
}

pub fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}

/// Variable names referenced by `${name}` tokens, in first-seen order.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let name = caps[1].trim();
        if is_variable_name(name) && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Lineage
// ---------------------------------------------------------------------------

const NAME_CLASS: &str = r"([\w.$\{\}`:]+)";

static READ_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)\bfrom\s+", r"(?i)\bjoin\s+"]
        .iter()
        .map(|prefix| Regex::new(&format!("{prefix}{NAME_CLASS}")).unwrap())
        .collect()
});

static WRITE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\binsert\s+(?:into|overwrite)\s+(?:table\s+)?",
        r"(?i)\bcreate\s+(?:external\s+)?table\s+(?:if\s+not\s+exists\s+)?",
        r"(?i)\bmerge\s+into\s+",
    ]
    .iter()
    .map(|prefix| Regex::new(&format!("{prefix}{NAME_CLASS}")).unwrap())
    .collect()
});

const NON_TABLE_WORDS: &[&str] = &[
    "select", "where", "lateral", "unnest", "table", "values", "with", "as", "on", "if",
    "not", "exists", "and", "or", "join", "inner", "left", "right", "outer", "cross", "full",
    "group", "order", "by", "set", "the", "a", "an", "this", "that", "to", "in",
];

static STREAMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\breadStream\b|\bwriteStream\b|spark\.streaming|structured\s+streaming|kafka")
        .unwrap()
});

static DYNAMIC_SQL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\+\s*['"]\s*(?:select|insert|create)\b|format\(|f['"]\s*select\b|\bexecute\s+immediate\b"#,
    )
    .unwrap()
});

const STREAMING_PATH_TOKENS: &[&str] = &[
    "kafka",
    "sparkstream",
    "spark_streaming",
    "structuredstream",
    "flink",
    "kinesis",
];

fn clean_capture(raw: &str) -> Option<String> {
    let cleaned = raw.replace('`', "");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ':');
    if !cleaned.chars().any(|c| c.is_alphanumeric()) {
        return None;
    }
    if NON_TABLE_WORDS.contains(&cleaned.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(cleaned.to_string())
}

fn collect_names(text: &str, regexes: &[Regex], skip_python_imports: bool) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for rx in regexes {
        for caps in rx.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            if skip_python_imports && text[m.end()..].trim_start().starts_with("import") {
                continue;
            }
            if let Some(name) = clean_capture(m.as_str()) {
                names.insert(name);
            }
        }
    }
    names
}

/// Tables read and written by `text`, de-duplicated and sorted.
pub fn extract_sql_lineage(text: &str, evidence_file: &str) -> LineageRecord {
    LineageRecord {
        evidence_file: evidence_file.to_string(),
        sources: collect_names(text, &READ_RES, true).into_iter().collect(),
        targets: collect_names(text, &WRITE_RES, false).into_iter().collect(),
    }
}

fn scans_lineage(kind: FileKind) -> bool {
    kind.is_sql()
        || kind.is_notebook()
        || matches!(
            kind,
            FileKind::OozieWorkflowXml
                | FileKind::OozieCoordinatorXml
                | FileKind::XmlGeneric
                | FileKind::Python
                | FileKind::Scala
                | FileKind::Java
                | FileKind::Shell
        )
}

fn scans_flags(kind: FileKind) -> bool {
    scans_lineage(kind) || matches!(kind, FileKind::Properties | FileKind::IniConf)
}

/// One record per file that references at least one table.
pub fn extract_lineage(files: &[ScannedFile]) -> Vec<LineageRecord> {
    files
        .iter()
        .filter(|f| scans_lineage(f.kind()))
        .filter_map(|f| {
            let record = extract_sql_lineage(f.text()?, f.path());
            (record.name_count() > 0).then_some(record)
        })
        .collect()
}

pub fn has_streaming(text: &str) -> bool {
    STREAMING_RE.is_match(text)
}

pub fn has_dynamic_sql(text: &str) -> bool {
    DYNAMIC_SQL_RE.is_match(text)
}

pub fn path_suggests_streaming(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    STREAMING_PATH_TOKENS.iter().any(|tok| lower.contains(tok))
}

/// Set `has_streaming` / `has_dynamic_sql` on each inventory entry.
pub fn flag_files(files: &mut [ScannedFile]) {
    for file in files.iter_mut() {
        if !scans_flags(file.entry.kind) {
            continue;
        }
        let Some(text) = file.content.as_deref() else { continue };
        file.entry.has_streaming = has_streaming(text);
        file.entry.has_dynamic_sql = has_dynamic_sql(text);
        if file.entry.has_streaming || file.entry.has_dynamic_sql {
            debug!(
                path = %file.entry.path,
                streaming = file.entry.has_streaming,
                dynamic_sql = file.entry.has_dynamic_sql,
                "flagged"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_names_skip_el_functions() {
        let text = "${raw_db}.t ${ raw_db } ${coord:minutes(15)} ${wf:conf('x')} ${nameNode}";
        assert_eq!(placeholder_names(text), vec!["raw_db", "nameNode"]);
        assert!(has_placeholder("a ${x} b"));
        assert!(!has_placeholder("a $x b"));
    }

    #[test]
    fn test_lineage_sources_and_targets() {
        let sql = "INSERT OVERWRITE TABLE ${target_db}.daily\n\
                   SELECT * FROM `sales`.orders o JOIN sales.customers c ON o.id = c.id\n\
                   WHERE o.id IN (SELECT id FROM sales.orders);\n\
                   CREATE EXTERNAL TABLE IF NOT EXISTS stage.raw (id INT);\n\
                   MERGE INTO dw.dim USING stage.raw s ON 1=1;";
        let record = extract_sql_lineage(sql, "q.sql");
        assert_eq!(record.sources, vec!["sales.customers", "sales.orders"]);
        assert_eq!(record.targets, vec!["${target_db}.daily", "dw.dim", "stage.raw"]);
    }

    #[test]
    fn test_hiveconf_placeholders_stay_whole() {
        let sql = "INSERT INTO TABLE ${hiveconf:target_db}.daily\n\
                   SELECT * FROM ${hiveconf:db}.orders;";
        let record = extract_sql_lineage(sql, "q.hql");
        assert_eq!(record.sources, vec!["${hiveconf:db}.orders"]);
        assert_eq!(record.targets, vec!["${hiveconf:target_db}.daily"]);
    }

    #[test]
    fn test_lineage_ignores_python_imports_and_keywords() {
        let code = "from pyspark.sql import SparkSession\n\
                    df = spark.sql(\"select * from raw.events\")\n\
                    x = 1 if y else 2 from the outside\n";
        let record = extract_sql_lineage(code, "job.py");
        assert_eq!(record.sources, vec!["raw.events"]);
        assert!(record.targets.is_empty());
    }

    #[test]
    fn test_streaming_and_dynamic_sql_flags() {
        assert!(has_streaming("df = spark.readStream.format('kafka')"));
        assert!(has_streaming("import org.apache.spark.streaming._"));
        assert!(!has_streaming("spark.read.parquet(path)"));

        assert!(has_dynamic_sql("q = \"x\" + \"select * from t\""));
        assert!(has_dynamic_sql("spark.sql(f\"select * from {tbl}\")"));
        assert!(has_dynamic_sql("EXECUTE IMMEDIATE stmt;"));
        assert!(!has_dynamic_sql("select * from t"));
        assert!(path_suggests_streaming("jobs/Kafka_ingest/run.sh"));
    }
}
