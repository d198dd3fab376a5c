//! Lightweight hints from code files: shell invocations, imports, and
//! notebook structure.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::models::FileKind;
use crate::scanner::ScannedFile;

static SHELL_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|[\s;&|(])(?:bash|sh|ksh|source|\.)\s+([^\s;|&)]+)").unwrap()
});
static SPARK_SUBMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bspark-submit\b[^\n]*").unwrap());
static HIVE_CLI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:beeline|hive)\b\s+-[^\n]*").unwrap());
static IMPALA_SHELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bimpala-shell\b[^\n]*").unwrap());
static PYTHON_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+([\w.]+)\s+import\b|import\s+([\w.]+))").unwrap()
});
static SCALA_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap());

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShellCalls {
    /// Scripts sourced or run through a shell, sorted.
    pub scripts: Vec<String>,
    pub spark_submit: Vec<String>,
    pub hive_calls: Vec<String>,
    pub impala_calls: Vec<String>,
}

impl ShellCalls {
    /// Command lines that reach an external engine.
    pub fn external_call_count(&self) -> usize {
        self.spark_submit.len() + self.hive_calls.len() + self.impala_calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.external_call_count() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NotebookSummary {
    pub cell_count: usize,
    pub code_cells: usize,
    /// Code cells joined with newlines.
    pub code: String,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileCodeHints {
    pub file: String,
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellCalls>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook: Option<NotebookSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CodeHints {
    pub files: Vec<FileCodeHints>,
    pub external_call_count: usize,
    pub notebook_failures: usize,
    /// Every imported module across the repository, sorted.
    pub modules: Vec<String>,
}

fn matched_lines(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

pub fn extract_shell_calls(text: &str) -> ShellCalls {
    let scripts: BTreeSet<String> = SHELL_SCRIPT_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|s| !s.starts_with('-'))
        .collect();
    ShellCalls {
        scripts: scripts.into_iter().collect(),
        spark_submit: matched_lines(&SPARK_SUBMIT_RE, text),
        hive_calls: matched_lines(&HIVE_CLI_RE, text),
        impala_calls: matched_lines(&IMPALA_SHELL_RE, text),
    }
}

/// Top-level module names imported by Python source, sorted.
pub fn extract_python_imports(text: &str) -> Vec<String> {
    let modules: BTreeSet<String> = PYTHON_IMPORT_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().split('.').next().map(str::to_string))
        .filter(|m| !m.is_empty())
        .collect();
    modules.into_iter().collect()
}

/// Dotted import paths from Scala or Java source, sorted.
pub fn extract_scala_imports(text: &str) -> Vec<String> {
    let paths: BTreeSet<String> = SCALA_IMPORT_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim_end_matches('_').trim_end_matches('.').to_string())
        .collect();
    paths.into_iter().collect()
}

fn source_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

pub fn parse_jupyter(text: &str) -> NotebookSummary {
    let notebook: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return NotebookSummary {
                error: Some(format!("json_parse_error: {e}")),
                ..NotebookSummary::default()
            }
        }
    };
    let cells = notebook
        .get("cells")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let code: Vec<String> = cells
        .iter()
        .filter(|c| c.get("cell_type").and_then(Value::as_str) == Some("code"))
        .map(|c| c.get("source").map(source_text).unwrap_or_default())
        .collect();
    NotebookSummary {
        cell_count: cells.len(),
        code_cells: code.len(),
        code: code.join("\n"),
        error: None,
    }
}

pub fn parse_zeppelin(text: &str) -> NotebookSummary {
    let note: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return NotebookSummary {
                error: Some(format!("json_parse_error: {e}")),
                ..NotebookSummary::default()
            }
        }
    };
    let paragraphs = note
        .get("paragraphs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let code: Vec<String> = paragraphs
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .collect();
    NotebookSummary {
        cell_count: paragraphs.len(),
        code_cells: code.len(),
        code: code.join("\n"),
        error: None,
    }
}

pub fn extract_code_hints(files: &[ScannedFile]) -> CodeHints {
    let mut hints = CodeHints::default();
    let mut modules = BTreeSet::new();

    for file in files {
        let Some(text) = file.text() else { continue };
        let kind = file.kind();
        let mut entry = FileCodeHints {
            file: file.path().to_string(),
            kind,
            shell: None,
            imports: Vec::new(),
            notebook: None,
        };
        match kind {
            FileKind::Shell => {
                let calls = extract_shell_calls(text);
                hints.external_call_count += calls.external_call_count();
                if !calls.is_empty() {
                    entry.shell = Some(calls);
                }
            }
            FileKind::Python => entry.imports = extract_python_imports(text),
            FileKind::Scala | FileKind::Java => entry.imports = extract_scala_imports(text),
            FileKind::NotebookJupyter => entry.notebook = Some(parse_jupyter(text)),
            FileKind::NotebookZeppelin => entry.notebook = Some(parse_zeppelin(text)),
            _ => continue,
        }
        if let Some(nb) = &entry.notebook {
            if nb.error.is_some() {
                hints.notebook_failures += 1;
                debug!(path = file.path(), "notebook parse failed");
            } else {
                modules.extend(extract_python_imports(&nb.code));
            }
        }
        modules.extend(entry.imports.iter().cloned());
        if entry.shell.is_some() || !entry.imports.is_empty() || entry.notebook.is_some() {
            hints.files.push(entry);
        }
    }
    hints.modules = modules.into_iter().collect();
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_calls() {
        let script = "#!/bin/bash\n\
                      source ./env.sh\n\
                      . conf/common.sh\n\
                      bash -x run.sh\n\
                      spark-submit --master yarn --class com.acme.Main app.jar\n\
                      beeline -u jdbc:hive2://h:10000 -f load.hql\n\
                      impala-shell -q 'invalidate metadata'\n\
                      echo hive.exec.parallel\n";
        let calls = extract_shell_calls(script);
        assert_eq!(calls.scripts, vec!["./env.sh", "conf/common.sh"]);
        assert_eq!(calls.spark_submit.len(), 1);
        assert!(calls.spark_submit[0].contains("--class com.acme.Main"));
        assert_eq!(calls.hive_calls.len(), 1);
        assert_eq!(calls.impala_calls.len(), 1);
        assert_eq!(calls.external_call_count(), 3);
    }

    #[test]
    fn test_python_and_scala_imports() {
        let py = "import os\nfrom pyspark.sql import functions as F\n  import numpy.linalg\n";
        assert_eq!(extract_python_imports(py), vec!["numpy", "os", "pyspark"]);
        let scala = "import org.apache.spark.sql._\nimport scala.util.Try\n";
        assert_eq!(
            extract_scala_imports(scala),
            vec!["org.apache.spark.sql", "scala.util.Try"]
        );
    }

    #[test]
    fn test_parse_jupyter() {
        let nb = r##"{"cells": [
            {"cell_type": "markdown", "source": ["# Title"]},
            {"cell_type": "code", "source": ["import pandas\n", "df = 1"]},
            {"cell_type": "code", "source": "spark.sql('select 1')"}
        ]}"##;
        let summary = parse_jupyter(nb);
        assert_eq!(summary.cell_count, 3);
        assert_eq!(summary.code_cells, 2);
        assert!(summary.code.starts_with("import pandas\ndf = 1\n"));
        assert!(summary.error.is_none());
        assert!(parse_jupyter("{oops").error.is_some());
    }

    #[test]
    fn test_parse_zeppelin() {
        let note = r#"{"paragraphs": [{"text": "%sql select 1"}, {"text": ""}, {}]}"#;
        let summary = parse_zeppelin(note);
        assert_eq!(summary.cell_count, 3);
        assert_eq!(summary.code_cells, 1);
        assert_eq!(summary.code, "%sql select 1");
    }
}
