//! File-kind classification from the file name and a content prefix.
//!
//! Name rules win over extension mapping; content signatures refine the
//! extension result for XML and SQL files.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::FileKind;

/// Number of leading bytes handed to [`classify`].
pub const CLASSIFY_HEAD_BYTES: usize = 64 * 1024;

const FILENAME_RULES: &[(&str, FileKind)] = &[
    ("workflow.xml", FileKind::OozieWorkflowXml),
    ("coordinator.xml", FileKind::OozieCoordinatorXml),
    ("bundle.xml", FileKind::OozieBundleXml),
    ("pom.xml", FileKind::BuildMaven),
    ("build.gradle", FileKind::BuildGradle),
    ("settings.gradle", FileKind::BuildGradle),
    ("build.sbt", FileKind::BuildSbt),
    ("requirements.txt", FileKind::BuildPythonDeps),
    ("pipfile", FileKind::BuildPythonDeps),
    ("poetry.lock", FileKind::BuildPythonDeps),
];

const EXTENSION_RULES: &[(&str, FileKind)] = &[
    ("properties", FileKind::Properties),
    ("props", FileKind::Properties),
    ("json", FileKind::Json),
    ("yml", FileKind::Yaml),
    ("yaml", FileKind::Yaml),
    ("ini", FileKind::IniConf),
    ("cfg", FileKind::IniConf),
    ("conf", FileKind::IniConf),
    ("sql", FileKind::Sql),
    ("hql", FileKind::Hql),
    ("q", FileKind::Hql),
    ("ddl", FileKind::SqlDdlDml),
    ("dml", FileKind::SqlDdlDml),
    ("pig", FileKind::Pig),
    ("sh", FileKind::Shell),
    ("bash", FileKind::Shell),
    ("ksh", FileKind::Shell),
    ("py", FileKind::Python),
    ("scala", FileKind::Scala),
    ("java", FileKind::Java),
    ("ipynb", FileKind::NotebookJupyter),
    ("zpln", FileKind::NotebookZeppelin),
    ("md", FileKind::TextDoc),
    ("txt", FileKind::TextDoc),
    ("xml", FileKind::XmlGeneric),
];

static XML_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static XML_FIRST_ELEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)").unwrap());

static IMPALA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:invalidate\s+metadata|compute\s+(?:incremental\s+)?stats|refresh)\b")
        .unwrap()
});

static HIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bset\s+hive\.|\bmsck\s+repair\b|\bcreate\s+temporary\s+function\b)")
        .unwrap()
});

/// Lower-cased extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Classify a file by name and the first [`CLASSIFY_HEAD_BYTES`] of its
/// content. Returns the kind and the signals that decided it.
pub fn classify(file_name: &str, head: &str) -> (FileKind, Vec<String>) {
    let lower_name = file_name.to_ascii_lowercase();
    let mut signals = Vec::new();

    if let Some((_, kind)) = FILENAME_RULES.iter().find(|(name, _)| *name == lower_name) {
        signals.push(format!("filename:{lower_name}"));
        return (*kind, signals);
    }

    let ext = extension_of(&lower_name);
    let mut kind = FileKind::Unknown;
    if let Some((_, mapped)) = EXTENSION_RULES.iter().find(|(e, _)| *e == ext) {
        kind = *mapped;
        signals.push(format!("ext:.{ext}"));
    }

    match kind {
        FileKind::XmlGeneric | FileKind::Unknown => {
            if let Some(root) = xml_root_name(head) {
                let sniffed = match root.as_str() {
                    "workflow-app" => Some(FileKind::OozieWorkflowXml),
                    "coordinator-app" => Some(FileKind::OozieCoordinatorXml),
                    "bundle-app" => Some(FileKind::OozieBundleXml),
                    _ => None,
                };
                if let Some(sniffed) = sniffed {
                    signals.push(format!("sig:{root}"));
                    return (sniffed, signals);
                }
            }
            if kind == FileKind::Unknown && head.trim_start().starts_with("<?xml") {
                signals.push("sig:xml_prolog".to_string());
                kind = FileKind::XmlGeneric;
            }
        }
        FileKind::Sql | FileKind::SqlDdlDml | FileKind::Hql => {
            if IMPALA_RE.is_match(head) {
                signals.push("sig:impala".to_string());
                kind = FileKind::ImpalaSql;
            } else if kind != FileKind::Hql && HIVE_RE.is_match(head) {
                signals.push("sig:hive".to_string());
                kind = FileKind::Hql;
            }
        }
        _ => {}
    }

    (kind, signals)
}

/// Lower-cased local name of the first element in an XML prefix.
fn xml_root_name(head: &str) -> Option<String> {
    if !head.contains('<') {
        return None;
    }
    let without_comments = XML_COMMENT_RE.replace_all(head, "");
    XML_FIRST_ELEMENT_RE
        .captures(&without_comments)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}
