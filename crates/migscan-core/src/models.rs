//! Shared typed models used across scanning, extraction, resolution, and
//! scoring.
//!
//! Every record here is plain data that serializes to nested maps/lists of
//! primitives so reporting layers can consume it without knowing the
//! pipeline internals.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 1. File inventory
// ---------------------------------------------------------------------------

/// Detected kind of a scanned file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    OozieWorkflowXml,
    OozieCoordinatorXml,
    OozieBundleXml,
    XmlGeneric,
    Properties,
    Json,
    Yaml,
    IniConf,
    Sql,
    Hql,
    ImpalaSql,
    SqlDdlDml,
    Pig,
    Shell,
    Python,
    Scala,
    Java,
    NotebookJupyter,
    NotebookZeppelin,
    TextDoc,
    BuildMaven,
    BuildGradle,
    BuildSbt,
    BuildPythonDeps,
    Binary,
    Unknown,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::OozieWorkflowXml => "oozie_workflow_xml",
            FileKind::OozieCoordinatorXml => "oozie_coordinator_xml",
            FileKind::OozieBundleXml => "oozie_bundle_xml",
            FileKind::XmlGeneric => "xml_generic",
            FileKind::Properties => "properties",
            FileKind::Json => "json",
            FileKind::Yaml => "yaml",
            FileKind::IniConf => "ini_conf",
            FileKind::Sql => "sql",
            FileKind::Hql => "hql",
            FileKind::ImpalaSql => "impala_sql",
            FileKind::SqlDdlDml => "sql_ddl_dml",
            FileKind::Pig => "pig",
            FileKind::Shell => "shell",
            FileKind::Python => "python",
            FileKind::Scala => "scala",
            FileKind::Java => "java",
            FileKind::NotebookJupyter => "notebook_jupyter",
            FileKind::NotebookZeppelin => "notebook_zeppelin",
            FileKind::TextDoc => "text_doc",
            FileKind::BuildMaven => "build_maven",
            FileKind::BuildGradle => "build_gradle",
            FileKind::BuildSbt => "build_sbt",
            FileKind::BuildPythonDeps => "build_python_deps",
            FileKind::Binary => "binary",
            FileKind::Unknown => "unknown",
        }
    }

    pub fn is_orchestration(self) -> bool {
        matches!(
            self,
            FileKind::OozieWorkflowXml | FileKind::OozieCoordinatorXml | FileKind::OozieBundleXml
        )
    }

    pub fn is_sql(self) -> bool {
        matches!(
            self,
            FileKind::Sql | FileKind::Hql | FileKind::ImpalaSql | FileKind::SqlDdlDml
        )
    }

    pub fn is_notebook(self) -> bool {
        matches!(self, FileKind::NotebookJupyter | FileKind::NotebookZeppelin)
    }

    pub fn is_code(self) -> bool {
        matches!(
            self,
            FileKind::Python | FileKind::Scala | FileKind::Java | FileKind::Shell | FileKind::Pig
        )
    }

    /// Language label used for technology-diversity scoring, if the kind
    /// represents a programming or query language.
    pub fn language_label(self) -> Option<&'static str> {
        match self {
            FileKind::Python => Some("python"),
            FileKind::Scala => Some("scala"),
            FileKind::Java => Some("java"),
            FileKind::Pig => Some("pig"),
            FileKind::Shell => Some("shell"),
            FileKind::Hql => Some("hive"),
            FileKind::ImpalaSql => Some("impala"),
            FileKind::Sql | FileKind::SqlDdlDml => Some("sql"),
            FileKind::NotebookJupyter => Some("notebook_jupyter"),
            FileKind::NotebookZeppelin => Some("notebook_zeppelin"),
            _ => None,
        }
    }
}

/// Outcome of reading a file during the scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Ok,
    ReadError,
    SkippedLarge,
    SkippedBinary,
}

/// A single entry of the classified file inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub file_name: String,
    pub extension: String,
    pub kind: FileKind,
    pub signals: Vec<String>,
    pub size_bytes: u64,
    pub lines_count: usize,
    pub words_count: usize,
    pub content_hash: String,
    pub status: ParseStatus,
    pub status_message: Option<String>,
    #[serde(default)]
    pub has_streaming: bool,
    #[serde(default)]
    pub has_dynamic_sql: bool,
}

// ---------------------------------------------------------------------------
// 2. Confidence
// ---------------------------------------------------------------------------

/// Qualitative certainty attached to heuristic output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

// ---------------------------------------------------------------------------
// 3. Orchestration documents
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Workflow,
    Coordinator,
    Bundle,
}

impl DocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Workflow => "workflow",
            DocKind::Coordinator => "coordinator",
            DocKind::Bundle => "bundle",
        }
    }
}

/// Parse outcome of a structural document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocStatus {
    Ok,
    Failed { message: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlow {
    pub has_fork_join: bool,
    pub has_decision: bool,
}

impl ControlFlow {
    /// Number of distinct control-flow constructs present.
    pub fn count(&self) -> u32 {
        u32::from(self.has_fork_join) + u32::from(self.has_decision)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub uri_template: String,
}

/// One action inside a workflow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Local name of the first non-terminal child element (`shell`, `hive`, ...).
    pub kind: String,
    pub main: Option<String>,
    pub args: Vec<String>,
    pub files: Vec<String>,
    pub archives: Vec<String>,
    pub job_xmls: Vec<String>,
    pub subworkflow_app_path: Option<String>,
}

/// A parsed workflow, coordinator, or bundle definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationDoc {
    pub kind: DocKind,
    pub name: Option<String>,
    pub source_file: String,
    pub status: DocStatus,
    pub steps: Vec<Step>,
    pub control_flow: ControlFlow,
    /// Paths of documents this one starts or embeds.
    pub nested_refs: Vec<String>,
    pub configuration: IndexMap<String, String>,
    pub schedule: Option<Schedule>,
    pub datasets: Vec<Dataset>,
}

impl OrchestrationDoc {
    pub fn new(kind: DocKind, source_file: &str) -> Self {
        Self {
            kind,
            name: None,
            source_file: source_file.to_string(),
            status: DocStatus::Ok,
            steps: Vec::new(),
            control_flow: ControlFlow::default(),
            nested_refs: Vec::new(),
            configuration: IndexMap::new(),
            schedule: None,
            datasets: Vec::new(),
        }
    }

    pub fn failed(kind: DocKind, source_file: &str, message: impl Into<String>) -> Self {
        Self {
            status: DocStatus::Failed {
                message: message.into(),
            },
            ..Self::new(kind, source_file)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DocStatus::Ok
    }

    /// Name used for ids and reports; falls back to the source file.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.source_file,
        }
    }

    pub fn subworkflow_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.subworkflow_app_path.is_some())
            .count()
    }
}

// ---------------------------------------------------------------------------
// 4. Findings and lineage
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingGroup {
    Secret,
    Jdbc,
    Url,
    KafkaBootstrap,
    StoragePath,
    LanguageSignal,
}

/// A single pattern hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub group: FindingGroup,
    pub value: String,
    pub file: String,
    pub line: usize,
    pub confidence: Confidence,
    /// Signature name for language-signal hits.
    pub rule: Option<String>,
}

/// Tables read and written by one file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub evidence_file: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

impl LineageRecord {
    pub fn name_count(&self) -> usize {
        self.sources.len() + self.targets.len()
    }
}

// ---------------------------------------------------------------------------
// 5. Table references
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOperation {
    Select,
    Join,
    Insert,
    Create,
    Merge,
    Update,
    Delete,
    Truncate,
}

impl TableOperation {
    pub fn is_read(self) -> bool {
        matches!(self, TableOperation::Select | TableOperation::Join)
    }
}

/// A table name found in SQL text, split into its qualified parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReference {
    /// Name exactly as written (identifier quotes stripped).
    pub full_name: String,
    /// Database (catalog slot); filled from the active `USE` when unqualified.
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    /// `database[.schema].table` when a database is known.
    pub qualified_name: Option<String>,
    pub operation: TableOperation,
    pub file: String,
    pub line_number: usize,
    pub confidence: Confidence,
    pub has_variables: bool,
}

// ---------------------------------------------------------------------------
// 6. Variables and resolution
// ---------------------------------------------------------------------------

/// Where a variable definition came from. Declaration order is precedence
/// order, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BuildProperties,
    EmbeddedConfig,
    RuntimeProperties,
}

impl SourceKind {
    pub fn rank(self) -> u8 {
        match self {
            SourceKind::BuildProperties => 1,
            SourceKind::EmbeddedConfig => 2,
            SourceKind::RuntimeProperties => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub value: String,
    pub defined_in: String,
    pub source: SourceKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Partial,
    Unresolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NoDefinition,
    Cyclic,
}

/// Final classification of one referenced variable name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub name: String,
    pub status: ResolutionStatus,
    /// Winner value before substitution.
    pub raw_value: Option<String>,
    /// Value after substitution (partial values keep their leftover tokens).
    pub value: Option<String>,
    pub leftover: Vec<String>,
    pub reason: Option<UnresolvedReason>,
    /// Every candidate definition seen, in scan order.
    pub definitions: Vec<VariableDefinition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOwner {
    Finding,
    Step,
    Document,
    Lineage,
}

/// Audit record for a placeholder left in a rewritten field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedHit {
    pub owner: HitOwner,
    pub field: String,
    pub file: String,
    pub line: Option<usize>,
    pub name: String,
}

// ---------------------------------------------------------------------------
// 7. Dependency graph
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Workflow,
    Coordinator,
    Bundle,
    Action,
    Path,
    Reference,
}

impl NodeKind {
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Workflow => "workflow",
            NodeKind::Coordinator => "coordinator",
            NodeKind::Bundle => "bundle",
            NodeKind::Action => "action",
            NodeKind::Path => "path",
            NodeKind::Reference => "ref",
        }
    }
}

impl From<DocKind> for NodeKind {
    fn from(kind: DocKind) -> Self {
        match kind {
            DocKind::Workflow => NodeKind::Workflow,
            DocKind::Coordinator => NodeKind::Coordinator,
            DocKind::Bundle => NodeKind::Bundle,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub meta: IndexMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    References,
    Triggers,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src: String,
    pub dst: String,
    pub kind: EdgeKind,
    pub confidence: Confidence,
    pub evidence: Option<String>,
}

// ---------------------------------------------------------------------------
// 8. Complexity
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub orchestration: u32,
    pub technology: u32,
    pub data: u32,
    pub operational: u32,
    pub security: u32,
}

impl DimensionScores {
    pub fn total(&self) -> u32 {
        [self.technology, self.data, self.operational, self.security]
            .into_iter()
            .fold(self.orchestration, u32::saturating_add)
    }
}

/// Weighted risk score for the repository or a single document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityItem {
    pub item_id: String,
    pub dimension_scores: DimensionScores,
    pub total_score: u32,
    pub level: ComplexityLevel,
    pub reasons: Vec<String>,
    pub risk_flags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityResult {
    pub repo_level: ComplexityLevel,
    pub repo_score: u32,
    pub items: Vec<ComplexityItem>,
}
