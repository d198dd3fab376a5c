//! End-to-end analysis: scan, extract, resolve, graph, score.
//!
//! Stages run in a fixed order on one thread. Each opens a child span of
//! the run span and logs a one-line summary when it finishes.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::AnalyzerConfig;
use crate::context::RunContext;
use crate::errors::{MigscanError, MigscanResult};
use crate::extract::code::{extract_code_hints, CodeHints};
use crate::extract::database::{extract_databases, DatabaseSummary};
use crate::extract::lineage::{extract_lineage, flag_files};
use crate::extract::orchestration::parse_orchestration_files;
use crate::extract::patterns::{extract_findings, redact, CompiledPatterns};
use crate::extract::sql_complexity::{analyze_repository_sql, SqlComplexitySummary};
use crate::graph::{build_dependency_graph, DependencyGraph};
use crate::metrics::complexity::{repo_has_streaming, score_repository, ScoringInputs};
use crate::models::{
    ComplexityResult, DocKind, FileEntry, Finding, LineageRecord, OrchestrationDoc, ParseStatus,
};
use crate::resolution::{collect_definitions, resolve_repository, ResolutionOutput};
use crate::scanner::{scan_repository, ScannedFile};

/// Headline numbers for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub run_id: String,
    pub repo_root: String,
    pub file_count: usize,
    pub unreadable_count: usize,
    pub workflow_count: usize,
    pub coordinator_count: usize,
    pub bundle_count: usize,
    pub failed_document_count: usize,
    pub finding_count: usize,
    pub lineage_record_count: usize,
    pub definition_count: usize,
    pub has_streaming: bool,
    pub has_dynamic_sql: bool,
    pub database_count: usize,
    pub source_table_refs: usize,
    pub target_table_refs: usize,
    pub sql_queries_analyzed: usize,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub summary: RepoSummary,
    pub files: Vec<FileEntry>,
    pub orchestration: Vec<OrchestrationDoc>,
    pub findings: Vec<Finding>,
    pub lineage: Vec<LineageRecord>,
    pub databases: DatabaseSummary,
    pub sql_complexity: SqlComplexitySummary,
    pub code_hints: CodeHints,
    pub graph: DependencyGraph,
    pub resolution: ResolutionOutput,
    pub complexity: ComplexityResult,
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    value: &T,
    written: &mut Vec<PathBuf>,
) -> MigscanResult<()> {
    let path = dir.join(name);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    written.push(path);
    Ok(())
}

impl AnalysisReport {
    /// Write one pretty-printed JSON file per section into `dir`, creating
    /// it if needed. Returns the written paths in write order.
    pub fn write_artifacts(&self, dir: &Path) -> MigscanResult<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut w = Vec::new();
        write_json(dir, "repo_summary.json", &self.summary, &mut w)?;
        write_json(dir, "files_index.json", &self.files, &mut w)?;
        write_json(dir, "workflows.json", &self.orchestration, &mut w)?;
        write_json(dir, "findings.json", &self.findings, &mut w)?;
        write_json(dir, "lineage.json", &self.lineage, &mut w)?;
        write_json(dir, "database_context.json", &self.databases, &mut w)?;
        write_json(dir, "sql_complexity.json", &self.sql_complexity, &mut w)?;
        write_json(dir, "code_hints.json", &self.code_hints, &mut w)?;
        write_json(dir, "dependency_graph.json", &self.graph, &mut w)?;
        write_json(dir, "resolved.json", &self.resolution.resolved, &mut w)?;
        write_json(dir, "partially_resolved.json", &self.resolution.partial, &mut w)?;
        write_json(dir, "unresolved.json", &self.resolution.unresolved, &mut w)?;
        write_json(dir, "unresolved_hits.json", &self.resolution.hits, &mut w)?;
        write_json(dir, "complexity.json", &self.complexity, &mut w)?;
        Ok(w)
    }
}

/// Run every stage over `root`. The only fatal error is a root that is not
/// a readable directory; everything else degrades per file or per record.
pub fn analyze_repository(root: &Path, config: &AnalyzerConfig) -> MigscanResult<AnalysisReport> {
    if !root.is_dir() {
        return Err(MigscanError::InvalidRoot(root.to_path_buf()));
    }
    let started = Instant::now();
    let ctx = RunContext::new(root);
    let _run = ctx.span.enter();
    info!(run_id = %ctx.run_id, root = %root.display(), "analysis started");

    let files: Vec<ScannedFile> = {
        let _stage = ctx.stage("scan").entered();
        let files = scan_repository(root, &config.scan)?;
        flag_files_in_place(files)
    };

    let mut docs = {
        let _stage = ctx.stage("orchestration").entered();
        let docs = parse_orchestration_files(&files);
        let failed = docs.iter().filter(|d| !d.is_ok()).count();
        info!(documents = docs.len(), failed, "orchestration parsed");
        docs
    };

    let compiled = CompiledPatterns::compile(&config.patterns);
    if compiled.dropped > 0 {
        warn!(dropped = compiled.dropped, "invalid patterns skipped");
    }
    let mut findings = {
        let _stage = ctx.stage("patterns").entered();
        let findings = extract_findings(&files, &compiled, config.redaction);
        info!(findings = findings.len(), "pattern scan done");
        findings
    };

    let mut lineage = {
        let _stage = ctx.stage("lineage").entered();
        let lineage = extract_lineage(&files);
        info!(records = lineage.len(), "lineage extracted");
        lineage
    };

    let databases = {
        let _stage = ctx.stage("databases").entered();
        let summary = extract_databases(&files);
        info!(
            databases = summary.summary.total_databases,
            source_refs = summary.summary.total_source_table_refs,
            target_refs = summary.summary.total_target_table_refs,
            "database context extracted"
        );
        summary
    };

    let sql_complexity = {
        let _stage = ctx.stage("sql_complexity").entered();
        let summary = analyze_repository_sql(&files);
        info!(
            queries = summary.queries_analyzed,
            average = summary.average_score,
            "sql complexity analyzed"
        );
        summary
    };

    let code_hints = {
        let _stage = ctx.stage("code_hints").entered();
        let hints = extract_code_hints(&files);
        info!(
            files = hints.files.len(),
            notebook_failures = hints.notebook_failures,
            "code hints extracted"
        );
        hints
    };

    let (definition_count, mut resolution) = {
        let _stage = ctx.stage("resolution").entered();
        let table = collect_definitions(&files);
        let output = resolve_repository(
            &table,
            &mut findings,
            &mut docs,
            &mut lineage,
            &config.resolution,
        );
        info!(
            names = table.len(),
            resolved = output.resolved.len(),
            partial = output.partial.len(),
            unresolved = output.unresolved.len(),
            hits = output.hits.len(),
            "variables resolved"
        );
        (table.len(), output)
    };
    resolution.dropped_patterns = compiled.dropped;
    resolution.redact_values(
        |name, value| compiled.is_secret_assignment(name, value),
        |value| redact(value, config.redaction),
    );

    let graph = {
        let _stage = ctx.stage("graph").entered();
        let graph = build_dependency_graph(&files, &docs);
        info!(nodes = graph.node_count(), edges = graph.edge_count(), "graph built");
        graph
    };

    let entries: Vec<FileEntry> = files.into_iter().map(|f| f.entry).collect();

    let complexity = {
        let _stage = ctx.stage("scoring").entered();
        let inputs = ScoringInputs {
            files: &entries,
            docs: &docs,
            findings: &findings,
            lineage: &lineage,
            databases: &databases,
            sql: &sql_complexity,
            code: &code_hints,
        };
        let result = score_repository(&inputs, &config.scoring);
        info!(score = result.repo_score, level = ?result.repo_level, "scored");
        result
    };

    let count_docs = |kind: DocKind| docs.iter().filter(|d| d.kind == kind).count();
    let summary = RepoSummary {
        run_id: ctx.run_id.clone(),
        repo_root: root.display().to_string(),
        file_count: entries.len(),
        unreadable_count: entries
            .iter()
            .filter(|e| e.status != ParseStatus::Ok)
            .count(),
        workflow_count: count_docs(DocKind::Workflow),
        coordinator_count: count_docs(DocKind::Coordinator),
        bundle_count: count_docs(DocKind::Bundle),
        failed_document_count: docs.iter().filter(|d| !d.is_ok()).count(),
        finding_count: findings.len(),
        lineage_record_count: lineage.len(),
        definition_count,
        has_streaming: repo_has_streaming(&entries),
        has_dynamic_sql: entries.iter().any(|e| e.has_dynamic_sql),
        database_count: databases.summary.total_databases,
        source_table_refs: databases.summary.total_source_table_refs,
        target_table_refs: databases.summary.total_target_table_refs,
        sql_queries_analyzed: sql_complexity.queries_analyzed,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        files = summary.file_count,
        elapsed_ms = summary.elapsed_ms,
        level = ?complexity.repo_level,
        "analysis finished"
    );

    Ok(AnalysisReport {
        summary,
        files: entries,
        orchestration: docs,
        findings,
        lineage,
        databases,
        sql_complexity,
        code_hints,
        graph,
        resolution,
        complexity,
    })
}

fn flag_files_in_place(mut files: Vec<ScannedFile>) -> Vec<ScannedFile> {
    flag_files(&mut files);
    let readable = files.iter().filter(|f| f.content.is_some()).count();
    info!(files = files.len(), readable, "scan done");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, EdgeKind, ResolutionStatus};
    use tempfile::TempDir;

    const WORKFLOW: &str = r#"<workflow-app xmlns="uri:oozie:workflow:0.5" name="daily-wf">
  <global><configuration>
    <property><name>raw_db</name><value>from_xml</value></property>
  </configuration></global>
  <start to="load"/>
  <action name="load">
    <hive xmlns="uri:oozie:hive-action:0.5">
      <script>load.hql</script>
      <param>DT=${dt}</param>
    </hive>
    <ok to="end"/><error to="fail"/>
  </action>
  <kill name="fail"><message>failed</message></kill>
  <end name="end"/>
</workflow-app>"#;

    const COORDINATOR: &str = r#"<coordinator-app name="daily-coord" frequency="${coord:days(1)}"
    start="2024-01-01T00:00Z" end="2025-01-01T00:00Z" timezone="UTC"
    xmlns="uri:oozie:coordinator:0.4">
  <action><workflow><app-path>${nameNode}/apps/daily</app-path></workflow></action>
</coordinator-app>"#;

    const LOAD_HQL: &str = "USE sales;\n\
        INSERT OVERWRITE TABLE ${raw_db}.daily\n\
        SELECT c.id FROM ${raw_db}.customers c JOIN orders o ON o.cid = c.id;\n";

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("apps/daily")).unwrap();
        fs::write(
            root.join("job.properties"),
            "raw_db=sales\nnameNode=hdfs://nn:8020\npassword=hunter2\n",
        )
        .unwrap();
        fs::write(root.join("apps/daily/workflow.xml"), WORKFLOW).unwrap();
        fs::write(root.join("apps/daily/coordinator.xml"), COORDINATOR).unwrap();
        fs::write(root.join("apps/daily/load.hql"), LOAD_HQL).unwrap();
        dir
    }

    #[test]
    fn test_invalid_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = analyze_repository(&missing, &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, MigscanError::InvalidRoot(_)));
    }

    #[test]
    fn test_end_to_end() {
        let dir = fixture();
        let report = analyze_repository(dir.path(), &AnalyzerConfig::default()).unwrap();

        assert_eq!(report.summary.file_count, 4);
        assert_eq!(report.summary.workflow_count, 1);
        assert_eq!(report.summary.coordinator_count, 1);
        assert_eq!(report.summary.run_id.len(), 16);

        // runtime properties beat the workflow's embedded configuration
        let raw_db = report
            .resolution
            .resolved
            .iter()
            .find(|r| r.name == "raw_db")
            .unwrap();
        assert_eq!(raw_db.value.as_deref(), Some("sales"));
        assert_eq!(raw_db.definitions.len(), 2);

        let record = report
            .lineage
            .iter()
            .find(|r| r.evidence_file == "apps/daily/load.hql")
            .unwrap();
        assert!(record.targets.contains(&"sales.daily".to_string()));
        assert!(record.sources.contains(&"sales.customers".to_string()));

        let coord = report
            .orchestration
            .iter()
            .find(|d| d.kind == DocKind::Coordinator)
            .unwrap();
        assert_eq!(coord.nested_refs, vec!["hdfs://nn:8020/apps/daily"]);

        let trigger = report
            .graph
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Triggers)
            .unwrap();
        assert_eq!(trigger.src, "coordinator:daily-coord");
        assert_eq!(trigger.confidence, Confidence::High);
        assert!(report.graph.nodes.contains_key("action:daily-wf/load"));

        assert!(report.findings.iter().all(|f| !f.value.contains("hunter2")));
        let resolution_json = serde_json::to_string(&report.resolution).unwrap();
        assert!(!resolution_json.contains("hunter2"));
        assert_eq!(report.complexity.items[0].item_id, "repo_overview");
        assert_eq!(report.complexity.items.len(), 3);
        assert_eq!(
            report.resolution.status_of("nameNode"),
            Some(ResolutionStatus::Resolved)
        );
    }

    #[test]
    fn test_write_artifacts() {
        let dir = fixture();
        let report = analyze_repository(dir.path(), &AnalyzerConfig::default()).unwrap();
        let out = TempDir::new().unwrap();
        let target = out.path().join("artifacts");
        let written = report.write_artifacts(&target).unwrap();
        assert_eq!(written.len(), 14);
        for path in &written {
            assert!(path.is_file(), "{} missing", path.display());
        }
        let raw = fs::read_to_string(target.join("repo_summary.json")).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(summary["workflow_count"], 1);
    }
}
