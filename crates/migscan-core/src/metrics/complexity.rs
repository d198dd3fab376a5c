//! Rubric-driven complexity scoring.
//!
//! Five dimensions (orchestration, technology, data, operational,
//! security) are summed into a total and mapped to a level through the
//! rubric thresholds. Scoring is a pure function of its inputs.

use std::collections::BTreeSet;

use crate::config::{ScoringPoints, ScoringRubric, ScoringThresholds};
use crate::extract::code::CodeHints;
use crate::extract::database::DatabaseSummary;
use crate::extract::lineage::path_suggests_streaming;
use crate::extract::sql_complexity::SqlComplexitySummary;
use crate::models::{
    ComplexityItem, ComplexityLevel, ComplexityResult, DimensionScores, DocKind, FileEntry,
    Finding, FindingGroup, LineageRecord, OrchestrationDoc,
};

pub const MAX_REASONS: usize = 7;

const HIGH_FREQUENCY_VALUES: &[&str] = &["5", "10", "15", "30"];

/// Everything the scorer reads, borrowed from the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct ScoringInputs<'a> {
    pub files: &'a [FileEntry],
    pub docs: &'a [OrchestrationDoc],
    pub findings: &'a [Finding],
    pub lineage: &'a [LineageRecord],
    pub databases: &'a DatabaseSummary,
    pub sql: &'a SqlComplexitySummary,
    pub code: &'a CodeHints,
}

pub fn classify_level(score: u32, thresholds: &ScoringThresholds) -> ComplexityLevel {
    if score <= thresholds.low_max {
        ComplexityLevel::Low
    } else if score <= thresholds.medium_max {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::High
    }
}

/// Frequency mentions minutes, or is one of the common short periods.
pub fn is_high_frequency(frequency: &str) -> bool {
    frequency.to_ascii_lowercase().contains("minute")
        || HIGH_FREQUENCY_VALUES.contains(&frequency.trim())
}

/// Any file flagged as streaming, or any path that names a streaming stack.
pub fn repo_has_streaming(files: &[FileEntry]) -> bool {
    files
        .iter()
        .any(|f| f.has_streaming || path_suggests_streaming(&f.path))
}

#[derive(Default)]
struct ItemBuilder {
    dims: DimensionScores,
    reasons: Vec<String>,
    flags: Vec<String>,
}

impl ItemBuilder {
    fn reason(&mut self, reason: String) {
        self.reasons.push(reason);
    }

    fn flag(&mut self, flag: &str) {
        if !self.flags.iter().any(|f| f == flag) {
            self.flags.push(flag.to_string());
        }
    }

    fn finish(mut self, item_id: String, thresholds: &ScoringThresholds) -> ComplexityItem {
        let total = self.dims.total();
        self.reasons.truncate(MAX_REASONS);
        ComplexityItem {
            item_id,
            dimension_scores: self.dims,
            total_score: total,
            level: classify_level(total, thresholds),
            reasons: self.reasons,
            risk_flags: self.flags,
        }
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Saturating add. Scores never wrap, whatever the rubric weights.
fn add(score: &mut u32, points: u32) {
    *score = score.saturating_add(points);
}

fn scaled(count: usize, points: u32) -> u32 {
    count_u32(count).saturating_mul(points)
}

// ---------------------------------------------------------------------------
// Repository overview
// ---------------------------------------------------------------------------

fn score_orchestration(b: &mut ItemBuilder, docs: &[OrchestrationDoc], pts: &ScoringPoints) {
    let workflows = || docs.iter().filter(|d| d.kind == DocKind::Workflow);
    let actions: usize = workflows().map(|d| d.steps.len()).sum();
    let control_flow: u32 = workflows().map(|d| d.control_flow.count()).sum();
    let subworkflows: usize = workflows().map(OrchestrationDoc::subworkflow_count).sum();

    if actions > 0 {
        add(&mut b.dims.orchestration, scaled(actions, pts.oozie_action));
        b.reason(format!("Oozie actions detected: {actions}"));
    }
    if control_flow > 0 {
        add(&mut b.dims.orchestration, control_flow.saturating_mul(pts.oozie_control_flow));
        b.reason(format!("Control-flow nodes (fork/join/decision): {control_flow}"));
    }
    if subworkflows > 0 {
        add(&mut b.dims.orchestration, scaled(subworkflows, pts.oozie_subworkflow));
        b.reason(format!("Sub-workflows detected: {subworkflows}"));
    }
}

fn score_technology(b: &mut ItemBuilder, inputs: &ScoringInputs<'_>, pts: &ScoringPoints) {
    let mut languages: BTreeSet<&str> = inputs
        .files
        .iter()
        .filter_map(|f| f.kind.language_label())
        .collect();
    languages.extend(
        inputs
            .findings
            .iter()
            .filter(|f| f.group == FindingGroup::LanguageSignal)
            .filter_map(|f| f.rule.as_deref()),
    );
    if languages.len() >= 2 {
        add(&mut b.dims.technology, pts.multi_language_bonus);
        let list: Vec<&str> = languages.into_iter().collect();
        b.reason(format!("Multiple languages detected: {}", list.join(", ")));
    }

    let connections = inputs
        .findings
        .iter()
        .filter(|f| matches!(f.group, FindingGroup::Jdbc | FindingGroup::KafkaBootstrap))
        .count();
    let external_calls = inputs.code.external_call_count;
    if connections > 0 || external_calls > 0 {
        add(&mut b.dims.technology, pts.external_system_bonus);
        b.reason(format!(
            "External systems referenced: connections={connections}, shell_calls={external_calls}"
        ));
    }
}

fn score_data(b: &mut ItemBuilder, inputs: &ScoringInputs<'_>, pts: &ScoringPoints) {
    let lineage_names: usize = inputs.lineage.iter().map(LineageRecord::name_count).sum();
    if lineage_names > 0 {
        add(&mut b.dims.data, count_u32(lineage_names).min(pts.lineage_cap));
        b.reason(format!("SQL lineage table references: {lineage_names}"));
    }
    if inputs.files.iter().any(|f| f.has_dynamic_sql) {
        add(&mut b.dims.data, pts.dynamic_sql_bonus);
        b.flag("dynamic_sql");
        b.reason("Dynamic SQL patterns detected".to_string());
    }

    let counts = &inputs.databases.summary;
    if counts.total_databases >= 5 {
        add(&mut b.dims.data, pts.multi_database_bonus);
        b.flag("multi_database");
        b.reason(format!("Multiple databases detected: {}", counts.total_databases));
    }
    if counts.total_source_table_refs > 50 || counts.total_target_table_refs > 20 {
        add(&mut b.dims.data, pts.high_table_usage_bonus);
        b.reason(format!(
            "High table usage: {} reads, {} writes",
            counts.total_source_table_refs, counts.total_target_table_refs
        ));
    }
    let shared = inputs.databases.shared_database_count();
    if shared > 0 {
        add(&mut b.dims.data, count_u32(shared).min(10));
        b.flag("cross_database");
        b.reason(format!("Databases used by more than one file: {shared}"));
    }

    let sql = inputs.sql;
    if sql.queries_analyzed == 0 {
        return;
    }
    if sql.average_score > 50.0 {
        add(&mut b.dims.data, pts.high_sql_complexity_bonus);
        b.flag("complex_sql");
        b.reason(format!("High average SQL complexity: {:.1}", sql.average_score));
    } else if sql.average_score > 30.0 {
        add(&mut b.dims.data, pts.moderate_sql_complexity_bonus);
        b.reason(format!("Moderate SQL complexity: {:.1}", sql.average_score));
    }
    let complex = sql.complex_count();
    if complex > 10 {
        add(&mut b.dims.data, pts.many_complex_queries_bonus);
        b.reason(format!("Many complex SQL queries: {complex}"));
    } else if complex > 5 {
        add(&mut b.dims.data, pts.some_complex_queries_bonus);
        b.reason(format!("Some complex SQL queries: {complex}"));
    }
    if sql.flag_count("correlated_subqueries") > 5 {
        add(&mut b.dims.data, pts.correlated_subqueries_bonus);
        b.flag("correlated_subqueries");
        b.reason("Multiple correlated subqueries detected".to_string());
    }
    if sql.flag_count("cross_join") > 0 {
        add(&mut b.dims.data, pts.cross_join_bonus);
        b.flag("cross_joins");
        b.reason("CROSS JOINs detected".to_string());
    }
    if sql.flag_count("many_joins") > 3 {
        add(&mut b.dims.data, pts.many_joins_bonus);
        b.flag("many_joins");
        b.reason("Queries with many JOINs detected".to_string());
    }
}

fn score_operational(b: &mut ItemBuilder, inputs: &ScoringInputs<'_>, pts: &ScoringPoints) {
    if repo_has_streaming(inputs.files) {
        add(&mut b.dims.operational, pts.streaming_bonus);
        b.flag("streaming");
        b.reason("Streaming hints detected".to_string());
    }
    let high_freq = inputs
        .docs
        .iter()
        .filter(|d| d.kind == DocKind::Coordinator)
        .filter_map(|d| d.schedule.as_ref()?.frequency.as_deref())
        .filter(|f| is_high_frequency(f))
        .count();
    if high_freq > 0 {
        add(&mut b.dims.operational, scaled(high_freq, pts.schedule_high_freq_bonus));
        b.reason(format!("High-frequency coordinators: {high_freq}"));
    }
}

fn score_security(b: &mut ItemBuilder, findings: &[Finding], pts: &ScoringPoints) {
    let secrets = findings
        .iter()
        .filter(|f| f.group == FindingGroup::Secret)
        .count();
    if secrets > 0 {
        add(&mut b.dims.security, pts.secrets_bonus);
        b.flag("secrets");
        b.reason(format!("Potential secrets detected: {secrets}"));
    }
    let urls = findings.iter().filter(|f| f.group == FindingGroup::Url).count();
    if urls > 0 {
        add(&mut b.dims.security, count_u32(urls).min(pts.url_cap));
        b.reason(format!("URLs detected: {urls}"));
    }
}

// ---------------------------------------------------------------------------
// Per-document items
// ---------------------------------------------------------------------------

fn score_document(doc: &OrchestrationDoc, inputs: &ScoringInputs<'_>, rubric: &ScoringRubric) -> ComplexityItem {
    let pts = &rubric.points;
    let mut b = ItemBuilder::default();
    let item_id = format!("{}:{}", doc.kind.as_str(), doc.display_name());

    if !doc.is_ok() {
        b.flag("parse_failed");
        b.reason("Document could not be parsed".to_string());
        return b.finish(item_id, &rubric.thresholds);
    }

    match doc.kind {
        DocKind::Workflow => {
            let actions = doc.steps.len();
            add(&mut b.dims.orchestration, scaled(actions, pts.oozie_action));
            let control_flow = doc.control_flow.count();
            if control_flow > 0 {
                add(
                    &mut b.dims.orchestration,
                    control_flow.saturating_mul(pts.oozie_control_flow),
                );
                b.reason("Has fork/join/decision control flow".to_string());
            }
            let subworkflows = doc.subworkflow_count();
            if subworkflows > 0 {
                add(&mut b.dims.orchestration, scaled(subworkflows, pts.oozie_subworkflow));
                b.reason(format!("Sub-workflows: {subworkflows}"));
            }
            b.reason(format!("Actions: {actions}"));
        }
        DocKind::Coordinator => {
            if let Some(freq) = doc.schedule.as_ref().and_then(|s| s.frequency.as_deref()) {
                b.reason(format!("frequency={freq}"));
                if is_high_frequency(freq) {
                    add(&mut b.dims.operational, pts.schedule_high_freq_bonus);
                    b.reason("High-frequency schedule".to_string());
                }
            }
            if !doc.nested_refs.is_empty() {
                add(&mut b.dims.orchestration, pts.coordinator_trigger);
                b.reason("Triggers workflow-app".to_string());
            }
        }
        DocKind::Bundle => {
            let coordinators = doc.nested_refs.len();
            if coordinators > 0 {
                add(&mut b.dims.orchestration, scaled(coordinators, pts.bundle_coordinator));
                b.reason(format!("Coordinators: {coordinators}"));
            }
        }
    }

    let own: Vec<Finding> = inputs
        .findings
        .iter()
        .filter(|f| f.file == doc.source_file)
        .cloned()
        .collect();
    score_security(&mut b, &own, pts);

    b.finish(item_id, &rubric.thresholds)
}

/// Score the repository overview plus one item per orchestration document.
pub fn score_repository(inputs: &ScoringInputs<'_>, rubric: &ScoringRubric) -> ComplexityResult {
    let pts = &rubric.points;
    let mut repo = ItemBuilder::default();
    score_orchestration(&mut repo, inputs.docs, pts);
    score_technology(&mut repo, inputs, pts);
    score_data(&mut repo, inputs, pts);
    score_operational(&mut repo, inputs, pts);
    score_security(&mut repo, inputs.findings, pts);
    let overview = repo.finish("repo_overview".to_string(), &rubric.thresholds);

    let mut items = vec![overview.clone()];
    for kind in [DocKind::Workflow, DocKind::Coordinator, DocKind::Bundle] {
        items.extend(
            inputs
                .docs
                .iter()
                .filter(|d| d.kind == kind)
                .map(|d| score_document(d, inputs, rubric)),
        );
    }

    ComplexityResult {
        repo_level: overview.level,
        repo_score: overview.total_score,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, ControlFlow, FileKind, ParseStatus, Schedule, Step};

    fn entry(path: &str, kind: FileKind) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            extension: String::new(),
            kind,
            signals: Vec::new(),
            size_bytes: 10,
            lines_count: 1,
            words_count: 1,
            content_hash: String::new(),
            status: ParseStatus::Ok,
            status_message: None,
            has_streaming: false,
            has_dynamic_sql: false,
        }
    }

    fn finding(group: FindingGroup, file: &str) -> Finding {
        Finding {
            group,
            value: "x".to_string(),
            file: file.to_string(),
            line: 1,
            confidence: Confidence::High,
            rule: None,
        }
    }

    fn workflow(steps: usize, control_flow: ControlFlow) -> OrchestrationDoc {
        let mut doc = OrchestrationDoc::new(DocKind::Workflow, "wf/workflow.xml");
        doc.name = Some("daily".to_string());
        doc.control_flow = control_flow;
        for i in 0..steps {
            doc.steps.push(Step {
                name: format!("s{i}"),
                kind: "hive".to_string(),
                ..Step::default()
            });
        }
        doc
    }

    struct Fixture {
        files: Vec<FileEntry>,
        docs: Vec<OrchestrationDoc>,
        findings: Vec<Finding>,
        lineage: Vec<LineageRecord>,
        databases: DatabaseSummary,
        sql: SqlComplexitySummary,
        code: CodeHints,
    }

    impl Fixture {
        fn empty() -> Self {
            Self {
                files: Vec::new(),
                docs: Vec::new(),
                findings: Vec::new(),
                lineage: Vec::new(),
                databases: DatabaseSummary::default(),
                sql: SqlComplexitySummary::default(),
                code: CodeHints::default(),
            }
        }

        fn inputs(&self) -> ScoringInputs<'_> {
            ScoringInputs {
                files: &self.files,
                docs: &self.docs,
                findings: &self.findings,
                lineage: &self.lineage,
                databases: &self.databases,
                sql: &self.sql,
                code: &self.code,
            }
        }
    }

    #[test]
    fn test_classify_level_boundaries() {
        let t = ScoringThresholds::default();
        assert_eq!(classify_level(0, &t), ComplexityLevel::Low);
        assert_eq!(classify_level(39, &t), ComplexityLevel::Low);
        assert_eq!(classify_level(40, &t), ComplexityLevel::Medium);
        assert_eq!(classify_level(69, &t), ComplexityLevel::Medium);
        assert_eq!(classify_level(70, &t), ComplexityLevel::High);
    }

    #[test]
    fn test_high_frequency() {
        assert!(is_high_frequency("${coord:minutes(15)}"));
        assert!(is_high_frequency(" 30 "));
        assert!(!is_high_frequency("${coord:days(1)}"));
        assert!(!is_high_frequency("1440"));
    }

    #[test]
    fn test_empty_repository_scores_low() {
        let fx = Fixture::empty();
        let result = score_repository(&fx.inputs(), &ScoringRubric::default());
        assert_eq!(result.repo_score, 0);
        assert_eq!(result.repo_level, ComplexityLevel::Low);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item_id, "repo_overview");
    }

    #[test]
    fn test_repo_overview_dimensions() {
        let mut fx = Fixture::empty();
        fx.files = vec![
            entry("jobs/etl.py", FileKind::Python),
            entry("jobs/load.hql", FileKind::Hql),
            entry("streams/kafka_ingest/run.sh", FileKind::Shell),
        ];
        fx.files[1].has_dynamic_sql = true;
        fx.docs = vec![workflow(
            3,
            ControlFlow {
                has_fork_join: true,
                has_decision: true,
            },
        )];
        let mut coord = OrchestrationDoc::new(DocKind::Coordinator, "wf/coordinator.xml");
        coord.schedule = Some(Schedule {
            frequency: Some("${coord:minutes(10)}".to_string()),
            ..Schedule::default()
        });
        coord.nested_refs.push("wf".to_string());
        fx.docs.push(coord);
        fx.findings = vec![
            finding(FindingGroup::Secret, "conf/job.properties"),
            finding(FindingGroup::Jdbc, "jobs/etl.py"),
            finding(FindingGroup::Url, "a"),
            finding(FindingGroup::Url, "b"),
        ];

        let result = score_repository(&fx.inputs(), &ScoringRubric::default());
        let repo = &result.items[0];
        // 3 actions * 2 + 2 control-flow flags * 8
        assert_eq!(repo.dimension_scores.orchestration, 22);
        // multi-language + external system
        assert_eq!(repo.dimension_scores.technology, 15);
        assert_eq!(repo.dimension_scores.data, 10);
        // streaming path + one high-frequency coordinator
        assert_eq!(repo.dimension_scores.operational, 23);
        // secrets + two URLs
        assert_eq!(repo.dimension_scores.security, 17);
        assert_eq!(repo.total_score, 87);
        assert_eq!(result.repo_level, ComplexityLevel::High);
        assert_eq!(repo.risk_flags, vec!["dynamic_sql", "streaming", "secrets"]);
        assert!(repo.reasons.len() <= MAX_REASONS);

        let ids: Vec<&str> = result.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["repo_overview", "workflow:daily", "coordinator:wf/coordinator.xml"]);
        assert_eq!(result.items[1].dimension_scores.orchestration, 22);
        assert_eq!(result.items[2].dimension_scores.orchestration, 4);
        assert_eq!(result.items[2].dimension_scores.operational, 8);
    }

    #[test]
    fn test_lineage_and_url_caps() {
        let mut fx = Fixture::empty();
        fx.lineage = vec![LineageRecord {
            evidence_file: "q.sql".to_string(),
            sources: (0..40).map(|i| format!("db.t{i}")).collect(),
            targets: Vec::new(),
        }];
        fx.findings = (0..30).map(|i| finding(FindingGroup::Url, &format!("f{i}"))).collect();
        let result = score_repository(&fx.inputs(), &ScoringRubric::default());
        assert_eq!(result.items[0].dimension_scores.data, 25);
        assert_eq!(result.items[0].dimension_scores.security, 10);
    }

    #[test]
    fn test_failed_document_item() {
        let mut fx = Fixture::empty();
        fx.docs = vec![OrchestrationDoc::failed(DocKind::Bundle, "b.xml", "eof")];
        let result = score_repository(&fx.inputs(), &ScoringRubric::default());
        assert_eq!(result.items[1].item_id, "bundle:b.xml");
        assert_eq!(result.items[1].risk_flags, vec!["parse_failed"]);
        assert_eq!(result.items[1].total_score, 0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let mut fx = Fixture::empty();
        fx.files = vec![entry("a.py", FileKind::Python), entry("b.scala", FileKind::Scala)];
        fx.docs = vec![workflow(5, ControlFlow::default())];
        let rubric = ScoringRubric::default();
        let first = score_repository(&fx.inputs(), &rubric);
        let second = score_repository(&fx.inputs(), &rubric);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_rubric_weights() {
        let mut fx = Fixture::empty();
        fx.docs = vec![workflow(4, ControlFlow::default())];
        let mut rubric = ScoringRubric::default();
        rubric.points.oozie_action = 10;
        rubric.thresholds.low_max = 30;
        let result = score_repository(&fx.inputs(), &rubric);
        assert_eq!(result.repo_score, 40);
        assert_eq!(result.repo_level, ComplexityLevel::Medium);
    }

    #[test]
    fn test_huge_weights_saturate() {
        let mut fx = Fixture::empty();
        fx.docs = vec![workflow(4, ControlFlow::default())];
        let mut rubric = ScoringRubric::default();
        rubric.points.oozie_action = u32::MAX;
        let result = score_repository(&fx.inputs(), &rubric);
        assert_eq!(result.repo_score, u32::MAX);
        assert_eq!(result.repo_level, ComplexityLevel::High);
    }
}
