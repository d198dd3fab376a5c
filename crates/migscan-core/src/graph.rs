//! Dependency graph over orchestration documents, their steps, and the
//! paths and artifacts those steps reference.
//!
//! Node ids are `{prefix}:{value}` where prefix is one of `workflow`,
//! `coordinator`, `bundle`, `action`, `path` or `ref`. The builder is purely
//! additive: a node is created the first time its id is seen and later
//! metadata for the same id is ignored.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{
    Confidence, DocKind, DocStatus, EdgeKind, GraphEdge, GraphNode, NodeKind, OrchestrationDoc, Step,
};
use crate::scanner::ScannedFile;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    pub nodes: IndexMap<String, GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn node_id(kind: NodeKind, value: &str) -> String {
    format!("{}:{}", kind.prefix(), value)
}

impl DependencyGraph {
    /// Insert a node unless one with the same id exists. Returns the id.
    pub fn ensure_node(
        &mut self,
        kind: NodeKind,
        value: &str,
        meta: IndexMap<String, String>,
    ) -> String {
        let id = node_id(kind, value);
        self.nodes.entry(id.clone()).or_insert_with(|| GraphNode {
            id: id.clone(),
            kind,
            meta,
        });
        id
    }

    pub fn add_edge(
        &mut self,
        src: &str,
        dst: &str,
        kind: EdgeKind,
        confidence: Confidence,
        evidence: Option<String>,
    ) {
        self.edges.push(GraphEdge {
            src: src.to_string(),
            dst: dst.to_string(),
            kind,
            confidence,
            evidence,
        });
    }

    pub fn edges_from<'a>(&'a self, src: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.src == src)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// ---------------------------------------------------------------------------
// Inventory lookup
// ---------------------------------------------------------------------------

struct Inventory<'a> {
    paths: HashSet<&'a str>,
    dirs: HashSet<&'a str>,
}

impl<'a> Inventory<'a> {
    fn new(files: &'a [ScannedFile]) -> Self {
        let paths: HashSet<&str> = files.iter().map(|f| f.path()).collect();
        let mut dirs = HashSet::new();
        for &path in &paths {
            for (idx, _) in path.match_indices('/') {
                dirs.insert(&path[..idx]);
            }
        }
        Self { paths, dirs }
    }

    fn has(&self, candidate: &str) -> bool {
        self.paths.contains(candidate) || self.dirs.contains(candidate)
    }

    /// A referenced value matches when it names an inventory file or
    /// directory directly, relative to the referencing document, or as the
    /// tail of a longer location such as `hdfs://nn/user/apps/x`.
    fn contains(&self, value: &str, doc_file: &str) -> bool {
        let value = value.trim().trim_start_matches("./").trim_end_matches('/');
        if value.is_empty() {
            return false;
        }
        if self.has(value) {
            return true;
        }
        if let Some((dir, _)) = doc_file.rsplit_once('/') {
            if self.has(&format!("{dir}/{value}")) {
                return true;
            }
        }
        value.match_indices('/').any(|(idx, _)| {
            let tail = &value[idx + 1..];
            tail.contains('/') && self.has(tail)
        })
    }

    fn confidence(&self, value: &str, doc_file: &str) -> Confidence {
        if self.contains(value, doc_file) {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}

fn meta<const N: usize>(pairs: [(&str, &str); N]) -> IndexMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

fn doc_node(graph: &mut DependencyGraph, doc: &OrchestrationDoc) -> String {
    let mut m = meta([("source_file", doc.source_file.as_str())]);
    match &doc.status {
        DocStatus::Ok => {
            m.insert("status".to_string(), "ok".to_string());
        }
        DocStatus::Failed { message } => {
            m.insert("status".to_string(), "failed".to_string());
            m.insert("message".to_string(), message.clone());
        }
    }
    if let Some(schedule) = &doc.schedule {
        for (key, value) in [
            ("frequency", &schedule.frequency),
            ("start", &schedule.start),
            ("end", &schedule.end),
            ("timezone", &schedule.timezone),
        ] {
            if let Some(v) = value {
                m.insert(key.to_string(), v.clone());
            }
        }
    }
    graph.ensure_node(doc.kind.into(), doc.display_name(), m)
}

fn link(
    graph: &mut DependencyGraph,
    inventory: &Inventory<'_>,
    doc: &OrchestrationDoc,
    src: &str,
    target: (NodeKind, &str),
    field: &str,
    edge: EdgeKind,
) {
    let (kind, value) = target;
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let dst = graph.ensure_node(kind, value, meta([("kind", field)]));
    let confidence = inventory.confidence(value, &doc.source_file);
    graph.add_edge(src, &dst, edge, confidence, Some(format!("{field}={value}")));
}

fn step_edges(
    graph: &mut DependencyGraph,
    inventory: &Inventory<'_>,
    doc: &OrchestrationDoc,
    doc_id: &str,
    step: &Step,
) {
    let step_value = format!("{}/{}", doc.display_name(), step.name);
    let step_id = graph.ensure_node(
        NodeKind::Action,
        &step_value,
        meta([("type", step.kind.as_str()), ("source_file", doc.source_file.as_str())]),
    );
    graph.add_edge(
        doc_id,
        &step_id,
        EdgeKind::Contains,
        Confidence::High,
        Some(format!("{}={}", doc.kind.as_str(), doc.display_name())),
    );

    let refs = EdgeKind::References;
    if let Some(main) = &step.main {
        link(graph, inventory, doc, &step_id, (NodeKind::Reference, main), "main", refs);
    }
    for arg in &step.args {
        link(graph, inventory, doc, &step_id, (NodeKind::Reference, arg), "arg", refs);
    }
    for file in &step.files {
        link(graph, inventory, doc, &step_id, (NodeKind::Path, file), "file", refs);
    }
    for archive in &step.archives {
        link(graph, inventory, doc, &step_id, (NodeKind::Path, archive), "archive", refs);
    }
    for job_xml in &step.job_xmls {
        link(graph, inventory, doc, &step_id, (NodeKind::Path, job_xml), "job-xml", refs);
    }
    if let Some(app_path) = &step.subworkflow_app_path {
        link(
            graph,
            inventory,
            doc,
            &step_id,
            (NodeKind::Path, app_path),
            "sub-workflow",
            refs,
        );
    }
}

/// Build the graph for `docs`, checking referenced paths against `files`.
pub fn build_dependency_graph(files: &[ScannedFile], docs: &[OrchestrationDoc]) -> DependencyGraph {
    let inventory = Inventory::new(files);
    let mut graph = DependencyGraph::default();

    for doc in docs {
        let doc_id = doc_node(&mut graph, doc);
        for step in &doc.steps {
            step_edges(&mut graph, &inventory, doc, &doc_id, step);
        }
        let field = match doc.kind {
            DocKind::Workflow => continue,
            DocKind::Coordinator => "workflow_app_path",
            DocKind::Bundle => "coordinator_app_path",
        };
        for nested in &doc.nested_refs {
            link(
                &mut graph,
                &inventory,
                doc,
                &doc_id,
                (NodeKind::Path, nested),
                field,
                EdgeKind::Triggers,
            );
        }
    }
    graph
}
