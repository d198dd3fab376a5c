//! Cycle detection, name classification, and in-place propagation of
//! resolved values into extracted records.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::config::ResolutionConfig;
use crate::extract::lineage::placeholder_names;
use crate::models::{
    Finding, HitOwner, LineageRecord, OrchestrationDoc, ResolutionRecord, ResolutionStatus,
    UnresolvedHit, UnresolvedReason,
};
use crate::resolution::definitions::DefinitionTable;
use crate::resolution::substitute::{substitute, Lookup, Substitution};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionOutput {
    pub resolved: Vec<ResolutionRecord>,
    pub partial: Vec<ResolutionRecord>,
    pub unresolved: Vec<ResolutionRecord>,
    pub hits: Vec<UnresolvedHit>,
    /// Invalid detection patterns skipped while compiling the pattern tables.
    pub dropped_patterns: usize,
}

impl ResolutionOutput {
    pub fn referenced_count(&self) -> usize {
        self.resolved.len() + self.partial.len() + self.unresolved.len()
    }

    /// Replace raw, final and candidate values of every record for which
    /// `is_secret(name, value)` holds.
    pub fn redact_values(
        &mut self,
        is_secret: impl Fn(&str, &str) -> bool,
        redact: impl Fn(&str) -> String,
    ) {
        let records = self
            .resolved
            .iter_mut()
            .chain(self.partial.iter_mut())
            .chain(self.unresolved.iter_mut());
        for record in records {
            let secret = record
                .definitions
                .iter()
                .any(|d| is_secret(&record.name, &d.value));
            if !secret {
                continue;
            }
            for value in [&mut record.raw_value, &mut record.value].into_iter().flatten() {
                *value = redact(value);
            }
            for def in &mut record.definitions {
                def.value = redact(&def.value);
            }
        }
    }

    pub fn status_of(&self, name: &str) -> Option<ResolutionStatus> {
        [&self.resolved, &self.partial, &self.unresolved]
            .into_iter()
            .flatten()
            .find(|r| r.name == name)
            .map(|r| r.status)
    }
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

/// Names whose winning value reaches themselves through other winners.
pub fn find_cyclic(table: &DefinitionTable) -> BTreeSet<String> {
    let deps: HashMap<&str, Vec<String>> = table
        .winners()
        .map(|d| {
            let refs = placeholder_names(&d.value)
                .into_iter()
                .filter(|n| table.winner(n).is_some())
                .collect();
            (d.name.as_str(), refs)
        })
        .collect();

    let mut cyclic = BTreeSet::new();
    for (&start, direct) in &deps {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = direct.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            if name == start {
                cyclic.insert(start.to_string());
                break;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(next) = deps.get(name) {
                stack.extend(next.iter().map(String::as_str));
            }
        }
    }
    cyclic
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Substitution lookup built from winning definitions, with cyclic names
/// removed so their tokens are left intact.
pub struct Resolver<'a> {
    table: &'a DefinitionTable,
    lookup: Lookup,
    cyclic: BTreeSet<String>,
    max_iterations: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a DefinitionTable, max_iterations: usize) -> Self {
        let cyclic = find_cyclic(table);
        let lookup = table
            .winners()
            .filter(|d| !cyclic.contains(&d.name))
            .map(|d| (d.name.clone(), d.value.clone()))
            .collect();
        Self {
            table,
            lookup,
            cyclic,
            max_iterations,
        }
    }

    pub fn resolve(&self, text: &str) -> Substitution {
        substitute(text, &self.lookup, self.max_iterations)
    }

    pub fn is_cyclic(&self, name: &str) -> bool {
        self.cyclic.contains(name)
    }

    /// Classify one referenced name.
    pub fn record(&self, name: &str) -> ResolutionRecord {
        let definitions = self.table.candidates(name).to_vec();
        let Some(winner) = self.table.winner(name) else {
            return ResolutionRecord {
                name: name.to_string(),
                status: ResolutionStatus::Unresolved,
                raw_value: None,
                value: None,
                leftover: Vec::new(),
                reason: Some(UnresolvedReason::NoDefinition),
                definitions,
            };
        };
        if self.is_cyclic(name) {
            return ResolutionRecord {
                name: name.to_string(),
                status: ResolutionStatus::Unresolved,
                raw_value: Some(winner.value.clone()),
                value: Some(winner.value.clone()),
                leftover: placeholder_names(&winner.value),
                reason: Some(UnresolvedReason::Cyclic),
                definitions,
            };
        }
        let out = self.resolve(&winner.value);
        let status = if out.is_complete() {
            ResolutionStatus::Resolved
        } else {
            ResolutionStatus::Partial
        };
        ResolutionRecord {
            name: name.to_string(),
            status,
            raw_value: Some(winner.value.clone()),
            value: Some(out.value),
            leftover: out.leftover,
            reason: None,
            definitions,
        }
    }
}

// ---------------------------------------------------------------------------
// Referenced names
// ---------------------------------------------------------------------------

fn doc_strings(doc: &OrchestrationDoc) -> impl Iterator<Item = &str> {
    let steps = doc.steps.iter().flat_map(|s| {
        s.main
            .iter()
            .chain(&s.args)
            .chain(&s.files)
            .chain(&s.archives)
            .chain(&s.job_xmls)
            .chain(s.subworkflow_app_path.iter())
    });
    let schedule = doc.schedule.iter().flat_map(|s| {
        s.frequency
            .iter()
            .chain(s.start.iter())
            .chain(s.end.iter())
            .chain(s.timezone.iter())
    });
    steps
        .chain(&doc.nested_refs)
        .chain(schedule)
        .chain(doc.datasets.iter().map(|d| &d.uri_template))
        .map(String::as_str)
}

/// Every variable name defined or referenced anywhere in the inputs.
pub fn referenced_names(
    table: &DefinitionTable,
    findings: &[Finding],
    docs: &[OrchestrationDoc],
    lineage: &[LineageRecord],
) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for def in table.all_definitions() {
        names.insert(def.name.clone());
        names.extend(placeholder_names(&def.value));
    }
    let texts = findings
        .iter()
        .map(|f| f.value.as_str())
        .chain(docs.iter().flat_map(doc_strings))
        .chain(
            lineage
                .iter()
                .flat_map(|r| r.sources.iter().chain(&r.targets))
                .map(String::as_str),
        );
    for text in texts {
        names.extend(placeholder_names(text));
    }
    names
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

struct Propagator<'r, 'a> {
    resolver: &'r Resolver<'a>,
    hits: Vec<UnresolvedHit>,
}

impl Propagator<'_, '_> {
    fn emit(&mut self, owner: HitOwner, field: &str, file: &str, line: Option<usize>, names: Vec<String>) {
        for name in names {
            self.hits.push(UnresolvedHit {
                owner,
                field: field.to_string(),
                file: file.to_string(),
                line,
                name,
            });
        }
    }

    fn one(&mut self, value: &mut String, owner: HitOwner, field: &str, file: &str, line: Option<usize>) {
        let out = self.resolver.resolve(value);
        *value = out.value;
        self.emit(owner, field, file, line, out.leftover);
    }

    fn opt(&mut self, value: &mut Option<String>, owner: HitOwner, field: &str, file: &str) {
        if let Some(v) = value.as_mut() {
            self.one(v, owner, field, file, None);
        }
    }

    /// Rewrite a list field; leftovers are reported once per field.
    fn many(&mut self, values: &mut [String], owner: HitOwner, field: &str, file: &str) {
        let mut leftover: Vec<String> = Vec::new();
        for value in values.iter_mut() {
            let out = self.resolver.resolve(value);
            *value = out.value;
            for name in out.leftover {
                if !leftover.contains(&name) {
                    leftover.push(name);
                }
            }
        }
        self.emit(owner, field, file, None, leftover);
    }

    fn document(&mut self, doc: &mut OrchestrationDoc) {
        let file = doc.source_file.clone();
        for step in &mut doc.steps {
            let prefix = step.name.clone();
            self.opt(&mut step.main, HitOwner::Step, &format!("{prefix}.main"), &file);
            self.many(&mut step.args, HitOwner::Step, &format!("{prefix}.args"), &file);
            self.many(&mut step.files, HitOwner::Step, &format!("{prefix}.files"), &file);
            self.many(&mut step.archives, HitOwner::Step, &format!("{prefix}.archives"), &file);
            self.many(&mut step.job_xmls, HitOwner::Step, &format!("{prefix}.job_xmls"), &file);
            self.opt(
                &mut step.subworkflow_app_path,
                HitOwner::Step,
                &format!("{prefix}.subworkflow_app_path"),
                &file,
            );
        }
        self.many(&mut doc.nested_refs, HitOwner::Document, "nested_refs", &file);
        if let Some(schedule) = doc.schedule.as_mut() {
            self.opt(&mut schedule.frequency, HitOwner::Document, "schedule.frequency", &file);
            self.opt(&mut schedule.start, HitOwner::Document, "schedule.start", &file);
            self.opt(&mut schedule.end, HitOwner::Document, "schedule.end", &file);
            self.opt(&mut schedule.timezone, HitOwner::Document, "schedule.timezone", &file);
        }
        for dataset in &mut doc.datasets {
            let field = format!("datasets.{}.uri_template", dataset.name);
            self.one(&mut dataset.uri_template, HitOwner::Document, &field, &file, None);
        }
    }
}

/// Classify every referenced name and rewrite findings, orchestration
/// fields and lineage in place.
pub fn resolve_repository(
    table: &DefinitionTable,
    findings: &mut [Finding],
    docs: &mut [OrchestrationDoc],
    lineage: &mut [LineageRecord],
    config: &ResolutionConfig,
) -> ResolutionOutput {
    let resolver = Resolver::new(table, config.max_iterations);
    let names = referenced_names(table, findings, docs, lineage);

    let mut output = ResolutionOutput::default();
    for name in &names {
        let record = resolver.record(name);
        debug!(name = %name, status = ?record.status, "classified");
        match record.status {
            ResolutionStatus::Resolved => output.resolved.push(record),
            ResolutionStatus::Partial => output.partial.push(record),
            ResolutionStatus::Unresolved => output.unresolved.push(record),
        }
    }

    let mut propagator = Propagator {
        resolver: &resolver,
        hits: Vec::new(),
    };
    for finding in findings.iter_mut() {
        let file = finding.file.clone();
        let line = Some(finding.line);
        propagator.one(&mut finding.value, HitOwner::Finding, "value", &file, line);
    }
    for doc in docs.iter_mut() {
        propagator.document(doc);
    }
    for record in lineage.iter_mut() {
        let file = record.evidence_file.clone();
        propagator.many(&mut record.sources, HitOwner::Lineage, "sources", &file);
        propagator.many(&mut record.targets, HitOwner::Lineage, "targets", &file);
    }
    output.hits = propagator.hits;
    output
}
