//! Database, schema, and table reference extraction from SQL text.
//!
//! Lines are processed in order and events within a line in position order,
//! so a `USE` statement applies to every reference after it, including later
//! on the same line.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::extract::lineage::{has_placeholder, PLACEHOLDER_RE};
use crate::models::{Confidence, FileKind, TableOperation, TableReference};
use crate::scanner::ScannedFile;

const TABLE_NAME: &str = r#"([`"\[\]\w.$\{\}:]+)"#;

static USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*USE\s+(?:DATABASE\s+|SCHEMA\s+)?([`"\[]?[\w$\{\}:]+[`"\]]?)"#)
        .unwrap()
});

static OPERATION_RES: LazyLock<Vec<(TableOperation, Regex)>> = LazyLock::new(|| {
    [
        (TableOperation::Select, r"(?i)\bFROM\s+"),
        (TableOperation::Join, r"(?i)\bJOIN\s+"),
        (
            TableOperation::Insert,
            r"(?i)\bINSERT\s+(?:INTO|OVERWRITE)\s+(?:TABLE\s+)?",
        ),
        (
            TableOperation::Create,
            r"(?i)\bCREATE\s+(?:EXTERNAL\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?",
        ),
        (TableOperation::Merge, r"(?i)\bMERGE\s+INTO\s+"),
        (TableOperation::Update, r"(?i)\bUPDATE\s+"),
        (TableOperation::Delete, r"(?i)\bDELETE\s+FROM\s+"),
        (TableOperation::Truncate, r"(?i)\bTRUNCATE\s+(?:TABLE\s+)?"),
    ]
    .into_iter()
    .map(|(op, prefix)| (op, Regex::new(&format!("{prefix}{TABLE_NAME}")).unwrap()))
    .collect()
});

const SKIPPED_WORDS: &[&str] = &[
    "IF", "NOT", "EXISTS", "EXTERNAL", "TABLE", "SELECT", "LATERAL", "UNNEST", "SET", "VALUES",
    "STATISTICS",
];

// ---------------------------------------------------------------------------
// Name helpers
// ---------------------------------------------------------------------------

/// Strip identifier quoting (backticks, double quotes, brackets).
pub fn clean_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '`' | '"' | '[' | ']'))
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string()
}

/// Split on `.` while keeping `${...}` placeholders atomic.
pub fn split_qualified_name(full_name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_placeholder = false;
    let mut chars = full_name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                in_placeholder = true;
                current.push(c);
            }
            '}' if in_placeholder => {
                in_placeholder = false;
                current.push(c);
            }
            '.' if !in_placeholder => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

// ---------------------------------------------------------------------------
// Per-file extraction
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UseStatement {
    pub database: String,
    pub line: usize,
}

/// Database context of a single file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FileDatabaseContext {
    pub file: String,
    pub use_statements: Vec<UseStatement>,
    pub references: Vec<TableReference>,
    /// Active database after the last line.
    pub active_database: Option<String>,
    pub variables_found: Vec<String>,
}

impl FileDatabaseContext {
    /// Placeholder-free databases referenced or selected with `USE`.
    pub fn databases(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self
            .references
            .iter()
            .filter_map(|r| r.database.clone())
            .filter(|db| !has_placeholder(db))
            .collect();
        out.extend(self.use_statements.iter().map(|u| u.database.clone()));
        out
    }
}

enum LineEvent {
    Use(String),
    Table(TableOperation, String),
}

fn build_reference(
    full_name: String,
    operation: TableOperation,
    active: Option<&str>,
    file: &str,
    line_number: usize,
) -> TableReference {
    let has_variables = has_placeholder(&full_name);
    let parts = split_qualified_name(&full_name);
    let (database, schema, table) = match parts.as_slice() {
        [table] => (None, None, table.clone()),
        [db, table] => (Some(db.clone()), None, table.clone()),
        [db, schema, table] => (Some(db.clone()), Some(schema.clone()), table.clone()),
        _ => (None, None, full_name.clone()),
    };

    let explicit = database.is_some();
    let (database, qualified_name, confidence) = if explicit {
        let qualifier_has_var = database.as_deref().is_some_and(has_placeholder)
            || schema.as_deref().is_some_and(has_placeholder);
        let qualified = [database.as_deref(), schema.as_deref(), Some(table.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".");
        let confidence = if qualifier_has_var {
            Confidence::Low
        } else {
            Confidence::High
        };
        (database, Some(qualified), confidence)
    } else if parts.len() == 1 && !has_variables {
        match active {
            Some(active) => {
                let confidence = if has_placeholder(active) {
                    Confidence::Low
                } else {
                    Confidence::Medium
                };
                (
                    Some(active.to_string()),
                    Some(format!("{active}.{table}")),
                    confidence,
                )
            }
            None => (None, None, Confidence::Low),
        }
    } else {
        (None, None, Confidence::Low)
    };

    TableReference {
        full_name,
        database,
        schema,
        table,
        qualified_name,
        operation,
        file: file.to_string(),
        line_number,
        confidence,
        has_variables,
    }
}

/// Extract `USE` statements and table references from one file.
pub fn extract_database_context(text: &str, file: &str) -> FileDatabaseContext {
    let mut ctx = FileDatabaseContext {
        file: file.to_string(),
        ..FileDatabaseContext::default()
    };
    let mut active: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.split("--").next().unwrap_or_default();

        let mut events: Vec<(usize, LineEvent)> = Vec::new();
        for caps in USE_RE.captures_iter(line) {
            if let Some(m) = caps.get(1) {
                let name = clean_identifier(m.as_str());
                if !name.is_empty() {
                    events.push((m.start(), LineEvent::Use(name)));
                }
            }
        }

        let mut table_events: BTreeMap<usize, (TableOperation, String)> = BTreeMap::new();
        for (operation, rx) in OPERATION_RES.iter() {
            for caps in rx.captures_iter(line) {
                let Some(m) = caps.get(1) else { continue };
                let name = clean_identifier(m.as_str());
                if name.is_empty()
                    || !name.chars().any(|c| c.is_alphanumeric())
                    || SKIPPED_WORDS.contains(&name.to_ascii_uppercase().as_str())
                {
                    continue;
                }
                // `DELETE FROM t` is also matched by the FROM pattern.
                match table_events.get(&m.start()) {
                    Some((existing, _)) if !existing.is_read() => {}
                    _ => {
                        table_events.insert(m.start(), (*operation, name));
                    }
                }
            }
        }
        events.extend(
            table_events
                .into_iter()
                .map(|(pos, (op, name))| (pos, LineEvent::Table(op, name))),
        );
        events.sort_by_key(|(pos, _)| *pos);

        for (_, event) in events {
            match event {
                LineEvent::Use(database) => {
                    ctx.use_statements.push(UseStatement {
                        database: database.clone(),
                        line: line_number,
                    });
                    active = Some(database);
                }
                LineEvent::Table(operation, name) => {
                    ctx.references.push(build_reference(
                        name,
                        operation,
                        active.as_deref(),
                        file,
                        line_number,
                    ));
                }
            }
        }
    }

    let variables: BTreeSet<String> = PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    ctx.variables_found = variables.into_iter().collect();
    ctx.active_database = active;
    ctx
}

// ---------------------------------------------------------------------------
// Repository aggregation
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseCounts {
    pub total_databases: usize,
    pub total_schemas: usize,
    pub total_source_table_refs: usize,
    pub total_target_table_refs: usize,
    pub total_qualified_tables: usize,
    pub total_unqualified_tables: usize,
    pub databases_with_tables: usize,
    pub total_variables: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DatabaseSummary {
    pub databases: Vec<String>,
    pub schemas: Vec<String>,
    pub source_tables: Vec<TableReference>,
    pub target_tables: Vec<TableReference>,
    /// Distinct qualified names (`db[.schema].table`).
    pub qualified_tables: Vec<String>,
    /// Tables referenced with no database, even after `USE` promotion.
    pub unqualified_tables: Vec<String>,
    pub files_by_database: BTreeMap<String, Vec<String>>,
    pub tables_by_database: BTreeMap<String, Vec<String>>,
    pub variables_found: Vec<String>,
    pub summary: DatabaseCounts,
}

impl DatabaseSummary {
    /// Databases referenced by more than one file.
    pub fn shared_database_count(&self) -> usize {
        self.files_by_database
            .values()
            .filter(|files| files.len() > 1)
            .count()
    }
}

fn scans_databases(kind: FileKind) -> bool {
    kind.is_sql()
        || kind.is_notebook()
        || matches!(
            kind,
            FileKind::OozieWorkflowXml | FileKind::OozieCoordinatorXml
        )
}

/// Aggregate per-file database contexts across the inventory.
pub fn extract_databases(files: &[ScannedFile]) -> DatabaseSummary {
    let mut databases = BTreeSet::new();
    let mut schemas = BTreeSet::new();
    let mut qualified = BTreeSet::new();
    let mut unqualified = BTreeSet::new();
    let mut variables = BTreeSet::new();
    let mut files_by_database: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut tables_by_database: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut summary = DatabaseSummary::default();

    for file in files.iter().filter(|f| scans_databases(f.kind())) {
        let Some(text) = file.text() else { continue };
        let ctx = extract_database_context(text, file.path());
        if ctx.references.is_empty() && ctx.use_statements.is_empty() {
            continue;
        }
        debug!(
            path = file.path(),
            references = ctx.references.len(),
            active = ?ctx.active_database,
            "database context"
        );

        for db in ctx.databases() {
            files_by_database
                .entry(db.clone())
                .or_default()
                .push(file.path().to_string());
            databases.insert(db);
        }
        variables.extend(ctx.variables_found.iter().cloned());

        for reference in ctx.references {
            if let Some(schema) = &reference.schema {
                schemas.insert(schema.clone());
            }
            match (&reference.database, &reference.qualified_name) {
                (Some(db), Some(name)) => {
                    qualified.insert(name.clone());
                    if !has_placeholder(db) {
                        tables_by_database
                            .entry(db.clone())
                            .or_default()
                            .insert(reference.table.clone());
                    }
                }
                _ => {
                    unqualified.insert(reference.table.clone());
                }
            }
            if reference.operation.is_read() {
                summary.source_tables.push(reference);
            } else {
                summary.target_tables.push(reference);
            }
        }
    }

    summary.databases = databases.into_iter().collect();
    summary.schemas = schemas.into_iter().collect();
    summary.qualified_tables = qualified.into_iter().collect();
    summary.unqualified_tables = unqualified.into_iter().collect();
    summary.files_by_database = files_by_database;
    summary.tables_by_database = tables_by_database
        .into_iter()
        .map(|(db, tables)| (db, tables.into_iter().collect()))
        .collect();
    summary.variables_found = variables.into_iter().collect();
    summary.summary = DatabaseCounts {
        total_databases: summary.databases.len(),
        total_schemas: summary.schemas.len(),
        total_source_table_refs: summary.source_tables.len(),
        total_target_table_refs: summary.target_tables.len(),
        total_qualified_tables: summary.qualified_tables.len(),
        total_unqualified_tables: summary.unqualified_tables.len(),
        databases_with_tables: summary.tables_by_database.len(),
        total_variables: summary.variables_found.len(),
    };
    summary
}
