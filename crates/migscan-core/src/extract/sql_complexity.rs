//! Heuristic SQL complexity metrics.
//!
//! Each statement is normalized (comments stripped, whitespace collapsed)
//! and scored across eight dimensions. Scores are risk indicators, not a
//! cost model.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::scanner::ScannedFile;

const WINDOW_FUNCTIONS: &[&str] = &[
    "ROW_NUMBER",
    "RANK",
    "DENSE_RANK",
    "NTILE",
    "LAG",
    "LEAD",
    "FIRST_VALUE",
    "LAST_VALUE",
    "NTH_VALUE",
    "PERCENT_RANK",
    "CUME_DIST",
    "PERCENTILE_CONT",
    "PERCENTILE_DISC",
];

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "STDDEV",
    "VARIANCE",
    "STRING_AGG",
    "ARRAY_AGG",
    "LISTAGG",
    "GROUP_CONCAT",
];

const SNIPPET_CHARS: usize = 200;
const TOP_COMPLEX: usize = 10;

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"--[^\n]*"));
static BLOCK_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?s)/\*.*?\*/"));
static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)\b(INNER\s+JOIN|LEFT\s+(?:OUTER\s+)?JOIN|RIGHT\s+(?:OUTER\s+)?JOIN|FULL\s+(?:OUTER\s+)?JOIN|CROSS\s+JOIN|JOIN)\b")
});
static SELF_JOIN_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)\b(?:FROM|JOIN)\s+([\w.]+)\s+(?:AS\s+)?(\w+)"));
static SUBQUERY_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\(\s*SELECT\b"));
static CORRELATED_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?is)WHERE.*?=.*?\(.*?SELECT"));
static IN_SELECT_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)SELECT[^(]*\([^)]*SELECT"));
static IN_WHERE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)WHERE[^(]*\([^)]*SELECT"));
static IN_FROM_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)FROM[^(]*\([^)]*SELECT"));
static CTE_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)(?:\bWITH\s+(?:RECURSIVE\s+)?|,\s*)(\w+)\s+AS\s*\("));
static RECURSIVE_CTE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bWITH\s+RECURSIVE\b"));
static WINDOW_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(&format!(r"(?i)\b({})\s*\(", WINDOW_FUNCTIONS.join("|"))));
static AGGREGATE_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(&format!(r"(?i)\b({})\s*\(", AGGREGATE_FUNCTIONS.join("|"))));
static PARTITION_BY_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bPARTITION\s+BY\b"));
static ORDER_BY_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bORDER\s+BY\b"));
static GROUP_BY_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bGROUP\s+BY\b"));
static HAVING_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bHAVING\b"));
static DISTINCT_AGG_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)\b(?:COUNT|SUM|AVG)\s*\(\s*DISTINCT\b"));
static SET_OP_RE: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)\b(UNION|INTERSECT|EXCEPT|MINUS)\b"));
static UNION_ALL_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bUNION\s+ALL\b"));
static CASE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bCASE\b"));
static CASE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?is)\bCASE\b.*?\bEND\b"));
static WHEN_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bWHEN\b"));
static COALESCE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bCOALESCE\s*\("));
static NULLIF_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bNULLIF\s*\("));
static CAST_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bCAST\s*\("));
static CREATE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bCREATE\s+(?:EXTERNAL\s+)?(?:TABLE|VIEW|INDEX)\b"));
static ALTER_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bALTER\s+TABLE\b"));
static DROP_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bDROP\s+(?:TABLE|VIEW|INDEX)\b"));
static TRUNCATE_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bTRUNCATE\s+TABLE\b"));
static PARTITION_OP_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bPARTITION(?:ED)?\s+BY\b"));
static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)\bINDEX\b"));
static DYNAMIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)EXECUTE\s+IMMEDIATE",
        r"(?i)EXEC\s*\(",
        r"(?i)sp_executesql",
        r"(?i)\|\|.*SELECT",
        r"(?i)\+.*SELECT",
    ]
    .into_iter()
    .map(rx)
    .collect()
});
static NESTED_VIEW_RE: LazyLock<Regex> = LazyLock::new(|| rx(r"(?i)FROM\s+[\w.]*view\w*"));

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlComplexityBand {
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl SqlComplexityBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=20 => SqlComplexityBand::Simple,
            21..=50 => SqlComplexityBand::Moderate,
            51..=80 => SqlComplexityBand::Complex,
            _ => SqlComplexityBand::VeryComplex,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEstimate {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JoinMetrics {
    pub total_joins: u32,
    pub join_types: BTreeMap<String, u32>,
    pub max_tables_joined: u32,
    pub has_self_join: bool,
    pub has_cross_join: bool,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubqueryMetrics {
    pub total_subqueries: u32,
    pub max_nesting_depth: u32,
    pub correlated_subqueries: u32,
    pub subqueries_in_select: u32,
    pub subqueries_in_where: u32,
    pub subqueries_in_from: u32,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CteMetrics {
    pub total_ctes: u32,
    pub recursive_ctes: u32,
    pub cte_names: Vec<String>,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WindowMetrics {
    pub total_window_functions: u32,
    pub window_function_types: Vec<String>,
    pub has_partition_by: bool,
    pub has_order_by: bool,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateMetrics {
    pub total_aggregates: u32,
    pub aggregate_types: BTreeMap<String, u32>,
    pub has_group_by: bool,
    pub has_having: bool,
    pub distinct_aggregates: u32,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SetOperationMetrics {
    pub total_set_operations: u32,
    pub operation_types: BTreeMap<String, u32>,
    pub has_union_all: bool,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ControlMetrics {
    pub total_case_statements: u32,
    pub max_case_branches: u32,
    pub has_coalesce: bool,
    pub has_nullif: bool,
    pub has_cast: bool,
    pub score: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchemaMutationMetrics {
    pub has_create: bool,
    pub has_alter: bool,
    pub has_drop: bool,
    pub has_truncate: bool,
    pub partition_operations: u32,
    pub index_operations: u32,
    pub score: u32,
}

/// Complexity of a single statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SqlComplexityResult {
    pub file_path: String,
    pub line_number: usize,
    pub query_snippet: String,
    pub query_length: usize,
    pub query_lines: usize,
    pub joins: JoinMetrics,
    pub subqueries: SubqueryMetrics,
    pub ctes: CteMetrics,
    pub window_functions: WindowMetrics,
    pub aggregates: AggregateMetrics,
    pub set_operations: SetOperationMetrics,
    pub control_structures: ControlMetrics,
    pub schema_mutation: SchemaMutationMetrics,
    pub total_score: u32,
    pub band: SqlComplexityBand,
    pub risk_flags: Vec<String>,
    pub has_dynamic_sql: bool,
    pub has_nested_views: bool,
    pub execution_estimate: ExecutionEstimate,
}

impl SqlComplexityResult {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.risk_flags.iter().any(|f| f == flag)
    }
}

// ---------------------------------------------------------------------------
// Dimension analyzers
// ---------------------------------------------------------------------------

fn count(re: &Regex, text: &str) -> u32 {
    re.find_iter(text).count() as u32
}

/// Strip comments and collapse whitespace.
pub fn normalize_sql(sql: &str) -> String {
    let without_line = LINE_COMMENT_RE.replace_all(sql, "");
    let without_block = BLOCK_COMMENT_RE.replace_all(&without_line, "");
    without_block.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bracket nesting of the raw text, halved and capped at 10.
pub fn nesting_depth(raw: &str) -> u32 {
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;
    for c in raw.chars() {
        match c {
            '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    (max_depth / 2).min(10)
}

fn analyze_joins(sql: &str) -> JoinMetrics {
    let mut join_types: BTreeMap<String, u32> = BTreeMap::new();
    for m in JOIN_RE.find_iter(sql) {
        let kind = m
            .as_str()
            .to_ascii_uppercase()
            .split_whitespace()
            .filter(|w| *w != "OUTER")
            .collect::<Vec<_>>()
            .join(" ");
        *join_types.entry(kind).or_default() += 1;
    }
    let total_joins: u32 = join_types.values().sum();
    let cross = join_types.get("CROSS JOIN").copied().unwrap_or(0);

    let mut seen = std::collections::HashSet::new();
    let has_self_join = SELF_JOIN_RE
        .captures_iter(sql)
        .any(|caps| !seen.insert(caps[1].to_ascii_uppercase()));

    let score = total_joins * 5
        + cross * 15
        + if has_self_join { 10 } else { 0 }
        + total_joins.saturating_sub(3) * 3;
    JoinMetrics {
        total_joins,
        join_types,
        max_tables_joined: total_joins + 1,
        has_self_join,
        has_cross_join: cross > 0,
        score,
    }
}

fn analyze_subqueries(sql: &str, raw: &str) -> SubqueryMetrics {
    let total_subqueries = count(&SUBQUERY_RE, sql);
    let max_nesting_depth = nesting_depth(raw);
    let correlated_subqueries = count(&CORRELATED_RE, sql);
    SubqueryMetrics {
        total_subqueries,
        max_nesting_depth,
        correlated_subqueries,
        subqueries_in_select: count(&IN_SELECT_RE, sql),
        subqueries_in_where: count(&IN_WHERE_RE, sql),
        subqueries_in_from: count(&IN_FROM_RE, sql),
        score: total_subqueries * 8 + max_nesting_depth * 10 + correlated_subqueries * 12,
    }
}

fn analyze_ctes(sql: &str) -> CteMetrics {
    let cte_names: Vec<String> = if sql.to_ascii_uppercase().contains("WITH") {
        CTE_RE
            .captures_iter(sql)
            .map(|caps| caps[1].to_string())
            .collect()
    } else {
        Vec::new()
    };
    let total_ctes = cte_names.len() as u32;
    let recursive_ctes = count(&RECURSIVE_CTE_RE, sql);
    CteMetrics {
        total_ctes,
        recursive_ctes,
        cte_names,
        score: total_ctes * 5 + recursive_ctes * 20 + total_ctes.saturating_sub(2) * 3,
    }
}

fn analyze_windows(sql: &str) -> WindowMetrics {
    let mut types: Vec<String> = Vec::new();
    let mut total = 0;
    for caps in WINDOW_RE.captures_iter(sql) {
        total += 1;
        let name = caps[1].to_ascii_uppercase();
        if !types.contains(&name) {
            types.push(name);
        }
    }
    types.sort();
    let has_partition_by = PARTITION_BY_RE.is_match(sql);
    let has_order_by = ORDER_BY_RE.is_match(sql);
    WindowMetrics {
        total_window_functions: total,
        window_function_types: types,
        has_partition_by,
        has_order_by,
        score: total * 10
            + if has_partition_by { 5 } else { 0 }
            + if has_order_by { 3 } else { 0 },
    }
}

fn analyze_aggregates(sql: &str) -> AggregateMetrics {
    let mut aggregate_types: BTreeMap<String, u32> = BTreeMap::new();
    for caps in AGGREGATE_RE.captures_iter(sql) {
        *aggregate_types
            .entry(caps[1].to_ascii_uppercase())
            .or_default() += 1;
    }
    let total_aggregates: u32 = aggregate_types.values().sum();
    let has_group_by = GROUP_BY_RE.is_match(sql);
    let has_having = HAVING_RE.is_match(sql);
    let distinct_aggregates = count(&DISTINCT_AGG_RE, sql);
    AggregateMetrics {
        total_aggregates,
        aggregate_types,
        has_group_by,
        has_having,
        distinct_aggregates,
        score: total_aggregates * 3
            + if has_group_by { 5 } else { 0 }
            + if has_having { 5 } else { 0 }
            + distinct_aggregates * 5,
    }
}

fn analyze_set_operations(sql: &str) -> SetOperationMetrics {
    let mut operation_types: BTreeMap<String, u32> = BTreeMap::new();
    for caps in SET_OP_RE.captures_iter(sql) {
        *operation_types
            .entry(caps[1].to_ascii_uppercase())
            .or_default() += 1;
    }
    let total: u32 = operation_types.values().sum();
    SetOperationMetrics {
        total_set_operations: total,
        operation_types,
        has_union_all: UNION_ALL_RE.is_match(sql),
        score: total * 8,
    }
}

fn analyze_control(sql: &str) -> ControlMetrics {
    let total_case_statements = count(&CASE_RE, sql);
    let max_case_branches = CASE_BLOCK_RE
        .find_iter(sql)
        .map(|block| count(&WHEN_RE, block.as_str()))
        .max()
        .unwrap_or(0);
    let has_coalesce = COALESCE_RE.is_match(sql);
    let has_nullif = NULLIF_RE.is_match(sql);
    let has_cast = CAST_RE.is_match(sql);
    ControlMetrics {
        total_case_statements,
        max_case_branches,
        has_coalesce,
        has_nullif,
        has_cast,
        score: total_case_statements * 5
            + max_case_branches.saturating_sub(3) * 2
            + if has_coalesce { 2 } else { 0 }
            + if has_nullif { 2 } else { 0 }
            + u32::from(has_cast),
    }
}

fn analyze_schema_mutation(sql: &str) -> SchemaMutationMetrics {
    let has_create = CREATE_RE.is_match(sql);
    let has_alter = ALTER_RE.is_match(sql);
    let has_drop = DROP_RE.is_match(sql);
    let has_truncate = TRUNCATE_RE.is_match(sql);
    let partition_operations = count(&PARTITION_OP_RE, sql);
    let index_operations = count(&INDEX_RE, sql);
    SchemaMutationMetrics {
        has_create,
        has_alter,
        has_drop,
        has_truncate,
        partition_operations,
        index_operations,
        score: if has_create { 10 } else { 0 }
            + if has_alter { 8 } else { 0 }
            + if has_drop { 5 } else { 0 }
            + if has_truncate { 5 } else { 0 }
            + partition_operations * 5
            + index_operations * 3,
    }
}

fn risk_flags(
    joins: &JoinMetrics,
    subqueries: &SubqueryMetrics,
    ctes: &CteMetrics,
    windows: &WindowMetrics,
    aggregates: &AggregateMetrics,
    set_operations: &SetOperationMetrics,
) -> Vec<String> {
    [
        (joins.total_joins > 5, "many_joins"),
        (joins.has_cross_join, "cross_join"),
        (joins.has_self_join, "self_join"),
        (subqueries.max_nesting_depth > 3, "deep_nesting"),
        (subqueries.correlated_subqueries > 0, "correlated_subqueries"),
        (ctes.recursive_ctes > 0, "recursive_cte"),
        (ctes.total_ctes > 5, "many_ctes"),
        (windows.total_window_functions > 3, "many_window_functions"),
        (aggregates.distinct_aggregates > 2, "distinct_aggregates"),
        (set_operations.total_set_operations > 2, "many_set_operations"),
    ]
    .into_iter()
    .filter(|(hit, _)| *hit)
    .map(|(_, flag)| flag.to_string())
    .collect()
}

fn execution_estimate(
    joins: &JoinMetrics,
    subqueries: &SubqueryMetrics,
    total_score: u32,
) -> ExecutionEstimate {
    let mut factors = 0;
    if joins.has_cross_join {
        factors += 2;
    }
    if joins.total_joins > 5 {
        factors += 1;
    }
    if subqueries.correlated_subqueries > 0 {
        factors += 2;
    }
    if subqueries.max_nesting_depth > 3 {
        factors += 1;
    }
    if factors >= 3 || total_score > 100 {
        ExecutionEstimate::VeryHigh
    } else if factors >= 2 || total_score > 60 {
        ExecutionEstimate::High
    } else if total_score > 30 {
        ExecutionEstimate::Medium
    } else {
        ExecutionEstimate::Low
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Score one statement.
pub fn analyze_query(raw: &str, file_path: &str, line_number: usize) -> SqlComplexityResult {
    let sql = normalize_sql(raw);
    let joins = analyze_joins(&sql);
    let subqueries = analyze_subqueries(&sql, raw);
    let ctes = analyze_ctes(&sql);
    let window_functions = analyze_windows(&sql);
    let aggregates = analyze_aggregates(&sql);
    let set_operations = analyze_set_operations(&sql);
    let control_structures = analyze_control(&sql);
    let schema_mutation = analyze_schema_mutation(&sql);

    let total_score = joins.score
        + subqueries.score
        + ctes.score
        + window_functions.score
        + aggregates.score
        + set_operations.score
        + control_structures.score
        + schema_mutation.score;

    let risk_flags = risk_flags(
        &joins,
        &subqueries,
        &ctes,
        &window_functions,
        &aggregates,
        &set_operations,
    );
    let execution_estimate = execution_estimate(&joins, &subqueries, total_score);

    SqlComplexityResult {
        file_path: file_path.to_string(),
        line_number,
        query_snippet: raw
            .trim()
            .chars()
            .take(SNIPPET_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect(),
        query_length: raw.len(),
        query_lines: raw.trim().lines().count(),
        joins,
        subqueries,
        ctes,
        window_functions,
        aggregates,
        set_operations,
        control_structures,
        schema_mutation,
        total_score,
        band: SqlComplexityBand::from_score(total_score),
        risk_flags,
        has_dynamic_sql: DYNAMIC_RES.iter().any(|re| re.is_match(raw)),
        has_nested_views: NESTED_VIEW_RE.is_match(&sql),
        execution_estimate,
    }
}

/// Split SQL text into statements on `;`, ignoring semicolons inside
/// quoted strings and comments. Each statement carries its 1-based
/// starting line (first non-blank line).
pub fn split_statements(text: &str) -> Vec<(usize, String)> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut line = 1usize;
    let mut start_line: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            in_line_comment = false;
        }
        if in_line_comment {
            current.push(c);
            continue;
        }
        if in_block_comment {
            current.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                current.push('/');
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '-' if chars.peek() == Some(&'-') => in_line_comment = true,
            '/' if chars.peek() == Some(&'*') => in_block_comment = true,
            ';' => {
                if let Some(start) = start_line.take() {
                    statements.push((start, std::mem::take(&mut current)));
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        if start_line.is_none() && !c.is_whitespace() && !in_line_comment && !in_block_comment {
            start_line = Some(line);
        }
        current.push(c);
    }
    if let Some(start) = start_line {
        statements.push((start, current));
    }
    statements
        .into_iter()
        .filter(|(_, stmt)| !normalize_sql(stmt).is_empty())
        .collect()
}

/// Score every statement of a file.
pub fn analyze_sql_text(text: &str, file_path: &str) -> Vec<SqlComplexityResult> {
    split_statements(text)
        .into_iter()
        .map(|(line, stmt)| analyze_query(&stmt, file_path, line))
        .collect()
}

// ---------------------------------------------------------------------------
// Repository summary
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BandDistribution {
    pub simple: usize,
    pub moderate: usize,
    pub complex: usize,
    pub very_complex: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedSqlMetrics {
    pub total_joins: u32,
    pub total_subqueries: u32,
    pub total_ctes: u32,
    pub total_window_functions: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SqlComplexitySummary {
    pub queries_analyzed: usize,
    pub distribution: BandDistribution,
    pub average_score: f64,
    pub aggregated: AggregatedSqlMetrics,
    pub risk_flag_counts: BTreeMap<String, usize>,
    pub results: Vec<SqlComplexityResult>,
    pub top_most_complex: Vec<SqlComplexityResult>,
}

impl SqlComplexitySummary {
    pub fn from_results(results: Vec<SqlComplexityResult>) -> Self {
        let mut summary = SqlComplexitySummary::default();
        for result in &results {
            match result.band {
                SqlComplexityBand::Simple => summary.distribution.simple += 1,
                SqlComplexityBand::Moderate => summary.distribution.moderate += 1,
                SqlComplexityBand::Complex => summary.distribution.complex += 1,
                SqlComplexityBand::VeryComplex => summary.distribution.very_complex += 1,
            }
            summary.aggregated.total_joins += result.joins.total_joins;
            summary.aggregated.total_subqueries += result.subqueries.total_subqueries;
            summary.aggregated.total_ctes += result.ctes.total_ctes;
            summary.aggregated.total_window_functions +=
                result.window_functions.total_window_functions;
            for flag in &result.risk_flags {
                *summary.risk_flag_counts.entry(flag.clone()).or_default() += 1;
            }
        }
        summary.queries_analyzed = results.len();
        if !results.is_empty() {
            let total: u64 = results.iter().map(|r| u64::from(r.total_score)).sum();
            let avg = total as f64 / results.len() as f64;
            summary.average_score = (avg * 100.0).round() / 100.0;
        }
        let mut ranked = results.clone();
        ranked.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        ranked.truncate(TOP_COMPLEX);
        summary.top_most_complex = ranked;
        summary.results = results;
        summary
    }

    /// Statements in the complex or very-complex band.
    pub fn complex_count(&self) -> usize {
        self.distribution.complex + self.distribution.very_complex
    }

    pub fn flag_count(&self, flag: &str) -> usize {
        self.risk_flag_counts.get(flag).copied().unwrap_or(0)
    }
}

/// Analyze every readable SQL file in the inventory.
pub fn analyze_repository_sql(files: &[ScannedFile]) -> SqlComplexitySummary {
    let mut results = Vec::new();
    for file in files.iter().filter(|f| f.kind().is_sql()) {
        let Some(text) = file.text() else { continue };
        let found = analyze_sql_text(text, file.path());
        debug!(path = file.path(), statements = found.len(), "sql complexity");
        results.extend(found);
    }
    SqlComplexitySummary::from_results(results)
}
