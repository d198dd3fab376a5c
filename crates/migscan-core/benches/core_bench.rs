//! Criterion benchmarks for migscan-core.
//!
//! ## Benchmark groups
//!
//! 1. **classify**: name + head classification for common file kinds.
//! 2. **substitute**: variable substitution over flat and nested lookups.
//! 3. **sql_complexity**: per-statement analysis at increasing join counts.
//! 4. **pipeline**: full `analyze_repository` over a synthetic tree.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/migscan-core/Cargo.toml
//! # Only the substitution group:
//! cargo bench --manifest-path crates/migscan-core/Cargo.toml -- substitute
//! ```

use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use migscan_core::extract::sql_complexity::analyze_query;
use migscan_core::resolution::substitute::{substitute, Lookup};
use migscan_core::scanner::classify;
use migscan_core::{analyze_repository, AnalyzerConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WORKFLOW: &str = r#"<workflow-app xmlns="uri:oozie:workflow:0.5" name="wf-{i}">
  <start to="load"/>
  <action name="load">
    <hive xmlns="uri:oozie:hive-action:0.5"><script>load.hql</script></hive>
    <ok to="end"/><error to="fail"/>
  </action>
  <kill name="fail"><message>failed</message></kill>
  <end name="end"/>
</workflow-app>"#;

/// `apps` application directories, each with a workflow, a HiveQL script
/// and a properties file.
fn synthetic_repo(apps: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..apps {
        let app = dir.path().join(format!("apps/app{i}"));
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join("workflow.xml"), WORKFLOW.replace("{i}", &i.to_string())).unwrap();
        fs::write(
            app.join("load.hql"),
            format!(
                "USE ${{db}};\nINSERT OVERWRITE TABLE ${{db}}.t{i}\n\
                 SELECT a.id FROM src.a a JOIN src.b b ON a.id = b.id;\n"
            ),
        )
        .unwrap();
        fs::write(app.join("job.properties"), format!("db=warehouse{i}\n")).unwrap();
    }
    dir
}

fn nested_lookup(depth: usize) -> Lookup {
    let mut lookup = Lookup::new();
    lookup.insert("v0".to_string(), "base".to_string());
    for i in 1..depth {
        lookup.insert(format!("v{i}"), format!("${{v{}}}/l{i}", i - 1));
    }
    lookup
}

fn join_query(joins: usize) -> String {
    let mut sql = String::from("SELECT t0.id FROM db.t0 t0");
    for i in 1..=joins {
        sql.push_str(&format!(" JOIN db.t{i} t{i} ON t{i}.id = t0.id"));
    }
    sql.push_str(" WHERE t0.id > 0 GROUP BY t0.id");
    sql
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let workflow = WORKFLOW.replace("{i}", "0");

    group.bench_function("workflow_xml", |b| {
        b.iter(|| classify(black_box("workflow.xml"), black_box(&workflow)))
    });
    group.bench_function("hql_by_extension", |b| {
        b.iter(|| classify(black_box("load.hql"), black_box("SET hive.exec.parallel=true;")))
    });
    group.bench_function("unknown_xml_root", |b| {
        b.iter(|| classify(black_box("app.xml"), black_box(&workflow)))
    });
    group.finish();
}

fn bench_substitute(c: &mut Criterion) {
    let mut group = c.benchmark_group("substitute");

    for &depth in &[1usize, 5, 10] {
        let lookup = nested_lookup(depth);
        let text = format!("${{v{}}}/workflow.xml", depth - 1);
        group.bench_with_input(BenchmarkId::new("nested", depth), &text, |b, text| {
            b.iter(|| substitute(black_box(text), &lookup, 10))
        });
    }
    group.bench_function("no_placeholders", |b| {
        let lookup = nested_lookup(1);
        b.iter(|| substitute(black_box("hdfs://nn:8020/apps/daily"), &lookup, 10))
    });
    group.finish();
}

fn bench_sql_complexity(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_complexity");
    for &joins in &[1usize, 6, 20] {
        let sql = join_query(joins);
        group.bench_with_input(BenchmarkId::new("joins", joins), &sql, |b, sql| {
            b.iter(|| analyze_query(black_box(sql), "bench.sql", 1))
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let config = AnalyzerConfig::default();

    for &apps in &[10usize, 100] {
        let repo = synthetic_repo(apps);
        group.bench_with_input(
            BenchmarkId::new("analyze_repository", apps),
            repo.path(),
            |b, root: &Path| b.iter(|| analyze_repository(black_box(root), &config).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_substitute,
    bench_sql_complexity,
    bench_pipeline
);
criterion_main!(benches);
