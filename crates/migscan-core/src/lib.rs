//! migscan core library: static analysis of Hadoop/Oozie-era repositories
//! ahead of a platform migration.
//!
//! One call to [`analyze_repository`] walks a repository, classifies every
//! file, extracts orchestration documents, findings, SQL lineage, database
//! context, SQL complexity and code hints, resolves `${name}` variables
//! across all of them, builds a dependency graph, and scores the result
//! against a configurable rubric. No file is executed and nothing leaves
//! the machine.

pub mod config;
pub mod context;
pub mod errors;
pub mod extract;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod resolution;
pub mod scanner;

pub use config::AnalyzerConfig;
pub use errors::{MigscanError, MigscanResult};
pub use pipeline::{analyze_repository, AnalysisReport, RepoSummary};
