//! Stage 2: structural extraction over the file inventory.
//!
//! Each submodule reads the same inventory independently.

pub mod code;
pub mod database;
pub mod lineage;
pub mod orchestration;
pub mod patterns;
pub mod sql_complexity;
pub mod xml;
