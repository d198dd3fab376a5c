//! Stage 4: `${name}` variable resolution.
//!
//! Definitions are collected from the inventory and merged by source
//! precedence (runtime properties > embedded configuration > build
//! properties). Every referenced name is then classified as resolved,
//! partial or unresolved, and extracted records are rewritten in place.

pub mod definitions;
pub mod engine;
pub mod substitute;

pub use definitions::{collect_definitions, DefinitionTable};
pub use engine::{resolve_repository, ResolutionOutput, Resolver};
pub use substitute::{substitute, Substitution};
