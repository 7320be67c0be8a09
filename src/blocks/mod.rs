//! The fixed catalog of nine pitch blocks.
//!
//! Each block carries a word range plus structure, restrictions, prohibited
//! moves and a worked example. The catalog ships embedded in the binary.

mod embedded;
mod loader;
mod schema;

pub use loader::{block, catalog, parse_catalog, validate_catalog};
pub use schema::{BlockConstraints, BlockDefinition, BlockStructure, WordCountStatus};
