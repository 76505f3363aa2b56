//! Key-path flattening - collapse nested JSON into single-level mappings
//!
//! The flattener is a pure, stateless transform: a depth-first walk that
//! joins mapping keys and sequence indices into deterministic path strings.
//! Two pre-passes run ahead of it per record: embedded-JSON expansion and
//! whitespace cleaning.

pub mod flattener;
pub mod types;

pub use flattener::{clean_strings, expand_embedded_json, flatten};
pub use types::FlattenConfig;
