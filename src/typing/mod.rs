//! Type inference and coercion - turn stringly flattened columns into the
//! closed set of logical types, or coerce them against a declared schema.

pub mod coerce;
pub mod infer;

pub use coerce::{apply_schema, parse_timestamp, PARTITION_COLUMN, PARTITION_DATE_FORMAT};
pub use infer::infer_schema;
