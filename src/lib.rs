//! # Kiln - JSON-to-tabular landing toolkit
//!
//! A unified library for turning nested, heterogeneously shaped JSON records
//! from a paged REST API into flat, typed, schema-stable tables ready for a
//! partitioned data lake.
//!
//! ## Modules
//!
//! - **flatten**: collapse nested JSON into single-level key-path mappings
//! - **typing**: infer logical column types and coerce columns to a schema
//! - **schema**: the closed logical type set, declared-schema catalog and
//!   reconciliation
//! - **fetch**: drain paged data sources with offset/limit accumulation
//! - **table**: raw and typed column-oriented containers
//! - **sink**: partitioned dataset writing
//! - **pipeline**: batch composition of all of the above
//!
//! ## Quick Start
//!
//! ### Flattening
//!
//! ```rust
//! use kiln::flatten::{flatten, FlattenConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let record = json!({
//!     "encodedKey": "abc",
//!     "balances": {"total": 10, "holds": [1, 2]}
//! });
//!
//! let flat = flatten(&record, &FlattenConfig::default())?;
//!
//! assert_eq!(flat["balances_total"], json!(10));
//! assert_eq!(flat["balances_holds_0"], json!(1));
//! # Ok(())
//! # }
//! ```
//!
//! ### Batch processing
//!
//! ```rust
//! use kiln::pipeline::{process_batch, TableConfig};
//! use kiln::schema::SchemaCatalog;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = vec![
//!     json!({"id": "1", "score": "2.5"}),
//!     json!({"id": "2", "score": "3"}),
//! ];
//!
//! let mut config = TableConfig::new("scores");
//! config.auto_schema = true;
//!
//! let (table, schema) = process_batch(records, &config, &SchemaCatalog::new())?;
//! assert_eq!(table.num_rows(), 2);
//! // schema: id -> int, score -> double, plus derived partition columns
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;

pub mod error;
pub mod fetch;
pub mod flatten;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod table;
pub mod typing;

// Re-export commonly used types for convenience
pub use error::{CoercionError, FlattenError};
pub use fetch::{fetch_all, fetch_all_segments, PageCursor, PageRequest, PageSource};
pub use flatten::{flatten, FlattenConfig};
pub use pipeline::{process_batch, BatchSummary, TableConfig};
pub use schema::{reconcile, ColumnSchema, LogicalType, SchemaCatalog};
pub use sink::{DatasetWriter, TableSink, WriteMode, WriteResult};
pub use table::{Cell, Column, RawTable, TypedTable};
pub use typing::{apply_schema, infer_schema};

/// Convenience entry point: read newline-delimited JSON records from a
/// reader and process them as one batch.
pub fn process_jsonl<R: BufRead>(
    reader: R,
    config: &TableConfig,
    catalog: &SchemaCatalog,
) -> Result<(TypedTable, ColumnSchema)> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).context("Failed to parse JSON")?;
        records.push(value);
    }

    process_batch(records, config, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_jsonl() {
        let input = "{\"id\": \"1\", \"name\": \"a\"}\n\n{\"id\": \"2\", \"name\": \"b\"}\n";

        let mut config = TableConfig::new("t");
        config.auto_schema = true;

        let (table, schema) =
            process_jsonl(input.as_bytes(), &config, &SchemaCatalog::new()).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(schema.get("id"), Some(LogicalType::Int));
    }
}
