//! Table-write sink - hand typed tables to a partitioned table store.
//!
//! The storage engine itself is an external collaborator; this module
//! defines the seam plus a local partitioned-dataset implementation (one
//! directory per table, one subdirectory per partition value, JSON Lines
//! inside) used by the CLI and tests. Schema evolution - new columns in a
//! later batch - is accepted without complaint.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::table::TypedTable;

/// How a write interacts with data already in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Add rows, keep everything already there.
    Append,
    /// Replace the whole table.
    Overwrite,
    /// Replace only the partitions this batch touches.
    OverwritePartitions,
}

#[derive(Debug, Clone)]
pub struct WriteResult {
    pub rows_written: usize,
    /// Relative partition paths touched by this write, e.g. `date=20240730`.
    pub partitions: Vec<String>,
}

/// Destination for typed tables.
pub trait TableSink {
    fn write(
        &mut self,
        table: &TypedTable,
        table_name: &str,
        partition_cols: &[String],
        mode: WriteMode,
    ) -> Result<WriteResult>;
}

/// Writes typed tables as partitioned JSON Lines datasets under a root
/// directory: `<root>/<table>/<col>=<value>/part-00000.jsonl`.
pub struct DatasetWriter {
    root: PathBuf,
}

impl DatasetWriter {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        std::fs::create_dir_all(&root).context("Failed to create dataset root directory")?;
        Ok(DatasetWriter {
            root: root.as_ref().to_path_buf(),
        })
    }
}

impl TableSink for DatasetWriter {
    fn write(
        &mut self,
        table: &TypedTable,
        table_name: &str,
        partition_cols: &[String],
        mode: WriteMode,
    ) -> Result<WriteResult> {
        let table_dir = self.root.join(table_name);

        if mode == WriteMode::Overwrite && table_dir.exists() {
            std::fs::remove_dir_all(&table_dir).context("Failed to clear table directory")?;
        }

        // Group rows by their partition path, dropping the partition columns
        // from the stored records - the path carries them.
        let mut partitions: BTreeMap<String, Vec<Map<String, Value>>> = BTreeMap::new();
        for mut record in table.to_records() {
            let mut segments = Vec::with_capacity(partition_cols.len());
            for column in partition_cols {
                let value = record.remove(column).unwrap_or(Value::Null);
                segments.push(format!("{}={}", column, partition_value(&value)));
            }
            partitions.entry(segments.join("/")).or_default().push(record);
        }

        let mut rows_written = 0;
        let mut touched = Vec::with_capacity(partitions.len());

        for (partition, records) in partitions {
            let partition_dir = if partition.is_empty() {
                table_dir.clone()
            } else {
                table_dir.join(&partition)
            };

            if mode == WriteMode::OverwritePartitions && partition_dir.exists() {
                std::fs::remove_dir_all(&partition_dir)
                    .context("Failed to clear partition directory")?;
            }
            std::fs::create_dir_all(&partition_dir)
                .context("Failed to create partition directory")?;

            let path = partition_dir.join("part-00000.jsonl");
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .context(format!("Failed to open file: {}", path.display()))?;

            for record in &records {
                let line = serde_json::to_string(record).context("Failed to serialize record")?;
                writeln!(file, "{}", line).context("Failed to write record")?;
            }
            file.flush().context("Failed to flush partition file")?;

            rows_written += records.len();
            touched.push(partition);
        }

        info!(
            table = table_name,
            rows = rows_written,
            partitions = touched.len(),
            "wrote dataset"
        );

        Ok(WriteResult {
            rows_written,
            partitions: touched,
        })
    }
}

fn partition_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
