//! kiln-process: flatten, type and land JSON records as a partitioned dataset
//!
//! Usage:
//!   # Declared schema from a catalog file
//!   kiln-process records.jsonl --table clients --catalog schemas.json -o ./lake
//!
//!   # Auto-schema mode, partition date derived from a CDC field
//!   kiln-process records.jsonl --table deposits --auto-schema \
//!       --cdc-field lastModifiedDate -o ./lake
//!
//!   # Read from stdin
//!   cat page.json | kiln-process --table clients --auto-schema -o ./lake

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kiln::pipeline::{process_batch, BatchSummary, TableConfig};
use kiln::schema::SchemaCatalog;
use kiln::sink::{DatasetWriter, TableSink, WriteMode};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};

#[derive(Parser, Debug)]
#[command(name = "kiln-process")]
#[command(about = "Flatten, type and land JSON records as a partitioned dataset", long_about = None)]
struct Args {
    /// Input file holding a JSON array or newline-delimited JSON
    /// (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Target table name
    #[arg(long)]
    table: String,

    /// JSON file with declared schemas per table
    #[arg(long)]
    catalog: Option<String>,

    /// Infer the schema from the batch instead of looking it up
    #[arg(long)]
    auto_schema: bool,

    /// API field the date partition derives from (camelCase as returned)
    #[arg(long)]
    cdc_field: Option<String>,

    /// Column renames applied after snake-casing, as from=to pairs
    #[arg(long, value_name = "FROM=TO")]
    rename: Vec<String>,

    /// Root directory of the output dataset
    #[arg(long, short = 'o', default_value = "./lake")]
    output_dir: String,

    /// How the write interacts with existing data
    #[arg(long, value_enum, default_value_t = Mode::Append)]
    mode: Mode,

    /// Separator for flattened key paths (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Comma-separated top-level keys to drop before flattening
    #[arg(long)]
    ignore_root_keys: Option<String>,

    /// Keep whitespace inside string values as-is
    #[arg(long)]
    no_clean: bool,

    /// Skip records that are not JSON objects instead of failing the batch
    #[arg(long)]
    skip_invalid: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Append,
    Overwrite,
    OverwritePartitions,
}

impl From<Mode> for WriteMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Append => WriteMode::Append,
            Mode::Overwrite => WriteMode::Overwrite,
            Mode::OverwritePartitions => WriteMode::OverwritePartitions,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog: {}", path))?;
            SchemaCatalog::from_json_str(&raw).context("Failed to parse catalog")?
        }
        None => SchemaCatalog::new(),
    };

    let mut config = TableConfig::new(&args.table);
    config.auto_schema = args.auto_schema;
    config.cdc_field = args.cdc_field.clone();
    config.clean = !args.no_clean;
    config.skip_invalid_records = args.skip_invalid;
    if let Some(separator) = &args.separator {
        config.flatten.separator = separator.clone();
    }
    if let Some(keys) = &args.ignore_root_keys {
        config.flatten.root_keys_to_ignore =
            keys.split(',').map(|s| s.trim().to_string()).collect();
    }
    for pair in &args.rename {
        let (from, to) = pair
            .split_once('=')
            .with_context(|| format!("invalid rename (expected FROM=TO): {}", pair))?;
        config
            .rename_columns
            .push((from.to_string(), to.to_string()));
    }

    let records = read_records(args.input.as_deref())?;
    let (table, schema) = process_batch(records, &config, &catalog)?;
    let summary = BatchSummary::new(&table, &config);

    if !table.is_empty() {
        let mut writer = DatasetWriter::new(&args.output_dir)?;
        writer.write(&table, &args.table, &["date".to_string()], args.mode.into())?;
    }

    println!(
        "{}",
        serde_json::json!({
            "table_name": summary.table_name,
            "records_count": summary.records,
            "columns_count": summary.columns,
            "schema": schema,
        })
    );

    Ok(())
}

/// Read a whole input as records: a JSON array becomes its elements, a single
/// object becomes one record. SIMD parsing first, serde_json NDJSON fallback.
fn read_records(input: Option<&str>) -> Result<Vec<Value>> {
    let mut content = Vec::new();
    let reader: Box<dyn Read> = if let Some(path) = input {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input: {}", path))?,
        ))
    } else {
        Box::new(std::io::stdin())
    };
    BufReader::new(reader).read_to_end(&mut content)?;

    match simd_json::to_owned_value(&mut content.clone()) {
        Ok(parsed) => {
            let json_str = simd_json::to_string(&parsed)?;
            let value: Value = serde_json::from_str(&json_str)?;
            Ok(match value {
                Value::Array(items) => items,
                single => vec![single],
            })
        }
        Err(_) => {
            // Fallback for NDJSON or malformed input
            let content_str = String::from_utf8_lossy(&content);
            let mut records = Vec::new();
            for line in content_str.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value: Value = serde_json::from_str(line).context("Failed to parse JSON")?;
                records.push(value);
            }
            Ok(records)
        }
    }
}
