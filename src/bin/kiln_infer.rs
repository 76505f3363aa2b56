//! kiln-infer: flatten JSON records and infer their logical column types
//!
//! Prints the inferred schema as JSON, in the same shape the declared-schema
//! catalog uses, so the output can be pasted into a catalog entry.
//!
//! Usage:
//!   # Read from file, output to stdout
//!   kiln-infer records.jsonl
//!
//!   # Read from stdin
//!   echo '{"id": "1", "created": "2024-01-01T10:00:00Z"}' | kiln-infer

use anyhow::Result;
use clap::Parser;
use kiln::flatten::{flatten, FlattenConfig};
use kiln::table::RawTable;
use kiln::typing::infer_schema;
use serde_json::Value;
use std::fs::File;
use std::io::{stdin, BufRead, BufReader};

#[derive(Parser, Debug)]
#[command(name = "kiln-infer")]
#[command(about = "Infer logical column types from flattened JSON records", long_about = None)]
struct Args {
    /// Input file with newline-delimited JSON (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Separator for flattened key paths (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let reader: Box<dyn BufRead> = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(File::open(file_path)?))
    } else {
        Box::new(BufReader::new(stdin()))
    };

    let mut config = FlattenConfig::default();
    if let Some(separator) = args.separator {
        config.separator = separator;
    }

    let mut flattened = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)?;
        flattened.push(flatten(&value, &config)?);
    }

    if flattened.is_empty() {
        eprintln!("Warning: No JSON objects found in input");
    }

    let schema = infer_schema(&RawTable::from_records(&flattened));

    let output = if args.compact {
        serde_json::to_string(&schema)?
    } else {
        serde_json::to_string_pretty(&schema)?
    };

    println!("{}", output);

    Ok(())
}
