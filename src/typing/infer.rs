//! Per-column logical type inference for auto-schema mode.
//!
//! Inference never fails: unparsable or ambiguous columns degrade to
//! `string`, favoring landed-but-untyped data over aborted batches.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

use crate::schema::{ColumnSchema, LogicalType};
use crate::table::RawTable;
use crate::typing::coerce::{parse_timestamp, PARTITION_COLUMN};

/// Infer a logical type for every column of the table.
pub fn infer_schema(table: &RawTable) -> ColumnSchema {
    table
        .iter()
        .map(|(name, values)| (name.clone(), infer_column_type(name, values)))
        .collect()
}

fn infer_column_type(name: &str, values: &[Value]) -> LogicalType {
    // The derived partition column is typed by the write path, never sampled.
    if name == PARTITION_COLUMN {
        return LogicalType::String;
    }

    let candidates: Vec<String> = values.iter().filter_map(sample_value).collect();
    if candidates.is_empty() {
        return LogicalType::String;
    }

    if let Some(literals) = parse_all(&candidates, parse_literal) {
        return classify_literals(&literals);
    }
    if let Some(timestamps) = parse_all(&candidates, |s| parse_timestamp(s)) {
        return classify_timestamps(&timestamps);
    }

    LogicalType::String
}

/// Non-null, non-empty sample values, stringified for parsing.
fn sample_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() || s == "None" => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Non-empty containers never type as anything but string.
        _ => None,
    }
}

fn parse_all<T>(candidates: &[String], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    candidates.iter().map(|s| parse(s)).collect()
}

#[derive(Debug, Clone, Copy)]
enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

fn parse_literal(raw: &str) -> Option<Literal> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        return Some(Literal::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(Literal::Bool(false));
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(Literal::Int(v));
    }
    if let Ok(v) = raw.parse::<f64>() {
        return Some(Literal::Float(v));
    }
    None
}

fn classify_literals(literals: &[Literal]) -> LogicalType {
    let all_bool = literals.iter().all(|l| matches!(l, Literal::Bool(_)));
    if all_bool {
        return LogicalType::Boolean;
    }
    // Booleans mixed with numbers have no uniform reading.
    if literals.iter().any(|l| matches!(l, Literal::Bool(_))) {
        return LogicalType::String;
    }

    let all_int = literals.iter().all(|l| matches!(l, Literal::Int(_)));
    if all_int {
        let fits_i32 = literals.iter().all(|l| match l {
            Literal::Int(v) => i32::try_from(*v).is_ok(),
            _ => true,
        });
        return if fits_i32 {
            LogicalType::Int
        } else {
            LogicalType::BigInt
        };
    }

    LogicalType::Double
}

fn classify_timestamps(timestamps: &[DateTime<Utc>]) -> LogicalType {
    let all_midnight = timestamps
        .iter()
        .all(|ts| ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0);
    if all_midnight {
        LogicalType::Date
    } else {
        LogicalType::Timestamp
    }
}
