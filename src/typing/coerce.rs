//! Column coercion against a declared or inferred schema.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::CoercionError;
use crate::schema::{ColumnSchema, LogicalType};
use crate::table::{Cell, Column, RawTable, TypedTable};

/// Fixed timestamp formats tried after ISO-8601, in order. First match wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",    // 2024-07-30 18:27:00
    "%m/%d/%Y %I:%M:%S %p", // 7/30/2024 6:27:00 PM
    "%d-%m-%Y %H:%M:%S",    // 30-07-2024 18:27:00
    "%Y-%d-%m %H:%M:%S",    // 2025-14-04 22:19:21
];

/// Format of the derived partition column, e.g. `20240730`.
pub const PARTITION_DATE_FORMAT: &str = "%Y%m%d";

/// Name of the dedicated partition column, exempt from the timestamp ladder.
pub const PARTITION_COLUMN: &str = "date";

/// Coerce every column of `table` to its schema type.
///
/// Returns the typed table together with a patched copy of the schema:
/// columns present in data but absent from the schema are coerced to string
/// and recorded as `string` in the returned schema, so the final schema and
/// the final data are always consistent. The input schema is not mutated.
///
/// Columns that are null for every row are dropped from the output.
///
/// Fails with [`CoercionError`] only when a `timestamp`/`date` column holds a
/// value no recognized format parses, or a `boolean` column holds a value
/// with no boolean reading. Numeric parse failures degrade to `0`, not null.
pub fn apply_schema(
    table: &RawTable,
    schema: &ColumnSchema,
) -> Result<(TypedTable, ColumnSchema), CoercionError> {
    let mut patched = schema.clone();
    let mut columns = Vec::with_capacity(table.num_columns());

    for (name, values) in table.iter() {
        let ty = match schema.get(name) {
            Some(ty) => ty,
            None => {
                warn!(column = name.as_str(), "column dtype not in schema, assuming string");
                patched.insert(name.clone(), LogicalType::String);
                LogicalType::String
            }
        };

        let cells = coerce_column(name, values, ty)?;
        columns.push(Column {
            name: name.clone(),
            ty,
            values: cells,
        });
    }

    let mut typed = TypedTable::new(columns, table.num_rows());
    typed.drop_all_null_columns();
    Ok((typed, patched))
}

fn coerce_column(name: &str, values: &[Value], ty: LogicalType) -> Result<Vec<Cell>, CoercionError> {
    values
        .iter()
        .map(|value| coerce_value(name, value, ty))
        .collect()
}

fn coerce_value(column: &str, value: &Value, ty: LogicalType) -> Result<Cell, CoercionError> {
    match ty {
        // Lossy by design: unparsable and missing numeric entries both land
        // on 0, favoring numeric completeness over precision.
        LogicalType::Int => {
            let v = numeric_value(value).unwrap_or(0.0);
            Ok(Cell::Int(clamp_to_i32(v)))
        }
        LogicalType::BigInt => Ok(Cell::BigInt(bigint_value(value))),
        LogicalType::Double => Ok(Cell::Double(numeric_value(value).unwrap_or(0.0))),
        LogicalType::Boolean => coerce_boolean(column, value),
        LogicalType::String => Ok(coerce_string(value)),
        LogicalType::Timestamp => match timestamp_value(column, value)? {
            Some(ts) => Ok(Cell::Timestamp(ts)),
            None => Ok(Cell::Null),
        },
        LogicalType::Date => match timestamp_value(column, value)? {
            Some(ts) => Ok(Cell::Date(ts.date_naive())),
            None => Ok(Cell::Null),
        },
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bigint_value(value: &Value) -> i64 {
    // Exact integer readings first so large ids survive untruncated.
    match value {
        Value::Number(n) if n.is_i64() => return n.as_i64().unwrap_or(0),
        Value::String(s) => {
            if let Ok(v) = s.trim().parse::<i64>() {
                return v;
            }
        }
        _ => {}
    }
    let v = numeric_value(value).unwrap_or(0.0);
    v.clamp(i64::MIN as f64, i64::MAX as f64) as i64
}

fn clamp_to_i32(v: f64) -> i32 {
    v.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

fn coerce_boolean(column: &str, value: &Value) -> Result<Cell, CoercionError> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::Bool(b) => Ok(Cell::Boolean(*b)),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(Cell::Boolean(false)),
        Value::Number(n) if n.as_f64() == Some(1.0) => Ok(Cell::Boolean(true)),
        Value::String(s) if s.is_empty() => Ok(Cell::Null),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Cell::Boolean(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Cell::Boolean(false)),
        other => Err(CoercionError::new(
            column,
            render(other),
            LogicalType::Boolean,
        )),
    }
}

fn coerce_string(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::String(s) => Cell::Str(s.clone()),
        Value::Bool(b) => Cell::Str(b.to_string()),
        Value::Number(n) => Cell::Str(n.to_string()),
        container => Cell::Str(container.to_string()),
    }
}

fn timestamp_value(column: &str, value: &Value) -> Result<Option<DateTime<Utc>>, CoercionError> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => s.as_str(),
        other => {
            return Err(CoercionError::new(
                column,
                render(other),
                LogicalType::Timestamp,
            ))
        }
    };

    // The partition column carries compact dates, not API timestamps.
    if column == PARTITION_COLUMN {
        if let Ok(date) = NaiveDate::parse_from_str(raw, PARTITION_DATE_FORMAT) {
            return Ok(Some(midnight(date)));
        }
    }

    match parse_timestamp(raw) {
        Some(ts) => Ok(Some(ts)),
        None => Err(CoercionError::new(column, raw, LogicalType::Timestamp)),
    }
}

/// Parse a timestamp string against the ordered format list: ISO-8601 first,
/// then the fixed formats. Naive readings are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&ts));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(midnight(date));
    }

    for format in DATE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&ts));
        }
    }

    None
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
