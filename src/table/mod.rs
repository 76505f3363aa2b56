//! Tabular containers - the column-oriented staging of flattened records
//! before typing, and the fully typed table handed to the storage sink.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::schema::{ColumnSchema, LogicalType};

// Boundaries for camelCase -> snake_case conversion
static LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());
static ACRONYM_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Convert a column name from camelCase to snake_case, collapsing repeated
/// underscores and trimming leading/trailing ones.
pub fn camel_to_snake(name: &str) -> String {
    let name = LOWER_UPPER.replace_all(name, "${1}_${2}");
    let name = ACRONYM_BOUNDARY.replace_all(&name, "${1}_${2}");
    let name = REPEATED_UNDERSCORES.replace_all(&name, "_");
    name.trim_matches('_').to_ascii_lowercase()
}

/// Column-oriented assembly of flattened records, prior to type coercion.
///
/// Column order is first-seen order across the batch. Every column spans the
/// full row count; rows missing a key hold `Value::Null`. Empty containers
/// surviving flattening are stored as the `""` sentinel, since the columnar
/// store downstream cannot represent an empty object or list cell.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<Value>>,
    row_count: usize,
}

impl RawTable {
    /// Assemble a table from flattened records.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut table = RawTable::default();

        for record in records {
            for key in record.keys() {
                if !table.index.contains_key(key) {
                    table.index.insert(key.clone(), table.names.len());
                    table.names.push(key.clone());
                    table.columns.push(vec![Value::Null; table.row_count]);
                }
            }

            for column in table.columns.iter_mut() {
                column.push(Value::Null);
            }
            for (key, value) in record {
                let slot = table.index[key];
                table.columns[slot][table.row_count] = sentinel_for_empty(value);
            }
            table.row_count += 1;
        }

        table
    }

    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.index.get(name).map(|&slot| self.columns[slot].as_slice())
    }

    /// Add or replace a column. The value vector must span the full row count.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.row_count);
        match self.index.get(&name) {
            Some(&slot) => self.columns[slot] = values,
            None => {
                self.index.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.columns.push(values);
            }
        }
    }

    /// Rename a column in place, keeping its position. A missing source name
    /// or an already-taken target name leaves the table unchanged.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if from == to || self.index.contains_key(to) {
            return;
        }
        if let Some(slot) = self.index.remove(from) {
            self.names[slot] = to.to_string();
            self.index.insert(to.to_string(), slot);
        }
    }

    /// Normalize every column name to snake_case.
    pub fn snake_case_columns(&mut self) {
        for name in self.names.clone() {
            let snake = camel_to_snake(&name);
            self.rename_column(&name, &snake);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &[Value])> {
        self.names
            .iter()
            .zip(self.columns.iter().map(|column| column.as_slice()))
    }
}

fn sentinel_for_empty(value: &Value) -> Value {
    match value {
        Value::Object(object) if object.is_empty() => Value::String(String::new()),
        Value::Array(items) if items.is_empty() => Value::String(String::new()),
        other => other.clone(),
    }
}

/// A single typed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Str(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// JSON rendering used by the storage sink: dates as `YYYY-MM-DD`,
    /// timestamps as RFC 3339.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Int(v) => Value::Number((*v).into()),
            Cell::BigInt(v) => Value::Number((*v).into()),
            Cell::Double(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
            Cell::Boolean(v) => Value::Bool(*v),
            Cell::Str(v) => Value::String(v.clone()),
            Cell::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
            Cell::Timestamp(v) => Value::String(v.to_rfc3339()),
        }
    }
}

/// A fully coerced column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: LogicalType,
    pub values: Vec<Cell>,
}

/// An ordered set of typed columns of uniform length. All records share the
/// same column set; missing values are `Cell::Null`, never omitted.
#[derive(Debug, Clone, Default)]
pub struct TypedTable {
    columns: Vec<Column>,
    row_count: usize,
}

impl TypedTable {
    pub fn new(columns: Vec<Column>, row_count: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.values.len() == row_count));
        TypedTable { columns, row_count }
    }

    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// The schema actually realized by this table's columns.
    pub fn schema(&self) -> ColumnSchema {
        self.columns
            .iter()
            .map(|column| (column.name.clone(), column.ty))
            .collect()
    }

    /// Drop columns that are null for every row.
    pub fn drop_all_null_columns(&mut self) {
        self.columns
            .retain(|column| !column.values.iter().all(Cell::is_null));
    }

    /// Row-wise JSON rendering for the storage sink.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        (0..self.row_count)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| (column.name.clone(), column.values[row].to_json()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(object) => object,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("creationDate"), "creation_date");
        assert_eq!(camel_to_snake("accountHolderKey"), "account_holder_key");
        assert_eq!(camel_to_snake("CC_AccNoOrIBAN"), "cc_acc_no_or_iban");
        assert_eq!(camel_to_snake("_CC_contactId"), "cc_contact_id");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_from_records_unions_columns() {
        let records = vec![
            record(json!({"id": 1, "name": "a"})),
            record(json!({"id": 2, "extra": true})),
        ];

        let table = RawTable::from_records(&records);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names(), &["id", "name", "extra"]);
        assert_eq!(table.column("name").unwrap(), &[json!("a"), Value::Null]);
        assert_eq!(table.column("extra").unwrap(), &[Value::Null, json!(true)]);
    }

    #[test]
    fn test_empty_containers_become_sentinel() {
        let records = vec![record(json!({"a": {}, "b": []}))];
        let table = RawTable::from_records(&records);
        assert_eq!(table.column("a").unwrap(), &[json!("")]);
        assert_eq!(table.column("b").unwrap(), &[json!("")]);
    }

    #[test]
    fn test_rename_and_snake_case() {
        let records = vec![record(json!({"creationDate": "x", "encodedKey": "y"}))];
        let mut table = RawTable::from_records(&records);
        table.rename_column("encodedKey", "encoded_key_renamed");
        table.snake_case_columns();
        assert_eq!(table.column_names(), &["creation_date", "encoded_key_renamed"]);
    }

    #[test]
    fn test_typed_table_drop_all_null() {
        let mut table = TypedTable::new(
            vec![
                Column {
                    name: "keep".into(),
                    ty: LogicalType::String,
                    values: vec![Cell::Str("x".into()), Cell::Null],
                },
                Column {
                    name: "drop".into(),
                    ty: LogicalType::String,
                    values: vec![Cell::Null, Cell::Null],
                },
            ],
            2,
        );

        table.drop_all_null_columns();
        assert_eq!(table.num_columns(), 1);
        assert!(table.column("keep").is_some());
    }

    #[test]
    fn test_to_records_nulls_present() {
        let table = TypedTable::new(
            vec![Column {
                name: "v".into(),
                ty: LogicalType::Int,
                values: vec![Cell::Int(1), Cell::Null],
            }],
            2,
        );

        let records = table.to_records();
        assert_eq!(records[0]["v"], json!(1));
        assert!(records[1]["v"].is_null());
    }
}
