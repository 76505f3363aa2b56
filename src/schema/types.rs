use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of storage-level column types, matching the Athena type names.
///
/// Reference: https://docs.aws.amazon.com/athena/latest/ug/data-types.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Int,
    BigInt,
    Double,
    Boolean,
    String,
    Date,
    Timestamp,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Int => "int",
            LogicalType::BigInt => "bigint",
            LogicalType::Double => "double",
            LogicalType::Boolean => "boolean",
            LogicalType::String => "string",
            LogicalType::Date => "date",
            LogicalType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from column name to logical type. One per target table.
///
/// Once declared for a table the schema is the durable contract every future
/// batch is coerced against: new columns may be added, existing column types
/// are never silently changed. Reconciliation produces a new schema rather
/// than mutating the one it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema(BTreeMap<String, LogicalType>);

impl ColumnSchema {
    pub fn new() -> Self {
        ColumnSchema(BTreeMap::new())
    }

    pub fn get(&self, column: &str) -> Option<LogicalType> {
        self.0.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, ty: LogicalType) {
        self.0.insert(column.into(), ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LogicalType)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, LogicalType)> for ColumnSchema {
    fn from_iter<I: IntoIterator<Item = (String, LogicalType)>>(iter: I) -> Self {
        ColumnSchema(iter.into_iter().collect())
    }
}

/// Static catalog of declared schemas, keyed by table name.
///
/// This is the configuration-store seam: declared schemas live in a JSON
/// document next to the pipeline definitions, one entry per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, ColumnSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        SchemaCatalog::default()
    }

    /// Parse a catalog from its JSON representation:
    /// `{"table_name": {"column": "type", ...}, ...}`
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn lookup(&self, table_name: &str) -> Option<&ColumnSchema> {
        self.tables.get(table_name)
    }

    pub fn insert(&mut self, table_name: impl Into<String>, schema: ColumnSchema) {
        self.tables.insert(table_name.into(), schema);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_type_serde_names() {
        let ty: LogicalType = serde_json::from_str("\"bigint\"").unwrap();
        assert_eq!(ty, LogicalType::BigInt);
        assert_eq!(serde_json::to_string(&LogicalType::Timestamp).unwrap(), "\"timestamp\"");
    }

    #[test]
    fn test_catalog_lookup() {
        let raw = r#"{
            "clients": {"id": "string", "creation_date": "timestamp"},
            "gl_accounts": {"balance": "double"}
        }"#;

        let catalog = SchemaCatalog::from_json_str(raw).unwrap();
        let clients = catalog.lookup("clients").unwrap();
        assert_eq!(clients.get("creation_date"), Some(LogicalType::Timestamp));
        assert!(catalog.lookup("loans").is_none());
    }
}
