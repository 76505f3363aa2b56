//! Batch processing - the composition of flattening, meta-column derivation,
//! column normalization, schema selection and coercion for one table's batch.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::CoercionError;
use crate::flatten::{clean_strings, expand_embedded_json, flatten, FlattenConfig};
use crate::schema::{reconcile, ColumnSchema, LogicalType, SchemaCatalog};
use crate::table::{RawTable, TypedTable};
use crate::typing::{apply_schema, infer_schema, parse_timestamp, PARTITION_COLUMN, PARTITION_DATE_FORMAT};

/// Per-table processing configuration.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Target table name, also the key into the declared-schema catalog.
    pub table_name: String,

    /// Change-data-capture field (API-side camelCase name). When set, the
    /// `date` partition column derives from it; otherwise from the run date.
    pub cdc_field: Option<String>,

    /// Column renames applied after snake-casing, `(from, to)` pairs.
    pub rename_columns: Vec<(String, String)>,

    /// Infer the schema from the batch instead of looking it up.
    pub auto_schema: bool,

    /// Normalize whitespace inside string values before flattening.
    pub clean: bool,

    /// Expand top-level string fields holding embedded JSON objects.
    pub expand_embedded_json: bool,

    /// Skip records that are not JSON objects instead of failing the batch.
    pub skip_invalid_records: bool,

    pub flatten: FlattenConfig,
}

impl TableConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        TableConfig {
            table_name: table_name.into(),
            cdc_field: None,
            rename_columns: Vec::new(),
            auto_schema: false,
            clean: true,
            expand_embedded_json: true,
            skip_invalid_records: false,
            flatten: FlattenConfig::default(),
        }
    }
}

/// Counts returned to the caller's run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub table_name: String,
    pub records: usize,
    pub columns: usize,
}

impl BatchSummary {
    pub fn new(table: &TypedTable, config: &TableConfig) -> Self {
        BatchSummary {
            table_name: config.table_name.clone(),
            records: table.num_rows(),
            columns: table.num_columns(),
        }
    }
}

/// Process one batch of raw API records into a typed table and the schema it
/// was coerced against.
///
/// Pipeline order: pre-passes and flattening per record, column assembly,
/// partition/meta column derivation, snake-casing, renames, schema selection
/// (declared lookup or inference), reconciliation, coercion. The returned
/// schema includes any columns patched to `string` during coercion.
pub fn process_batch(
    raw_records: Vec<Value>,
    config: &TableConfig,
    catalog: &SchemaCatalog,
) -> Result<(TypedTable, ColumnSchema)> {
    info!(table = config.table_name.as_str(), records = raw_records.len(), "processing batch");

    let flattened = flatten_records(raw_records, config)?;
    let mut table = RawTable::from_records(&flattened);

    if table.is_empty() {
        let schema = match config.auto_schema {
            true => ColumnSchema::new(),
            false => catalog.lookup(&config.table_name).cloned().unwrap_or_default(),
        };
        return Ok((TypedTable::default(), schema));
    }

    add_meta_columns(&mut table, config.cdc_field.as_deref())?;
    table.snake_case_columns();
    for (from, to) in &config.rename_columns {
        table.rename_column(from, to);
    }

    let schema = if config.auto_schema {
        reconcile(None, &infer_schema(&table))
    } else {
        let declared = catalog
            .lookup(&config.table_name)
            .with_context(|| format!("no declared schema for table {:?}", config.table_name))?;
        reconcile(Some(declared), &observed_columns(&table))
    };

    let (typed, patched) = apply_schema(&table, &schema)
        .with_context(|| format!("coercion failed for table {:?}", config.table_name))?;

    Ok((typed, patched))
}

fn flatten_records(
    raw_records: Vec<Value>,
    config: &TableConfig,
) -> Result<Vec<Map<String, Value>>> {
    let mut flattened = Vec::with_capacity(raw_records.len());

    for mut record in raw_records {
        if config.clean {
            clean_strings(&mut record);
        }
        if config.expand_embedded_json {
            expand_embedded_json(&mut record);
        }

        match flatten(&record, &config.flatten) {
            Ok(flat) => flattened.push(flat),
            Err(err) if config.skip_invalid_records => {
                warn!(table = config.table_name.as_str(), %err, "skipping record");
            }
            Err(err) => return Err(err).context("record could not be flattened"),
        }
    }

    Ok(flattened)
}

/// Derive the `date` partition column and the extraction timestamp.
///
/// With a CDC field configured, `date` comes from that column's parsed
/// timestamps and the column itself is normalized to RFC 3339; otherwise
/// `date` is the run date. Either way `timestamp_extracted` records the
/// processing instant.
fn add_meta_columns(table: &mut RawTable, cdc_field: Option<&str>) -> Result<()> {
    let now = Utc::now();

    match cdc_field {
        Some(cdc_field) => {
            let values = match table.column(cdc_field) {
                Some(values) => values.to_vec(),
                None => bail!("cdc field {:?} not present in batch", cdc_field),
            };

            let mut dates = Vec::with_capacity(values.len());
            let mut normalized = Vec::with_capacity(values.len());
            for value in &values {
                match value {
                    Value::Null => {
                        dates.push(Value::Null);
                        normalized.push(Value::Null);
                    }
                    Value::String(s) if s.is_empty() => {
                        dates.push(Value::Null);
                        normalized.push(Value::Null);
                    }
                    Value::String(s) => {
                        let ts = parse_timestamp(s).ok_or_else(|| {
                            CoercionError::new(cdc_field, s.clone(), LogicalType::Timestamp)
                        })?;
                        dates.push(Value::String(ts.format(PARTITION_DATE_FORMAT).to_string()));
                        normalized.push(Value::String(ts.to_rfc3339()));
                    }
                    other => bail!("cdc field {:?} holds non-string value {}", cdc_field, other),
                }
            }

            table.set_column(cdc_field, normalized);
            table.set_column(PARTITION_COLUMN, dates);
        }
        None => {
            let today = Value::String(now.format(PARTITION_DATE_FORMAT).to_string());
            let dates = vec![today; table.num_rows()];
            table.set_column(PARTITION_COLUMN, dates);
        }
    }

    let extracted = vec![Value::String(now.to_rfc3339()); table.num_rows()];
    table.set_column("timestamp_extracted", extracted);
    Ok(())
}

/// The batch's column names as an all-string schema, for reconciliation
/// against a declared schema.
fn observed_columns(table: &RawTable) -> ColumnSchema {
    table
        .column_names()
        .iter()
        .map(|name| (name.clone(), LogicalType::String))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use serde_json::json;

    fn catalog_with(table: &str, entries: &[(&str, LogicalType)]) -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(
            table,
            entries
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
        );
        catalog
    }

    #[test]
    fn test_end_to_end_declared_schema() {
        let records = vec![
            json!({
                "encodedKey": "abc",
                "creationDate": "2024-07-30T18:27:00Z",
                "balances": {"total": "100.5"},
            }),
            json!({
                "encodedKey": "def",
                "creationDate": "2024-07-31T02:00:00Z",
                "balances": {"total": "7"},
            }),
        ];

        let catalog = catalog_with(
            "clients",
            &[
                ("encoded_key", LogicalType::String),
                ("creation_date", LogicalType::Timestamp),
                ("balances_total", LogicalType::Double),
                ("date", LogicalType::String),
                ("timestamp_extracted", LogicalType::Timestamp),
            ],
        );

        let mut config = TableConfig::new("clients");
        config.cdc_field = Some("creationDate".to_string());

        let (table, schema) = process_batch(records, &config, &catalog).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column("balances_total").unwrap().values,
            vec![Cell::Double(100.5), Cell::Double(7.0)]
        );
        // Partition column derives from the CDC field.
        assert_eq!(
            table.column("date").unwrap().values,
            vec![Cell::Str("20240730".into()), Cell::Str("20240731".into())]
        );
        assert_eq!(schema.get("creation_date"), Some(LogicalType::Timestamp));
        assert!(table.column("timestamp_extracted").is_some());
    }

    #[test]
    fn test_auto_schema_mode() {
        let records = vec![
            json!({"id": "1", "score": "2.5", "active": "true"}),
            json!({"id": "2", "score": "3", "active": "false"}),
        ];

        let mut config = TableConfig::new("scores");
        config.auto_schema = true;

        let (table, schema) = process_batch(records, &config, &SchemaCatalog::new()).unwrap();

        assert_eq!(schema.get("id"), Some(LogicalType::Int));
        assert_eq!(schema.get("score"), Some(LogicalType::Double));
        assert_eq!(schema.get("active"), Some(LogicalType::Boolean));
        assert_eq!(
            table.column("active").unwrap().values,
            vec![Cell::Boolean(true), Cell::Boolean(false)]
        );
    }

    #[test]
    fn test_undeclared_column_lands_as_string() {
        let records = vec![json!({"id": "1", "surprise": "2024-01-01"})];
        let catalog = catalog_with("t", &[("id", LogicalType::Int)]);

        let (table, schema) = process_batch(records, &TableConfig::new("t"), &catalog).unwrap();

        assert_eq!(schema.get("surprise"), Some(LogicalType::String));
        assert_eq!(
            table.column("surprise").unwrap().values,
            vec![Cell::Str("2024-01-01".into())]
        );
    }

    #[test]
    fn test_bad_cdc_value_fails_batch() {
        let records = vec![json!({"id": "1", "creationDate": "not-a-date"})];
        let catalog = catalog_with("t", &[("id", LogicalType::Int)]);

        let mut config = TableConfig::new("t");
        config.cdc_field = Some("creationDate".to_string());

        assert!(process_batch(records, &config, &catalog).is_err());
    }

    #[test]
    fn test_skip_invalid_records() {
        let records = vec![json!([1, 2]), json!({"id": "1"})];
        let catalog = catalog_with("t", &[("id", LogicalType::Int)]);

        let mut config = TableConfig::new("t");
        config.skip_invalid_records = true;

        let (table, _) = process_batch(records, &config, &catalog).unwrap();
        assert_eq!(table.num_rows(), 1);

        config.skip_invalid_records = false;
        let records = vec![json!([1, 2])];
        assert!(process_batch(records, &config, &catalog).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let catalog = catalog_with("t", &[("id", LogicalType::Int)]);
        let (table, schema) = process_batch(vec![], &TableConfig::new("t"), &catalog).unwrap();
        assert!(table.is_empty());
        assert_eq!(schema.get("id"), Some(LogicalType::Int));
    }

    #[test]
    fn test_renames_apply_after_snake_casing() {
        let records = vec![json!({"oldName": "x"})];
        let catalog = catalog_with("t", &[("new_name", LogicalType::String)]);

        let mut config = TableConfig::new("t");
        config.rename_columns = vec![("old_name".to_string(), "new_name".to_string())];

        let (table, _) = process_batch(records, &config, &catalog).unwrap();
        assert!(table.column("new_name").is_some());
        assert!(table.column("old_name").is_none());
    }

    #[test]
    fn test_embedded_json_and_cleaning() {
        let records = vec![json!({
            "id": "1",
            "note": "line1\nline2",
            "details": "{\"inner\": \"5\"}",
        })];

        let mut config = TableConfig::new("t");
        config.auto_schema = true;

        let (table, schema) = process_batch(records, &config, &SchemaCatalog::new()).unwrap();
        assert_eq!(
            table.column("note").unwrap().values,
            vec![Cell::Str("line1 line2".into())]
        );
        assert_eq!(schema.get("details_inner"), Some(LogicalType::Int));
    }
}
