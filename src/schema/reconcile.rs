//! Schema reconciliation - merging declared schemas with observed columns
//!
//! When a table has a declared schema it is authoritative: columns observed
//! in data but missing from the declaration default to `string` with a
//! warning, never silently dropped or silently mistyped. In auto-schema mode
//! the inferred schema is authoritative and passes through unmodified.

use tracing::warn;

use crate::schema::{ColumnSchema, LogicalType};

/// Merge a declared schema with the columns actually observed in a batch.
///
/// Returns a new schema; neither input is mutated. The declared schema is
/// treated as append-only: every declared entry is kept with its declared
/// type, and observed columns it does not mention are added as `string`.
pub fn reconcile(declared: Option<&ColumnSchema>, observed: &ColumnSchema) -> ColumnSchema {
    let declared = match declared {
        Some(schema) => schema,
        None => return observed.clone(),
    };

    let mut merged = declared.clone();
    for (column, _) in observed.iter() {
        if !merged.contains(column) {
            warn!(column = column.as_str(), "column not in declared schema, assuming string");
            merged.insert(column.clone(), LogicalType::String);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(entries: &[(&str, LogicalType)]) -> ColumnSchema {
        entries
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect()
    }

    #[test]
    fn test_declared_schema_column_addition() {
        let declared = schema(&[("id", LogicalType::String)]);
        let observed = schema(&[("id", LogicalType::String), ("extra", LogicalType::Int)]);

        let merged = reconcile(Some(&declared), &observed);

        assert_eq!(merged.get("id"), Some(LogicalType::String));
        assert_eq!(merged.get("extra"), Some(LogicalType::String));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_declared_types_are_not_overridden() {
        let declared = schema(&[("amount", LogicalType::Double)]);
        let observed = schema(&[("amount", LogicalType::String)]);

        let merged = reconcile(Some(&declared), &observed);
        assert_eq!(merged.get("amount"), Some(LogicalType::Double));
    }

    #[test]
    fn test_auto_schema_passes_through() {
        let observed = schema(&[("id", LogicalType::BigInt), ("name", LogicalType::String)]);
        let merged = reconcile(None, &observed);
        assert_eq!(merged, observed);
    }

    #[test]
    fn test_inputs_unchanged() {
        let declared = schema(&[("id", LogicalType::String)]);
        let observed = schema(&[("extra", LogicalType::Int)]);

        let _ = reconcile(Some(&declared), &observed);

        assert_eq!(declared.len(), 1);
        assert_eq!(observed.get("extra"), Some(LogicalType::Int));
    }
}
