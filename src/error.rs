use thiserror::Error;

use crate::schema::LogicalType;

/// The flattener only accepts JSON objects at the top level. Anything else
/// is fatal to that record, but callers may skip the record and keep the batch.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("flatten requires a JSON object input, got {kind}")]
    NotAMapping { kind: &'static str },
}

/// A declared `timestamp`/`date` column held a value no recognized format
/// could parse, or a `boolean` column held a non-representable value.
///
/// This fails the whole batch: a silently mistyped date column would corrupt
/// downstream partitioning.
#[derive(Debug, Error)]
#[error("unable to coerce value {value:?} in column {column:?} to {target}")]
pub struct CoercionError {
    pub column: String,
    pub value: String,
    pub target: LogicalType,
}

impl CoercionError {
    pub fn new(column: &str, value: impl Into<String>, target: LogicalType) -> Self {
        CoercionError {
            column: column.to_string(),
            value: value.into(),
            target,
        }
    }
}
