//! Column schemas - the closed set of logical types, the per-table schema
//! contract, the static catalog of declared schemas, and reconciliation of
//! declared schemas against observed batch columns.

pub mod reconcile;
pub mod types;

pub use reconcile::reconcile;
pub use types::{ColumnSchema, LogicalType, SchemaCatalog};
