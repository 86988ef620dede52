pub mod arrow;
pub mod config;
pub mod types;

pub use self::arrow::{build_arrow_schema, map_to_arrow_type};
pub use config::{load_columns, schema_from_defs, ColumnDef};
pub use types::{Cleaning, ColumnSpec, ColumnType, StructField, TableSchema, Value};
