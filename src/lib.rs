pub mod extract;
pub mod job;
pub mod process;
pub mod schema;
pub mod sink;
pub mod source;
pub mod table;

pub use extract::FieldPath;
pub use job::{etl_job, pulse_schema, transform_pings, JobConfig};
pub use schema::{ColumnSpec, ColumnType, TableSchema, Value};
pub use table::{Row, TabularResult};
