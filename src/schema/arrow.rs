// src/schema/arrow.rs

use arrow::datatypes::{
    DataType, Field as ArrowField, Fields, Schema as ArrowSchema, SchemaRef, TimeUnit,
};
use std::sync::Arc;

use super::types::{ColumnType, StructField, TableSchema};

/// Timezone attached to every timestamp column.
pub const TIMESTAMP_TZ: &str = "UTC";

/// Map a declared column type onto an Arrow DataType.
///
/// Covers:
/// - Boolean     → Boolean
/// - Int32       → Int32
/// - Int64       → Int64
/// - Float64     → Float64
/// - Utf8        → Utf8
/// - Timestamp   → Timestamp(µs, UTC)
/// - List(t)     → List<"item": t, nullable>
/// - Map(t)      → Map<"entries": struct<keys: Utf8, values: t>>
/// - Struct(..)  → Struct, every member nullable
pub fn map_to_arrow_type(ty: &ColumnType) -> DataType {
    match ty {
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Utf8 => DataType::Utf8,
        ColumnType::Timestamp => {
            DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from(TIMESTAMP_TZ)))
        }
        ColumnType::List(item) => DataType::List(list_item_field(item)),
        ColumnType::Map(value) => DataType::Map(map_entries_field(value), false),
        ColumnType::Struct(fields) => DataType::Struct(struct_fields(fields)),
    }
}

pub fn list_item_field(item: &ColumnType) -> Arc<ArrowField> {
    Arc::new(ArrowField::new("item", map_to_arrow_type(item), true))
}

/// Key/value members of a map's entry struct. Keys are never null.
pub fn map_entry_fields(value: &ColumnType) -> Fields {
    Fields::from(vec![
        ArrowField::new("keys", DataType::Utf8, false),
        ArrowField::new("values", map_to_arrow_type(value), true),
    ])
}

pub fn map_entries_field(value: &ColumnType) -> Arc<ArrowField> {
    Arc::new(ArrowField::new(
        "entries",
        DataType::Struct(map_entry_fields(value)),
        false,
    ))
}

pub fn struct_fields(fields: &[StructField]) -> Fields {
    fields
        .iter()
        .map(|f| ArrowField::new(&f.name, map_to_arrow_type(&f.ty), true))
        .collect()
}

/// Build an ArrowSchema (inside an Arc) from a table schema; all columns nullable.
pub fn build_arrow_schema(schema: &TableSchema) -> SchemaRef {
    let fields: Vec<ArrowField> = schema
        .columns()
        .iter()
        .map(|col| ArrowField::new(&col.name, map_to_arrow_type(&col.ty), /* nullable = */ true))
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

impl TableSchema {
    pub fn arrow_schema(&self) -> SchemaRef {
        build_arrow_schema(self)
    }
}
