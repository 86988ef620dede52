use anyhow::Result;
use arrow::{
    array::{
        ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, ListArray, MapArray,
        StringArray, StructArray, TimestampMicrosecondArray,
    },
    buffer::{NullBuffer, OffsetBuffer},
};
use std::sync::Arc;

use crate::schema::{
    arrow::{list_item_field, map_entries_field, map_entry_fields, struct_fields, TIMESTAMP_TZ},
    ColumnType, Value,
};

/// Build one Arrow column from cells of type `ty`.
///
/// Cells are expected to conform to `ty`; anything else is written as null.
pub fn build_array(ty: &ColumnType, values: &[Option<&Value>]) -> Result<ArrayRef> {
    let array: ArrayRef = match ty {
        ColumnType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Value::Boolean(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Int32 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Value::Int32(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Int32Array>(),
        ),
        ColumnType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Value::Int64(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Value::Float64(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| v.and_then(Value::as_str))
                .collect::<StringArray>(),
        ),
        ColumnType::Timestamp => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Some(Value::Timestamp(t)) => Some(*t),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>()
                .with_timezone(TIMESTAMP_TZ),
        ),
        ColumnType::List(item) => build_list(item, values)?,
        ColumnType::Map(value_ty) => build_map(value_ty, values)?,
        ColumnType::Struct(fields) => {
            let children = fields
                .iter()
                .map(|field| {
                    let members: Vec<Option<&Value>> = values
                        .iter()
                        .map(|v| v.and_then(|v| v.field(&field.name)))
                        .collect();
                    build_array(&field.ty, &members)
                })
                .collect::<Result<Vec<_>>>()?;
            let validity: Vec<bool> = values
                .iter()
                .map(|v| matches!(v, Some(Value::Struct(_))))
                .collect();
            Arc::new(StructArray::try_new(
                struct_fields(fields),
                children,
                Some(NullBuffer::from(validity)),
            )?)
        }
    };
    Ok(array)
}

fn build_list(item: &ColumnType, values: &[Option<&Value>]) -> Result<ArrayRef> {
    let mut lengths = Vec::with_capacity(values.len());
    let mut validity = Vec::with_capacity(values.len());
    let mut members: Vec<Option<&Value>> = Vec::new();

    for v in values {
        match v {
            Some(Value::List(items)) => {
                lengths.push(items.len());
                validity.push(true);
                members.extend(items.iter().map(Option::as_ref));
            }
            _ => {
                lengths.push(0);
                validity.push(false);
            }
        }
    }

    let child = build_array(item, &members)?;
    Ok(Arc::new(ListArray::try_new(
        list_item_field(item),
        OffsetBuffer::from_lengths(lengths),
        child,
        Some(NullBuffer::from(validity)),
    )?))
}

fn build_map(value_ty: &ColumnType, values: &[Option<&Value>]) -> Result<ArrayRef> {
    let mut lengths = Vec::with_capacity(values.len());
    let mut validity = Vec::with_capacity(values.len());
    let mut keys: Vec<&str> = Vec::new();
    let mut members: Vec<Option<&Value>> = Vec::new();

    // BTreeMap iteration gives sorted keys, so entries are written deterministically
    for v in values {
        match v {
            Some(Value::Map(entries)) => {
                lengths.push(entries.len());
                validity.push(true);
                for (key, member) in entries {
                    keys.push(key);
                    members.push(member.as_ref());
                }
            }
            _ => {
                lengths.push(0);
                validity.push(false);
            }
        }
    }

    let key_array: ArrayRef = Arc::new(StringArray::from(keys));
    let value_array = build_array(value_ty, &members)?;
    let entries = StructArray::try_new(
        map_entry_fields(value_ty),
        vec![key_array, value_array],
        None,
    )?;

    Ok(Arc::new(MapArray::try_new(
        map_entries_field(value_ty),
        OffsetBuffer::from_lengths(lengths),
        entries,
        Some(NullBuffer::from(validity)),
        false,
    )?))
}
