use anyhow::{anyhow, Result};
use serde_json::Value as Json;

use crate::process::date_parser;
use crate::schema::{ColumnType, Value};

/// Type a raw JSON value into the declared column type.
///
/// `null` becomes `Ok(None)`. Scalars are matched strictly; members of
/// lists, maps and structs that cannot be typed become null members rather
/// than failing the whole value.
pub fn convert_to_type(raw: &Json, ty: &ColumnType) -> Result<Option<Value>> {
    if raw.is_null() {
        return Ok(None);
    }

    let value = match ty {
        ColumnType::Boolean => Value::Boolean(raw.as_bool().ok_or_else(|| mismatch(raw, ty))?),
        ColumnType::Int32 => {
            let wide = raw.as_i64().ok_or_else(|| mismatch(raw, ty))?;
            Value::Int32(
                i32::try_from(wide).map_err(|_| anyhow!("{} does not fit in int32", wide))?,
            )
        }
        ColumnType::Int64 => Value::Int64(raw.as_i64().ok_or_else(|| mismatch(raw, ty))?),
        ColumnType::Float64 => Value::Float64(raw.as_f64().ok_or_else(|| mismatch(raw, ty))?),
        ColumnType::Utf8 => {
            Value::Utf8(raw.as_str().ok_or_else(|| mismatch(raw, ty))?.to_string())
        }
        ColumnType::Timestamp => Value::Timestamp(timestamp_micros(raw)?),
        ColumnType::List(item) => {
            let items = raw.as_array().ok_or_else(|| mismatch(raw, ty))?;
            Value::List(items.iter().map(|v| member(v, item)).collect())
        }
        ColumnType::Map(value_ty) => {
            let obj = raw.as_object().ok_or_else(|| mismatch(raw, ty))?;
            Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), member(v, value_ty)))
                    .collect(),
            )
        }
        ColumnType::Struct(fields) => {
            let obj = raw.as_object().ok_or_else(|| mismatch(raw, ty))?;
            Value::Struct(
                fields
                    .iter()
                    .map(|f| {
                        let v = obj.get(&f.name).and_then(|v| member(v, &f.ty));
                        (f.name.clone(), v)
                    })
                    .collect(),
            )
        }
    };
    Ok(Some(value))
}

fn member(raw: &Json, ty: &ColumnType) -> Option<Value> {
    convert_to_type(raw, ty).ok().flatten()
}

/// Integers are epoch milliseconds; strings go through the date parser.
fn timestamp_micros(raw: &Json) -> Result<i64> {
    if let Some(millis) = raw.as_i64() {
        return millis
            .checked_mul(1_000)
            .ok_or_else(|| anyhow!("timestamp {} out of range", millis));
    }
    if let Some(s) = raw.as_str() {
        return date_parser::parse_timestamp_micros(s)
            .ok_or_else(|| anyhow!("unrecognised timestamp {:?}", s));
    }
    Err(mismatch(raw, &ColumnType::Timestamp))
}

fn mismatch(raw: &Json, ty: &ColumnType) -> anyhow::Error {
    anyhow!("cannot read {} as {}", json_kind(raw), ty)
}

/// Short name of a JSON value's kind, for error messages.
pub fn json_kind(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
