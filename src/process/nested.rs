//! Per-entry mapping of a dynamically keyed map field into fixed-shape
//! sub-rows.
//!
//! Unlike the top-level cell builder, conversions here are not contained: a
//! present value that cannot be converted fails the entry, and with it the
//! whole map. The outer column's cleaning then degrades to an absent cell.

use anyhow::anyhow;
use once_cell::sync::Lazy;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::process::convert::json_kind;
use crate::schema::{Cleaning, ColumnType, StructField, Value};

/// The fixed shape of one `requests` entry.
pub static REQUEST_ENTRY: Lazy<EntrySchema> = Lazy::new(|| {
    EntrySchema::new(vec![
        ("num", Conversion::Int64),
        ("cached", Conversion::Float64),
        ("cdn", Conversion::Float64),
        ("time", Conversion::Int64),
    ])
});

#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("cannot convert {found} to {target}")]
    Unsupported {
        target: &'static str,
        found: &'static str,
    },
    #[error("{value:?} is not a valid {target}")]
    Unparseable { target: &'static str, value: String },
    #[error("{value} is out of range for {target}")]
    OutOfRange { target: &'static str, value: String },
    #[error("expected an object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ConversionError>,
    },
    #[error("entry `{key}`: {source}")]
    Entry {
        key: String,
        #[source]
        source: Box<ConversionError>,
    },
}

impl ConversionError {
    fn in_field(self, field: &str) -> Self {
        ConversionError::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    fn in_entry(self, key: &str) -> Self {
        ConversionError::Entry {
            key: key.to_string(),
            source: Box::new(self),
        }
    }
}

/// Typed conversion applied to one entry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Int64,
    Float64,
}

impl Conversion {
    pub fn column_type(self) -> ColumnType {
        match self {
            Conversion::Int64 => ColumnType::Int64,
            Conversion::Float64 => ColumnType::Float64,
        }
    }

    /// Convert a present value.
    ///
    /// Integers: integers pass, finite floats truncate toward zero, booleans
    /// are 0/1, strings are trimmed and parsed. Floats: numbers pass,
    /// booleans are 0/1, strings are trimmed and parsed.
    pub fn convert(self, raw: &Json) -> Result<Value, ConversionError> {
        match self {
            Conversion::Int64 => to_int64(raw).map(Value::Int64),
            Conversion::Float64 => to_float64(raw).map(Value::Float64),
        }
    }

    /// Absent and `null` stay absent; anything else must convert.
    pub fn convert_nullable(self, raw: Option<&Json>) -> Result<Option<Value>, ConversionError> {
        match raw {
            None | Some(Json::Null) => Ok(None),
            Some(v) => self.convert(v).map(Some),
        }
    }
}

fn to_int64(raw: &Json) -> Result<i64, ConversionError> {
    const TARGET: &str = "int64";
    match raw {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(ConversionError::OutOfRange {
                    target: TARGET,
                    value: n.to_string(),
                })
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                float_to_int64(f)
            }
        }
        Json::Bool(b) => Ok(i64::from(*b)),
        Json::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ConversionError::Unparseable {
                target: TARGET,
                value: s.clone(),
            }),
        other => Err(ConversionError::Unsupported {
            target: TARGET,
            found: json_kind(other),
        }),
    }
}

fn float_to_int64(f: f64) -> Result<i64, ConversionError> {
    // 2^63 is exactly representable; anything at or past it overflows
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    if !t.is_finite() || t >= LIMIT || t < -LIMIT {
        return Err(ConversionError::OutOfRange {
            target: "int64",
            value: f.to_string(),
        });
    }
    Ok(t as i64)
}

fn to_float64(raw: &Json) -> Result<f64, ConversionError> {
    const TARGET: &str = "float64";
    match raw {
        Json::Number(n) => n.as_f64().ok_or_else(|| ConversionError::OutOfRange {
            target: TARGET,
            value: n.to_string(),
        }),
        Json::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Json::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConversionError::Unparseable {
                target: TARGET,
                value: s.clone(),
            }),
        other => Err(ConversionError::Unsupported {
            target: TARGET,
            found: json_kind(other),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryField {
    pub name: String,
    pub conversion: Conversion,
}

/// Fixed field set applied to every entry of a keyed map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySchema {
    fields: Vec<EntryField>,
}

impl EntrySchema {
    pub fn new(fields: Vec<(&str, Conversion)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, conversion)| EntryField {
                    name: name.to_string(),
                    conversion,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[EntryField] {
        &self.fields
    }

    pub fn struct_type(&self) -> ColumnType {
        ColumnType::Struct(
            self.fields
                .iter()
                .map(|f| StructField::new(f.name.clone(), f.conversion.column_type()))
                .collect(),
        )
    }

    /// Type of the whole keyed map: string keys to entry structs.
    pub fn map_type(&self) -> ColumnType {
        ColumnType::Map(Box::new(self.struct_type()))
    }

    /// Convert one entry record. Fields missing from the record are absent.
    pub fn build_entry(&self, record: &Json) -> Result<Value, ConversionError> {
        let obj = as_object(record)?;
        let values = self
            .fields
            .iter()
            .map(|f| {
                let v = f
                    .conversion
                    .convert_nullable(obj.get(&f.name))
                    .map_err(|e| e.in_field(&f.name))?;
                Ok((f.name.clone(), v))
            })
            .collect::<Result<Vec<_>, ConversionError>>()?;
        Ok(Value::Struct(values))
    }

    /// Map every entry of `raw`, keeping its key set. Keys come out sorted.
    pub fn map_entries(&self, raw: &Json) -> Result<Value, ConversionError> {
        let obj = as_object(raw)?;
        let entries = obj
            .iter()
            .map(|(key, record)| {
                let entry = self.build_entry(record).map_err(|e| e.in_entry(key))?;
                Ok((key.clone(), Some(entry)))
            })
            .collect::<Result<BTreeMap<_, _>, ConversionError>>()?;
        Ok(Value::Map(entries))
    }

    /// Wrap the mapper as a column cleaning step.
    pub fn cleaning(&self) -> Cleaning {
        let schema = self.clone();
        Arc::new(move |raw: Option<&Json>| -> anyhow::Result<Option<Value>> {
            let raw = raw.ok_or_else(|| anyhow!("no entries to map"))?;
            Ok(Some(schema.map_entries(raw)?))
        })
    }
}

fn as_object(raw: &Json) -> Result<&Map<String, Json>, ConversionError> {
    raw.as_object().ok_or(ConversionError::NotAnObject {
        found: json_kind(raw),
    })
}
