// src/schema/types.rs

use anyhow::{anyhow, bail, Result};
use serde_json::Value as Json;
use std::{collections::BTreeMap, collections::HashSet, fmt, sync::Arc};

use crate::extract::FieldPath;

/// Declared type of an output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    /// Microseconds since the epoch, UTC.
    Timestamp,
    List(Box<ColumnType>),
    /// String-keyed map.
    Map(Box<ColumnType>),
    Struct(Vec<StructField>),
}

/// A named member of a [`ColumnType::Struct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: ColumnType,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl ColumnType {
    /// Parse a column type name.
    ///
    /// Accepts:
    /// - BOOLEAN, BOOL                 → Boolean
    /// - INTEGER, INT, INT32           → Int32
    /// - LONG, BIGINT, INT64           → Int64
    /// - DOUBLE, FLOAT, FLOAT64        → Float64
    /// - STRING, UTF8, VARCHAR*        → Utf8
    /// - TIMESTAMP*                    → Timestamp
    /// - LIST<t>, ARRAY<t>             → List
    /// - MAP<t>                        → Map with string keys
    ///
    /// Struct types have no textual form; they come from nested entry schemas.
    pub fn parse(ty: &str) -> Result<Self> {
        let trimmed = ty.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(inner) = generic_argument(trimmed, &upper, &["LIST", "ARRAY"]) {
            return Ok(ColumnType::List(Box::new(ColumnType::parse(inner)?)));
        }
        if let Some(inner) = generic_argument(trimmed, &upper, &["MAP"]) {
            return Ok(ColumnType::Map(Box::new(ColumnType::parse(inner)?)));
        }

        let parsed = match upper.as_str() {
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "INTEGER" | "INT" | "INT32" => ColumnType::Int32,
            "LONG" | "BIGINT" | "INT64" => ColumnType::Int64,
            "DOUBLE" | "FLOAT" | "FLOAT64" => ColumnType::Float64,
            "STRING" | "UTF8" => ColumnType::Utf8,
            u if u.starts_with("VARCHAR") => ColumnType::Utf8,
            u if u.starts_with("TIMESTAMP") => ColumnType::Timestamp,
            _ => bail!("unknown column type `{}`", ty),
        };
        Ok(parsed)
    }
}

fn generic_argument<'a>(raw: &'a str, upper: &str, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        let rest = upper.strip_prefix(name)?;
        if rest.starts_with('<') && rest.ends_with('>') {
            // `upper` is an ASCII-uppercased copy, byte offsets line up with `raw`
            Some(&raw[name.len() + 1..raw.len() - 1])
        } else {
            None
        }
    })
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Int32 => f.write_str("int32"),
            ColumnType::Int64 => f.write_str("int64"),
            ColumnType::Float64 => f.write_str("float64"),
            ColumnType::Utf8 => f.write_str("utf8"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::List(item) => write!(f, "list<{}>", item),
            ColumnType::Map(value) => write!(f, "map<{}>", value),
            ColumnType::Struct(fields) => {
                f.write_str("struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                f.write_str(">")
            }
        }
    }
}

/// A typed cell value. Absence is modelled as `Option<Value>::None` by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    /// Microseconds since the epoch, UTC.
    Timestamp(i64),
    List(Vec<Option<Value>>),
    Map(BTreeMap<String, Option<Value>>),
    /// Field values in declaration order.
    Struct(Vec<(String, Option<Value>)>),
}

impl Value {
    /// True when this value is a legal instance of `ty`.
    pub fn conforms_to(&self, ty: &ColumnType) -> bool {
        match (self, ty) {
            (Value::Boolean(_), ColumnType::Boolean)
            | (Value::Int32(_), ColumnType::Int32)
            | (Value::Int64(_), ColumnType::Int64)
            | (Value::Float64(_), ColumnType::Float64)
            | (Value::Utf8(_), ColumnType::Utf8)
            | (Value::Timestamp(_), ColumnType::Timestamp) => true,
            (Value::List(items), ColumnType::List(item_ty)) => {
                items.iter().flatten().all(|v| v.conforms_to(item_ty))
            }
            (Value::Map(entries), ColumnType::Map(value_ty)) => {
                entries.values().flatten().all(|v| v.conforms_to(value_ty))
            }
            (Value::Struct(values), ColumnType::Struct(fields)) => {
                values.len() == fields.len()
                    && values.iter().zip(fields).all(|((name, v), field)| {
                        *name == field.name && v.as_ref().map_or(true, |v| v.conforms_to(&field.ty))
                    })
            }
            _ => false,
        }
    }

    /// Look up a struct member by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(values) => values
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, v)| v.as_ref()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_string())
    }
}

/// Optional per-column conversion. Receives the raw extracted value, which
/// may be absent. Failures are contained by the cell builder.
pub type Cleaning = Arc<dyn Fn(Option<&Json>) -> Result<Option<Value>> + Send + Sync>;

/// Descriptor of one output column.
#[derive(Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub path: FieldPath,
    pub cleaning: Option<Cleaning>,
    pub ty: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, path: &str, ty: ColumnType) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            path: FieldPath::parse(path)?,
            cleaning: None,
            ty,
        })
    }

    pub fn with_cleaning(mut self, cleaning: Cleaning) -> Self {
        self.cleaning = Some(cleaning);
        self
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("path", &self.path.to_string())
            .field("cleaning", &self.cleaning.as_ref().map(|_| "<fn>"))
            .field("ty", &self.ty)
            .finish()
    }
}

/// Ordered, immutable set of columns describing one output row shape.
#[derive(Debug, Clone)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Names must be unique and at least one column is required.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(anyhow!("table schema needs at least one column"));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                bail!("duplicate column name `{}`", col.name);
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn paths(&self) -> Vec<&FieldPath> {
        self.columns.iter().map(|c| &c.path).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The row shape as a single struct type, fields in column order.
    pub fn as_struct_type(&self) -> ColumnType {
        ColumnType::Struct(
            self.columns
                .iter()
                .map(|c| StructField::new(c.name.clone(), c.ty.clone()))
                .collect(),
        )
    }
}
