// src/schema/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};
use tracing::debug;

use super::types::{Cleaning, ColumnSpec, ColumnType, TableSchema};
use crate::process::{date_parser::clean_timestamp, REQUEST_ENTRY};

/// One column as written in a YAML column file.
///
/// ```yaml
/// - name: creation_date
///   path: creationDate
///   cleaning: timestamp
/// - name: openTabs
///   path: payload/payload/openTabs
///   type: int
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
    #[serde(default)]
    pub cleaning: Option<String>,
}

/// A registered cleaning step and the type it produces.
pub struct NamedCleaner {
    pub cleaning: Cleaning,
    pub output: ColumnType,
}

/// Look up a cleaner by the name used in column files.
pub fn named_cleaner(name: &str) -> Option<NamedCleaner> {
    match name {
        "timestamp" => Some(NamedCleaner {
            cleaning: Arc::new(clean_timestamp),
            output: ColumnType::Timestamp,
        }),
        "requests" => Some(NamedCleaner {
            cleaning: REQUEST_ENTRY.cleaning(),
            output: REQUEST_ENTRY.map_type(),
        }),
        _ => None,
    }
}

fn column_from_def(def: &ColumnDef) -> Result<ColumnSpec> {
    let cleaner = match def.cleaning.as_deref() {
        Some(name) => Some(
            named_cleaner(name).ok_or_else(|| anyhow!("unknown cleaning `{}`", name))?,
        ),
        None => None,
    };
    let declared = def.ty.as_deref().map(ColumnType::parse).transpose()?;

    let ty = match (declared, &cleaner) {
        (Some(ty), Some(c)) if ty != c.output => {
            bail!("declared type {} does not match cleaning output {}", ty, c.output)
        }
        (Some(ty), _) => ty,
        (None, Some(c)) => c.output.clone(),
        (None, None) => bail!("no type given and no cleaning to infer it from"),
    };

    let spec = ColumnSpec::new(def.name.clone(), &def.path, ty)?;
    Ok(match cleaner {
        Some(c) => spec.with_cleaning(c.cleaning),
        None => spec,
    })
}

/// Resolve column definitions into a schema, keeping their order.
pub fn schema_from_defs(defs: &[ColumnDef]) -> Result<TableSchema> {
    let columns = defs
        .iter()
        .map(|def| column_from_def(def).with_context(|| format!("column `{}`", def.name)))
        .collect::<Result<Vec<_>>>()?;
    TableSchema::new(columns)
}

pub fn parse_columns(yaml: &str) -> Result<TableSchema> {
    let defs: Vec<ColumnDef> = serde_yaml::from_str(yaml).context("parsing column list")?;
    schema_from_defs(&defs)
}

/// Load a YAML column file into a schema.
pub fn load_columns<P: AsRef<Path>>(path: P) -> Result<TableSchema> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading column file {}", path.display()))?;
    let schema =
        parse_columns(&text).with_context(|| format!("in column file {}", path.display()))?;
    debug!(columns = schema.len(), file = %path.display(), "loaded columns");
    Ok(schema)
}
