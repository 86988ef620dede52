// src/process/mod.rs
use rayon::prelude::*;
use serde_json::Value as Json;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, instrument};

use crate::extract::project;
use crate::schema::TableSchema;
use crate::table::{Row, TabularResult};

pub mod cell;
pub mod convert;
pub mod date_parser;
pub mod nested;

pub use cell::build_cell;
pub use nested::{Conversion, ConversionError, EntrySchema, REQUEST_ENTRY};

/// Build one row, one cell per column in schema order.
pub fn build_row(ping: &Json, schema: &TableSchema) -> Row {
    Row::new(
        schema
            .columns()
            .iter()
            .map(|col| build_cell(ping, col))
            .collect(),
    )
}

/// Turn a stream of raw pings into a table shaped by `schema`.
///
/// Each ping is first projected down to the schema's paths, then built into
/// a row. Rows are built in parallel; output order follows input order.
#[instrument(level = "info", skip_all, fields(columns = schema.len()))]
pub fn pings_to_table<I>(pings: I, schema: Arc<TableSchema>) -> TabularResult
where
    I: IntoParallelIterator<Item = Json>,
{
    let start = Instant::now();
    let paths = schema.paths();
    debug!(?paths, "projecting pings");

    let rows: Vec<Row> = pings
        .into_par_iter()
        .map(|ping| {
            let projected = project(&ping, &paths);
            build_row(&projected, &schema)
        })
        .collect();

    info!(rows = rows.len(), elapsed = ?start.elapsed(), "built table");
    TabularResult::new(schema, rows)
}
