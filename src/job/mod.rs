// src/job/mod.rs
use anyhow::{anyhow, Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde_json::Value as Json;
use std::{path::PathBuf, sync::Arc};
use tracing::{info, instrument};

use crate::process::pings_to_table;
use crate::schema::{config, load_columns, TableSchema, Value};
use crate::sink::ParquetSink;
use crate::source::{PingQuery, PingSource};
use crate::table::TabularResult;

pub const PULSE_TEST_ID: &str = "pulse@mozilla.com";
pub const DOC_TYPE: &str = "testpilottest";
pub const APP_NAME: &str = "Firefox";
/// Column holding the Test Pilot experiment id.
pub const TEST_COLUMN: &str = "test";

const PULSE_COLUMNS: &str = include_str!("pulse_columns.yaml");

/// The 31 output columns of the pulse table.
pub fn pulse_schema() -> Result<TableSchema> {
    config::parse_columns(PULSE_COLUMNS).context("built-in pulse columns")
}

/// Build the pulse table from raw pings and keep only pulse experiment rows.
pub fn transform_pings<I>(pings: I) -> Result<TabularResult>
where
    I: IntoIterator<Item = Json>,
{
    transform_with(pings, Arc::new(pulse_schema()?))
}

/// Like [`transform_pings`] with a caller supplied column list. The column
/// list must contain a `test` column.
pub fn transform_with<I>(pings: I, schema: Arc<TableSchema>) -> Result<TabularResult>
where
    I: IntoIterator<Item = Json>,
{
    let pings: Vec<Json> = pings.into_iter().collect();
    pings_to_table(pings, schema).filter_eq(TEST_COLUMN, &Value::from(PULSE_TEST_ID))
}

pub fn parse_submission_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .with_context(|| format!("submission date `{}` is not YYYYMMDD", raw))
}

pub fn format_submission_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Yesterday, local time.
pub fn default_submission_date() -> Result<NaiveDate> {
    Local::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| anyhow!("cannot compute yesterday's date"))
}

/// Settings of one job run.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Defaults to yesterday.
    pub submission_date: Option<NaiveDate>,
    pub save: bool,
    pub output_dir: PathBuf,
    /// YAML column file replacing the built-in pulse columns.
    pub columns: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            submission_date: None,
            save: true,
            output_dir: PathBuf::from("txp_pulse/v1"),
            columns: None,
        }
    }
}

impl JobConfig {
    fn schema(&self) -> Result<TableSchema> {
        match &self.columns {
            Some(path) => load_columns(path),
            None => pulse_schema(),
        }
    }
}

/// Run the pulse ETL for one submission day.
///
/// Fetches the day's Test Pilot pings, builds the table and, when `save` is
/// set, replaces the day's Parquet partition. Any source or sink failure
/// aborts the run.
#[instrument(level = "info", skip(source))]
pub fn etl_job(source: &dyn PingSource, config: &JobConfig) -> Result<TabularResult> {
    let date = match config.submission_date {
        Some(d) => d,
        None => default_submission_date()?,
    };
    let schema = Arc::new(config.schema()?);
    let query = PingQuery::new(DOC_TYPE, APP_NAME, format_submission_date(date));

    let pings = source
        .projected(&query, &schema.paths())
        .with_context(|| format!("fetching pings for {}", query.submission_date))?;
    info!(pings = pings.len(), date = %query.submission_date, "fetched pings");

    let table = transform_with(pings, schema)?;
    info!(rows = table.num_rows(), "pulse rows");

    if config.save {
        ParquetSink::new(&config.output_dir).write(&table, date)?;
    }
    Ok(table)
}
