//! pulse-etl: turn one day of Test Pilot pulse pings into a Parquet partition.
//!
//! Usage:
//!   # yesterday's pings from ./pings into ./txp_pulse/v1
//!   pulse-etl --input-dir pings
//!
//!   # a given day, dry run with a custom column file
//!   pulse-etl --submission-date 20170223 --no-save --columns columns.yaml

use anyhow::Result;
use clap::Parser;
use pulse_etl::{
    job::{self, JobConfig},
    source::LocalDataset,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pulse-etl")]
#[command(about = "Flatten Test Pilot pulse pings into Parquet", long_about = None)]
struct Args {
    /// Submission day as YYYYMMDD (defaults to yesterday)
    #[arg(long, value_parser = job::parse_submission_date)]
    submission_date: Option<chrono::NaiveDate>,

    /// Build the table without writing it
    #[arg(long)]
    no_save: bool,

    /// Directory holding *.json / *.jsonl ping files
    #[arg(long, env = "PULSE_INPUT_DIR", default_value = "pings")]
    input_dir: PathBuf,

    /// Root of the partitioned Parquet output
    #[arg(long, env = "PULSE_OUTPUT_DIR", default_value = "txp_pulse/v1")]
    output_dir: PathBuf,

    /// YAML column file replacing the built-in pulse columns
    #[arg(long, value_name = "YAML")]
    columns: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let config = JobConfig {
        submission_date: args.submission_date,
        save: !args.no_save,
        output_dir: args.output_dir,
        columns: args.columns,
    };

    let source = LocalDataset::new(args.input_dir);
    let table = job::etl_job(&source, &config)?;
    info!(rows = table.num_rows(), saved = config.save, "done");
    Ok(())
}
