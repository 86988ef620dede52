//! Print the layout of a written pulse artifact: Arrow schema, row groups
//! with their compression, and per-column null counts.

use anyhow::{Context, Result};
use arrow::array::Array;
use clap::Parser;
use parquet::file::{
    metadata::RowGroupMetaData,
    reader::{FileReader, SerializedFileReader},
};
use pulse_etl::sink::read_artifact;
use std::{fs::File, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "inspect_parquet")]
#[command(about = "Inspect a pulse Parquet artifact", long_about = None)]
struct Args {
    #[arg(value_name = "PARQUET_FILE")]
    path: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = File::open(&args.path)
        .with_context(|| format!("failed to open `{}`", args.path.display()))?;
    let reader = SerializedFileReader::new(file)?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    println!("=== {} ===", args.path.display());
    println!("Created by:     {}", file_meta.created_by().unwrap_or("<unknown>"));
    println!("Total rows:     {}", file_meta.num_rows());
    println!("Row groups:     {}", meta.num_row_groups());
    println!();

    for idx in 0..meta.num_row_groups() {
        print_row_group(idx, meta.row_group(idx));
    }

    let batches = read_artifact(&args.path)?;
    let Some(first) = batches.first() else {
        println!("(no record batches)");
        return Ok(());
    };

    println!("=== Columns ===");
    let schema = first.schema();
    for (col, field) in schema.fields().iter().enumerate() {
        let nulls: usize = batches.iter().map(|b| b.column(col).null_count()).sum();
        println!("- {:<24} {:<40} nulls: {}", field.name(), field.data_type(), nulls);
    }
    Ok(())
}

fn print_row_group(idx: usize, rg: &RowGroupMetaData) {
    println!("--- Row Group {} ---", idx);
    println!("  rows: {}  bytes: {}", rg.num_rows(), rg.total_byte_size());
    for col in rg.columns() {
        let nulls = col
            .statistics()
            .and_then(|s| s.null_count_opt())
            .map_or("-".to_string(), |n| n.to_string());
        println!(
            "  {:<40} {:?} {}→{} bytes, nulls {}",
            col.column_path().string(),
            col.compression(),
            col.uncompressed_size(),
            col.compressed_size(),
            nulls
        );
    }
    println!();
}
