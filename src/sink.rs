// src/sink.rs
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use crate::table::TabularResult;

pub const PARTITION_KEY: &str = "submission_date";
pub const ARTIFACT_NAME: &str = "part-00000.snappy.parquet";

/// Writes one Parquet artifact per submission date, replacing whatever the
/// partition held before.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    base_dir: PathBuf,
}

impl ParquetSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/submission_date=YYYYMMDD`
    pub fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}={}", PARTITION_KEY, date.format("%Y%m%d")))
    }

    /// Persist `table` as the only artifact of `date`'s partition.
    ///
    /// The batch is written to a temp file next to the partition first, so a
    /// failed write leaves the previous artifact untouched.
    #[instrument(level = "info", skip(self, table), fields(rows = table.num_rows()))]
    pub fn write(&self, table: &TabularResult, date: NaiveDate) -> Result<PathBuf> {
        let batch = table.to_record_batch()?;
        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("could not create `{}`", self.base_dir.display()))?;

        let part_dir = self.partition_dir(date);
        let tmp = self
            .base_dir
            .join(format!(".{}={}.tmp", PARTITION_KEY, date.format("%Y%m%d")));

        let file =
            File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
            .context("creating Arrow writer")?;
        writer.write(&batch).context("writing record batch")?;
        writer.close().context("closing Arrow writer")?;

        if part_dir.exists() {
            debug!(dir = %part_dir.display(), "clearing previous partition");
            fs::remove_dir_all(&part_dir)
                .with_context(|| format!("clearing `{}`", part_dir.display()))?;
        }
        fs::create_dir_all(&part_dir)?;

        let final_path = part_dir.join(ARTIFACT_NAME);
        fs::rename(&tmp, &final_path)
            .with_context(|| format!("moving artifact into `{}`", final_path.display()))?;

        info!(path = %final_path.display(), "wrote parquet");
        Ok(final_path)
    }
}

/// Read every batch of a Parquet artifact.
pub fn read_artifact<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open `{}`", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(1024)
        .build()?;
    reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading `{}`", path.display()))
}
