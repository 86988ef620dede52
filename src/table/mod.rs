// src/table/mod.rs
use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::schema::{TableSchema, Value};

pub mod batch;

/// One output row, aligned 1:1 with the table schema. `None` marks an absent cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Option<Value>>,
}

impl Row {
    pub fn new(cells: Vec<Option<Value>>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<Value>] {
        &self.cells
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.cells.get(idx).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Materialised rows plus the schema describing them.
#[derive(Debug, Clone)]
pub struct TabularResult {
    schema: Arc<TableSchema>,
    rows: Vec<Row>,
}

impl TabularResult {
    pub fn new(schema: Arc<TableSchema>, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of `row` in the column called `column`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Keep the rows matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool + Sync + Send,
    {
        let before = self.rows.len();
        let rows: Vec<Row> = self.rows.into_par_iter().filter(|r| predicate(r)).collect();
        debug!(before, after = rows.len(), "filtered rows");
        Self {
            schema: self.schema,
            rows,
        }
    }

    /// Keep rows whose `column` equals `expected`. Absent cells never match.
    pub fn filter_eq(self, column: &str, expected: &Value) -> Result<Self> {
        let idx = self
            .schema
            .column_index(column)
            .ok_or_else(|| anyhow!("cannot filter on unknown column `{}`", column))?;
        Ok(self.filter(|row| row.get(idx) == Some(expected)))
    }

    /// Materialise the table as a single Arrow record batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let columns = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let values: Vec<Option<&Value>> = self.rows.iter().map(|r| r.get(idx)).collect();
                batch::build_array(&col.ty, &values)
                    .with_context(|| format!("building column `{}`", col.name))
            })
            .collect::<Result<Vec<_>>>()?;

        RecordBatch::try_new(self.schema.arrow_schema(), columns)
            .context("assembling record batch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, ColumnType};
    use arrow::array::Array;

    fn table() -> Result<TabularResult> {
        let schema = Arc::new(TableSchema::new(vec![
            ColumnSpec::new("test", "payload/test", ColumnType::Utf8)?,
            ColumnSpec::new("openTabs", "payload/payload/openTabs", ColumnType::Int32)?,
        ])?);
        Ok(TabularResult::new(
            schema,
            vec![
                Row::new(vec![Some("pulse@mozilla.com".into()), Some(Value::Int32(1))]),
                Row::new(vec![Some("other@mozilla.com".into()), Some(Value::Int32(2))]),
                Row::new(vec![None, Some(Value::Int32(3))]),
                Row::new(vec![Some("pulse@mozilla.com".into()), None]),
            ],
        ))
    }

    #[test]
    fn filter_eq_keeps_matching_rows_only() -> Result<()> {
        let filtered = table()?.filter_eq("test", &"pulse@mozilla.com".into())?;
        assert_eq!(filtered.num_rows(), 2);
        assert_eq!(filtered.value(0, "openTabs"), Some(&Value::Int32(1)));
        assert_eq!(filtered.value(1, "openTabs"), None);
        assert!(filtered
            .rows()
            .iter()
            .all(|r| r.get(0) == Some(&Value::from("pulse@mozilla.com"))));
        Ok(())
    }

    #[test]
    fn filter_eq_on_unknown_column_fails() -> Result<()> {
        assert!(table()?.filter_eq("nope", &Value::Int32(1)).is_err());
        Ok(())
    }

    #[test]
    fn filter_with_predicate() -> Result<()> {
        let kept = table()?.filter(|row| matches!(row.get(1), Some(Value::Int32(n)) if *n >= 2));
        assert_eq!(kept.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn record_batch_matches_table_shape() -> Result<()> {
        let batch = table()?.to_record_batch()?;
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.column(0).null_count(), 1);
        assert_eq!(batch.column(1).null_count(), 1);
        Ok(())
    }

    #[test]
    fn empty_table_still_has_a_schema() -> Result<()> {
        let empty = table()?.filter(|_| false);
        let batch = empty.to_record_batch()?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema().fields().len(), 2);
        Ok(())
    }
}
