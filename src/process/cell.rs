use serde_json::Value as Json;
use std::panic::{self, AssertUnwindSafe};

use crate::process::convert::convert_to_type;
use crate::schema::{Cleaning, ColumnSpec, Value};

/// Build one cell of a row from a (projected) ping.
///
/// Missing paths, cleaning errors, cleaning panics and values that do not
/// fit the declared type all yield `None`. Nothing is logged; a bad field
/// only ever affects its own cell.
pub fn build_cell(ping: &Json, column: &ColumnSpec) -> Option<Value> {
    let raw = column.path.get(ping);
    let value = match &column.cleaning {
        None => raw.and_then(|r| convert_to_type(r, &column.ty).ok().flatten()),
        Some(cleaning) => run_contained(cleaning, raw),
    };
    value.filter(|v| v.conforms_to(&column.ty))
}

fn run_contained(cleaning: &Cleaning, raw: Option<&Json>) -> Option<Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| cleaning(raw))) {
        Ok(Ok(value)) => value,
        Ok(Err(_)) | Err(_) => None,
    }
}
