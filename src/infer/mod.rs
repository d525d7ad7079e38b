//! Spreadsheet structure inference.
//!
//! The pipeline for one table: build a type-weight matrix, cluster rows into
//! header-like and data-like, fold the header block into one composite header
//! row, and resolve one canonical type per column. Stages run strictly in
//! this order; each consumes the previous stage's output. Nothing here
//! retains state between calls.

pub mod cluster;
pub mod header;
pub mod schema;
pub mod weight;

pub use cluster::classify_rows;
pub use cluster::RowLabel;
pub use header::first_data_row;
pub use header::has_no_header;
pub use weight::TypeWeight;

use crate::error::SheetwashError;
use crate::infer::header::header_rows;
use crate::infer::header::synthesize_titles;
use crate::infer::schema::resolve_column_types;
use crate::table::Table;
use crate::workbook::Value;
use std::collections::HashMap;

/// Mapping from final column name to its canonical type name.
pub type TypeSchema = HashMap<String, String>;

/// A cleaned table: one composite header row of column names and the data
/// rows that remain after the header block is dropped, re-indexed from 0.
/// Created fresh per worksheet and never mutated afterward.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Cleans one table: detects the header block, synthesizes the composite
/// header, drops the header rows and resolves per-column types.
///
/// A table with zero header rows passes through unchanged apart from index
/// reset, with generated `column1..columnN` names standing in for the
/// header. Column types are resolved against the original row layout, before
/// any folding.
pub fn clean(table: &Table) -> Result<(CleanedTable, TypeSchema), SheetwashError> {
    if table.height() == 0 || table.width() == 0 {
        return Err(SheetwashError::EmptyTableError("no rows or columns".to_owned()));
    }

    let labels = classify_rows(table);
    let type_names = resolve_column_types(table, &labels);
    let block = header_rows(&labels);
    tracing::debug!(header_rows = block.len(), "extracted header block");

    let (columns, rows) = if block.is_empty() {
        let columns = (1..=table.width()).map(|col| format!("column{col}")).collect();
        (columns, table.rows.clone())
    } else {
        let block_rows: Vec<&[Value]> = block
            .iter()
            .map(|row| table.rows[*row].as_slice())
            .collect();
        let columns = synthesize_titles(&block_rows);
        // The header block is a contiguous prefix; everything below is data
        (columns, table.rows[block.len()..].to_vec())
    };

    let schema: TypeSchema = columns
        .iter()
        .zip(&type_names)
        .map(|(column, name)| (column.clone(), (*name).to_owned()))
        .collect();
    Ok((CleanedTable { columns, rows }, schema))
}
