//! # Sheetwash
//!
//! Structure inference for messy spreadsheet tables: find the header block,
//! fold stacked header rows into one composite header, and resolve a
//! canonical type per column.
//!
//! ## Features
//!
//! - **Multi-format input**: Read modern `.xlsx` archives and legacy `.xls`
//!   binary workbooks into one structured model
//! - **Merged-cell normalization**: Expand merged regions so every member
//!   cell carries the anchor value
//! - **Header detection**: Cluster rows by their cell-type profile to split
//!   header rows from data rows without any layout hints
//! - **Composite headers**: Fold multi-row headers into single column titles
//! - **Type schemas**: Map every column to one canonical type name
//!
//! ## Pipeline
//!
//! ```text
//! open_workbook / convert_legacy -> Worksheet::normalize_merges
//!     -> load_table -> clean -> (CleanedTable, TypeSchema)
//! ```

mod error;
mod infer;
mod legacy;
mod numfmt;
mod reference;
mod table;
mod workbook;
mod xlsx;

pub use crate::error::FormatError;
pub use crate::error::SheetwashError;
pub use crate::infer::clean;
pub use crate::infer::classify_rows;
pub use crate::infer::first_data_row;
pub use crate::infer::has_no_header;
pub use crate::infer::CleanedTable;
pub use crate::infer::RowLabel;
pub use crate::infer::TypeSchema;
pub use crate::infer::TypeWeight;
pub use crate::legacy::biff8::Biff8Error;
pub use crate::legacy::cfb::CfbError;
pub use crate::legacy::convert_legacy;
pub use crate::legacy::xls::XlsError;
pub use crate::table::load_table;
pub use crate::table::Table;
pub use crate::workbook::MergedRegion;
pub use crate::workbook::Value;
pub use crate::workbook::Workbook;
pub use crate::workbook::Worksheet;
pub use crate::xlsx::open_workbook;
pub use crate::xlsx::XlsxError;
