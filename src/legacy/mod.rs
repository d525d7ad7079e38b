//! Reader for legacy Excel 97-2003 binary workbooks: the OLE compound file
//! container, the BIFF8 record framing and the workbook stream interpreter.

pub mod biff8;
pub mod cfb;
pub mod xls;

use crate::error::SheetwashError;
use crate::legacy::cfb::Cfb;
use crate::legacy::xls::XlsError;
use crate::legacy::xls::XlsWorkbook;
use crate::workbook::Workbook;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Converts a legacy binary workbook into the structured in-memory model.
///
/// The cell values come out typed the same way the modern reader types them,
/// so everything downstream is format-agnostic.
pub fn convert_legacy<P: AsRef<Path>>(path: P) -> Result<Workbook, SheetwashError> {
    let mut reader = BufReader::new(File::open(path).map_err(crate::error::FormatError::from)?);
    let cfb = Cfb::open(&mut reader)?;
    // Excel 97+ names the stream "Workbook"; Excel 5.0/95 wrote "Book"
    let stream = match cfb.stream("Workbook")? {
        Some(stream) => stream,
        None => cfb
            .stream("Book")?
            .ok_or_else(|| crate::error::FormatError::from(XlsError::MissingWorkbookStreamError))?,
    };
    let workbook = XlsWorkbook::from_stream(stream)?.into_workbook()?;
    tracing::debug!(sheets = workbook.sheets.len(), "converted legacy workbook");
    Ok(workbook)
}
