//! Workbook stream interpreter for Excel 97-2003 binary files.
//!
//! A two-pass walk over the BIFF8 stream: the workbook globals substream
//! yields the code page, date system, shared strings, number formats and
//! sheet offsets; each sheet substream then yields typed cell values and
//! merged regions.

use crate::error::FormatError;
use crate::legacy::biff8::Biff8Reader;
use crate::numfmt::number_to_value;
use crate::numfmt::resolve_formats;
use crate::numfmt::serial_to_value;
use crate::numfmt::NumberFormat;
use crate::workbook::MergedRegion;
use crate::workbook::Value;
use crate::workbook::Workbook;
use crate::workbook::Worksheet;
use std::collections::HashMap;
use thiserror::Error;

const FORMULA: u16 = 6;
const EOF: u16 = 10;
const DATE_1904: u16 = 34;
const FILE_PASS: u16 = 47;
const CODE_PAGE: u16 = 66;
const BOUND_SHEET8: u16 = 133;
const MUL_RK: u16 = 189;
const XF: u16 = 224;
const MERGED_CELLS: u16 = 229;
const SST: u16 = 252;
const LABEL_SST: u16 = 253;
const NUMBER: u16 = 515;
const LABEL: u16 = 516;
const BOOL_ERR: u16 = 517;
const STRING: u16 = 519;
const RK: u16 = 638;
const FORMAT: u16 = 1054;

/// Errors specific to interpreting the workbook stream.
#[derive(Error, Debug)]
pub enum XlsError {
    #[error("Unsupported code page '{0}'")]
    CodePageError(u16),

    #[error("The workbook is password protected")]
    PasswordProtectedError,

    #[error("No 'Workbook' or 'Book' stream in the container")]
    MissingWorkbookStreamError,
}

/// A legacy workbook mid-conversion: globals already parsed, sheet
/// substreams not yet walked.
pub(crate) struct XlsWorkbook {
    reader: Biff8Reader,
    is_1904: bool,
    shared_strings: Vec<String>,
    number_formats: Vec<NumberFormat>,
    /// Sheet names with the stream offsets of their substreams
    bounds: Vec<(String, usize)>,
}

impl XlsWorkbook {
    /// Parses the workbook globals substream of a raw `Workbook` stream.
    pub(crate) fn from_stream(data: Vec<u8>) -> Result<XlsWorkbook, FormatError> {
        let mut reader = Biff8Reader::new(data);
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut format_ids = Vec::new();
        let mut custom_formats = HashMap::new();
        let mut bounds = Vec::new();

        while let Some(kind) = reader.next()? {
            match kind {
                EOF => break,
                FILE_PASS => Err(XlsError::PasswordProtectedError)?,
                DATE_1904 => is_1904 = reader.read_u16()? == 1,
                CODE_PAGE => {
                    let code_page = reader.read_u16()?;
                    // 1200 is UTF-16, the reader's default
                    if code_page != 1200 {
                        reader.encoding = codepage::to_encoding(code_page)
                            .ok_or(XlsError::CodePageError(code_page))?;
                    }
                }
                FORMAT => {
                    let id = reader.read_u16()?;
                    let code = reader.read_string()?;
                    custom_formats.insert(id, NumberFormat::parse_custom(&code));
                }
                XF => {
                    reader.skip(2)?;
                    format_ids.push(reader.read_u16()?);
                }
                SST => {
                    reader.skip(4)?;
                    let unique = reader.read_u32()?;
                    for _ in 0..unique {
                        shared_strings.push(reader.read_rich_string()?);
                    }
                }
                BOUND_SHEET8 => {
                    let pointer = reader.read_u32()? as usize;
                    reader.skip(2)?;
                    let name = reader.read_short_string()?;
                    bounds.push((name, pointer));
                }
                _ => (),
            }
        }

        Ok(XlsWorkbook {
            reader,
            is_1904,
            shared_strings,
            number_formats: resolve_formats(&format_ids, &custom_formats),
            bounds,
        })
    }

    /// Walks every sheet substream and builds the structured workbook.
    pub(crate) fn into_workbook(mut self) -> Result<Workbook, FormatError> {
        let mut workbook = Workbook::default();
        for (name, pointer) in std::mem::take(&mut self.bounds) {
            let mut sheet = Worksheet::new(&name);
            self.reader.goto(pointer);
            // The substream opens with its own BOF
            self.reader.next()?;
            self.read_sheet(&mut sheet)?;
            workbook.sheets.push(sheet);
        }
        Ok(workbook)
    }

    fn read_sheet(&mut self, sheet: &mut Worksheet) -> Result<(), FormatError> {
        // A string-valued formula puts its text in a following STRING record
        let mut pending_formula: Option<(usize, usize)> = None;
        while let Some(kind) = self.reader.next()? {
            if kind == EOF {
                break;
            }
            if kind != STRING {
                pending_formula = None;
            }
            match kind {
                NUMBER => {
                    let (row, col) = self.read_position()?;
                    let format = self.read_format_index()?;
                    let number = self.reader.read_f64()?;
                    sheet.set(row, col, self.number_cell(format, number));
                }
                RK => {
                    let (row, col) = self.read_position()?;
                    let format = self.read_format_index()?;
                    let number = self.reader.read_rk_number()?;
                    sheet.set(row, col, self.number_cell(format, number));
                }
                MUL_RK => {
                    let (row, col_lo) = self.read_position()?;
                    let col_hi = self.reader.peek_u16_from_end(2)? as usize;
                    for col in col_lo..=col_hi {
                        let format = self.read_format_index()?;
                        let number = self.reader.read_rk_number()?;
                        sheet.set(row, col, self.number_cell(format, number));
                    }
                }
                LABEL_SST => {
                    let (row, col) = self.read_position()?;
                    self.reader.skip(2)?;
                    let index = self.reader.read_u32()? as usize;
                    if let Some(string) = self.shared_strings.get(index) {
                        sheet.set(row, col, Value::Text(string.clone()));
                    }
                }
                LABEL => {
                    let (row, col) = self.read_position()?;
                    self.reader.skip(2)?;
                    let string = self.reader.read_string()?;
                    sheet.set(row, col, Value::Text(string));
                }
                BOOL_ERR => {
                    let (row, col) = self.read_position()?;
                    self.reader.skip(2)?;
                    let value = self.reader.read_u8()?;
                    let is_error = self.reader.read_u8()? != 0;
                    let cell = if is_error {
                        Value::Other(error_text(value).to_owned())
                    } else {
                        Value::Bool(value != 0)
                    };
                    sheet.set(row, col, cell);
                }
                FORMULA => {
                    let (row, col) = self.read_position()?;
                    let format = self.read_format_index()?;
                    let cached = self.reader.read_u64()?;
                    if cached >> 48 != 0xFFFF {
                        sheet.set(row, col, self.number_cell(format, f64::from_bits(cached)));
                    } else {
                        let payload = (cached >> 16) as u8;
                        match cached as u8 {
                            // The text arrives in the next STRING record
                            0 => pending_formula = Some((row, col)),
                            1 => sheet.set(row, col, Value::Bool(payload != 0)),
                            2 => sheet.set(row, col, Value::Other(error_text(payload).to_owned())),
                            // 3 is an empty string result; the cell stays null
                            _ => (),
                        }
                    }
                }
                STRING => {
                    let string = self.reader.read_string()?;
                    if let Some((row, col)) = pending_formula.take() {
                        sheet.set(row, col, Value::Text(string));
                    }
                }
                MERGED_CELLS => {
                    let count = self.reader.read_u16()?;
                    for _ in 0..count {
                        let row_lo = self.reader.read_u16()? as usize;
                        let row_hi = self.reader.read_u16()? as usize;
                        let col_lo = self.reader.read_u16()? as usize;
                        let col_hi = self.reader.read_u16()? as usize;
                        sheet.merges.push(MergedRegion {
                            row_lo,
                            row_hi,
                            col_lo,
                            col_hi,
                        });
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn read_position(&mut self) -> Result<(usize, usize), FormatError> {
        let row = self.reader.read_u16()? as usize;
        let col = self.reader.read_u16()? as usize;
        Ok((row, col))
    }

    /// Reads a cell's XF index and resolves it to a format classification.
    fn read_format_index(&mut self) -> Result<NumberFormat, FormatError> {
        let index = self.reader.read_u16()? as usize;
        Ok(self.number_formats.get(index).copied().unwrap_or_default())
    }

    /// Types a raw number by its format: temporal formats decode the serial
    /// day count, everything else splits into integer or float.
    fn number_cell(&self, format: NumberFormat, number: f64) -> Value {
        if format.is_temporal() {
            // Sub-day serials decode as pure times, everything else as date-time
            serial_to_value(number, NumberFormat::DateTime, self.is_1904)
        } else {
            number_to_value(number)
        }
    }
}

/// Cell error code to its display text.
fn error_text(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#UNKNOWN!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn cell_prefix(row: u16, col: u16, xf: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&row.to_le_bytes());
        bytes.extend_from_slice(&col.to_le_bytes());
        bytes.extend_from_slice(&xf.to_le_bytes());
        bytes
    }

    fn xf(format_id: u16) -> Vec<u8> {
        let mut payload = vec![0, 0];
        payload.extend_from_slice(&format_id.to_le_bytes());
        record(XF, &payload)
    }

    /// Globals with one bound sheet, patched to point at `stream.len()` so
    /// the sheet substream can be appended right after.
    fn globals(extra: &[u8]) -> Vec<u8> {
        let mut stream = record(2057, &[0; 16]);
        stream.extend(xf(0)); // index 0: general
        stream.extend(xf(14)); // index 1: a date format
        stream.extend_from_slice(extra);

        // SST with one byte-compressed string "Id"
        let mut sst = Vec::new();
        sst.extend_from_slice(&1u32.to_le_bytes());
        sst.extend_from_slice(&1u32.to_le_bytes());
        sst.extend_from_slice(&[2, 0, 0]);
        sst.extend_from_slice(b"Id");
        stream.extend(record(SST, &sst));

        let pointer_at = stream.len() + 4;
        let mut bound = Vec::new();
        bound.extend_from_slice(&0u32.to_le_bytes());
        bound.extend_from_slice(&0u16.to_le_bytes());
        bound.extend_from_slice(&[6, 0]);
        bound.extend_from_slice(b"Sheet1");
        stream.extend(record(BOUND_SHEET8, &bound));
        stream.extend(record(EOF, &[]));

        let pointer = (stream.len() as u32).to_le_bytes();
        stream[pointer_at..pointer_at + 4].copy_from_slice(&pointer);
        stream
    }

    #[test]
    fn converts_a_synthetic_sheet() {
        let mut stream = globals(&[]);
        stream.extend(record(2057, &[0; 16]));

        let mut label_sst = cell_prefix(0, 0, 0);
        label_sst.extend_from_slice(&0u32.to_le_bytes());
        stream.extend(record(LABEL_SST, &label_sst));

        let mut label = cell_prefix(0, 1, 0);
        label.extend_from_slice(&[3, 0, 0]);
        label.extend_from_slice(b"Age");
        stream.extend(record(LABEL, &label));

        let mut number = cell_prefix(1, 0, 0);
        number.extend_from_slice(&2.5f64.to_le_bytes());
        stream.extend(record(NUMBER, &number));

        let mut rk = cell_prefix(1, 1, 0);
        rk.extend_from_slice(&(((30u32) << 2) | 0x02).to_le_bytes());
        stream.extend(record(RK, &rk));

        let mut bool_cell = cell_prefix(2, 0, 0);
        bool_cell.extend_from_slice(&[1, 0]);
        stream.extend(record(BOOL_ERR, &bool_cell));

        let mut date = cell_prefix(2, 1, 1);
        date.extend_from_slice(&42824f64.to_le_bytes());
        stream.extend(record(NUMBER, &date));

        let mut merges = Vec::new();
        merges.extend_from_slice(&1u16.to_le_bytes());
        for bound in [0u16, 0, 0, 1] {
            merges.extend_from_slice(&bound.to_le_bytes());
        }
        stream.extend(record(MERGED_CELLS, &merges));
        stream.extend(record(EOF, &[]));

        let workbook = XlsWorkbook::from_stream(stream)
            .unwrap()
            .into_workbook()
            .unwrap();
        let sheet = workbook.sheet("Sheet1").unwrap();
        assert_eq!(sheet.get(0, 0), &Value::Text("Id".to_owned()));
        assert_eq!(sheet.get(0, 1), &Value::Text("Age".to_owned()));
        assert_eq!(sheet.get(1, 0), &Value::Float(2.5));
        assert_eq!(sheet.get(1, 1), &Value::Int(30));
        assert_eq!(sheet.get(2, 0), &Value::Bool(true));
        assert_eq!(
            sheet.get(2, 1),
            &Value::DateTime(
                NaiveDate::from_ymd_opt(2017, 3, 30)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            sheet.merges,
            vec![MergedRegion {
                row_lo: 0,
                row_hi: 0,
                col_lo: 0,
                col_hi: 1
            }]
        );
    }

    #[test]
    fn formula_cached_values_come_through_typed() {
        let mut stream = globals(&[]);
        stream.extend(record(2057, &[0; 16]));

        let mut numeric = cell_prefix(0, 0, 0);
        numeric.extend_from_slice(&3.0f64.to_le_bytes());
        stream.extend(record(FORMULA, &numeric));

        let raw: u64 = 0xFFFF_0000_0000_0001 | (1 << 16);
        let mut boolean = cell_prefix(0, 1, 0);
        boolean.extend_from_slice(&raw.to_le_bytes());
        stream.extend(record(FORMULA, &boolean));

        let raw: u64 = 0xFFFF_0000_0000_0002 | (0x07 << 16);
        let mut error = cell_prefix(0, 2, 0);
        error.extend_from_slice(&raw.to_le_bytes());
        stream.extend(record(FORMULA, &error));

        let mut stringy = cell_prefix(0, 3, 0);
        stringy.extend_from_slice(&0xFFFF_0000_0000_0000u64.to_le_bytes());
        stream.extend(record(FORMULA, &stringy));
        let mut text = vec![2, 0, 0];
        text.extend_from_slice(b"ok");
        stream.extend(record(STRING, &text));
        stream.extend(record(EOF, &[]));

        let workbook = XlsWorkbook::from_stream(stream)
            .unwrap()
            .into_workbook()
            .unwrap();
        let sheet = workbook.sheet("Sheet1").unwrap();
        assert_eq!(sheet.get(0, 0), &Value::Int(3));
        assert_eq!(sheet.get(0, 1), &Value::Bool(true));
        assert_eq!(sheet.get(0, 2), &Value::Other("#DIV/0!".to_owned()));
        assert_eq!(sheet.get(0, 3), &Value::Text("ok".to_owned()));
    }

    #[test]
    fn merged_regions_fan_out_through_the_pipeline() {
        let mut stream = globals(&[]);
        stream.extend(record(2057, &[0; 16]));

        // One anchored value in a 2x2 merged region
        let mut number = cell_prefix(0, 0, 0);
        number.extend_from_slice(&42f64.to_le_bytes());
        stream.extend(record(NUMBER, &number));

        let mut merges = Vec::new();
        merges.extend_from_slice(&1u16.to_le_bytes());
        for bound in [0u16, 1, 0, 1] {
            merges.extend_from_slice(&bound.to_le_bytes());
        }
        stream.extend(record(MERGED_CELLS, &merges));
        stream.extend(record(EOF, &[]));

        let mut workbook = XlsWorkbook::from_stream(stream)
            .unwrap()
            .into_workbook()
            .unwrap();
        let sheet = &mut workbook.sheets[0];
        sheet.normalize_merges();

        let table = crate::table::load_table(sheet, true).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        for row in &table.rows {
            for value in row {
                assert_eq!(value, &Value::Int(42));
            }
        }
    }

    #[test]
    fn a_password_protected_stream_is_rejected() {
        let mut stream = record(2057, &[0; 16]);
        stream.extend(record(FILE_PASS, &[1, 0]));
        stream.extend(record(EOF, &[]));
        assert!(matches!(
            XlsWorkbook::from_stream(stream),
            Err(FormatError::XlsError(XlsError::PasswordProtectedError))
        ));
    }
}
