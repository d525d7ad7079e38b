//! Reader for modern .xlsx workbooks: a ZIP archive of XML parts.
//!
//! The workbook part names the sheets, the relationships part maps them to
//! archive paths, the styles part carries number formats and the shared
//! string table deduplicates text. Cells come out typed the same way the
//! legacy reader types them.

use crate::error::FormatError;
use crate::error::SheetwashError;
use crate::numfmt::number_to_value;
use crate::numfmt::resolve_formats;
use crate::numfmt::serial_to_value;
use crate::numfmt::NumberFormat;
use crate::reference::range_to_indexes;
use crate::reference::reference_to_index;
use crate::workbook::MergedRegion;
use crate::workbook::Value;
use crate::workbook::Workbook;
use crate::workbook::Worksheet;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use iso8601_duration::Duration as IsoDuration;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;
use zip::read::ZipFile;
use zip::ZipArchive;

const TAG_RELATIONSHIP: QName = QName(b"Relationship");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");
const TAG_MERGED_CELL: QName = QName(b"mergeCell");

/// Errors specific to the .xlsx archive layout and contents.
#[derive(Error, Debug)]
pub enum XlsxError {
    #[error("Missing archive part '{0}'")]
    MissingPartError(String),

    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Invalid ISO 8601 value '{0}'")]
    IsoValueError(String),
}

macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// XML pull reader configured for spreadsheet parts.
struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    fn next(&'_ mut self) -> Result<Option<Event<'_>>, FormatError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(FormatError::XmlError(error)),
        }
    }
}

/// Opens an archive part as an XML reader, matching the part name
/// case-insensitively with normalized separators.
fn xml_part<'a, RS: Read + Seek>(
    zip: &'a mut ZipArchive<RS>,
    name: &str,
) -> Result<Option<XmlReader<BufReader<ZipFile<'a, RS>>>>, FormatError> {
    let pattern = name.replace('\\', "/");
    let path = zip
        .file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
        .map(|file_name| file_name.to_owned());
    match path {
        Some(path) => Ok(Some(XmlReader::new(BufReader::new(zip.by_name(&path)?)))),
        None => Ok(None),
    }
}

fn attribute<'a>(event: &'a BytesStart<'a>, name: &str) -> Result<Option<Cow<'a, str>>, FormatError> {
    event
        .try_get_attribute(name)?
        .map(|attribute| Ok(attribute.unescape_value()?))
        .transpose()
}

/// Relationship targets live relative to `xl/`, absolute ones under `/xl/`.
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("/xl/") {
        format!("xl/{stripped}")
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

/// Reads a workbook from a .xlsx file on disk.
pub fn open_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook, SheetwashError> {
    let file = File::open(path).map_err(FormatError::from)?;
    let mut zip = ZipArchive::new(file).map_err(FormatError::from)?;
    let workbook = read_archive(&mut zip)?;
    tracing::debug!(sheets = workbook.sheets.len(), "read workbook archive");
    Ok(workbook)
}

/// Reads all sheets of an already-opened workbook archive.
fn read_archive<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Workbook, FormatError> {
    let (bounds, is_1904) = load_workbook_part(zip)?;
    let number_formats = load_styles(zip)?;
    let shared_strings = load_shared_strings(zip)?;

    let mut workbook = Workbook::default();
    for (name, zip_path) in bounds {
        let sheet = read_sheet(zip, &name, &zip_path, &number_formats, &shared_strings, is_1904)?;
        workbook.sheets.push(sheet);
    }
    Ok(workbook)
}

/// Loads sheet names with their archive paths, plus the date system flag.
fn load_workbook_part<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
) -> Result<(Vec<(String, String)>, bool), FormatError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = xml_part(zip, "xl/workbook.xml")?
        .ok_or_else(|| XlsxError::MissingPartError("xl/workbook.xml".to_owned()))?;

    let mut bounds: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    bounds.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = attribute(&event, "date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((bounds, is_1904))
}

/// Maps relationship ids to worksheet archive paths.
fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, FormatError> {
    let mut reader =
        xml_part(zip, path)?.ok_or_else(|| XlsxError::MissingPartError(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP.into_inner() => {
            let id = attribute(&event, "Id")?;
            let kind = attribute(&event, "Type")?;
            let target = attribute(&event, "Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads number format classifications indexed by cell style id.
fn load_styles<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<NumberFormat>, FormatError> {
    let mut reader = match xml_part(zip, "xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut in_custom_formats = false;
    let mut custom_formats = HashMap::<u16, NumberFormat>::new();
    let mut in_format_indexes = false;
    let mut format_ids = Vec::<u16>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if in_custom_formats && event.name() == TAG_CUSTOM_FORMAT => {
            let id = attribute(&event, "numFmtId")?;
            let code = attribute(&event, "formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id.parse()?, NumberFormat::parse_custom(&code));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => in_format_indexes = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => in_format_indexes = false,
        Event::Start(event) if in_format_indexes && event.name() == TAG_FORMAT_INDEX => {
            if let Some(id) = attribute(&event, "numFmtId")? {
                format_ids.push(id.parse()?);
            }
        }
    });

    Ok(resolve_formats(&format_ids, &custom_formats))
}

/// Loads the whole shared string table.
fn load_shared_strings<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
) -> Result<Vec<String>, FormatError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match xml_part(zip, "xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// How to interpret the raw content of one cell.
#[derive(Copy, Clone, PartialEq)]
enum CellKind {
    Number(NumberFormat),
    SharedString,
    InlineString,
    Boolean,
    IsoDateTime,
    Error,
}

/// Parses one worksheet part into the grid model.
fn read_sheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    name: &str,
    zip_path: &str,
    number_formats: &[NumberFormat],
    shared_strings: &[String],
    is_1904: bool,
) -> Result<Worksheet, FormatError> {
    let mut sheet = Worksheet::new(name);
    let mut reader =
        xml_part(zip, zip_path)?.ok_or_else(|| XlsxError::MissingPartError(zip_path.to_owned()))?;

    // Positions fall back to document order when a cell lacks a reference
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellKind::Number(NumberFormat::General);
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == TAG_ROW => {
            row_count += 1;
            col_count = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = attribute(&event, "r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row_count, col_count));
            col_count += 1;
            kind = match attribute(&event, "t")?.as_deref() {
                Some("s") => CellKind::SharedString,
                Some("inlineStr") | Some("str") => CellKind::InlineString,
                Some("b") => CellKind::Boolean,
                Some("d") => CellKind::IsoDateTime,
                Some("e") => CellKind::Error,
                _ => CellKind::Number(NumberFormat::General),
            };
            if kind == CellKind::Number(NumberFormat::General) {
                if let Some(style) = attribute(&event, "s")? {
                    if !style.is_empty() {
                        let index = style.parse::<usize>()?;
                        let format = number_formats.get(index).copied().unwrap_or_default();
                        kind = CellKind::Number(format);
                    }
                }
            }
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if !value.is_empty() && event.name() == TAG_CELL => {
            let cell = cell_value(kind, &value, shared_strings, is_1904)?;
            sheet.set(row, col, cell);
            value.clear();
        }
        Event::Start(event) if event.name() == TAG_MERGED_CELL => {
            if let Some(range) = attribute(&event, "ref")? {
                if let Some(((row_lo, col_lo), (row_hi, col_hi))) = range_to_indexes(&range) {
                    sheet.merges.push(MergedRegion {
                        row_lo,
                        row_hi,
                        col_lo,
                        col_hi,
                    });
                }
            }
        }
    });
    Ok(sheet)
}

/// Types one cell's raw content.
fn cell_value(
    kind: CellKind,
    raw: &str,
    shared_strings: &[String],
    is_1904: bool,
) -> Result<Value, FormatError> {
    match kind {
        CellKind::SharedString => {
            let index = raw.parse::<usize>()?;
            Ok(shared_strings
                .get(index)
                .map(|string| Value::Text(string.clone()))
                .unwrap_or(Value::Null))
        }
        CellKind::InlineString => Ok(Value::Text(raw.to_owned())),
        CellKind::Boolean => Ok(Value::Bool(raw == "1" || raw.eq_ignore_ascii_case("true"))),
        CellKind::Error => Ok(Value::Other(raw.to_owned())),
        CellKind::IsoDateTime => iso_value(raw),
        CellKind::Number(format) if format.is_temporal() => {
            Ok(serial_to_value(raw.parse()?, format, is_1904))
        }
        CellKind::Number(_) => Ok(number_to_value(raw.parse()?)),
    }
}

/// Parses an ISO 8601 cell: date-time, date, time or duration.
fn iso_value(raw: &str) -> Result<Value, FormatError> {
    if let Ok(datetime) = raw.parse::<NaiveDateTime>() {
        return Ok(Value::DateTime(datetime));
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(Value::Date(date));
    }
    if let Ok(time) = raw.parse::<NaiveTime>() {
        return Ok(Value::Time(time));
    }
    if let Ok(duration) = raw.parse::<IsoDuration>() {
        let seconds = f64::from(duration.day) * 86_400.0
            + f64::from(duration.hour) * 3_600.0
            + f64::from(duration.minute) * 60.0
            + f64::from(duration.second);
        return Ok(Value::Duration(TimeDelta::milliseconds(
            (seconds * 1_000.0).round() as i64,
        )));
    }
    Err(XlsxError::IsoValueError(raw.to_owned()))?
}

/// Collects text content up to `end_tag`, skipping phonetic annotations and
/// resolving character and entity references.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, FormatError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_reference(&mut text, &event)?,
    });
    Ok(text)
}

/// Appends a resolved character or entity reference.
fn push_reference(text: &mut String, bytes: &BytesRef) -> Result<(), FormatError> {
    let raw = bytes.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = if let Some(hex) = number.strip_prefix('x') {
            u32::from_str_radix(hex, 16)?
        } else {
            number.parse::<u32>()?
        };
        if let Some(character) = std::char::from_u32(code) {
            text.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        Err(XlsxError::ParseEntityError(raw.to_string()))?;
    }
    Ok(())
}
