//! BIFF8 record stream reader for Excel 97-2003 binary workbooks.
//! Handles the record framing (type, length, CONTINUE stitching), the
//! little-endian scalar encodings, RK compressed numbers and the
//! XLUnicode string shapes.

use crate::error::FormatError;
use encoding_rs::Encoding;
use thiserror::Error;

/// Record type that continues the payload of the preceding record.
const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 record parsing.
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in the current record")]
    ShortRecordError(usize),
}

/// Cursor over a BIFF8 stream.
///
/// `next` frames one logical record (stitching CONTINUE records onto it);
/// the read methods then consume the record payload across chunk borders.
pub(crate) struct Biff8Reader {
    /// Text encoding for byte-compressed strings, set from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    /// Next framing position in the stream
    pointer: usize,
    /// (start, end) payload spans of the current record and its continuations
    chunks: Vec<(usize, usize)>,
    chunk: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: encoding_rs::UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            chunk: 0,
            offset: 0,
        }
    }

    /// Frames the next record and returns its type, or None at end of stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, FormatError> {
        if self.pointer + 4 >= self.buffer.len() {
            return Ok(None);
        }
        self.chunk = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.peek_u16(self.pointer)?;
        let size = self.peek_u16(self.pointer + 2)? as usize;
        self.chunks.push((self.pointer + 4, self.pointer + 4 + size));
        self.pointer += 4 + size;
        while self.pointer + 4 < self.buffer.len() && self.peek_u16(self.pointer)? == CONTINUE {
            let size = self.peek_u16(self.pointer + 2)? as usize;
            self.chunks.push((self.pointer + 4, self.pointer + 4 + size));
            self.pointer += 4 + size;
        }
        Ok(Some(kind))
    }

    /// Repositions record framing at an absolute stream offset.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    fn peek_u16(&self, index: usize) -> Result<u16, Biff8Error> {
        if index + 2 <= self.buffer.len() {
            Ok(u16::from_le_bytes(
                self.buffer[index..index + 2].try_into().expect("u16"),
            ))
        } else {
            Err(Biff8Error::ShortRecordError(2))
        }
    }

    /// Reads a u16 at `offset` bytes back from the end of the current record.
    pub(crate) fn peek_u16_from_end(&self, offset: usize) -> Result<u16, FormatError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if lower + offset < *upper {
                return Ok(self.peek_u16(upper - offset)?);
            }
            offset -= upper - lower;
        }
        Err(Biff8Error::ShortRecordError(2))?
    }

    /// Reads up to `length` payload bytes from the current chunk.
    /// Returns the slice and the number of bytes actually read.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.chunk) {
            let source = (*upper).min(*lower + self.offset);
            let target = (*upper).min(source + length);
            let size = target - source;
            if source < *upper {
                if target == *upper {
                    self.chunk += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    /// Reads exactly `length` bytes or fails.
    fn read_exact(&mut self, length: usize) -> Result<&[u8], FormatError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::ShortRecordError(length))?
        }
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), FormatError> {
        self.read_exact(length).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, FormatError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, FormatError> {
        self.read_exact(2)
            .map(|data| u16::from_le_bytes(data.try_into().expect("u16")))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.read_exact(4)
            .map(|data| u32::from_le_bytes(data.try_into().expect("u32")))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, FormatError> {
        self.read_exact(8)
            .map(|data| u64::from_le_bytes(data.try_into().expect("u64")))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, FormatError> {
        self.read_u64().map(f64::from_bits)
    }

    /// Decodes an RK compressed number: a 30-bit integer or truncated float,
    /// with an optional divide-by-100 flag.
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, FormatError> {
        let raw = self.read_u32()?;
        let is_hundredths = (raw & 0x01) != 0;
        let is_integer = (raw & 0x02) != 0;
        let mut value = if is_integer {
            ((raw as i32) >> 2) as f64
        } else {
            f64::from_bits(((raw >> 2) as u64) << 34)
        };
        if is_hundredths {
            value /= 100.0;
        }
        Ok(value)
    }

    /// Reads an XLUnicodeString with a 1-byte character count.
    pub(crate) fn read_short_string(&mut self) -> Result<String, FormatError> {
        let chars = self.read_u8()? as usize;
        let mut string = String::new();
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads an XLUnicodeString with a 2-byte character count.
    pub(crate) fn read_string(&mut self) -> Result<String, FormatError> {
        let chars = self.read_u16()? as usize;
        let mut string = String::new();
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads an XLUnicodeRichExtendedString, resuming across CONTINUE borders
    /// where each continuation restates the encoding flag.
    pub(crate) fn read_rich_string(&mut self) -> Result<String, FormatError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            actual = self.read_string_into(expected, false, &mut string)?;
        }
        Ok(string)
    }

    /// Reads up to `chars` characters of string payload into `content` and
    /// returns how many were read. Rich-run and phonetic blocks are skipped.
    fn read_string_into(
        &mut self,
        chars: usize,
        is_extended: bool,
        content: &mut String,
    ) -> Result<usize, FormatError> {
        let flags = self.read_u8()?;
        let is_wide = (flags & 0x1) != 0;
        let rich_runs = if is_extended && (flags & 0x8) != 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_bytes = if is_extended && (flags & 0x4) != 0 {
            self.read_u32()? as usize
        } else {
            0
        };

        let expected = if is_wide { chars * 2 } else { chars };
        let encoding = self.encoding;
        let (bytes, actual) = self.read(expected);
        if is_wide {
            let (string, _, _) = encoding.decode(bytes);
            content.push_str(&string);
        } else {
            // Byte-compressed: each byte is the low byte of a UTF-16 unit
            let units: Vec<u16> = bytes.iter().map(|byte| *byte as u16).collect();
            content.push_str(&String::from_utf16_lossy(&units));
        }

        self.skip(4 * rich_runs)?;
        self.skip(phonetic_bytes)?;
        Ok(if is_wide { actual / 2 } else { actual })
    }
}
