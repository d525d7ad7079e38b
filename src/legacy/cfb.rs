//! OLE Compound File Binary container, the outer envelope of legacy .xls
//! workbooks. Only stream lookup is implemented: enough to pull the
//! `Workbook`/`Book` stream out for the BIFF8 reader.

use crate::error::FormatError;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector numbers at or above this are chain terminators / special markers.
const MAX_REGULAR_SECTOR: usize = 0xFFFFFFFB;

/// Streams smaller than this live in the mini-stream with 64-byte sectors.
const MINI_STREAM_CUTOFF: usize = 4096;

/// Errors specific to the compound-file container.
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is too small to hold a compound file header")]
    TruncatedFileError,

    #[error("Invalid OLE signature (not a legacy office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Sector chain for '{0}' runs past the allocation table")]
    BrokenChainError(String),

    #[error("Empty directory")]
    EmptyDirectoryError,
}

/// A parsed compound file: directory entries plus the allocation tables
/// needed to walk stream sector chains.
pub(crate) struct Cfb {
    directory: HashMap<String, Entry>,
    fat: Vec<usize>,
    sectors: Sectors,
    mini_fat: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads and parses the whole container.
    pub(crate) fn open<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, FormatError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 512 {
            Err(CfbError::TruncatedFileError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;

        let header = Header::parse(&data[..512])?;
        let sectors = Sectors {
            data,
            size: header.sector_size()?,
        };
        let fat = load_fat(&sectors, &header)?;
        let directory = load_directory(&fat, &sectors, header.directory_start)?;
        let mini_fat = load_mini_fat(&fat, &sectors, &header)?;
        let mini_sectors = match directory.get("Root Entry") {
            Some(root) => {
                let mut data = read_chain(&fat, &sectors, root.start, "Root Entry")?;
                data.truncate(root.length);
                Sectors { data, size: 64 }
            }
            None => Sectors {
                data: Vec::new(),
                size: 64,
            },
        };

        Ok(Cfb {
            directory,
            fat,
            sectors,
            mini_fat,
            mini_sectors,
        })
    }

    /// Extracts the contents of a named stream, or None if absent.
    pub(crate) fn stream(&self, name: &str) -> Result<Option<Vec<u8>>, FormatError> {
        let Some(entry) = self.directory.get(name) else {
            return Ok(None);
        };
        let mut bytes = if entry.length < MINI_STREAM_CUTOFF {
            read_chain(&self.mini_fat, &self.mini_sectors, entry.start, name)?
        } else {
            read_chain(&self.fat, &self.sectors, entry.start, name)?
        };
        bytes.truncate(entry.length);
        Ok(Some(bytes))
    }
}

/// Follows a sector chain from `start`, concatenating sector contents.
fn read_chain(
    fat: &[usize],
    sectors: &Sectors,
    start: usize,
    name: &str,
) -> Result<Vec<u8>, FormatError> {
    let mut content = Vec::new();
    let mut index = start;
    while index < MAX_REGULAR_SECTOR {
        content.extend_from_slice(sectors.get(index));
        index = *fat
            .get(index)
            .ok_or_else(|| CfbError::BrokenChainError(name.to_owned()))?;
    }
    Ok(content)
}

/// Builds the FAT by first walking the DIFAT (header slots plus any DIFAT
/// sector chain), then loading every FAT sector the DIFAT points to.
fn load_fat(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, FormatError> {
    let mut difat: Vec<usize> = sector_numbers(sectors.header_difat()).collect();
    let mut index = header.difat_start;
    while index < MAX_REGULAR_SECTOR {
        difat.extend(sector_numbers(sectors.get(index)));
        // Each DIFAT sector ends with the number of the next one
        index = difat.pop().ok_or(CfbError::TruncatedFileError)?;
    }

    let mut fat = Vec::new();
    for index in difat {
        if index < MAX_REGULAR_SECTOR {
            fat.extend(sector_numbers(sectors.get(index)));
        }
    }
    Ok(fat)
}

/// Loads the directory chain and indexes entries by name.
fn load_directory(
    fat: &[usize],
    sectors: &Sectors,
    start: usize,
) -> Result<HashMap<String, Entry>, FormatError> {
    let bytes = read_chain(fat, sectors, start, "Directory")?;
    let directory: HashMap<String, Entry> = bytes.chunks_exact(128).map(Entry::parse).collect();
    if directory.is_empty() {
        Err(CfbError::EmptyDirectoryError)?;
    }
    Ok(directory)
}

fn load_mini_fat(
    fat: &[usize],
    sectors: &Sectors,
    header: &Header,
) -> Result<Vec<usize>, FormatError> {
    if header.mini_fat_count == 0 {
        return Ok(Vec::new());
    }
    let bytes = read_chain(fat, sectors, header.mini_fat_start, "MiniFat")?;
    Ok(sector_numbers(&bytes).collect())
}

/// Reads a byte run as little-endian 32-bit sector numbers.
fn sector_numbers(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().expect("[u8; 4]")) as usize)
}

/// All sectors of the file. Sector 0 starts right after the 512-byte header.
struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    fn get(&self, index: usize) -> &[u8] {
        let lower = self.data.len().min((index + 1) * self.size);
        let upper = self.data.len().min((index + 2) * self.size);
        &self.data[lower..upper]
    }

    /// The 109 DIFAT slots embedded in the header.
    fn header_difat(&self) -> &[u8] {
        &self.data[76..512]
    }
}

/// The fields of the 512-byte container header this reader needs.
struct Header {
    major_version: u16,
    sector_shift: u16,
    directory_start: usize,
    mini_fat_start: usize,
    mini_fat_count: usize,
    difat_start: usize,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Header, CfbError> {
        let signature = u64::from_le_bytes(data[0..8].try_into().expect("u64"));
        if signature != 0xE11A_B1A1_E011_CFD0 {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: u16::from_le_bytes(data[26..28].try_into().expect("u16")),
            sector_shift: u16::from_le_bytes(data[30..32].try_into().expect("u16")),
            directory_start: u32::from_le_bytes(data[48..52].try_into().expect("u32")) as usize,
            mini_fat_start: u32::from_le_bytes(data[60..64].try_into().expect("u32")) as usize,
            mini_fat_count: u32::from_le_bytes(data[64..68].try_into().expect("u32")) as usize,
            difat_start: u32::from_le_bytes(data[68..72].try_into().expect("u32")) as usize,
        })
    }

    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            (4, 0x000C) => Ok(4096),
            _ => Err(CfbError::SectorSizeError(self.major_version, self.sector_shift)),
        }
    }
}

/// One 128-byte directory entry: stream name, first sector, byte length.
struct Entry {
    start: usize,
    length: usize,
}

impl Entry {
    fn parse(bytes: &[u8]) -> (String, Entry) {
        // The name field occupies the first 64 bytes; clamp a bogus length
        let size = (u16::from_le_bytes(bytes[64..66].try_into().expect("u16")) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };
        let start = u32::from_le_bytes(bytes[116..120].try_into().expect("u32")) as usize;
        let length = u64::from_le_bytes(bytes[120..128].try_into().expect("u64")) as usize;
        (name, Entry { start, length })
    }
}
