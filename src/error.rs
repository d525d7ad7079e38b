use thiserror::Error;

/// A source file that is malformed or unreadable.
/// Aggregates container, record and XML level failures from the format readers.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    CfbError(#[from] crate::legacy::cfb::CfbError),

    #[error("{0}")]
    Biff8Error(#[from] crate::legacy::biff8::Biff8Error),

    #[error("{0}")]
    XlsError(#[from] crate::legacy::xls::XlsError),

    #[error("{0}")]
    XlsxError(#[from] crate::xlsx::XlsxError),
}

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum SheetwashError {
    #[error("{0}")]
    FormatError(#[from] FormatError),

    /// No rows or columns left once fully-null ones are dropped.
    #[error("empty table: {0}")]
    EmptyTableError(String),
}
