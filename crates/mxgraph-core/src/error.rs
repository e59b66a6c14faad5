#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("utf8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown entity reference: &{0};")]
    UnknownEntity(String),

    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),

    #[error("invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unexpected structure: {0}")]
    Structure(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Failures of the embedded payload pipeline. Each variant names the stage
/// that rejected the input.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("inflate error: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("deflate error: {0}")]
    Deflate(#[source] std::io::Error),

    #[error("compression level {0} is outside 0-9")]
    CompressionLevel(u32),

    #[error("inflated payload is not utf8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("percent-decoded payload is not utf8: {0}")]
    PercentDecode(#[source] std::str::Utf8Error),

    #[error("payload xml: {0}")]
    Xml(#[source] ParseError),

    #[error("graph model: {0}")]
    Model(#[source] ParseError),
}

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("cell not found: {0}")]
    CellNotFound(String),

    #[error("duplicate cell id: {0}")]
    DuplicateId(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
