use crate::tag::Tag;

pub type Result<T> = std::result::Result<T, Error>;

/// Structural violations of the MixedFields layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("stream ended inside a length subfield")]
    TruncatedVarint,

    #[error("length subfield does not fit in 64 bits")]
    VarintOverflow,

    #[error("stream ended inside a field")]
    TruncatedField,

    #[error("invalid start byte 0x{0:02x}")]
    BadStartByte(u8),

    #[error("invalid end byte 0x{found:02x} for {tag} field")]
    BadEndByte { tag: Tag, found: u8 },

    #[error("unknown tag name {:?}", String::from_utf8_lossy(.0.as_slice()))]
    UnknownTag([u8; 4]),

    #[error("{0} fields cannot carry a payload")]
    UnexpectedPayload(Tag),

    #[error("file does not start with a header field. Is this a MixedFields file?")]
    MissingHeader,

    #[error("header is not followed by a metadata field")]
    MissingMetadata,

    #[error("expected {expected} field, found {found}")]
    UnexpectedTag { expected: &'static str, found: Tag },

    #[error("file ended without an end-of-file field")]
    MissingEof,

    #[error("{0} bytes found after the end-of-file field")]
    TrailingBytes(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("invalid MixedFields data: {0}")]
    Format(#[from] FormatError),

    #[error("file handle has already been closed")]
    Closed,

    #[error("file handle failed earlier and cannot continue")]
    Poisoned,
}

impl Error {
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// The underlying structural violation, if this is a format error.
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            Error::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Format(_) | Error::Poisoned => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, e)
            }
            Error::Closed => std::io::Error::new(std::io::ErrorKind::Other, e),
        }
    }
}
