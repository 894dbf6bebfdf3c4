//! Field tags and the sentinel bytes that frame every field.

use std::fmt;

use crate::error::FormatError;

/// Precedes every field. ASCII "record separator".
pub const START_BYTE: u8 = 0x1E;

/// Terminates every field. ASCII "unit separator".
pub const END_BYTE: u8 = 0x1F;

/// Start byte plus the 4-byte tag name.
pub const TAG_SIZE: usize = 5;

pub(crate) const NAME_HEADER: &[u8; 4] = b"Mixd";
pub(crate) const NAME_METADATA: &[u8; 4] = b"sMDT";
pub(crate) const NAME_DATA: &[u8; 4] = b"sDAT";
pub(crate) const NAME_EOF: &[u8; 4] = b"xEOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Header,
    Metadata,
    Data,
    Eof,
}

impl Tag {
    #[inline(always)]
    pub fn name(self) -> &'static [u8; 4] {
        match self {
            Tag::Header => NAME_HEADER,
            Tag::Metadata => NAME_METADATA,
            Tag::Data => NAME_DATA,
            Tag::Eof => NAME_EOF,
        }
    }

    /// Variable-length fields carry a length subfield and payload after the tag.
    #[inline(always)]
    pub fn is_variable_length(self) -> bool {
        matches!(self, Tag::Metadata | Tag::Data)
    }

    pub fn from_name(name: &[u8; 4]) -> Result<Tag, FormatError> {
        match name {
            NAME_HEADER => Ok(Tag::Header),
            NAME_METADATA => Ok(Tag::Metadata),
            NAME_DATA => Ok(Tag::Data),
            NAME_EOF => Ok(Tag::Eof),
            other => Err(FormatError::UnknownTag(*other)),
        }
    }

    /// The full 5 bytes as they appear on disk.
    pub fn to_bytes(self) -> [u8; TAG_SIZE] {
        let name = self.name();
        [START_BYTE, name[0], name[1], name[2], name[3]]
    }

    /// Parse the 5 on-disk tag bytes, checking the start sentinel first.
    pub fn from_bytes(bytes: &[u8; TAG_SIZE]) -> Result<Tag, FormatError> {
        if bytes[0] != START_BYTE {
            return Err(FormatError::BadStartByte(bytes[0]));
        }
        let mut name = [0u8; 4];
        name.copy_from_slice(&bytes[1..]);
        Tag::from_name(&name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tag::Header => "header",
            Tag::Metadata => "metadata",
            Tag::Data => "data",
            Tag::Eof => "eof",
        })
    }
}
