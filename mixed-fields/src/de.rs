use std::io::{ErrorKind, Read};

use crate::error::{Error, FormatError, Result};
use crate::tag::{Tag, END_BYTE, TAG_SIZE};
use crate::{vlq, Field};

pub(crate) trait DeserializeOwned {
    fn deserialize_owned<R: Read>(reader: &mut R) -> Result<Self>
    where
        Self: Sized;
}

/// Like `read_exact`, but running out of bytes is a truncated field rather
/// than an I/O failure.
fn read_exact_field<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Format(FormatError::TruncatedField),
        _ => Error::Io(e),
    })
}

impl DeserializeOwned for Tag {
    fn deserialize_owned<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; TAG_SIZE];
        read_exact_field(reader, &mut buf)?;
        Ok(Tag::from_bytes(&buf)?)
    }
}

impl DeserializeOwned for Field {
    fn deserialize_owned<R: Read>(reader: &mut R) -> Result<Self> {
        let tag = Tag::deserialize_owned(reader)?;

        let payload = if tag.is_variable_length() {
            let len = vlq::decode(reader)?;
            // Never trust the length enough to preallocate it.
            let mut payload = Vec::new();
            reader.by_ref().take(len).read_to_end(&mut payload)?;
            if (payload.len() as u64) < len {
                return Err(FormatError::TruncatedField.into());
            }
            payload
        } else {
            Vec::new()
        };

        let mut end = [0u8; 1];
        read_exact_field(reader, &mut end)?;
        if end[0] != END_BYTE {
            return Err(FormatError::BadEndByte { tag, found: end[0] }.into());
        }

        tracing::trace!(%tag, len = payload.len(), "deserialized field");
        Ok(Field { tag, payload })
    }
}
