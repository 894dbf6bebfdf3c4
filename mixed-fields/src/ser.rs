use std::io::Write;

use crate::error::{FormatError, Result};
use crate::tag::{Tag, END_BYTE};
use crate::{vlq, Field};

pub(crate) trait Serialize {
    fn write<W: Write>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for Tag {
    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

impl Serialize for Field {
    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_field(writer, self.tag, &self.payload)
    }
}

/// Frame `payload` under `tag` and write the whole field.
///
/// The field is assembled in memory first so a rejected payload writes nothing.
pub(crate) fn write_field<W: Write>(writer: &mut W, tag: Tag, payload: &[u8]) -> Result<()> {
    if !tag.is_variable_length() && !payload.is_empty() {
        return Err(FormatError::UnexpectedPayload(tag).into());
    }

    let mut buf = Vec::with_capacity(crate::field::encoded_len(tag, payload.len()) as usize);
    buf.extend_from_slice(&tag.to_bytes());
    if tag.is_variable_length() {
        vlq::encode_into(&mut buf, payload.len() as u64);
        buf.extend_from_slice(payload);
    }
    buf.push(END_BYTE);
    writer.write_all(&buf)?;

    tracing::trace!(%tag, len = payload.len(), bytes = buf.len(), "serialized field");
    Ok(())
}
