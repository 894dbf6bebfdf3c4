use crate::tag::{Tag, TAG_SIZE};
use crate::vlq;

/// One framed unit of a MixedFields file.
///
/// Fixed-length fields (`Header`, `Eof`) always have an empty payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: Tag,
    pub payload: Vec<u8>,
}

impl Field {
    #[inline(always)]
    pub fn header() -> Field {
        Field {
            tag: Tag::Header,
            payload: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn metadata(payload: Vec<u8>) -> Field {
        Field {
            tag: Tag::Metadata,
            payload,
        }
    }

    #[inline(always)]
    pub fn data(payload: Vec<u8>) -> Field {
        Field {
            tag: Tag::Data,
            payload,
        }
    }

    #[inline(always)]
    pub fn eof() -> Field {
        Field {
            tag: Tag::Eof,
            payload: Vec::new(),
        }
    }

    /// Exact number of bytes this field occupies on disk.
    pub fn encoded_len(&self) -> u64 {
        encoded_len(self.tag, self.payload.len())
    }
}

/// On-disk size of a field with the given tag and payload length.
pub(crate) fn encoded_len(tag: Tag, payload_len: usize) -> u64 {
    let body = if tag.is_variable_length() {
        vlq::encoded_len(payload_len as u64) + payload_len
    } else {
        0
    };
    (TAG_SIZE + body + 1) as u64
}
