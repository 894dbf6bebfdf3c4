/// Metadata written for new files when none is supplied: an 8-byte reserved
/// block of zeroes.
pub const DEFAULT_METADATA: [u8; 8] = [0u8; 8];

/// The opaque payload of the metadata field. Never interpreted by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata(pub(crate) Vec<u8>);

impl Metadata {
    #[inline(always)]
    pub fn new(bytes: Vec<u8>) -> Metadata {
        Metadata(bytes)
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline(always)]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata(DEFAULT_METADATA.to_vec())
    }
}

impl AsRef<[u8]> for Metadata {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Metadata {
    fn from(bytes: Vec<u8>) -> Self {
        Metadata(bytes)
    }
}
