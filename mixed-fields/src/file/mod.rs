pub(crate) mod meta;
#[cfg(feature = "reader")]
pub mod reader;
#[cfg(feature = "writer")]
pub mod writer;

pub use self::meta::{Metadata, DEFAULT_METADATA};

/// 64KB buffer for sequential field I/O
pub(crate) const BUFFER_SIZE: usize = 64 * 1024;
