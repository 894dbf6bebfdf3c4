//! Herein lies the brains of the `MixedFields` container format.
//!
//! A MixedFields file is a flat sequence of tagged fields: one header, one
//! opaque metadata blob, any number of data items and a terminal end-of-file
//! marker. Use [MixedFieldsWriter][MixedFieldsWriter] to append items and
//! [MixedFieldsReader][MixedFieldsReader] to pull them back out one at a time.

mod counting;
#[cfg(feature = "reader")]
mod de;
mod error;
mod field;
mod file;
#[cfg(feature = "writer")]
mod ser;
pub mod tag;
pub mod vlq;

use std::path::Path;

pub use error::{Error, FormatError, Result};
pub use field::Field;
#[cfg(feature = "reader")]
pub use file::reader::{Items, MixedFieldsReader};
#[cfg(feature = "writer")]
pub use file::writer::MixedFieldsWriter;
pub use file::{Metadata, DEFAULT_METADATA};
pub use tag::{Tag, END_BYTE, START_BYTE, TAG_SIZE};

/// Open an existing MixedFields file for sequential reading.
#[cfg(feature = "reader")]
#[inline(always)]
pub fn open_read<P: AsRef<Path>>(path: P) -> Result<MixedFieldsReader> {
    MixedFieldsReader::open(path)
}

/// Open (or create) a MixedFields file for appending items.
#[cfg(feature = "writer")]
#[inline(always)]
pub fn open_write<P: AsRef<Path>>(path: P) -> Result<MixedFieldsWriter> {
    MixedFieldsWriter::open(path)
}
