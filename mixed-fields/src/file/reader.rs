use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use super::{Metadata, BUFFER_SIZE};
use crate::{
    counting::CountingReader,
    de::DeserializeOwned,
    error::{Error, FormatError, Result},
    tag::Tag,
    Field,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Exhausted,
    Failed,
    Closed,
}

/// Sequential reader for MixedFields files.
///
/// The header and metadata are validated on open. Data items are then pulled
/// one at a time until the end-of-file field is reached. The sequence is
/// forward-only; reopen the file to read it again.
#[derive(Debug)]
pub struct MixedFieldsReader {
    file: Option<CountingReader<BufReader<File>>>,
    path: PathBuf,
    meta: Metadata,
    phase: Phase,
    /// End of the last field read
    offset: u64,
    items_read: u64,
}

/// Read and validate the header and metadata fields at the start of a file.
///
/// Returns the metadata payload.
pub(crate) fn read_preamble<R: BufRead>(reader: &mut R) -> Result<Metadata> {
    if reader.fill_buf()?.is_empty() {
        return Err(FormatError::MissingHeader.into());
    }
    let header = Field::deserialize_owned(reader).map_err(|e| match e {
        Error::Format(FormatError::BadStartByte(_)) | Error::Format(FormatError::UnknownTag(_)) => {
            Error::Format(FormatError::MissingHeader)
        }
        e => e,
    })?;
    if header.tag != Tag::Header {
        return Err(FormatError::MissingHeader.into());
    }

    if reader.fill_buf()?.is_empty() {
        return Err(FormatError::MissingMetadata.into());
    }
    let meta = Field::deserialize_owned(reader)?;
    if meta.tag != Tag::Metadata {
        return Err(FormatError::MissingMetadata.into());
    }

    Ok(Metadata(meta.payload))
}

impl MixedFieldsReader {
    /// Open an existing MixedFields file, erroring if its header or metadata
    /// field is missing or malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MixedFieldsReader> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path)?;
        let mut file = CountingReader::new(BufReader::with_capacity(BUFFER_SIZE, file));

        let meta = read_preamble(&mut file)?;
        let offset = file.bytes_read();

        tracing::debug!(
            path = %path.display(),
            metadata = meta.len(),
            offset = format_args!("{:#x}", offset),
            "opened MixedFields file for reading"
        );

        Ok(MixedFieldsReader {
            file: Some(file),
            path,
            meta,
            phase: Phase::Streaming,
            offset,
            items_read: 0,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The opaque metadata payload stored after the header.
    #[inline(always)]
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    /// Number of data items returned so far.
    #[inline(always)]
    pub fn items_read(&self) -> u64 {
        self.items_read
    }

    /// Read the next data item.
    ///
    /// Returns `Ok(None)` once the end-of-file field has been read, and on every
    /// call after that. A zero-length item is `Ok(Some(vec![]))`. Any error
    /// ends the session: later calls fail with [`Error::Poisoned`].
    pub fn next_item(&mut self) -> Result<Option<Vec<u8>>> {
        match self.phase {
            Phase::Streaming => {}
            Phase::Exhausted => return Ok(None),
            Phase::Failed => return Err(Error::Poisoned),
            Phase::Closed => return Err(Error::Closed),
        }

        match self.read_next() {
            Ok(item) => Ok(item),
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    offset = format_args!("{:#x}", self.offset),
                    error = %e,
                    "read failed"
                );
                self.phase = Phase::Failed;
                self.file = None;
                Err(e)
            }
        }
    }

    /// Read the next data item, with end of stream reported as an empty
    /// vector.
    ///
    /// This cannot tell a zero-length item from the end of the file; use
    /// [`next_item`](Self::next_item) or [`items`](Self::items) when that matters.
    pub fn read_item(&mut self) -> Result<Vec<u8>> {
        Ok(self.next_item()?.unwrap_or_default())
    }

    /// Iterate over the remaining data items.
    pub fn items(&mut self) -> Items<'_> {
        Items {
            reader: self,
            done: false,
        }
    }

    /// Release the underlying file. Calling this more than once is harmless.
    ///
    /// After closing, [`next_item`](Self::next_item) and
    /// [`read_item`](Self::read_item) fail with [`Error::Closed`], whether or
    /// not the end of the file had been reached.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!(path = %self.path.display(), items = self.items_read, "closed reader");
        }
        self.phase = Phase::Closed;
    }

    fn read_next(&mut self) -> Result<Option<Vec<u8>>> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;

        // A clean end of file here means the terminal field was never written.
        if file.fill_buf()?.is_empty() {
            return Err(FormatError::MissingEof.into());
        }

        let start = self.offset;
        let field = Field::deserialize_owned(file)?;
        self.offset = file.bytes_read();

        tracing::trace!(
            start = format_args!("{:#x}", start),
            end = format_args!("{:#x}", self.offset),
            tag = %field.tag,
            len = field.payload.len(),
            "read field"
        );

        match field.tag {
            Tag::Data => {
                self.items_read += 1;
                Ok(Some(field.payload))
            }
            Tag::Eof => {
                self.phase = Phase::Exhausted;
                self.file = None;
                tracing::debug!(path = %self.path.display(), items = self.items_read, "reached end of file");
                Ok(None)
            }
            found => Err(FormatError::UnexpectedTag {
                expected: "data or eof",
                found,
            }
            .into()),
        }
    }
}

/// Iterator over the data items of a [`MixedFieldsReader`].
///
/// Yields each payload in order and stops after the end-of-file field or the
/// first error.
#[derive(Debug)]
pub struct Items<'a> {
    reader: &'a mut MixedFieldsReader,
    done: bool,
}

impl Iterator for Items<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Items<'_> {}

impl<'a> IntoIterator for &'a mut MixedFieldsReader {
    type Item = Result<Vec<u8>>;
    type IntoIter = Items<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.items()
    }
}
