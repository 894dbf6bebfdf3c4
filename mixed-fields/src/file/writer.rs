use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{reader::read_preamble, Metadata, BUFFER_SIZE};
use crate::{
    counting::{CountingReader, CountingWriter},
    de::DeserializeOwned,
    error::{Error, FormatError, Result},
    ser::write_field,
    tag::Tag,
    Field,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing on disk yet; header and metadata are written with the first item.
    Fresh,
    Streaming,
    /// A write failed part-way; the file must not grow any further.
    Failed,
    Closed,
}

/// Field-level write state, independent of where the bytes end up.
#[derive(Debug)]
struct Session<W: Write> {
    out: Option<CountingWriter<W>>,
    meta: Metadata,
    phase: Phase,
    /// Stream position the session started at
    base: u64,
    /// Bytes accepted by the stream so far
    written: u64,
    items_written: u64,
}

fn emit<W: Write>(out: &mut CountingWriter<W>, base: u64, tag: Tag, payload: &[u8]) -> Result<()> {
    let start = base + out.bytes_written();
    write_field(out, tag, payload)?;
    tracing::trace!(
        start = format_args!("{:#x}", start),
        end = format_args!("{:#x}", base + out.bytes_written()),
        %tag,
        len = payload.len(),
        "wrote field"
    );
    Ok(())
}

impl<W: Write> Session<W> {
    fn new(out: W, meta: Metadata, phase: Phase, base: u64) -> Self {
        Session {
            out: Some(CountingWriter::new(out)),
            meta,
            phase,
            base,
            written: 0,
            items_written: 0,
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.phase {
            Phase::Fresh | Phase::Streaming => Ok(()),
            Phase::Failed => Err(Error::Poisoned),
            Phase::Closed => Err(Error::Closed),
        }
    }

    fn write_item(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let result = self.push(Some(payload));
        self.settle(result)
    }

    /// Write the end-of-file field (and the preamble, if nothing was written
    /// yet) and flush. Does nothing once closed.
    fn finish(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.ensure_writable()?;
        let result = self.push(None);
        let result = self.settle(result);
        if result.is_ok() {
            self.phase = Phase::Closed;
        }
        result
    }

    /// Write the preamble if needed, then a data field for `Some`, or the
    /// end-of-file field followed by a flush for `None`.
    fn push(&mut self, item: Option<&[u8]>) -> Result<()> {
        let Session {
            out,
            meta,
            phase,
            base,
            items_written,
            ..
        } = self;
        let out = out.as_mut().ok_or(Error::Closed)?;

        if *phase == Phase::Fresh {
            emit(out, *base, Tag::Header, &[])?;
            emit(out, *base, Tag::Metadata, meta.as_bytes())?;
            *phase = Phase::Streaming;
        }

        match item {
            Some(payload) => {
                emit(out, *base, Tag::Data, payload)?;
                *items_written += 1;
            }
            None => {
                emit(out, *base, Tag::Eof, &[])?;
                out.flush()?;
            }
        }
        Ok(())
    }

    fn settle(&mut self, result: Result<()>) -> Result<()> {
        if let Some(out) = &self.out {
            self.written = out.bytes_written();
        }
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    fn release(&mut self) -> Option<W> {
        self.out.take().map(CountingWriter::into_inner)
    }
}

/// Append-only writer for MixedFields files.
///
/// The end-of-file field is written by [`close`](Self::close), or on drop if
/// the writer was never closed explicitly. If any write fails, the file is
/// released and left as the operating system has it: later writes fail with
/// [`Error::Poisoned`] and no end-of-file field is appended.
#[derive(Debug)]
pub struct MixedFieldsWriter {
    session: Session<BufWriter<File>>,
    path: PathBuf,
}

impl Drop for MixedFieldsWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "MixedFieldsWriter dropped and could not be closed. File may be incomplete."
            );
        }
    }
}

/// Validate an existing file and find where appending resumes.
///
/// A terminal end-of-file field must be the last thing in the file; its offset
/// is returned so it can be cut off and written again on close.
fn scan_existing<R: BufRead>(
    reader: &mut CountingReader<R>,
    len: u64,
) -> Result<(Metadata, Option<u64>)> {
    let meta = read_preamble(reader)?;

    while !reader.fill_buf()?.is_empty() {
        let start = reader.bytes_read();
        let field = Field::deserialize_owned(reader)?;
        match field.tag {
            Tag::Data => {}
            Tag::Eof => {
                let end = reader.bytes_read();
                if end != len {
                    return Err(FormatError::TrailingBytes(len - end).into());
                }
                return Ok((meta, Some(start)));
            }
            found => {
                return Err(FormatError::UnexpectedTag {
                    expected: "data or eof",
                    found,
                }
                .into())
            }
        }
    }

    Ok((meta, None))
}

impl MixedFieldsWriter {
    /// Open a file for appending items, creating it if it does not exist.
    ///
    /// A non-empty file must already be a valid MixedFields file; new items are
    /// appended after its existing items.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MixedFieldsWriter> {
        Self::open_inner(path, Metadata::default())
    }

    /// Like [`open`](Self::open), but a new file gets `metadata` as its metadata
    /// payload instead of the default reserved block. Existing files keep the
    /// metadata they already have.
    pub fn open_with_metadata<P: AsRef<Path>>(
        path: P,
        metadata: Vec<u8>,
    ) -> Result<MixedFieldsWriter> {
        Self::open_inner(path, Metadata::new(metadata))
    }

    fn open_inner<P: AsRef<Path>>(path: P, meta: Metadata) -> Result<MixedFieldsWriter> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let (phase, meta, offset) = if len == 0 {
            (Phase::Fresh, meta, 0)
        } else {
            file.seek(SeekFrom::Start(0))?;
            let (existing, eof_at) = {
                let mut reader =
                    CountingReader::new(BufReader::with_capacity(BUFFER_SIZE, &mut file));
                scan_existing(&mut reader, len)?
            };
            let offset = match eof_at {
                Some(eof_at) => {
                    tracing::debug!(
                        path = %path.display(),
                        offset = format_args!("{:#x}", eof_at),
                        "removing end-of-file field to resume appending"
                    );
                    file.set_len(eof_at)?;
                    eof_at
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        "file has no end-of-file field, resuming an unfinished session"
                    );
                    len
                }
            };
            (Phase::Streaming, existing, offset)
        };
        file.seek(SeekFrom::Start(offset))?;

        tracing::debug!(
            path = %path.display(),
            ?phase,
            offset = format_args!("{:#x}", offset),
            "opened MixedFields file for writing"
        );

        Ok(MixedFieldsWriter {
            session: Session::new(
                BufWriter::with_capacity(BUFFER_SIZE, file),
                meta,
                phase,
                offset,
            ),
            path,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The metadata payload this file has, or will have once the first item is
    /// written.
    #[inline(always)]
    pub fn metadata(&self) -> &Metadata {
        &self.session.meta
    }

    /// Bytes appended to the file by this writer, including framing.
    #[inline(always)]
    pub fn bytes_written(&self) -> u64 {
        self.session.written
    }

    #[inline(always)]
    pub fn items_written(&self) -> u64 {
        self.session.items_written
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.session.phase == Phase::Closed
    }

    /// Append one item as a data field.
    ///
    /// The first item written to a new file is preceded by the header and
    /// metadata fields.
    pub fn write_item(&mut self, payload: &[u8]) -> Result<()> {
        let result = self.session.write_item(payload);
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Push buffered fields to the operating system.
    pub fn flush(&mut self) -> Result<()> {
        self.session.ensure_writable()?;
        match self.session.out.as_mut() {
            Some(out) => Ok(out.flush()?),
            None => Err(Error::Closed),
        }
    }

    /// Write the end-of-file field, flush and release the file.
    ///
    /// A writer that never wrote an item still produces a valid, empty file.
    /// Calling this again after a successful close does nothing. After a
    /// failed write this returns [`Error::Poisoned`] and writes nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.session.phase == Phase::Closed {
            return Ok(());
        }

        let result = self.session.finish();
        // Dropped on every path below, which releases the handle.
        let file = self.session.release();
        if let Err(e) = &result {
            if file.is_some() {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "close failed, releasing file"
                );
            }
            return result;
        }
        if let Some(file) = file {
            file.get_ref().sync_all()?;
        }

        tracing::debug!(
            path = %self.path.display(),
            items = self.session.items_written,
            bytes = self.session.written,
            "closed writer"
        );
        Ok(())
    }

    fn fail(&mut self, error: &Error) {
        if self.session.release().is_some() {
            tracing::debug!(
                path = %self.path.display(),
                error = %error,
                "write failed, releasing file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    /// Accepts a fixed number of `write` calls, then fails every later one.
    struct FailAfter {
        writes_left: usize,
        data: Vec<u8>,
    }

    impl FailAfter {
        fn new(writes_left: usize) -> Self {
            FailAfter {
                writes_left,
                data: vec![],
            }
        }
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.writes_left == 0 {
                return Err(std::io::Error::new(ErrorKind::Other, "no space left"));
            }
            self.writes_left -= 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(writes_left: usize) -> Session<FailAfter> {
        Session::new(
            FailAfter::new(writes_left),
            Metadata::default(),
            Phase::Fresh,
            0,
        )
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn writes_one_field_per_call() {
        let mut s = session(usize::MAX);
        s.write_item(b"Spam").unwrap();
        s.finish().unwrap();
        assert_eq!(s.items_written, 1);
        let data = s.release().unwrap().data;
        assert_eq!(s.written, data.len() as u64);
        assert_eq!(count(&data, b"Mixd"), 1);
        assert_eq!(count(&data, b"xEOF"), 1);
    }

    #[test]
    fn failed_metadata_never_repeats_header() {
        // Header goes through, metadata fails
        let mut s = session(1);
        assert!(s.write_item(b"Spam").unwrap_err().is_io());
        assert!(matches!(s.write_item(b"Spam"), Err(Error::Poisoned)));
        assert!(matches!(s.finish(), Err(Error::Poisoned)));

        let data = s.release().unwrap().data;
        assert_eq!(count(&data, b"Mixd"), 1);
        assert_eq!(data.len(), 6);
        assert_eq!(s.written, 6);
    }

    #[test]
    fn failed_data_stops_the_session() {
        // Header, metadata and the first item go through
        let mut s = session(3);
        s.write_item(b"first").unwrap();
        assert!(s.write_item(b"second").unwrap_err().is_io());
        assert!(matches!(s.write_item(b"third"), Err(Error::Poisoned)));
        assert!(matches!(s.finish(), Err(Error::Poisoned)));
        assert_eq!(s.items_written, 1);

        let data = s.release().unwrap().data;
        assert_eq!(count(&data, b"sDAT"), 1);
        assert_eq!(count(&data, b"xEOF"), 0);
    }

    #[test]
    fn failed_eof_is_not_retried() {
        let mut s = session(3);
        s.write_item(b"only").unwrap();
        assert!(s.finish().unwrap_err().is_io());
        assert!(matches!(s.finish(), Err(Error::Poisoned)));

        let data = s.release().unwrap().data;
        assert_eq!(count(&data, b"xEOF"), 0);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut s = session(usize::MAX);
        s.finish().unwrap();
        s.finish().unwrap();
        assert!(matches!(s.write_item(b"late"), Err(Error::Closed)));

        let data = s.release().unwrap().data;
        assert_eq!(count(&data, b"Mixd"), 1);
        assert_eq!(count(&data, b"xEOF"), 1);
    }
}
