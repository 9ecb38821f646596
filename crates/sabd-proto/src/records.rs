//! Fixed-width reference stream.

use std::io::{self, Read, Write};
use std::num::NonZeroUsize;

use bytes::BytesMut;
use sabd_core::{read_id, write_id, ChunkId};
use tracing::trace;

use crate::FormatError;

/// Records buffered before the writer flushes.
const WRITE_BATCH: usize = 4096;

/// Writes ids as big-endian records of a fixed width.
pub struct RecordWriter<W: Write> {
    writer: W,
    id_width: u8,
    buf: BytesMut,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Creates a writer emitting `id_width`-byte records.
    pub fn new(writer: W, id_width: u8) -> Result<Self, FormatError> {
        if id_width == 0 {
            return Err(FormatError::ZeroWidth);
        }
        Ok(Self {
            writer,
            id_width,
            buf: BytesMut::with_capacity(id_width as usize * WRITE_BATCH),
            written: 0,
        })
    }

    /// Appends one record.
    pub fn write(&mut self, id: ChunkId) -> Result<(), FormatError> {
        write_id(id, self.id_width, &mut self.buf)?;
        self.written += 1;
        if self.buf.len() >= self.id_width as usize * WRITE_BATCH {
            self.flush_buf()?;
        }
        Ok(())
    }

    /// Appends every id in order.
    pub fn write_all<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a ChunkId>,
    ) -> Result<(), FormatError> {
        for id in ids {
            self.write(*id)?;
        }
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.written
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.writer.write_all(&self.buf)?;
        trace!(bytes = self.buf.len(), "Flushed record batch");
        self.buf.clear();
        Ok(())
    }

    /// Flushes buffered records and returns the inner writer.
    pub fn finish(mut self) -> Result<W, FormatError> {
        self.flush_buf()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads big-endian records of a fixed width, in stream order.
///
/// Each underlying read requests `id_width * read_batch` bytes; short reads
/// are retried so batching never changes the decoded sequence. A stream
/// ending inside a record yields `TruncatedRecord` and ends the iteration.
pub struct RecordReader<R: Read> {
    reader: R,
    id_width: u8,
    buf: Vec<u8>,
    filled: usize,
    pos: usize,
    eof: bool,
    done: bool,
    index: u64,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader for `id_width`-byte records.
    pub fn new(reader: R, id_width: u8, read_batch: NonZeroUsize) -> Result<Self, FormatError> {
        if id_width == 0 {
            return Err(FormatError::ZeroWidth);
        }
        Ok(Self {
            reader,
            id_width,
            buf: vec![0u8; id_width as usize * read_batch.get()],
            filled: 0,
            pos: 0,
            eof: false,
            done: false,
            index: 0,
        })
    }

    /// Record width in bytes.
    pub fn id_width(&self) -> u8 {
        self.id_width
    }

    /// Records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.index
    }

    fn fill(&mut self) -> io::Result<()> {
        self.pos = 0;
        self.filled = 0;

        while self.filled < self.buf.len() {
            match self.reader.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<ChunkId, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.pos >= self.filled {
            if self.eof {
                self.done = true;
                return None;
            }
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e.into()));
            }
            if self.filled == 0 {
                self.done = true;
                return None;
            }
        }

        let width = self.id_width as usize;
        let available = self.filled - self.pos;
        if available < width {
            self.done = true;
            return Some(Err(FormatError::TruncatedRecord {
                index: self.index,
                width: self.id_width,
                available,
            }));
        }

        let record = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        self.index += 1;
        Some(read_id(record).map_err(FormatError::from))
    }
}
