//! Streaming fixed-size chunk iterator.

use std::fs::File;
use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, trace};

use crate::params::{DEFAULT_CHUNK_SIZE, DEFAULT_READ_BATCH, PAD_BYTE};

/// Errors from splitter configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// Chunk size of zero
    #[error("Chunk size must be positive")]
    ZeroChunkSize,

    /// Read batch of zero
    #[error("Read batch must be positive")]
    ZeroReadBatch,

    /// Buffer size overflows usize
    #[error("Chunk size {chunk_size} x read batch {read_batch} overflows")]
    BufferOverflow {
        /// Requested chunk size
        chunk_size: usize,
        /// Requested read batch
        read_batch: usize,
    },
}

/// Parameters for the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterParams {
    /// Size of every emitted chunk in bytes
    pub chunk_size: NonZeroUsize,
    /// Logical chunks fetched per underlying read
    pub read_batch: NonZeroUsize,
}

impl SplitterParams {
    /// Creates validated parameters.
    pub fn new(chunk_size: usize, read_batch: usize) -> Result<Self, SplitError> {
        let chunk_size = NonZeroUsize::new(chunk_size).ok_or(SplitError::ZeroChunkSize)?;
        let read_batch = NonZeroUsize::new(read_batch).ok_or(SplitError::ZeroReadBatch)?;
        if chunk_size.get().checked_mul(read_batch.get()).is_none() {
            return Err(SplitError::BufferOverflow {
                chunk_size: chunk_size.get(),
                read_batch: read_batch.get(),
            });
        }
        Ok(Self {
            chunk_size,
            read_batch,
        })
    }

    /// Parameters with the given chunk size and one chunk per read.
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self, SplitError> {
        Self::new(chunk_size, DEFAULT_READ_BATCH)
    }

    /// Size of the read buffer in bytes.
    pub fn buffer_len(&self) -> usize {
        self.chunk_size.get() * self.read_batch.get()
    }
}

impl Default for SplitterParams {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::MIN.saturating_add(DEFAULT_CHUNK_SIZE - 1),
            read_batch: NonZeroUsize::MIN.saturating_add(DEFAULT_READ_BATCH - 1),
        }
    }
}

/// Pull-based splitter that owns its reader.
///
/// Yields `chunk_size`-byte buffers in input order. The reader is drained in
/// fills of `chunk_size * read_batch` bytes, looping over short reads, so the
/// emitted boundaries are independent of both the batch size and the
/// reader's own read granularity.
///
/// After an I/O error is yielded the iterator is exhausted.
pub struct ChunkSplitter<R> {
    reader: R,
    params: SplitterParams,
    buf: Vec<u8>,
    filled: usize,
    pos: usize,
    eof: bool,
    done: bool,
    bytes_read: u64,
    chunks_emitted: u64,
}

impl ChunkSplitter<File> {
    /// Opens `path` and splits its contents.
    ///
    /// Calling this again on the same path restarts from the beginning.
    pub fn open(path: &Path, params: SplitterParams) -> io::Result<Self> {
        let file = File::open(path)?;
        debug!(
            path = %path.display(),
            chunk_size = params.chunk_size.get(),
            read_batch = params.read_batch.get(),
            "Opened file for splitting"
        );
        Ok(Self::new(file, params))
    }
}

impl<R: Read> ChunkSplitter<R> {
    /// Creates a splitter over `reader`.
    pub fn new(reader: R, params: SplitterParams) -> Self {
        Self {
            reader,
            params,
            buf: vec![0u8; params.buffer_len()],
            filled: 0,
            pos: 0,
            eof: false,
            done: false,
            bytes_read: 0,
            chunks_emitted: 0,
        }
    }

    /// Returns the splitter parameters.
    pub fn params(&self) -> &SplitterParams {
        &self.params
    }

    /// Unpadded bytes consumed from the reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Chunks yielded so far.
    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
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

        self.bytes_read += self.filled as u64;
        trace!(filled = self.filled, eof = self.eof, "Filled read buffer");
        Ok(())
    }
}

impl<R: Read> Iterator for ChunkSplitter<R> {
    type Item = io::Result<Vec<u8>>;

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
                return Some(Err(e));
            }
            if self.filled == 0 {
                self.done = true;
                return None;
            }
        }

        let chunk_size = self.params.chunk_size.get();
        let end = (self.pos + chunk_size).min(self.filled);
        let mut chunk = self.buf[self.pos..end].to_vec();
        self.pos = end;

        // Only the last fill can end short of a chunk boundary
        if chunk.len() < chunk_size {
            chunk.resize(chunk_size, PAD_BYTE);
        }

        self.chunks_emitted += 1;
        Some(Ok(chunk))
    }
}

/// Splits an in-memory buffer into padded chunks.
pub fn split(data: &[u8], params: &SplitterParams) -> Vec<Vec<u8>> {
    let chunk_size = params.chunk_size.get();
    data.chunks(chunk_size)
        .map(|c| {
            let mut chunk = c.to_vec();
            chunk.resize(chunk_size, PAD_BYTE);
            chunk
        })
        .collect()
}

/// Number of chunks produced for `len` input bytes.
pub fn chunk_count(len: u64, chunk_size: NonZeroUsize) -> u64 {
    len.div_ceil(chunk_size.get() as u64)
}
