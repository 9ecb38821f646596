//! Sabd Chunk - Fixed-size chunking.
//!
//! Splits a byte stream into chunks of exactly `chunk_size` bytes at fixed
//! offsets. The final chunk, if short, is right-padded with zero bytes.
//! Empty input produces no chunks.
//!
//! # Boundaries
//!
//! Boundaries depend only on the offset, never on the content, so a chunk's
//! identity is determined by its position and bytes alone. Reads can be
//! grouped (`read_batch` chunks per underlying read) without changing the
//! boundaries.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod splitter;

pub use splitter::{chunk_count, split, ChunkSplitter, SplitError, SplitterParams};

/// Chunking parameters.
pub mod params {
    /// Default chunk size: 256 bytes
    pub const DEFAULT_CHUNK_SIZE: usize = 256;

    /// Default number of chunks read per I/O call
    pub const DEFAULT_READ_BATCH: usize = 1;

    /// Byte used to pad the final chunk
    pub const PAD_BYTE: u8 = 0x00;
}
