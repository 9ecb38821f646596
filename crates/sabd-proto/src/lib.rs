//! Sabd Protocol - Container format for deduplicated files.
//!
//! A container replaces the original file after deduplication:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬──────────────────────────────┐
//! │ id_width (1) │  extension (7, pad)  │  N x id_width big-endian ids │
//! └──────────────┴──────────────────────┴──────────────────────────────┘
//! ```
//!
//! This crate defines:
//! - The fixed 8-byte header (`ContainerHeader`)
//! - Writers and readers for the fixed-width reference stream

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod container;
pub mod records;

pub use container::{ContainerHeader, EXTENSION_LEN, HEADER_LEN, PAD_CHAR};
pub use records::{RecordReader, RecordWriter};

use sabd_core::WidthError;
use thiserror::Error;

/// Errors from container encoding and decoding.
#[derive(Debug, Error)]
pub enum FormatError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header shorter than `HEADER_LEN`
    #[error("Truncated header: expected {expected} bytes, got {available}")]
    TruncatedHeader {
        /// Header length
        expected: usize,
        /// Bytes present
        available: usize,
    },

    /// Header declares a zero id width
    #[error("Invalid id width 0 in container header")]
    ZeroWidth,

    /// Extension field is not UTF-8
    #[error("Extension field is not valid UTF-8")]
    InvalidExtension,

    /// Reference stream ends inside a record
    #[error("Truncated record {index}: expected {width} bytes, got {available}")]
    TruncatedRecord {
        /// Zero-based index of the partial record
        index: u64,
        /// Record width
        width: u8,
        /// Bytes present
        available: usize,
    },

    /// Id coding error
    #[error("Id encoding error: {0}")]
    Width(#[from] WidthError),
}
