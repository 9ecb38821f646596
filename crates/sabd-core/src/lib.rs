//! Sabd Core - Core types and primitives for fixed-size chunk deduplication.
//!
//! This crate provides:
//! - Pluggable hash strategies used as content addresses for chunks
//! - Identifier types (`ChunkId`, `Digest`)
//! - Id-width arithmetic and the fixed-width big-endian id codec
//! - Canonical encoding for records persisted by the chunk store

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod encoding;
pub mod hash;
pub mod identifiers;

pub use encoding::width::{id_width_for, read_id, width_for_bits, write_id, WidthError};
pub use encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
pub use hash::{HashStrategy, UnknownHashStrategy};
pub use identifiers::*;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Largest id width the one-byte container header can express.
pub const MAX_ID_WIDTH: usize = 255;
