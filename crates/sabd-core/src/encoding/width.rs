//! Fixed-width big-endian id records.
//!
//! A container stores each chunk reference as an unsigned big-endian integer
//! occupying exactly `id_width` bytes, where `id_width` is the smallest
//! number of bytes able to represent the largest id of the run:
//!
//! ```text
//! id_width = max(1, ceil(bit_length(max_id) / 8))
//! ```
//!
//! The width is stored in a single header byte, so it is bounded by
//! [`MAX_ID_WIDTH`](crate::MAX_ID_WIDTH).

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::identifiers::ChunkId;
use crate::MAX_ID_WIDTH;

/// Errors from id-width computation and fixed-width id coding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WidthError {
    /// The required width does not fit the one-byte header field
    #[error("Id width {width} exceeds the maximum of {max} bytes", max = MAX_ID_WIDTH)]
    Overflow {
        /// Required width in bytes
        width: usize,
    },

    /// Width outside [1, 255]
    #[error("Invalid id width: {0}")]
    InvalidWidth(usize),

    /// The id needs more bytes than the record width provides
    #[error("Id {id} does not fit in {width} bytes")]
    IdTooWide {
        /// Offending id
        id: ChunkId,
        /// Record width in bytes
        width: u8,
    },

    /// A decoded record exceeds the 64-bit id range
    #[error("Record of {width} bytes encodes an id beyond 64 bits")]
    IdOutOfRange {
        /// Record width in bytes
        width: usize,
    },
}

/// Returns the record width needed for an id of `bits` significant bits.
///
/// Zero bits (id 0) still occupy one byte.
pub fn width_for_bits(bits: u32) -> Result<u8, WidthError> {
    let width = (bits as usize).div_ceil(8).max(1);
    if width > MAX_ID_WIDTH {
        return Err(WidthError::Overflow { width });
    }
    Ok(width as u8)
}

/// Returns the minimal record width able to hold `max_id`.
///
/// # Example
/// ```
/// use sabd_core::{id_width_for, ChunkId};
///
/// assert_eq!(id_width_for(ChunkId(255)).unwrap(), 1);
/// assert_eq!(id_width_for(ChunkId(256)).unwrap(), 2);
/// ```
pub fn id_width_for(max_id: ChunkId) -> Result<u8, WidthError> {
    width_for_bits(max_id.bit_length())
}

/// Appends `id` as exactly `width` big-endian bytes.
///
/// Widths above 8 are zero-extended on the left.
pub fn write_id(id: ChunkId, width: u8, buf: &mut BytesMut) -> Result<(), WidthError> {
    let width_usize = width as usize;
    if width_usize == 0 {
        return Err(WidthError::InvalidWidth(0));
    }
    if width_for_bits(id.bit_length())? > width {
        return Err(WidthError::IdTooWide { id, width });
    }

    let be = id.get().to_be_bytes();
    if width_usize >= be.len() {
        buf.put_bytes(0, width_usize - be.len());
        buf.put_slice(&be);
    } else {
        buf.put_slice(&be[be.len() - width_usize..]);
    }
    Ok(())
}

/// Decodes one big-endian record of any width in [1, 255].
pub fn read_id(record: &[u8]) -> Result<ChunkId, WidthError> {
    let width = record.len();
    if width == 0 || width > MAX_ID_WIDTH {
        return Err(WidthError::InvalidWidth(width));
    }

    let split = width.saturating_sub(8);
    let (high, low) = record.split_at(split);
    if high.iter().any(|b| *b != 0) {
        return Err(WidthError::IdOutOfRange { width });
    }

    let value = low.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok(ChunkId(value))
}
