//! Identifier types.
//!
//! - `ChunkId` - dense integer assigned by the store to each distinct chunk
//! - `Digest` - output of a `HashStrategy`, the store's primary key

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};

/// Store-assigned chunk identifier.
///
/// Ids are assigned monotonically starting at [`ChunkId::FIRST`] and are
/// stable for the lifetime of the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ChunkId(pub u64);

impl ChunkId {
    /// First id handed out by an empty store.
    pub const FIRST: ChunkId = ChunkId(1);

    /// Creates an id from its integer value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the integer value.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// Number of significant bits (0 for id 0).
    pub const fn bit_length(&self) -> u32 {
        u64::BITS - self.0.leading_zeros()
    }

    /// Big-endian key used by the store's column families.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Parses a big-endian store key.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        let arr: [u8; 8] = key.try_into().ok()?;
        Some(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChunkId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ChunkId> for u64 {
    fn from(id: ChunkId) -> Self {
        id.0
    }
}

impl CanonicalEncode for ChunkId {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf);
    }
}

impl CanonicalDecode for ChunkId {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode(buf)?))
    }
}

/// Digest of a chunk payload.
///
/// Length depends on the strategy that produced it; the identity strategy
/// yields the payload itself.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Digest(Vec<u8>);

impl Digest {
    /// Wraps raw digest bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the digest bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the digest length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-length digest.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Creates from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }

    /// Consumes the digest, returning its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Digest({})", &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "{}", &hex[..hex.len().min(16)])
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl CanonicalEncode for Digest {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf);
    }
}

impl CanonicalDecode for Digest {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self(Vec::<u8>::decode(buf)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_bit_length() {
        assert_eq!(ChunkId(0).bit_length(), 0);
        assert_eq!(ChunkId(1).bit_length(), 1);
        assert_eq!(ChunkId(255).bit_length(), 8);
        assert_eq!(ChunkId(256).bit_length(), 9);
        assert_eq!(ChunkId(u64::MAX).bit_length(), 64);
    }

    #[test]
    fn test_chunk_id_key_order_matches_numeric_order() {
        let a = ChunkId(255).to_key();
        let b = ChunkId(256).to_key();
        assert!(a < b);
        assert_eq!(ChunkId::from_key(&b), Some(ChunkId(256)));
        assert_eq!(ChunkId::from_key(&[1, 2, 3]), None);
    }

    #[test]
    fn test_chunk_id_next_saturates() {
        assert_eq!(ChunkId(1).next(), Some(ChunkId(2)));
        assert_eq!(ChunkId(u64::MAX).next(), None);
    }

    #[test]
    fn test_digest_hex() {
        let digest = Digest::new(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(digest.to_hex(), "deadbeef");
        assert_eq!(Digest::from_hex("deadbeef").unwrap(), digest);
        assert_eq!(format!("{digest}"), "deadbeef");
    }

    #[test]
    fn test_digest_canonical_roundtrip() {
        let digest = Digest::new(vec![0xAA; 20]);
        let decoded = Digest::from_bytes(&digest.to_vec()).unwrap();
        assert_eq!(decoded, digest);
    }
}
