//! Closed set of digest functions addressing chunks in the store.
//!
//! The strategy is resolved once, when a store is created, and persisted
//! alongside it as a one-byte tag. Every chunk of that store is keyed by the
//! same function, so two stores only share a hash space if their strategies
//! match.
//!
//! # Collisions
//!
//! Collisions are not detected at runtime. Two distinct payloads that map to
//! the same digest resolve to the same record, and every reference to that
//! digest restores the first payload stored. `Identity` cannot collide,
//! `Md5` and `Sha1` are not collision resistant against crafted input, and
//! `Sha256`, `Sha512` and `Blake3` make accidental collisions negligible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use thiserror::Error;

use super::{blake3_hash, MD5_LEN, SHA1_LEN, SHA256_LEN, SHA512_LEN};
use crate::identifiers::Digest;

/// Error returned when a hash strategy name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown hash strategy '{0}' (expected one of: none, md5, sha1, sha256, sha512, blake3)")]
pub struct UnknownHashStrategy(pub String);

/// Digest function used as the store's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStrategy {
    /// The payload is its own digest.
    #[serde(rename = "none", alias = "identity")]
    Identity,
    /// MD5, 128-bit.
    Md5,
    /// SHA-1, 160-bit.
    Sha1,
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
    /// BLAKE3, 256-bit default mode.
    Blake3,
}

impl HashStrategy {
    /// All supported strategies, in tag order.
    pub const ALL: [HashStrategy; 6] = [
        HashStrategy::Identity,
        HashStrategy::Md5,
        HashStrategy::Sha1,
        HashStrategy::Sha256,
        HashStrategy::Sha512,
        HashStrategy::Blake3,
    ];

    /// Computes the digest of `data`.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let bytes = match self {
            HashStrategy::Identity => data.to_vec(),
            HashStrategy::Md5 => md5::Md5::digest(data).to_vec(),
            HashStrategy::Sha1 => sha1::Sha1::digest(data).to_vec(),
            HashStrategy::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashStrategy::Sha512 => sha2::Sha512::digest(data).to_vec(),
            HashStrategy::Blake3 => blake3_hash(data).to_vec(),
        };
        Digest::new(bytes)
    }

    /// Returns the digest length produced for chunks of `chunk_size` bytes.
    pub fn digest_len(&self, chunk_size: usize) -> usize {
        match self {
            HashStrategy::Identity => chunk_size,
            HashStrategy::Md5 => MD5_LEN,
            HashStrategy::Sha1 => SHA1_LEN,
            HashStrategy::Sha256 | HashStrategy::Blake3 => SHA256_LEN,
            HashStrategy::Sha512 => SHA512_LEN,
        }
    }

    /// Stable one-byte tag persisted in store metadata.
    pub const fn tag(&self) -> u8 {
        match self {
            HashStrategy::Identity => 0,
            HashStrategy::Md5 => 1,
            HashStrategy::Sha1 => 2,
            HashStrategy::Sha256 => 3,
            HashStrategy::Sha512 => 4,
            HashStrategy::Blake3 => 5,
        }
    }

    /// Resolves a persisted tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Canonical lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            HashStrategy::Identity => "none",
            HashStrategy::Md5 => "md5",
            HashStrategy::Sha1 => "sha1",
            HashStrategy::Sha256 => "sha256",
            HashStrategy::Sha512 => "sha512",
            HashStrategy::Blake3 => "blake3",
        }
    }

    /// Returns true if crafted collisions are computationally feasible.
    pub const fn is_collision_prone(&self) -> bool {
        matches!(self, HashStrategy::Md5 | HashStrategy::Sha1)
    }
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashStrategy {
    type Err = UnknownHashStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "identity" => Ok(HashStrategy::Identity),
            "md5" => Ok(HashStrategy::Md5),
            "sha1" => Ok(HashStrategy::Sha1),
            "sha256" => Ok(HashStrategy::Sha256),
            "sha512" => Ok(HashStrategy::Sha512),
            "blake3" => Ok(HashStrategy::Blake3),
            _ => Err(UnknownHashStrategy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_empty_digests() {
        let cases = [
            (HashStrategy::Md5, "d41d8cd98f00b204e9800998ecf8427e"),
            (HashStrategy::Sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709"),
            (
                HashStrategy::Sha256,
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            (
                HashStrategy::Sha512,
                "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
                 47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e",
            ),
            (
                HashStrategy::Blake3,
                "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262",
            ),
        ];

        for (strategy, expected) in cases {
            assert_eq!(strategy.digest(&[]).to_hex(), expected, "{strategy}");
        }
    }

    #[test]
    fn test_identity_is_payload() {
        let payload = b"0123456789";
        let digest = HashStrategy::Identity.digest(payload);
        assert_eq!(digest.as_slice(), payload);
    }

    #[test]
    fn test_digest_len_matches_output() {
        for strategy in HashStrategy::ALL {
            let payload = vec![0x5A; 37];
            assert_eq!(strategy.digest(&payload).len(), strategy.digest_len(37));
        }
    }

    #[test]
    fn test_tags_roundtrip() {
        for strategy in HashStrategy::ALL {
            assert_eq!(HashStrategy::from_tag(strategy.tag()), Some(strategy));
        }
        assert_eq!(HashStrategy::from_tag(6), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("none".parse(), Ok(HashStrategy::Identity));
        assert_eq!("Identity".parse(), Ok(HashStrategy::Identity));
        assert_eq!("SHA256".parse(), Ok(HashStrategy::Sha256));
        assert_eq!(" md5 ".parse(), Ok(HashStrategy::Md5));
        for strategy in HashStrategy::ALL {
            assert_eq!(strategy.name().parse(), Ok(strategy));
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = "crc32".parse::<HashStrategy>().unwrap_err();
        assert_eq!(err, UnknownHashStrategy("crc32".to_string()));
    }

    #[test]
    fn test_distinct_payloads_distinct_digests() {
        let a = HashStrategy::Sha256.digest(b"chunk-a");
        let b = HashStrategy::Sha256.digest(b"chunk-b");
        assert_ne!(a, b);
    }
}
