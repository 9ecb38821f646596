//! Hash strategies used to address chunks in the store.
//!
//! Supported digests:
//! - Identity (the payload is its own key)
//! - MD5, SHA-1 (fast, not collision resistant)
//! - SHA-256, SHA-512 (RustCrypto `sha2`)
//! - BLAKE3 (256-bit default mode)

mod blake3_hash;
mod strategy;

pub use blake3_hash::blake3_hash;
pub use strategy::{HashStrategy, UnknownHashStrategy};

/// Output size of MD5 in bytes.
pub const MD5_LEN: usize = 16;

/// Output size of SHA-1 in bytes.
pub const SHA1_LEN: usize = 20;

/// Output size of SHA-256 and BLAKE3 in bytes.
pub const SHA256_LEN: usize = 32;

/// Output size of SHA-512 in bytes.
pub const SHA512_LEN: usize = 64;
