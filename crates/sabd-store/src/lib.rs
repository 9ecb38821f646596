//! Sabd Store - Content-addressed chunk storage.
//!
//! Provides persistent storage for:
//! - Chunk payloads, keyed by a store-assigned `ChunkId`
//! - The digest index used to deduplicate payloads on insert
//! - Per-chunk reuse counts
//! - An in-memory payload cache for reconstruction

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod cache;
pub mod chunk;
pub mod config;

pub use cache::{CacheStats, ChunkCache};
pub use chunk::{ChunkRecord, ChunkStore, RecordInfo, SessionStats, StoreStats, Upsert};
pub use config::StoreConfig;

use std::path::PathBuf;

use sabd_core::{ChunkId, DecodeError};
use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(String),

    /// Another process holds the store's lock; retrying later may succeed
    #[error("Store at {path} is locked by another process: {message}")]
    Locked {
        /// Store path
        path: PathBuf,
        /// Backend message
        message: String,
    },

    /// Store path does not exist
    #[error("Store not found at {0}")]
    NotFound(PathBuf),

    /// No record with the given id
    #[error("Chunk not found: {0}")]
    ChunkNotFound(ChunkId),

    /// Requested configuration differs from the persisted one
    #[error("Store {field} mismatch: store has {stored}, requested {requested}")]
    ConfigMismatch {
        /// Mismatched setting
        field: &'static str,
        /// Persisted value
        stored: String,
        /// Requested value
        requested: String,
    },

    /// Payload length differs from the store's chunk size
    #[error("Invalid chunk size: expected {expected} bytes, got {actual}")]
    InvalidChunkSize {
        /// Store chunk size
        expected: usize,
        /// Payload length
        actual: usize,
    },

    /// Invalid configuration value
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// No ids left to assign
    #[error("Chunk id space exhausted")]
    IdSpaceExhausted,

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] DecodeError),

    /// Missing or malformed persisted data
    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Maps a RocksDB error, recognising lock contention.
    pub(crate) fn from_db(path: &std::path::Path, err: rocksdb::Error) -> Self {
        Self::from_db_message(path, err.into_string())
    }

    fn from_db_message(path: &std::path::Path, message: String) -> Self {
        // RocksDB reports a held LOCK file as "IO error: While lock file: <dir>/LOCK: ..."
        if message.contains("While lock file") || message.contains("/LOCK:") {
            StoreError::Locked {
                path: path.to_path_buf(),
                message,
            }
        } else {
            StoreError::Database(message)
        }
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_lock_file_failure_is_retryable() {
        let err = StoreError::from_db_message(
            Path::new("/tmp/store"),
            "IO error: While lock file: /tmp/store/LOCK: Resource temporarily unavailable"
                .to_string(),
        );
        assert!(matches!(err, StoreError::Locked { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_block_corruption_is_not_retryable() {
        let err = StoreError::from_db_message(
            Path::new("/tmp/store"),
            "Corruption: block checksum mismatch: stored = 1, computed = 2 in /tmp/store/000012.sst offset 0 size 4096"
                .to_string(),
        );
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_retryable());
    }
}
