//! Engine configuration.

use std::path::PathBuf;

use sabd_chunk::SplitterParams;
use sabd_core::{HashStrategy, DEFAULT_CHUNK_SIZE};
use sabd_store::cache::DEFAULT_CACHE_BYTES;
use sabd_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// What to do with an input that produces no chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyInputPolicy {
    /// Write a header-only container with an id width of 1
    #[default]
    WriteEmpty,
    /// Fail with `EngineError::EmptyInput`
    Reject,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chunk size in bytes
    pub chunk_size: usize,
    /// Digest keying the store
    pub hash: HashStrategy,
    /// Chunks or records fetched per underlying read
    pub read_batch: usize,
    /// Handling of inputs without chunks
    pub empty_input: EmptyInputPolicy,
    /// Payload cache budget used while restoring
    pub cache_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash: HashStrategy::default(),
            read_batch: 1,
            empty_input: EmptyInputPolicy::default(),
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

impl EngineConfig {
    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the hash strategy.
    pub fn with_hash(mut self, hash: HashStrategy) -> Self {
        self.hash = hash;
        self
    }

    /// Sets the read batch.
    pub fn with_read_batch(mut self, read_batch: usize) -> Self {
        self.read_batch = read_batch;
        self
    }

    /// Sets the empty input policy.
    pub fn with_empty_input(mut self, policy: EmptyInputPolicy) -> Self {
        self.empty_input = policy;
        self
    }

    /// Sets the restore cache budget.
    pub fn with_cache_bytes(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.splitter_params().map(|_| ())
    }

    /// Splitter parameters for this configuration.
    pub fn splitter_params(&self) -> Result<SplitterParams, EngineError> {
        SplitterParams::new(self.chunk_size, self.read_batch)
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))
    }

    /// Store configuration for a store at `path`.
    pub fn store_config(&self, path: impl Into<PathBuf>) -> StoreConfig {
        StoreConfig::new(path)
            .with_chunk_size(self.chunk_size)
            .with_hash(self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.hash, HashStrategy::Sha256);
        assert_eq!(config.empty_input, EmptyInputPolicy::WriteEmpty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(matches!(
            EngineConfig::default().with_chunk_size(0).validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            EngineConfig::default().with_read_batch(0).validate(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_store_config_carries_settings() {
        let config = EngineConfig::default()
            .with_chunk_size(64)
            .with_hash(HashStrategy::Sha1)
            .store_config("/tmp/store");
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.hash, HashStrategy::Sha1);
    }
}
