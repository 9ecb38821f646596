//! Storage configuration.

use std::path::PathBuf;

use sabd_core::{HashStrategy, DEFAULT_CHUNK_SIZE};

use crate::StoreError;

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store directory
    pub path: PathBuf,
    /// Size of every stored chunk in bytes
    pub chunk_size: usize,
    /// Digest used as the primary key
    pub hash: HashStrategy,
    /// Sync every write to disk
    pub sync_writes: bool,
    /// Create the store if it does not exist
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".sabd/store"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash: HashStrategy::default(),
            sync_writes: false,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

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

    /// Enables or disables synchronous writes.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Checks the configuration for values the store cannot use.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.chunk_size == 0 {
            return Err(StoreError::InvalidConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("store path is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new("/tmp/sabd")
            .with_chunk_size(64)
            .with_hash(HashStrategy::Md5)
            .with_sync_writes(true);
        assert_eq!(config.path, PathBuf::from("/tmp/sabd"));
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.hash, HashStrategy::Md5);
        assert!(config.sync_writes);
        assert!(config.create_if_missing);
    }

    #[test]
    fn test_config_validate() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::default().with_chunk_size(0).validate().is_err());
        assert!(StoreConfig::new("").validate().is_err());
    }
}
