//! Scratch workspace for end-to-end runs.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sabd_engine::{
    DedupReport, Deduplicator, DupReport, Duplicator, EngineConfig, EngineError,
};
use sabd_store::{ChunkStore, StoreError};
use tempfile::TempDir;
use tracing::debug;

/// A temporary directory holding input files and one chunk store.
///
/// Everything is removed when the workspace is dropped.
pub struct TestWorkspace {
    dir: TempDir,
    store: PathBuf,
    /// Engine settings used by `dedup` and `dup`
    pub config: EngineConfig,
}

impl TestWorkspace {
    /// Creates a workspace with the given chunk size and default settings.
    pub fn new(chunk_size: usize) -> std::io::Result<Self> {
        Self::with_config(EngineConfig::default().with_chunk_size(chunk_size))
    }

    /// Creates a workspace using `config`.
    pub fn with_config(config: EngineConfig) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let store = dir.path().join("store");
        debug!(path = %dir.path().display(), "Created test workspace");
        Ok(Self { dir, store, config })
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the workspace's chunk store.
    pub fn store_path(&self) -> &Path {
        &self.store
    }

    /// Writes `data` to `name` inside the workspace.
    pub fn write_file(&self, name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Writes `len` pseudo-random bytes derived from `seed`.
    pub fn write_random(&self, name: &str, len: usize, seed: u64) -> std::io::Result<PathBuf> {
        self.write_file(name, &random_bytes(len, seed))
    }

    /// Deduplicates `input` into the workspace store.
    pub fn dedup(&self, input: &Path) -> Result<DedupReport, EngineError> {
        Deduplicator::new(self.config.clone())?.deduplicate(input, &self.store)
    }

    /// Restores `container` from the workspace store.
    pub fn dup(&self, container: &Path) -> Result<DupReport, EngineError> {
        Duplicator::new(self.config.clone())?.duplicate(container, &self.store)
    }

    /// Opens the workspace store with its persisted settings.
    pub fn open_store(&self) -> Result<ChunkStore, StoreError> {
        ChunkStore::open_existing(&self.store)
    }
}

/// Deterministic pseudo-random content.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// `data` zero-padded to the next multiple of `chunk_size`.
pub fn padded(data: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(data.len().div_ceil(chunk_size) * chunk_size, 0);
    out
}

/// Content made of `count` distinct blocks of `block_len` bytes.
///
/// Each block starts with its index in big-endian so blocks never collide.
pub fn distinct_blocks(count: usize, block_len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(count * block_len);
    for i in 0..count {
        let mut block = vec![0xC3u8; block_len];
        let tag = (i as u64).to_be_bytes();
        let n = tag.len().min(block_len);
        block[..n].copy_from_slice(&tag[tag.len() - n..]);
        data.extend_from_slice(&block);
    }
    data
}
