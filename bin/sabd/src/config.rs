//! CLI configuration file.
//!
//! ```toml
//! [dedup]
//! chunk_size = 256
//! hash = "sha256"
//! read_batch = 1
//! empty_input = "write_empty"
//!
//! [store]
//! path = "~/.sabd/store"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sabd_core::{HashStrategy, DEFAULT_CHUNK_SIZE};
use sabd_engine::{EmptyInputPolicy, EngineConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Deduplication defaults
    pub dedup: DedupSection,
    /// Store location
    pub store: StoreSection,
}

/// `[dedup]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupSection {
    /// Chunk size in bytes
    pub chunk_size: usize,
    /// Hash strategy name
    pub hash: HashStrategy,
    /// Chunks or records per read
    pub read_batch: usize,
    /// Handling of empty inputs
    pub empty_input: EmptyInputPolicy,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash: HashStrategy::default(),
            read_batch: 1,
            empty_input: EmptyInputPolicy::default(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Store directory
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.sabd/store"),
        }
    }
}

impl CliConfig {
    /// Engine settings from the `[dedup]` section.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_chunk_size(self.dedup.chunk_size)
            .with_hash(self.dedup.hash)
            .with_read_batch(self.dedup.read_batch)
            .with_empty_input(self.dedup.empty_input)
    }

    /// Store path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        expand_tilde(&self.store.path)
    }
}

/// Loads the config file, falling back to defaults if it does not exist.
pub fn load_config(path: &Path) -> Result<CliConfig> {
    let path = expand_tilde(path);

    if !path.exists() {
        info!("No config file found at {:?}, using defaults", path);
        return Ok(CliConfig::default());
    }

    let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file {path:?}"))
}

/// Default config file contents written by `sabd init`.
pub fn default_config_toml() -> Result<String> {
    let body = toml::to_string_pretty(&CliConfig::default())
        .context("Failed to serialize default config")?;
    Ok(format!("# sabd configuration\n\n{body}"))
}

/// Expands a leading `~/` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
