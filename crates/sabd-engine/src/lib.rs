//! Sabd Engine - Fixed-size chunk deduplication.
//!
//! Two engines link a file, a chunk store and a container:
//!
//! - [`Deduplicator`] splits a file into chunks, upserts each chunk into the
//!   store and writes a container holding one fixed-width id per chunk.
//! - [`Duplicator`] reads a container, resolves every id against the store
//!   and reassembles the file.
//!
//! Both write through a temporary file in the destination directory, so a
//! failed run never leaves partial output behind.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod dedup;
pub mod dup;
pub mod error;
pub mod paths;
pub mod verify;

pub use config::{EmptyInputPolicy, EngineConfig};
pub use dedup::{DedupReport, Deduplicator};
pub use dup::{DupReport, Duplicator};
pub use error::{EngineError, InputKind};
pub use verify::{compare_files, FileComparison};

use std::path::{Path, PathBuf};

use sabd_core::HashStrategy;

/// Deduplicates `input` into the store at `store`, creating it if needed.
///
/// Returns the path of the written container.
pub fn deduplicate(
    input: &Path,
    store: &Path,
    chunk_size: usize,
    hash: HashStrategy,
) -> Result<PathBuf, EngineError> {
    let config = EngineConfig::default()
        .with_chunk_size(chunk_size)
        .with_hash(hash);
    let report = Deduplicator::new(config)?.deduplicate(input, store)?;
    Ok(report.container)
}

/// Restores the file described by `container` from the store at `store`.
///
/// Returns the path of the restored file.
pub fn duplicate(container: &Path, store: &Path) -> Result<PathBuf, EngineError> {
    let report = Duplicator::new(EngineConfig::default())?.duplicate(container, store)?;
    Ok(report.restored)
}
