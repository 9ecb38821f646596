//! Engine error taxonomy.

use std::fmt;
use std::path::PathBuf;

use sabd_core::ChunkId;
use sabd_proto::FormatError;
use sabd_store::StoreError;
use thiserror::Error;

/// What a missing path was expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// File to deduplicate
    File,
    /// Container to restore
    Container,
    /// Chunk store
    Store,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputKind::File => "input file",
            InputKind::Container => "container",
            InputKind::Store => "chunk store",
        })
    }
}

/// Errors from the deduplication and duplication engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unusable engine or store parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required path does not exist
    #[error("Missing {kind}: {path}")]
    MissingInput {
        /// Missing path
        path: PathBuf,
        /// Expected kind
        kind: InputKind,
    },

    /// A container references an id the store does not hold
    #[error("Chunk {id} referenced by {container} not found in store")]
    ChunkNotFound {
        /// Unresolved id
        id: ChunkId,
        /// Container being restored
        container: PathBuf,
    },

    /// The id width does not fit the one-byte header field
    #[error("Id width {width} exceeds the container header's range")]
    StoreOverflow {
        /// Required width
        width: usize,
    },

    /// Empty input rejected by policy
    #[error("Input is empty: {path}")]
    EmptyInput {
        /// Empty input
        path: PathBuf,
    },

    /// IO error on a specific path
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Container format error
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| EngineError::Io { path, source }
    }
}
