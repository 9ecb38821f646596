//! Duplication engine.

use std::fs::File;
use std::io::{BufReader, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sabd_core::ChunkId;
use sabd_proto::{ContainerHeader, RecordReader};
use sabd_store::{CacheStats, ChunkCache, ChunkStore, StoreError};
use tracing::{debug, info};

use crate::paths::{self, require_file, write_atomically};
use crate::{EngineConfig, EngineError, InputKind};

/// Summary of one duplication run.
#[derive(Debug, Clone, PartialEq)]
pub struct DupReport {
    /// Restored container
    pub container: PathBuf,
    /// Written file
    pub restored: PathBuf,
    /// Chunks written
    pub chunks: u64,
    /// Bytes written, including trailing padding
    pub bytes_written: u64,
    /// Width of each reference record
    pub id_width: u8,
    /// Payload cache usage
    pub cache: CacheStats,
    /// Wall time of the run
    pub elapsed: Duration,
}

/// Reassembles files from containers and a chunk store.
#[derive(Debug, Clone)]
pub struct Duplicator {
    config: EngineConfig,
    read_batch: NonZeroUsize,
}

impl Duplicator {
    /// Creates an engine after validating `config`.
    ///
    /// Only `read_batch` and `cache_bytes` affect restoration; chunk size and
    /// hash strategy come from the store.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let read_batch = NonZeroUsize::new(config.read_batch).ok_or_else(|| {
            EngineError::InvalidConfiguration("read batch must be positive".to_string())
        })?;
        Ok(Self { config, read_batch })
    }

    /// Restores `container` from the existing store at `store_path`.
    pub fn duplicate(&self, container: &Path, store_path: &Path) -> Result<DupReport, EngineError> {
        require_file(container, InputKind::Container)?;

        let store = ChunkStore::open_existing(store_path).map_err(|e| match e {
            StoreError::NotFound(path) => EngineError::MissingInput {
                path,
                kind: InputKind::Store,
            },
            other => other.into(),
        })?;
        let report = self.duplicate_from(container, &store)?;
        store.close()?;
        Ok(report)
    }

    /// Restores `container` from an already open store.
    ///
    /// Fails on the first id missing from the store, leaving no output.
    pub fn duplicate_from(
        &self,
        container: &Path,
        store: &ChunkStore,
    ) -> Result<DupReport, EngineError> {
        require_file(container, InputKind::Container)?;

        let start = Instant::now();
        // read_batch may be 1, so the file itself is buffered.
        let mut file = BufReader::new(File::open(container).map_err(EngineError::io(container))?);
        let header = ContainerHeader::read_from(&mut file)?;
        let restored = paths::restored_path(container, &header.extension);
        debug!(
            container = %container.display(),
            id_width = header.id_width,
            extension = %header.extension,
            "Read container header"
        );

        let cache = ChunkCache::new(self.config.cache_bytes);
        let records = RecordReader::new(file, header.id_width, self.read_batch)?;
        let mut chunks = 0u64;
        let mut bytes_written = 0u64;

        write_atomically(&restored, |out| {
            for id in records {
                let payload = self.resolve(id?, store, &cache, container)?;
                out.write_all(&payload).map_err(EngineError::io(&restored))?;
                chunks += 1;
                bytes_written += payload.len() as u64;
            }
            Ok(())
        })?;

        let report = DupReport {
            container: container.to_path_buf(),
            restored,
            chunks,
            bytes_written,
            id_width: header.id_width,
            cache: cache.stats(),
            elapsed: start.elapsed(),
        };

        info!(
            container = %report.container.display(),
            restored = %report.restored.display(),
            chunks = report.chunks,
            bytes = report.bytes_written,
            cache_hits = report.cache.hits,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Restored file"
        );
        Ok(report)
    }

    fn resolve(
        &self,
        id: ChunkId,
        store: &ChunkStore,
        cache: &ChunkCache,
        container: &Path,
    ) -> Result<Vec<u8>, EngineError> {
        if let Some(payload) = cache.get(id) {
            return Ok(payload);
        }

        let payload = store.get(id).map_err(|e| match e {
            StoreError::ChunkNotFound(id) => EngineError::ChunkNotFound {
                id,
                container: container.to_path_buf(),
            },
            other => other.into(),
        })?;
        cache.put(id, payload.clone());
        Ok(payload)
    }
}
