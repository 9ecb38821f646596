//! Deduplication engine.
//!
//! The container header carries the id width, which depends on the largest
//! id of the run, so every id is buffered until the input is exhausted and
//! the container is written in one pass afterwards.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sabd_chunk::{ChunkSplitter, SplitterParams};
use sabd_core::{id_width_for, ChunkId, WidthError};
use sabd_proto::{ContainerHeader, RecordWriter};
use sabd_store::ChunkStore;
use tracing::{debug, info, warn};

use crate::paths::{self, require_file, write_atomically};
use crate::{EmptyInputPolicy, EngineConfig, EngineError, InputKind};

/// Summary of one deduplication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupReport {
    /// Deduplicated file
    pub input: PathBuf,
    /// Written container
    pub container: PathBuf,
    /// Unpadded bytes read from the input
    pub input_bytes: u64,
    /// Chunks produced, including repeats
    pub chunks: u64,
    /// Chunks added to the store by this run
    pub new_chunks: u64,
    /// Chunks already present in the store
    pub reused_chunks: u64,
    /// Width of each reference record
    pub id_width: u8,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl DedupReport {
    /// Size of the written container in bytes.
    pub fn container_bytes(&self) -> u64 {
        sabd_proto::HEADER_LEN as u64 + self.chunks * u64::from(self.id_width)
    }
}

/// Splits files into chunks and writes containers referencing them.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: EngineConfig,
    params: SplitterParams,
}

impl Deduplicator {
    /// Creates an engine after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let params = config.splitter_params()?;
        Ok(Self { config, params })
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Deduplicates `input` into the store at `store_path`.
    ///
    /// The store is created with this engine's chunk size and hash strategy
    /// if it does not exist, and must match them otherwise.
    pub fn deduplicate(&self, input: &Path, store_path: &Path) -> Result<DedupReport, EngineError> {
        require_file(input, InputKind::File)?;

        let store = ChunkStore::open(&self.config.store_config(store_path))?;
        let report = self.deduplicate_into(input, &store)?;
        store.close()?;
        Ok(report)
    }

    /// Deduplicates `input` into an already open store.
    pub fn deduplicate_into(
        &self,
        input: &Path,
        store: &ChunkStore,
    ) -> Result<DedupReport, EngineError> {
        if store.chunk_size() != self.config.chunk_size || store.hash() != self.config.hash {
            return Err(EngineError::InvalidConfiguration(format!(
                "store uses {} byte chunks with {}, engine uses {} byte chunks with {}",
                store.chunk_size(),
                store.hash(),
                self.config.chunk_size,
                self.config.hash
            )));
        }
        require_file(input, InputKind::File)?;

        let container = paths::container_path(input);
        if container == input {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} would be overwritten by its own container",
                input.display()
            )));
        }

        let start = Instant::now();
        let mut splitter = ChunkSplitter::open(input, self.params).map_err(EngineError::io(input))?;

        let mut ids: Vec<ChunkId> = Vec::new();
        let mut new_chunks = 0u64;
        let mut reused_chunks = 0u64;
        for chunk in splitter.by_ref() {
            let chunk = chunk.map_err(EngineError::io(input))?;
            let upsert = store.upsert(&chunk)?;
            if upsert.inserted {
                new_chunks += 1;
            } else {
                reused_chunks += 1;
            }
            ids.push(upsert.id);
        }
        let input_bytes = splitter.bytes_read();

        let id_width = match ids.iter().max() {
            Some(max_id) => id_width_for(*max_id).map_err(|e| match e {
                WidthError::Overflow { width } => EngineError::StoreOverflow { width },
                other => EngineError::Format(other.into()),
            })?,
            None => match self.config.empty_input {
                EmptyInputPolicy::WriteEmpty => {
                    warn!(input = %input.display(), "Input is empty, writing header-only container");
                    1
                }
                EmptyInputPolicy::Reject => {
                    return Err(EngineError::EmptyInput {
                        path: input.to_path_buf(),
                    })
                }
            },
        };

        let header = ContainerHeader::new(id_width, &paths::original_extension(input));
        debug!(
            container = %container.display(),
            id_width,
            extension = %header.extension,
            records = ids.len(),
            "Writing container"
        );

        write_atomically(&container, |out| {
            header.write_to(out)?;
            let mut records = RecordWriter::new(&mut *out, id_width)?;
            records.write_all(&ids)?;
            records.finish()?;
            Ok(())
        })?;

        let report = DedupReport {
            input: input.to_path_buf(),
            container,
            input_bytes,
            chunks: ids.len() as u64,
            new_chunks,
            reused_chunks,
            id_width,
            elapsed: start.elapsed(),
        };

        info!(
            input = %report.input.display(),
            container = %report.container.display(),
            chunks = report.chunks,
            new = report.new_chunks,
            reused = report.reused_chunks,
            id_width = report.id_width,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Deduplicated file"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine(chunk_size: usize) -> Deduplicator {
        Deduplicator::new(EngineConfig::default().with_chunk_size(chunk_size)).unwrap()
    }

    #[test]
    fn test_23_byte_scenario() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data.txt");
        fs::write(&input, (1..=23u8).collect::<Vec<_>>()).unwrap();

        let report = engine(10).deduplicate(&input, &dir.path().join("store")).unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.new_chunks, 3);
        assert_eq!(report.input_bytes, 23);
        assert_eq!(report.id_width, 1);
        assert_eq!(report.container, dir.path().join("data.bin"));

        let bytes = fs::read(&report.container).unwrap();
        assert_eq!(bytes, b"\x01.txt   \x01\x02\x03".to_vec());
        assert_eq!(report.container_bytes(), bytes.len() as u64);
    }

    #[test]
    fn test_repeated_block_single_record() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("rep.dat");
        fs::write(&input, [0x5Au8; 50]).unwrap();

        let store_path = dir.path().join("store");
        let report = engine(10).deduplicate(&input, &store_path).unwrap();
        assert_eq!(report.new_chunks, 1);
        assert_eq!(report.reused_chunks, 4);

        let bytes = fs::read(&report.container).unwrap();
        assert_eq!(&bytes[8..], &[1, 1, 1, 1, 1]);

        let store = ChunkStore::open_existing(&store_path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.reuse_count(ChunkId(1)).unwrap(), 5);
    }

    #[test]
    fn test_empty_input_policies() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("empty.log");
        fs::write(&input, b"").unwrap();
        let store_path = dir.path().join("store");

        let report = engine(8).deduplicate(&input, &store_path).unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(fs::read(&report.container).unwrap(), b"\x01.log   ".to_vec());
        fs::remove_file(&report.container).unwrap();

        let rejecting = Deduplicator::new(
            EngineConfig::default()
                .with_chunk_size(8)
                .with_empty_input(EmptyInputPolicy::Reject),
        )
        .unwrap();
        let err = rejecting.deduplicate(&input, &store_path).unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput { .. }));
        assert!(!dir.path().join("empty.bin").exists());
    }

    #[test]
    fn test_missing_input_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("store");

        let err = engine(8)
            .deduplicate(&dir.path().join("nope.txt"), &store_path)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingInput {
                kind: InputKind::File,
                ..
            }
        ));
        assert!(!store_path.exists());
    }

    #[test]
    fn test_container_input_rejected() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("already.bin");
        fs::write(&input, b"0123456789").unwrap();

        let err = engine(4)
            .deduplicate(&input, &dir.path().join("store"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert_eq!(fs::read(&input).unwrap(), b"0123456789".to_vec());
    }

    #[test]
    fn test_store_settings_must_match() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.txt");
        fs::write(&input, b"abcdefgh").unwrap();

        let store = ChunkStore::open(&EngineConfig::default().store_config(dir.path().join("s")))
            .unwrap();
        let err = engine(4).deduplicate_into(&input, &store).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }
}
