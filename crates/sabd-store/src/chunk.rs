//! Chunk storage implementation.
//!
//! Stores fixed-size chunk payloads keyed by a dense, store-assigned
//! `ChunkId`, with a digest index guaranteeing one record per distinct
//! payload.
//!
//! # Layout
//!
//! | Column family | Key | Value |
//! |---|---|---|
//! | `digests` | digest bytes | id (u64 big-endian) |
//! | `records` | id (u64 big-endian) | `RecordHeader` (canonical) |
//! | `payloads` | id (u64 big-endian) | payload bytes |
//! | `meta` | setting name | canonical value |

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamily, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use sabd_core::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
use sabd_core::{ChunkId, Digest, HashStrategy};
use tracing::{debug, info, trace};

use crate::config::StoreConfig;
use crate::StoreError;

/// Column family for the digest index.
const DIGESTS_CF: &str = "digests";
/// Column family for per-chunk headers.
const RECORDS_CF: &str = "records";
/// Column family for payloads.
const PAYLOADS_CF: &str = "payloads";
/// Column family for store settings.
const META_CF: &str = "meta";

const META_FORMAT_VERSION: &[u8] = b"format_version";
const META_CHUNK_SIZE: &[u8] = b"chunk_size";
const META_HASH: &[u8] = b"hash";
const META_NEXT_ID: &[u8] = b"next_id";

/// On-disk layout version.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Per-chunk header stored under the chunk's id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordHeader {
    digest: Digest,
    reuse_count: u64,
}

impl CanonicalEncode for RecordHeader {
    fn encode(&self, buf: &mut BytesMut) {
        self.digest.encode(buf);
        self.reuse_count.encode(buf);
    }
}

impl CanonicalDecode for RecordHeader {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            digest: Digest::decode(buf)?,
            reuse_count: u64::decode(buf)?,
        })
    }
}

/// Settings persisted in the `meta` column family.
#[derive(Debug, Clone, Copy)]
struct StoreMeta {
    chunk_size: usize,
    hash: HashStrategy,
    next_id: ChunkId,
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upsert {
    /// Id of the record holding the payload
    pub id: ChunkId,
    /// True if the record was created by this call
    pub inserted: bool,
    /// Reuse count after this call
    pub reuse_count: u64,
}

/// A complete stored chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// Store-assigned id
    pub id: ChunkId,
    /// Digest of the payload
    pub digest: Digest,
    /// Exactly `chunk_size` bytes
    pub payload: Vec<u8>,
    /// Number of occurrences across all runs
    pub reuse_count: u64,
}

/// A record without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    /// Store-assigned id
    pub id: ChunkId,
    /// Digest of the payload
    pub digest: Digest,
    /// Number of occurrences across all runs
    pub reuse_count: u64,
}

/// Statistics for the whole store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct chunks stored
    pub distinct_chunks: u64,
    /// Sum of all reuse counts
    pub total_references: u64,
    /// Payload bytes actually stored
    pub stored_bytes: u64,
    /// Payload bytes referenced by all containers
    pub logical_bytes: u64,
}

impl StoreStats {
    /// Referenced bytes per stored byte (1.0 when nothing is shared).
    pub fn dedup_ratio(&self) -> f64 {
        if self.stored_bytes == 0 {
            return 1.0;
        }
        self.logical_bytes as f64 / self.stored_bytes as f64
    }
}

/// Statistics for this handle since it was opened.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Records created
    pub inserted: u64,
    /// Upserts that hit an existing record
    pub reused: u64,
    /// Successful reads by id
    pub hits: u64,
    /// Reads of unknown ids
    pub misses: u64,
}

/// Local chunk storage backed by RocksDB.
///
/// The handle owns the database for its lifetime. RocksDB's lock file keeps
/// other processes out until the handle is closed or dropped.
pub struct ChunkStore {
    db: DB,
    path: PathBuf,
    chunk_size: usize,
    hash: HashStrategy,
    write_opts: WriteOptions,
    /// Next id to assign; held for the whole upsert
    next_id: Mutex<ChunkId>,
    /// Statistics tracking
    stats: RwLock<SessionStats>,
}

impl ChunkStore {
    /// Opens or creates a chunk store.
    ///
    /// A new store persists the configured chunk size and hash strategy. An
    /// existing store must match both.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        if !config.create_if_missing && !config.path.exists() {
            return Err(StoreError::NotFound(config.path.clone()));
        }

        let db = Self::open_db(&config.path, config.create_if_missing)?;

        let meta = match Self::load_meta(&db, &config.path)? {
            Some(meta) => {
                if meta.chunk_size != config.chunk_size {
                    return Err(StoreError::ConfigMismatch {
                        field: "chunk size",
                        stored: meta.chunk_size.to_string(),
                        requested: config.chunk_size.to_string(),
                    });
                }
                if meta.hash != config.hash {
                    return Err(StoreError::ConfigMismatch {
                        field: "hash strategy",
                        stored: meta.hash.to_string(),
                        requested: config.hash.to_string(),
                    });
                }
                debug!(path = %config.path.display(), next_id = %meta.next_id, "Opened existing chunk store");
                meta
            }
            None => {
                let meta = StoreMeta {
                    chunk_size: config.chunk_size,
                    hash: config.hash,
                    next_id: ChunkId::FIRST,
                };
                Self::init_meta(&db, &config.path, &meta)?;
                info!(
                    path = %config.path.display(),
                    chunk_size = meta.chunk_size,
                    hash = %meta.hash,
                    "Created chunk store"
                );
                meta
            }
        };

        Ok(Self::from_parts(db, config.path.clone(), meta, config.sync_writes))
    }

    /// Opens a store that must already exist, using its persisted settings.
    pub fn open_existing(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let db = Self::open_db(path, false)?;
        let meta = Self::load_meta(&db, path)?
            .ok_or_else(|| StoreError::Corrupt("missing store metadata".to_string()))?;

        debug!(path = %path.display(), chunk_size = meta.chunk_size, hash = %meta.hash, "Opened existing chunk store");
        Ok(Self::from_parts(db, path.to_path_buf(), meta, false))
    }

    fn open_db(path: &Path, create: bool) -> Result<DB, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(create);
        opts.create_missing_column_families(true);

        DB::open_cf(&opts, path, [DIGESTS_CF, RECORDS_CF, PAYLOADS_CF, META_CF])
            .map_err(|e| StoreError::from_db(path, e))
    }

    fn from_parts(db: DB, path: PathBuf, meta: StoreMeta, sync_writes: bool) -> Self {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(sync_writes);

        Self {
            db,
            path,
            chunk_size: meta.chunk_size,
            hash: meta.hash,
            write_opts,
            next_id: Mutex::new(meta.next_id),
            stats: RwLock::new(SessionStats::default()),
        }
    }

    fn load_meta(db: &DB, path: &Path) -> Result<Option<StoreMeta>, StoreError> {
        let cf = db
            .cf_handle(META_CF)
            .ok_or_else(|| StoreError::Database("Missing meta column family".to_string()))?;
        let get = |key: &[u8]| db.get_cf(cf, key).map_err(|e| StoreError::from_db(path, e));

        let Some(raw_size) = get(META_CHUNK_SIZE)? else {
            return Ok(None);
        };

        let version = get(META_FORMAT_VERSION)?
            .map(|v| u32::from_bytes(&v))
            .transpose()?
            .ok_or_else(|| StoreError::Corrupt("missing format version".to_string()))?;
        if version != STORE_FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported store format version {version}"
            )));
        }

        let chunk_size = usize::try_from(u64::from_bytes(&raw_size)?)
            .map_err(|_| StoreError::Corrupt("chunk size exceeds address space".to_string()))?;

        let tag = get(META_HASH)?
            .map(|v| u8::from_bytes(&v))
            .transpose()?
            .ok_or_else(|| StoreError::Corrupt("missing hash strategy".to_string()))?;
        let hash = HashStrategy::from_tag(tag)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown hash strategy tag {tag}")))?;

        let next_id = get(META_NEXT_ID)?
            .map(|v| u64::from_bytes(&v))
            .transpose()?
            .map(ChunkId)
            .ok_or_else(|| StoreError::Corrupt("missing next id".to_string()))?;

        Ok(Some(StoreMeta {
            chunk_size,
            hash,
            next_id,
        }))
    }

    fn init_meta(db: &DB, path: &Path, meta: &StoreMeta) -> Result<(), StoreError> {
        let cf = db
            .cf_handle(META_CF)
            .ok_or_else(|| StoreError::Database("Missing meta column family".to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf, META_FORMAT_VERSION, STORE_FORMAT_VERSION.to_vec());
        batch.put_cf(cf, META_CHUNK_SIZE, (meta.chunk_size as u64).to_vec());
        batch.put_cf(cf, META_HASH, meta.hash.tag().to_vec());
        batch.put_cf(cf, META_NEXT_ID, meta.next_id.to_vec());

        db.write(batch).map_err(|e| StoreError::from_db(path, e))
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("Missing {name} column family")))
    }

    fn db_err(&self, err: rocksdb::Error) -> StoreError {
        StoreError::from_db(&self.path, err)
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the chunk size every payload must have.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the hash strategy keying this store.
    pub fn hash(&self) -> HashStrategy {
        self.hash
    }

    /// Stores a payload, or counts another occurrence of an identical one.
    ///
    /// Returns the id of the record holding the payload. Calls are
    /// serialised, so a payload repeated within one run always maps to the
    /// id assigned on its first occurrence.
    pub fn upsert(&self, payload: &[u8]) -> Result<Upsert, StoreError> {
        if payload.len() != self.chunk_size {
            return Err(StoreError::InvalidChunkSize {
                expected: self.chunk_size,
                actual: payload.len(),
            });
        }

        let digest = self.hash.digest(payload);
        let digests = self.cf(DIGESTS_CF)?;
        let records = self.cf(RECORDS_CF)?;

        let mut next_id = self.next_id.lock();

        if let Some(raw) = self.db.get_cf(digests, digest.as_slice()).map_err(|e| self.db_err(e))? {
            let id = ChunkId::from_key(&raw)
                .ok_or_else(|| StoreError::Corrupt(format!("malformed id for digest {digest}")))?;

            let mut header = self.load_header(id)?;
            header.reuse_count += 1;
            self.db
                .put_cf_opt(records, id.to_key(), header.to_vec(), &self.write_opts)
                .map_err(|e| self.db_err(e))?;

            self.stats.write().reused += 1;
            trace!(id = %id, reuse_count = header.reuse_count, "Reused chunk");
            return Ok(Upsert {
                id,
                inserted: false,
                reuse_count: header.reuse_count,
            });
        }

        let id = *next_id;
        let following = id.next().ok_or(StoreError::IdSpaceExhausted)?;
        let key = id.to_key();
        let header = RecordHeader {
            digest,
            reuse_count: 1,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(digests, header.digest.as_slice(), key);
        batch.put_cf(records, key, header.to_vec());
        batch.put_cf(self.cf(PAYLOADS_CF)?, key, payload);
        batch.put_cf(self.cf(META_CF)?, META_NEXT_ID, following.to_vec());
        self.db
            .write_opt(batch, &self.write_opts)
            .map_err(|e| self.db_err(e))?;

        *next_id = following;
        self.stats.write().inserted += 1;
        debug!(id = %id, digest = %header.digest, "Stored chunk");

        Ok(Upsert {
            id,
            inserted: true,
            reuse_count: 1,
        })
    }

    /// Retrieves the payload stored under `id`.
    pub fn get(&self, id: ChunkId) -> Result<Vec<u8>, StoreError> {
        let cf = self.cf(PAYLOADS_CF)?;

        match self.db.get_cf(cf, id.to_key()).map_err(|e| self.db_err(e))? {
            Some(payload) => {
                self.stats.write().hits += 1;
                Ok(payload)
            }
            None => {
                self.stats.write().misses += 1;
                Err(StoreError::ChunkNotFound(id))
            }
        }
    }

    /// Looks up the id stored for a digest.
    pub fn lookup(&self, digest: &Digest) -> Result<Option<ChunkId>, StoreError> {
        let cf = self.cf(DIGESTS_CF)?;

        match self.db.get_cf(cf, digest.as_slice()).map_err(|e| self.db_err(e))? {
            Some(raw) => ChunkId::from_key(&raw)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("malformed id for digest {digest}"))),
            None => Ok(None),
        }
    }

    fn load_header(&self, id: ChunkId) -> Result<RecordHeader, StoreError> {
        let cf = self.cf(RECORDS_CF)?;
        let raw = self
            .db
            .get_cf(cf, id.to_key())
            .map_err(|e| self.db_err(e))?
            .ok_or(StoreError::ChunkNotFound(id))?;
        Ok(RecordHeader::from_bytes(&raw)?)
    }

    /// Returns the full record for `id`.
    pub fn record(&self, id: ChunkId) -> Result<ChunkRecord, StoreError> {
        let header = self.load_header(id)?;
        let payload = self.get(id)?;
        Ok(ChunkRecord {
            id,
            digest: header.digest,
            payload,
            reuse_count: header.reuse_count,
        })
    }

    /// Returns the reuse count of `id`.
    pub fn reuse_count(&self, id: ChunkId) -> Result<u64, StoreError> {
        Ok(self.load_header(id)?.reuse_count)
    }

    /// Lists all records in id order.
    ///
    /// Note: This can be expensive for large stores.
    pub fn records(&self) -> Result<Vec<RecordInfo>, StoreError> {
        let cf = self.cf(RECORDS_CF)?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| self.db_err(e))?;
            let id = ChunkId::from_key(&key)
                .ok_or_else(|| StoreError::Corrupt("malformed record key".to_string()))?;
            let header = RecordHeader::from_bytes(&value)?;
            records.push(RecordInfo {
                id,
                digest: header.digest,
                reuse_count: header.reuse_count,
            });
        }

        Ok(records)
    }

    /// Returns the `limit` most reused records, most reused first.
    pub fn most_reused(&self, limit: usize) -> Result<Vec<RecordInfo>, StoreError> {
        let mut records = self.records()?;
        records.sort_by(|a, b| b.reuse_count.cmp(&a.reuse_count).then(a.id.cmp(&b.id)));
        records.truncate(limit);
        Ok(records)
    }

    /// Returns the number of distinct chunks.
    pub fn len(&self) -> u64 {
        self.next_id.lock().get() - ChunkId::FIRST.get()
    }

    /// Returns true if no chunk has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the largest id assigned so far.
    pub fn max_id(&self) -> Option<ChunkId> {
        let next = self.next_id.lock().get();
        (next > ChunkId::FIRST.get()).then(|| ChunkId(next - 1))
    }

    /// Computes statistics over every record.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.records()?;
        let chunk_size = self.chunk_size as u64;
        let distinct_chunks = records.len() as u64;
        let total_references: u64 = records.iter().map(|r| r.reuse_count).sum();

        Ok(StoreStats {
            distinct_chunks,
            total_references,
            stored_bytes: distinct_chunks * chunk_size,
            logical_bytes: total_references * chunk_size,
        })
    }

    /// Returns statistics for this handle.
    pub fn session_stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// Flushes pending writes and releases the store.
    pub fn close(self) -> Result<(), StoreError> {
        self.db.flush().map_err(|e| self.db_err(e))?;
        let stats = self.session_stats();
        info!(
            path = %self.path.display(),
            inserted = stats.inserted,
            reused = stats.reused,
            "Closed chunk store"
        );
        Ok(())
    }
}
