//! Chunk store integration tests.
//!
//! Tests for the storage layer including:
//! - Digest widths per hash strategy
//! - Statistics over several deduplicated files
//! - Lock contention between handles

use std::fs;

use sabd_core::{ChunkId, HashStrategy};
use sabd_engine::{Deduplicator, EngineConfig};
use sabd_store::{ChunkStore, StoreConfig};
use sabd_tests::{distinct_blocks, TestWorkspace};
use tempfile::TempDir;

/// Initialize tracing for tests.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sabd_store=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_digest_length_per_strategy() {
    init_tracing();

    for hash in HashStrategy::ALL {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("store"))
            .with_chunk_size(24)
            .with_hash(hash);
        let store = ChunkStore::open(&config).unwrap();

        let id = store.upsert(&[0x42; 24]).unwrap().id;
        let record = store.record(id).unwrap();
        assert_eq!(record.digest.len(), hash.digest_len(24), "{hash}");
    }
}

#[test]
fn test_known_sha256_digest_in_store() {
    let dir = TempDir::new().unwrap();
    let store = ChunkStore::open(&StoreConfig::new(dir.path().join("s")).with_chunk_size(3)).unwrap();

    let id = store.upsert(b"abc").unwrap().id;
    assert_eq!(
        store.record(id).unwrap().digest.to_hex(),
        hex::encode([
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ])
    );
}

#[test]
fn test_stats_across_files() {
    init_tracing();

    let ws = TestWorkspace::new(8).unwrap();
    let blocks = distinct_blocks(4, 8);
    let a = ws.write_file("a.dat", &blocks).unwrap();
    let b = ws.write_file("b.dat", &[&blocks[..16], &blocks[..16]].concat()).unwrap();

    ws.dedup(&a).unwrap();
    ws.dedup(&b).unwrap();

    let store = ws.open_store().unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.distinct_chunks, 4);
    assert_eq!(stats.total_references, 8);
    assert_eq!(stats.stored_bytes, 32);
    assert_eq!(stats.logical_bytes, 64);

    let top = store.most_reused(2).unwrap();
    assert_eq!(top[0].id, ChunkId(1));
    assert_eq!(top[0].reuse_count, 3);
    assert_eq!(top[1].id, ChunkId(2));
}

#[test]
fn test_shared_handle_for_many_files() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::default().with_chunk_size(8);
    let store = ChunkStore::open(&config.store_config(dir.path().join("store"))).unwrap();
    let engine = Deduplicator::new(config).unwrap();

    for i in 0..5 {
        let path = dir.path().join(format!("f{i}.dat"));
        fs::write(&path, distinct_blocks(i + 1, 8)).unwrap();
        engine.deduplicate_into(&path, &store).unwrap();
    }

    assert_eq!(store.len(), 5);
    assert_eq!(store.reuse_count(ChunkId(1)).unwrap(), 5);
    assert_eq!(store.reuse_count(ChunkId(5)).unwrap(), 1);
    let session = store.session_stats();
    assert_eq!(session.inserted, 5);
    assert_eq!(session.reused, 10);
}

#[test]
fn test_concurrent_open_is_retryable() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path().join("store")).with_chunk_size(8);
    let first = ChunkStore::open(&config).unwrap();

    let err = ChunkStore::open(&config).err().unwrap();
    assert!(err.is_retryable(), "{err}");

    first.close().unwrap();
    assert!(ChunkStore::open(&config).is_ok());
}
