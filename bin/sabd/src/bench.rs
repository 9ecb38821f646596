//! Benchmark over chunk sizes and hash strategies.
//!
//! Each (chunk size, hash) pair deduplicates every input into a fresh store,
//! restores every container, compares the result with the input and removes
//! all artefacts. Timings are averaged over the iterations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sabd_core::HashStrategy;
use sabd_engine::{compare_files, Deduplicator, Duplicator, EngineConfig};
use sabd_store::ChunkStore;
use tracing::{info, warn};

/// Chunk sizes benchmarked when none are given.
pub(crate) const DEFAULT_CHUNK_SIZES: [usize; 11] = [10, 20, 32, 64, 96, 128, 160, 192, 256, 384, 512];

/// Hash strategies benchmarked when none are given.
pub(crate) const DEFAULT_HASHES: [HashStrategy; 5] = [
    HashStrategy::Identity,
    HashStrategy::Md5,
    HashStrategy::Sha1,
    HashStrategy::Sha256,
    HashStrategy::Sha512,
];

/// One CSV row.
#[derive(Debug, Clone)]
pub(crate) struct BenchRow {
    pub iterations: usize,
    pub hash: HashStrategy,
    pub chunk_size: usize,
    pub dedup_time: Duration,
    pub dup_time: Duration,
    pub length_total: u64,
    pub error_total: u64,
    pub length_violations: Vec<PathBuf>,
}

struct RunResult {
    dedup_time: Duration,
    dup_time: Duration,
    length_total: u64,
    error_total: u64,
    length_violations: Vec<PathBuf>,
}

/// Files and store created by one run, removed on drop.
struct Artefacts {
    files: Vec<PathBuf>,
    store: PathBuf,
}

impl Drop for Artefacts {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = fs::remove_file(file) {
                warn!(path = %file.display(), error = %e, "Failed to remove benchmark artefact");
            }
        }
        if self.store.exists() {
            if let Err(e) = fs::remove_dir_all(&self.store) {
                warn!(path = %self.store.display(), error = %e, "Failed to remove benchmark store");
            }
        }
    }
}

/// Runs every (chunk size, hash) pair and returns one row per pair.
pub(crate) fn run_matrix(
    inputs: &[PathBuf],
    store: &Path,
    base: &EngineConfig,
    chunk_sizes: &[usize],
    hashes: &[HashStrategy],
    iterations: usize,
) -> Result<Vec<BenchRow>> {
    if iterations == 0 {
        anyhow::bail!("Iterations must be positive");
    }
    if store.exists() {
        anyhow::bail!("Benchmark store {:?} already exists and would be deleted", store);
    }

    let mut rows = Vec::with_capacity(chunk_sizes.len() * hashes.len());
    for &chunk_size in chunk_sizes {
        for &hash in hashes {
            let config = base.clone().with_chunk_size(chunk_size).with_hash(hash);
            let runs = (0..iterations)
                .map(|_| run_once(inputs, store, &config))
                .collect::<Result<Vec<_>>>()?;

            let first = &runs[0];
            let row = BenchRow {
                iterations,
                hash,
                chunk_size,
                dedup_time: mean(runs.iter().map(|r| r.dedup_time)),
                dup_time: mean(runs.iter().map(|r| r.dup_time)),
                length_total: first.length_total,
                error_total: first.error_total,
                length_violations: first.length_violations.clone(),
            };
            info!(
                chunk_size,
                hash = %hash,
                dedup_ms = row.dedup_time.as_millis() as u64,
                dup_ms = row.dup_time.as_millis() as u64,
                errors = row.error_total,
                "Benchmark pair finished"
            );
            rows.push(row);
        }
    }
    Ok(rows)
}

fn run_once(inputs: &[PathBuf], store_path: &Path, config: &EngineConfig) -> Result<RunResult> {
    let mut artefacts = Artefacts {
        files: Vec::new(),
        store: store_path.to_path_buf(),
    };

    let store = ChunkStore::open(&config.store_config(store_path)).context("Failed to open store")?;
    let deduplicator = Deduplicator::new(config.clone())?;
    let duplicator = Duplicator::new(config.clone())?;

    let start = Instant::now();
    let mut containers = Vec::with_capacity(inputs.len());
    for input in inputs {
        let report = deduplicator
            .deduplicate_into(input, &store)
            .with_context(|| format!("Failed to deduplicate {input:?}"))?;
        artefacts.files.push(report.container.clone());
        containers.push(report.container);
    }
    let dedup_time = start.elapsed();

    let start = Instant::now();
    let mut restored = Vec::with_capacity(inputs.len());
    for container in &containers {
        let report = duplicator
            .duplicate_from(container, &store)
            .with_context(|| format!("Failed to restore {container:?}"))?;
        artefacts.files.push(report.restored.clone());
        restored.push(report.restored);
    }
    let dup_time = start.elapsed();
    store.close()?;

    let mut result = RunResult {
        dedup_time,
        dup_time,
        length_total: 0,
        error_total: 0,
        length_violations: Vec::new(),
    };
    for (input, output) in inputs.iter().zip(&restored) {
        let cmp = compare_files(input, output)?;
        result.length_total += cmp.max_len();
        result.error_total += cmp.differing_bytes;
        if !cmp.lengths_match() {
            warn!(
                input = %input.display(),
                original = cmp.len_a,
                restored = cmp.len_b,
                "Restored length differs"
            );
            result.length_violations.push(input.clone());
        }
    }

    Ok(result)
}

fn mean(durations: impl ExactSizeIterator<Item = Duration>) -> Duration {
    let n = durations.len() as u32;
    if n == 0 {
        return Duration::ZERO;
    }
    durations.sum::<Duration>() / n
}

/// Writes `rows` as CSV to `path`.
pub(crate) fn write_csv(path: &Path, rows: &[BenchRow]) -> Result<()> {
    let mut out = Vec::new();
    writeln!(
        out,
        "iterations,hash_function,byte_chunk_size,deduplication_time,duplication_time,length_total,error_total,length_violation"
    )?;
    for row in rows {
        let violations = row
            .length_violations
            .iter()
            .map(|p| p.display().to_string().replace('"', "\"\""))
            .collect::<Vec<_>>()
            .join(";");
        writeln!(
            out,
            "{},{},{},{:.6},{:.6},{},{},\"{}\"",
            row.iterations,
            row.hash,
            row.chunk_size,
            row.dedup_time.as_secs_f64(),
            row.dup_time.as_secs_f64(),
            row.length_total,
            row.error_total,
            violations
        )?;
    }
    fs::write(path, out).with_context(|| format!("Failed to write benchmark log {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_rows_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let exact = dir.path().join("exact.dat");
        let odd = dir.path().join("odd.dat");
        fs::write(&exact, vec![1u8; 64]).unwrap();
        fs::write(&odd, vec![2u8; 50]).unwrap();
        let store = dir.path().join("bench-store");

        let rows = run_matrix(
            &[exact.clone(), odd.clone()],
            &store,
            &EngineConfig::default(),
            &[16, 32],
            &[HashStrategy::Md5, HashStrategy::Sha256],
            2,
        )
        .unwrap();

        assert_eq!(rows.len(), 4);
        let row = &rows[0];
        assert_eq!((row.chunk_size, row.hash), (16, HashStrategy::Md5));
        // 50 bytes pad to 64 with 16 and 32 byte chunks
        assert_eq!(row.error_total, 14);
        assert_eq!(row.length_total, 128);
        assert_eq!(row.length_violations, vec![odd]);

        assert!(!store.exists());
        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["exact.dat", "odd.dat"]);
    }

    #[test]
    fn test_refuses_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_matrix(&[], dir.path(), &EngineConfig::default(), &[8], &[HashStrategy::Md5], 1);
        assert!(err.is_err());
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let rows = vec![BenchRow {
            iterations: 3,
            hash: HashStrategy::Identity,
            chunk_size: 10,
            dedup_time: Duration::from_millis(1500),
            dup_time: Duration::from_millis(250),
            length_total: 100,
            error_total: 0,
            length_violations: vec![],
        }];

        write_csv(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("iterations,hash_function,byte_chunk_size"));
        assert_eq!(lines[1], "3,none,10,1.500000,0.250000,100,0,\"\"");
    }

    #[test]
    fn test_mean() {
        let d = [Duration::from_secs(1), Duration::from_secs(3)];
        assert_eq!(mean(d.into_iter()), Duration::from_secs(2));
    }
}
