//! Sabd CLI - Command-line interface for fixed-size chunk deduplication.
//!
//! Provides commands for:
//! - Deduplicating files into a chunk store
//! - Restoring files from containers
//! - Benchmarking chunk sizes and hash strategies
//! - Inspecting store statistics

mod bench;
mod config;
mod prompt;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sabd_core::HashStrategy;
use sabd_engine::{Deduplicator, Duplicator, EmptyInputPolicy, EngineConfig};
use sabd_store::ChunkStore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{default_config_toml, expand_tilde, load_config, CliConfig};

/// Fixed-size chunk deduplication CLI.
#[derive(Parser)]
#[command(name = "sabd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, default_value = "~/.sabd/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deduplicate a file, or every file in a directory, into the store
    Dedup {
        /// File or directory (not recursive)
        input: PathBuf,

        /// Chunk store directory
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Chunk size in bytes
        #[arg(short = 'b', long)]
        chunk_size: Option<usize>,

        /// Hash strategy (none, md5, sha1, sha256, sha512, blake3)
        #[arg(long)]
        hash: Option<HashStrategy>,

        /// Chunks fetched per read
        #[arg(long)]
        read_batch: Option<usize>,

        /// Fail on empty files instead of writing header-only containers
        #[arg(long)]
        reject_empty: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Restore a container, or every container in a directory
    Dup {
        /// Container or directory (not recursive)
        input: PathBuf,

        /// Chunk store directory
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Records fetched per read
        #[arg(long)]
        read_batch: Option<usize>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Benchmark chunk sizes and hash strategies on a set of files
    Bench {
        /// File or directory (not recursive)
        input: PathBuf,

        /// Scratch store directory; must not exist
        #[arg(short, long)]
        store: PathBuf,

        /// CSV output path
        #[arg(short, long)]
        log: PathBuf,

        /// Runs per (chunk size, hash) pair
        #[arg(short, long, default_value = "10")]
        iterations: usize,

        /// Chunk sizes to test (comma separated)
        #[arg(long, value_delimiter = ',')]
        chunk_sizes: Vec<usize>,

        /// Hash strategies to test (comma separated)
        #[arg(long, value_delimiter = ',')]
        hashes: Vec<HashStrategy>,
    },

    /// Show store statistics
    Stats {
        /// Chunk store directory
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Number of most reused chunks to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")?;

    let file_config = match cli.command {
        Commands::Init { .. } => CliConfig::default(),
        _ => load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Dedup {
            input,
            store,
            chunk_size,
            hash,
            read_batch,
            reject_empty,
            yes,
        } => {
            let mut config = file_config.engine_config();
            if let Some(chunk_size) = chunk_size {
                config = config.with_chunk_size(chunk_size);
            }
            if let Some(hash) = hash {
                config = config.with_hash(hash);
            }
            if let Some(read_batch) = read_batch {
                config = config.with_read_batch(read_batch);
            }
            if reject_empty {
                config = config.with_empty_input(EmptyInputPolicy::Reject);
            }
            let store = resolve_store(store, &file_config);
            cmd_dedup(&input, &store, config, yes)
        }

        Commands::Dup {
            input,
            store,
            read_batch,
            yes,
        } => {
            let mut config = file_config.engine_config();
            if let Some(read_batch) = read_batch {
                config = config.with_read_batch(read_batch);
            }
            let store = resolve_store(store, &file_config);
            cmd_dup(&input, &store, config, yes)
        }

        Commands::Bench {
            input,
            store,
            log,
            iterations,
            chunk_sizes,
            hashes,
        } => cmd_bench(
            &input,
            &store,
            &log,
            iterations,
            &chunk_sizes,
            &hashes,
            &file_config.engine_config(),
        ),

        Commands::Stats { store, top } => cmd_stats(&resolve_store(store, &file_config), top),

        Commands::Init { force } => cmd_init(&cli.config, force),
    }
}

fn resolve_store(flag: Option<PathBuf>, config: &CliConfig) -> PathBuf {
    match flag {
        Some(path) => expand_tilde(&path),
        None => config.store_path(),
    }
}

/// Lists the files to process: `input` itself, or the regular files directly
/// inside it that satisfy `keep`, sorted by name.
fn collect_inputs(input: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(input).with_context(|| format!("Failed to list {input:?}"))? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Fails if two inputs would be written to the same container, as `a.txt`
/// and `a.md` both map to `a.bin`.
fn check_container_collisions(files: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<PathBuf, &PathBuf> = HashMap::with_capacity(files.len());
    for file in files {
        let container = sabd_engine::paths::container_path(file);
        if let Some(first) = seen.insert(container.clone(), file) {
            anyhow::bail!(
                "{:?} and {:?} would both be written to {:?}",
                first,
                file,
                container
            );
        }
    }
    Ok(())
}

fn is_container(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == sabd_engine::paths::CONTAINER_EXTENSION)
}

fn announce(files: &[PathBuf]) {
    println!("Detected {} files:", files.len());
    for file in files {
        println!("{}", file.display());
    }
}

fn cmd_dedup(input: &Path, store: &Path, config: EngineConfig, yes: bool) -> Result<()> {
    let files = collect_inputs(input, |p| !is_container(p))?;
    announce(&files);
    check_container_collisions(&files)?;

    if !yes && !prompt::confirm("Continue deduplication?")? {
        println!("Aborting");
        return Ok(());
    }

    info!(store = %store.display(), chunk_size = config.chunk_size, hash = %config.hash, "Deduplicating");
    let engine = Deduplicator::new(config.clone())?;
    let store_handle = ChunkStore::open(&config.store_config(store))
        .with_context(|| format!("Failed to open store {store:?}"))?;

    let start = Instant::now();
    for file in &files {
        println!("Deduplicating {} ...", file.display());
        let report = engine
            .deduplicate_into(file, &store_handle)
            .with_context(|| format!("Failed to deduplicate {file:?}"))?;
        println!(
            "  {} chunks ({} new, {} reused), id width {} -> {}",
            report.chunks,
            report.new_chunks,
            report.reused_chunks,
            report.id_width,
            report.container.display()
        );
    }
    store_handle.close()?;

    println!("Deduplication done in {:.2} seconds.", start.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_dup(input: &Path, store: &Path, config: EngineConfig, yes: bool) -> Result<()> {
    let files = collect_inputs(input, is_container)?;
    announce(&files);

    if !yes && !prompt::confirm("Continue duplication?")? {
        println!("Aborting");
        return Ok(());
    }

    let engine = Duplicator::new(config)?;
    let store_handle = ChunkStore::open_existing(store)
        .with_context(|| format!("Failed to open store {store:?}"))?;

    let start = Instant::now();
    for file in &files {
        println!("Duplicating {} ...", file.display());
        let report = engine
            .duplicate_from(file, &store_handle)
            .with_context(|| format!("Failed to restore {file:?}"))?;
        println!(
            "  {} chunks, {} bytes -> {}",
            report.chunks,
            report.bytes_written,
            report.restored.display()
        );
    }
    store_handle.close()?;

    println!("Duplication done in {:.2} seconds.", start.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_bench(
    input: &Path,
    store: &Path,
    log: &Path,
    iterations: usize,
    chunk_sizes: &[usize],
    hashes: &[HashStrategy],
    base: &EngineConfig,
) -> Result<()> {
    let files = collect_inputs(input, |p| !is_container(p))?;
    announce(&files);
    check_container_collisions(&files)?;

    let chunk_sizes = if chunk_sizes.is_empty() {
        &bench::DEFAULT_CHUNK_SIZES[..]
    } else {
        chunk_sizes
    };
    let hashes = if hashes.is_empty() {
        &bench::DEFAULT_HASHES[..]
    } else {
        hashes
    };

    let rows = bench::run_matrix(&files, store, base, chunk_sizes, hashes, iterations)?;
    bench::write_csv(log, &rows)?;

    println!("Wrote {} benchmark rows to {}", rows.len(), log.display());
    Ok(())
}

fn cmd_stats(store: &Path, top: usize) -> Result<()> {
    let store_handle = ChunkStore::open_existing(store)
        .with_context(|| format!("Failed to open store {store:?}"))?;
    let stats = store_handle.stats()?;

    println!("Store: {}", store.display());
    println!("Chunk size: {} bytes", store_handle.chunk_size());
    println!("Hash strategy: {}", store_handle.hash());
    if store_handle.hash().is_collision_prone() {
        println!("  (not collision resistant against crafted input)");
    }
    println!("Distinct chunks: {}", stats.distinct_chunks);
    println!("Total references: {}", stats.total_references);
    println!("Stored bytes: {}", stats.stored_bytes);
    println!("Referenced bytes: {}", stats.logical_bytes);
    println!("Dedup ratio: {:.2}", stats.dedup_ratio());

    let most_reused = store_handle.most_reused(top)?;
    if !most_reused.is_empty() {
        println!();
        println!("Most reused chunks:");
        for record in most_reused {
            println!("  #{:<8} x{:<8} {}", record.id.get(), record.reuse_count, record.digest);
        }
    }

    store_handle.close()?;
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    let path = expand_tilde(config_path);

    if path.exists() && !force {
        anyhow::bail!("Configuration already exists at {:?}. Use --force to overwrite.", path);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
    }

    std::fs::write(&path, default_config_toml()?).context("Failed to write config file")?;
    println!("Initialized sabd configuration at {:?}", path);
    Ok(())
}
