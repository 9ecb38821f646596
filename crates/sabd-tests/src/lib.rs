//! Integration and end-to-end tests for sabd.
//!
//! This crate provides:
//! - A scratch workspace harness holding input files and a chunk store
//! - Deterministic content generators
//! - Round-trip, store and edge case suites under `tests/`

pub mod harness;

pub use harness::{distinct_blocks, padded, random_bytes, TestWorkspace};
