//! # Shrike
//!
//! A snapshot-coordinated storage layer for disk-backed search indexes.
//!
//! Shrike sits between application code and a segment-oriented index engine.
//! It owns the parts the engine does not: versioned searcher snapshots handed
//! off without blocking readers, a single-writer mutation pipeline with
//! deterministic commit-then-publish ordering, and a registry that detects
//! unclean shutdowns and repairs or resets damaged indexes at startup.
//!
//! ## Features
//!
//! - Refcounted searcher generations; readers never observe a closed snapshot
//! - Lazily created writers guarded by a single write lock per index
//! - Crash-marker based startup validation with a reset-once recovery policy
//! - Pluggable segment engines behind a small trait contract
//! - A flat baseline engine with checksummed, repairable segments

pub mod analysis;
pub mod document;
pub mod engine;
pub mod error;
pub mod fields;
pub mod index;
pub mod schema;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
