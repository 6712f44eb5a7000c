//! Core types, chunk identifiers, and configuration for strata.
//!
//! This crate provides the foundational data structures used across all strata crates:
//! - [`types`] — Entities, relations, chunks, and parse results
//! - [`chunk_id`] — Deterministic, collision-resistant chunk identifiers
//! - [`hash`] — Content hashing (SHA256 truncated to 16 hex chars)
//! - [`config`] — Indexer configuration loading

pub mod chunk_id;
pub mod config;
pub mod hash;
pub mod types;
