//! Ignore rules, change detection, and caching for strata.
//!
//! - [`ignore_rules`] — Hierarchical `.claudeignore` matching (universal,
//!   global, project layers)
//! - [`file_hashes`] — Per-file content-hash tracking for incremental runs
//! - [`change_detector`] — Git-based change detection with hash fallback
//! - [`parse_cache`] — Content-addressed on-disk cache of parse results
//! - [`walker`] — Project tree walking for index candidates

pub mod change_detector;
pub mod file_hashes;
pub mod ignore_rules;
pub mod parse_cache;
pub mod walker;
