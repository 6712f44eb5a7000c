//! Content-addressed cache of parse results.
//!
//! One JSON blob per content hash under
//! `.index_cache/parse_cache/<version>/<hash16>.json`. When a file's content
//! hash hits, parsing is skipped entirely. Entries evict LRU: once the index
//! reaches the ceiling, the oldest 25% by last access go per sweep.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use strata_core::types::ParseResult;

/// Bump to invalidate old entries when the result format changes. Old
/// version directories are left on disk, not deleted.
pub const CACHE_VERSION: &str = "v1";

/// Default ceiling on cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct IndexEntry {
    path: PathBuf,
    mtime: f64,
    #[allow(dead_code)]
    size: u64,
    last_access: Option<f64>,
}

#[derive(Default)]
struct CacheState {
    index: HashMap<String, IndexEntry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseCacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub version: &'static str,
}

/// On-disk cache of [`ParseResult`]s keyed by content hash.
///
/// All mutations are serialized by a single lock; blob files are written
/// whole before the index sees them, so concurrent readers observe either
/// the old or the new blob atomically.
pub struct ParseResultCache {
    cache_dir: PathBuf,
    max_entries: usize,
    state: Mutex<CacheState>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl ParseResultCache {
    pub fn new(cache_dir: &Path, max_entries: usize) -> Self {
        let cache_dir = cache_dir.join("parse_cache").join(CACHE_VERSION);
        let cache = ParseResultCache {
            cache_dir,
            max_entries,
            state: Mutex::new(CacheState::default()),
        };
        cache.init();
        cache
    }

    pub fn with_defaults(cache_dir: &Path) -> Self {
        Self::new(cache_dir, DEFAULT_MAX_ENTRIES)
    }

    fn init(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!(error = %e, "failed to initialize parse cache");
            return;
        }
        let entries = match std::fs::read_dir(&self.cache_dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(error = %e, "failed to scan parse cache directory");
                return;
            }
        };
        let mut state = self.state.lock().unwrap();
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(content_hash) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else { continue };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            state.index.insert(
                content_hash.to_string(),
                IndexEntry {
                    path: path.clone(),
                    mtime,
                    size: meta.len(),
                    last_access: None,
                },
            );
        }
        debug!(entries = state.index.len(), "loaded parse cache index");
    }

    /// Fetch a cached result. Corrupt blobs are evicted and count as a miss.
    pub fn get(&self, content_hash: &str) -> Option<ParseResult> {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.index.get(content_hash) else {
            state.misses += 1;
            return None;
        };
        let blob_path = entry.path.clone();

        let parsed = std::fs::read_to_string(&blob_path)
            .ok()
            .and_then(|content| serde_json::from_str::<ParseResult>(&content).ok());
        match parsed {
            Some(result) => {
                state.hits += 1;
                if let Some(entry) = state.index.get_mut(content_hash) {
                    entry.last_access = Some(now_secs());
                }
                Some(result)
            }
            None => {
                debug!(content_hash, "evicting unreadable parse cache entry");
                state.index.remove(content_hash);
                let _ = std::fs::remove_file(&blob_path);
                state.misses += 1;
                None
            }
        }
    }

    /// Store a parse result, evicting old entries first if at the ceiling.
    pub fn set(&self, content_hash: &str, result: &ParseResult) {
        let mut state = self.state.lock().unwrap();
        self.maybe_evict(&mut state);

        let serialized = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "failed to serialize parse result");
                return;
            }
        };
        let blob_path = self.cache_dir.join(format!("{content_hash}.json"));
        if let Err(e) = std::fs::write(&blob_path, &serialized) {
            debug!(error = %e, "failed to cache parse result");
            return;
        }
        let now = now_secs();
        state.index.insert(
            content_hash.to_string(),
            IndexEntry {
                path: blob_path,
                mtime: now,
                size: serialized.len() as u64,
                last_access: Some(now),
            },
        );
    }

    fn maybe_evict(&self, state: &mut CacheState) {
        if state.index.len() < self.max_entries {
            return;
        }
        let mut entries: Vec<(String, f64, PathBuf)> = state
            .index
            .iter()
            .map(|(hash, e)| (hash.clone(), e.last_access.unwrap_or(e.mtime), e.path.clone()))
            .collect();
        entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let to_remove = (entries.len() / 4).max(1);
        for (hash, _, path) in entries.into_iter().take(to_remove) {
            let _ = std::fs::remove_file(&path);
            state.index.remove(&hash);
        }
        debug!(evicted = to_remove, "evicted parse cache entries");
    }

    /// Drop every cached blob.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        for entry in state.index.values() {
            let _ = std::fs::remove_file(&entry.path);
        }
        state.index.clear();
        state.hits = 0;
        state.misses = 0;
        info!("cleared parse cache");
    }

    pub fn get_stats(&self) -> ParseCacheStats {
        let state = self.state.lock().unwrap();
        let total = state.hits + state.misses;
        ParseCacheStats {
            entries: state.index.len(),
            max_entries: self.max_entries,
            hits: state.hits,
            misses: state.misses,
            hit_ratio: if total > 0 {
                state.hits as f64 / total as f64
            } else {
                0.0
            },
            version: CACHE_VERSION,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
