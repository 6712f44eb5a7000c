//! File content-hash cache for incremental re-indexing.
//!
//! Tracks per-file hashes so unchanged files are skipped on re-index. State
//! persists to `.index_cache/<collection>_file_hashes.json`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use strata_core::hash;

/// One tracked file: 16-hex content hash plus the fast-path (mtime, size) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHashEntry {
    pub hash: String,
    pub mtime: f64,
    pub size: u64,
    pub indexed_at: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    collection: String,
    project_path: String,
    updated_at: f64,
    files: BTreeMap<String, FileHashEntry>,
}

/// Session counters plus cache size.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHashStats {
    pub cached_files: usize,
    pub files_checked: u64,
    pub files_changed: u64,
    pub files_unchanged: u64,
    pub hit_ratio: f64,
    pub collection: String,
}

#[derive(Default)]
struct CacheState {
    files: BTreeMap<String, FileHashEntry>,
    files_checked: u64,
    files_changed: u64,
    files_unchanged: u64,
}

/// Tracks file content hashes to skip unchanged files.
///
/// Two-tier check: (mtime, size) first, SHA256 content hash when the fast
/// tuple mismatches. A single lock guards the in-memory map.
pub struct FileHashCache {
    project_path: PathBuf,
    collection: String,
    cache_dir: PathBuf,
    cache_file: PathBuf,
    state: Mutex<CacheState>,
}

fn epoch_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn now_secs() -> f64 {
    epoch_secs(SystemTime::now())
}

impl FileHashCache {
    pub fn new(project_path: &Path, collection: &str) -> Self {
        let project_path = project_path.to_path_buf();
        let cache_dir = project_path.join(".index_cache");
        let cache_file = cache_dir.join(format!("{collection}_file_hashes.json"));

        let cache = FileHashCache {
            project_path,
            collection: collection.to_string(),
            cache_dir,
            cache_file,
            state: Mutex::new(CacheState::default()),
        };
        cache.load();
        cache
    }

    fn load(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!(error = %e, "failed to create cache directory");
        }
        if !self.cache_file.exists() {
            debug!("initialized new file hash cache");
            return;
        }
        match std::fs::read_to_string(&self.cache_file) {
            Ok(content) => match serde_json::from_str::<CacheDocument>(&content) {
                Ok(doc) => {
                    let mut state = self.state.lock().unwrap();
                    debug!(entries = doc.files.len(), "loaded file hash cache");
                    state.files = doc.files;
                }
                Err(e) => warn!(error = %e, "failed to parse file hash cache"),
            },
            Err(e) => warn!(error = %e, "failed to load file hash cache"),
        }
    }

    fn save_locked(&self, state: &CacheState) {
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!(error = %e, "failed to create cache directory");
            return;
        }
        let doc = CacheDocument {
            collection: self.collection.clone(),
            project_path: self.project_path.display().to_string(),
            updated_at: now_secs(),
            files: state.files.clone(),
        };
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.cache_file, json) {
                    warn!(error = %e, "failed to save file hash cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize file hash cache"),
        }
    }

    /// Path relative to the project root, forward slashes. Paths outside the
    /// root are kept as-is.
    pub fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.project_path).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Whether a file changed since its last recorded index.
    ///
    /// Fast path compares (mtime, size); on mismatch, the content hash
    /// decides, and a matching hash silently repairs the fast tuple.
    pub fn has_changed(&self, path: &Path) -> bool {
        let mut state = self.state.lock().unwrap();
        state.files_checked += 1;
        let rel = self.relative_path(path);

        let Some(cached) = state.files.get(&rel).cloned() else {
            state.files_changed += 1;
            return true;
        };

        let meta = match path.metadata() {
            Ok(m) => m,
            Err(e) => {
                debug!(file_path = %path.display(), error = %e, "stat failed, treating as changed");
                state.files_changed += 1;
                return true;
            }
        };
        let current_mtime = meta.modified().map(epoch_secs).unwrap_or(0.0);
        let current_size = meta.len();

        if cached.mtime == current_mtime && cached.size == current_size {
            state.files_unchanged += 1;
            return false;
        }

        let current_hash = hash::hash_file(path);
        if current_hash == cached.hash {
            // Content unchanged despite a new mtime; refresh the fast tuple.
            if let Some(entry) = state.files.get_mut(&rel) {
                entry.mtime = current_mtime;
                entry.size = current_size;
            }
            state.files_unchanged += 1;
            return false;
        }

        state.files_changed += 1;
        true
    }

    /// Filter to the files that need re-indexing, logging the hit rate.
    pub fn get_changed_files(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        let changed: Vec<PathBuf> = files
            .iter()
            .filter(|p| self.has_changed(p))
            .cloned()
            .collect();
        if !files.is_empty() {
            let unchanged = files.len() - changed.len();
            let ratio = unchanged as f64 / files.len() as f64;
            info!(
                unchanged,
                total = files.len(),
                hit_rate = format!("{:.0}%", ratio * 100.0),
                "file cache consulted"
            );
        }
        changed
    }

    /// Record a file as freshly indexed. Memory only; see [`Self::flush`].
    pub fn update(&self, path: &Path) {
        let meta = match path.metadata() {
            Ok(m) => m,
            Err(e) => {
                debug!(file_path = %path.display(), error = %e, "failed to update cache entry");
                return;
            }
        };
        let entry = FileHashEntry {
            hash: hash::hash_file(path),
            mtime: meta.modified().map(epoch_secs).unwrap_or(0.0),
            size: meta.len(),
            indexed_at: now_secs(),
        };
        let rel = self.relative_path(path);
        self.state.lock().unwrap().files.insert(rel, entry);
    }

    /// Update several entries, then flush to disk.
    pub fn update_batch(&self, files: &[PathBuf]) {
        for path in files {
            self.update(path);
        }
        self.flush();
    }

    pub fn remove(&self, path: &Path) {
        let rel = self.relative_path(path);
        self.state.lock().unwrap().files.remove(&rel);
    }

    /// Write the whole document to disk.
    pub fn flush(&self) {
        let state = self.state.lock().unwrap();
        self.save_locked(&state);
    }

    /// Drop every entry and persist the empty state (forces a full re-index).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.files.clear();
        self.save_locked(&state);
        info!("cleared file hash cache");
    }

    /// Cached entries no longer present in `current`; evicts them as a side
    /// effect and returns their relative paths.
    pub fn get_deleted_files(&self, current: &HashSet<PathBuf>) -> Vec<String> {
        let current_rel: HashSet<String> =
            current.iter().map(|p| self.relative_path(p)).collect();
        let mut state = self.state.lock().unwrap();
        let deleted: Vec<String> = state
            .files
            .keys()
            .filter(|k| !current_rel.contains(*k))
            .cloned()
            .collect();
        for key in &deleted {
            state.files.remove(key);
        }
        deleted
    }

    /// Snapshot of all entries, for the change detector's hash fallback.
    pub fn entries(&self) -> BTreeMap<String, FileHashEntry> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn get_stats(&self) -> FileHashStats {
        let state = self.state.lock().unwrap();
        let total = state.files_checked;
        FileHashStats {
            cached_files: state.files.len(),
            files_checked: state.files_checked,
            files_changed: state.files_changed,
            files_unchanged: state.files_unchanged,
            hit_ratio: if total > 0 {
                state.files_unchanged as f64 / total as f64
            } else {
                0.0
            },
            collection: self.collection.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
