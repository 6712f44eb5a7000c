//! Git-aware change detection for incremental indexing.
//!
//! Uses git plumbing to report added/modified/deleted/renamed files, with a
//! hash-comparison fallback for non-git trees. Git failures degrade to "no
//! changes detected" with a warning, never to a full reindex.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::file_hashes::FileHashEntry;
use strata_core::hash;

/// Directories skipped during the non-git tree walk.
const WALK_SKIP_LIST: &[&str] = &[
    ".git",
    ".venv",
    "venv",
    "__pycache__",
    "node_modules",
    ".index_cache",
    ".pytest_cache",
    ".mypy_cache",
];

/// Detected file changes between two repository states.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    /// Relative paths; the files no longer exist.
    pub deleted: Vec<String>,
    /// `(old_path, new_path)` pairs.
    pub renamed: Vec<(String, String)>,
    pub base_commit: Option<String>,
    pub is_git_repo: bool,
}

impl Default for ChangeSet {
    fn default() -> Self {
        ChangeSet {
            added: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            renamed: Vec::new(),
            base_commit: None,
            is_git_repo: true,
        }
    }
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
            || !self.modified.is_empty()
            || !self.deleted.is_empty()
            || !self.renamed.is_empty()
    }

    pub fn total_files(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len() + self.renamed.len()
    }

    /// All files that need to be (re-)indexed.
    pub fn files_to_index(&self) -> Vec<PathBuf> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("{} added", self.added.len()));
        }
        if !self.modified.is_empty() {
            parts.push(format!("{} modified", self.modified.len()));
        }
        if !self.deleted.is_empty() {
            parts.push(format!("{} deleted", self.deleted.len()));
        }
        if !self.renamed.is_empty() {
            parts.push(format!("{} renamed", self.renamed.len()));
        }
        if parts.is_empty() {
            return "No changes detected".to_string();
        }
        let source = if self.is_git_repo { "git" } else { "hash comparison" };
        format!("{} (via {})", parts.join(", "), source)
    }
}

/// Git-based change detection with hash fallback.
pub struct ChangeDetector {
    project_path: PathBuf,
    git_repo: OnceLock<bool>,
}

impl ChangeDetector {
    pub fn new(project_path: &Path) -> Self {
        ChangeDetector {
            project_path: project_path.to_path_buf(),
            git_repo: OnceLock::new(),
        }
    }

    /// Whether the project directory is inside a git repository. Cached.
    pub fn is_git_repo(&self) -> bool {
        *self.git_repo.get_or_init(|| {
            self.run_git(&["rev-parse", "--git-dir"]).is_ok()
        })
    }

    /// Short SHA of HEAD, or None outside a repo.
    pub fn get_current_commit(&self) -> Option<String> {
        if !self.is_git_repo() {
            return None;
        }
        self.run_git(&["rev-parse", "--short", "HEAD"])
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Merge base between HEAD and a branch, for accurate 3-way diffs.
    pub fn get_merge_base(&self, branch: &str) -> Option<String> {
        if !self.is_git_repo() {
            return None;
        }
        self.run_git(&["merge-base", branch, "HEAD"])
            .ok()
            .map(|out| out.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Detect changes since a commit (git) or a previous hash state (fallback).
    pub fn detect_changes(
        &self,
        since_commit: Option<&str>,
        previous_state: Option<&BTreeMap<String, FileHashEntry>>,
    ) -> ChangeSet {
        if let Some(commit) = since_commit {
            if self.is_git_repo() {
                debug!(since = commit, "detecting changes via git");
                return self.detect_via_git(&["diff", "--name-status", "-M", commit]);
            }
        }
        debug!("detecting changes via hash comparison");
        static EMPTY: BTreeMap<String, FileHashEntry> = BTreeMap::new();
        self.detect_via_hash(previous_state.unwrap_or(&EMPTY))
    }

    /// Staged files, for pre-commit hook integration.
    pub fn get_staged_files(&self) -> ChangeSet {
        if !self.is_git_repo() {
            warn!("not a git repo, cannot get staged files");
            return ChangeSet {
                is_git_repo: false,
                ..Default::default()
            };
        }
        self.detect_via_git(&["diff", "--cached", "--name-status", "-M", "HEAD"])
    }

    /// Changes between the current branch and a base branch.
    pub fn get_branch_diff(&self, base_branch: &str) -> ChangeSet {
        if !self.is_git_repo() {
            warn!("not a git repo, cannot get branch diff");
            return ChangeSet {
                is_git_repo: false,
                ..Default::default()
            };
        }
        let Some(merge_base) = self.get_merge_base(base_branch) else {
            warn!(base = base_branch, "could not find merge base");
            return ChangeSet {
                base_commit: Some(base_branch.to_string()),
                ..Default::default()
            };
        };
        debug!(base = base_branch, merge_base, "detecting branch diff");
        self.detect_via_git(&[
            "diff",
            "--name-status",
            "-M",
            &format!("{merge_base}..HEAD"),
        ])
    }

    /// Changes between two commits.
    pub fn get_commit_range(&self, from_ref: &str, to_ref: &str) -> ChangeSet {
        if !self.is_git_repo() {
            warn!("not a git repo, cannot get commit range");
            return ChangeSet {
                is_git_repo: false,
                ..Default::default()
            };
        }
        self.detect_via_git(&[
            "diff",
            "--name-status",
            "-M",
            &format!("{from_ref}..{to_ref}"),
        ])
    }

    /// All uncommitted changes, staged and unstaged.
    pub fn get_uncommitted_changes(&self) -> ChangeSet {
        if !self.is_git_repo() {
            warn!("not a git repo, cannot get uncommitted changes");
            return ChangeSet {
                is_git_repo: false,
                ..Default::default()
            };
        }
        self.detect_via_git(&["diff", "--name-status", "-M", "HEAD"])
    }

    fn detect_via_git(&self, args: &[&str]) -> ChangeSet {
        match self.run_git(args) {
            Ok(output) => self.parse_git_status(&output),
            Err(e) => {
                warn!(error = %e, "git command failed");
                ChangeSet::default()
            }
        }
    }

    /// Parse `git diff --name-status -M` output.
    ///
    /// Lines look like `A\tfile`, `M\tfile`, `D\tfile`, `R095\told\tnew`,
    /// `C080\told\tnew`. Renamed files also land in `modified` for
    /// re-indexing; files missing on disk are dropped from added/modified.
    pub fn parse_git_status(&self, output: &str) -> ChangeSet {
        let mut set = ChangeSet {
            base_commit: self.get_current_commit(),
            ..Default::default()
        };

        for line in output.lines() {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 2 {
                continue;
            }
            let status = parts[0];
            // Last column is always the (new) path.
            let file_path = parts[parts.len() - 1];
            let full_path = self.project_path.join(file_path);

            match status {
                "A" => {
                    if full_path.exists() {
                        set.added.push(full_path);
                    }
                }
                "M" => {
                    if full_path.exists() {
                        set.modified.push(full_path);
                    }
                }
                "D" => {
                    set.deleted.push(file_path.to_string());
                }
                s if s.starts_with('R') => {
                    if parts.len() >= 3 {
                        set.renamed
                            .push((parts[1].to_string(), parts[2].to_string()));
                        if full_path.exists() {
                            set.modified.push(full_path);
                        }
                    }
                }
                s if s.starts_with('C') => {
                    if full_path.exists() {
                        set.added.push(full_path);
                    }
                }
                _ => {
                    if full_path.exists() {
                        set.modified.push(full_path);
                    }
                }
            }
        }
        set
    }

    /// Hash-comparison fallback for non-git trees. Renames are not detectable.
    pub fn detect_via_hash(&self, previous_state: &BTreeMap<String, FileHashEntry>) -> ChangeSet {
        let mut set = ChangeSet {
            is_git_repo: false,
            ..Default::default()
        };

        let mut current_paths: Vec<String> = Vec::new();
        for file_path in self.find_all_files() {
            let Ok(rel) = file_path.strip_prefix(&self.project_path) else {
                continue;
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            current_paths.push(rel_str.clone());

            match previous_state.get(&rel_str) {
                None => set.added.push(file_path),
                Some(prev) => {
                    if hash::hash_file(&file_path) != prev.hash {
                        set.modified.push(file_path);
                    }
                }
            }
        }

        for key in previous_state.keys() {
            // Metadata keys are prefixed with '_'.
            if !key.starts_with('_') && !current_paths.contains(key) {
                set.deleted.push(key.clone());
            }
        }
        set
    }

    /// All candidate files, via `git ls-files` when possible.
    pub fn find_all_files(&self) -> Vec<PathBuf> {
        if self.is_git_repo() {
            if let Ok(output) = self.run_git(&["ls-files"]) {
                return output
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(|l| self.project_path.join(l))
                    .filter(|p| p.is_file())
                    .collect();
            }
        }

        WalkDir::new(&self.project_path)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !WALK_SKIP_LIST.contains(&name))
                    .unwrap_or(true)
            })
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    fn run_git(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.project_path)
            .output()
            .map_err(|e| format!("failed to launch git: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "git {} exited with {}: {}",
                args.first().unwrap_or(&""),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn non_git_detector() -> (tempfile::TempDir, ChangeDetector) {
        let dir = tempfile::tempdir().unwrap();
        let detector = ChangeDetector::new(dir.path());
        (dir, detector)
    }

    #[test]
    fn test_parse_git_status_all_codes() {
        let (dir, detector) = non_git_detector();
        fs::write(dir.path().join("x"), "x").unwrap();
        fs::write(dir.path().join("y"), "y").unwrap();
        fs::write(dir.path().join("new"), "new").unwrap();

        let set = detector.parse_git_status("A\tx\nM\ty\nD\tz\nR080\told\tnew\n");
        assert_eq!(set.added, vec![dir.path().join("x")]);
        assert_eq!(
            set.modified,
            vec![dir.path().join("y"), dir.path().join("new")]
        );
        assert_eq!(set.deleted, vec!["z".to_string()]);
        assert_eq!(set.renamed, vec![("old".to_string(), "new".to_string())]);
    }

    #[test]
    fn test_parse_git_status_rename_with_score() {
        let (dir, detector) = non_git_detector();
        fs::write(dir.path().join("src_new.py"), "n").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/new.py"), "n").unwrap();
        fs::write(dir.path().join("src/renamed.py"), "r").unwrap();

        let set = detector
            .parse_git_status("A\tsrc/new.py\nR095\tsrc/old.py\tsrc/renamed.py\n");
        assert_eq!(set.added, vec![dir.path().join("src/new.py")]);
        assert_eq!(set.modified, vec![dir.path().join("src/renamed.py")]);
        assert_eq!(
            set.renamed,
            vec![("src/old.py".to_string(), "src/renamed.py".to_string())]
        );
    }

    #[test]
    fn test_parse_git_status_missing_files_dropped() {
        let (_dir, detector) = non_git_detector();
        let set = detector.parse_git_status("A\tgone.py\nM\talso_gone.py\n");
        assert!(set.added.is_empty());
        assert!(set.modified.is_empty());
    }

    #[test]
    fn test_parse_git_status_copy_treated_as_added() {
        let (dir, detector) = non_git_detector();
        fs::write(dir.path().join("copy.py"), "c").unwrap();
        let set = detector.parse_git_status("C090\torig.py\tcopy.py\n");
        assert_eq!(set.added, vec![dir.path().join("copy.py")]);
    }

    #[test]
    fn test_hash_fallback_detects_add_modify_delete() {
        let (dir, detector) = non_git_detector();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "a v2").unwrap();
        fs::write(&b, "b").unwrap();

        let mut previous = BTreeMap::new();
        previous.insert(
            "a.py".to_string(),
            FileHashEntry {
                hash: hash::content_hash("a v1"),
                mtime: 0.0,
                size: 4,
                indexed_at: 0.0,
            },
        );
        previous.insert(
            "gone.py".to_string(),
            FileHashEntry {
                hash: "deadbeefdeadbeef".to_string(),
                mtime: 0.0,
                size: 1,
                indexed_at: 0.0,
            },
        );

        let set = detector.detect_via_hash(&previous);
        assert!(!set.is_git_repo);
        assert_eq!(set.added, vec![b]);
        assert_eq!(set.modified, vec![a]);
        assert_eq!(set.deleted, vec!["gone.py".to_string()]);
        assert!(set.renamed.is_empty());
    }

    #[test]
    fn test_hash_fallback_unchanged_file_not_reported() {
        let (dir, detector) = non_git_detector();
        let a = dir.path().join("a.py");
        fs::write(&a, "stable").unwrap();

        let mut previous = BTreeMap::new();
        previous.insert(
            "a.py".to_string(),
            FileHashEntry {
                hash: hash::hash_file(&a),
                mtime: 0.0,
                size: 6,
                indexed_at: 0.0,
            },
        );
        let set = detector.detect_via_hash(&previous);
        assert!(!set.has_changes());
    }

    #[test]
    fn test_find_all_files_skips_cache_dirs() {
        let (dir, detector) = non_git_detector();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("src/app.py"), "x").unwrap();
        fs::write(dir.path().join("node_modules/pkg/i.js"), "x").unwrap();

        let files = detector.find_all_files();
        assert_eq!(files, vec![dir.path().join("src/app.py")]);
    }

    #[test]
    fn test_changeset_summary() {
        let mut set = ChangeSet::default();
        assert_eq!(set.summary(), "No changes detected");
        set.added.push(PathBuf::from("a"));
        set.deleted.push("b".to_string());
        assert_eq!(set.summary(), "1 added, 1 deleted (via git)");
        set.is_git_repo = false;
        assert_eq!(set.summary(), "1 added, 1 deleted (via hash comparison)");
    }

    #[test]
    fn test_files_to_index_combines_added_and_modified() {
        let set = ChangeSet {
            added: vec![PathBuf::from("a")],
            modified: vec![PathBuf::from("b")],
            ..Default::default()
        };
        assert_eq!(set.files_to_index(), vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(set.total_files(), 2);
    }
}
