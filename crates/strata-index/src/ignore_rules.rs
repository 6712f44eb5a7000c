//! Hierarchical `.claudeignore` matching with global + project pattern merging.
//!
//! Patterns load in three layers, later patterns negating earlier ones with
//! gitignore's `!` syntax:
//! 1. Universal defaults ([`UNIVERSAL_EXCLUDES`])
//! 2. Global `~/.claude-indexer/.claudeignore`
//! 3. Project `<root>/.claudeignore`

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

/// Compiled-in exclusions applied to every project.
pub const UNIVERSAL_EXCLUDES: &[&str] = &[
    // VCS and indexer state
    ".git/",
    ".svn/",
    ".hg/",
    ".claude/",
    ".claude-indexer/",
    ".index_cache/",
    // Python
    "*.pyc",
    "*.pyo",
    "__pycache__/",
    ".venv/",
    "venv/",
    ".mypy_cache/",
    ".pytest_cache/",
    ".ruff_cache/",
    "*.egg-info/",
    // Node.js
    "node_modules/",
    ".next/",
    ".nuxt/",
    // Build outputs
    "dist/",
    "build/",
    "out/",
    "target/",
    ".cache/",
    // Binaries
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.a",
    "*.o",
    "*.class",
    // Archives
    "*.zip",
    "*.tar",
    "*.tar.gz",
    "*.tgz",
    "*.rar",
    "*.7z",
    // Media
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.mp3",
    "*.mp4",
    "*.avi",
    "*.mov",
    "*.pdf",
    // OS artifacts
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    // Lock files
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Cargo.lock",
    "composer.lock",
    // Logs and scratch
    "*.log",
    "logs/",
    "*.tmp",
    "*.swp",
    "*.bak",
];

/// Which layer a pattern came from, for `reason()` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternSource {
    Universal,
    Global,
    Project,
}

/// Pattern counts and layer presence, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct IgnoreStats {
    pub total_patterns: usize,
    pub universal_patterns: usize,
    pub global_patterns: usize,
    pub project_patterns: usize,
    pub global_ignore_exists: bool,
    pub project_ignore_exists: bool,
}

/// Merged path→ignored decision over all three pattern layers.
///
/// Read-only after [`IgnoreResolver::load`]; safe for concurrent use.
pub struct IgnoreResolver {
    project_root: PathBuf,
    global_ignore_path: PathBuf,
    project_ignore_path: PathBuf,
    matcher: Gitignore,
    patterns: Vec<(String, PatternSource)>,
    universal_count: usize,
    global_count: usize,
    project_count: usize,
}

impl IgnoreResolver {
    /// Load all three layers for a project, using the default global ignore
    /// file at `~/.claude-indexer/.claudeignore`.
    pub fn load(project_root: &Path) -> Self {
        let global = dirs::home_dir()
            .unwrap_or_default()
            .join(".claude-indexer")
            .join(".claudeignore");
        Self::load_with_global(project_root, &global)
    }

    /// Load with an explicit global ignore file path.
    pub fn load_with_global(project_root: &Path, global_ignore_path: &Path) -> Self {
        let project_root = project_root.to_path_buf();
        let project_ignore_path = project_root.join(".claudeignore");

        let mut builder = GitignoreBuilder::new(&project_root);
        let mut patterns: Vec<(String, PatternSource)> = Vec::new();

        for pattern in UNIVERSAL_EXCLUDES {
            add_pattern(&mut builder, &mut patterns, pattern, PatternSource::Universal);
        }
        let universal_count = patterns.len();

        load_ignore_file(&mut builder, &mut patterns, global_ignore_path, PatternSource::Global);
        let global_count = patterns.len() - universal_count;

        load_ignore_file(
            &mut builder,
            &mut patterns,
            &project_ignore_path,
            PatternSource::Project,
        );
        let project_count = patterns.len() - universal_count - global_count;

        debug!(
            universal = universal_count,
            global = global_count,
            project = project_count,
            "loaded ignore patterns"
        );

        let matcher = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build ignore matcher, ignoring nothing");
            Gitignore::empty()
        });

        IgnoreResolver {
            project_root,
            global_ignore_path: global_ignore_path.to_path_buf(),
            project_ignore_path,
            matcher,
            patterns,
            universal_count,
            global_count,
            project_count,
        }
    }

    /// Project-relative form of a path, or None for paths outside the root.
    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        if path.is_absolute() {
            path.strip_prefix(&self.project_root).ok()
        } else {
            Some(path)
        }
    }

    /// Whether a path should be excluded from indexing.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(rel) = self.relative(path) else {
            return false;
        };
        let is_dir = self.project_root.join(rel).is_dir();
        self.matcher
            .matched_path_or_any_parents(rel, is_dir)
            .is_ignore()
    }

    /// Filter a list of paths, returning only those NOT ignored.
    pub fn filter<I, P>(&self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .filter(|p| !self.is_ignored(p))
            .collect()
    }

    /// The first positive pattern matching a path, with its source layer.
    /// Debug aid; negations are skipped, matching declaration-order reading.
    pub fn reason(&self, path: &Path) -> Option<String> {
        let rel = self.relative(path)?;
        let is_dir = self.project_root.join(rel).is_dir();
        for (pattern, source) in &self.patterns {
            if pattern.starts_with('!') {
                continue;
            }
            let mut single = GitignoreBuilder::new(&self.project_root);
            if single.add_line(None, pattern).is_err() {
                continue;
            }
            let Ok(matcher) = single.build() else {
                continue;
            };
            if matcher
                .matched_path_or_any_parents(rel, is_dir)
                .is_ignore()
            {
                let source_desc = match source {
                    PatternSource::Universal => "universal defaults".to_string(),
                    PatternSource::Global => {
                        format!("global ({})", self.global_ignore_path.display())
                    }
                    PatternSource::Project => {
                        format!("project ({})", self.project_ignore_path.display())
                    }
                };
                return Some(format!("Matched pattern '{pattern}' from {source_desc}"));
            }
        }
        None
    }

    pub fn stats(&self) -> IgnoreStats {
        IgnoreStats {
            total_patterns: self.patterns.len(),
            universal_patterns: self.universal_count,
            global_patterns: self.global_count,
            project_patterns: self.project_count,
            global_ignore_exists: self.global_ignore_path.exists(),
            project_ignore_exists: self.project_ignore_path.exists(),
        }
    }

    /// All loaded patterns in declaration order.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|(p, _)| p.clone()).collect()
    }
}

fn add_pattern(
    builder: &mut GitignoreBuilder,
    patterns: &mut Vec<(String, PatternSource)>,
    line: &str,
    source: PatternSource,
) {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return;
    }
    if builder.add_line(None, trimmed).is_ok() {
        patterns.push((trimmed.to_string(), source));
    } else {
        warn!(pattern = trimmed, "skipping invalid ignore pattern");
    }
}

fn load_ignore_file(
    builder: &mut GitignoreBuilder,
    patterns: &mut Vec<(String, PatternSource)>,
    path: &Path,
    source: PatternSource,
) {
    if !path.exists() {
        return;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => {
            for line in content.lines() {
                add_pattern(builder, patterns, line, source);
            }
        }
        Err(e) => {
            warn!(file_path = %path.display(), error = %e, "could not read ignore file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver_with(project_patterns: &str) -> (tempfile::TempDir, IgnoreResolver) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".claudeignore"), project_patterns).unwrap();
        let resolver =
            IgnoreResolver::load_with_global(dir.path(), &dir.path().join("no_global_here"));
        (dir, resolver)
    }

    #[test]
    fn test_universal_defaults_apply() {
        let dir = tempfile::tempdir().unwrap();
        let resolver =
            IgnoreResolver::load_with_global(dir.path(), &dir.path().join("no_global_here"));
        assert!(resolver.is_ignored(Path::new("node_modules/react/index.js")));
        assert!(resolver.is_ignored(Path::new("app.pyc")));
        assert!(resolver.is_ignored(Path::new(".git/config")));
        assert!(!resolver.is_ignored(Path::new("src/app.py")));
    }

    #[test]
    fn test_negation_later_pattern_wins() {
        let (_dir, resolver) = resolver_with("secret.txt\n!secret.txt\n");
        assert!(!resolver.is_ignored(Path::new("secret.txt")));
    }

    #[test]
    fn test_log_negation() {
        // Universal layer ignores *.log; the project layer re-includes one.
        let (_dir, resolver) = resolver_with("!important.log\n");
        assert!(resolver.is_ignored(Path::new("debug.log")));
        assert!(!resolver.is_ignored(Path::new("important.log")));
    }

    #[test]
    fn test_env_negation_scenario() {
        let (_dir, resolver) = resolver_with("*.env\n!.env.example\n");
        assert!(resolver.is_ignored(Path::new(".env")));
        assert!(!resolver.is_ignored(Path::new(".env.example")));
    }

    #[test]
    fn test_directory_pattern_matches_children() {
        let (_dir, resolver) = resolver_with("vendor/\n");
        assert!(resolver.is_ignored(Path::new("vendor/lib.py")));
        assert!(resolver.is_ignored(Path::new("vendor/nested/deep.py")));
        assert!(!resolver.is_ignored(Path::new("src/vendor_tools.py")));
    }

    #[test]
    fn test_root_anchored_pattern() {
        let (_dir, resolver) = resolver_with("/generated.py\n");
        assert!(resolver.is_ignored(Path::new("generated.py")));
        assert!(!resolver.is_ignored(Path::new("src/generated.py")));
    }

    #[test]
    fn test_globstar() {
        let (_dir, resolver) = resolver_with("**/fixtures/**\n");
        assert!(resolver.is_ignored(Path::new("tests/fixtures/sample.json")));
        assert!(resolver.is_ignored(Path::new("a/b/fixtures/c/d.py")));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let (_dir, resolver) = resolver_with("# a comment\n\nsecret.txt\n");
        assert!(resolver.is_ignored(Path::new("secret.txt")));
        assert!(!resolver.patterns().iter().any(|p| p.starts_with('#')));
    }

    #[test]
    fn test_path_outside_root_never_matches() {
        let (_dir, resolver) = resolver_with("*.py\n");
        assert!(!resolver.is_ignored(Path::new("/somewhere/else/app.py")));
    }

    #[test]
    fn test_absolute_path_inside_root() {
        let (dir, resolver) = resolver_with("secret.txt\n");
        assert!(resolver.is_ignored(&dir.path().join("secret.txt")));
        assert!(!resolver.is_ignored(&dir.path().join("open.txt")));
    }

    #[test]
    fn test_filter() {
        let (_dir, resolver) = resolver_with("*.generated.ts\n");
        let kept = resolver.filter(vec![
            PathBuf::from("src/app.ts"),
            PathBuf::from("src/api.generated.ts"),
            PathBuf::from("build/out.js"),
        ]);
        assert_eq!(kept, vec![PathBuf::from("src/app.ts")]);
    }

    #[test]
    fn test_reason_names_pattern_and_source() {
        let (_dir, resolver) = resolver_with("secret.txt\n");
        let reason = resolver.reason(Path::new("secret.txt")).unwrap();
        assert!(reason.contains("'secret.txt'"));
        assert!(reason.contains("project"));

        let reason = resolver.reason(Path::new("node_modules/x.js")).unwrap();
        assert!(reason.contains("'node_modules/'"));
        assert!(reason.contains("universal defaults"));

        assert!(resolver.reason(Path::new("src/app.py")).is_none());
    }

    #[test]
    fn test_global_layer_loads() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global_ignore");
        fs::write(&global, "*.secret\n").unwrap();
        let resolver = IgnoreResolver::load_with_global(dir.path(), &global);
        assert!(resolver.is_ignored(Path::new("api.secret")));
        let stats = resolver.stats();
        assert_eq!(stats.global_patterns, 1);
        assert!(stats.global_ignore_exists);
        assert!(!stats.project_ignore_exists);
        assert_eq!(stats.universal_patterns, UNIVERSAL_EXCLUDES.len());
    }
}
