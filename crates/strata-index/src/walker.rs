//! Project tree walking for index candidates.
//!
//! Produces the file stream the parser registry consumes: every regular
//! file under the root whose extension is recognized and which survives the
//! ignore rules.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::ignore_rules::IgnoreResolver;

/// Walks a project tree, yielding indexable files.
pub struct FileWalker<'a> {
    root: PathBuf,
    resolver: &'a IgnoreResolver,
}

impl<'a> FileWalker<'a> {
    pub fn new(root: &Path, resolver: &'a IgnoreResolver) -> Self {
        FileWalker {
            root: root.to_path_buf(),
            resolver,
        }
    }

    /// All files with one of the given extensions (lowercase, no dot) that
    /// are not ignored. Hidden files and gitignored files are skipped the
    /// way git itself would skip them; the ignore resolver layers the
    /// universal/global/project exclusions on top.
    pub fn walk(&self, extensions: &[String]) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        extensions.iter().any(|e| *e == ext)
                    })
                    .unwrap_or(false)
            })
            .filter(|path| !self.resolver.is_ignored(path))
            .collect();
        files.sort();
        files
    }
}
