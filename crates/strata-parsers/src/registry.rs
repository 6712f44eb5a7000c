//! Extension→parser dispatch with cache consultation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use strata_core::config::IndexerConfig;
use strata_core::hash::content_hash;
use strata_core::types::ParseResult;
use strata_index::parse_cache::ParseResultCache;

use crate::javascript::JavaScriptParser;
use crate::json::JsonParser;
use crate::markdown::MarkdownParser;
use crate::python::PythonParser;
use crate::{LanguageParser, ParseContext};

/// Dispatches files to language parsers in registration order (first match
/// wins) and short-circuits through the parse-result cache when wired.
/// Stateless after construction; safe for concurrent `parse_file` calls.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn LanguageParser>>,
    parse_cache: Option<Arc<ParseResultCache>>,
}

impl ParserRegistry {
    /// An empty registry; callers register parsers themselves.
    pub fn new() -> Self {
        ParserRegistry {
            parsers: Vec::new(),
            parse_cache: None,
        }
    }

    /// The standard parser set: Python, JavaScript/TypeScript, JSON,
    /// Markdown.
    pub fn with_default_parsers(project_root: &Path, config: &IndexerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PythonParser::new(project_root)));
        registry.register(Box::new(JavaScriptParser::new(project_root)));
        registry.register(Box::new(JsonParser::new(config.clone())));
        registry.register(Box::new(MarkdownParser::new()));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn LanguageParser>) {
        self.parsers.push(parser);
    }

    pub fn with_parse_cache(mut self, cache: Arc<ParseResultCache>) -> Self {
        self.parse_cache = Some(cache);
        self
    }

    /// First registered parser claiming the file's extension.
    pub fn parser_for(&self, path: &Path) -> Option<&dyn LanguageParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(path))
            .map(Box::as_ref)
    }

    /// Parse one file. Never fails out: unknown extensions and parse
    /// failures are reported on the returned result.
    pub fn parse_file(&self, path: &Path, ctx: &ParseContext<'_>) -> ParseResult {
        let Some(parser) = self.parser_for(path) else {
            let mut result = ParseResult::new(path);
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            result.errors.push(format!("No parser available for {ext}"));
            return result;
        };

        let cache_probe = self.parse_cache.as_ref().and_then(|cache| {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes);
                    let hash = content_hash(&content);
                    if let Some(mut cached) = cache.get(&hash) {
                        // Reconstitute against the current path; entities keep
                        // the paths they were extracted with.
                        cached.file_path = path.to_path_buf();
                        return Some(Err(cached));
                    }
                    Some(Ok(hash))
                }
                Err(e) => {
                    debug!(file_path = %path.display(), error = %e, "cache lookup read failed");
                    None
                }
            }
        });

        match cache_probe {
            Some(Err(cached)) => cached,
            Some(Ok(hash)) => {
                let result = parser.parse(path, ctx);
                if let Some(cache) = &self.parse_cache {
                    cache.set(&hash, &result);
                }
                result
            }
            None => parser.parse(path, ctx),
        }
    }

    /// Parse many files on the rayon pool, one file per task.
    pub fn parse_many(&self, paths: &[PathBuf], ctx: &ParseContext<'_>) -> Vec<ParseResult> {
        paths
            .par_iter()
            .map(|path| self.parse_file(path, ctx))
            .collect()
    }

    /// Union of every parser's extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .parsers
            .iter()
            .flat_map(|p| p.supported_extensions().iter().map(|e| e.to_string()))
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
