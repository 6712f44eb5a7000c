//! Language parsers and chunk assembly for strata.
//!
//! Each language parser turns one source file into a [`ParseResult`]:
//! entities and relations for the code graph, plus progressive-disclosure
//! chunks (cheap metadata, full implementation text). The
//! [`registry::ParserRegistry`] dispatches per extension and consults the
//! parse-result cache.
//!
//! Supported: Python, JavaScript/TypeScript, JSON, Markdown.

use std::collections::HashSet;
use std::path::Path;

use strata_core::types::{Entity, EntityChunk, ParseResult, Relation};

pub mod javascript;
pub mod json;
pub mod linker;
pub mod markdown;
pub mod observations;
pub mod python;
pub mod registry;
pub mod treesitter;

/// Sink for streamed entity/relation/chunk batches. Returns whether the
/// batch was accepted. Must be thread-safe when workers share one.
pub type BatchCallback<'a> = dyn Fn(&[Entity], &[Relation], &[EntityChunk]) -> bool + Sync + 'a;

/// Per-call parse inputs shared by every language parser.
#[derive(Default, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Streaming sink for content-collection JSON files.
    pub batch_callback: Option<&'a BatchCallback<'a>>,
    /// Entity names known outside the current file; CALLS edges are
    /// filtered against this universe plus the file's own entities.
    pub global_entity_names: Option<&'a HashSet<String>>,
}

/// A single-language parser. Parsing one file never fails out of this
/// trait: errors ride on the returned [`ParseResult`].
pub trait LanguageParser: Send + Sync {
    /// Extensions handled, lowercase, without the leading dot.
    fn supported_extensions(&self) -> &[&str];

    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.supported_extensions().iter().any(|s| *s == ext)
            })
            .unwrap_or(false)
    }

    fn parse(&self, path: &Path, ctx: &ParseContext<'_>) -> ParseResult;
}
