//! Markdown documentation parsing.
//!
//! Headers of level 1–2 become DOCUMENTATION entities; the chunker turns
//! the section structure into token-budgeted implementation/metadata chunk
//! pairs for progressive disclosure.

use std::path::Path;
use std::time::Instant;

use strata_core::hash::content_hash;
use strata_core::types::{Entity, ParseResult, Relation};

use crate::{LanguageParser, ParseContext};

pub mod chunker;

/// Parser for `.md` / `.markdown` files. No tree-sitter grammar is needed;
/// the line-oriented header structure carries everything.
pub struct MarkdownParser;

impl MarkdownParser {
    pub fn new() -> Self {
        MarkdownParser
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for MarkdownParser {
    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn parse(&self, path: &Path, _ctx: &ParseContext<'_>) -> ParseResult {
        let started = Instant::now();
        let mut result = ParseResult::new(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                result
                    .errors
                    .push(format!("Failed to read {}: {e}", path.display()));
                result.parsing_time = started.elapsed().as_secs_f64();
                return result;
            }
        };
        result.file_hash = content_hash(&source);

        let chunks = chunker::chunk(&source, path);

        let headers = header_entities(&source, path, &file_name);
        let file_entity = Entity::file(path, headers.len(), "documentation", !chunks.is_empty());

        let file_key = path.display().to_string();
        let mut relations = Vec::new();
        for header in &headers {
            relations.push(Relation::contains(&file_key, &header.name));
        }

        let mut entities = vec![file_entity];
        entities.extend(headers);

        result.entities = entities;
        result.relations = relations;
        result.implementation_chunks = chunks;
        result.parsing_time = started.elapsed().as_secs_f64();
        result
    }
}

/// DOCUMENTATION entities for headers of level 1 and 2 only; deeper levels
/// stay discoverable through the chunks without bloating the entity graph.
fn header_entities(source: &str, path: &Path, file_name: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') {
            continue;
        }
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let text = trimmed.trim_start_matches('#').trim();
        if text.is_empty() || level > 2 {
            continue;
        }
        let line_number = line_index as u32 + 1;
        entities.push(
            Entity::documentation(
                text,
                path,
                line_number,
                vec![
                    format!("Header level {level}: {text}"),
                    format!("Line {line_number} in {file_name}"),
                ],
            )
            .with_metadata("header_level", level)
            .with_metadata("type", "header"),
        );
    }
    entities
}
