//! JSON structural extraction and content-collection parsing.
//!
//! Structural mode walks the tree-sitter AST: every key becomes a
//! DOCUMENTATION entity with a dotted path, `package.json` dependencies
//! become IMPORTS relations, and the whole document lands in one
//! implementation chunk. Content mode (`content_only`) treats the file as a
//! collection of posts/articles/messages, emitting one entity and chunk per
//! item, with batched hand-off through a streaming callback when supplied.

use std::path::Path;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};
use tree_sitter::{Language, Node};

use strata_core::chunk_id::chunk_id;
use strata_core::config::IndexerConfig;
use strata_core::hash::content_hash;
use strata_core::types::{
    ChunkMetadata, ChunkType, Entity, EntityChunk, ParseResult, Relation,
};

use crate::treesitter::{find_nodes_by_kind, has_syntax_errors, node_text, parse_source};
use crate::{BatchCallback, LanguageParser, ParseContext};

/// Array keys scanned for content items, in priority order.
const CONTENT_ARRAYS: &[&str] = &[
    "topics",
    "posts",
    "articles",
    "comments",
    "messages",
    "threads",
    "forums",
    "site_pages",
    "items",
    "content",
    "chunks",
];

/// Chunks per streaming batch before the callback is invoked.
const STREAM_BATCH_SIZE: usize = 1000;

const TITLE_FIELDS: &[&str] = &["title", "subject", "name", "headline"];
const ID_FIELDS: &[&str] = &["id", "_id", "post_id", "article_id"];
const CONTENT_FIELDS: &[&str] = &["content", "body", "text", "message", "description"];
const AUTHOR_FIELDS: &[&str] = &["author", "user", "username", "created_by", "poster"];
const NESTED_FIELDS: &[&str] = &["replies", "comments", "responses"];

/// Tree-sitter based parser for `.json` files.
pub struct JsonParser {
    config: IndexerConfig,
}

impl JsonParser {
    pub fn new(config: IndexerConfig) -> Self {
        JsonParser { config }
    }

    fn language() -> Language {
        tree_sitter_json::LANGUAGE.into()
    }
}

impl LanguageParser for JsonParser {
    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }

    fn parse(&self, path: &Path, ctx: &ParseContext<'_>) -> ParseResult {
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

        if self.config.content_only {
            if let Some(callback) = ctx.batch_callback {
                self.extract_content_streaming(path, &source, callback, &mut result);
            } else {
                self.extract_content_items(path, &source, &file_name, &mut result);
            }
            result.parsing_time = started.elapsed().as_secs_f64();
            return result;
        }

        self.extract_structure(path, &source, &file_name, &mut result);
        result.parsing_time = started.elapsed().as_secs_f64();
        result
    }
}

impl JsonParser {
    fn extract_structure(
        &self,
        path: &Path,
        source: &str,
        file_name: &str,
        result: &mut ParseResult,
    ) {
        let tree = match parse_source(&Self::language(), source) {
            Ok(t) => t,
            Err(e) => {
                result.errors.push(format!("JSON parsing failed: {e}"));
                return;
            }
        };
        if has_syntax_errors(&tree) {
            result
                .warnings
                .push(format!("JSON syntax errors in {file_name}"));
        }

        let mut entities = vec![Entity::file(path, 0, "configuration", true)];
        let mut relations = Vec::new();

        if self.config.special_files.iter().any(|f| f == file_name) {
            match file_name {
                "package.json" => {
                    relations.extend(package_dependencies(tree.root_node(), source, path));
                }
                "tsconfig.json" => {
                    entities.extend(tsconfig_entities(tree.root_node(), source, path));
                }
                _ => {}
            }
        } else if let Some(root_obj) = first_object(tree.root_node()) {
            let file_key = path.display().to_string();
            extract_object_structure(
                root_obj,
                source,
                path,
                "",
                &file_key,
                &mut entities,
                &mut relations,
            );
        }

        let line_count = source.lines().count().max(1) as u32;
        let chunk = EntityChunk {
            id: chunk_id(path, "json_file", "content", "implementation", 1, line_count),
            entity_name: path.display().to_string(),
            chunk_type: ChunkType::Implementation,
            content: source.to_string(),
            metadata: ChunkMetadata::new("json_file", path, 1, line_count),
        };

        let count = entities.len() - 1;
        entities[0] = Entity::file(path, count, "configuration", true);
        result.entities = entities;
        result.relations = relations;
        result.implementation_chunks = vec![chunk];
    }

    /// Content extraction without a callback: items accumulate inline.
    fn extract_content_items(
        &self,
        path: &Path,
        source: &str,
        file_name: &str,
        result: &mut ParseResult,
    ) {
        let data: Value = match serde_json::from_str(source) {
            Ok(v) => v,
            Err(e) => {
                result.errors.push(format!("JSON parsing failed: {e}"));
                self.content_only_fallback(path, source, result);
                return;
            }
        };

        let mut entities = vec![Entity::file(path, 0, "content_collection", true)];
        let mut chunks = Vec::new();
        let mut extracted = 0usize;
        let max_items = self.config.max_content_items;

        for array_key in CONTENT_ARRAYS {
            let Some(items) = data.get(array_key).and_then(Value::as_array) else {
                continue;
            };
            for (index, item) in items.iter().enumerate() {
                if max_items > 0 && extracted >= max_items {
                    break;
                }
                let Some(item) = item.as_object() else { continue };
                if let Some((entity, chunk)) =
                    self.content_item(item, array_key, index, path)
                {
                    entities.push(entity);
                    chunks.push(chunk);
                    extracted += 1;
                }
            }
            if max_items > 0 && extracted >= max_items {
                info!(
                    max_items,
                    file = file_name,
                    "reached content item limit"
                );
                break;
            }
        }

        if extracted == 0 {
            chunks.push(full_content_chunk(path, source));
        }
        let count = entities.len() - 1;
        entities[0] = Entity::file(path, count, "content_collection", true);
        result.entities = entities;
        result.implementation_chunks = chunks;
        debug!(items = extracted, file = file_name, "content extraction complete");
    }

    /// Batched hand-off through the callback: the file entity flushes first,
    /// then every batch of `STREAM_BATCH_SIZE` chunks; the returned result
    /// carries only counters.
    fn extract_content_streaming(
        &self,
        path: &Path,
        source: &str,
        callback: &BatchCallback<'_>,
        result: &mut ParseResult,
    ) {
        let mut total_entities = 0usize;
        let mut total_chunks = 0usize;

        let file_entity = Entity::file(path, 0, "content_collection", true);
        if callback(&[file_entity], &[], &[]) {
            total_entities += 1;
        }

        let data: Value = match serde_json::from_str(source) {
            Ok(v) => v,
            Err(e) => {
                result
                    .errors
                    .push(format!("Streaming JSON parsing failed: {e}"));
                result.entities_created = Some(total_entities);
                result.implementation_chunks_created = Some(0);
                return;
            }
        };

        let mut batch_entities: Vec<Entity> = Vec::new();
        let mut batch_chunks: Vec<EntityChunk> = Vec::new();
        let mut processed = 0usize;
        let max_items = self.config.max_content_items;

        'arrays: for array_key in CONTENT_ARRAYS {
            let Some(items) = data.get(array_key).and_then(Value::as_array) else {
                continue;
            };
            for (index, item) in items.iter().enumerate() {
                if max_items > 0 && processed >= max_items {
                    break 'arrays;
                }
                let Some(item) = item.as_object() else { continue };
                if let Some((entity, chunk)) =
                    self.content_item(item, array_key, index, path)
                {
                    batch_entities.push(entity);
                    batch_chunks.push(chunk);
                    processed += 1;
                }

                if batch_chunks.len() >= STREAM_BATCH_SIZE {
                    if callback(&batch_entities, &[], &batch_chunks) {
                        total_entities += batch_entities.len();
                        total_chunks += batch_chunks.len();
                        info!(
                            chunks = batch_chunks.len(),
                            total = total_chunks,
                            "processed streaming batch"
                        );
                    }
                    batch_entities.clear();
                    batch_chunks.clear();
                }
            }
        }

        if !batch_entities.is_empty() || !batch_chunks.is_empty() {
            if callback(&batch_entities, &[], &batch_chunks) {
                total_entities += batch_entities.len();
                total_chunks += batch_chunks.len();
            }
        }

        if processed == 0 {
            result
                .errors
                .push("No content items found in any expected arrays".to_string());
        }

        result.entities_created = Some(total_entities);
        result.implementation_chunks_created = Some(total_chunks);
        info!(
            items = processed,
            chunks = total_chunks,
            "streaming extraction complete"
        );
    }

    fn content_only_fallback(&self, path: &Path, source: &str, result: &mut ParseResult) {
        result.entities = vec![Entity::file(path, 0, "content", true)];
        result.implementation_chunks = vec![full_content_chunk(path, source)];
    }

    fn content_item(
        &self,
        item: &serde_json::Map<String, Value>,
        array_key: &str,
        index: usize,
        path: &Path,
    ) -> Option<(Entity, EntityChunk)> {
        let entity_name = content_entity_name(array_key, item, index);
        let content_text = self.item_content(item);
        if content_text.trim().is_empty() {
            return None;
        }

        let singular = array_key.trim_end_matches('s');
        let entity = Entity::documentation(
            &entity_name,
            path,
            1,
            vec![format!("{}: {entity_name}", title_case(singular))],
        )
        .with_metadata("content_type", singular)
        .with_metadata("item_index", index)
        .with_metadata("source_array", array_key);

        let chunk = EntityChunk {
            id: chunk_id(path, "documentation", &entity_name, "implementation", 1, 1),
            entity_name: entity_name.clone(),
            chunk_type: ChunkType::Implementation,
            content: content_text,
            metadata: ChunkMetadata::new(&format!("{singular}_content"), path, 1, 1)
                .with_extra("has_implementation", true)
                .with_extra("item_index", index),
        };
        Some((entity, chunk))
    }

    /// Combined text content of one item: title, primary fields, author,
    /// nested replies. HTML/script/style markup is stripped in content mode.
    fn item_content(&self, item: &serde_json::Map<String, Value>) -> String {
        let mut parts: Vec<String> = Vec::new();

        for field in CONTENT_FIELDS {
            if let Some(text) = item.get(*field).and_then(Value::as_str) {
                let text = if self.config.content_only {
                    strip_markup(text.trim())
                } else {
                    text.trim().to_string()
                };
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }

        for field in TITLE_FIELDS {
            if let Some(title) = item.get(*field).and_then(Value::as_str) {
                let title = if self.config.content_only {
                    strip_markup(title.trim())
                } else {
                    title.trim().to_string()
                };
                if !title.is_empty() {
                    parts.insert(0, format!("Title: {title}"));
                    break;
                }
            }
        }

        if let Some(author) = author_info(item) {
            parts.push(format!("Author: {author}"));
        }

        let mut full = parts.join("\n\n");

        let nested = self.nested_content(item);
        if !nested.is_empty() {
            full.push_str("\n\n--- Replies/Comments ---\n");
            full.push_str(&nested);
        }

        if full.trim().is_empty() {
            serde_json::to_string(item).unwrap_or_default()
        } else {
            full
        }
    }

    fn nested_content(&self, item: &serde_json::Map<String, Value>) -> String {
        let mut nested_parts = Vec::new();
        for field in NESTED_FIELDS {
            let Some(children) = item.get(*field).and_then(Value::as_array) else {
                continue;
            };
            for (i, child) in children.iter().enumerate() {
                if let Some(child) = child.as_object() {
                    let text = self.item_content(child);
                    if !text.trim().is_empty() {
                        nested_parts.push(format!("Reply {}: {text}", i + 1));
                    }
                }
            }
        }
        nested_parts.join("\n\n")
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn content_entity_name(
    array_key: &str,
    item: &serde_json::Map<String, Value>,
    index: usize,
) -> String {
    let singular = array_key.trim_end_matches('s');

    if let Some(chunk_number) = item.get("chunk_number") {
        let chunk_number = value_display(chunk_number);
        for field in TITLE_FIELDS {
            if let Some(title) = item.get(*field).and_then(Value::as_str) {
                let title = clean_title(title);
                if !title.is_empty() {
                    return format!("{singular}_{chunk_number}_{title}");
                }
            }
        }
        return format!("{singular}_{chunk_number}");
    }

    for field in TITLE_FIELDS {
        if let Some(title) = item.get(*field).and_then(Value::as_str) {
            let title = clean_title(title);
            if !title.is_empty() {
                return format!("{singular}_{}_{title}", index + 1);
            }
        }
    }

    for field in ID_FIELDS {
        if let Some(id) = item.get(*field) {
            return format!("{singular}_{}", value_display(id));
        }
    }

    format!("{singular}_{}", index + 1)
}

fn clean_title(title: &str) -> String {
    title
        .trim()
        .replace('\n', " ")
        .replace('\r', "")
        .chars()
        .take(100)
        .collect()
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn author_info(item: &serde_json::Map<String, Value>) -> Option<String> {
    for field in AUTHOR_FIELDS {
        match item.get(*field) {
            Some(Value::String(author)) => return Some(author.clone()),
            Some(Value::Object(author)) => {
                if let Some(name) = author.get("name").and_then(Value::as_str) {
                    return Some(name.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn full_content_chunk(path: &Path, source: &str) -> EntityChunk {
    EntityChunk {
        id: chunk_id(path, "json_content", "content", "implementation", 1, 1),
        entity_name: path.display().to_string(),
        chunk_type: ChunkType::Implementation,
        content: source.to_string(),
        metadata: ChunkMetadata::new("json_content", path, 1, 1)
            .with_extra("has_implementation", true),
    }
}

/// Strip scripts, styles, inline PHP, and remaining HTML tags; decode
/// entities; collapse whitespace.
pub fn strip_markup(text: &str) -> String {
    static PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\?php.*?\?>").unwrap());
    static SCRIPT_BLOCK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
    static SCRIPT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<script[^>]*>").unwrap());
    static STYLE_BLOCK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
    static STYLE_ATTR: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)style\s*=\s*["'][^"']*["']"#).unwrap());
    static BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    static P_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p>").unwrap());
    static P_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p[^>]*>").unwrap());
    static LI_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li[^>]*>").unwrap());
    static LI_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</li>").unwrap());
    static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
    static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
    static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
    static TRAILING: Lazy<Regex> = Lazy::new(|| Regex::new(r" +\n").unwrap());
    static LEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n +").unwrap());

    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = PHP.replace_all(text, "").into_owned();
    cleaned = SCRIPT_BLOCK.replace_all(&cleaned, "").into_owned();
    cleaned = SCRIPT_OPEN.replace_all(&cleaned, "").into_owned();
    cleaned = STYLE_BLOCK.replace_all(&cleaned, "").into_owned();
    cleaned = STYLE_ATTR.replace_all(&cleaned, "").into_owned();
    cleaned = BR.replace_all(&cleaned, "\n").into_owned();
    cleaned = P_CLOSE.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = P_OPEN.replace_all(&cleaned, "").into_owned();
    cleaned = LI_OPEN.replace_all(&cleaned, "\u{2022} ").into_owned();
    cleaned = LI_CLOSE.replace_all(&cleaned, "\n").into_owned();
    cleaned = ANY_TAG.replace_all(&cleaned, "").into_owned();

    cleaned = cleaned
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    cleaned = cleaned.replace("\r\n", "\n");
    cleaned = BLANK_RUN.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = SPACES.replace_all(&cleaned, " ").into_owned();
    cleaned = TRAILING.replace_all(&cleaned, "\n").into_owned();
    cleaned = LEADING.replace_all(&cleaned, "\n").into_owned();
    cleaned.trim().to_string()
}

fn first_object(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "object" {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = first_object(child) {
            return Some(found);
        }
    }
    None
}

fn key_text(pair: Node<'_>, source: &str) -> Option<String> {
    let key_node = pair.child_by_field_name("key")?;
    Some(node_text(key_node, source).trim_matches('"').to_string())
}

#[allow(clippy::too_many_arguments)]
fn extract_object_structure(
    node: Node<'_>,
    source: &str,
    path: &Path,
    parent_path: &str,
    file_key: &str,
    entities: &mut Vec<Entity>,
    relations: &mut Vec<Relation>,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        if child.kind() != "pair" {
            continue;
        }
        let Some(key) = key_text(child, source) else {
            continue;
        };
        let Some(value) = child.child_by_field_name("value") else {
            continue;
        };
        let key_line = child
            .child_by_field_name("key")
            .map(|k| k.start_position().row as u32 + 1)
            .unwrap_or(1);
        let current_path = if parent_path.is_empty() {
            key.clone()
        } else {
            format!("{parent_path}.{key}")
        };

        entities.push(Entity::documentation(
            &current_path,
            path,
            key_line,
            vec![format!("JSON key: {key}")],
        ));
        let parent = if parent_path.is_empty() {
            file_key
        } else {
            parent_path
        };
        relations.push(Relation::contains(parent, &current_path));

        match value.kind() {
            "object" => extract_object_structure(
                value,
                source,
                path,
                &current_path,
                file_key,
                entities,
                relations,
            ),
            "array" => {
                let array_name = format!("{current_path}[]");
                entities.push(Entity::documentation(
                    &array_name,
                    path,
                    value.start_position().row as u32 + 1,
                    vec![format!("JSON array: {key}")],
                ));
                relations.push(Relation::contains(&current_path, &array_name));
            }
            _ => {}
        }
    }
}

/// IMPORTS relations for `dependencies` / `devDependencies` of package.json.
fn package_dependencies(root: Node<'_>, source: &str, path: &Path) -> Vec<Relation> {
    let file_key = path.display().to_string();
    let mut relations = Vec::new();
    for pair in find_nodes_by_kind(root, &["pair"]) {
        let Some(key) = key_text(pair, source) else {
            continue;
        };
        if key != "dependencies" && key != "devDependencies" {
            continue;
        }
        let Some(value) = pair.child_by_field_name("value") else {
            continue;
        };
        if value.kind() != "object" {
            continue;
        }
        let mut cursor = value.walk();
        for dep in value.children(&mut cursor) {
            if dep.kind() != "pair" {
                continue;
            }
            if let Some(dep_name) = key_text(dep, source) {
                relations.push(Relation::imports(&file_key, dep_name, "npm_dependency"));
            }
        }
    }
    relations
}

fn tsconfig_entities(root: Node<'_>, source: &str, path: &Path) -> Vec<Entity> {
    let mut entities = Vec::new();
    for pair in find_nodes_by_kind(root, &["pair"]) {
        if key_text(pair, source).as_deref() == Some("compilerOptions") {
            entities.push(Entity::documentation(
                "TypeScript Compiler Options",
                path,
                pair.start_position().row as u32 + 1,
                vec!["TypeScript compiler configuration".to_string()],
            ));
        }
    }
    entities
}

#[cfg(test)]
mod tests;
