//! Token-budgeted, boundary-aware markdown section chunking.
//!
//! Sections are grouped for retrieval density: oversize sections split at
//! semantic boundaries, empty headers forward-merge into their next
//! neighbor, undersized groups redistribute into adjacent ones, and each
//! group after the first carries a short overlap slice of its predecessor.
//! Every group emits an implementation chunk (literal text) and a metadata
//! chunk (curated summary) sharing the canonical id scheme.

use std::path::Path;

use serde_json::Value;

use strata_core::chunk_id::chunk_id;
use strata_core::types::{ChunkMetadata, ChunkType, EntityChunk};

pub const TARGET_CHUNK_TOKENS: usize = 800;
pub const MAX_CHUNK_TOKENS: usize = 1000;
pub const MIN_CHUNK_TOKENS: usize = 100;
/// 12.5% of a target chunk, expressed in characters of overlap.
pub const OVERLAP_CHARS: usize = 200;

const MIN_GROUPING_TOKENS: usize = 100;
const AGGRESSIVE_TOKEN_BUDGET: usize = MAX_CHUNK_TOKENS * 85 / 100;
const MAX_SECTIONS_PER_CHUNK: usize = 10;
const REDISTRIBUTE_MIN_TOKENS: usize = 600;
const REDISTRIBUTE_MAX_SECTIONS: usize = 8;
const PREVIEW_CHARS: usize = 300;
const EMPTY_SECTION_CHARS: usize = 5;

#[derive(Debug, Clone)]
struct Section {
    header: String,
    level: usize,
    content: String,
    tokens: usize,
    /// 0-based line of the first content line.
    line_start: usize,
    /// 0-based exclusive end line (== 1-based inclusive last line).
    line_end: usize,
    parent_path: Vec<String>,
    /// 0-based line of the header itself.
    header_line: usize,
}

struct ChunkGroup {
    sections: Vec<Section>,
    overlap: Option<String>,
}

/// Rough token estimate: four characters per token. The corpus carries no
/// tokenizer; this tracks the same scale the budgets were tuned against.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Chunk a markdown document into (implementation, metadata) pairs.
pub fn chunk(source: &str, path: &Path) -> Vec<EntityChunk> {
    let sections = parse_sections(source);
    if sections.is_empty() {
        return Vec::new();
    }

    let mut processed = Vec::new();
    for section in sections {
        if section.tokens > MAX_CHUNK_TOKENS {
            processed.extend(split_large_section(section));
        } else {
            processed.push(section);
        }
    }

    let groups = group_sections(processed);
    let groups = redistribute_undersized(groups);
    let groups = add_overlap(groups);

    let total_lines = source.lines().count();
    let ends_with_newline = source.ends_with('\n');
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut chunks = Vec::new();
    for group in &groups {
        let (implementation, metadata) =
            emit_group(group, path, &file_name, total_lines, ends_with_newline);
        chunks.push(implementation);
        chunks.push(metadata);
    }
    chunks
}

#[derive(Debug)]
struct HeaderInfo {
    text: String,
    level: usize,
    line: usize,
    merged: Vec<String>,
}

fn parse_sections(source: &str) -> Vec<Section> {
    let lines: Vec<&str> = source.lines().collect();

    let mut headers: Vec<HeaderInfo> = Vec::new();
    for (line_num, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with('#') {
            continue;
        }
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let text = trimmed.trim_start_matches('#').trim();
        if !text.is_empty() {
            headers.push(HeaderInfo {
                text: text.to_string(),
                level,
                line: line_num,
                merged: Vec::new(),
            });
        }
    }

    let mut sections = Vec::new();
    let mut header_stack: Vec<String> = Vec::new();

    for i in 0..headers.len() {
        let level = headers[i].level;
        let start_line = headers[i].line + 1;
        let end_line = section_end(&headers, i, lines.len());

        let content = lines[start_line.min(lines.len())..end_line.min(lines.len())]
            .join("\n")
            .trim()
            .to_string();

        if content.len() <= EMPTY_SECTION_CHARS {
            // Empty section: annotate the next non-empty one so its display
            // header mentions this header.
            let text = headers[i].text.clone();
            for k in (i + 1)..headers.len() {
                let next_start = headers[k].line + 1;
                let next_end = headers[(k + 1)..]
                    .iter()
                    .find(|h| h.level <= headers[k].level)
                    .map(|h| h.line)
                    .unwrap_or(lines.len());
                let next_content = lines[next_start.min(lines.len())..next_end.min(lines.len())]
                    .join("\n")
                    .trim()
                    .to_string();
                if next_content.len() > EMPTY_SECTION_CHARS {
                    headers[k].merged.push(text);
                    break;
                }
            }
            continue;
        }

        let display_header = if headers[i].merged.is_empty() {
            headers[i].text.clone()
        } else {
            format!("{} (+{} more)", headers[i].text, headers[i].merged.len())
        };

        header_stack.truncate(level.saturating_sub(1));
        header_stack.push(headers[i].text.clone());

        let tokens = estimate_tokens(&format!("{display_header}\n\n{content}"));
        sections.push(Section {
            header: display_header,
            level,
            content,
            tokens,
            line_start: start_line,
            line_end: end_line,
            parent_path: header_stack.clone(),
            header_line: headers[i].line,
        });
    }
    sections
}

/// A section ends at the next header of equal or higher level, or an
/// immediate child. H1 sections end only at the next H1 or H2, so a
/// top-level preamble doesn't swallow its chapter bodies.
fn section_end(headers: &[HeaderInfo], index: usize, total_lines: usize) -> usize {
    let level = headers[index].level;
    for next in &headers[(index + 1)..] {
        let boundary = if level == 1 {
            next.level <= 2
        } else {
            next.level <= level + 1
        };
        if boundary {
            return next.line;
        }
    }
    total_lines
}

/// Semantic boundary families tried in order when a section exceeds MAX.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    BlankRun,
    Paragraph,
    ListItem,
    Sentence,
    FenceBefore,
    FenceAfter,
}

const BOUNDARIES: &[Boundary] = &[
    Boundary::BlankRun,
    Boundary::Paragraph,
    Boundary::ListItem,
    Boundary::Sentence,
    Boundary::FenceBefore,
    Boundary::FenceAfter,
];

fn split_large_section(section: Section) -> Vec<Section> {
    let mut parts: Vec<String> = vec![section.content.clone()];

    for boundary in BOUNDARIES {
        let mut next_parts = Vec::new();
        for part in parts {
            let tokens = estimate_tokens(&format!("{}\n\n{part}", section.header));
            if tokens > MAX_CHUNK_TOKENS {
                next_parts.extend(
                    split_at_boundary(&part, *boundary)
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                );
            } else {
                next_parts.push(part);
            }
        }
        parts = next_parts;
    }

    let part_count = parts.len();
    let mut result: Vec<Section> = Vec::new();
    for (i, part) in parts.into_iter().enumerate() {
        if part.trim().is_empty() {
            continue;
        }
        let tokens = estimate_tokens(&format!("{}\n\n{part}", section.header));
        if tokens < MIN_CHUNK_TOKENS && i > 0 {
            if let Some(previous) = result.last_mut() {
                previous.content.push_str("\n\n");
                previous.content.push_str(&part);
                previous.tokens =
                    estimate_tokens(&format!("{}\n\n{}", section.header, previous.content));
                continue;
            }
        }
        let header = if part_count > 1 {
            format!("{} (Part {})", section.header, i + 1)
        } else {
            section.header.clone()
        };
        result.push(Section {
            header,
            content: part,
            tokens,
            ..section.clone()
        });
    }
    result
}

fn split_at_boundary(text: &str, boundary: Boundary) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut cuts: Vec<(usize, usize)> = Vec::new();

    match boundary {
        Boundary::BlankRun => {
            // Runs of three or more newlines.
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == b'\n' {
                    let start = i;
                    while i < bytes.len() && bytes[i] == b'\n' {
                        i += 1;
                    }
                    if i - start >= 3 {
                        cuts.push((start, i));
                    }
                } else {
                    i += 1;
                }
            }
        }
        Boundary::Paragraph => {
            // "\n\n" immediately before an uppercase letter.
            for (pos, _) in text.match_indices("\n\n") {
                if text[pos + 2..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_uppercase())
                {
                    cuts.push((pos, pos + 2));
                }
            }
        }
        Boundary::ListItem => {
            // "\n" before a bullet or a numbered item.
            for (pos, _) in text.match_indices('\n') {
                let rest = &text[pos + 1..];
                let bullet = rest.starts_with("- ")
                    || rest.starts_with("* ")
                    || rest.starts_with("+ ");
                let numbered = rest
                    .find('.')
                    .is_some_and(|dot| dot > 0 && rest[..dot].bytes().all(|b| b.is_ascii_digit()));
                if bullet || numbered {
                    cuts.push((pos, pos + 1));
                }
            }
        }
        Boundary::Sentence => {
            // Whitespace between a period and an uppercase letter; the
            // period stays with the left part.
            let mut chars = text.char_indices().peekable();
            while let Some((pos, ch)) = chars.next() {
                if ch != '.' {
                    continue;
                }
                let ws_start = pos + 1;
                let mut ws_end = ws_start;
                for (next_pos, next_ch) in text[ws_start..].char_indices() {
                    if next_ch.is_whitespace() {
                        ws_end = ws_start + next_pos + next_ch.len_utf8();
                    } else {
                        if ws_end > ws_start && next_ch.is_ascii_uppercase() {
                            cuts.push((ws_start, ws_end));
                        }
                        break;
                    }
                }
            }
        }
        Boundary::FenceBefore => {
            for (pos, _) in text.match_indices('\n') {
                if text[pos + 1..].starts_with("```") {
                    cuts.push((pos, pos + 1));
                }
            }
        }
        Boundary::FenceAfter => {
            for (pos, _) in text.match_indices("```\n") {
                cuts.push((pos + 3, pos + 4));
            }
        }
    }

    if cuts.is_empty() {
        return vec![text.to_string()];
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut parts = Vec::new();
    let mut last = 0usize;
    for (start, end) in cuts {
        if start < last {
            continue;
        }
        parts.push(text[last..start].to_string());
        last = end;
    }
    parts.push(text[last..].to_string());
    parts
}

fn parent_key(section: &Section) -> Vec<String> {
    if section.parent_path.len() > 1 {
        section.parent_path[..section.parent_path.len() - 1].to_vec()
    } else {
        Vec::new()
    }
}

fn group_sections(sections: Vec<Section>) -> Vec<Vec<Section>> {
    let mut groups: Vec<Vec<Section>> = Vec::new();
    let mut current: Vec<Section> = Vec::new();
    let mut current_tokens = 0usize;
    let mut current_parent: Option<Vec<String>> = None;

    for section in sections {
        let key = parent_key(&section);
        let is_substantial = section.tokens > MIN_GROUPING_TOKENS;
        let would_exceed = current_tokens + section.tokens > AGGRESSIVE_TOKEN_BUDGET;

        let can_group = !would_exceed
            && current.len() < MAX_SECTIONS_PER_CHUNK
            && !(is_substantial && !current.is_empty())
            && (current_parent.as_ref() == Some(&key)
                || (section.parent_path.len() <= 3 && current.len() < 6)
                || current.len() < 3);

        if can_group && !current.is_empty() {
            current_tokens += section.tokens;
            current.push(section);
        } else {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            current_tokens = section.tokens;
            current_parent = Some(key);
            current.push(section);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn group_tokens(group: &[Section]) -> usize {
    group.iter().map(|s| s.tokens).sum()
}

/// Merge groups under the minimum into the next, then the previous,
/// neighbor when the merge stays within budget.
fn redistribute_undersized(mut groups: Vec<Vec<Section>>) -> Vec<Vec<Section>> {
    if groups.len() <= 1 {
        return groups;
    }

    let mut out: Vec<Vec<Section>> = Vec::new();
    let mut i = 0;
    while i < groups.len() {
        let tokens = group_tokens(&groups[i]);
        if tokens < REDISTRIBUTE_MIN_TOKENS {
            if i + 1 < groups.len() {
                let next_tokens = group_tokens(&groups[i + 1]);
                if tokens + next_tokens <= MAX_CHUNK_TOKENS
                    && groups[i].len() + groups[i + 1].len() <= REDISTRIBUTE_MAX_SECTIONS
                {
                    let mut merged = std::mem::take(&mut groups[i]);
                    merged.extend(std::mem::take(&mut groups[i + 1]));
                    out.push(merged);
                    i += 2;
                    continue;
                }
            }
            if let Some(previous) = out.last_mut() {
                let prev_tokens = group_tokens(previous);
                if prev_tokens + tokens <= MAX_CHUNK_TOKENS
                    && previous.len() + groups[i].len() <= REDISTRIBUTE_MAX_SECTIONS
                {
                    previous.extend(std::mem::take(&mut groups[i]));
                    i += 1;
                    continue;
                }
            }
        }
        out.push(std::mem::take(&mut groups[i]));
        i += 1;
    }
    out
}

/// Every group after the first gets a suffix slice of the previous group's
/// final section. Existing overlap markers are stripped before slicing so
/// markers never cascade; if stripping would empty the text, the original
/// is used instead.
fn add_overlap(groups: Vec<Vec<Section>>) -> Vec<ChunkGroup> {
    let mut out: Vec<ChunkGroup> = Vec::new();
    for (i, sections) in groups.into_iter().enumerate() {
        let overlap = if i == 0 {
            None
        } else {
            out[i - 1].sections.last().map(|prev| {
                let clean = strip_overlap_markers(&prev.content);
                let chars: Vec<char> = clean.chars().collect();
                if chars.len() > OVERLAP_CHARS {
                    chars[chars.len() - OVERLAP_CHARS..].iter().collect()
                } else {
                    clean
                }
            })
        };
        out.push(ChunkGroup { sections, overlap });
    }
    out
}

fn strip_overlap_markers(content: &str) -> String {
    if !content.contains("[Previous context:") {
        return content.to_string();
    }
    let cleaned: String = content
        .lines()
        .filter(|line| {
            let line = line.trim();
            !(line.starts_with("[Previous context:") && line.ends_with(']'))
        })
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string();
    if cleaned.is_empty() {
        content.to_string()
    } else {
        cleaned
    }
}

fn emit_group(
    group: &ChunkGroup,
    path: &Path,
    file_name: &str,
    total_lines: usize,
    ends_with_newline: bool,
) -> (EntityChunk, EntityChunk) {
    let sections = &group.sections;

    let mut combined: Vec<String> = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut total_tokens = 0usize;
    let mut start_line = usize::MAX;
    let mut end_line = 0usize;

    for (i, section) in sections.iter().enumerate() {
        headers.push(section.header.clone());
        combined.push(format!(
            "{} {}\n\n{}",
            "#".repeat(section.level),
            section.header,
            section.content
        ));
        total_tokens += section.tokens;
        let section_start = if i == 0 && sections.len() > 1 {
            section.header_line + 1
        } else {
            section.line_start + 1
        };
        start_line = start_line.min(section_start);
        end_line = end_line.max(section.line_end);
    }

    let chunk_name = if sections.len() == 1 {
        sections[0].header.clone()
    } else {
        format!("{} (+{} more)", sections[0].header, sections.len() - 1)
    };

    let mut content = combined.join("\n\n");
    if let Some(overlap) = &group.overlap {
        content = format!("[Previous context: ...{overlap}]\n\n{content}");
    }
    if end_line >= total_lines && ends_with_newline && !content.ends_with('\n') {
        content.push('\n');
    }

    let start_line = start_line as u32;
    let end_line = end_line as u32;
    let headers_value: Vec<Value> = headers.iter().map(|h| Value::from(h.as_str())).collect();

    let implementation = EntityChunk {
        id: chunk_id(
            path,
            "documentation",
            &chunk_name,
            "implementation",
            start_line,
            end_line,
        ),
        entity_name: chunk_name.clone(),
        chunk_type: ChunkType::Implementation,
        content: content.clone(),
        metadata: ChunkMetadata::new("documentation", path, start_line, end_line)
            .with_extra("section_type", "markdown_section")
            .with_extra("content_length", content.len())
            .with_extra("token_count", total_tokens)
            .with_extra("section_count", sections.len())
            .with_extra("headers", Value::Array(headers_value.clone())),
    };

    let preview: String = if content.chars().count() > PREVIEW_CHARS {
        let clipped: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{clipped}...")
    } else {
        content.clone()
    };
    let line_count = content.lines().count();
    let word_count = content.split_whitespace().count();
    let summary = format!(
        "Sections: {} | Tokens: {} | Preview: {} | Lines: {} | Words: {}",
        headers.join(", "),
        total_tokens,
        preview,
        line_count,
        word_count
    );

    let metadata = EntityChunk {
        id: chunk_id(
            path,
            "documentation",
            &chunk_name,
            "metadata",
            start_line,
            end_line,
        ),
        entity_name: chunk_name.clone(),
        chunk_type: ChunkType::Metadata,
        content: summary,
        metadata: ChunkMetadata::new("documentation", path, start_line, end_line)
            .with_extra("section_type", "markdown_section")
            .with_extra("has_implementation", true)
            .with_extra("content_length", content.len())
            .with_extra("word_count", word_count)
            .with_extra("line_count", line_count)
            .with_extra("token_count", total_tokens)
            .with_extra("section_count", sections.len())
            .with_extra("headers", Value::Array(headers_value))
            .with_extra(
                "content_bm25",
                bm25_text(&chunk_name, &headers, file_name, &content),
            ),
    };

    (implementation, metadata)
}

/// Keyword-forward alternate representation for lexical (BM25) retrieval.
fn bm25_text(chunk_name: &str, headers: &[String], file_name: &str, content: &str) -> String {
    let mut keywords: Vec<String> = Vec::new();
    for word in content.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if word.len() > 3 && !keywords.contains(&word) {
            keywords.push(word);
        }
        if keywords.len() == 20 {
            break;
        }
    }
    format!(
        "Section: {chunk_name}\nHeaders: {}\nFile: {file_name}\nKeywords: {}",
        headers.join(", "),
        keywords.join(" ")
    )
}

#[cfg(test)]
mod tests;
