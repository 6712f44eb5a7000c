use std::path::Path;

use super::*;

fn body(token_target: usize) -> String {
    // Sentences of ~40 chars produce predictable token estimates without
    // tripping the sub-minimum part merging.
    let sentence = "The quick brown fox jumps over the dog. ";
    let chars_needed = token_target * 4;
    let mut out = String::new();
    while out.len() < chars_needed {
        out.push_str(sentence);
    }
    out.trim_end().to_string()
}

fn paragraphs(count: usize, tokens_each: usize) -> String {
    (0..count)
        .map(|_| body(tokens_each))
        .collect::<Vec<String>>()
        .join("\n\n")
}

fn implementation_chunks(chunks: &[EntityChunk]) -> Vec<&EntityChunk> {
    chunks
        .iter()
        .filter(|c| c.chunk_type == ChunkType::Implementation)
        .collect()
}

#[test]
fn test_no_headers_no_chunks() {
    assert!(chunk("plain text without headers\n", Path::new("/d/plain.md")).is_empty());
}

#[test]
fn test_chunks_come_in_pairs_with_shared_name() {
    let source = format!("# Title\n\n{}\n", body(50));
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chunk_type, ChunkType::Implementation);
    assert_eq!(chunks[1].chunk_type, ChunkType::Metadata);
    assert_eq!(chunks[0].entity_name, chunks[1].entity_name);
    assert_ne!(chunks[0].id, chunks[1].id);
}

#[test]
fn test_one_h1_one_h2_small_bodies() {
    let source = format!("# One\n\n{}\n\n## Two\n\n{}\n", body(80), body(80));
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let groups = implementation_chunks(&chunks).len();
    assert!(groups == 1 || groups == 2, "got {groups} groups");
    if groups == 1 {
        let tokens = chunks[0].metadata.extra["token_count"].as_u64().unwrap() as usize;
        assert!(tokens <= AGGRESSIVE_TOKEN_BUDGET);
    }
}

#[test]
fn test_small_sections_group_and_large_sections_split() {
    let source = format!(
        "# Alpha\n\n{}\n\n## Beta\n\n{}\n\n## Gamma\n\n{}\n",
        body(500),
        body(80),
        paragraphs(8, 150),
    );
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let impls = implementation_chunks(&chunks);

    // Alpha and Beta share the first chunk.
    assert!(impls[0].content.contains("# Alpha"));
    assert!(impls[0].content.contains("## Beta"));

    // Gamma exceeded MAX and split into named parts.
    assert!(impls
        .iter()
        .any(|c| c.entity_name.contains("Gamma (Part")));

    // No chunk exceeds the hard budget.
    for chunk in &impls {
        let tokens = chunk.metadata.extra["token_count"].as_u64().unwrap() as usize;
        assert!(tokens <= MAX_CHUNK_TOKENS, "{} tokens", tokens);
    }

    // Every chunk after the first opens with the overlap marker.
    for chunk in &impls[1..] {
        assert!(
            chunk.content.starts_with("[Previous context: ..."),
            "chunk {} lacks overlap",
            chunk.entity_name
        );
    }
    assert!(!impls[0].content.starts_with("[Previous context:"));
}

#[test]
fn test_empty_headers_forward_merge() {
    let source = format!("# Empty\n\n## Filled\n\n{}\n", body(60));
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let impls = implementation_chunks(&chunks);
    assert_eq!(impls.len(), 1);
    assert!(impls[0].entity_name.contains("Filled"));
    assert!(impls[0].entity_name.contains("(+1 more)"));
}

#[test]
fn test_h1_ends_at_next_h2() {
    // The H1 body must not swallow the H2 section.
    let source = format!("# Top\n\n{}\n\n## Chapter\n\n{}\n", body(40), body(40));
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let impls = implementation_chunks(&chunks);
    let all: String = impls.iter().map(|c| c.content.as_str()).collect();
    assert!(all.contains("# Top"));
    assert!(all.contains("## Chapter"));
    // Headers list names both sections rather than one absorbing the other.
    let headers = &impls[0].metadata.extra["headers"];
    assert!(headers.as_array().unwrap().len() >= 1);
}

#[test]
fn test_overlap_slice_comes_from_previous_group() {
    let source = format!(
        "# First\n\n{}\n\n# Second\n\n{}\n",
        body(700),
        body(700)
    );
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let impls = implementation_chunks(&chunks);
    assert!(impls.len() >= 2);
    let marker_line = impls[1].content.lines().next().unwrap();
    assert!(marker_line.starts_with("[Previous context: ..."));
    assert!(marker_line.ends_with(']'));
    // The slice is bounded by the overlap budget plus the marker text.
    assert!(marker_line.chars().count() <= OVERLAP_CHARS + 25);
}

#[test]
fn test_overlap_markers_do_not_cascade() {
    let text = "[Previous context: ...older]\nReal content stays.";
    assert_eq!(strip_overlap_markers(text), "Real content stays.");

    let only_marker = "[Previous context: ...alone]";
    assert_eq!(strip_overlap_markers(only_marker), only_marker);

    let untouched = "No markers here.";
    assert_eq!(strip_overlap_markers(untouched), untouched);
}

#[test]
fn test_trailing_newline_preserved() {
    let source = format!("# Solo\n\n{}\n", body(60));
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    assert!(chunks[0].content.ends_with('\n'));

    let no_trailing = format!("# Solo\n\n{}", body(60));
    let chunks = chunk(&no_trailing, Path::new("/d/doc.md"));
    assert!(!chunks[0].content.ends_with('\n'));
}

#[test]
fn test_metadata_chunk_summary_shape() {
    let source = format!("# Doc\n\n{}\n", body(120));
    let chunks = chunk(&source, Path::new("/d/manual.md"));
    let metadata = &chunks[1];
    assert!(metadata.content.starts_with("Sections: Doc | Tokens: "));
    assert!(metadata.content.contains(" | Preview: "));
    assert!(metadata.content.contains(" | Lines: "));
    assert!(metadata.content.contains(" | Words: "));

    let bm25 = metadata.metadata.extra["content_bm25"].as_str().unwrap();
    assert!(bm25.contains("Section: Doc"));
    assert!(bm25.contains("File: manual.md"));
    assert!(bm25.contains("Keywords: "));
}

#[test]
fn test_sentence_split_boundary() {
    let parts = split_at_boundary(
        "First sentence ends here. Second one starts now.",
        Boundary::Sentence,
    );
    assert_eq!(
        parts,
        vec![
            "First sentence ends here.".to_string(),
            "Second one starts now.".to_string()
        ]
    );
}

#[test]
fn test_paragraph_split_boundary() {
    let parts = split_at_boundary("alpha beta\n\nGamma delta\n\nnot upper", Boundary::Paragraph);
    assert_eq!(
        parts,
        vec![
            "alpha beta".to_string(),
            "Gamma delta\n\nnot upper".to_string()
        ]
    );
}

#[test]
fn test_token_estimate_scale() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abcd"), 1);
    assert_eq!(estimate_tokens("abcdefgh"), 2);
    assert_eq!(estimate_tokens("abcde"), 2);
}

#[test]
fn test_ids_are_collision_resistant() {
    let source = format!(
        "# Same\n\n{}\n\n# Same\n\n{}\n",
        paragraphs(4, 200),
        paragraphs(4, 200)
    );
    let chunks = chunk(&source, Path::new("/d/doc.md"));
    let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), before);
}
