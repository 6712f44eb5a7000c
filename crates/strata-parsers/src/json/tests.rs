use std::fs;
use std::sync::Mutex;

use super::*;
use strata_core::types::{EntityType, RelationType};

fn parse_named(source: &str, name: &str, config: IndexerConfig) -> (tempfile::TempDir, ParseResult) {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(name);
    fs::write(&file, source).unwrap();
    let parser = JsonParser::new(config);
    let result = parser.parse(&file, &ParseContext::default());
    (dir, result)
}

fn content_config() -> IndexerConfig {
    IndexerConfig {
        content_only: true,
        ..Default::default()
    }
}

#[test]
fn test_package_json_dependencies() {
    let source = r#"{
  "name": "demo",
  "dependencies": { "react": "^18", "left-pad": "1.3" },
  "devDependencies": { "jest": "^29" }
}"#;
    let (_dir, result) = parse_named(source, "package.json", IndexerConfig::default());
    let deps: Vec<&str> = result
        .relations
        .iter()
        .filter(|r| r.import_type() == Some("npm_dependency"))
        .map(|r| r.to_entity.as_str())
        .collect();
    assert_eq!(deps, vec!["react", "left-pad", "jest"]);
    assert!(result
        .relations
        .iter()
        .all(|r| r.relation_type == RelationType::Imports));
}

#[test]
fn test_tsconfig_compiler_options() {
    let source = r#"{ "compilerOptions": { "strict": true } }"#;
    let (_dir, result) = parse_named(source, "tsconfig.json", IndexerConfig::default());
    assert!(result
        .entities
        .iter()
        .any(|e| e.name == "TypeScript Compiler Options"
            && e.entity_type == EntityType::Documentation));
}

#[test]
fn test_generic_structure_dotted_paths() {
    let source = r#"{
  "server": {
    "host": "localhost",
    "ports": [80, 443]
  },
  "debug": true
}"#;
    let (_dir, result) = parse_named(source, "config.json", IndexerConfig::default());
    let docs: Vec<&str> = result
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Documentation)
        .map(|e| e.name.as_str())
        .collect();
    assert!(docs.contains(&"server"));
    assert!(docs.contains(&"server.host"));
    assert!(docs.contains(&"server.ports"));
    assert!(docs.contains(&"server.ports[]"));
    assert!(docs.contains(&"debug"));

    // Top-level keys chain to the file; nested keys to their parent.
    let file_key = result.entities[0].name.clone();
    assert!(result.relations.iter().any(|r| {
        r.relation_type == RelationType::Contains
            && r.from_entity == file_key
            && r.to_entity == "server"
    }));
    assert!(result.relations.iter().any(|r| {
        r.relation_type == RelationType::Contains
            && r.from_entity == "server"
            && r.to_entity == "server.host"
    }));
    assert!(result.relations.iter().any(|r| {
        r.relation_type == RelationType::Contains
            && r.from_entity == "server.ports"
            && r.to_entity == "server.ports[]"
    }));
}

#[test]
fn test_structural_chunk_holds_full_document() {
    let source = "{\n  \"a\": 1\n}\n";
    let (_dir, result) = parse_named(source, "data.json", IndexerConfig::default());
    assert_eq!(result.implementation_chunks.len(), 1);
    assert_eq!(result.implementation_chunks[0].content, source);
    assert_eq!(result.implementation_chunks[0].metadata.entity_type, "json_file");
}

#[test]
fn test_malformed_json_reports_warning_structurally() {
    let source = "{ \"a\": 1, }";
    let (_dir, result) = parse_named(source, "broken.json", IndexerConfig::default());
    assert!(result.success());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("JSON syntax errors")));
}

#[test]
fn test_content_items_extracted() {
    let source = r#"{
  "posts": [
    { "title": "First Post", "content": "Hello world, this is the first post." },
    { "title": "Second", "body": "More text here.", "author": "alice" }
  ]
}"#;
    let (_dir, result) = parse_named(source, "forum.json", content_config());
    let docs: Vec<&Entity> = result
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Documentation)
        .collect();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].name, "post_1_First Post");
    assert_eq!(docs[1].name, "post_2_Second");

    let chunk = &result.implementation_chunks[0];
    assert!(chunk.content.starts_with("Title: First Post"));
    assert!(chunk.content.contains("Hello world"));
    let second = &result.implementation_chunks[1];
    assert!(second.content.contains("Author: alice"));
}

#[test]
fn test_content_item_names_prefer_chunk_number_then_id() {
    let source = r#"{
  "chunks": [
    { "chunk_number": 7, "text": "Chapter body." },
    { "id": 42, "text": "Identified body." },
    { "text": "Plain body." }
  ]
}"#;
    let (_dir, result) = parse_named(source, "book.json", content_config());
    let names: Vec<&str> = result
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Documentation)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["chunk_7", "chunk_42", "chunk_3"]);
}

#[test]
fn test_nested_replies_included() {
    let source = r#"{
  "topics": [
    {
      "title": "Thread",
      "content": "Opening question.",
      "replies": [
        { "content": "First answer." },
        { "content": "Second answer." }
      ]
    }
  ]
}"#;
    let (_dir, result) = parse_named(source, "threads.json", content_config());
    let chunk = &result.implementation_chunks[0];
    assert!(chunk.content.contains("--- Replies/Comments ---"));
    assert!(chunk.content.contains("Reply 1: First answer."));
    assert!(chunk.content.contains("Reply 2: Second answer."));
}

#[test]
fn test_max_content_items_cap() {
    let source = r#"{
  "items": [
    { "text": "one one one" },
    { "text": "two two two" },
    { "text": "three three three" }
  ]
}"#;
    let config = IndexerConfig {
        content_only: true,
        max_content_items: 2,
        ..Default::default()
    };
    let (_dir, result) = parse_named(source, "items.json", config);
    assert_eq!(result.implementation_chunks.len(), 2);
}

#[test]
fn test_no_content_falls_back_to_full_chunk() {
    let source = r#"{ "metadata": { "version": 3 } }"#;
    let (_dir, result) = parse_named(source, "other.json", content_config());
    assert_eq!(result.implementation_chunks.len(), 1);
    assert_eq!(result.implementation_chunks[0].content, source);
}

#[test]
fn test_markup_stripping() {
    let stripped = strip_markup(
        "<p>Hello <b>world</b></p><script>alert(1)</script><style>.x{}</style>\
         <?php echo \"hi\"; ?><li>item</li>More &amp; more&nbsp;text",
    );
    assert!(stripped.contains("Hello world"));
    assert!(!stripped.contains("alert"));
    assert!(!stripped.contains(".x{}"));
    assert!(!stripped.contains("php"));
    assert!(stripped.contains("\u{2022} item"));
    assert!(stripped.contains("More & more text"));
}

#[test]
fn test_content_mode_strips_markup() {
    let source = r#"{
  "articles": [
    { "title": "Styled", "content": "<p>Readable <script>bad()</script>text</p>" }
  ]
}"#;
    let (_dir, result) = parse_named(source, "articles.json", content_config());
    let chunk = &result.implementation_chunks[0];
    assert!(chunk.content.contains("Readable text"));
    assert!(!chunk.content.contains("bad()"));
}

#[test]
fn test_streaming_batches_flush_through_callback() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("feed.json");

    let mut items = Vec::new();
    for i in 0..2500 {
        items.push(serde_json::json!({
            "title": format!("Post {i}"),
            "content": format!("Body of post number {i}, long enough to matter.")
        }));
    }
    let doc = serde_json::json!({ "posts": items });
    fs::write(&file, serde_json::to_string(&doc).unwrap()).unwrap();

    let batches: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
    let callback = |entities: &[Entity], _relations: &[Relation], chunks: &[EntityChunk]| {
        batches.lock().unwrap().push((entities.len(), chunks.len()));
        true
    };

    let parser = JsonParser::new(content_config());
    let ctx = ParseContext {
        batch_callback: Some(&callback),
        ..Default::default()
    };
    let result = parser.parse(&file, &ctx);

    // Streamed results return only counters.
    assert!(result.entities.is_empty());
    assert!(result.implementation_chunks.is_empty());
    assert_eq!(result.implementation_chunks_created, Some(2500));
    assert_eq!(result.entities_created, Some(2501));

    let seen = batches.lock().unwrap();
    // File entity flushes first, then two full batches and a remainder.
    assert_eq!(seen[0], (1, 0));
    assert_eq!(seen[1], (1000, 1000));
    assert_eq!(seen[2], (1000, 1000));
    assert_eq!(seen[3], (500, 500));
}

#[test]
fn test_streaming_empty_collection_records_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("empty.json");
    fs::write(&file, r#"{ "unrelated": [] }"#).unwrap();

    let callback =
        |_e: &[Entity], _r: &[Relation], _c: &[EntityChunk]| true;
    let parser = JsonParser::new(content_config());
    let ctx = ParseContext {
        batch_callback: Some(&callback),
        ..Default::default()
    };
    let result = parser.parse(&file, &ctx);
    assert!(result
        .errors
        .iter()
        .any(|e| e.contains("No content items found")));
    assert_eq!(result.entities_created, Some(1));
}

#[test]
fn test_extension_dispatch() {
    let parser = JsonParser::new(IndexerConfig::default());
    assert!(parser.can_parse(Path::new("package.json")));
    assert!(!parser.can_parse(Path::new("data.yaml")));
}
