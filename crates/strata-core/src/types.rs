use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kinds of addressable code artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    File,
    Function,
    Class,
    Interface,
    Variable,
    Import,
    Documentation,
}

impl EntityType {
    /// Returns the lowercase string representation of this entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::Function => "function",
            EntityType::Class => "class",
            EntityType::Interface => "interface",
            EntityType::Variable => "variable",
            EntityType::Import => "import",
            EntityType::Documentation => "documentation",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed edges between entity names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Contains,
    Imports,
    Calls,
    Inherits,
}

impl RelationType {
    /// Returns the lowercase string representation of this relation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Contains => "contains",
            RelationType::Imports => "imports",
            RelationType::Calls => "calls",
            RelationType::Inherits => "inherits",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progressive-disclosure chunk tiers: cheap metadata vs full implementation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Metadata,
    Implementation,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Metadata => "metadata",
            ChunkType::Implementation => "implementation",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, addressable code artifact extracted from one file.
///
/// `name` is unique within its defining file and kind and is used as a
/// relation endpoint. `observations` are short human-readable facts, never
/// the full source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub observations: Vec<String>,
    pub file_path: PathBuf,
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Entity {
    /// Create the file entity that heads every parse result.
    pub fn file(
        path: &Path,
        entity_count: usize,
        content_type: &str,
        has_implementation: bool,
    ) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut metadata = BTreeMap::new();
        metadata.insert("parsing_method".to_string(), Value::from("tree-sitter"));
        metadata.insert("content_type".to_string(), Value::from(content_type));
        metadata.insert("entity_count".to_string(), Value::from(entity_count));
        metadata.insert(
            "has_implementation".to_string(),
            Value::from(has_implementation),
        );
        Entity {
            name: path.display().to_string(),
            entity_type: EntityType::File,
            observations: vec![
                format!("File: {file_name}"),
                format!("Content type: {content_type}"),
            ],
            file_path: path.to_path_buf(),
            line_number: 1,
            end_line_number: None,
            metadata,
        }
    }

    pub fn function(
        name: impl Into<String>,
        path: &Path,
        line_number: u32,
        end_line: u32,
        observations: Vec<String>,
    ) -> Self {
        Self::code_entity(
            name,
            EntityType::Function,
            path,
            line_number,
            end_line,
            observations,
        )
    }

    pub fn class(
        name: impl Into<String>,
        path: &Path,
        line_number: u32,
        end_line: u32,
        observations: Vec<String>,
    ) -> Self {
        Self::code_entity(
            name,
            EntityType::Class,
            path,
            line_number,
            end_line,
            observations,
        )
    }

    pub fn interface(
        name: impl Into<String>,
        path: &Path,
        line_number: u32,
        end_line: u32,
        observations: Vec<String>,
    ) -> Self {
        Self::code_entity(
            name,
            EntityType::Interface,
            path,
            line_number,
            end_line,
            observations,
        )
    }

    pub fn variable(
        name: impl Into<String>,
        path: &Path,
        line_number: u32,
        end_line: u32,
        observations: Vec<String>,
    ) -> Self {
        Self::code_entity(
            name,
            EntityType::Variable,
            path,
            line_number,
            end_line,
            observations,
        )
    }

    pub fn import(name: impl Into<String>, path: &Path, line_number: u32, end_line: u32) -> Self {
        let name = name.into();
        let observations = vec![
            format!("Import: {name}"),
            format!("In file: {}", path.display()),
            format!("Line: {line_number}"),
        ];
        Self::code_entity(
            name,
            EntityType::Import,
            path,
            line_number,
            end_line,
            observations,
        )
    }

    pub fn documentation(
        name: impl Into<String>,
        path: &Path,
        line_number: u32,
        observations: Vec<String>,
    ) -> Self {
        Entity {
            name: name.into(),
            entity_type: EntityType::Documentation,
            observations,
            file_path: path.to_path_buf(),
            line_number,
            end_line_number: None,
            metadata: BTreeMap::new(),
        }
    }

    fn code_entity(
        name: impl Into<String>,
        entity_type: EntityType,
        path: &Path,
        line_number: u32,
        end_line: u32,
        observations: Vec<String>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), Value::from("tree-sitter"));
        Entity {
            name: name.into(),
            entity_type,
            observations,
            file_path: path.to_path_buf(),
            line_number,
            end_line_number: Some(end_line),
            metadata,
        }
    }

    /// Attach a metadata key, replacing any existing value.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A directed typed edge between entity names.
///
/// No foreign-key integrity is enforced at emit time; the linker prunes
/// CALLS edges against the known-names universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from_entity: String,
    pub to_entity: String,
    pub relation_type: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Relation {
    pub fn contains(from: impl Into<String>, to: impl Into<String>) -> Self {
        Relation {
            from_entity: from.into(),
            to_entity: to.into(),
            relation_type: RelationType::Contains,
            context: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn imports(from: impl Into<String>, to: impl Into<String>, import_type: &str) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("import_type".to_string(), Value::from(import_type));
        Relation {
            from_entity: from.into(),
            to_entity: to.into(),
            relation_type: RelationType::Imports,
            context: None,
            metadata,
        }
    }

    pub fn calls(
        from: impl Into<String>,
        to: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Relation {
            from_entity: from.into(),
            to_entity: to.into(),
            relation_type: RelationType::Calls,
            context: Some(context.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn inherits(subclass: impl Into<String>, superclass: impl Into<String>) -> Self {
        Relation {
            from_entity: subclass.into(),
            to_entity: superclass.into(),
            relation_type: RelationType::Inherits,
            context: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The `import_type` metadata tag, if this is an IMPORTS relation.
    pub fn import_type(&self) -> Option<&str> {
        self.metadata.get("import_type").and_then(Value::as_str)
    }
}

/// Semantic annotations attached to implementation chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticMetadata {
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub imports_used: Vec<String>,
    #[serde(default)]
    pub exceptions_handled: Vec<String>,
    #[serde(default)]
    pub complexity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_types: Option<BTreeMap<String, String>>,
}

/// Per-chunk metadata. `extra` flattens parser-specific keys
/// (section headers, token counts, content types, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub entity_type: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_metadata: Option<SemanticMetadata>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    pub fn new(entity_type: &str, file_path: &Path, start_line: u32, end_line: u32) -> Self {
        ChunkMetadata {
            entity_type: entity_type.to_string(),
            file_path: file_path.display().to_string(),
            start_line,
            end_line,
            semantic_metadata: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_semantic(mut self, semantic: SemanticMetadata) -> Self {
        self.semantic_metadata = Some(semantic);
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// The searchable content unit associated with an entity.
///
/// `implementation` chunks carry literal source text; `metadata` chunks a
/// short curated summary for cheap retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChunk {
    pub id: String,
    pub entity_name: String,
    pub chunk_type: ChunkType,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Result of parsing one file. Never mutated after the parser returns it.
///
/// Field order matches the on-disk cache schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: PathBuf,
    pub parsing_time: f64,
    pub file_hash: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub implementation_chunks: Vec<EntityChunk>,
    /// Set instead of `entities` when handed off via streaming callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities_created: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_chunks_created: Option<usize>,
}

impl ParseResult {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        ParseResult {
            file_path: file_path.into(),
            parsing_time: 0.0,
            file_hash: String::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            entities: Vec::new(),
            relations: Vec::new(),
            implementation_chunks: Vec::new(),
            entities_created: None,
            implementation_chunks_created: None,
        }
    }

    /// Parsing succeeded iff no errors accumulated. Warnings do not count.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<EntityChunk>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<Vec<EntityChunk>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_roundtrip() {
        for (ty, expected) in [
            (EntityType::File, "\"file\""),
            (EntityType::Function, "\"function\""),
            (EntityType::Class, "\"class\""),
            (EntityType::Interface, "\"interface\""),
            (EntityType::Variable, "\"variable\""),
            (EntityType::Import, "\"import\""),
            (EntityType::Documentation, "\"documentation\""),
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, expected);
            let parsed: EntityType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_relation_type_display() {
        assert_eq!(RelationType::Contains.to_string(), "contains");
        assert_eq!(RelationType::Imports.to_string(), "imports");
        assert_eq!(RelationType::Calls.to_string(), "calls");
        assert_eq!(RelationType::Inherits.to_string(), "inherits");
    }

    #[test]
    fn test_file_entity_metadata() {
        let entity = Entity::file(Path::new("/proj/src/app.py"), 3, "code", true);
        assert_eq!(entity.entity_type, EntityType::File);
        assert_eq!(entity.name, "/proj/src/app.py");
        assert_eq!(entity.line_number, 1);
        assert_eq!(entity.metadata["entity_count"], Value::from(3));
        assert_eq!(entity.metadata["has_implementation"], Value::from(true));
        assert_eq!(entity.metadata["parsing_method"], Value::from("tree-sitter"));
    }

    #[test]
    fn test_imports_relation_carries_type() {
        let rel = Relation::imports("a.py", "data.txt", "file_open");
        assert_eq!(rel.relation_type, RelationType::Imports);
        assert_eq!(rel.import_type(), Some("file_open"));
    }

    #[test]
    fn test_parse_result_success_ignores_warnings() {
        let mut result = ParseResult::new("/proj/a.py");
        result.warnings.push("Syntax errors detected in a.py".to_string());
        assert!(result.success());
        result.errors.push("Parsing failed".to_string());
        assert!(!result.success());
    }

    #[test]
    fn test_parse_result_serde_roundtrip() {
        let mut result = ParseResult::new("/proj/a.py");
        result.file_hash = "abc123def4567890".to_string();
        result.parsing_time = 0.042;
        result.entities.push(Entity::function(
            "run",
            Path::new("/proj/a.py"),
            3,
            9,
            vec!["Purpose: Runs the thing.".to_string()],
        ));
        result.relations.push(Relation::contains("/proj/a.py", "run"));
        result.implementation_chunks.push(EntityChunk {
            id: "id".to_string(),
            entity_name: "run".to_string(),
            chunk_type: ChunkType::Implementation,
            content: "def run():\n    pass".to_string(),
            metadata: ChunkMetadata::new("function", Path::new("/proj/a.py"), 3, 9)
                .with_semantic(SemanticMetadata {
                    calls: vec!["helper".to_string()],
                    complexity: 2,
                    ..Default::default()
                }),
        });

        let json = serde_json::to_string(&result).unwrap();
        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_null_implementation_chunks_deserialize_empty() {
        let json = r#"{
            "file_path": "/proj/a.py",
            "parsing_time": 0.0,
            "file_hash": "",
            "errors": [],
            "warnings": [],
            "entities": [],
            "relations": [],
            "implementation_chunks": null
        }"#;
        let result: ParseResult = serde_json::from_str(json).unwrap();
        assert!(result.implementation_chunks.is_empty());
    }

    #[test]
    fn test_chunk_metadata_extra_flattens() {
        let meta = ChunkMetadata::new("documentation", Path::new("/doc.md"), 1, 10)
            .with_extra("section_type", "markdown_section")
            .with_extra("token_count", 42);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["section_type"], "markdown_section");
        assert_eq!(json["token_count"], 42);
        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
