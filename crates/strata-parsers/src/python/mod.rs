//! Python entity, relation, and chunk extraction.

use std::path::{Path, PathBuf};
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Language, Node};

use strata_core::chunk_id::chunk_id;
use strata_core::hash::content_hash;
use strata_core::types::{
    ChunkMetadata, ChunkType, Entity, EntityChunk, ParseResult, Relation, SemanticMetadata,
};

use crate::linker;
use crate::observations;
use crate::treesitter::{
    end_line, has_syntax_errors, node_lines, node_text, parse_source, start_line,
};
use crate::{LanguageParser, ParseContext};

/// Call targets mapping to file-operation import tags, exact callee match.
const EXACT_FILE_OPS: &[(&str, &str)] = &[
    ("json.load", "json_load"),
    ("json.dump", "json_write"),
    ("json.loads", "json_parse"),
    ("yaml.load", "yaml_load"),
    ("yaml.dump", "yaml_write"),
    ("pickle.load", "pickle_load"),
    ("pickle.dump", "pickle_write"),
    ("csv.reader", "csv_read"),
    ("csv.writer", "csv_write"),
    ("pandas.read_json", "pandas_json_read"),
    ("pandas.read_csv", "pandas_csv_read"),
    ("pandas.read_excel", "pandas_excel_read"),
    ("pd.read_json", "pandas_json_read"),
    ("pd.read_csv", "pandas_csv_read"),
    ("pd.read_excel", "pandas_excel_read"),
    ("requests.get", "requests_get"),
    ("requests.post", "requests_post"),
    ("urllib.request.urlopen", "urllib_open"),
    ("configparser.read", "config_ini_read"),
    ("toml.load", "toml_read"),
    ("xml.etree.ElementTree.parse", "xml_parse"),
];

/// Method suffixes mapping to file-operation import tags.
const METHOD_FILE_OPS: &[(&str, &str)] = &[
    (".to_json", "pandas_json_write"),
    (".to_csv", "pandas_csv_write"),
    (".to_excel", "pandas_excel_write"),
    (".read_text", "path_read_text"),
    (".read_bytes", "path_read_bytes"),
    (".write_text", "path_write_text"),
    (".write_bytes", "path_write_bytes"),
];

/// File-mode tokens that must never become relation targets.
const FILE_MODES: &[&str] = &[
    "r", "w", "a", "x", "b", "t", "rb", "wb", "ab", "rt", "wt", "at", "r+", "w+", "a+", "x+",
];

const COMPLEXITY_KEYWORDS: &[&str] = &["if", "elif", "for", "while", "try", "except", "with"];

/// Lexical scope tracked during entity extraction. Variables are only
/// entities at module (and class-body) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Class,
    Function,
    Block,
}

/// Tree-sitter based parser for `.py` files.
pub struct PythonParser {
    project_root: PathBuf,
}

impl PythonParser {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        PythonParser {
            project_root: project_root.into(),
        }
    }

    fn language() -> Language {
        tree_sitter_python::LANGUAGE.into()
    }
}

impl LanguageParser for PythonParser {
    fn supported_extensions(&self) -> &[&str] {
        &["py"]
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

        let tree = match parse_source(&Self::language(), &source) {
            Ok(t) => t,
            Err(e) => {
                result.errors.push(format!("Parsing failed: {e}"));
                result.parsing_time = started.elapsed().as_secs_f64();
                return result;
            }
        };
        if has_syntax_errors(&tree) {
            result
                .warnings
                .push(format!("Syntax errors detected in {file_name}"));
        }

        let root = tree.root_node();
        let mut entities = Vec::new();
        extract_entities(root, &source, path, Scope::Module, &mut entities);

        let mut relations = inheritance_relations(root, &source);
        relations.extend(import_relations(root, &source, path, &self.project_root));
        relations.extend(file_operation_relations(root, &source, path));

        let chunks = implementation_chunks(root, &source, path);

        let file_entity = Entity::file(path, entities.len(), "code", !chunks.is_empty());
        entities.insert(0, file_entity);

        let file_key = path.display().to_string();
        relations.extend(linker::containment_relations(&file_key, &entities));
        relations.extend(linker::calls_relations(
            &chunks,
            &entities,
            ctx.global_entity_names,
            &file_name,
        ));

        result.entities = entities;
        result.relations = relations;
        result.implementation_chunks = chunks;
        result.parsing_time = started.elapsed().as_secs_f64();
        result
    }
}

fn extract_entities(
    node: Node<'_>,
    source: &str,
    path: &Path,
    scope: Scope,
    out: &mut Vec<Entity>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let observations = observations::function_observations(node, source);
                out.push(Entity::function(
                    node_text(name_node, source),
                    path,
                    start_line(node),
                    end_line(node),
                    observations,
                ));
            }
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let observations = observations::class_observations(node, source);
                out.push(Entity::class(
                    node_text(name_node, source),
                    path,
                    start_line(node),
                    end_line(node),
                    observations,
                ));
            }
        }
        "assignment" if scope != Scope::Function && scope != Scope::Block => {
            out.extend(variables_from_assignment(node, source, path));
        }
        "named_expression" if scope != Scope::Function => {
            out.extend(variable_from_walrus(node, source, path));
        }
        "import_statement" | "import_from_statement" => {
            if let Some(name) = import_entity_name(node, source) {
                out.push(Entity::import(name, path, start_line(node), end_line(node)));
            }
        }
        _ => {}
    }

    let child_scope = match node.kind() {
        "function_definition" => Scope::Function,
        "class_definition" => Scope::Class,
        "with_statement" | "try_statement" | "except_clause" | "finally_clause" => Scope::Block,
        _ => scope,
    };
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        extract_entities(child, source, path, child_scope, out);
    }
}

/// Expand an assignment target into one VARIABLE entity per leaf identifier.
/// Type-only annotations (`x: int` with no `=`) are skipped.
fn variables_from_assignment(node: Node<'_>, source: &str, path: &Path) -> Vec<Entity> {
    let text = node_text(node, source);
    if text.contains(':') && !text.contains('=') {
        return Vec::new();
    }

    let line = start_line(node);
    let end = end_line(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "identifier"
                | "pattern_list"
                | "list_pattern"
                | "list_splat_pattern"
                | "parenthesized_expression"
                | "tuple_pattern"
        ) {
            let mut names = Vec::new();
            collect_pattern_identifiers(child, source, &mut names);
            return names
                .into_iter()
                .map(|name| {
                    let observations = vec![
                        format!("Variable: {name}"),
                        format!("Defined in: {}", path.display()),
                        format!("Line: {line}"),
                    ];
                    Entity::variable(name, path, line, end, observations)
                })
                .collect();
        }
    }
    Vec::new()
}

fn collect_pattern_identifiers(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" => out.push(node_text(node, source).to_string()),
        "pattern_list" | "list_pattern" | "parenthesized_expression" | "tuple_pattern" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if !matches!(child.kind(), "," | "(" | ")" | "[" | "]") {
                    collect_pattern_identifiers(child, source, out);
                }
            }
        }
        "list_splat_pattern" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "identifier" {
                    out.push(node_text(child, source).to_string());
                }
            }
        }
        _ => {}
    }
}

fn variable_from_walrus(node: Node<'_>, source: &str, path: &Path) -> Option<Entity> {
    let line = start_line(node);
    let end = end_line(node);
    let mut cursor = node.walk();
    let name_node = node.children(&mut cursor).find(|c| c.kind() == "identifier")?;
    let name = node_text(name_node, source).to_string();
    let observations = vec![
        format!("Variable: {name}"),
        format!("Walrus operator assignment in: {}", path.display()),
        format!("Line: {line}"),
    ];
    Some(Entity::variable(name, path, line, end, observations))
}

fn import_entity_name(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => return Some(node_text(child, source).to_string()),
            "aliased_import" => {
                let mut inner = child.walk();
                for grandchild in child.children(&mut inner) {
                    if grandchild.kind() == "dotted_name" {
                        return Some(node_text(grandchild, source).to_string());
                    }
                }
            }
            "relative_import" => return Some(node_text(child, source).to_string()),
            "identifier" => return Some(node_text(child, source).to_string()),
            _ => {}
        }
    }
    None
}

/// INHERITS relations from class bases (identifiers or dotted attributes).
fn inheritance_relations(root: Node<'_>, source: &str) -> Vec<Relation> {
    let mut relations = Vec::new();
    for class_node in crate::treesitter::find_nodes_by_kind(root, &["class_definition"]) {
        let Some(name_node) = class_node.child_by_field_name("name") else {
            continue;
        };
        let class_name = node_text(name_node, source);
        let mut cursor = class_node.walk();
        for child in class_node.children(&mut cursor) {
            if child.kind() != "argument_list" {
                continue;
            }
            let mut inner = child.walk();
            for arg in child.children(&mut inner) {
                if matches!(arg.kind(), "identifier" | "attribute") {
                    relations.push(Relation::inherits(class_name, node_text(arg, source)));
                }
            }
        }
    }
    relations
}

/// IMPORTS relations for modules internal to the project.
fn import_relations(
    root: Node<'_>,
    source: &str,
    path: &Path,
    project_root: &Path,
) -> Vec<Relation> {
    let file_key = path.display().to_string();
    let mut relations = Vec::new();

    for node in
        crate::treesitter::find_nodes_by_kind(root, &["import_statement", "import_from_statement"])
    {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    let module = match child.kind() {
                        "dotted_name" => Some(node_text(child, source).to_string()),
                        "aliased_import" => {
                            let mut inner = child.walk();
                            let result = child
                                .children(&mut inner)
                                .find(|g| g.kind() == "dotted_name")
                                .map(|g| node_text(g, source).to_string());
                            result
                        }
                        _ => None,
                    };
                    if let Some(module) = module {
                        if is_internal_import(&module, project_root) {
                            relations.push(Relation::imports(&file_key, module, "module"));
                        }
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = from_import_module(node, source) {
                    if is_internal_import(&module, project_root) {
                        relations.push(Relation::imports(&file_key, module, "module"));
                    }
                }
            }
            _ => {}
        }
    }
    relations
}

fn from_import_module(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for (i, child) in children.iter().enumerate() {
        match child.kind() {
            "dotted_name" => return Some(node_text(*child, source).to_string()),
            "relative_import" => {
                let dots = node_text(*child, source).to_string();
                if let Some(next) = children.get(i + 1) {
                    if next.kind() == "dotted_name" {
                        return Some(format!("{dots}{}", node_text(*next, source)));
                    }
                }
                return Some(dots);
            }
            _ => {}
        }
    }
    None
}

/// A module is internal if it is relative, or if its first path component
/// resolves to a file or package under the project root.
fn is_internal_import(module: &str, project_root: &Path) -> bool {
    if module.starts_with('.') {
        return true;
    }
    if module.starts_with('_') {
        return false;
    }

    let parts: Vec<&str> = module.split('.').collect();
    let base = parts[0];
    let base_dir = project_root.join(base);
    let base_file = project_root.join(format!("{base}.py"));
    if !base_dir.exists() && !base_file.exists() {
        return false;
    }

    if parts.len() > 1 {
        let mut module_file = project_root.to_path_buf();
        for part in &parts[..parts.len() - 1] {
            module_file.push(part);
        }
        module_file.push(format!("{}.py", parts[parts.len() - 1]));
        if module_file.exists() {
            return true;
        }

        let mut package_init = project_root.to_path_buf();
        for part in &parts {
            package_init.push(part);
        }
        package_init.push("__init__.py");
        return package_init.exists();
    }
    true
}

/// IMPORTS relations for file operations: calls from the known table whose
/// first string-literal argument is not a file-mode token.
fn file_operation_relations(root: Node<'_>, source: &str, path: &Path) -> Vec<Relation> {
    let file_key = path.display().to_string();
    let mut relations = Vec::new();

    for call in crate::treesitter::find_nodes_by_kind(root, &["call"]) {
        let Some(func) = call.child_by_field_name("function") else {
            continue;
        };
        let Some(args) = call.child_by_field_name("arguments") else {
            continue;
        };
        let func_text = node_text(func, source);

        if func_text == "open" {
            // First string literal only; later strings are mode arguments.
            if let Some(target) = first_string_argument(args, source) {
                relations.push(Relation::imports(&file_key, target, "file_open"));
            }
            continue;
        }

        // Path("cfg.json").open() resolves to the constructor's argument.
        if func.kind() == "attribute" && func_text.ends_with(".open") && func_text.contains("Path")
        {
            if let Some(object) = func.child_by_field_name("object") {
                if object.kind() == "call" {
                    let constructor = object
                        .child_by_field_name("function")
                        .map(|f| node_text(f, source))
                        .unwrap_or("");
                    if constructor.contains("Path") {
                        if let Some(inner_args) = object.child_by_field_name("arguments") {
                            if let Some(target) = first_string_argument(inner_args, source) {
                                relations.push(Relation::imports(&file_key, target, "path_open"));
                            }
                        }
                    }
                }
            }
            continue;
        }

        if let Some((_, tag)) = EXACT_FILE_OPS.iter().find(|(name, _)| *name == func_text) {
            if let Some(target) = first_string_argument(args, source) {
                relations.push(Relation::imports(&file_key, target, tag));
            }
            continue;
        }

        if func.kind() == "attribute" {
            if let Some(attr) = func.child_by_field_name("attribute") {
                let method = format!(".{}", node_text(attr, source));
                if let Some((_, tag)) = METHOD_FILE_OPS.iter().find(|(name, _)| *name == method) {
                    if let Some(target) = first_string_argument(args, source) {
                        relations.push(Relation::imports(&file_key, target, tag));
                    }
                }
            }
        }
    }
    relations
}

fn first_string_argument(args: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = args.walk();
    for arg in args.children(&mut cursor) {
        if arg.kind() == "string" {
            let literal = string_literal(arg, source)?;
            if FILE_MODES.contains(&literal.as_str()) {
                return None;
            }
            return Some(literal);
        }
    }
    None
}

fn string_literal(node: Node<'_>, source: &str) -> Option<String> {
    let text = node_text(node, source);
    let stripped = if (text.starts_with("\"\"\"") && text.ends_with("\"\"\"") && text.len() >= 6)
        || (text.starts_with("'''") && text.ends_with("'''") && text.len() >= 6)
    {
        &text[3..text.len() - 3]
    } else if (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
        || (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
    {
        &text[1..text.len() - 1]
    } else {
        return None;
    };
    Some(stripped.to_string())
}

/// Implementation chunks with semantic metadata for every function and class.
fn implementation_chunks(root: Node<'_>, source: &str, path: &Path) -> Vec<EntityChunk> {
    let lines: Vec<&str> = source.lines().collect();
    let mut chunks = Vec::new();
    collect_chunks(root, source, &lines, path, &mut chunks);
    chunks
}

fn collect_chunks(
    node: Node<'_>,
    source: &str,
    lines: &[&str],
    path: &Path,
    out: &mut Vec<EntityChunk>,
) {
    if matches!(node.kind(), "function_definition" | "class_definition") {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = node_text(name_node, source);
            let entity_type = if node.kind() == "function_definition" {
                "function"
            } else {
                "class"
            };
            let start = start_line(node);
            let end = end_line(node);
            let implementation = node_lines(node, lines).join("\n");

            let semantic = SemanticMetadata {
                calls: calls_from_source(&implementation, entity_type == "class"),
                imports_used: imports_used_in_source(&implementation),
                exceptions_handled: exceptions_from_source(&implementation),
                complexity: complexity_from_source(&implementation),
                inferred_types: None,
            };

            out.push(EntityChunk {
                id: chunk_id(path, entity_type, name, "implementation", start, end),
                entity_name: name.to_string(),
                chunk_type: ChunkType::Implementation,
                content: implementation,
                metadata: ChunkMetadata::new(entity_type, path, start, end).with_semantic(semantic),
            });
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_chunks(child, source, lines, path, out);
    }
}

/// Callee names scanned from a source slice. Definition lines are filtered
/// out; class slices additionally exclude method bodies so calls are not
/// double-counted against per-method chunks.
fn calls_from_source(source: &str, is_class: bool) -> Vec<String> {
    static CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*\(").unwrap());

    let filtered: Vec<&str> = if is_class {
        let mut kept = Vec::new();
        let mut in_method = false;
        let mut method_indent = 0usize;
        for line in source.lines() {
            let stripped = line.trim_start();
            let indent = line.len() - stripped.len();
            if stripped.starts_with("def ") {
                in_method = true;
                method_indent = indent;
                continue;
            }
            if in_method && indent > method_indent {
                continue;
            }
            if in_method && indent <= method_indent && !stripped.is_empty() {
                in_method = false;
            }
            if !in_method {
                kept.push(line);
            }
        }
        kept
    } else {
        source
            .lines()
            .filter(|line| !line.trim_start().starts_with("def "))
            .collect()
    };

    let joined = filtered.join("\n");
    let mut calls = Vec::new();
    for caps in CALL.captures_iter(&joined) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !calls.contains(&name) {
                calls.push(name);
            }
        }
    }
    calls
}

fn imports_used_in_source(source: &str) -> Vec<String> {
    static MODULE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\.(\w+)").unwrap());
    let mut used = Vec::new();
    for caps in MODULE_ATTR.captures_iter(source) {
        let pair = format!(
            "{}.{}",
            caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            caps.get(2).map(|m| m.as_str()).unwrap_or("")
        );
        if !used.contains(&pair) {
            used.push(pair);
        }
    }
    used
}

fn exceptions_from_source(source: &str) -> Vec<String> {
    static EXCEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"except\s+(\w+)").unwrap());
    let mut exceptions = Vec::new();
    for caps in EXCEPT.captures_iter(source) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !exceptions.contains(&name) {
                exceptions.push(name);
            }
        }
    }
    exceptions
}

fn complexity_from_source(source: &str) -> u32 {
    let mut complexity = 1u32;
    for keyword in COMPLEXITY_KEYWORDS {
        complexity += source.matches(&format!(" {keyword} ")).count() as u32;
        complexity += source.matches(&format!("\n{keyword} ")).count() as u32;
    }
    complexity
}
