//! JavaScript and TypeScript entity, relation, and chunk extraction.
//!
//! One parser covers `.js/.jsx/.mjs/.cjs` (JavaScript grammar), `.ts`
//! (TypeScript grammar), and `.tsx` (TSX grammar).

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
    end_line, find_nodes_by_kind, has_syntax_errors, node_text, parse_source, start_line,
};
use crate::{LanguageParser, ParseContext};

/// Runtime modules that are always external, even when a project directory
/// shadows the name.
const WELL_KNOWN_EXTERNAL: &[&str] = &[
    "fs",
    "path",
    "os",
    "crypto",
    "http",
    "https",
    "url",
    "child_process",
    "dotenv",
    "express",
    "react",
    "vue",
];

/// Loop counters and scratch names never worth indexing.
const SKIPPED_VARIABLE_NAMES: &[&str] = &[
    "i", "j", "k", "index", "item", "key", "value", "temp", "tmp",
];

/// Single-character names allowed despite their length (math-ish locals).
const SHORT_NAME_ALLOWLIST: &[&str] = &[
    "x", "y", "z", "a", "b", "c", "d", "e", "f", "g", "h", "n", "m", "p", "q", "r", "s", "t", "u",
    "v", "w",
];

/// Node kinds that open a function or block scope; variables inside them
/// are not module-level entities.
const SCOPE_KINDS: &[&str] = &[
    "function_declaration",
    "arrow_function",
    "function_expression",
    "method_definition",
    "for_statement",
    "for_in_statement",
    "for_of_statement",
    "while_statement",
    "if_statement",
    "statement_block",
    "try_statement",
    "catch_clause",
    "switch_statement",
    "case_clause",
];

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "arrow_function",
    "function_expression",
    "method_definition",
];

const COMPLEXITY_TOKENS: &[&str] = &[
    "if", "else if", "for", "while", "case", "catch", "?", "&&", "||",
];

/// Resolvable source extensions for the internal-import check.
const RESOLVABLE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "json"];

/// Tree-sitter based parser for JavaScript and TypeScript files.
pub struct JavaScriptParser {
    project_root: PathBuf,
}

impl JavaScriptParser {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        JavaScriptParser {
            project_root: project_root.into(),
        }
    }

    fn language_for(path: &Path) -> Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Some("tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl LanguageParser for JavaScriptParser {
    fn supported_extensions(&self) -> &[&str] {
        &["js", "jsx", "ts", "tsx", "mjs", "cjs"]
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

        let language = Self::language_for(path);
        let tree = match parse_source(&language, &source) {
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
        let mut chunks = Vec::new();

        for node in find_nodes_by_kind(root, FUNCTION_KINDS) {
            if let Some((entity, chunk)) = function_entity(node, &source, path) {
                entities.push(entity);
                chunks.push(chunk);
            }
        }
        for node in find_nodes_by_kind(root, &["class_declaration", "class_expression"]) {
            if let Some((entity, chunk)) = class_entity(node, &source, path) {
                entities.push(entity);
                chunks.push(chunk);
            }
        }
        for node in find_nodes_by_kind(root, &["interface_declaration"]) {
            if let Some((entity, chunk)) = interface_entity(node, &source, path) {
                entities.push(entity);
                chunks.push(chunk);
            }
        }
        entities.extend(module_variables(root, &source, path));
        entities.extend(class_fields(root, &source, path));

        let mut relations = Vec::new();
        for node in find_nodes_by_kind(root, &["import_statement"]) {
            if let Some(relation) = import_relation(node, &source, path, &self.project_root) {
                relations.push(relation);
            }
        }
        relations.extend(json_loading_relations(root, &source, path));
        relations.extend(inheritance_relations(root, &source));
        relations.extend(throw_relations(root, &source));
        relations.extend(decorator_relations(root, &source));

        let file_entity = Entity::file(path, entities.len(), "javascript", !chunks.is_empty());
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

/// Name of a function-ish node. Arrow functions are named only when bound
/// to a variable declarator.
fn function_name<'a>(node: Node<'_>, source: &'a str) -> Option<&'a str> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return Some(node_text(name_node, source));
    }
    if node.kind() == "arrow_function" {
        let parent = node.parent()?;
        if parent.kind() == "variable_declarator" {
            return parent
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| node_text(n, source));
        }
    }
    None
}

fn function_entity(
    node: Node<'_>,
    source: &str,
    path: &Path,
) -> Option<(Entity, EntityChunk)> {
    let name = function_name(node, source)?;
    let observations = observations::function_observations(node, source);
    let entity = Entity::function(name, path, start_line(node), end_line(node), observations)
        .with_metadata("node_type", node.kind());

    let implementation = node_text(node, source).to_string();
    let semantic = SemanticMetadata {
        calls: calls_from_source(&implementation),
        complexity: complexity_from_source(&implementation),
        ..Default::default()
    };
    let chunk = EntityChunk {
        id: chunk_id(
            path,
            "function",
            name,
            "implementation",
            start_line(node),
            end_line(node),
        ),
        entity_name: name.to_string(),
        chunk_type: ChunkType::Implementation,
        content: implementation,
        metadata: ChunkMetadata::new("function", path, start_line(node), end_line(node))
            .with_semantic(semantic),
    };
    Some((entity, chunk))
}

fn class_entity(node: Node<'_>, source: &str, path: &Path) -> Option<(Entity, EntityChunk)> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);
    let observations = observations::class_observations(node, source);
    let entity = Entity::class(name, path, start_line(node), end_line(node), observations);

    let chunk = EntityChunk {
        id: chunk_id(
            path,
            "class",
            name,
            "implementation",
            start_line(node),
            end_line(node),
        ),
        entity_name: name.to_string(),
        chunk_type: ChunkType::Implementation,
        content: node_text(node, source).to_string(),
        metadata: ChunkMetadata::new("class", path, start_line(node), end_line(node)),
    };
    Some((entity, chunk))
}

fn interface_entity(node: Node<'_>, source: &str, path: &Path) -> Option<(Entity, EntityChunk)> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source);
    let entity = Entity::interface(
        name,
        path,
        start_line(node),
        end_line(node),
        vec![format!("TypeScript interface: {name}")],
    );
    let chunk = EntityChunk {
        id: chunk_id(
            path,
            "interface",
            name,
            "implementation",
            start_line(node),
            end_line(node),
        ),
        entity_name: name.to_string(),
        chunk_type: ChunkType::Implementation,
        content: node_text(node, source).to_string(),
        metadata: ChunkMetadata::new("interface", path, start_line(node), end_line(node)),
    };
    Some((entity, chunk))
}

/// Module-level variables, with full destructuring support. Anything inside
/// a function or block scope is skipped.
fn module_variables(root: Node<'_>, source: &str, path: &Path) -> Vec<Entity> {
    let mut variables = Vec::new();
    let mut seen = Vec::new();
    collect_variables(root, source, path, None, &mut variables, &mut seen);
    variables
}

fn collect_variables(
    node: Node<'_>,
    source: &str,
    path: &Path,
    scope: Option<&'static str>,
    out: &mut Vec<Entity>,
    seen: &mut Vec<String>,
) {
    let current_scope = SCOPE_KINDS
        .iter()
        .find(|k| **k == node.kind())
        .copied()
        .or(scope);

    match node.kind() {
        "variable_declaration" | "lexical_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(pattern) = declarator.child_by_field_name("name") {
                    for entity in
                        pattern_variables(pattern, source, path, declarator, current_scope)
                    {
                        if !seen.contains(&entity.name) {
                            seen.push(entity.name.clone());
                            out.push(entity);
                        }
                    }
                }
            }
        }
        "assignment_expression" if scope.is_none() => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    let name = node_text(left, source);
                    if should_include_variable(name, current_scope) && !seen.contains(&name.to_string())
                    {
                        seen.push(name.to_string());
                        let line = start_line(node);
                        out.push(Entity::variable(
                            name,
                            path,
                            line,
                            end_line(node),
                            vec![
                                format!("Variable: {name}"),
                                format!("Defined in: {}", path.display()),
                                format!("Line: {line}"),
                                "Assignment expression".to_string(),
                            ],
                        ));
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_variables(child, source, path, current_scope, out, seen);
    }
}

fn variable_entity(
    name: &str,
    path: &Path,
    declarator: Node<'_>,
    pattern_kind: &str,
) -> Entity {
    let line = start_line(declarator);
    Entity::variable(
        name,
        path,
        line,
        end_line(declarator),
        vec![
            format!("Variable: {name}"),
            format!("Defined in: {}", path.display()),
            format!("Line: {line}"),
            format!("Pattern: {pattern_kind}"),
        ],
    )
}

/// One entity per leaf identifier of a declarator pattern: plain names,
/// object/array destructuring, renames, defaults, rest, nested.
fn pattern_variables(
    pattern: Node<'_>,
    source: &str,
    path: &Path,
    declarator: Node<'_>,
    scope: Option<&'static str>,
) -> Vec<Entity> {
    let mut variables = Vec::new();
    match pattern.kind() {
        "identifier" => {
            let name = node_text(pattern, source);
            if should_include_variable(name, scope) {
                let line = start_line(declarator);
                variables.push(Entity::variable(
                    name,
                    path,
                    line,
                    end_line(declarator),
                    vec![
                        format!("Variable: {name}"),
                        format!("Defined in: {}", path.display()),
                        format!("Line: {line}"),
                    ],
                ));
            }
        }
        "object_pattern" => {
            variables.extend(object_pattern_variables(pattern, source, path, declarator, scope));
        }
        "array_pattern" => {
            variables.extend(array_pattern_variables(pattern, source, path, declarator, scope));
        }
        _ => {}
    }
    variables
}

fn object_pattern_variables(
    pattern: Node<'_>,
    source: &str,
    path: &Path,
    declarator: Node<'_>,
    scope: Option<&'static str>,
) -> Vec<Entity> {
    let mut variables = Vec::new();
    let mut cursor = pattern.walk();
    for child in pattern.children(&mut cursor) {
        match child.kind() {
            "shorthand_property_identifier_pattern" => {
                let name = node_text(child, source);
                if should_include_variable(name, scope) {
                    variables.push(variable_entity(name, path, declarator, "object destructuring"));
                }
            }
            "object_assignment_pattern" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    if member.kind() == "shorthand_property_identifier_pattern" {
                        let name = node_text(member, source);
                        if should_include_variable(name, scope) {
                            variables.push(variable_entity(
                                name,
                                path,
                                declarator,
                                "object destructuring with default",
                            ));
                        }
                        break;
                    }
                }
            }
            "pair_pattern" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    match member.kind() {
                        "identifier" => {
                            let name = node_text(member, source);
                            if should_include_variable(name, scope) {
                                variables.push(variable_entity(
                                    name,
                                    path,
                                    declarator,
                                    "object destructuring",
                                ));
                            }
                        }
                        "object_pattern" => variables.extend(object_pattern_variables(
                            member, source, path, declarator, scope,
                        )),
                        "array_pattern" => variables.extend(array_pattern_variables(
                            member, source, path, declarator, scope,
                        )),
                        _ => {}
                    }
                }
            }
            "rest_pattern" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    if member.kind() == "identifier" {
                        let name = node_text(member, source);
                        if should_include_variable(name, scope) {
                            variables.push(variable_entity(name, path, declarator, "rest pattern"));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    variables
}

fn array_pattern_variables(
    pattern: Node<'_>,
    source: &str,
    path: &Path,
    declarator: Node<'_>,
    scope: Option<&'static str>,
) -> Vec<Entity> {
    let mut variables = Vec::new();
    let mut cursor = pattern.walk();
    for child in pattern.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                let name = node_text(child, source);
                if should_include_variable(name, scope) {
                    variables.push(variable_entity(name, path, declarator, "array destructuring"));
                }
            }
            "rest_pattern" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    if member.kind() == "identifier" {
                        let name = node_text(member, source);
                        if should_include_variable(name, scope) {
                            variables.push(variable_entity(
                                name,
                                path,
                                declarator,
                                "array rest pattern",
                            ));
                        }
                        break;
                    }
                }
            }
            "object_pattern" => variables.extend(object_pattern_variables(
                child, source, path, declarator, scope,
            )),
            "array_pattern" => variables.extend(array_pattern_variables(
                child, source, path, declarator, scope,
            )),
            _ => {}
        }
    }
    variables
}

fn should_include_variable(name: &str, scope: Option<&'static str>) -> bool {
    if scope.is_some() {
        return false;
    }
    if SKIPPED_VARIABLE_NAMES.contains(&name) {
        return false;
    }
    if name.chars().count() <= 1 && !SHORT_NAME_ALLOWLIST.contains(&name) {
        return false;
    }
    true
}

/// Class field definitions surface as variables, static ones annotated.
fn class_fields(root: Node<'_>, source: &str, path: &Path) -> Vec<Entity> {
    let mut fields = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for node in find_nodes_by_kind(root, &["field_definition", "public_field_definition"]) {
        // The JS grammar names the field "property"; the TS grammar "name".
        let Some(name_node) = node
            .child_by_field_name("property")
            .or_else(|| node.child_by_field_name("name"))
        else {
            continue;
        };
        if name_node.kind() != "property_identifier" {
            continue;
        }
        let name = node_text(name_node, source);
        if name.is_empty() || seen.contains(&name.to_string()) {
            continue;
        }
        seen.push(name.to_string());
        let is_static = {
            let mut cursor = node.walk();
            let result = node.children(&mut cursor).any(|c| c.kind() == "static");
            result
        };
        let line = start_line(node);
        fields.push(Entity::variable(
            name,
            path,
            line,
            end_line(node),
            vec![
                format!("Variable: {name}"),
                format!("Defined in: {}", path.display()),
                format!("Line: {line}"),
                format!(
                    "Class field {}",
                    if is_static { "(static)" } else { "(instance)" }
                ),
            ],
        ));
    }
    fields
}

/// IMPORTS relation for internal module specifiers only.
fn import_relation(
    node: Node<'_>,
    source: &str,
    path: &Path,
    project_root: &Path,
) -> Option<Relation> {
    let source_node = node.child_by_field_name("source").or_else(|| {
        let mut cursor = node.walk();
        let result = node.children(&mut cursor).find(|c| c.kind() == "string");
        result
    })?;
    let module = node_text(source_node, source)
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    if !is_internal_module(&module, project_root) {
        return None;
    }
    Some(Relation::imports(
        path.display().to_string(),
        module,
        "module",
    ))
}

/// Relative specifiers are internal. Scoped packages and well-known runtime
/// modules are external. Everything else is internal only when its first
/// path component resolves to a file or directory under the project root.
fn is_internal_module(module: &str, project_root: &Path) -> bool {
    if module.starts_with("./") || module.starts_with("../") || module == "." || module == ".." {
        return true;
    }
    if module.starts_with('@') {
        return false;
    }
    if WELL_KNOWN_EXTERNAL.contains(&module) {
        return false;
    }
    let first = module.split('/').next().unwrap_or(module);
    if first.is_empty() {
        return false;
    }
    if project_root.join(first).is_dir() {
        return true;
    }
    RESOLVABLE_EXTENSIONS
        .iter()
        .any(|ext| project_root.join(format!("{first}.{ext}")).is_file())
}

/// Dynamic JSON loading: fetch / require / JSON.parse targeting `.json`.
fn json_loading_relations(root: Node<'_>, source: &str, path: &Path) -> Vec<Relation> {
    static JSON_IN_ARGS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"["']([^"']*\.json)["']"#).unwrap());

    let file_key = path.display().to_string();
    let mut relations = Vec::new();

    for call in find_nodes_by_kind(root, &["call_expression"]) {
        let call_text = node_text(call, source);
        if call_text.starts_with("fetch(") {
            if let Some(target) = first_string_argument(call, source) {
                if target.ends_with(".json") {
                    relations.push(Relation::imports(&file_key, target, "json_fetch"));
                }
            }
        } else if call_text.starts_with("require(") {
            if let Some(target) = first_string_argument(call, source) {
                if target.ends_with(".json") {
                    relations.push(Relation::imports(&file_key, target, "json_require"));
                }
            }
        } else if call_text.starts_with("JSON.parse(") {
            if let Some(args) = call.child_by_field_name("arguments") {
                let args_text = node_text(args, source);
                if let Some(caps) = JSON_IN_ARGS.captures(args_text) {
                    if let Some(target) = caps.get(1) {
                        relations.push(Relation::imports(
                            &file_key,
                            target.as_str(),
                            "json_parse",
                        ));
                    }
                }
            }
        }
    }
    relations
}

fn first_string_argument(call: Node<'_>, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    for arg in args.children(&mut cursor) {
        if arg.kind() == "string" {
            return Some(
                node_text(arg, source)
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_string(),
            );
        }
    }
    None
}

/// INHERITS from `extends` heritage (plain JS) plus TypeScript
/// `extends_clause` / `implements_clause`.
fn inheritance_relations(root: Node<'_>, source: &str) -> Vec<Relation> {
    let mut relations = Vec::new();
    for class_node in find_nodes_by_kind(root, &["class_declaration"]) {
        let Some(class_name) = class_name(class_node, source) else {
            continue;
        };
        let mut cursor = class_node.walk();
        for child in class_node.children(&mut cursor) {
            if child.kind() != "class_heritage" {
                continue;
            }
            let mut extends_seen = false;
            let mut inner = child.walk();
            for heritage in child.children(&mut inner) {
                match heritage.kind() {
                    "extends" => extends_seen = true,
                    "identifier" | "type_identifier" if extends_seen => {
                        let parent = node_text(heritage, source);
                        relations.push(
                            Relation::inherits(class_name, parent)
                                .with_context(format!("{class_name} extends {parent}")),
                        );
                        extends_seen = false;
                    }
                    "extends_clause" => {
                        let mut members = heritage.walk();
                        for member in heritage.children(&mut members) {
                            if matches!(member.kind(), "identifier" | "type_identifier") {
                                let parent = node_text(member, source);
                                relations.push(
                                    Relation::inherits(class_name, parent)
                                        .with_context(format!("{class_name} extends {parent}")),
                                );
                            }
                        }
                    }
                    "implements_clause" => {
                        let mut members = heritage.walk();
                        for member in heritage.children(&mut members) {
                            if matches!(member.kind(), "identifier" | "type_identifier") {
                                let interface = node_text(member, source);
                                relations.push(Relation::inherits(class_name, interface)
                                    .with_context(format!(
                                        "{class_name} implements {interface}"
                                    )));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    relations
}

fn class_name<'a>(class_node: Node<'_>, source: &'a str) -> Option<&'a str> {
    let mut cursor = class_node.walk();
    let result = class_node
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "type_identifier" | "identifier"))
        .map(|c| node_text(c, source));
    result
}

/// CALLS from a function to the exception class it throws.
fn throw_relations(root: Node<'_>, source: &str) -> Vec<Relation> {
    let mut relations = Vec::new();
    for throw_node in find_nodes_by_kind(root, &["throw_statement"]) {
        let Some(function) = containing_function(throw_node, source) else {
            continue;
        };
        let exception = thrown_exception_type(throw_node, source);
        relations.push(Relation::calls(
            function,
            exception.clone(),
            format!("{function} throws {exception}"),
        ));
    }
    relations
}

fn containing_function<'a>(node: Node<'_>, source: &'a str) -> Option<&'a str> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(
            parent.kind(),
            "function_declaration" | "arrow_function" | "method_definition"
        ) {
            return function_name(parent, source);
        }
        current = parent.parent();
    }
    None
}

fn thrown_exception_type(throw_node: Node<'_>, source: &str) -> String {
    let mut cursor = throw_node.walk();
    for child in throw_node.children(&mut cursor) {
        match child.kind() {
            "new_expression" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    if member.kind() == "identifier" {
                        return node_text(member, source).to_string();
                    }
                }
            }
            "identifier" => return node_text(child, source).to_string(),
            _ => {}
        }
    }
    "Error".to_string()
}

/// CALLS from a decorated class/method/property to the decorator name.
fn decorator_relations(root: Node<'_>, source: &str) -> Vec<Relation> {
    let mut relations = Vec::new();
    for decorator_node in find_nodes_by_kind(root, &["decorator"]) {
        let Some(name) = decorator_name(decorator_node, source) else {
            continue;
        };
        let Some(target) = decorator_target(decorator_node, source) else {
            continue;
        };
        relations.push(Relation::calls(
            target,
            name,
            format!("{target} uses decorator @{name}"),
        ));
    }
    relations
}

fn decorator_name<'a>(decorator_node: Node<'_>, source: &'a str) -> Option<&'a str> {
    let mut cursor = decorator_node.walk();
    for child in decorator_node.children(&mut cursor) {
        match child.kind() {
            "identifier" => return Some(node_text(child, source)),
            "call_expression" => {
                let mut inner = child.walk();
                for member in child.children(&mut inner) {
                    if member.kind() == "identifier" {
                        return Some(node_text(member, source));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn decorator_target<'a>(decorator_node: Node<'_>, source: &'a str) -> Option<&'a str> {
    let parent = decorator_node.parent()?;
    match parent.kind() {
        "class_declaration" => class_name(parent, source),
        "method_definition" => function_name(parent, source),
        "property_definition" | "field_definition" | "public_field_definition" => {
            let mut cursor = parent.walk();
            let result = parent
                .children(&mut cursor)
                .find(|c| matches!(c.kind(), "property_identifier" | "identifier"))
                .map(|c| node_text(c, source));
            result
        }
        // Decorators attached as class-body members precede their method
        // sibling in grammars that don't nest them.
        "class_body" => {
            let mut cursor = parent.walk();
            let children: Vec<Node<'_>> = parent.children(&mut cursor).collect();
            let index = children.iter().position(|c| c.id() == decorator_node.id())?;
            children[index + 1..]
                .iter()
                .find(|c| c.kind() == "method_definition")
                .and_then(|method| function_name(*method, source))
        }
        _ => None,
    }
}

fn calls_from_source(implementation: &str) -> Vec<String> {
    static CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*\(").unwrap());
    let mut calls = Vec::new();
    for caps in CALL.captures_iter(implementation) {
        if let Some(name) = caps.get(1) {
            let name = name.as_str().to_string();
            if !calls.contains(&name) {
                calls.push(name);
            }
        }
    }
    calls
}

fn complexity_from_source(implementation: &str) -> u32 {
    let mut complexity = 1u32;
    for token in COMPLEXITY_TOKENS {
        complexity += implementation.matches(token).count() as u32;
    }
    complexity
}
