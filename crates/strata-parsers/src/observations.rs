//! Best-effort semantic observation extraction.
//!
//! Derives short human-readable facts (docstring purpose, call graph,
//! complexity, framework tags, …) from a function or class AST node plus
//! the file's source text. Every helper is total: anything unexpected
//! yields an empty or partial list, never a failure of the parent parse.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::treesitter::node_text;

/// Call names never worth reporting: builtins and pervasive library calls.
const BUILTIN_OR_COMMON: &[&str] = &[
    "print", "len", "str", "int", "float", "bool", "list", "dict", "set", "tuple", "range",
    "enumerate", "zip", "map", "filter", "sum", "min", "max", "abs", "isinstance", "hasattr",
    "getattr", "setattr", "delattr", "type", "super", "open", "input", "format", "join", "split",
    "strip", "replace", "find", "append", "extend", "insert", "remove", "pop", "get", "keys",
    "values", "items", "update", "clear", "copy", "sort", "reverse", "count", "index",
];

/// Exception-variable names that are binding noise, not exception types.
const EXCEPTION_NOISE: &[&str] = &["as", "except", "e", "err", "error", "ex"];

const MAX_REPORTED_CALLS: usize = 5;
const MAX_REPORTED_METHODS: usize = 5;
const MAX_REPORTED_ATTRIBUTES: usize = 3;

fn is_javascript_node(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_declaration" | "arrow_function" | "function_expression" | "method_definition"
    )
}

/// Observations for a function entity, ordered: purpose and docstring
/// facts, calls, exception handling, return type/patterns, parameters,
/// decorators, complexity, framework and async tags.
pub fn function_observations(node: Node<'_>, source: &str) -> Vec<String> {
    let mut observations = Vec::new();

    if let Some(docstring) = extract_docstring(node, source) {
        if let Some(purpose) = clean_purpose(&docstring) {
            observations.push(format!("Purpose: {purpose}"));
        }
        observations.extend(docstring_patterns(&docstring));
    }

    let calls = function_calls(node, source);
    if !calls.is_empty() {
        let shown: Vec<&str> = calls
            .iter()
            .take(MAX_REPORTED_CALLS)
            .map(String::as_str)
            .collect();
        observations.push(format!("Calls: {}", shown.join(", ")));
    }

    let exceptions = exception_handling(node, source);
    if !exceptions.is_empty() {
        observations.push(format!("Handles: {}", exceptions.join(", ")));
    }

    if let Some(return_type) = return_type_annotation(node, source) {
        observations.push(format!("-> {return_type}"));
    }

    if let Some(returns) = return_patterns(node, source) {
        observations.push(format!("Returns: {returns}"));
    }

    if let Some(params) = parameter_patterns(node, source) {
        observations.push(format!("Parameters: {params}"));
    }

    for decorator in decorators(node, source) {
        observations.push(format!("Decorator: {decorator}"));
    }

    let complexity = complexity(node, source);
    if complexity > 5 {
        observations.push(format!("Complexity: {complexity} (high)"));
    } else if complexity >= 2 {
        observations.push(format!("Complexity: {complexity} (moderate)"));
    }

    let frameworks = framework_patterns(node, source);
    if !frameworks.is_empty() {
        observations.push(format!("Framework: {}", frameworks.join(", ")));
    }

    let async_tags = async_patterns(node, source);
    if !async_tags.is_empty() {
        observations.push(format!("Async: {}", async_tags.join(", ")));
    }

    observations
}

/// Observations for a class entity: responsibility, key methods,
/// inheritance, design-pattern tags, attributes.
pub fn class_observations(node: Node<'_>, source: &str) -> Vec<String> {
    let mut observations = Vec::new();

    if let Some(docstring) = extract_docstring(node, source) {
        let purpose = docstring.split('.').next().unwrap_or("").trim().to_string();
        if !purpose.is_empty() {
            observations.push(format!("Responsibility: {purpose}"));
        }
    }

    let methods = class_methods(node, source);
    if !methods.is_empty() {
        let shown: Vec<&str> = methods
            .iter()
            .take(MAX_REPORTED_METHODS)
            .map(String::as_str)
            .collect();
        observations.push(format!("Key methods: {}", shown.join(", ")));
    }

    let bases = inheritance_info(node, source);
    if !bases.is_empty() {
        observations.push(format!("Inherits from: {}", bases.join(", ")));
    }

    observations.extend(design_patterns(&methods));

    let attributes = class_attributes(node, source);
    if !attributes.is_empty() {
        let shown: Vec<&str> = attributes
            .iter()
            .take(MAX_REPORTED_ATTRIBUTES)
            .map(String::as_str)
            .collect();
        observations.push(format!("Attributes: {}", shown.join(", ")));
    }

    observations
}

/// Docstring detection is language-specific: triple-quoted first statement
/// for Python, `/** … */` immediately preceding the declaration for JS.
pub fn extract_docstring(node: Node<'_>, source: &str) -> Option<String> {
    if is_javascript_node(node) {
        jsdoc_comment(node, source)
    } else {
        python_docstring(node, source)
    }
}

fn python_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "comment" => continue,
            "expression_statement" => {
                let mut inner = child.walk();
                for grandchild in child.children(&mut inner) {
                    if grandchild.kind() == "string" {
                        return clean_string_quotes(node_text(grandchild, source));
                    }
                }
                return None;
            }
            // First real statement is not a string: no docstring.
            _ => return None,
        }
    }
    None
}

fn clean_string_quotes(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    if (text.starts_with("\"\"\"") && text.ends_with("\"\"\"") && text.len() >= 6)
        || (text.starts_with("'''") && text.ends_with("'''") && text.len() >= 6)
    {
        text = &text[3..text.len() - 3];
    } else if (text.starts_with('"') && text.ends_with('"') && text.len() >= 2)
        || (text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2)
    {
        text = &text[1..text.len() - 1];
    }
    let cleaned = text.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn jsdoc_comment(node: Node<'_>, source: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let func_start = node.start_position().row;
    let mut collected: Vec<String> = Vec::new();
    let mut in_jsdoc = false;

    let lowest = func_start.saturating_sub(10);
    for i in (lowest..func_start).rev() {
        let line = lines.get(i)?.trim();
        if line.ends_with("*/") {
            in_jsdoc = true;
            let mut clean = line[..line.len() - 2].trim();
            clean = clean.strip_prefix('*').map(str::trim).unwrap_or(clean);
            if !clean.is_empty() {
                collected.insert(0, clean.to_string());
            }
        } else if in_jsdoc && (line.starts_with('*') || line.starts_with("/**")) {
            let started = line.starts_with("/**");
            let mut clean = line.trim_start_matches(['/', '*']).trim();
            clean = clean.strip_prefix('*').map(str::trim).unwrap_or(clean);
            if !clean.is_empty() {
                collected.insert(0, clean.to_string());
            }
            if started {
                break;
            }
        } else if in_jsdoc {
            break;
        } else if !line.is_empty() && !line.starts_with("//") {
            break;
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join(" "))
    }
}

/// First sentence of a docstring with JSDoc tag clutter removed.
pub fn clean_purpose(docstring: &str) -> Option<String> {
    static AT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*@\w+").unwrap());

    // Single-line JSDoc with inline tags: keep everything before the first tag.
    if !docstring.contains('\n')
        && (docstring.contains("@param")
            || docstring.contains("@returns")
            || docstring.contains("@throws"))
    {
        if let Some(m) = AT_TAG.find(docstring) {
            let purpose = docstring[..m.start()].trim();
            if !purpose.is_empty() {
                return Some(purpose.to_string());
            }
        }
    }

    let mut purpose_lines = Vec::new();
    for raw in docstring.trim().lines() {
        let mut line = raw.trim();
        if line.is_empty() || line == "*" || line == "/**" || line == "*/" {
            continue;
        }
        if line.starts_with('@') {
            break;
        }
        line = line.strip_prefix("* ").or_else(|| line.strip_prefix('*')).unwrap_or(line);
        let line = line.trim();
        if line.starts_with('@') {
            break;
        }
        if !line.is_empty() {
            purpose_lines.push(line);
        }
    }

    let mut purpose = purpose_lines.join(" ");
    purpose = purpose.replace("/**", "").replace("*/", "").trim().to_string();
    if let Some(dot) = purpose.find('.') {
        purpose.truncate(dot + 1);
    }
    if purpose.is_empty() {
        let fallback: String = docstring.chars().take(100).collect();
        if fallback.is_empty() {
            return None;
        }
        return Some(fallback);
    }
    Some(purpose)
}

/// Structured facts mined from docstring sections.
pub fn docstring_patterns(docstring: &str) -> Vec<String> {
    static ARGS_SECTION: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?si)Args?:\s*(.*?)(?:\n\s*\n|\n\s*Returns?:|\n\s*Raises?:|\z)").unwrap()
    });
    static RETURNS_SECTION: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?si)Returns?:\s*(.*?)(?:\n\s*\n|\n\s*Raises?:|\n\s*Args?:|\z)").unwrap()
    });
    static RAISES_SECTION: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?si)Raises?:\s*(.*?)(?:\n\s*\n|\n\s*Returns?:|\n\s*Args?:|\z)").unwrap()
    });
    static PARAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+):\s*").unwrap());
    static EXCEPTION_TYPE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(\w+(?:Error|Exception)):").unwrap());
    static EXAMPLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Examples?:").unwrap());
    static BEHAVIORS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"\b(validates?|authenticates?|processes?|handles?|manages?|creates?|deletes?|updates?|retrieves?|calculates?|generates?|transforms?|parses?|formats?)\b",
        )
        .unwrap()
    });

    let mut patterns = Vec::new();

    if let Some(caps) = ARGS_SECTION.captures(docstring) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !body.is_empty() {
            let names: Vec<&str> = PARAM_NAME
                .captures_iter(body)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .take(3)
                .collect();
            if names.is_empty() {
                patterns.push("Has parameter documentation".to_string());
            } else {
                patterns.push(format!("Parameters: {}", names.join(", ")));
            }
        }
    }

    if let Some(caps) = RETURNS_SECTION.captures(docstring) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !body.is_empty() {
            let desc = body.lines().next().unwrap_or("").trim();
            if desc.is_empty() {
                patterns.push("Has return documentation".to_string());
            } else {
                let truncated: String = desc.chars().take(50).collect();
                let suffix = if desc.chars().count() > 50 { "..." } else { "" };
                patterns.push(format!("Returns: {truncated}{suffix}"));
            }
        }
    }

    if let Some(caps) = RAISES_SECTION.captures(docstring) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !body.is_empty() {
            let types: Vec<&str> = EXCEPTION_TYPE
                .captures_iter(body)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .take(3)
                .collect();
            if types.is_empty() {
                patterns.push("Documents exceptions".to_string());
            } else {
                patterns.push(format!("Raises: {}", types.join(", ")));
            }
        }
    }

    if EXAMPLES.is_match(docstring) {
        patterns.push("Has usage examples".to_string());
    }

    let lower = docstring.to_lowercase();
    let mut behaviors: Vec<String> = Vec::new();
    for caps in BEHAVIORS.captures_iter(&lower) {
        let word = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        if !behaviors.contains(&word) {
            behaviors.push(word);
        }
        if behaviors.len() == 3 {
            break;
        }
    }
    if !behaviors.is_empty() {
        patterns.push(format!("Behaviors: {}", behaviors.join(", ")));
    }

    patterns
}

/// Meaningful callee names inside a function/class body, first-seen order.
pub fn function_calls(node: Node<'_>, source: &str) -> Vec<String> {
    let javascript = is_javascript_node(node);
    let mut calls: Vec<String> = Vec::new();
    collect_calls(node, source, javascript, &mut calls);
    calls
}

fn collect_calls(node: Node<'_>, source: &str, javascript: bool, out: &mut Vec<String>) {
    if matches!(node.kind(), "call" | "call_expression") {
        let func_node = if javascript {
            node.child(0)
        } else {
            node.child_by_field_name("function")
        };
        if let Some(func_node) = func_node {
            let func_text = node_text(func_node, source);
            let func_name = if let Some((object_path, method)) = func_text.rsplit_once('.') {
                let object = object_path.rsplit('.').next().unwrap_or(object_path);
                if meaningful_by_structure(method) {
                    let qualified = if object.len() < 10 {
                        format!("{object}.{method}")
                    } else {
                        method.to_string()
                    };
                    push_unique(out, qualified);
                }
                method
            } else {
                func_text
            };

            let keep = if javascript {
                meaningful_by_structure(func_name)
            } else {
                !is_builtin_or_common(func_name) && meaningful_by_structure(func_name)
            };
            if keep {
                push_unique(out, func_name.to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, javascript, out);
    }
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

/// Structural meaningfulness: snake_case, descriptive length, or a
/// CamelCase constructor.
pub fn meaningful_by_structure(name: &str) -> bool {
    if name.contains('_') {
        return true;
    }
    if name.len() > 4 {
        return true;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => chars.any(|c| c.is_uppercase()),
        _ => false,
    }
}

pub fn is_builtin_or_common(name: &str) -> bool {
    BUILTIN_OR_COMMON.contains(&name) || name.len() <= 2
}

/// Exception types caught, raised, or thrown inside the node.
pub fn exception_handling(node: Node<'_>, source: &str) -> Vec<String> {
    let mut exceptions = Vec::new();
    collect_exceptions(node, source, &mut exceptions);
    exceptions
}

fn collect_exceptions(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "except_clause" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "identifier" => {
                        let name = node_text(child, source);
                        if !EXCEPTION_NOISE.contains(&name) {
                            push_unique(out, name.to_string());
                        }
                    }
                    "tuple" => {
                        let mut inner = child.walk();
                        for member in child.children(&mut inner) {
                            if member.kind() == "identifier" {
                                let name = node_text(member, source);
                                if name != "as" && name != "except" {
                                    push_unique(out, name.to_string());
                                }
                            }
                        }
                    }
                    "attribute" => {
                        let text = node_text(child, source);
                        if text.contains('.')
                            && (text.contains("Error") || text.contains("Exception"))
                        {
                            if let Some(last) = text.rsplit('.').next() {
                                push_unique(out, last.to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "raise_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "call" => {
                        if let Some(func) = child.child_by_field_name("function") {
                            if func.kind() == "identifier" {
                                let name = node_text(func, source);
                                if name.contains("Error") || name.contains("Exception") {
                                    push_unique(out, name.to_string());
                                }
                            }
                        }
                    }
                    "identifier" => {
                        let name = node_text(child, source);
                        if name.contains("Error") || name.contains("Exception") {
                            push_unique(out, name.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        "throw_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "new_expression" {
                    let mut inner = child.walk();
                    for member in child.children(&mut inner) {
                        match member.kind() {
                            "identifier" => {
                                let name = node_text(member, source);
                                if name.contains("Error") || name.contains("Exception") {
                                    push_unique(out, name.to_string());
                                }
                            }
                            "call_expression" => {
                                if let Some(func) = member.child_by_field_name("function") {
                                    let text = node_text(func, source);
                                    if text.contains("Error") || text.contains("Exception") {
                                        if let Some(last) = text.rsplit('.').next() {
                                            push_unique(out, last.to_string());
                                        }
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_exceptions(child, source, out);
    }
}

/// Summary of return statements: one distinct value or many patterns.
pub fn return_patterns(node: Node<'_>, source: &str) -> Option<String> {
    let mut returns: Vec<String> = Vec::new();
    collect_returns(node, source, &mut returns);

    match returns.len() {
        0 => None,
        1 => {
            let value = &returns[0];
            let truncated: String = value.chars().take(20).collect();
            let suffix = if value.chars().count() > 20 { "..." } else { "" };
            Some(format!("single value ({truncated}{suffix})"))
        }
        n => Some(format!("multiple patterns ({n} different)")),
    }
}

fn collect_returns(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    if node.kind() == "return_statement" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "return" {
                let text = node_text(child, source);
                if !text.is_empty() {
                    push_unique(out, text.to_string());
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_returns(child, source, out);
    }
}

/// Signature parameters, counted and listed with their annotations.
pub fn parameter_patterns(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !matches!(child.kind(), "parameters" | "formal_parameters") {
            continue;
        }
        let mut names = Vec::new();
        let mut inner = child.walk();
        for param in child.children(&mut inner) {
            match param.kind() {
                "identifier" | "typed_parameter" | "typed_default_parameter" => {
                    names.push(node_text(param, source).to_string());
                }
                _ => {}
            }
        }
        if names.is_empty() {
            return None;
        }
        return Some(format!("{} parameters: {}", names.len(), names.join(", ")));
    }
    None
}

/// Return type annotation (`-> T` in Python).
pub fn return_type_annotation(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .find(|c| c.kind() == "type")
        .map(|c| node_text(c, source).to_string());
    result
}

/// Decorator names, without the leading `@`.
pub fn decorators(node: Node<'_>, source: &str) -> Vec<String> {
    let mut found = Vec::new();
    // tree-sitter-python attaches decorators to a wrapping
    // decorated_definition; other grammars put them on the node itself.
    if let Some(parent) = node.parent() {
        if parent.kind() == "decorated_definition" {
            let mut cursor = parent.walk();
            for child in parent.children(&mut cursor) {
                if child.kind() == "decorator" {
                    found.push(node_text(child, source).trim_start_matches('@').to_string());
                }
            }
            return found;
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            found.push(node_text(child, source).trim_start_matches('@').to_string());
        }
    }
    found
}

const BRANCHING_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "try_statement",
    "except_clause",
    "with_statement",
    "catch_clause",
    "conditional_expression",
    "ternary_expression",
];

/// 1 + count of branching constructs (if/elif/for/while/try/except/with,
/// ternaries, logical `&&`/`||`).
pub fn complexity(node: Node<'_>, source: &str) -> u32 {
    let mut count = 1;
    count_branches(node, source, &mut count);
    count
}

fn count_branches(node: Node<'_>, source: &str, count: &mut u32) {
    if BRANCHING_KINDS.contains(&node.kind()) {
        *count += 1;
    } else if node.kind() == "binary_expression" {
        if let Some(op) = node.child_by_field_name("operator") {
            let text = node_text(op, source);
            if text == "&&" || text == "||" {
                *count += 1;
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count_branches(child, source, count);
    }
}

/// Framework and library usage tags from lexical token patterns.
pub fn framework_patterns(node: Node<'_>, source: &str) -> Vec<String> {
    let code = node_text(node, source).to_lowercase();
    let mut frameworks = Vec::new();

    if code.contains("express") || code.contains("app.") {
        frameworks.push("Express.js".to_string());
    } else if code.contains("require(")
        || code.contains("import ")
        || code.contains("database.")
        || code.contains("logger.")
        || code.contains("log.")
    {
        frameworks.push("Node.js".to_string());
    }

    if code.contains("react")
        || code.contains("usestate")
        || code.contains("useeffect")
        || code.contains("component")
    {
        frameworks.push("React".to_string());
    } else if code.contains("vue") || code.contains("this.$") {
        frameworks.push("Vue.js".to_string());
    } else if code.contains("angular") || code.contains("@component") || code.contains("@injectable")
    {
        frameworks.push("Angular".to_string());
    }

    if code.contains("mongoose")
        || code.contains("schema")
        || code.contains("findone")
        || code.contains("findbyid")
    {
        frameworks.push("Mongoose".to_string());
    } else if code.contains("sequelize") || code.contains("model.") || code.contains("findall") {
        frameworks.push("Sequelize".to_string());
    }

    if code.contains("jest")
        || code.contains("describe(")
        || code.contains("it(")
        || code.contains("test(")
        || code.contains("expect(")
    {
        frameworks.push("Jest".to_string());
    } else if code.contains("mocha") || code.contains("chai") || code.contains("assert") {
        frameworks.push("Mocha/Chai".to_string());
    }

    if code.contains("jwt") || code.contains("jsonwebtoken") || code.contains("passport") {
        frameworks.push("JWT/Auth".to_string());
    }

    frameworks
}

/// Asynchronous programming tags from lexical markers.
pub fn async_patterns(node: Node<'_>, source: &str) -> Vec<String> {
    let code = node_text(node, source);
    let mut patterns = Vec::new();

    if code.trim_start().starts_with("async ") {
        patterns.push("async function".to_string());
    }
    if code.contains("await ") {
        patterns.push("uses await".to_string());
    }
    if code.contains(".then(")
        || code.contains(".catch(")
        || code.contains(".finally(")
        || code.contains("new Promise")
    {
        patterns.push("Promise chains".to_string());
    }
    if code.contains("callback(") || code.contains("cb(") || code.contains(", function(") || code.contains("=>")
    {
        patterns.push("callbacks".to_string());
    }
    if code.contains("await ") && (code.contains("try {") || code.contains("catch(")) {
        patterns.push("async error handling".to_string());
    }

    patterns
}

/// Method names defined in a class body (dunders skipped, `__init__` kept).
pub fn class_methods(node: Node<'_>, source: &str) -> Vec<String> {
    let mut methods = Vec::new();
    collect_methods(node, source, &mut methods);
    methods
}

fn collect_methods(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    if matches!(node.kind(), "function_definition" | "method_definition") {
        if let Some(name_node) = node.child_by_field_name("name") {
            let name = node_text(name_node, source);
            if !name.starts_with("__") || name == "__init__" {
                push_unique(out, name.to_string());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_methods(child, source, out);
    }
}

/// Base classes listed in a Python class definition.
pub fn inheritance_info(node: Node<'_>, source: &str) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "argument_list" {
            let mut inner = child.walk();
            for arg in child.children(&mut inner) {
                if matches!(arg.kind(), "identifier" | "attribute") {
                    bases.push(node_text(arg, source).to_string());
                }
            }
        }
    }
    bases
}

/// Design-pattern tags from method-name heuristics.
pub fn design_patterns(methods: &[String]) -> Vec<String> {
    let mut patterns = Vec::new();
    if methods.iter().any(|m| m == "__new__") {
        patterns.push("Singleton pattern".to_string());
    }
    if methods
        .iter()
        .any(|m| m.to_lowercase().contains("create") || m.to_lowercase().contains("build"))
    {
        patterns.push("Factory pattern".to_string());
    }
    if methods
        .iter()
        .any(|m| m.to_lowercase().contains("notify") || m.to_lowercase().contains("observe"))
    {
        patterns.push("Observer pattern".to_string());
    }
    patterns
}

/// `self.x` assignment targets in a class body.
pub fn class_attributes(node: Node<'_>, source: &str) -> Vec<String> {
    let mut attributes = Vec::new();
    collect_attributes(node, source, &mut attributes);
    attributes
}

fn collect_attributes(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    if node.kind() == "assignment" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "attribute" {
                let text = node_text(child, source);
                if let Some(attr) = text.strip_prefix("self.") {
                    push_unique(out, attr.to_string());
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_attributes(child, source, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treesitter::{find_nodes_by_kind, parse_source};
    use tree_sitter::{Language, Tree};

    fn py_tree(source: &str) -> Tree {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        parse_source(&language, source).unwrap()
    }

    fn js_tree(source: &str) -> Tree {
        let language: Language = tree_sitter_javascript::LANGUAGE.into();
        parse_source(&language, source).unwrap()
    }

    #[test]
    fn test_python_docstring_purpose() {
        let source = r#"
def fetch(url):
    """Fetch a resource. Retries on failure.

    Args:
        url: Target address.
    """
    return url
"#;
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let obs = function_observations(func, source);
        assert!(obs.contains(&"Purpose: Fetch a resource.".to_string()));
        assert!(obs.iter().any(|o| o.starts_with("Parameters: url")));
    }

    #[test]
    fn test_docstring_sections() {
        let doc = "Do work.\n\nArgs:\n    name: Who.\n    count: How many.\n\nReturns:\n    A summary string.\n\nRaises:\n    ValueError: On bad input.\n";
        let patterns = docstring_patterns(doc);
        assert!(patterns.iter().any(|p| p == "Parameters: name, count"));
        assert!(patterns.iter().any(|p| p.starts_with("Returns: A summary string")));
        assert!(patterns.iter().any(|p| p == "Raises: ValueError"));
    }

    #[test]
    fn test_jsdoc_purpose() {
        let source = r#"
/**
 * Formats a user for display.
 * @param user The user object.
 */
function formatUser(user) {
  return user.name;
}
"#;
        let tree = js_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_declaration"])[0];
        let obs = function_observations(func, source);
        assert!(obs.contains(&"Purpose: Formats a user for display.".to_string()));
    }

    #[test]
    fn test_calls_filtered_by_structure_and_builtins() {
        let source = r#"
def run():
    print("hi")
    process_data()
    x = len([1])
    Reader()
"#;
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let calls = function_calls(func, source);
        assert!(calls.contains(&"process_data".to_string()));
        assert!(calls.contains(&"Reader".to_string()));
        assert!(!calls.contains(&"print".to_string()));
        assert!(!calls.contains(&"len".to_string()));
    }

    #[test]
    fn test_calls_capped_at_five_in_observations() {
        let source = "def run():\n    first_call(); second_call(); third_call(); fourth_call(); fifth_call(); sixth_call()\n";
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let obs = function_observations(func, source);
        let calls_line = obs.iter().find(|o| o.starts_with("Calls: ")).unwrap();
        assert_eq!(calls_line.matches(", ").count(), 4);
    }

    #[test]
    fn test_exception_handling() {
        let source = r#"
def guarded():
    try:
        risky()
    except ValueError as e:
        pass
    except (KeyError, IndexError):
        raise RuntimeError("bad")
"#;
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let exceptions = exception_handling(func, source);
        assert!(exceptions.contains(&"ValueError".to_string()));
        assert!(exceptions.contains(&"KeyError".to_string()));
        assert!(exceptions.contains(&"IndexError".to_string()));
        assert!(exceptions.contains(&"RuntimeError".to_string()));
        assert!(!exceptions.contains(&"e".to_string()));
    }

    #[test]
    fn test_js_throw_detected() {
        let source = r#"
function validate(input) {
  if (!input) {
    throw new ValidationError("empty");
  }
}
"#;
        let tree = js_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_declaration"])[0];
        let exceptions = exception_handling(func, source);
        assert_eq!(exceptions, vec!["ValidationError".to_string()]);
    }

    #[test]
    fn test_complexity_thresholds() {
        let flat = "def a():\n    return 1\n";
        let tree = py_tree(flat);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        assert_eq!(complexity(func, flat), 1);
        assert!(!function_observations(func, flat)
            .iter()
            .any(|o| o.starts_with("Complexity")));

        let branchy = r#"
def b(x):
    if x:
        for i in x:
            while i:
                i -= 1
    return x
"#;
        let tree = py_tree(branchy);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        assert_eq!(complexity(func, branchy), 4);
        assert!(function_observations(func, branchy)
            .iter()
            .any(|o| o == "Complexity: 4 (moderate)"));
    }

    #[test]
    fn test_return_type_and_parameters() {
        let source = "def add(a: int, b: int = 0) -> int:\n    return a + b\n";
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let obs = function_observations(func, source);
        assert!(obs.contains(&"-> int".to_string()));
        assert!(obs
            .iter()
            .any(|o| o.starts_with("Parameters: 2 parameters: a: int, b: int = 0")));
    }

    #[test]
    fn test_decorators_found_through_wrapper() {
        let source = "@cached\n@retry(3)\ndef slow():\n    pass\n";
        let tree = py_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_definition"])[0];
        let found = decorators(func, source);
        assert_eq!(found, vec!["cached".to_string(), "retry(3)".to_string()]);
    }

    #[test]
    fn test_async_patterns() {
        let source = "async function load() {\n  const data = await fetch('/api');\n  return data.json().then(x => x);\n}\n";
        let tree = js_tree(source);
        let func = find_nodes_by_kind(tree.root_node(), &["function_declaration"])[0];
        let tags = async_patterns(func, source);
        assert!(tags.contains(&"async function".to_string()));
        assert!(tags.contains(&"uses await".to_string()));
        assert!(tags.contains(&"Promise chains".to_string()));
    }

    #[test]
    fn test_class_observations() {
        let source = r#"
class UserStore(BaseStore):
    """Stores users. Persists to disk."""

    def __init__(self):
        self.users = {}
        self.dirty = False

    def create_user(self, name):
        pass

    def notify_listeners(self):
        pass

    def __repr__(self):
        return "UserStore"
"#;
        let tree = py_tree(source);
        let class = find_nodes_by_kind(tree.root_node(), &["class_definition"])[0];
        let obs = class_observations(class, source);
        assert!(obs.contains(&"Responsibility: Stores users".to_string()));
        assert!(obs.iter().any(|o| o.starts_with("Key methods: ")
            && o.contains("__init__")
            && o.contains("create_user")
            && !o.contains("__repr__")));
        assert!(obs.contains(&"Inherits from: BaseStore".to_string()));
        assert!(obs.contains(&"Factory pattern".to_string()));
        assert!(obs.contains(&"Observer pattern".to_string()));
        assert!(obs.iter().any(|o| o.starts_with("Attributes: users, dirty")));
    }

    #[test]
    fn test_meaningful_by_structure() {
        assert!(meaningful_by_structure("snake_case"));
        assert!(meaningful_by_structure("descriptive"));
        assert!(meaningful_by_structure("HttpClient"));
        assert!(!meaningful_by_structure("run"));
        assert!(!meaningful_by_structure("x"));
    }
}
