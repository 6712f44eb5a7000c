//! Shared tree-sitter plumbing for the language parsers.

use tree_sitter::{Language, Node, Parser, Tree};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("language error: {0}")]
    Language(String),
    #[error("parse failed")]
    ParseFailed,
}

/// Parse source with a fresh parser. Tree-sitter parsers are cheap to
/// create and not thread-safe, so each call builds its own.
pub fn parse_source(language: &Language, source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| ParseError::Language(e.to_string()))?;
    parser.parse(source, None).ok_or(ParseError::ParseFailed)
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Whether the tree contains any ERROR nodes.
pub fn has_syntax_errors(tree: &Tree) -> bool {
    tree.root_node().has_error()
}

/// 1-based start line.
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based inclusive end line.
pub fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// All nodes of the given kinds, preorder.
pub fn find_nodes_by_kind<'tree>(root: Node<'tree>, kinds: &[&str]) -> Vec<Node<'tree>> {
    let mut found = Vec::new();
    collect_kinds(root, kinds, &mut found);
    found
}

fn collect_kinds<'tree>(node: Node<'tree>, kinds: &[&str], out: &mut Vec<Node<'tree>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_kinds(child, kinds, out);
    }
}

/// Literal source lines spanned by a node, whole lines.
pub fn node_lines<'a>(node: Node<'_>, lines: &[&'a str]) -> Vec<&'a str> {
    let start = node.start_position().row;
    let end = (node.end_position().row).min(lines.len().saturating_sub(1));
    if start > end || lines.is_empty() {
        return Vec::new();
    }
    lines[start..=end].to_vec()
}
