//! Python declaration extractor using tree-sitter.
//!
//! Only top-level statements of a cell are inspected:
//! - `def`, `async def` and `class`, decorated or not
//! - alias assignments `name = obj.attr`, documented as `obj.attr`
//! - `show_doc(X)` calls, resolved to X's dotted name
//! - import statements and other computation, for the execution stage
//!
//! Imports are the exception: one nested anywhere inside a statement
//! (`try:` fallbacks, `if` guards, function bodies) still counts.

use crate::AdapterError;
use litnb_core::syntax::{
    Declaration, DeclarationExtractor, DeclarationKind, ParseError, ParsedSource, SHOW_DOC,
};
use std::sync::Mutex;
use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

/// Decorator that attaches a function to the class named by its first
/// parameter's annotation
const PATCH_DECORATOR: &str = "patch";

/// Python declaration extractor using tree-sitter
pub struct PythonExtractor {
    parser: Mutex<Parser>,
}

impl PythonExtractor {
    pub fn new() -> Result<Self, AdapterError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AdapterError::LanguageError(e.to_string()))?;
        Ok(Self {
            parser: Mutex::new(parser),
        })
    }

    fn tree(&self, source: &str) -> Result<Tree, ParseError> {
        let mut parser = self
            .parser
            .lock()
            .map_err(|e| parse_error(0, format!("Failed to acquire parser lock: {}", e)))?;
        parser
            .parse(source, None)
            .ok_or_else(|| parse_error(0, "Failed to parse source"))
    }

    fn walk_module(&self, root: Node, source: &[u8], parsed: &mut ParsedSource) {
        let mut cursor = root.walk();

        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "comment" => continue,
                "function_definition" | "class_definition" => {
                    if let Some(decl) = extract_definition(child, &[], source) {
                        parsed.declarations.push(decl);
                    }
                }
                "decorated_definition" => {
                    if let Some(decl) = extract_decorated(child, source) {
                        parsed.declarations.push(decl);
                    }
                }
                kind if is_import(kind) => {
                    parsed.has_imports = true;
                }
                "expression_statement" => self.walk_expression(child, source, parsed),
                _ => {}
            }
            if !parsed.has_imports && contains_import(child) {
                parsed.has_imports = true;
            }
            parsed.statement_count += 1;
        }
    }

    fn walk_expression(&self, stmt: Node, source: &[u8], parsed: &mut ParsedSource) {
        let Some(expr) = stmt.named_child(0) else {
            return;
        };

        match expr.kind() {
            // Docstrings are not computation
            "string" | "concatenated_string" => {}
            "assignment" => {
                parsed.has_computation = true;
                if let Some(decl) = extract_alias(expr, source) {
                    parsed.declarations.push(decl);
                }
            }
            "call" => {
                parsed.has_computation = true;
                if let Some(name) = show_doc_target(expr, source) {
                    debug!(name = %name, "Found documentation reference");
                    parsed.doc_references.push(name);
                }
            }
            _ => parsed.has_computation = true,
        }
    }
}

impl DeclarationExtractor for PythonExtractor {
    fn language(&self) -> &str {
        "python"
    }

    fn parse(&self, source: &str) -> Result<ParsedSource, ParseError> {
        let tree = self.tree(source)?;
        let root = tree.root_node();

        if root.has_error() {
            return Err(first_error(root, source.as_bytes()));
        }

        let mut parsed = ParsedSource::default();
        self.walk_module(root, source.as_bytes(), &mut parsed);
        Ok(parsed)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_error(line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        language: "python".to_string(),
        line,
        message: message.into(),
    }
}

fn node_text<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    node.utf8_text(source).ok()
}

/// Locate the first error or missing node in document order
fn first_error(root: Node, source: &[u8]) -> ParseError {
    fn find(node: Node) -> Option<Node> {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        children.into_iter().filter(|c| c.has_error()).find_map(find)
    }

    match find(root) {
        Some(node) if node.is_missing() => parse_error(
            node.start_position().row + 1,
            format!("missing {}", node.kind()),
        ),
        Some(node) => {
            let text = node_text(node, source).unwrap_or_default();
            let snippet = text.lines().next().unwrap_or_default();
            parse_error(
                node.start_position().row + 1,
                format!("invalid syntax near `{}`", snippet),
            )
        }
        None => parse_error(root.start_position().row + 1, "invalid syntax"),
    }
}

fn is_import(kind: &str) -> bool {
    matches!(
        kind,
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

/// Any import node below `node`, at any depth
fn contains_import(node: Node) -> bool {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children
        .into_iter()
        .any(|child| is_import(child.kind()) || contains_import(child))
}

/// Function or class definition, qualified by a `@patch` decorator
fn extract_definition(node: Node, decorators: &[&str], source: &[u8]) -> Option<Declaration> {
    let name = node_text(node.child_by_field_name("name")?, source)?;
    let line = node.start_position().row + 1;

    if node.kind() == "class_definition" {
        return Some(Declaration::new(name, DeclarationKind::Class, line));
    }

    let decl = Declaration::new(name, DeclarationKind::Function, line);
    if decorators.contains(&PATCH_DECORATOR) {
        if let Some(owner) = first_param_annotation(node, source) {
            return Some(decl.with_doc_name(format!("{}.{}", owner, name)));
        }
    }
    Some(decl)
}

fn extract_decorated(node: Node, source: &[u8]) -> Option<Declaration> {
    let mut cursor = node.walk();
    let decorators: Vec<&str> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .filter_map(|c| decorator_name(c, source))
        .collect();

    let definition = node.child_by_field_name("definition")?;
    extract_definition(definition, &decorators, source)
}

/// `patch` for `@patch`, `@patch(...)` and `@fastcore.patch`
fn decorator_name<'a>(decorator: Node, source: &'a [u8]) -> Option<&'a str> {
    let mut expr = decorator.named_child(0)?;
    if expr.kind() == "call" {
        expr = expr.child_by_field_name("function")?;
    }
    match expr.kind() {
        "identifier" => node_text(expr, source),
        "attribute" => node_text(expr.child_by_field_name("attribute")?, source),
        _ => None,
    }
}

/// Annotated type of the first parameter, if it is a plain dotted name
fn first_param_annotation(function: Node, source: &[u8]) -> Option<String> {
    let params = function.child_by_field_name("parameters")?;
    let first = params.named_child(0)?;
    if !matches!(first.kind(), "typed_parameter" | "typed_default_parameter") {
        return None;
    }
    let ty = first.child_by_field_name("type")?;
    let ty = ty.named_child(0).unwrap_or(ty);
    dotted_name(ty, source)
}

/// `a`, `a.b`, `a.b.c`; anything else is `None`
fn dotted_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => node_text(node, source).map(str::to_string),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object")?, source)?;
            let attr = node_text(node.child_by_field_name("attribute")?, source)?;
            Some(format!("{}.{}", object, attr))
        }
        _ => None,
    }
}

/// `name = obj.attr` at top level
fn extract_alias(assignment: Node, source: &[u8]) -> Option<Declaration> {
    let left = assignment.child_by_field_name("left")?;
    let right = assignment.child_by_field_name("right")?;
    if left.kind() != "identifier" || right.kind() != "attribute" {
        return None;
    }

    let name = node_text(left, source)?;
    let target = dotted_name(right, source)?;
    Some(
        Declaration::new(name, DeclarationKind::Alias, assignment.start_position().row + 1)
            .with_doc_name(target),
    )
}

/// Qualified name passed to a `show_doc(...)` call
fn show_doc_target(call: Node, source: &[u8]) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "identifier" || node_text(function, source)? != SHOW_DOC {
        return None;
    }

    let args = call.child_by_field_name("arguments")?;
    let first = args.named_child(0)?;
    if first.kind() == "keyword_argument" {
        return None;
    }
    dotted_name(first, source).or_else(|| node_text(first, source).map(str::to_string))
}
