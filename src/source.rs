use anyhow::{Context, Result};
use std::path::Path;
use tree_sitter::{Node, Parser};

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// Reads a `.java` file and lists the fully qualified names of the types it declares.
pub fn list_source_classes(path: &Path) -> Result<Vec<String>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;
    class_names(&source).with_context(|| format!("Failed to parse source file: {}", path.display()))
}

/// Fully qualified names of top-level and member types, outer types first.
/// Nested names are dotted (`pkg.Outer.Inner`); local and anonymous classes
/// inside method bodies are skipped.
pub fn class_names(source: &str) -> Result<Vec<String>> {
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .context("Failed to load Java grammar")?;
    let tree = parser.parse(source, None).context("Java parser returned no tree")?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut package = None;
    let mut names = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => package = package_name(&child, bytes),
            kind if TYPE_DECLARATIONS.contains(&kind) => {
                collect_types(&child, bytes, package.as_deref(), &mut names);
            }
            _ => {}
        }
    }
    Ok(names)
}

fn package_name(node: &Node, source: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "scoped_identifier" || child.kind() == "identifier" {
            return child.utf8_text(source).ok().map(str::to_string);
        }
    }
    None
}

fn collect_types(node: &Node, source: &[u8], prefix: Option<&str>, out: &mut Vec<String>) {
    let Some(name) = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
    else {
        return;
    };
    let qualified = match prefix {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    };
    out.push(qualified.clone());

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    collect_members(&body, source, &qualified, out);
}

fn collect_members(body: &Node, source: &[u8], prefix: &str, out: &mut Vec<String>) {
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            kind if TYPE_DECLARATIONS.contains(&kind) => {
                collect_types(&member, source, Some(prefix), out);
            }
            "enum_body_declarations" => collect_members(&member, source, prefix, out),
            _ => {}
        }
    }
}
