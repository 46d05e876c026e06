//! ASCII tree rendering for content trees.

use crate::models::{ContentTree, Node, NodeId};
use crate::persist::BoundaryState;

const ACTIVATED: char = '●';
const NOT_ACTIVATED: char = '○';
const UNLOADED: char = '◇';
const CONTENT: char = '•';

/// Longest text block excerpt shown before eliding.
const TEXT_EXCERPT: usize = 40;

/// Get the status symbol for a node.
fn node_symbol(tree: &ContentTree, node: &Node) -> char {
    if !tree.schemas().is_boundary(node.kind()) {
        return CONTENT;
    }
    if !node.is_loaded() {
        return UNLOADED;
    }
    match node.state() {
        BoundaryState::Activated => ACTIVATED,
        BoundaryState::NotActivated | BoundaryState::Deleted => NOT_ACTIVATED,
    }
}

fn node_label(node: &Node) -> String {
    if let Some(source) = node.kind().source() {
        return source.to_string();
    }
    if let Some(name) = node.name() {
        return name.to_string();
    }
    if let Some(text) = node.kind().text() {
        let excerpt: String = text.chars().take(TEXT_EXCERPT).collect();
        let elided = if excerpt.len() < text.len() { "…" } else { "" };
        return format!("\"{excerpt}{elided}\"");
    }
    match node.kind().mime_type() {
        Some(mime_type) => format!("{} ({mime_type})", node.kind().tag()),
        None => node.kind().tag().to_string(),
    }
}

/// Render the subtree under `from` as ASCII art with status symbols.
///
/// With `content` unset only filesystem nodes are shown.
///
/// Example output:
/// ```text
/// notes
/// ├── ● todo.txt
/// │   └── • text_line
/// │       └── • "buy milk"
/// └── • archive
///     └── ◇ 2023.txt
/// ```
pub fn render_tree(tree: &ContentTree, from: NodeId, content: bool) -> String {
    let mut output = String::new();
    if let Some(node) = tree.get(from) {
        render_node(&mut output, tree, node, "", true, true, content);
    }
    output
}

/// Recursively render a node and its children.
fn render_node(
    output: &mut String,
    tree: &ContentTree,
    node: &Node,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    content: bool,
) {
    if is_root {
        // Root nodes: just the label (no branch characters)
        output.push_str(&node_label(node));
        output.push('\n');
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(node_symbol(tree, node));
        output.push(' ');
        output.push_str(&node_label(node));
        output.push('\n');
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    let children: Vec<&Node> = tree
        .children(node.id())
        .unwrap_or_default()
        .iter()
        .filter_map(|id| tree.get(*id))
        .filter(|child| content || child.kind().is_file_system())
        .collect();
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(output, tree, child, &child_prefix, child_is_last, false, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    fn sample() -> ContentTree {
        let mut tree = ContentTree::new("notes", Box::new(MemoryStore::new())).unwrap();
        let root = tree.root();
        let todo = tree.create_plain_text_document(root, "todo.txt").unwrap();
        let line = tree.create_text_line(todo).unwrap();
        tree.create_text_block(line, Some("buy milk")).unwrap();
        let archive = tree.create_folder(root, "archive").unwrap();
        tree.create_folder(archive, "2023").unwrap();
        tree
    }

    #[test]
    fn test_single_root() {
        let tree = ContentTree::new("notes", Box::new(MemoryStore::new())).unwrap();
        assert_eq!(render_tree(&tree, tree.root(), true), "notes\n");
    }

    #[test]
    fn test_nested_children() {
        let tree = sample();
        let expected = "notes\n├── ○ todo.txt\n│   └── • text_line\n│       └── • \"buy milk\"\n└── • archive\n    └── • 2023\n";
        assert_eq!(render_tree(&tree, tree.root(), true), expected);
    }

    #[test]
    fn test_file_system_only() {
        let tree = sample();
        let expected = "notes\n├── ○ todo.txt\n└── • archive\n    └── • 2023\n";
        assert_eq!(render_tree(&tree, tree.root(), false), expected);
    }

    #[test]
    fn test_activated_boundary_symbol() {
        let mut tree = sample();
        let todo = tree.find_path("/todo.txt").unwrap();
        tree.add(todo).unwrap();
        let output = render_tree(&tree, tree.root(), false);
        assert!(output.contains("● todo.txt"));
    }

    #[test]
    fn test_long_text_elided() {
        let mut tree = ContentTree::new("notes", Box::new(MemoryStore::new())).unwrap();
        let doc = tree.create_plain_text_document(tree.root(), "a").unwrap();
        let line = tree.create_text_line(doc).unwrap();
        let block = tree.create_text_block(line, Some(&"x".repeat(50))).unwrap();
        let output = render_tree(&tree, block, true);
        assert_eq!(output, format!("\"{}…\"\n", "x".repeat(40)));
    }

    #[test]
    fn test_unknown_start_renders_nothing() {
        let tree = sample();
        assert_eq!(render_tree(&tree, NodeId::new(), true), "");
    }
}
