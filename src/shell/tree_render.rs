//! ASCII tree rendering for category hierarchies.

use crate::models::CategoryTreeNode;

/// Render a category tree as ASCII art, listing each category's own
/// attribute keys.
///
/// Example output:
/// ```text
/// Products [title]
/// ├── Books [isbn, pages]
/// │   ├── SciFi
/// │   └── Poetry
/// └── Paint [colour]
/// ```
pub fn render_tree(root: &CategoryTreeNode) -> String {
    let mut output = String::new();
    render_node(&mut output, root, "", true, true);
    output
}

fn label(node: &CategoryTreeNode) -> String {
    if node.attributes.is_empty() {
        node.name.clone()
    } else {
        format!("{} [{}]", node.name, node.attributes.join(", "))
    }
}

/// Recursively render a node and its children.
fn render_node(
    output: &mut String,
    node: &CategoryTreeNode,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    if is_root {
        output.push_str(&label(node));
        output.push('\n');
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push_str(&label(node));
        output.push('\n');
    }

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
