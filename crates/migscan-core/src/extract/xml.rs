//! Namespace-agnostic lookup helpers over `roxmltree` documents.
//!
//! Elements are matched by local name only, so `<wf:action>` and
//! `<action xmlns="uri:oozie:workflow:0.5">` are the same thing here.

use roxmltree::Node;

pub fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Direct element children with the given local name.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_named(n, name))
}

pub fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

/// Element descendants (excluding `node` itself) with the given local name,
/// in document order.
pub fn descendants<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.descendants()
        .skip(1)
        .filter(move |n| is_named(n, name))
}

/// All text beneath `node`, trimmed; `None` when blank.
pub fn text_of(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .filter(|n| is_named(n, name))
        .find_map(text_of)
}

/// Collapse runs of whitespace to single spaces.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `(name, value)` pairs of every `property` directly under a
/// `configuration` element. Properties without a name are skipped; a
/// missing value reads as empty.
pub fn configuration_properties(configuration: Node<'_, '_>) -> Vec<(String, String)> {
    children(configuration, "property")
        .filter_map(|prop| {
            let name = child_text(prop, "name")?;
            let value = child_text(prop, "value").unwrap_or_default();
            Some((collapse_whitespace(&name), collapse_whitespace(&value)))
        })
        .collect()
}
