//! [`MarkupCodec`] over roxmltree.
//!
//! roxmltree is read-only, so the parsed document is copied into the owned
//! [`Element`] tree. DTDs are rejected (roxmltree's default), which also
//! rules out entity expansion.

use super::tree::{serialize, Element, Node};
use super::{MarkupCodec, MarkupError};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// roxmltree-backed parser with the crate's own serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoxmlCodec;

impl MarkupCodec for RoxmlCodec {
    fn parse(&self, markup: &str) -> Result<Element, MarkupError> {
        let document =
            roxmltree::Document::parse(markup).map_err(|e| MarkupError(e.to_string()))?;
        Ok(convert(document.root_element()))
    }

    fn serialize(&self, root: &Element) -> String {
        serialize(root)
    }
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let mut element = Element::new(element_name(node));

    // Namespace declarations made on this element (inherited ones are skipped).
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    for ns in node.namespaces() {
        if ns.uri() == XML_NAMESPACE || inherited.contains(&(ns.name(), ns.uri())) {
            continue;
        }
        let name = match ns.name() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        element.attributes.push((name, ns.uri().to_string()));
    }

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(uri) => prefixed(node, uri, attr.name()),
            None => attr.name().to_string(),
        };
        element.attributes.push((name, attr.value().to_string()));
    }

    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => element.children.push(Node::Element(convert(child))),
            roxmltree::NodeType::Text => {
                element
                    .children
                    .push(Node::Text(child.text().unwrap_or_default().to_string()));
            }
            roxmltree::NodeType::Comment => {
                element
                    .children
                    .push(Node::Comment(child.text().unwrap_or_default().to_string()));
            }
            // Processing instructions never survive.
            roxmltree::NodeType::PI | roxmltree::NodeType::Root => {}
        }
    }

    element
}

fn element_name(node: roxmltree::Node<'_, '_>) -> String {
    let tag = node.tag_name();
    match tag.namespace() {
        // Elements in the default namespace stay unprefixed.
        Some(uri) if node.lookup_namespace_uri(None) != Some(uri) => {
            prefixed(node, uri, tag.name())
        }
        _ => tag.name().to_string(),
    }
}

fn prefixed(node: roxmltree::Node<'_, '_>, uri: &str, local: &str) -> String {
    if uri == XML_NAMESPACE {
        return format!("xml:{}", local);
    }
    match node.lookup_prefix(uri) {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}
