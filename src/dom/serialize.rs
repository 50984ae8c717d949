//! HTML serialization.

use super::node::{Node, NodeType};

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Elements whose text is serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

impl Node {
    /// Markup of the node itself and its descendants. Shadow roots are not
    /// serialized.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }

    /// Markup of the node's children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        write_children(self, &mut out);
        out
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node.node_type() {
        NodeType::Element => {
            let tag = node.tag().unwrap_or_default();
            out.push('<');
            out.push_str(tag);
            for (name, value) in node.attributes() {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                escape_into(&value, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(tag) {
                return;
            }
            write_children(node, out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeType::Text => escape_into(&node.data(), false, out),
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.data());
            out.push_str("-->");
        }
        NodeType::Document | NodeType::Fragment | NodeType::ShadowRoot => write_children(node, out),
    }
}

fn write_children(node: &Node, out: &mut String) {
    let raw = node.tag().is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
    for child in node.children() {
        if raw && child.node_type() == NodeType::Text {
            out.push_str(&child.data());
        } else {
            write_node(&child, out);
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_elements_text_and_comments() {
        let div = Node::element("div");
        div.set_attribute("title", "a \"quoted\" & plain");
        div.append_child(&Node::text("1 < 2"));
        div.append_child(&Node::comment("marker"));
        div.append_child(&Node::element("br"));

        assert_eq!(
            div.outer_html(),
            "<div title=\"a &quot;quoted&quot; &amp; plain\">1 &lt; 2<!--marker--><br></div>"
        );
    }

    #[test]
    fn test_raw_text_is_not_escaped() {
        let style = Node::element("style");
        style.append_child(&Node::text("a > b { color: red }"));
        assert_eq!(style.inner_html(), "a > b { color: red }");
    }
}
