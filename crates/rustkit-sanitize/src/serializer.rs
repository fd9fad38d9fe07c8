//! HTML serialization of the sanitized tree.
//!
//! The output is meant to be re-read by an HTML parser and come back as the
//! same tree: void elements never get an end tag, raw-text content is only
//! written verbatim when it cannot close its element early, and a leading
//! newline in `pre`-like elements is doubled because parsers drop the first.

use rustkit_html::tree_builder::VOID_ELEMENTS;
use rustkit_html::{Document, NodeData, NodeId};

/// Elements whose text children are written without escaping.
const VERBATIM_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Elements where the parser drops a newline right after the start tag.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "listing", "textarea"];

enum Step {
    Open(NodeId),
    Close(NodeId),
}

/// Serialize the children of the document root.
pub fn serialize(doc: &Document) -> String {
    serialize_node(doc, doc.root())
}

/// Serialize one node and its subtree. For the root this is just its children.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Open(id)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node) => match doc.data(node) {
                NodeData::Document => push_children(doc, node, &mut stack),
                NodeData::Doctype { name } => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeData::Comment(data) => {
                    out.push_str("<!--");
                    out.push_str(data);
                    out.push_str("-->");
                }
                NodeData::Text(text) => write_text(doc, node, text, &mut out),
                NodeData::Element { name, attrs } => {
                    out.push('<');
                    out.push_str(name);
                    for attr in attrs.iter().filter(|a| is_safe_attribute_name(&a.name)) {
                        out.push(' ');
                        out.push_str(&attr.name);
                        out.push_str("=\"");
                        escape_into(&attr.value, &mut out);
                        out.push('"');
                    }

                    if VOID_ELEMENTS.contains(&name.as_str()) {
                        out.push_str("/>");
                        continue;
                    }
                    out.push('>');

                    if LEADING_NEWLINE_ELEMENTS.contains(&name.as_str()) {
                        let starts_with_newline = doc
                            .children(node)
                            .first()
                            .map(|&first| {
                                matches!(doc.data(first), NodeData::Text(t) if t.starts_with('\n'))
                            })
                            .unwrap_or(false);
                        if starts_with_newline {
                            out.push('\n');
                        }
                    }

                    stack.push(Step::Close(node));
                    push_children(doc, node, &mut stack);
                }
            },
            Step::Close(node) => {
                if let Some(name) = doc.element_name(node) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }

    out
}

fn push_children(doc: &Document, node: NodeId, stack: &mut Vec<Step>) {
    stack.extend(doc.children(node).iter().rev().map(|&child| Step::Open(child)));
}

fn write_text(doc: &Document, node: NodeId, text: &str, out: &mut String) {
    let verbatim_parent = doc
        .parent(node)
        .and_then(|parent| doc.element_name(parent))
        .filter(|name| VERBATIM_TEXT_ELEMENTS.contains(name));

    match verbatim_parent {
        Some(name) if !contains_end_tag(text, name) => out.push_str(text),
        _ => escape_into(text, out),
    }
}

/// Whether `text` contains `</name` in any letter case.
fn contains_end_tag(text: &str, name: &str) -> bool {
    let needle = format!("</{}", name);
    text.to_ascii_lowercase().contains(&needle)
}

/// Escape `& < > "` for text and double-quoted attribute values.
pub fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn is_safe_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '"' | '\'' | '<' | '>' | '/' | '=')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustkit_html::{parse_fragment, Attribute, ParseOptions};

    fn roundtrip(html: &str) -> String {
        serialize(&parse_fragment(html, ParseOptions::default()))
    }

    #[test]
    fn test_basic_elements() {
        assert_eq!(roundtrip("<p>Hello <b>world</b></p>"), "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(roundtrip("a<br>b<img src=x.png>"), r#"a<br/>b<img src="x.png"/>"#);
    }

    #[test]
    fn test_escaping() {
        assert_eq!(roundtrip("1 &lt; 2 &amp; \"q\""), "1 &lt; 2 &amp; &quot;q&quot;");
        assert_eq!(
            roundtrip(r#"<a title='say "hi" <now>'>x</a>"#),
            r#"<a title="say &quot;hi&quot; &lt;now&gt;">x</a>"#
        );
    }

    #[test]
    fn test_raw_text_verbatim() {
        assert_eq!(
            roundtrip("<style>a > b { color: red }</style>"),
            "<style>a > b { color: red }</style>"
        );
    }

    #[test]
    fn test_raw_text_with_end_tag_is_escaped() {
        let mut doc = Document::new();
        let style = doc.new_element("style", Vec::new());
        doc.append(doc.root(), style);
        doc.append_text_to(style, "x</STYLE><b>");
        assert_eq!(serialize(&doc), "<style>x&lt;/STYLE&gt;&lt;b&gt;</style>");
    }

    #[test]
    fn test_leading_newline_doubled() {
        assert_eq!(roundtrip("<pre>\n\nx</pre>"), "<pre>\n\nx</pre>");
        assert_eq!(roundtrip("<pre>x</pre>"), "<pre>x</pre>");
    }

    #[test]
    fn test_unsafe_attribute_names_skipped() {
        let mut doc = Document::new();
        let div = doc.new_element(
            "div",
            vec![
                Attribute::new("a\"b", "1"),
                Attribute::new("ok", "2"),
                Attribute::new("x/y", "3"),
            ],
        );
        doc.append(doc.root(), div);
        assert_eq!(serialize(&doc), r#"<div ok="2"></div>"#);
    }

    #[test]
    fn test_serialize_node_includes_self() {
        let doc = parse_fragment("<div><i>a</i><!--c--></div>", ParseOptions::default());
        let div = doc.children(doc.root())[0];
        assert_eq!(serialize_node(&doc, div), "<div><i>a</i><!--c--></div>");
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let html = "<span>".repeat(20_000);
        let out = roundtrip(&html);
        assert!(out.starts_with("<span><span>"));
        assert_eq!(out.matches("</span>").count(), 512);
    }
}
