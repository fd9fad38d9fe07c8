//! Corpus tests for the fragment parser

use rustkit_html::{parse_fragment, parse_with, Attribute, Document, NodeData, NodeId, ParseOptions, TreeSink};

/// Sink that records the structure as an indented outline.
#[derive(Debug, Default)]
struct OutlineSink {
    nodes: Vec<(String, Option<usize>, Vec<usize>)>,
}

impl OutlineSink {
    fn new() -> Self {
        Self {
            nodes: vec![("#root".to_string(), None, Vec::new())],
        }
    }

    fn push(&mut self, label: String) -> usize {
        self.nodes.push((label, None, Vec::new()));
        self.nodes.len() - 1
    }

    fn detach(&mut self, node: usize) {
        if let Some(parent) = self.nodes[node].1.take() {
            self.nodes[parent].2.retain(|&c| c != node);
        }
    }

    fn outline(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut stack: Vec<(usize, usize)> = self.nodes[0].2.iter().rev().map(|&c| (c, 0)).collect();
        while let Some((node, depth)) = stack.pop() {
            lines.push(format!("{}{}", "  ".repeat(depth), self.nodes[node].0));
            for &child in self.nodes[node].2.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        lines
    }
}

impl TreeSink for OutlineSink {
    type NodeId = usize;

    fn document(&self) -> usize {
        0
    }

    fn create_element(&mut self, name: &str, attrs: Vec<Attribute>) -> usize {
        let attr_str = attrs
            .iter()
            .map(|a| format!(" {}={:?}", a.name, a.value))
            .collect::<String>();
        self.push(format!("<{}{}>", name, attr_str))
    }

    fn create_comment(&mut self, data: &str) -> usize {
        self.push(format!("<!-- {} -->", data))
    }

    fn create_doctype(&mut self, name: &str) -> usize {
        self.push(format!("<!DOCTYPE {}>", name))
    }

    fn append_child(&mut self, parent: usize, child: usize) {
        self.detach(child);
        self.nodes[child].1 = Some(parent);
        self.nodes[parent].2.push(child);
    }

    fn append_text(&mut self, parent: usize, text: &str) {
        let node = self.push(format!("{:?}", text));
        self.append_child(parent, node);
    }

    fn insert_before(&mut self, parent: usize, node: usize, reference: usize) {
        self.detach(node);
        self.nodes[node].1 = Some(parent);
        let index = self.nodes[parent]
            .2
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(self.nodes[parent].2.len());
        self.nodes[parent].2.insert(index, node);
    }

    fn insert_text_before(&mut self, parent: usize, text: &str, reference: usize) {
        let node = self.push(format!("{:?}", text));
        self.insert_before(parent, node, reference);
    }

    fn remove_from_parent(&mut self, node: usize) {
        self.detach(node);
    }

    fn reparent_children(&mut self, from: usize, to: usize) {
        let children = std::mem::take(&mut self.nodes[from].2);
        for &child in &children {
            self.nodes[child].1 = Some(to);
        }
        self.nodes[to].2.extend(children);
    }

    fn get_parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].1
    }
}

fn outline(html: &str) -> Vec<String> {
    rustkit_common::logging::init_test_logging();
    parse_with(html, OutlineSink::new(), ParseOptions::default()).outline()
}

fn element_names(doc: &Document) -> Vec<String> {
    doc.descendants(doc.root())
        .filter_map(|id| doc.element_name(id).map(str::to_string))
        .collect()
}

fn find(doc: &Document, name: &str) -> Option<NodeId> {
    doc.descendants(doc.root())
        .find(|&id| doc.element_name(id) == Some(name))
}

#[test]
fn test_blog_comment() {
    let html = r#"<p>Great post! See <a href="https://example.com/a?b=1&amp;c=2">this</a>.</p>
<p>Thanks,<br>Sam</p>"#;
    assert_eq!(
        outline(html),
        vec![
            "<p>",
            "  \"Great post! See \"",
            "  <a href=\"https://example.com/a?b=1&c=2\">",
            "    \"this\"",
            "  \".\"",
            "\"\\n\"",
            "<p>",
            "  \"Thanks,\"",
            "  <br>",
            "  \"Sam\"",
        ]
    );
}

#[test]
fn test_misnested_formatting_outline() {
    assert_eq!(
        outline("<p>1<b>2<i>3</b>4</i>5</p>"),
        vec![
            "<p>", "  \"1\"", "  <b>", "    \"2\"", "    <i>", "      \"3\"", "  <i>",
            "    \"4\"", "  \"5\"",
        ]
    );
}

#[test]
fn test_unclosed_formatting_across_paragraphs() {
    let doc = parse_fragment("<p><em>one<p>two", ParseOptions::default());
    let paragraphs: Vec<_> = doc
        .children(doc.root())
        .iter()
        .copied()
        .filter(|&id| doc.element_name(id) == Some("p"))
        .collect();
    assert_eq!(paragraphs.len(), 2);
    for p in paragraphs {
        let first = doc.children(p)[0];
        assert_eq!(doc.element_name(first), Some("em"));
    }
}

#[test]
fn test_script_content_is_text() {
    let doc = parse_fragment("<script>document.write('<b>x</b>')</script>", ParseOptions::default());
    assert_eq!(element_names(&doc), vec!["script"]);
    let script = find(&doc, "script").unwrap();
    assert_eq!(doc.text_content(script), "document.write('<b>x</b>')");
}

#[test]
fn test_attribute_obfuscation_survives_parsing() {
    let doc = parse_fragment(
        "<a href=\"jav&#x09;ascript:alert(1)\" HREF=other onclick=x>y</a>",
        ParseOptions::default(),
    );
    let a = find(&doc, "a").unwrap();
    let attrs = doc.attrs(a);
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[0], Attribute::new("href", "jav\tascript:alert(1)"));
    assert_eq!(attrs[1], Attribute::new("onclick", "x"));
}

#[test]
fn test_table_with_stray_content() {
    assert_eq!(
        outline("<table><tr><td>a</td></tr>oops<tr><td>b</table>"),
        vec![
            "\"oops\"",
            "<table>",
            "  <tbody>",
            "    <tr>",
            "      <td>",
            "        \"a\"",
            "    <tr>",
            "      <td>",
            "        \"b\"",
        ]
    );
}

#[test]
fn test_nested_tables() {
    let doc = parse_fragment(
        "<table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>",
        ParseOptions::default(),
    );
    assert_eq!(
        element_names(&doc),
        vec!["table", "tbody", "tr", "td", "table", "tbody", "tr", "td"]
    );
}

#[test]
fn test_comments_and_doctype() {
    let doc = parse_fragment("<!doctype html><!-- a --><p><!--b-->x</p>", ParseOptions::default());
    let root_children = doc.children(doc.root());
    assert!(matches!(doc.data(root_children[0]), NodeData::Doctype { name } if name == "html"));
    assert!(matches!(doc.data(root_children[1]), NodeData::Comment(c) if c == " a "));
}

#[test]
fn test_unterminated_markup_becomes_text() {
    let doc = parse_fragment("hello <b", ParseOptions::default());
    assert_eq!(element_names(&doc), Vec::<String>::new());
    assert_eq!(doc.text_content(doc.root()), "hello <b");
}

#[test]
fn test_deep_nesting_is_bounded() {
    let html = "<div>".repeat(2_000) + "deep" + &"</div>".repeat(2_000);
    let doc = parse_fragment(&html, ParseOptions::with_max_depth(64));
    assert_eq!(doc.max_element_depth(), 64);
    assert_eq!(doc.text_content(doc.root()), "deep");
}

#[test]
fn test_many_misnested_anchors_stay_bounded() {
    let html = "<a href=x><div>".repeat(1_000);
    let doc = parse_fragment(&html, ParseOptions::default());
    assert!(doc.max_element_depth() <= 512);
}
