//! # RustKit HTML
//!
//! HTML5 fragment parser used by the sanitizer.
//!
//! This crate provides a tokenizer and tree builder that work together
//! to parse HTML into a tree via a sink interface. The bundled arena
//! [`Document`] is the sink most callers want.

pub mod dom;
pub mod entities;
pub mod tokenizer;
pub mod tree_builder;

pub use dom::{Document, Node, NodeData, NodeId};
pub use tokenizer::{tokenize, Attribute, Token};
pub use tree_builder::{build_tree, TreeBuilder};

/// Default bound on open-element depth.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options for tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Start tags beyond this many open elements are flattened.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

/// Trait for receiving tree-construction operations.
///
/// The tree builder keeps its own stack of open elements and list of
/// active formatting elements; the sink only has to store nodes and
/// move them around when asked.
pub trait TreeSink {
    /// The type used to identify nodes in the tree.
    type NodeId: Copy + Eq + std::fmt::Debug;

    /// The fragment root. Content with no other home goes here.
    fn document(&self) -> Self::NodeId;

    /// Create an element without attaching it.
    fn create_element(&mut self, name: &str, attrs: Vec<Attribute>) -> Self::NodeId;

    /// Create a comment without attaching it.
    fn create_comment(&mut self, data: &str) -> Self::NodeId;

    /// Create a doctype without attaching it.
    fn create_doctype(&mut self, name: &str) -> Self::NodeId;

    /// Append a node as the last child of `parent`, detaching it first.
    fn append_child(&mut self, parent: Self::NodeId, child: Self::NodeId);

    /// Append text to `parent`, merging with a trailing text child.
    fn append_text(&mut self, parent: Self::NodeId, text: &str);

    /// Insert a node before `reference` within `parent`.
    fn insert_before(&mut self, parent: Self::NodeId, node: Self::NodeId, reference: Self::NodeId);

    /// Insert text before `reference`, merging with a preceding text sibling.
    fn insert_text_before(&mut self, parent: Self::NodeId, text: &str, reference: Self::NodeId);

    // ==================== AAA (Adoption Agency Algorithm) Methods ====================

    /// Remove a node from its parent (detach it from the tree).
    /// The node still exists but is no longer in the tree.
    fn remove_from_parent(&mut self, node: Self::NodeId);

    /// Move all children from one node to another.
    fn reparent_children(&mut self, from: Self::NodeId, to: Self::NodeId);

    /// Get the parent of a node, if any.
    fn get_parent(&self, node: Self::NodeId) -> Option<Self::NodeId>;
}

/// Parse an HTML fragment (body context) using the provided sink.
pub fn parse_with<S: TreeSink>(html: &str, sink: S, options: ParseOptions) -> S {
    let tokens = tokenizer::tokenize(html);
    tree_builder::build_tree(tokens, sink, options)
}

/// Parse an HTML fragment (body context) into an arena [`Document`].
pub fn parse_fragment(html: &str, options: ParseOptions) -> Document {
    parse_with(html, Document::new(), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the operations a sink receives.
    #[derive(Default)]
    struct TestSink {
        next_id: usize,
        events: Vec<String>,
    }

    impl TreeSink for TestSink {
        type NodeId = usize;

        fn document(&self) -> usize {
            0
        }

        fn create_element(&mut self, name: &str, _attrs: Vec<Attribute>) -> usize {
            self.next_id += 1;
            self.events.push(format!("create {} #{}", name, self.next_id));
            self.next_id
        }

        fn create_comment(&mut self, data: &str) -> usize {
            self.next_id += 1;
            self.events.push(format!("comment {}", data));
            self.next_id
        }

        fn create_doctype(&mut self, name: &str) -> usize {
            self.next_id += 1;
            self.events.push(format!("doctype {}", name));
            self.next_id
        }

        fn append_child(&mut self, parent: usize, child: usize) {
            self.events.push(format!("append #{} to #{}", child, parent));
        }

        fn append_text(&mut self, parent: usize, text: &str) {
            self.events.push(format!("text {:?} to #{}", text, parent));
        }

        fn insert_before(&mut self, parent: usize, node: usize, reference: usize) {
            self.events
                .push(format!("insert #{} in #{} before #{}", node, parent, reference));
        }

        fn insert_text_before(&mut self, parent: usize, text: &str, reference: usize) {
            self.events
                .push(format!("text {:?} in #{} before #{}", text, parent, reference));
        }

        fn remove_from_parent(&mut self, node: usize) {
            self.events.push(format!("remove #{}", node));
        }

        fn reparent_children(&mut self, from: usize, to: usize) {
            self.events.push(format!("reparent #{} to #{}", from, to));
        }

        fn get_parent(&self, _node: usize) -> Option<usize> {
            Some(0)
        }
    }

    #[test]
    fn test_sink_receives_operations() {
        let sink = parse_with("<p>Hello</p>", TestSink::default(), ParseOptions::default());
        assert_eq!(
            sink.events,
            vec![
                "create p #1".to_string(),
                "append #1 to #0".to_string(),
                "text \"Hello\" to #1".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_fragment_root_children() {
        let doc = parse_fragment("a<b>c</b>", ParseOptions::default());
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.text_content(root), "ac");
    }

    #[test]
    fn test_empty_input() {
        let doc = parse_fragment("", ParseOptions::default());
        assert!(doc.is_empty());
    }
}
