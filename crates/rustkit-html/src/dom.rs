//! Arena-backed document tree.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`].
//! Children are owned as an ordered list; the parent link is a plain index
//! back-reference. Detached nodes stay in the arena until the document is
//! dropped, which is fine for the short-lived trees built per parse.

use crate::tokenizer::Attribute;
use crate::TreeSink;

/// Unique identifier for a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Fragment root
    Document,
    Doctype {
        name: String,
    },
    Element {
        name: String,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
}

impl NodeData {
    pub fn element_name(&self) -> Option<&str> {
        match self {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed fragment.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.data(id).element_name()
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match self.data(id) {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn new_element(&mut self, name: &str, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.to_string(),
            attrs,
        })
    }

    pub fn new_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    pub fn new_comment(&mut self, data: &str) -> NodeId {
        self.alloc(NodeData::Comment(data.to_string()))
    }

    pub fn new_doctype(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::Doctype {
            name: name.to_string(),
        })
    }

    /// Remove a node (and so its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            let siblings = &mut self.nodes[parent.0].children;
            // Moved nodes are almost always recent insertions; look from the end.
            if let Some(index) = siblings.iter().rposition(|&child| child == id) {
                siblings.remove(index);
            }
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` under `parent` before `reference`, or last when the
    /// reference is not a child of `parent`.
    pub fn insert_before_node(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match children.iter().rposition(|&c| c == reference) {
            Some(index) => children.insert(index, child),
            None => children.push(child),
        }
    }

    /// Append text, merging into a trailing text child.
    pub fn append_text_to(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        let node = self.new_text(text);
        self.append(parent, node);
    }

    /// Insert text before `reference`, merging into a text node just before it.
    pub fn insert_text_before_node(&mut self, parent: NodeId, text: &str, reference: NodeId) {
        let children = &self.nodes[parent.0].children;
        if let Some(index) = children.iter().rposition(|&c| c == reference) {
            if index > 0 {
                let prev = children[index - 1];
                if let NodeData::Text(existing) = &mut self.nodes[prev.0].data {
                    existing.push_str(text);
                    return;
                }
            }
        }
        let node = self.new_text(text);
        self.insert_before_node(parent, node, reference);
    }

    /// Move every child of `from` to the end of `to`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for &child in &children {
            self.nodes[child.0].parent = Some(to);
        }
        self.nodes[to.0].children.extend(children);
    }

    /// Take the child list of `id`, leaving it empty. The children keep their
    /// parent link until they are handed to [`Document::set_children`] or
    /// [`Document::clear_parent`].
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        std::mem::take(&mut self.nodes[id.0].children)
    }

    /// Install a whole child list at once. Linear in `children`.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes[id.0].children = children;
    }

    /// Forget the parent of a node whose parent's list is being rebuilt.
    pub fn clear_parent(&mut self, id: NodeId) {
        self.nodes[id.0].parent = None;
    }

    /// Pre-order walk of the subtree under `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| match self.data(node) {
                NodeData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of element ancestors above `id`.
    pub fn element_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.element_name(node).is_some() {
                depth += 1;
            }
            current = self.parent(node);
        }
        depth
    }

    /// Deepest element nesting anywhere in the document.
    pub fn max_element_depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            for &child in self.children(node) {
                let child_depth = if self.element_name(child).is_some() {
                    depth + 1
                } else {
                    depth
                };
                stack.push((child, child_depth));
            }
        }
        max
    }
}

/// Iterator returned by [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}

impl TreeSink for Document {
    type NodeId = NodeId;

    fn document(&self) -> NodeId {
        self.root()
    }

    fn create_element(&mut self, name: &str, attrs: Vec<Attribute>) -> NodeId {
        self.new_element(name, attrs)
    }

    fn create_comment(&mut self, data: &str) -> NodeId {
        self.new_comment(data)
    }

    fn create_doctype(&mut self, name: &str) -> NodeId {
        self.new_doctype(name)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.append(parent, child);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        self.append_text_to(parent, text);
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: NodeId) {
        self.insert_before_node(parent, node, reference);
    }

    fn insert_text_before(&mut self, parent: NodeId, text: &str, reference: NodeId) {
        self.insert_text_before_node(parent, text, reference);
    }

    fn remove_from_parent(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        self.move_children(from, to);
    }

    fn get_parent(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &mut Document, parent: NodeId, name: &str) -> NodeId {
        let node = doc.new_element(name, Vec::new());
        doc.append(parent, node);
        node
    }

    #[test]
    fn test_append_and_parent() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = element(&mut doc, root, "div");
        assert_eq!(doc.parent(div), Some(root));
        assert_eq!(doc.children(root), &[div]);
        assert_eq!(doc.element_name(div), Some("div"));
    }

    #[test]
    fn test_text_merging() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text_to(root, "a");
        doc.append_text_to(root, "b");
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.text_content(root), "ab");

        let p = element(&mut doc, root, "p");
        doc.insert_text_before_node(root, "c", p);
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.text_content(root), "abc");
    }

    #[test]
    fn test_rebuild_child_list() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = element(&mut doc, root, "a");
        let b = element(&mut doc, root, "b");
        let c = element(&mut doc, b, "c");

        let taken = doc.take_children(root);
        assert_eq!(taken, vec![a, b]);
        assert!(doc.is_empty());

        doc.clear_parent(a);
        doc.set_children(root, vec![b]);
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.parent(b), Some(root));
        assert_eq!(doc.parent(a), None);
        assert_eq!(doc.children(b), &[c]);
    }

    #[test]
    fn test_descendants_pre_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = element(&mut doc, root, "a");
        let b = element(&mut doc, a, "b");
        let c = element(&mut doc, root, "c");
        let order: Vec<_> = doc.descendants(root).collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(doc.element_depth(b), 2);
        assert_eq!(doc.max_element_depth(), 2);
    }
}
