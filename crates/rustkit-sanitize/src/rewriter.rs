//! Apply a [`Policy`] to a parsed tree in place.

use std::collections::VecDeque;

use rustkit_html::{Attribute, Document, NodeData, NodeId};
use serde::Serialize;
use tracing::trace;

use crate::policy::{AttributeDecision, Disposition, Policy};
use crate::serializer::serialize_node;

/// Elements whose content the tokenizer reads as text. Inside `svg` or `math`
/// they would be parsed differently by a browser, so they never survive there.
const FOREIGN_UNSAFE_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Counters describing what a sanitization changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeStats {
    pub elements_kept: usize,
    pub elements_dropped: usize,
    pub elements_unwrapped: usize,
    pub elements_escaped: usize,
    pub elements_flattened: usize,
    pub elements_renamed: usize,
    pub elements_wrapped: usize,
    pub attributes_stripped: usize,
    pub attributes_rewritten: usize,
    pub attributes_injected: usize,
    pub comments_removed: usize,
    pub doctypes_removed: usize,
}

impl SanitizeStats {
    /// Add another pass's removals and rewrites. `elements_kept` is taken
    /// from `other` since each pass sees the whole tree again.
    pub fn absorb(&mut self, other: &SanitizeStats) {
        self.elements_kept = other.elements_kept;
        self.elements_dropped += other.elements_dropped;
        self.elements_unwrapped += other.elements_unwrapped;
        self.elements_escaped += other.elements_escaped;
        self.elements_flattened += other.elements_flattened;
        self.elements_renamed += other.elements_renamed;
        self.elements_wrapped += other.elements_wrapped;
        self.attributes_stripped += other.attributes_stripped;
        self.attributes_rewritten += other.attributes_rewritten;
        self.attributes_injected += other.attributes_injected;
        self.comments_removed += other.comments_removed;
        self.doctypes_removed += other.doctypes_removed;
    }

    /// Everything except kept elements and injected attributes.
    pub fn total_changes(&self) -> usize {
        self.elements_dropped
            + self.elements_unwrapped
            + self.elements_escaped
            + self.elements_flattened
            + self.elements_renamed
            + self.elements_wrapped
            + self.attributes_stripped
            + self.attributes_rewritten
            + self.comments_removed
            + self.doctypes_removed
    }
}

/// Text of the subtree under `node`, leaving out elements the policy would
/// drop with their content.
fn visible_text(doc: &Document, node: NodeId, policy: &Policy) -> String {
    let mut text = String::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match doc.data(current) {
            NodeData::Text(chunk) => text.push_str(chunk),
            NodeData::Element { name, attrs } => {
                if current == node || policy.classify(name, attrs).disposition != Disposition::Drop {
                    stack.extend(doc.children(current).iter().rev());
                }
            }
            _ => {}
        }
    }
    text
}

/// Rewrite `doc` according to `policy`.
///
/// Every element is classified on its own, top-down. Each kept parent has its
/// child list rebuilt exactly once: the old children are drained through a
/// work queue, children of unwrapped elements are pushed back onto the front
/// of that queue, and the survivors are installed as the new list. Work is
/// linear in the size of the tree however many siblings are removed.
pub fn rewrite(doc: &mut Document, policy: &Policy) -> SanitizeStats {
    let mut stats = SanitizeStats::default();
    let mut parents: Vec<(NodeId, bool)> = vec![(doc.root(), false)];

    while let Some((parent, parent_foreign)) = parents.pop() {
        let mut queue: VecDeque<(NodeId, bool)> = doc
            .take_children(parent)
            .into_iter()
            .map(|child| (child, parent_foreign))
            .collect();
        let mut survivors = Vec::with_capacity(queue.len());

        while let Some((node, in_foreign)) = queue.pop_front() {
            let name = match doc.data(node) {
                NodeData::Comment(_) => {
                    doc.clear_parent(node);
                    stats.comments_removed += 1;
                    continue;
                }
                NodeData::Doctype { .. } => {
                    doc.clear_parent(node);
                    stats.doctypes_removed += 1;
                    continue;
                }
                NodeData::Element { name, .. } => name.clone(),
                NodeData::Text(_) | NodeData::Document => {
                    survivors.push(node);
                    continue;
                }
            };

            if in_foreign && FOREIGN_UNSAFE_ELEMENTS.contains(&name.as_str()) {
                trace!(element = %name, "Dropping raw-text element inside foreign content");
                doc.clear_parent(node);
                stats.elements_dropped += 1;
                continue;
            }
            let child_foreign = in_foreign || name == "svg" || name == "math";

            let classification = policy.classify(&name, doc.attrs(node));
            match classification.disposition {
                Disposition::Drop => {
                    trace!(element = %name, "Dropping element");
                    doc.clear_parent(node);
                    stats.elements_dropped += 1;
                }
                Disposition::Unwrap => {
                    trace!(element = %name, "Unwrapping element");
                    let children = doc.take_children(node);
                    doc.clear_parent(node);
                    stats.elements_unwrapped += 1;
                    for child in children.into_iter().rev() {
                        queue.push_front((child, child_foreign));
                    }
                }
                Disposition::Escape => {
                    trace!(element = %name, "Escaping element");
                    let markup = serialize_node(doc, node);
                    doc.clear_parent(node);
                    survivors.push(doc.new_text(&markup));
                    stats.elements_escaped += 1;
                }
                Disposition::Flatten => {
                    trace!(element = %name, "Flattening element to text");
                    let text = visible_text(doc, node, policy);
                    doc.clear_parent(node);
                    if !text.is_empty() {
                        survivors.push(doc.new_text(&text));
                    }
                    stats.elements_flattened += 1;
                }
                Disposition::Keep { name: new_name } => {
                    if new_name != name {
                        stats.elements_renamed += 1;
                    }

                    let mut kept = Vec::with_capacity(classification.attributes.len());
                    for (attr, (_, decision)) in doc.attrs(node).iter().zip(&classification.attributes) {
                        match decision {
                            AttributeDecision::Allowed => kept.push(attr.clone()),
                            AttributeDecision::Stripped => stats.attributes_stripped += 1,
                            AttributeDecision::Rewritten(value) => {
                                stats.attributes_rewritten += 1;
                                kept.push(Attribute::new(attr.name.clone(), value.clone()));
                            }
                        }
                    }
                    stats.attributes_injected += classification.injected.len();
                    kept.extend(
                        classification
                            .injected
                            .into_iter()
                            .map(|(name, value)| Attribute::new(name, value)),
                    );

                    *doc.data_mut(node) = NodeData::Element {
                        name: new_name,
                        attrs: kept,
                    };
                    stats.elements_kept += 1;
                    parents.push((node, child_foreign));

                    // A wrapper directly inside the same element would be
                    // split apart again by the parser.
                    match classification.wrapper {
                        Some(wrapper) if doc.element_name(parent) != Some(wrapper.as_str()) => {
                            let outer = doc.new_element(&wrapper, Vec::new());
                            doc.set_children(outer, vec![node]);
                            survivors.push(outer);
                            stats.elements_wrapped += 1;
                        }
                        _ => survivors.push(node),
                    }
                }
            }
        }

        doc.set_children(parent, survivors);
    }

    stats
}
