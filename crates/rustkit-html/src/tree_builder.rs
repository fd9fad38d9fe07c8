//! HTML tree builder.
//!
//! Implements the HTML5 tree construction algorithm for a fragment parsed in
//! body context: scopes, implied end tags, the list of active formatting
//! elements with the adoption agency algorithm, table insertion modes and
//! foster parenting. The fragment root stands in for the `html` element and
//! is never popped.
//!
//! Nesting is bounded: once the stack holds `max_depth` elements, further
//! start tags are flattened into the current node.

use std::collections::HashMap;

use crate::tokenizer::{Attribute, Token};
use crate::{ParseOptions, TreeSink};
use tracing::trace;

/// Insertion mode for tree construction, derived from the open elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertionMode {
    InBody,
    InTable,
    InTableBody,
    InRow,
    InCell,
    InCaption,
    InColumnGroup,
}

/// Void elements that cannot have children.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "hr", "img", "input", "keygen",
    "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is read by the tokenizer as text.
pub const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
    "textarea", "title",
];

/// Start tags that close an open `p` in button scope.
const P_CLOSING_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "details", "dialog", "dir", "div",
    "dl", "fieldset", "figcaption", "figure", "footer", "header", "hgroup", "main", "menu", "nav",
    "ol", "p", "search", "section", "summary", "ul",
];

/// End tags that close through implied end tags when in scope.
const BLOCK_END_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "button", "center", "details", "dialog", "dir",
    "div", "dl", "fieldset", "figcaption", "figure", "footer", "header", "hgroup", "listing",
    "main", "menu", "nav", "ol", "pre", "search", "section", "summary", "template", "ul",
];

const FORMATTING_ELEMENTS: &[&str] = &[
    "a", "b", "big", "code", "em", "font", "i", "nobr", "s", "small", "strike", "strong", "tt",
    "u",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const IMPLIED_END_TAGS: &[&str] = &[
    "dd", "dt", "li", "optgroup", "option", "p", "rb", "rp", "rt", "rtc",
];

const DEFAULT_SCOPE: &[&str] = &[
    "applet", "caption", "html", "table", "td", "th", "marquee", "object", "template", "svg",
    "math",
];

const TABLE_SCOPE: &[&str] = &["html", "table", "template"];

/// Elements in the "special" category.
const SPECIAL_ELEMENTS: &[&str] = &[
    "address", "applet", "area", "article", "aside", "base", "basefont", "bgsound",
    "blockquote", "body", "br", "button", "caption", "center", "col", "colgroup", "dd",
    "details", "dir", "div", "dl", "dt", "embed", "fieldset", "figcaption", "figure", "footer",
    "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup",
    "hr", "html", "iframe", "img", "input", "keygen", "li", "link", "listing", "main",
    "marquee", "menu", "meta", "nav", "noembed", "noframes", "noscript", "object", "ol", "p",
    "param", "plaintext", "pre", "script", "search", "section", "select", "source", "style",
    "summary", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "title",
    "tr", "track", "ul", "wbr", "xmp",
];

fn is_special(name: &str) -> bool {
    SPECIAL_ELEMENTS.contains(&name)
}

fn is_table_whitespace(text: &str) -> bool {
    text.chars()
        .all(|c| matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' '))
}

/// Entry in the list of active formatting elements.
#[derive(Debug, Clone)]
enum FormattingEntry<N> {
    Marker,
    Element {
        node: N,
        name: String,
        attrs: Vec<Attribute>,
    },
}

/// HTML tree builder.
pub struct TreeBuilder<S: TreeSink> {
    sink: S,
    max_depth: usize,
    open_elements: Vec<(String, S::NodeId)>,
    active_formatting: Vec<FormattingEntry<S::NodeId>>,
    form_element: Option<S::NodeId>,
    foster_parenting: bool,
    /// Drop a leading newline from the next text token (`pre`, `listing`, `textarea`)
    skip_newline: bool,
    /// Start tags flattened past the depth bound, waiting for their end tags
    overflow: Vec<String>,
    overflow_counts: HashMap<String, usize>,
}

impl<S: TreeSink> TreeBuilder<S> {
    pub fn new(sink: S, options: ParseOptions) -> Self {
        let root = sink.document();
        Self {
            sink,
            max_depth: options.max_depth,
            open_elements: vec![("html".to_string(), root)],
            active_formatting: Vec::new(),
            form_element: None,
            foster_parenting: false,
            skip_newline: false,
            overflow: Vec::new(),
            overflow_counts: HashMap::new(),
        }
    }

    /// Feed every token and hand back the sink.
    pub fn build(mut self, tokens: Vec<Token>) -> S {
        for token in tokens {
            self.process_token(token);
        }
        self.sink
    }

    // ==================== Stack of open elements ====================

    fn current_node(&self) -> &(String, S::NodeId) {
        // The root entry is never popped.
        &self.open_elements[self.open_elements.len() - 1]
    }

    fn current_name(&self) -> &str {
        &self.current_node().0
    }

    fn current_id(&self) -> S::NodeId {
        self.current_node().1
    }

    fn at_depth_limit(&self) -> bool {
        self.open_elements.len() > self.max_depth
    }

    fn stack_position(&self, node: S::NodeId) -> Option<usize> {
        self.open_elements.iter().rposition(|(_, id)| *id == node)
    }

    fn pop(&mut self) -> Option<(String, S::NodeId)> {
        if self.open_elements.len() <= 1 {
            return None;
        }
        // Flattened elements lived inside whatever is closing now.
        self.clear_overflow();
        self.open_elements.pop()
    }

    fn pop_until(&mut self, tag_name: &str) {
        if !self.open_elements[1..].iter().any(|(name, _)| name == tag_name) {
            return;
        }
        while let Some((name, _)) = self.pop() {
            if name == tag_name {
                break;
            }
        }
    }

    fn pop_until_one_of(&mut self, names: &[&str]) {
        if !self.open_elements[1..]
            .iter()
            .any(|(name, _)| names.contains(&name.as_str()))
        {
            return;
        }
        while let Some((name, _)) = self.pop() {
            if names.contains(&name.as_str()) {
                break;
            }
        }
    }

    fn remove_from_stack(&mut self, node: S::NodeId) {
        if let Some(index) = self.stack_position(node) {
            if index > 0 {
                self.clear_overflow();
                self.open_elements.remove(index);
            }
        }
    }

    fn in_scope_with(&self, tag_name: &str, extra: &[&str]) -> bool {
        for (name, _) in self.open_elements.iter().rev() {
            if name == tag_name {
                return true;
            }
            if DEFAULT_SCOPE.contains(&name.as_str()) || extra.contains(&name.as_str()) {
                return false;
            }
        }
        false
    }

    fn has_element_in_scope(&self, tag_name: &str) -> bool {
        self.in_scope_with(tag_name, &[])
    }

    fn has_element_in_button_scope(&self, tag_name: &str) -> bool {
        self.in_scope_with(tag_name, &["button"])
    }

    fn has_element_in_list_item_scope(&self, tag_name: &str) -> bool {
        self.in_scope_with(tag_name, &["ol", "ul"])
    }

    fn has_element_in_table_scope(&self, tag_name: &str) -> bool {
        for (name, _) in self.open_elements.iter().rev() {
            if name == tag_name {
                return true;
            }
            if TABLE_SCOPE.contains(&name.as_str()) {
                return false;
            }
        }
        false
    }

    fn has_heading_in_scope(&self) -> bool {
        for (name, _) in self.open_elements.iter().rev() {
            if HEADINGS.contains(&name.as_str()) {
                return true;
            }
            if DEFAULT_SCOPE.contains(&name.as_str()) {
                return false;
            }
        }
        false
    }

    /// Whether this exact node is in default scope.
    fn node_in_scope(&self, node: S::NodeId) -> bool {
        for (name, id) in self.open_elements.iter().rev() {
            if *id == node {
                return true;
            }
            if DEFAULT_SCOPE.contains(&name.as_str()) {
                return false;
            }
        }
        false
    }

    fn in_foreign_content(&self) -> bool {
        self.open_elements
            .iter()
            .any(|(name, _)| name == "svg" || name == "math")
    }

    fn generate_implied_end_tags(&mut self, except: Option<&str>) {
        loop {
            let name = self.current_name();
            if Some(name) == except || !IMPLIED_END_TAGS.contains(&name) {
                break;
            }
            if self.pop().is_none() {
                break;
            }
        }
    }

    fn close_p_element(&mut self) {
        self.generate_implied_end_tags(Some("p"));
        self.pop_until("p");
    }

    fn close_p_if_in_button_scope(&mut self) {
        if self.has_element_in_button_scope("p") {
            self.close_p_element();
        }
    }

    /// Insertion mode follows from the innermost table-related element.
    fn mode(&self) -> InsertionMode {
        for (name, _) in self.open_elements.iter().rev() {
            match name.as_str() {
                "td" | "th" => return InsertionMode::InCell,
                "tr" => return InsertionMode::InRow,
                "tbody" | "thead" | "tfoot" => return InsertionMode::InTableBody,
                "caption" => return InsertionMode::InCaption,
                "colgroup" => return InsertionMode::InColumnGroup,
                "table" => return InsertionMode::InTable,
                _ => {}
            }
        }
        InsertionMode::InBody
    }

    // ==================== Depth bound ====================

    fn clear_overflow(&mut self) {
        if !self.overflow.is_empty() {
            self.overflow.clear();
            self.overflow_counts.clear();
        }
    }

    fn push_overflow(&mut self, name: &str) {
        self.overflow.push(name.to_string());
        *self.overflow_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Swallow the end tag of a flattened element. Closing an outer one
    /// closes everything flattened inside it.
    fn take_overflow_end_tag(&mut self, name: &str) -> bool {
        if self.overflow_counts.get(name).copied().unwrap_or(0) == 0 {
            return false;
        }
        while let Some(entry) = self.overflow.pop() {
            if let Some(count) = self.overflow_counts.get_mut(&entry) {
                *count -= 1;
            }
            if entry == name {
                break;
            }
        }
        true
    }

    // ==================== Insertion ====================

    /// Where a new node goes: (parent, insert-before reference).
    fn appropriate_place(&self, target: (&str, S::NodeId)) -> (S::NodeId, Option<S::NodeId>) {
        let (target_name, target_id) = target;
        if self.foster_parenting
            && matches!(target_name, "table" | "tbody" | "tfoot" | "thead" | "tr")
        {
            if let Some(index) = self.open_elements.iter().rposition(|(n, _)| n == "table") {
                let table = self.open_elements[index].1;
                if let Some(parent) = self.sink.get_parent(table) {
                    return (parent, Some(table));
                }
                return (self.open_elements[index - 1].1, None);
            }
            return (self.open_elements[0].1, None);
        }
        (target_id, None)
    }

    fn current_place(&self) -> (S::NodeId, Option<S::NodeId>) {
        let (name, id) = self.current_node();
        self.appropriate_place((name.as_str(), *id))
    }

    /// Insert an element the parser implies rather than one from a token.
    /// At the depth bound nothing is inserted and nothing is recorded.
    fn insert_implied(&mut self, name: &str, attrs: Vec<Attribute>) -> Option<S::NodeId> {
        if self.at_depth_limit() {
            return None;
        }
        self.insert_element(name, attrs, true)
    }

    /// Create and insert an element. With `push`, it becomes the current node.
    /// Returns `None` when the depth bound flattened it away.
    fn insert_element(
        &mut self,
        name: &str,
        attrs: Vec<Attribute>,
        push: bool,
    ) -> Option<S::NodeId> {
        if push && self.at_depth_limit() {
            trace!(tag = name, depth = self.open_elements.len() - 1, "Flattening start tag past depth limit");
            self.push_overflow(name);
            return None;
        }

        let (parent, before) = self.current_place();
        let node = self.sink.create_element(name, attrs);
        match before {
            Some(reference) => self.sink.insert_before(parent, node, reference),
            None => self.sink.append_child(parent, node),
        }
        if push {
            self.open_elements.push((name.to_string(), node));
        }
        Some(node)
    }

    fn insert_text(&mut self, text: &str) {
        let (parent, before) = self.current_place();
        match before {
            Some(reference) => self.sink.insert_text_before(parent, text, reference),
            None => self.sink.append_text(parent, text),
        }
    }

    fn insert_comment(&mut self, data: &str) {
        let node = self.sink.create_comment(data);
        let parent = self.current_id();
        self.sink.append_child(parent, node);
    }

    // ==================== Active formatting elements ====================

    fn push_formatting(&mut self, node: S::NodeId, name: &str, attrs: Vec<Attribute>) {
        // Noah's Ark: at most three identical entries after the last marker.
        let mut matching = Vec::new();
        for (index, entry) in self.active_formatting.iter().enumerate().rev() {
            match entry {
                FormattingEntry::Marker => break,
                FormattingEntry::Element {
                    name: n, attrs: a, ..
                } => {
                    if n == name && same_attributes(a, &attrs) {
                        matching.push(index);
                    }
                }
            }
        }
        if matching.len() >= 3 {
            if let Some(&earliest) = matching.last() {
                self.active_formatting.remove(earliest);
            }
        }

        self.active_formatting.push(FormattingEntry::Element {
            node,
            name: name.to_string(),
            attrs,
        });
    }

    fn formatting_index_after_marker(&self, tag_name: &str) -> Option<usize> {
        for (index, entry) in self.active_formatting.iter().enumerate().rev() {
            match entry {
                FormattingEntry::Marker => return None,
                FormattingEntry::Element { name, .. } if name == tag_name => return Some(index),
                _ => {}
            }
        }
        None
    }

    fn formatting_index_of(&self, node: S::NodeId) -> Option<usize> {
        self.active_formatting.iter().rposition(|entry| {
            matches!(entry, FormattingEntry::Element { node: n, .. } if *n == node)
        })
    }

    fn clear_formatting_to_marker(&mut self) {
        while let Some(entry) = self.active_formatting.pop() {
            if matches!(entry, FormattingEntry::Marker) {
                break;
            }
        }
    }

    fn entry_is_open_or_marker(&self, index: usize) -> bool {
        match &self.active_formatting[index] {
            FormattingEntry::Marker => true,
            FormattingEntry::Element { node, .. } => self.stack_position(*node).is_some(),
        }
    }

    fn reconstruct_active_formatting_elements(&mut self) {
        let Some(last) = self.active_formatting.len().checked_sub(1) else {
            return;
        };
        if self.entry_is_open_or_marker(last) {
            return;
        }

        let mut first = last;
        while first > 0 && !self.entry_is_open_or_marker(first - 1) {
            first -= 1;
        }

        for index in first..self.active_formatting.len() {
            let (name, attrs) = match &self.active_formatting[index] {
                FormattingEntry::Element { name, attrs, .. } => (name.clone(), attrs.clone()),
                FormattingEntry::Marker => continue,
            };
            trace!(tag = %name, "Reconstructing formatting element");
            let Some(node) = self.insert_implied(&name, attrs.clone()) else {
                return;
            };
            self.active_formatting[index] = FormattingEntry::Element { node, name, attrs };
        }
    }

    /// The adoption agency algorithm for a formatting end tag.
    fn adoption_agency(&mut self, subject: &str) {
        let current = self.current_id();
        if self.current_name() == subject && self.formatting_index_of(current).is_none() {
            self.pop();
            return;
        }

        for _ in 0..8 {
            let Some(fe_index) = self.formatting_index_after_marker(subject) else {
                self.any_other_end_tag(subject);
                return;
            };
            let (fe_node, fe_name, fe_attrs) = match &self.active_formatting[fe_index] {
                FormattingEntry::Element { node, name, attrs } => {
                    (*node, name.clone(), attrs.clone())
                }
                FormattingEntry::Marker => return,
            };

            let Some(fe_stack_index) = self.stack_position(fe_node) else {
                self.active_formatting.remove(fe_index);
                return;
            };
            if !self.node_in_scope(fe_node) {
                return;
            }

            let furthest_block = (fe_stack_index + 1..self.open_elements.len())
                .find(|&i| is_special(&self.open_elements[i].0));
            let Some(fb_stack_index) = furthest_block else {
                while self.open_elements.len() > fe_stack_index {
                    if self.pop().is_none() {
                        break;
                    }
                }
                self.active_formatting.remove(fe_index);
                return;
            };

            let furthest_block = self.open_elements[fb_stack_index].1;
            let common_ancestor = self.open_elements[fe_stack_index - 1].clone();
            let mut bookmark = fe_index;

            let mut node_index = fb_stack_index;
            let mut last_node = furthest_block;
            let mut inner = 0;
            loop {
                inner += 1;
                node_index -= 1;
                let node = self.open_elements[node_index].1;
                if node == fe_node {
                    break;
                }

                let mut node_formatting = self.formatting_index_of(node);
                if inner > 3 {
                    if let Some(index) = node_formatting.take() {
                        self.active_formatting.remove(index);
                        if index < bookmark {
                            bookmark -= 1;
                        }
                    }
                }
                let Some(formatting_index) = node_formatting else {
                    self.open_elements.remove(node_index);
                    continue;
                };

                let (name, attrs) = match &self.active_formatting[formatting_index] {
                    FormattingEntry::Element { name, attrs, .. } => (name.clone(), attrs.clone()),
                    FormattingEntry::Marker => break,
                };
                let replacement = self.sink.create_element(&name, attrs.clone());
                self.active_formatting[formatting_index] = FormattingEntry::Element {
                    node: replacement,
                    name: name.clone(),
                    attrs,
                };
                self.open_elements[node_index] = (name, replacement);

                if last_node == furthest_block {
                    bookmark = formatting_index + 1;
                }
                self.sink.append_child(replacement, last_node);
                last_node = replacement;
            }

            let (parent, before) =
                self.appropriate_place((common_ancestor.0.as_str(), common_ancestor.1));
            self.sink.remove_from_parent(last_node);
            match before {
                Some(reference) => self.sink.insert_before(parent, last_node, reference),
                None => self.sink.append_child(parent, last_node),
            }

            let new_element = self.sink.create_element(&fe_name, fe_attrs.clone());
            self.sink.reparent_children(furthest_block, new_element);
            self.sink.append_child(furthest_block, new_element);

            if let Some(index) = self.formatting_index_of(fe_node) {
                self.active_formatting.remove(index);
                if index < bookmark {
                    bookmark -= 1;
                }
            }
            let bookmark = bookmark.min(self.active_formatting.len());
            self.active_formatting.insert(
                bookmark,
                FormattingEntry::Element {
                    node: new_element,
                    name: fe_name.clone(),
                    attrs: fe_attrs,
                },
            );

            if let Some(index) = self.stack_position(fe_node) {
                self.open_elements.remove(index);
            }
            let fb_position = self
                .stack_position(furthest_block)
                .map(|i| i + 1)
                .unwrap_or(self.open_elements.len());
            self.open_elements
                .insert(fb_position, (fe_name, new_element));
        }
    }

    // ==================== Token dispatch ====================

    fn process_token(&mut self, token: Token) {
        trace!(?token, "Processing token");

        let token = match token {
            Token::Text(text) if self.skip_newline => {
                self.skip_newline = false;
                match text.strip_prefix('\n') {
                    Some("") => return,
                    Some(rest) => Token::Text(rest.to_string()),
                    None => Token::Text(text),
                }
            }
            other => {
                self.skip_newline = false;
                other
            }
        };

        match token {
            Token::Eof => {}
            Token::Doctype { name } => {
                let node = self.sink.create_doctype(&name);
                let parent = self.current_id();
                self.sink.append_child(parent, node);
            }
            Token::EndTag { ref name } if self.take_overflow_end_tag(name) => {
                trace!(tag = %name, "Swallowing end tag of flattened element");
            }
            token => self.dispatch(token),
        }
    }

    fn dispatch(&mut self, token: Token) {
        match self.mode() {
            InsertionMode::InBody => self.in_body(token),
            InsertionMode::InTable => self.in_table(token),
            InsertionMode::InTableBody => self.in_table_body(token),
            InsertionMode::InRow => self.in_row(token),
            InsertionMode::InCell => self.in_cell(token),
            InsertionMode::InCaption => self.in_caption(token),
            InsertionMode::InColumnGroup => self.in_column_group(token),
        }
    }

    // ==================== In body ====================

    fn in_body(&mut self, token: Token) {
        match token {
            Token::Text(text) => self.in_body_text(&text),
            Token::Comment(data) => self.insert_comment(&data),
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => self.in_body_start_tag(name, attrs, self_closing),
            Token::EndTag { name } => self.in_body_end_tag(&name),
            Token::Doctype { .. } | Token::Eof => {}
        }
    }

    fn in_body_text(&mut self, text: &str) {
        if RAW_TEXT_ELEMENTS.contains(&self.current_name()) {
            let parent = self.current_id();
            self.sink.append_text(parent, text);
            return;
        }
        self.reconstruct_active_formatting_elements();
        self.insert_text(text);
    }

    fn in_body_start_tag(&mut self, name: String, attrs: Vec<Attribute>, self_closing: bool) {
        let tag = name.as_str();
        match tag {
            "html" | "head" | "body" | "frameset" => {
                trace!(tag, "Ignoring document-level start tag in fragment");
            }
            "caption" | "col" | "colgroup" | "frame" | "tbody" | "td" | "tfoot" | "th"
            | "thead" | "tr" => {
                trace!(tag, "Ignoring table-part start tag outside table");
            }
            "base" | "basefont" | "bgsound" | "link" | "meta" => {
                self.insert_element(tag, attrs, false);
            }
            "noframes" | "script" | "style" | "template" | "title" | "noembed" | "noscript"
            | "iframe" | "textarea" => {
                self.insert_element(tag, attrs, true);
                if tag == "textarea" {
                    self.skip_newline = true;
                }
            }
            _ if P_CLOSING_ELEMENTS.contains(&tag) => {
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
            }
            _ if HEADINGS.contains(&tag) => {
                self.close_p_if_in_button_scope();
                if HEADINGS.contains(&self.current_name()) {
                    self.pop();
                }
                self.insert_element(tag, attrs, true);
            }
            "pre" | "listing" => {
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
                self.skip_newline = true;
            }
            "form" => {
                if self.form_element.is_some() {
                    trace!("Ignoring nested form");
                    return;
                }
                self.close_p_if_in_button_scope();
                self.form_element = self.insert_element(tag, attrs, true);
            }
            "li" => {
                self.close_list_item(&["li"]);
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
            }
            "dd" | "dt" => {
                self.close_list_item(&["dd", "dt"]);
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
            }
            "plaintext" => {
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
            }
            "button" => {
                if self.has_element_in_scope("button") {
                    self.generate_implied_end_tags(None);
                    self.pop_until("button");
                }
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, true);
            }
            "a" => {
                if let Some(index) = self.formatting_index_after_marker("a") {
                    let existing = match &self.active_formatting[index] {
                        FormattingEntry::Element { node, .. } => Some(*node),
                        FormattingEntry::Marker => None,
                    };
                    self.adoption_agency("a");
                    if let Some(existing) = existing {
                        if let Some(i) = self.formatting_index_of(existing) {
                            self.active_formatting.remove(i);
                        }
                        self.remove_from_stack(existing);
                    }
                }
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element(tag, attrs);
            }
            "nobr" => {
                self.reconstruct_active_formatting_elements();
                if self.has_element_in_scope("nobr") {
                    self.adoption_agency("nobr");
                    self.reconstruct_active_formatting_elements();
                }
                self.insert_formatting_element(tag, attrs);
            }
            _ if FORMATTING_ELEMENTS.contains(&tag) => {
                self.reconstruct_active_formatting_elements();
                self.insert_formatting_element(tag, attrs);
            }
            "applet" | "marquee" | "object" => {
                self.reconstruct_active_formatting_elements();
                if self.insert_element(tag, attrs, true).is_some() {
                    self.active_formatting.push(FormattingEntry::Marker);
                }
            }
            "table" => {
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, true);
            }
            "area" | "br" | "embed" | "img" | "keygen" | "wbr" | "input" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, false);
            }
            "param" | "source" | "track" => {
                self.insert_element(tag, attrs, false);
            }
            "hr" => {
                self.close_p_if_in_button_scope();
                self.insert_element(tag, attrs, false);
            }
            "image" => self.in_body_start_tag("img".to_string(), attrs, self_closing),
            "xmp" => {
                self.close_p_if_in_button_scope();
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, true);
            }
            "select" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, true);
            }
            "optgroup" | "option" => {
                if self.current_name() == "option" {
                    self.pop();
                }
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, true);
            }
            "rb" | "rtc" => {
                if self.has_element_in_scope("ruby") {
                    self.generate_implied_end_tags(None);
                }
                self.insert_element(tag, attrs, true);
            }
            "rp" | "rt" => {
                if self.has_element_in_scope("ruby") {
                    self.generate_implied_end_tags(Some("rtc"));
                }
                self.insert_element(tag, attrs, true);
            }
            "math" | "svg" => {
                self.reconstruct_active_formatting_elements();
                self.insert_element(tag, attrs, !self_closing);
            }
            _ => {
                self.reconstruct_active_formatting_elements();
                let push = !(self_closing && self.in_foreign_content());
                self.insert_element(tag, attrs, push);
            }
        }
    }

    fn insert_formatting_element(&mut self, tag: &str, attrs: Vec<Attribute>) {
        if let Some(node) = self.insert_element(tag, attrs.clone(), true) {
            self.push_formatting(node, tag, attrs);
        }
    }

    /// Shared `li` / `dd` / `dt` start tag handling: close an open item of
    /// the same family unless a special element sits in between.
    fn close_list_item(&mut self, family: &[&str]) {
        for index in (1..self.open_elements.len()).rev() {
            let name = self.open_elements[index].0.clone();
            if family.contains(&name.as_str()) {
                self.generate_implied_end_tags(Some(&name));
                self.pop_until(&name);
                return;
            }
            if is_special(&name) && !matches!(name.as_str(), "address" | "div" | "p") {
                return;
            }
        }
    }

    fn in_body_end_tag(&mut self, name: &str) {
        match name {
            "html" | "body" => {}
            _ if BLOCK_END_ELEMENTS.contains(&name) => {
                if !self.has_element_in_scope(name) {
                    trace!(tag = name, "Ignoring end tag not in scope");
                    return;
                }
                self.generate_implied_end_tags(None);
                self.pop_until(name);
            }
            "form" => {
                let Some(node) = self.form_element.take() else {
                    return;
                };
                if !self.node_in_scope(node) {
                    return;
                }
                self.generate_implied_end_tags(None);
                self.remove_from_stack(node);
            }
            "p" => {
                if !self.has_element_in_button_scope("p") {
                    self.insert_implied("p", Vec::new());
                }
                if self.has_element_in_button_scope("p") {
                    self.close_p_element();
                }
            }
            "li" => {
                if !self.has_element_in_list_item_scope("li") {
                    return;
                }
                self.generate_implied_end_tags(Some("li"));
                self.pop_until("li");
            }
            "dd" | "dt" => {
                if !self.has_element_in_scope(name) {
                    return;
                }
                self.generate_implied_end_tags(Some(name));
                self.pop_until(name);
            }
            _ if HEADINGS.contains(&name) => {
                if !self.has_heading_in_scope() {
                    return;
                }
                self.generate_implied_end_tags(None);
                self.pop_until_one_of(HEADINGS);
            }
            _ if FORMATTING_ELEMENTS.contains(&name) => self.adoption_agency(name),
            "applet" | "marquee" | "object" => {
                if !self.has_element_in_scope(name) {
                    return;
                }
                self.generate_implied_end_tags(None);
                self.pop_until(name);
                self.clear_formatting_to_marker();
            }
            "br" => self.in_body_start_tag("br".to_string(), Vec::new(), false),
            _ => self.any_other_end_tag(name),
        }
    }

    fn any_other_end_tag(&mut self, tag_name: &str) {
        for index in (1..self.open_elements.len()).rev() {
            let name = self.open_elements[index].0.clone();
            if name == tag_name {
                self.generate_implied_end_tags(Some(tag_name));
                while self.open_elements.len() > index {
                    if self.pop().is_none() {
                        break;
                    }
                }
                return;
            }
            if is_special(&name) {
                trace!(tag = tag_name, blocker = %name, "Ignoring end tag behind special element");
                return;
            }
        }
    }

    // ==================== Tables ====================

    fn clear_stack_back_to(&mut self, stop: &[&str]) {
        while !stop.contains(&self.current_name()) && !matches!(self.current_name(), "html" | "template") {
            if self.pop().is_none() {
                break;
            }
        }
    }

    fn in_table_text(&mut self, text: &str) {
        if matches!(self.current_name(), "table" | "tbody" | "tfoot" | "thead" | "tr") {
            if is_table_whitespace(text) {
                self.insert_text(text);
            } else {
                trace!("Foster parenting table text");
                self.foster_parenting = true;
                self.reconstruct_active_formatting_elements();
                self.insert_text(text);
                self.foster_parenting = false;
            }
        } else {
            self.in_body_text(text);
        }
    }

    fn in_table(&mut self, token: Token) {
        match &token {
            Token::Text(text) => self.in_table_text(text),
            Token::Comment(data) => self.insert_comment(data),
            Token::StartTag { name, attrs, .. } if name == "caption" => {
                let attrs = attrs.clone();
                self.clear_stack_back_to(&["table"]);
                if self.insert_element("caption", attrs, true).is_some() {
                    self.active_formatting.push(FormattingEntry::Marker);
                }
            }
            Token::StartTag { name, attrs, .. }
                if matches!(name.as_str(), "colgroup" | "tbody" | "tfoot" | "thead") =>
            {
                let (name, attrs) = (name.clone(), attrs.clone());
                self.clear_stack_back_to(&["table"]);
                self.insert_element(&name, attrs, true);
            }
            Token::StartTag { name, .. } if name == "col" => {
                self.clear_stack_back_to(&["table"]);
                if self.insert_implied("colgroup", Vec::new()).is_some() {
                    self.dispatch(token);
                }
            }
            Token::StartTag { name, .. } if matches!(name.as_str(), "td" | "th" | "tr") => {
                self.clear_stack_back_to(&["table"]);
                if self.insert_implied("tbody", Vec::new()).is_some() {
                    self.dispatch(token);
                }
            }
            Token::StartTag { name, .. } if name == "table" => {
                if !self.has_element_in_table_scope("table") {
                    return;
                }
                self.pop_until("table");
                self.dispatch(token);
            }
            Token::EndTag { name } if name == "table" => {
                if self.has_element_in_table_scope("table") {
                    self.pop_until("table");
                }
            }
            Token::EndTag { name }
                if matches!(
                    name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot"
                        | "th" | "thead" | "tr"
                ) => {}
            Token::StartTag { name, attrs, .. }
                if matches!(name.as_str(), "style" | "script" | "template") =>
            {
                let (name, attrs) = (name.clone(), attrs.clone());
                self.insert_element(&name, attrs, true);
            }
            Token::StartTag { name, attrs, .. }
                if name == "input"
                    && attrs
                        .iter()
                        .any(|a| a.name == "type" && a.value.eq_ignore_ascii_case("hidden")) =>
            {
                let attrs = attrs.clone();
                self.insert_element("input", attrs, false);
            }
            Token::StartTag { name, attrs, .. } if name == "form" => {
                if self.form_element.is_some() {
                    return;
                }
                let attrs = attrs.clone();
                // Inserted and immediately closed.
                self.form_element = self.insert_element("form", attrs, false);
            }
            _ => {
                self.foster_parenting = true;
                self.in_body(token);
                self.foster_parenting = false;
            }
        }
    }

    fn in_table_body(&mut self, token: Token) {
        match &token {
            Token::StartTag { name, .. } if name == "tr" => {
                self.clear_stack_back_to(&["tbody", "tfoot", "thead"]);
                if let Token::StartTag { name, attrs, .. } = token {
                    self.insert_element(&name, attrs, true);
                }
            }
            Token::StartTag { name, .. } if matches!(name.as_str(), "td" | "th") => {
                self.clear_stack_back_to(&["tbody", "tfoot", "thead"]);
                if self.insert_implied("tr", Vec::new()).is_some() {
                    self.dispatch(token);
                }
            }
            Token::EndTag { name } if matches!(name.as_str(), "tbody" | "tfoot" | "thead") => {
                if !self.has_element_in_table_scope(name) {
                    return;
                }
                self.clear_stack_back_to(&["tbody", "tfoot", "thead"]);
                self.pop();
            }
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead"
                ) =>
            {
                self.close_table_section_and_reprocess(token);
            }
            Token::EndTag { name } if name == "table" => {
                self.close_table_section_and_reprocess(token);
            }
            Token::EndTag { name }
                if matches!(
                    name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr"
                ) => {}
            _ => self.in_table(token),
        }
    }

    fn close_table_section_and_reprocess(&mut self, token: Token) {
        if !["tbody", "thead", "tfoot"]
            .iter()
            .any(|name| self.has_element_in_table_scope(name))
        {
            return;
        }
        self.clear_stack_back_to(&["tbody", "tfoot", "thead"]);
        if self.pop().is_some() {
            self.dispatch(token);
        }
    }

    fn in_row(&mut self, token: Token) {
        match &token {
            Token::StartTag { name, .. } if matches!(name.as_str(), "td" | "th") => {
                self.clear_stack_back_to(&["tr"]);
                if let Token::StartTag { name, attrs, .. } = token {
                    if self.insert_element(&name, attrs, true).is_some() {
                        self.active_formatting.push(FormattingEntry::Marker);
                    }
                }
            }
            Token::EndTag { name } if name == "tr" => {
                if !self.has_element_in_table_scope("tr") {
                    return;
                }
                self.clear_stack_back_to(&["tr"]);
                self.pop();
            }
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr"
                ) =>
            {
                self.close_row_and_reprocess(token);
            }
            Token::EndTag { name } if name == "table" => self.close_row_and_reprocess(token),
            Token::EndTag { name } if matches!(name.as_str(), "tbody" | "tfoot" | "thead") => {
                if !self.has_element_in_table_scope(name) {
                    return;
                }
                self.close_row_and_reprocess(token);
            }
            Token::EndTag { name }
                if matches!(
                    name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th"
                ) => {}
            _ => self.in_table(token),
        }
    }

    fn close_row_and_reprocess(&mut self, token: Token) {
        if !self.has_element_in_table_scope("tr") {
            return;
        }
        self.clear_stack_back_to(&["tr"]);
        if self.pop().is_some() {
            self.dispatch(token);
        }
    }

    fn close_cell(&mut self) {
        self.generate_implied_end_tags(None);
        self.pop_until_one_of(&["td", "th"]);
        self.clear_formatting_to_marker();
    }

    fn in_cell(&mut self, token: Token) {
        match &token {
            Token::EndTag { name } if matches!(name.as_str(), "td" | "th") => {
                if !self.has_element_in_table_scope(name) {
                    return;
                }
                self.generate_implied_end_tags(None);
                self.pop_until(name);
                self.clear_formatting_to_marker();
            }
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if !self.has_element_in_table_scope("td") && !self.has_element_in_table_scope("th")
                {
                    return;
                }
                self.close_cell();
                self.dispatch(token);
            }
            Token::EndTag { name }
                if matches!(name.as_str(), "body" | "caption" | "col" | "colgroup" | "html") => {}
            Token::EndTag { name }
                if matches!(name.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr") =>
            {
                if !self.has_element_in_table_scope(name) {
                    return;
                }
                self.close_cell();
                self.dispatch(token);
            }
            _ => self.in_body(token),
        }
    }

    fn close_caption(&mut self) {
        self.generate_implied_end_tags(None);
        self.pop_until("caption");
        self.clear_formatting_to_marker();
    }

    fn in_caption(&mut self, token: Token) {
        match &token {
            Token::EndTag { name } if name == "caption" => {
                if self.has_element_in_table_scope("caption") {
                    self.close_caption();
                }
            }
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if !self.has_element_in_table_scope("caption") {
                    return;
                }
                self.close_caption();
                self.dispatch(token);
            }
            Token::EndTag { name } if name == "table" => {
                if !self.has_element_in_table_scope("caption") {
                    return;
                }
                self.close_caption();
                self.dispatch(token);
            }
            Token::EndTag { name }
                if matches!(
                    name.as_str(),
                    "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr"
                ) => {}
            _ => self.in_body(token),
        }
    }

    fn in_column_group(&mut self, token: Token) {
        match token {
            Token::Text(text) => {
                let trimmed =
                    text.trim_start_matches(|c: char| matches!(c, '\t' | '\n' | '\x0C' | '\r' | ' '));
                let leading = &text[..text.len() - trimmed.len()];
                if !leading.is_empty() {
                    self.insert_text(leading);
                }
                if !trimmed.is_empty() && self.current_name() == "colgroup" {
                    self.pop();
                    self.dispatch(Token::Text(trimmed.to_string()));
                }
            }
            Token::Comment(data) => self.insert_comment(&data),
            Token::StartTag { name, attrs, .. } if name == "col" => {
                self.insert_element(&name, attrs, false);
            }
            Token::EndTag { name } if name == "colgroup" => {
                if self.current_name() == "colgroup" {
                    self.pop();
                }
            }
            Token::EndTag { name } if name == "col" => {}
            token => {
                if self.current_name() == "colgroup" {
                    self.pop();
                    self.dispatch(token);
                }
            }
        }
    }
}

fn same_attributes(a: &[Attribute], b: &[Attribute]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|attr| b.iter().any(|other| other.name == attr.name && other.value == attr.value))
}

/// Build a tree from tokens using the provided sink.
pub fn build_tree<S: TreeSink>(tokens: Vec<Token>, sink: S, options: ParseOptions) -> S {
    TreeBuilder::new(sink, options).build(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeData, NodeId};
    use crate::tokenizer::tokenize;

    fn parse(html: &str) -> Document {
        build_tree(tokenize(html), Document::new(), ParseOptions::default())
    }

    /// Compact markup dump of the parsed tree.
    fn dump(doc: &Document) -> String {
        fn walk(doc: &Document, node: NodeId, out: &mut String) {
            match doc.data(node) {
                NodeData::Document => {}
                NodeData::Text(text) => out.push_str(text),
                NodeData::Comment(data) => {
                    out.push_str("<!--");
                    out.push_str(data);
                    out.push_str("-->");
                }
                NodeData::Doctype { name } => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeData::Element { name, attrs } => {
                    out.push('<');
                    out.push_str(name);
                    for attr in attrs {
                        out.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
                    }
                    out.push('>');
                }
            }
            for &child in doc.children(node) {
                walk(doc, child, out);
            }
            if let NodeData::Element { name, .. } = doc.data(node) {
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
        let mut out = String::new();
        walk(doc, doc.root(), &mut out);
        out
    }

    fn reparse(html: &str) -> String {
        dump(&parse(html))
    }

    #[test]
    fn test_simple_document() {
        assert_eq!(reparse("<p>Hello</p>"), "<p>Hello</p>");
    }

    #[test]
    fn test_void_elements() {
        assert_eq!(reparse("<p>a<br>b<img src=x>c</p>"), "<p>a<br>b<img src=\"x\">c</p>");
        assert_eq!(reparse("<br/>x"), "<br>x");
    }

    #[test]
    fn test_self_closing_ignored_on_normal_elements() {
        assert_eq!(reparse("<div/>x"), "<div>x</div>");
    }

    #[test]
    fn test_implicit_p_closing() {
        assert_eq!(reparse("<p>one<p>two"), "<p>one</p><p>two</p>");
        assert_eq!(reparse("<p>one<div>two</div>"), "<p>one</p><div>two</div>");
    }

    #[test]
    fn test_end_p_without_open_p() {
        assert_eq!(reparse("a</p>b"), "a<p></p>b");
    }

    #[test]
    fn test_list_items_close() {
        assert_eq!(
            reparse("<ul><li>one<li>two</ul>"),
            "<ul><li>one</li><li>two</li></ul>"
        );
        assert_eq!(reparse("<dl><dt>a<dd>b<dt>c</dl>"), "<dl><dt>a</dt><dd>b</dd><dt>c</dt></dl>");
    }

    #[test]
    fn test_nested_headings() {
        assert_eq!(reparse("<h1>a<h2>b</h2>"), "<h1>a</h1><h2>b</h2>");
    }

    #[test]
    fn test_misnested_formatting() {
        assert_eq!(
            reparse("<b>bold<i>both</b>only i</i>"),
            "<b>bold<i>both</i></b><i>only i</i>"
        );
    }

    #[test]
    fn test_adoption_agency_with_block() {
        assert_eq!(reparse("<b>1<p>2</b>3</p>"), "<b>1</b><p><b>2</b>3</p>");
        assert_eq!(
            reparse("<a href=x>1<div>2</a>3</div>"),
            "<a href=\"x\">1</a><div><a href=\"x\">2</a>3</div>"
        );
    }

    #[test]
    fn test_nested_anchor_closes_previous() {
        assert_eq!(reparse("<a>1<a>2</a>"), "<a>1</a><a>2</a>");
    }

    #[test]
    fn test_formatting_reconstruction() {
        assert_eq!(reparse("<p><b>x</p><p>y"), "<p><b>x</b></p><p><b>y</b></p>");
    }

    #[test]
    fn test_noahs_ark() {
        assert_eq!(
            reparse("<b><b><b><b>x</p>y"),
            "<b><b><b><b>x<p></p>y</b></b></b></b>"
        );
        let doc = parse("<p><b><b><b><b>x</p>y");
        // Only three identical entries are reconstructed.
        assert_eq!(dump(&doc), "<p><b><b><b><b>x</b></b></b></b></p><b><b><b>y</b></b></b>");
    }

    #[test]
    fn test_stray_end_tag_behind_special() {
        assert_eq!(reparse("<div><span>a</div>b</span>"), "<div><span>a</span></div>b");
    }

    #[test]
    fn test_table_implied_elements() {
        assert_eq!(
            reparse("<table><tr><td>x</td></tr></table>"),
            "<table><tbody><tr><td>x</td></tr></tbody></table>"
        );
        assert_eq!(
            reparse("<table><col></table>"),
            "<table><colgroup><col></colgroup></table>"
        );
    }

    #[test]
    fn test_table_cells_close() {
        assert_eq!(
            reparse("<table><tr><td>a<td>b<tr><td>c</table>"),
            "<table><tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_foster_parenting() {
        assert_eq!(
            reparse("<table>text<tr><td>x</table>"),
            "text<table><tbody><tr><td>x</td></tr></tbody></table>"
        );
        assert_eq!(
            reparse("<table><b>bold</b><tr><td>x</td></tr></table>"),
            "<b>bold</b><table><tbody><tr><td>x</td></tr></tbody></table>"
        );
        assert_eq!(reparse("<table> </table>"), "<table> </table>");
    }

    #[test]
    fn test_table_parts_ignored_outside_table() {
        assert_eq!(reparse("<td>x</td><tr>y"), "xy");
    }

    #[test]
    fn test_pre_leading_newline() {
        assert_eq!(reparse("<pre>\nx</pre>"), "<pre>x</pre>");
        assert_eq!(reparse("<pre>\n\nx</pre>"), "<pre>\nx</pre>");
        assert_eq!(reparse("<textarea>\nx</textarea>"), "<textarea>x</textarea>");
    }

    #[test]
    fn test_raw_text_does_not_reconstruct() {
        assert_eq!(
            reparse("<b><p>x</b><style>a</style>"),
            "<b></b><p><b>x</b><style>a</style></p>"
        );
    }

    #[test]
    fn test_comments_and_doctype_are_leaves() {
        assert_eq!(reparse("<!DOCTYPE html><p><!--c-->x"), "<!DOCTYPE html><p><!--c-->x</p>");
    }

    #[test]
    fn test_form_pointer() {
        assert_eq!(reparse("<form><form>x</form>"), "<form>x</form>");
    }

    #[test]
    fn test_button_reentrance() {
        assert_eq!(reparse("<button>a<button>b"), "<button>a</button><button>b</button>");
    }

    #[test]
    fn test_image_and_br_end_tag() {
        assert_eq!(reparse("<image src=x>"), "<img src=\"x\">");
        assert_eq!(reparse("a</br>b"), "a<br>b");
    }

    #[test]
    fn test_depth_limit_flattens() {
        let html = "<div>".repeat(10) + "x" + &"</div>".repeat(10) + "y";
        let doc = build_tree(
            tokenize(&html),
            Document::new(),
            ParseOptions::with_max_depth(3),
        );
        assert_eq!(doc.max_element_depth(), 3);
        assert_eq!(dump(&doc), "<div><div><div>x</div></div></div>y");
    }

    #[test]
    fn test_depth_limit_deep_input_is_linear() {
        let depth = 100_000;
        let html = "<span>".repeat(depth) + "x" + &"</span>".repeat(depth);
        let doc = parse(&html);
        assert_eq!(doc.max_element_depth(), 512);
        assert_eq!(doc.text_content(doc.root()), "x");
    }
}
