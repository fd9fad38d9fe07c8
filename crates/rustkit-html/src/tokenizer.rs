//! HTML tokenizer.
//!
//! A state machine over the input characters that follows the HTML5
//! tokenization states closely enough to agree with browsers on where tags,
//! attributes, comments and raw text begin and end. It never fails: malformed
//! input always degrades to text or comments.

use tracing::trace;

use crate::entities::{self, Expansion};

/// A single attribute as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Token types emitted by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// DOCTYPE declaration
    Doctype { name: String },
    /// Start tag (e.g., `<div>` or `<img />`)
    StartTag {
        name: String,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    /// End tag (e.g., `</div>`)
    EndTag { name: String },
    /// A run of text, already reference-decoded
    Text(String),
    /// Comment
    Comment(String),
    /// End of file
    Eof,
}

/// Tokenization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    TagOpen,
    EndTagOpen,
    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDoubleQuoted,
    AttributeValueSingleQuoted,
    AttributeValueUnquoted,
    AfterAttributeValueQuoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    CommentStart,
    CommentStartDash,
    Comment,
    CommentEndDash,
    CommentEnd,
    CommentEndBang,
    BogusComment,
    Doctype,
    RawText,
    RcData,
    ScriptData,
    PlainText,
}

/// HTML tokenizer.
pub struct Tokenizer {
    input: Vec<char>,
    pos: usize,
    state: State,
    /// The name of the last emitted start tag (for RAWTEXT/RCDATA/ScriptData end tag matching)
    last_start_tag_name: String,
    /// Position of the `<` that opened the tag being read
    tag_start: usize,
    is_end_tag: bool,
    current_tag_name: String,
    current_attrs: Vec<Attribute>,
    current_attr_name: String,
    current_attr_value: String,
    has_pending_attr: bool,
    self_closing: bool,
    current_comment: String,
    doctype_buffer: String,
    text: String,
    tokens: Vec<Token>,
}

fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0C' | ' ')
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            input: normalized.chars().collect(),
            pos: 0,
            state: State::Data,
            last_start_tag_name: String::new(),
            tag_start: 0,
            is_end_tag: false,
            current_tag_name: String::new(),
            current_attrs: Vec::new(),
            current_attr_name: String::new(),
            current_attr_value: String::new(),
            has_pending_attr: false,
            self_closing: false,
            current_comment: String::new(),
            doctype_buffer: String::new(),
            text: String::new(),
            tokens: Vec::new(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn consume(&mut self) -> Option<char> {
        let ch = self.current_char();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    /// Step back so the character just consumed is read again in the new state.
    fn reconsume(&mut self, state: State) {
        self.pos -= 1;
        self.state = state;
    }

    fn push_text(&mut self, ch: char) {
        self.text.push(ch);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.tokens.push(Token::Text(text));
        }
    }

    fn emit(&mut self, token: Token) {
        self.flush_text();
        self.tokens.push(token);
    }

    fn emit_current_comment(&mut self) {
        let comment = std::mem::take(&mut self.current_comment);
        self.emit(Token::Comment(comment));
    }

    fn emit_current_doctype(&mut self) {
        let buffer = std::mem::take(&mut self.doctype_buffer);
        let name = buffer
            .split(is_whitespace)
            .find(|part| !part.is_empty())
            .unwrap_or("")
            .to_ascii_lowercase();
        self.emit(Token::Doctype { name });
    }

    fn start_tag(&mut self, is_end_tag: bool) {
        self.is_end_tag = is_end_tag;
        self.current_tag_name.clear();
        self.current_attrs.clear();
        self.current_attr_name.clear();
        self.current_attr_value.clear();
        self.has_pending_attr = false;
        self.self_closing = false;
    }

    fn start_new_attr(&mut self) {
        self.commit_attr();
        self.has_pending_attr = true;
    }

    /// Move the attribute being read into the tag. Later duplicates lose.
    fn commit_attr(&mut self) {
        if !self.has_pending_attr {
            return;
        }
        self.has_pending_attr = false;
        let name = std::mem::take(&mut self.current_attr_name);
        let value = std::mem::take(&mut self.current_attr_value);
        if self.current_attrs.iter().any(|attr| attr.name == name) {
            return;
        }
        self.current_attrs.push(Attribute { name, value });
    }

    fn emit_current_tag(&mut self) {
        self.commit_attr();
        let name = std::mem::take(&mut self.current_tag_name);
        let attrs = std::mem::take(&mut self.current_attrs);

        if self.is_end_tag {
            // Attributes on end tags are parsed and then thrown away.
            self.emit(Token::EndTag { name });
            self.state = State::Data;
            return;
        }

        self.state = match name.as_str() {
            "script" => State::ScriptData,
            "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => State::RawText,
            "textarea" | "title" => State::RcData,
            "plaintext" => State::PlainText,
            _ => State::Data,
        };
        if self.state != State::Data {
            trace!(tag = %name, state = ?self.state, "Switching to text content");
        }
        self.last_start_tag_name = name.clone();
        self.emit(Token::StartTag {
            name,
            attrs,
            self_closing: self.self_closing,
        });
    }

    /// Decode a character reference after `&`, or keep the ampersand.
    fn consume_reference(&mut self, in_attribute: bool) -> Expansion {
        match entities::decode_reference(&self.input[self.pos..], in_attribute) {
            Some((expansion, used)) => {
                self.pos += used;
                expansion
            }
            None => Expansion::single('&'),
        }
    }

    /// Tokenize the input.
    pub fn tokenize(mut self) -> Vec<Token> {
        while let Some(ch) = self.consume() {
            match self.state {
                State::Data => self.state_data(ch),
                State::TagOpen => self.state_tag_open(ch),
                State::EndTagOpen => self.state_end_tag_open(ch),
                State::TagName => self.state_tag_name(ch),
                State::BeforeAttributeName => self.state_before_attribute_name(ch),
                State::AttributeName => self.state_attribute_name(ch),
                State::AfterAttributeName => self.state_after_attribute_name(ch),
                State::BeforeAttributeValue => self.state_before_attribute_value(ch),
                State::AttributeValueDoubleQuoted => self.state_attribute_value_quoted(ch, '"'),
                State::AttributeValueSingleQuoted => self.state_attribute_value_quoted(ch, '\''),
                State::AttributeValueUnquoted => self.state_attribute_value_unquoted(ch),
                State::AfterAttributeValueQuoted => self.state_after_attribute_value_quoted(ch),
                State::SelfClosingStartTag => self.state_self_closing_start_tag(ch),
                State::MarkupDeclarationOpen => self.state_markup_declaration_open(ch),
                State::CommentStart => self.state_comment_start(ch),
                State::CommentStartDash => self.state_comment_start_dash(ch),
                State::Comment => self.state_comment(ch),
                State::CommentEndDash => self.state_comment_end_dash(ch),
                State::CommentEnd => self.state_comment_end(ch),
                State::CommentEndBang => self.state_comment_end_bang(ch),
                State::BogusComment => self.state_bogus_comment(ch),
                State::Doctype => self.state_doctype(ch),
                State::RawText | State::ScriptData => self.state_rawtext(ch, false),
                State::RcData => self.state_rawtext(ch, true),
                State::PlainText => self.state_plaintext(ch),
            }
        }

        self.handle_eof();
        self.emit(Token::Eof);
        self.tokens
    }

    fn handle_eof(&mut self) {
        match self.state {
            State::Data
            | State::RawText
            | State::RcData
            | State::ScriptData
            | State::PlainText => {}
            State::TagOpen => self.push_text('<'),
            State::EndTagOpen => {
                self.push_text('<');
                self.push_text('/');
            }
            State::TagName
            | State::BeforeAttributeName
            | State::AttributeName
            | State::AfterAttributeName
            | State::BeforeAttributeValue
            | State::AttributeValueDoubleQuoted
            | State::AttributeValueSingleQuoted
            | State::AttributeValueUnquoted
            | State::AfterAttributeValueQuoted
            | State::SelfClosingStartTag => {
                // An unterminated tag is just text.
                let raw: Vec<char> = self.input[self.tag_start..]
                    .iter()
                    .copied()
                    .filter(|c| *c != '\0')
                    .collect();
                self.text.extend(raw);
            }
            State::MarkupDeclarationOpen
            | State::CommentStart
            | State::CommentStartDash
            | State::Comment
            | State::CommentEndDash
            | State::CommentEnd
            | State::CommentEndBang
            | State::BogusComment => self.emit_current_comment(),
            State::Doctype => self.emit_current_doctype(),
        }
        self.state = State::Data;
    }

    fn state_data(&mut self, ch: char) {
        match ch {
            '&' => {
                let decoded = self.consume_reference(false);
                self.text.extend(decoded);
            }
            '<' => {
                self.tag_start = self.pos - 1;
                self.state = State::TagOpen;
            }
            '\0' => {}
            c => self.push_text(c),
        }
    }

    fn state_tag_open(&mut self, ch: char) {
        match ch {
            '!' => self.state = State::MarkupDeclarationOpen,
            '/' => self.state = State::EndTagOpen,
            c if c.is_ascii_alphabetic() => {
                self.start_tag(false);
                self.reconsume(State::TagName);
            }
            '?' => {
                self.current_comment.clear();
                self.reconsume(State::BogusComment);
            }
            _ => {
                self.push_text('<');
                self.reconsume(State::Data);
            }
        }
    }

    fn state_end_tag_open(&mut self, ch: char) {
        match ch {
            c if c.is_ascii_alphabetic() => {
                self.start_tag(true);
                self.reconsume(State::TagName);
            }
            // `</>` is dropped entirely
            '>' => self.state = State::Data,
            _ => {
                self.current_comment.clear();
                self.reconsume(State::BogusComment);
            }
        }
    }

    fn state_tag_name(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => self.state = State::BeforeAttributeName,
            '/' => self.state = State::SelfClosingStartTag,
            '>' => self.emit_current_tag(),
            '\0' => self.current_tag_name.push('\u{FFFD}'),
            c => self.current_tag_name.push(c.to_ascii_lowercase()),
        }
    }

    fn state_before_attribute_name(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => {}
            '/' | '>' => self.reconsume(State::AfterAttributeName),
            '=' => {
                self.start_new_attr();
                self.current_attr_name.push('=');
                self.state = State::AttributeName;
            }
            _ => {
                self.start_new_attr();
                self.reconsume(State::AttributeName);
            }
        }
    }

    fn state_attribute_name(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) || c == '/' || c == '>' => {
                self.reconsume(State::AfterAttributeName)
            }
            '=' => self.state = State::BeforeAttributeValue,
            '\0' => self.current_attr_name.push('\u{FFFD}'),
            c => self.current_attr_name.push(c.to_ascii_lowercase()),
        }
    }

    fn state_after_attribute_name(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => {}
            '/' => self.state = State::SelfClosingStartTag,
            '=' => self.state = State::BeforeAttributeValue,
            '>' => self.emit_current_tag(),
            _ => {
                self.start_new_attr();
                self.reconsume(State::AttributeName);
            }
        }
    }

    fn state_before_attribute_value(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => {}
            '"' => self.state = State::AttributeValueDoubleQuoted,
            '\'' => self.state = State::AttributeValueSingleQuoted,
            '>' => self.emit_current_tag(),
            _ => self.reconsume(State::AttributeValueUnquoted),
        }
    }

    fn state_attribute_value_quoted(&mut self, ch: char, quote: char) {
        match ch {
            c if c == quote => self.state = State::AfterAttributeValueQuoted,
            '&' => {
                let decoded = self.consume_reference(true);
                self.current_attr_value.extend(decoded);
            }
            '\0' => self.current_attr_value.push('\u{FFFD}'),
            c => self.current_attr_value.push(c),
        }
    }

    fn state_attribute_value_unquoted(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => self.state = State::BeforeAttributeName,
            '&' => {
                let decoded = self.consume_reference(true);
                self.current_attr_value.extend(decoded);
            }
            '>' => self.emit_current_tag(),
            '\0' => self.current_attr_value.push('\u{FFFD}'),
            c => self.current_attr_value.push(c),
        }
    }

    fn state_after_attribute_value_quoted(&mut self, ch: char) {
        match ch {
            c if is_whitespace(c) => self.state = State::BeforeAttributeName,
            '/' => self.state = State::SelfClosingStartTag,
            '>' => self.emit_current_tag(),
            _ => self.reconsume(State::BeforeAttributeName),
        }
    }

    fn state_self_closing_start_tag(&mut self, ch: char) {
        match ch {
            '>' => {
                self.self_closing = true;
                self.emit_current_tag();
            }
            _ => self.reconsume(State::BeforeAttributeName),
        }
    }

    fn state_markup_declaration_open(&mut self, _ch: char) {
        // The first character after `<!` is already consumed; step back to it.
        self.pos -= 1;
        self.current_comment.clear();

        if self.matches_exact("--") {
            self.pos += 2;
            self.state = State::CommentStart;
        } else if self.matches_case_insensitive("doctype") {
            self.pos += 7;
            self.doctype_buffer.clear();
            self.state = State::Doctype;
        } else if self.matches_exact("[CDATA[") {
            self.pos += 7;
            self.current_comment.push_str("[CDATA[");
            self.state = State::BogusComment;
        } else {
            self.state = State::BogusComment;
        }
    }

    fn matches_exact(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, expected)| self.peek_char(i) == Some(expected))
    }

    fn matches_case_insensitive(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, expected)| {
            self.peek_char(i)
                .map(|c| c.eq_ignore_ascii_case(&expected))
                .unwrap_or(false)
        })
    }

    fn state_comment_start(&mut self, ch: char) {
        match ch {
            '-' => self.state = State::CommentStartDash,
            // `<!-->`
            '>' => {
                self.emit_current_comment();
                self.state = State::Data;
            }
            _ => self.reconsume(State::Comment),
        }
    }

    fn state_comment_start_dash(&mut self, ch: char) {
        match ch {
            '-' => self.state = State::CommentEnd,
            // `<!--->`
            '>' => {
                self.emit_current_comment();
                self.state = State::Data;
            }
            _ => {
                self.current_comment.push('-');
                self.reconsume(State::Comment);
            }
        }
    }

    fn state_comment(&mut self, ch: char) {
        match ch {
            '-' => self.state = State::CommentEndDash,
            '\0' => self.current_comment.push('\u{FFFD}'),
            c => self.current_comment.push(c),
        }
    }

    fn state_comment_end_dash(&mut self, ch: char) {
        match ch {
            '-' => self.state = State::CommentEnd,
            _ => {
                self.current_comment.push('-');
                self.reconsume(State::Comment);
            }
        }
    }

    fn state_comment_end(&mut self, ch: char) {
        match ch {
            '>' => {
                self.emit_current_comment();
                self.state = State::Data;
            }
            '!' => self.state = State::CommentEndBang,
            '-' => self.current_comment.push('-'),
            _ => {
                self.current_comment.push_str("--");
                self.reconsume(State::Comment);
            }
        }
    }

    fn state_comment_end_bang(&mut self, ch: char) {
        match ch {
            '-' => {
                self.current_comment.push_str("--!");
                self.state = State::CommentEndDash;
            }
            // `--!>` closes the comment too
            '>' => {
                self.emit_current_comment();
                self.state = State::Data;
            }
            _ => {
                self.current_comment.push_str("--!");
                self.reconsume(State::Comment);
            }
        }
    }

    fn state_bogus_comment(&mut self, ch: char) {
        match ch {
            '>' => {
                self.emit_current_comment();
                self.state = State::Data;
            }
            '\0' => self.current_comment.push('\u{FFFD}'),
            c => self.current_comment.push(c),
        }
    }

    fn state_doctype(&mut self, ch: char) {
        match ch {
            '>' => {
                self.emit_current_doctype();
                self.state = State::Data;
            }
            c => self.doctype_buffer.push(c),
        }
    }

    /// RAWTEXT, script data and RCDATA. Only the appropriate end tag leaves.
    fn state_rawtext(&mut self, ch: char, decode_references: bool) {
        match ch {
            '<' if self.current_char() == Some('/') && self.matches_end_tag(1) => {
                self.tag_start = self.pos - 1;
                self.pos += 1;
                self.start_tag(true);
                self.state = State::TagName;
            }
            '&' if decode_references => {
                let decoded = self.consume_reference(false);
                self.text.extend(decoded);
            }
            '\0' => self.push_text('\u{FFFD}'),
            c => self.push_text(c),
        }
    }

    fn state_plaintext(&mut self, ch: char) {
        match ch {
            '\0' => self.push_text('\u{FFFD}'),
            c => self.push_text(c),
        }
    }

    /// Check whether the input at `pos + offset` names the last start tag and
    /// is followed by whitespace, `/` or `>`.
    fn matches_end_tag(&self, offset: usize) -> bool {
        let name_len = self.last_start_tag_name.chars().count();
        if name_len == 0 {
            return false;
        }
        let name_matches = self
            .last_start_tag_name
            .chars()
            .enumerate()
            .all(|(i, expected)| {
                self.peek_char(offset + i)
                    .map(|c| c.to_ascii_lowercase() == expected)
                    .unwrap_or(false)
            });
        name_matches
            && matches!(
                self.peek_char(offset + name_len),
                Some(c) if is_whitespace(c) || c == '/' || c == '>'
            )
    }
}

/// Tokenize HTML input.
pub fn tokenize(input: &str) -> Vec<Token> {
    Tokenizer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn start(name: &str, attrs: &[(&str, &str)]) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attrs: attrs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect(),
            self_closing: false,
        }
    }

    fn end(name: &str) -> Token {
        Token::EndTag {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_simple_tag() {
        let tokens = tokenize("<div>Hi</div>");
        assert_eq!(tokens, vec![start("div", &[]), text("Hi"), end("div"), Token::Eof]);
    }

    #[test]
    fn test_self_closing_tag() {
        let tokens = tokenize("<br/>");
        assert!(matches!(
            &tokens[0],
            Token::StartTag { name, self_closing: true, .. } if name == "br"
        ));
    }

    #[test]
    fn test_attributes_keep_order_and_first_duplicate() {
        let tokens = tokenize(r#"<a HREF="x" id=y title='z' href="dup" hidden>"#);
        assert_eq!(
            tokens[0],
            start("a", &[("href", "x"), ("id", "y"), ("title", "z"), ("hidden", "")])
        );
    }

    #[test]
    fn test_text_is_coalesced() {
        let tokens = tokenize("a &amp; b < c");
        assert_eq!(tokens, vec![text("a & b < c"), Token::Eof]);
    }

    #[test]
    fn test_crlf_normalized() {
        let tokens = tokenize("a\r\nb\rc");
        assert_eq!(tokens[0], text("a\nb\nc"));
    }

    #[test]
    fn test_nul_handling() {
        let tokens = tokenize("a\0b<d\0iv x=\"\0\">");
        assert_eq!(tokens[0], text("ab"));
        assert_eq!(tokens[1], start("d\u{FFFD}iv", &[("x", "\u{FFFD}")]));
    }

    #[test]
    fn test_comment_forms() {
        assert_eq!(tokenize("<!-- hi -->")[0], Token::Comment(" hi ".into()));
        assert_eq!(tokenize("<!-->x")[0], Token::Comment(String::new()));
        assert_eq!(tokenize("<!--->x")[0], Token::Comment(String::new()));
        assert_eq!(tokenize("<!--a--!>b")[0], Token::Comment("a".into()));
        assert_eq!(tokenize("<!--a--!b-->")[0], Token::Comment("a--!b".into()));
        assert_eq!(tokenize("<!--open")[0], Token::Comment("open".into()));
    }

    #[test]
    fn test_bogus_comments() {
        assert_eq!(tokenize("<?php x ?>")[0], Token::Comment("?php x ?".into()));
        assert_eq!(tokenize("</ x>")[0], Token::Comment(" x".into()));
        assert_eq!(tokenize("<![CDATA[x]]>")[0], Token::Comment("[CDATA[x]]".into()));
        assert_eq!(tokenize("</>"), vec![Token::Eof]);
    }

    #[test]
    fn test_doctype() {
        let tokens = tokenize("<!DOCTYPE html>");
        assert_eq!(tokens[0], Token::Doctype { name: "html".into() });
    }

    #[test]
    fn test_entity_in_attribute() {
        let tokens = tokenize(r#"<a href="?a=1&copy=2&amp;b=&lt;">"#);
        assert_eq!(tokens[0], start("a", &[("href", "?a=1&copy=2&b=<")]));
    }

    #[test]
    fn test_two_code_point_reference() {
        let tokens = tokenize(r#"<a title="&NotEqualTilde;">&check;&nGt;</a>"#);
        assert_eq!(tokens[0], start("a", &[("title", "\u{2242}\u{0338}")]));
        assert_eq!(tokens[1], text("\u{2713}\u{226B}\u{20D2}"));
    }

    #[test]
    fn test_stray_less_than() {
        assert_eq!(tokenize("1 < 2 <3")[0], text("1 < 2 <3"));
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        assert_eq!(tokenize("x<a href='y"), vec![text("x<a href='y"), Token::Eof]);
        assert_eq!(tokenize("<div"), vec![text("<div"), Token::Eof]);
        assert_eq!(tokenize("</div"), vec![text("</div"), Token::Eof]);
    }

    #[test]
    fn test_end_tag_attributes_are_parsed() {
        let tokens = tokenize(r#"</p title=">">x"#);
        assert_eq!(tokens, vec![end("p"), text("x"), Token::Eof]);
    }

    #[test]
    fn test_script_is_raw_text() {
        let tokens = tokenize("<script>if (a < b) { x = '</scr' + 'ipt>'; }</script>");
        assert_eq!(
            tokens,
            vec![
                start("script", &[]),
                text("if (a < b) { x = '</scr' + 'ipt>'; }"),
                end("script"),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_raw_text_end_tag_needs_delimiter() {
        let tokens = tokenize("<style></stylex></STYLE >");
        assert_eq!(
            tokens,
            vec![start("style", &[]), text("</stylex>"), end("style"), Token::Eof]
        );
    }

    #[test]
    fn test_rcdata_decodes_references() {
        let tokens = tokenize("<textarea>&lt;b&gt;<b></textarea>");
        assert_eq!(tokens[1], text("<b><b>"));
    }

    #[test]
    fn test_noscript_is_raw_text() {
        let tokens = tokenize("<noscript><p title=\"</noscript><img>\"></noscript>");
        assert_eq!(tokens[1], text("<p title=\""));
        assert_eq!(tokens[2], end("noscript"));
        assert_eq!(tokens[3], start("img", &[]));
    }

    #[test]
    fn test_plaintext_consumes_rest() {
        let tokens = tokenize("<plaintext></plaintext><b>");
        assert_eq!(tokens[1], text("</plaintext><b>"));
    }

    #[test]
    fn test_slash_between_attributes() {
        let tokens = tokenize("<img/src=x/onerror=y>");
        assert_eq!(tokens[0], start("img", &[("src", "x/onerror=y")]));
    }
}
