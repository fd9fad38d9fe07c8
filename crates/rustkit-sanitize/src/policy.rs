//! Allow-list policy and per-element classification.
//!
//! A [`Policy`] is built once through [`PolicyBuilder`] (or taken from one of
//! the presets) and then shared read-only. [`Policy::classify`] looks at one
//! element and its attributes in isolation and decides what the rewriter does
//! with it; nothing about siblings or ancestors enters the decision.

use std::collections::{HashMap, HashSet};

use rustkit_html::Attribute;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{PolicyError, PolicyResult};
use crate::url::{clean_url, classify_cleaned, is_valid_scheme, srcset_candidates, UrlKind};

/// Key in the attribute map that applies to every allowed element.
pub const WILDCARD: &str = "*";

/// Default nesting bound.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 512;

/// Schemes allowed unless the policy says otherwise.
pub const DEFAULT_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Attributes whose values are URLs.
pub const DEFAULT_URL_ATTRIBUTES: &[&str] = &[
    "href", "src", "cite", "action", "formaction", "poster", "background", "longdesc", "usemap",
    "data", "codebase", "ping", "srcset", "xlink:href", "manifest", "icon", "lowsrc", "dynsrc",
    "profile",
];

/// Elements whose content is script, styling or otherwise not prose. When
/// disallowed they are dropped with their content instead of unwrapped.
pub const DROP_BY_DEFAULT: &[&str] = &[
    "script", "style", "template", "iframe", "frame", "frameset", "object", "embed", "applet",
    "noscript", "noembed", "noframes", "xmp", "plaintext", "svg", "math", "textarea", "select",
    "title",
];

/// Class prefixes used by microformats (`h-card`, `u-url`, `dt-published`).
pub const MICROFORMAT_PREFIXES: &[&str] = &["h-", "p-", "u-", "dt-", "e-"];

/// Elements that only make sense when someone means to run or style the page.
const RISKY_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "applet", "frame", "frameset", "base",
    "meta", "link", "form",
];

/// What to do with an element the policy does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementAction {
    /// Remove the element and everything inside it.
    Drop,
    /// Remove the element but keep (and sanitize) its children.
    Unwrap,
    /// Render the element's original markup as visible text.
    Escape,
}

/// How URL attributes without a scheme are treated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RelativeUrls {
    #[default]
    Allow,
    Deny,
    /// Resolve against the base and keep the absolute result.
    RewriteWithBase(Url),
}

/// Outcome for the element itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the element, possibly under a new name.
    Keep { name: String },
    Drop,
    Unwrap,
    Escape,
    /// Replace the element and its subtree with its text content.
    Flatten,
}

/// Outcome for one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeDecision {
    Allowed,
    Stripped,
    /// Keep the attribute with a new value.
    Rewritten(String),
}

/// The policy's verdict on one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub disposition: Disposition,
    /// One decision per input attribute, in input order. Empty unless kept.
    pub attributes: Vec<(String, AttributeDecision)>,
    /// Attributes appended after the surviving ones.
    pub injected: Vec<(String, String)>,
    /// Element to put around the kept element.
    pub wrapper: Option<String>,
}

impl Classification {
    fn without_element(disposition: Disposition) -> Self {
        Self {
            disposition,
            attributes: Vec::new(),
            injected: Vec::new(),
            wrapper: None,
        }
    }

    pub fn element_allowed(&self) -> bool {
        matches!(self.disposition, Disposition::Keep { .. })
    }
}

/// Element names: a letter, then letters, digits or `-`.
pub(crate) fn is_valid_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Attribute names a policy may mention.
pub(crate) fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// An immutable sanitization policy. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Policy {
    pub(crate) allowed_elements: HashSet<String>,
    pub(crate) allowed_attributes: HashMap<String, HashSet<String>>,
    pub(crate) allowed_attribute_prefixes: Vec<String>,
    pub(crate) allowed_url_schemes: HashSet<String>,
    pub(crate) url_attributes: HashSet<String>,
    pub(crate) relative_urls: RelativeUrls,
    pub(crate) element_actions: HashMap<String, ElementAction>,
    pub(crate) default_action: ElementAction,
    pub(crate) force_attributes: HashMap<String, Vec<(String, String)>>,
    pub(crate) allowed_classes: HashMap<String, HashSet<String>>,
    pub(crate) allowed_class_prefixes: HashMap<String, Vec<String>>,
    pub(crate) allowed_attribute_values: HashMap<String, HashMap<String, HashSet<String>>>,
    pub(crate) required_urls: HashMap<String, String>,
    pub(crate) renamed_elements: HashMap<String, String>,
    pub(crate) wrapped_elements: HashMap<String, String>,
    pub(crate) max_nesting_depth: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self::ugc()
    }
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// A builder seeded with this policy, for deriving a variant.
    pub fn to_builder(&self) -> PolicyBuilder {
        PolicyBuilder {
            allowed_elements: self.allowed_elements.clone(),
            allowed_attributes: self.allowed_attributes.clone(),
            allowed_attribute_prefixes: self.allowed_attribute_prefixes.clone(),
            allowed_url_schemes: self.allowed_url_schemes.clone(),
            url_attributes: self.url_attributes.clone(),
            relative_urls: self.relative_urls.clone(),
            element_actions: self.element_actions.clone(),
            default_action: self.default_action,
            force_attributes: self.force_attributes.clone(),
            allowed_classes: self.allowed_classes.clone(),
            allowed_class_prefixes: self.allowed_class_prefixes.clone(),
            allowed_attribute_values: self.allowed_attribute_values.clone(),
            required_urls: self.required_urls.clone(),
            renamed_elements: self.renamed_elements.clone(),
            wrapped_elements: self.wrapped_elements.clone(),
            max_nesting_depth: self.max_nesting_depth,
        }
    }

    pub fn allows_element(&self, name: &str) -> bool {
        self.allowed_elements.contains(name)
    }

    /// Action for an element that is not allowed.
    pub fn action_for(&self, name: &str) -> ElementAction {
        self.element_actions
            .get(name)
            .copied()
            .unwrap_or(self.default_action)
    }

    /// Decide what happens to an element with these attributes.
    pub fn classify(&self, name: &str, attrs: &[Attribute]) -> Classification {
        let effective = self
            .renamed_elements
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);

        if !self.allowed_elements.contains(effective) {
            let disposition = match self.action_for(name) {
                ElementAction::Drop => Disposition::Drop,
                ElementAction::Unwrap => Disposition::Unwrap,
                ElementAction::Escape => Disposition::Escape,
            };
            return Classification::without_element(disposition);
        }

        let forced = self.force_attributes.get(effective);
        let attributes: Vec<(String, AttributeDecision)> = attrs
            .iter()
            .map(|attr| {
                let decision = self.classify_attribute(effective, attr, forced);
                (attr.name.clone(), decision)
            })
            .collect();

        if let Some(required) = self.required_urls.get(effective) {
            let usable = attributes
                .iter()
                .any(|(attr, decision)| attr == required && *decision != AttributeDecision::Stripped);
            if !usable {
                debug!(element = %name, attribute = %required, "No usable URL, keeping only the text");
                return Classification::without_element(Disposition::Flatten);
            }
        }

        Classification {
            disposition: Disposition::Keep {
                name: effective.to_string(),
            },
            attributes,
            injected: forced.cloned().unwrap_or_default(),
            wrapper: self.wrapped_elements.get(name).cloned(),
        }
    }

    /// Whether `attr`'s value passes the value lists for `element` and `*`.
    fn value_permitted(&self, element: &str, attr: &Attribute) -> bool {
        [element, WILDCARD].iter().all(|key| {
            self.allowed_attribute_values
                .get(*key)
                .and_then(|constraints| constraints.get(&attr.name))
                .map_or(true, |values| values.contains(&attr.value))
        })
    }

    fn attribute_allowed(&self, element: &str, name: &str) -> bool {
        let listed = |key: &str| {
            self.allowed_attributes
                .get(key)
                .map(|names| names.contains(name))
                .unwrap_or(false)
        };
        listed(element)
            || listed(WILDCARD)
            || self
                .allowed_attribute_prefixes
                .iter()
                .any(|prefix| name.len() > prefix.len() && name.starts_with(prefix.as_str()))
    }

    fn classify_attribute(
        &self,
        element: &str,
        attr: &Attribute,
        forced: Option<&Vec<(String, String)>>,
    ) -> AttributeDecision {
        let name = attr.name.as_str();

        // Event handlers never survive, whatever the allow-list says.
        if name.starts_with("on") || !is_valid_attribute_name(name) {
            return AttributeDecision::Stripped;
        }
        if forced.is_some_and(|pairs| pairs.iter().any(|(forced_name, _)| forced_name == name)) {
            return AttributeDecision::Stripped;
        }
        if !self.attribute_allowed(element, name) || !self.value_permitted(element, attr) {
            return AttributeDecision::Stripped;
        }

        if name == "class" {
            let classes = self.allowed_classes.get(element);
            let prefixes = self.allowed_class_prefixes.get(element);
            if classes.is_some() || prefixes.is_some() {
                return filter_classes(&attr.value, classes, prefixes.map(Vec::as_slice).unwrap_or(&[]));
            }
        }

        if self.url_attributes.contains(name) {
            return if name == "srcset" {
                self.check_srcset(&attr.value)
            } else {
                self.check_url(&attr.value)
            };
        }

        AttributeDecision::Allowed
    }

    /// Check one URL value against the scheme list and relative-URL mode.
    pub fn check_url(&self, value: &str) -> AttributeDecision {
        let cleaned = clean_url(value);
        match classify_cleaned(&cleaned) {
            UrlKind::Absolute { scheme } => {
                if self.allowed_url_schemes.contains(&scheme) {
                    AttributeDecision::Allowed
                } else {
                    debug!(scheme = %scheme, "Stripping URL with disallowed scheme");
                    AttributeDecision::Stripped
                }
            }
            UrlKind::Invalid => AttributeDecision::Stripped,
            UrlKind::SchemeRelative | UrlKind::Relative => match &self.relative_urls {
                RelativeUrls::Allow => AttributeDecision::Allowed,
                RelativeUrls::Deny => AttributeDecision::Stripped,
                RelativeUrls::RewriteWithBase(base) => match base.join(&cleaned) {
                    Ok(resolved) if self.allowed_url_schemes.contains(resolved.scheme()) => {
                        AttributeDecision::Rewritten(resolved.to_string())
                    }
                    _ => AttributeDecision::Stripped,
                },
            },
        }
    }

    fn check_srcset(&self, value: &str) -> AttributeDecision {
        let mut rebuilt = Vec::new();
        let mut changed = false;

        for (url, descriptor) in srcset_candidates(value) {
            let url = match self.check_url(url) {
                AttributeDecision::Allowed => url.to_string(),
                AttributeDecision::Rewritten(resolved) => {
                    changed = true;
                    resolved
                }
                AttributeDecision::Stripped => return AttributeDecision::Stripped,
            };
            if descriptor.is_empty() {
                rebuilt.push(url);
            } else {
                rebuilt.push(format!("{} {}", url, descriptor));
            }
        }

        if changed {
            AttributeDecision::Rewritten(rebuilt.join(", "))
        } else {
            AttributeDecision::Allowed
        }
    }

    // ==================== Presets ====================

    /// User-generated content: prose formatting, lists, tables, images and
    /// links. Links get `rel="nofollow noopener noreferrer"`.
    pub fn ugc() -> Self {
        PolicyBuilder::new()
            .allow_elements([
                "a", "abbr", "acronym", "b", "bdi", "bdo", "blockquote", "br", "caption", "cite",
                "code", "col", "colgroup", "dd", "del", "details", "dfn", "div", "dl", "dt", "em",
                "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img",
                "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "rp", "rt", "ruby", "s",
                "samp", "small", "span", "strike", "strong", "sub", "summary", "sup", "table",
                "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var", "wbr",
            ])
            .allow_generic_attributes(["dir", "lang", "title"])
            .allow_attributes("a", ["href", "hreflang"])
            .allow_attributes("img", ["src", "alt", "width", "height"])
            .allow_attributes("blockquote", ["cite"])
            .allow_attributes("q", ["cite"])
            .allow_attributes("del", ["cite", "datetime"])
            .allow_attributes("ins", ["cite", "datetime"])
            .allow_attributes("time", ["datetime"])
            .allow_attributes("td", ["colspan", "rowspan", "headers"])
            .allow_attributes("th", ["colspan", "rowspan", "headers", "scope"])
            .allow_attributes("col", ["span"])
            .allow_attributes("colgroup", ["span"])
            .allow_attributes("ol", ["start", "reversed", "type"])
            .allow_attributes("ul", ["type"])
            .allow_attributes("li", ["value"])
            .allow_attributes("details", ["open"])
            .force_attribute("a", "rel", "nofollow noopener noreferrer")
            .into_policy()
    }

    /// Simple text formatting plus images, the classic "basic with images" list.
    pub fn basic_with_images() -> Self {
        PolicyBuilder::new()
            .allow_elements([
                "a", "b", "blockquote", "br", "cite", "code", "dd", "dl", "dt", "em", "i", "li",
                "ol", "p", "pre", "q", "small", "span", "strike", "strong", "sub", "sup", "u",
                "ul", "img",
            ])
            .allow_attributes("a", ["href"])
            .allow_attributes("blockquote", ["cite"])
            .allow_attributes("q", ["cite"])
            .allow_attributes("img", ["align", "alt", "height", "src", "title", "width"])
            .force_attribute("a", "rel", "nofollow")
            .into_policy()
    }

    /// Only anchors to `https` URLs survive; everything else is unwrapped to text.
    pub fn links_only() -> Self {
        PolicyBuilder::new()
            .allow_elements(["a"])
            .allow_attributes("a", ["href"])
            .clear_url_schemes()
            .allow_url_schemes(["https"])
            .relative_urls(RelativeUrls::Deny)
            .force_attribute("a", "rel", "nofollow")
            .into_policy()
    }

    /// No markup at all: every element is shown as escaped text.
    pub fn text_only() -> Self {
        let mut builder = PolicyBuilder::new().default_action(ElementAction::Escape);
        for name in DROP_BY_DEFAULT {
            builder = builder.element_action(name, ElementAction::Escape);
        }
        builder.into_policy()
    }

    /// Short social-network posts: a small element set, microformat and
    /// mention classes only, headings shown as bold paragraphs and links
    /// opening in a new tab. Links to unsupported or relative URLs become
    /// their text.
    pub fn social() -> Self {
        let mut builder = PolicyBuilder::new()
            .allow_elements([
                "p", "br", "span", "a", "del", "pre", "blockquote", "code", "b", "strong", "u",
                "i", "em", "ul", "ol", "li",
            ])
            .allow_attributes("a", ["href", "rel", "class", "translate"])
            .allow_attributes("span", ["class", "translate"])
            .allow_attributes("ol", ["start", "reversed"])
            .allow_attributes("li", ["value"])
            .clear_url_schemes()
            .allow_url_schemes([
                "http", "https", "dat", "dweb", "ipfs", "ipns", "ssb", "gopher", "xmpp", "magnet",
                "gemini",
            ])
            .relative_urls(RelativeUrls::Deny)
            .allow_classes("a", ["mention", "hashtag", "ellipsis", "invisible"])
            .allow_classes("span", ["mention", "hashtag", "ellipsis", "invisible"])
            .allow_class_prefixes("a", MICROFORMAT_PREFIXES)
            .allow_class_prefixes("span", MICROFORMAT_PREFIXES)
            .allow_attribute_values(WILDCARD, "translate", ["no"])
            .require_url("a", "href")
            .force_attribute("a", "rel", "nofollow noopener noreferrer")
            .force_attribute("a", "target", "_blank");
        for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            builder = builder
                .rename_element(heading, "strong")
                .wrap_element(heading, "p");
        }
        builder.into_policy()
    }

    /// Embedded media from link previews: players and frames with `http(s)`
    /// sources only. Frames are always sandboxed.
    pub fn oembed() -> Self {
        PolicyBuilder::new()
            .allow_elements(["audio", "embed", "iframe", "source", "video"])
            .allow_attributes("audio", ["controls"])
            .allow_attributes("embed", ["height", "src", "type", "width"])
            .allow_attributes(
                "iframe",
                ["allowfullscreen", "frameborder", "height", "scrolling", "src", "width"],
            )
            .allow_attributes("source", ["src", "type"])
            .allow_attributes("video", ["controls", "height", "loop", "width"])
            .clear_url_schemes()
            .allow_url_schemes(["http", "https"])
            .relative_urls(RelativeUrls::Deny)
            .force_attribute(
                "iframe",
                "sandbox",
                "allow-scripts allow-same-origin allow-popups allow-popups-to-escape-sandbox allow-forms",
            )
            .into_policy()
    }
}

fn filter_classes(
    value: &str,
    allowed: Option<&HashSet<String>>,
    prefixes: &[String],
) -> AttributeDecision {
    let mut kept: Vec<&str> = Vec::new();
    for class in value.split_ascii_whitespace() {
        let listed = allowed.is_some_and(|names| names.contains(class))
            || prefixes.iter().any(|prefix| class.starts_with(prefix.as_str()));
        if listed && !kept.contains(&class) {
            kept.push(class);
        }
    }
    if kept.is_empty() {
        return AttributeDecision::Stripped;
    }
    let joined = kept.join(" ");
    if joined == value {
        AttributeDecision::Allowed
    } else {
        AttributeDecision::Rewritten(joined)
    }
}

/// Builder for [`Policy`]. Names are lowercased on the way in.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    pub(crate) allowed_elements: HashSet<String>,
    pub(crate) allowed_attributes: HashMap<String, HashSet<String>>,
    pub(crate) allowed_attribute_prefixes: Vec<String>,
    pub(crate) allowed_url_schemes: HashSet<String>,
    pub(crate) url_attributes: HashSet<String>,
    pub(crate) relative_urls: RelativeUrls,
    pub(crate) element_actions: HashMap<String, ElementAction>,
    pub(crate) default_action: ElementAction,
    pub(crate) force_attributes: HashMap<String, Vec<(String, String)>>,
    pub(crate) allowed_classes: HashMap<String, HashSet<String>>,
    pub(crate) allowed_class_prefixes: HashMap<String, Vec<String>>,
    pub(crate) allowed_attribute_values: HashMap<String, HashMap<String, HashSet<String>>>,
    pub(crate) required_urls: HashMap<String, String>,
    pub(crate) renamed_elements: HashMap<String, String>,
    pub(crate) wrapped_elements: HashMap<String, String>,
    pub(crate) max_nesting_depth: usize,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn lower(name: impl AsRef<str>) -> String {
    name.as_ref().trim().to_ascii_lowercase()
}

impl PolicyBuilder {
    /// An empty allow-list with the default schemes, URL attributes and drop list.
    pub fn new() -> Self {
        Self {
            allowed_elements: HashSet::new(),
            allowed_attributes: HashMap::new(),
            allowed_attribute_prefixes: Vec::new(),
            allowed_url_schemes: DEFAULT_URL_SCHEMES.iter().map(|s| s.to_string()).collect(),
            url_attributes: DEFAULT_URL_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            relative_urls: RelativeUrls::Allow,
            element_actions: DROP_BY_DEFAULT
                .iter()
                .map(|name| (name.to_string(), ElementAction::Drop))
                .collect(),
            default_action: ElementAction::Unwrap,
            force_attributes: HashMap::new(),
            allowed_classes: HashMap::new(),
            allowed_class_prefixes: HashMap::new(),
            allowed_attribute_values: HashMap::new(),
            required_urls: HashMap::new(),
            renamed_elements: HashMap::new(),
            wrapped_elements: HashMap::new(),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn allow_elements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_elements.extend(names.into_iter().map(lower));
        self
    }

    pub fn allow_attributes<I, S>(mut self, element: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_attributes
            .entry(lower(element))
            .or_default()
            .extend(names.into_iter().map(lower));
        self
    }

    /// Attributes allowed on every allowed element.
    pub fn allow_generic_attributes<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allow_attributes(WILDCARD, names)
    }

    /// Allow every attribute starting with one of these prefixes (e.g. `data-`).
    pub fn allow_attribute_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prefix in prefixes.into_iter().map(lower) {
            if !self.allowed_attribute_prefixes.contains(&prefix) {
                self.allowed_attribute_prefixes.push(prefix);
            }
        }
        self
    }

    pub fn allow_url_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_url_schemes
            .extend(schemes.into_iter().map(lower));
        self
    }

    /// Forget the default schemes.
    pub fn clear_url_schemes(mut self) -> Self {
        self.allowed_url_schemes.clear();
        self
    }

    /// Treat these attributes as URL-valued, in addition to the defaults.
    pub fn url_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.url_attributes.extend(names.into_iter().map(lower));
        self
    }

    pub fn relative_urls(mut self, mode: RelativeUrls) -> Self {
        self.relative_urls = mode;
        self
    }

    pub fn element_action(mut self, element: &str, action: ElementAction) -> Self {
        self.element_actions.insert(lower(element), action);
        self
    }

    pub fn default_action(mut self, action: ElementAction) -> Self {
        self.default_action = action;
        self
    }

    /// Always set `name="value"` on kept `element`s, replacing any input value.
    pub fn force_attribute(mut self, element: &str, name: &str, value: &str) -> Self {
        let name = lower(name);
        let pairs = self.force_attributes.entry(lower(element)).or_default();
        pairs.retain(|(existing, _)| *existing != name);
        pairs.push((name, value.to_string()));
        self
    }

    /// Restrict `class` on `element` to these tokens.
    pub fn allow_classes<I, S>(mut self, element: &str, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_classes
            .entry(lower(element))
            .or_default()
            .extend(classes.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Also keep `class` tokens on `element` that start with one of these prefixes.
    pub fn allow_class_prefixes<I, S>(mut self, element: &str, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = self.allowed_class_prefixes.entry(lower(element)).or_default();
        for prefix in prefixes {
            let prefix = prefix.as_ref().to_string();
            if !known.contains(&prefix) {
                known.push(prefix);
            }
        }
        self
    }

    /// Keep `attribute` on `element` (or `*`) only when its value is exactly
    /// one of `values`.
    pub fn allow_attribute_values<I, S>(mut self, element: &str, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_attribute_values
            .entry(lower(element))
            .or_default()
            .entry(lower(attribute))
            .or_default()
            .extend(values.into_iter().map(|v| v.as_ref().to_string()));
        self
    }

    /// Replace `element` with its text when `attribute` is missing or its URL
    /// is rejected.
    pub fn require_url(mut self, element: &str, attribute: &str) -> Self {
        self.required_urls.insert(lower(element), lower(attribute));
        self
    }

    /// Put every kept `element` inside a new `wrapper` element. Keyed by the
    /// name in the input, before any rename.
    pub fn wrap_element(mut self, element: &str, wrapper: &str) -> Self {
        self.wrapped_elements.insert(lower(element), lower(wrapper));
        self
    }

    /// Render `from` as `to` (checked against the allow-list under the new name).
    pub fn rename_element(mut self, from: &str, to: &str) -> Self {
        self.renamed_elements.insert(lower(from), lower(to));
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    fn validate(&self) -> PolicyResult<()> {
        if self.max_nesting_depth == 0 {
            return Err(PolicyError::InvalidPolicy(
                "max_nesting_depth must be at least 1".to_string(),
            ));
        }
        if self.allowed_elements.is_empty() && self.default_action == ElementAction::Unwrap {
            return Err(PolicyError::InvalidPolicy(
                "no elements are allowed and the default action is unwrap".to_string(),
            ));
        }

        let element_names = self
            .allowed_elements
            .iter()
            .chain(self.element_actions.keys())
            .chain(self.force_attributes.keys())
            .chain(self.allowed_classes.keys())
            .chain(self.allowed_class_prefixes.keys())
            .chain(self.required_urls.keys())
            .chain(self.renamed_elements.keys())
            .chain(self.renamed_elements.values())
            .chain(self.wrapped_elements.keys())
            .chain(self.wrapped_elements.values())
            .chain(
                self.allowed_attributes
                    .keys()
                    .chain(self.allowed_attribute_values.keys())
                    .filter(|k| k.as_str() != WILDCARD),
            );
        for name in element_names {
            if !is_valid_element_name(name) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "invalid element name {:?}",
                    name
                )));
            }
        }

        let attribute_names = self
            .allowed_attributes
            .values()
            .flatten()
            .chain(self.url_attributes.iter())
            .chain(self.allowed_attribute_prefixes.iter())
            .chain(self.force_attributes.values().flatten().map(|(name, _)| name))
            .chain(self.allowed_attribute_values.values().flat_map(|attrs| attrs.keys()))
            .chain(self.required_urls.values());
        for name in attribute_names {
            if !is_valid_attribute_name(name) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "invalid attribute name {:?}",
                    name
                )));
            }
        }

        for (element, pairs) in &self.force_attributes {
            if let Some((name, _)) = pairs.iter().find(|(name, _)| name.starts_with("on")) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "cannot force event handler {:?} on {:?}",
                    name, element
                )));
            }
        }

        let class_tokens = self
            .allowed_classes
            .values()
            .flatten()
            .chain(self.allowed_class_prefixes.values().flatten());
        for class in class_tokens {
            if class.is_empty() || class.contains(|ch: char| ch.is_ascii_whitespace()) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "invalid class name {:?}",
                    class
                )));
            }
        }

        for (element, attribute) in &self.required_urls {
            if !self.url_attributes.contains(attribute) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "{:?} on {:?} must be a URL attribute to be required",
                    attribute, element
                )));
            }
        }

        for (element, wrapper) in &self.wrapped_elements {
            if !self.allowed_elements.contains(wrapper) {
                return Err(PolicyError::InvalidPolicy(format!(
                    "wrapper {:?} for {:?} is not an allowed element",
                    wrapper, element
                )));
            }
        }

        if let Some(scheme) = self
            .allowed_url_schemes
            .iter()
            .find(|scheme| !is_valid_scheme(scheme))
        {
            return Err(PolicyError::InvalidPolicy(format!(
                "invalid URL scheme {:?}",
                scheme
            )));
        }

        if let RelativeUrls::RewriteWithBase(base) = &self.relative_urls {
            if base.cannot_be_a_base() {
                return Err(PolicyError::InvalidPolicy(format!(
                    "{} cannot be used as a base URL",
                    base
                )));
            }
        }

        Ok(())
    }

    fn warn_about_risky_choices(&self) {
        for name in RISKY_ELEMENTS {
            if self.allowed_elements.contains(*name) {
                warn!(element = *name, "Policy allows an element that can run or restyle the page");
            }
        }
        if self
            .allowed_attributes
            .values()
            .any(|names| names.contains("style"))
        {
            warn!("Policy allows the style attribute; CSS is passed through unchecked");
        }
        for (from, to) in &self.renamed_elements {
            if !self.allowed_elements.contains(to) {
                warn!(from = %from, to = %to, "Rename target is not an allowed element");
            }
        }
    }

    /// Validate and freeze the policy.
    pub fn build(self) -> PolicyResult<Policy> {
        self.validate()?;
        self.warn_about_risky_choices();
        Ok(self.into_policy())
    }

    /// Freeze without validation; the presets are valid by construction.
    pub(crate) fn into_policy(self) -> Policy {
        Policy {
            allowed_elements: self.allowed_elements,
            allowed_attributes: self.allowed_attributes,
            allowed_attribute_prefixes: self.allowed_attribute_prefixes,
            allowed_url_schemes: self.allowed_url_schemes,
            url_attributes: self.url_attributes,
            relative_urls: self.relative_urls,
            element_actions: self.element_actions,
            default_action: self.default_action,
            force_attributes: self.force_attributes,
            allowed_classes: self.allowed_classes,
            allowed_class_prefixes: self.allowed_class_prefixes,
            allowed_attribute_values: self.allowed_attribute_values,
            required_urls: self.required_urls,
            renamed_elements: self.renamed_elements,
            wrapped_elements: self.wrapped_elements,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}
