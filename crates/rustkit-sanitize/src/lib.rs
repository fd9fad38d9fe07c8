//! # RustKit Sanitize
//!
//! Allow-list HTML sanitizer built on the RustKit HTML parser.
//!
//! Input is parsed the way a browser would parse it inside `<body>`, the
//! resulting tree is filtered against a [`Policy`], and the tree is serialized
//! back to markup. Because the output comes from a tree, never from the input
//! text, there is nothing for malformed or obfuscated markup to hide in.
//!
//! ## Features
//!
//! - HTML5 tokenization and tree construction (misnesting, tables, foster parenting)
//! - Element and attribute allow-lists with drop, unwrap and escape actions
//! - URL scheme checks that survive control-character obfuscation
//! - Forced attributes, class and attribute-value lists, element renaming and wrapping
//! - Links that lose their URL can be reduced to their text
//! - Full WHATWG named character reference table
//! - JSON policy documents
//!
//! ## Example
//!
//! ```rust
//! use rustkit_sanitize::{sanitize, Policy};
//!
//! let dirty = r#"<p onclick="x()">Hi <script>alert(1)</script><a href="javascript:alert(1)">there</a></p>"#;
//! assert_eq!(
//!     sanitize(dirty, &Policy::ugc()),
//!     r#"<p>Hi <a rel="nofollow noopener noreferrer">there</a></p>"#
//! );
//! ```

pub mod config;
pub mod error;
pub mod policy;
pub mod rewriter;
pub mod serializer;
pub mod url;

pub use config::{ForcedAttribute, PolicyConfig, RelativeUrlsConfig};
pub use error::{PolicyError, PolicyResult};
pub use policy::{
    AttributeDecision, Classification, Disposition, ElementAction, Policy, PolicyBuilder,
    RelativeUrls,
};
pub use rewriter::{rewrite, SanitizeStats};
pub use serializer::{serialize, serialize_node};

use rustkit_html::{parse_fragment, ParseOptions};
use serde::Serialize;
use tracing::{debug, warn};

/// Upper bound on parse/filter/serialize rounds per call.
pub const MAX_PASSES: usize = 4;

/// Sanitized markup plus what was changed to get there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizationResult {
    pub html: String,
    pub stats: SanitizeStats,
}

/// Sanitize `raw_html` against `policy`. Never fails.
pub fn sanitize(raw_html: &str, policy: &Policy) -> String {
    sanitize_with_stats(raw_html, policy).html
}

/// Like [`sanitize`], also returning counters for the changes made.
///
/// The serialized output is fed back through the pipeline until it stops
/// changing, so the result is a fixed point: sanitizing it again is a no-op.
pub fn sanitize_with_stats(raw_html: &str, policy: &Policy) -> SanitizationResult {
    if raw_html.is_empty() {
        return SanitizationResult::default();
    }

    let (mut html, mut stats) = run_pass(raw_html, policy);
    let mut passes = 1;

    loop {
        if passes == MAX_PASSES {
            warn!(
                passes,
                input_len = raw_html.len(),
                "Sanitized output did not stabilize"
            );
            break;
        }
        let (next, pass_stats) = run_pass(&html, policy);
        passes += 1;
        if next == html {
            break;
        }
        stats.absorb(&pass_stats);
        html = next;
    }

    debug!(
        input_len = raw_html.len(),
        output_len = html.len(),
        passes,
        changes = stats.total_changes(),
        "Sanitized fragment"
    );

    SanitizationResult { html, stats }
}

fn run_pass(input: &str, policy: &Policy) -> (String, SanitizeStats) {
    let options = ParseOptions::with_max_depth(policy.max_nesting_depth());
    let mut doc = parse_fragment(input, options);
    let stats = rewrite(&mut doc, policy);
    (serialize(&doc), stats)
}
