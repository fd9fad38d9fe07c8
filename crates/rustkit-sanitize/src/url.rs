//! URL classification for URL-valued attributes.
//!
//! Browsers ignore ASCII tab and newline inside URLs and trim leading
//! control characters and spaces, so `java\tscript:` still runs script. The
//! classifier removes every control and whitespace character before looking
//! for a scheme, which is at least as aggressive as any browser.

/// What kind of reference an attribute value is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// Explicit scheme, lowercased.
    Absolute { scheme: String },
    /// `//host/path`
    SchemeRelative,
    /// Path, query or fragment reference (including the empty string).
    Relative,
    /// Something before a `:` that cannot be a scheme.
    Invalid,
}

/// Remove control and whitespace characters.
pub fn clean_url(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect()
}

/// RFC 3986 scheme syntax: a letter followed by letters, digits, `+`, `-` or `.`.
pub fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Classify an attribute value as a URL.
pub fn classify_url(value: &str) -> UrlKind {
    classify_cleaned(&clean_url(value))
}

pub(crate) fn classify_cleaned(cleaned: &str) -> UrlKind {
    if let Some(colon) = cleaned.find(':') {
        let before = &cleaned[..colon];
        if !before.contains(|c: char| matches!(c, '/' | '?' | '#')) {
            return if is_valid_scheme(before) {
                UrlKind::Absolute {
                    scheme: before.to_ascii_lowercase(),
                }
            } else {
                UrlKind::Invalid
            };
        }
    }

    // Browsers read `\` as `/` in http(s) URLs, so `/\host` is scheme-relative too.
    let mut leading = cleaned.chars().take(2);
    if matches!(leading.next(), Some('/' | '\\')) && matches!(leading.next(), Some('/' | '\\')) {
        return UrlKind::SchemeRelative;
    }

    UrlKind::Relative
}

/// Split a `srcset` value into (url, descriptor) candidates.
pub fn srcset_candidates(value: &str) -> Vec<(&str, &str)> {
    value
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| match candidate.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((url, descriptor)) => (url, descriptor.trim()),
            None => (candidate, ""),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme(s: &str) -> UrlKind {
        UrlKind::Absolute {
            scheme: s.to_string(),
        }
    }

    #[test]
    fn test_absolute_urls() {
        assert_eq!(classify_url("https://example.com"), scheme("https"));
        assert_eq!(classify_url("MAILTO:a@b.c"), scheme("mailto"));
        assert_eq!(classify_url("javascript:alert(1)"), scheme("javascript"));
    }

    #[test]
    fn test_obfuscated_schemes() {
        assert_eq!(classify_url("java\tscript:alert(1)"), scheme("javascript"));
        assert_eq!(classify_url(" \x01javascript:x"), scheme("javascript"));
        assert_eq!(classify_url("jav\u{7f}ascript:x"), scheme("javascript"));
        assert_eq!(classify_url("java\nscript:x"), scheme("javascript"));
        assert_eq!(classify_url("JaVaScRiPt:x"), scheme("javascript"));
        assert_eq!(classify_url("java\u{0085}script:x"), scheme("javascript"));
    }

    #[test]
    fn test_invalid_schemes() {
        assert_eq!(classify_url("java\u{FFFD}script:x"), UrlKind::Invalid);
        assert_eq!(classify_url(":x"), UrlKind::Invalid);
        assert_eq!(classify_url("1http:x"), UrlKind::Invalid);
    }

    #[test]
    fn test_relative_urls() {
        assert_eq!(classify_url("/path:with-colon"), UrlKind::Relative);
        assert_eq!(classify_url("page?x=a:b"), UrlKind::Relative);
        assert_eq!(classify_url("#frag:x"), UrlKind::Relative);
        assert_eq!(classify_url(""), UrlKind::Relative);
        assert_eq!(classify_url("images/a.png"), UrlKind::Relative);
    }

    #[test]
    fn test_scheme_relative() {
        assert_eq!(classify_url("//evil.example/x"), UrlKind::SchemeRelative);
        assert_eq!(classify_url("/\\evil.example"), UrlKind::SchemeRelative);
        assert_eq!(classify_url(" / /evil.example"), UrlKind::SchemeRelative);
    }

    #[test]
    fn test_srcset_candidates() {
        assert_eq!(
            srcset_candidates("a.png 1x, https://x/b.png  2x,,c.png"),
            vec![("a.png", "1x"), ("https://x/b.png", "2x"), ("c.png", "")]
        );
    }
}
