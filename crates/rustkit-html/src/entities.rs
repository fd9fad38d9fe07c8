//! HTML character reference decoding.
//!
//! Named references use the full WHATWG table shipped with `markup5ever`
//! (the html5ever data crate), so every name a browser knows decodes here
//! too, including the ones that expand to two code points. Numeric
//! references follow the tokenizer's replacement rules.

use std::collections::HashSet;

use markup5ever::data::NAMED_ENTITIES;

/// Longest name we try to match after `&`.
pub const MAX_NAME_LEN: usize = 32;

lazy_static::lazy_static! {
    /// Names listed without a semicolon, which decode even when it is missing.
    static ref LEGACY_NAMES: HashSet<&'static str> = NAMED_ENTITIES
        .entries()
        .filter(|(name, value)| !name.ends_with(';') && **value != (0, 0))
        .map(|(name, _)| *name)
        .collect();
}

/// The characters a reference expands to: one, or two for names such as
/// `NotEqualTilde;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expansion(char, Option<char>);

impl Expansion {
    pub fn single(ch: char) -> Self {
        Expansion(ch, None)
    }

    pub fn first(&self) -> char {
        self.0
    }

    pub fn second(&self) -> Option<char> {
        self.1
    }
}

impl IntoIterator for Expansion {
    type Item = char;
    type IntoIter = std::iter::Chain<std::iter::Once<char>, std::option::IntoIter<char>>;

    fn into_iter(self) -> Self::IntoIter {
        std::iter::once(self.0).chain(self.1)
    }
}

/// Look up a named reference without the `&`. Pass the `;` when the source
/// has one: `lookup("hellip;")`, `lookup("copy")`.
pub fn lookup(name: &str) -> Option<Expansion> {
    // The table also maps every proper prefix of a name to (0, 0).
    let &(first, second) = NAMED_ENTITIES.get(name)?;
    let first = char::from_u32(first).filter(|_| first != 0)?;
    Some(Expansion(first, char::from_u32(second).filter(|_| second != 0)))
}

/// Whether `name` may appear without a terminating semicolon.
pub fn is_legacy(name: &str) -> bool {
    LEGACY_NAMES.contains(name)
}

/// Map a numeric character reference value to the character it produces.
pub fn numeric_char(value: u32) -> char {
    match value {
        0 => '\u{FFFD}',
        0x80..=0x9F => windows_1252(value),
        0xD800..=0xDFFF => '\u{FFFD}',
        v if v > 0x10FFFF => '\u{FFFD}',
        v => char::from_u32(v).unwrap_or('\u{FFFD}'),
    }
}

fn windows_1252(value: u32) -> char {
    let mapped = match value {
        0x80 => 0x20AC,
        0x82 => 0x201A,
        0x83 => 0x0192,
        0x84 => 0x201E,
        0x85 => 0x2026,
        0x86 => 0x2020,
        0x87 => 0x2021,
        0x88 => 0x02C6,
        0x89 => 0x2030,
        0x8A => 0x0160,
        0x8B => 0x2039,
        0x8C => 0x0152,
        0x8E => 0x017D,
        0x91 => 0x2018,
        0x92 => 0x2019,
        0x93 => 0x201C,
        0x94 => 0x201D,
        0x95 => 0x2022,
        0x96 => 0x2013,
        0x97 => 0x2014,
        0x98 => 0x02DC,
        0x99 => 0x2122,
        0x9A => 0x0161,
        0x9B => 0x203A,
        0x9C => 0x0153,
        0x9E => 0x017E,
        0x9F => 0x0178,
        other => other,
    };
    char::from_u32(mapped).unwrap_or('\u{FFFD}')
}

/// Try to decode a character reference starting right after an `&`.
///
/// Returns the expansion and how many input characters it used, or `None`
/// when the text is not a reference and the `&` should stay literal.
/// Inside attribute values a legacy name without `;` that is followed by `=`
/// or an alphanumeric is not a reference (so `?a=1&copy=2` survives).
pub fn decode_reference(input: &[char], in_attribute: bool) -> Option<(Expansion, usize)> {
    match input.first() {
        Some('#') => decode_numeric(input),
        Some(c) if c.is_ascii_alphanumeric() => decode_named(input, in_attribute),
        _ => None,
    }
}

fn decode_numeric(input: &[char]) -> Option<(Expansion, usize)> {
    let hex = matches!(input.get(1), Some('x') | Some('X'));
    let radix = if hex { 16 } else { 10 };
    let start = if hex { 2 } else { 1 };

    let mut i = start;
    let mut value: u32 = 0;
    while let Some(digit) = input.get(i).and_then(|c| c.to_digit(radix)) {
        value = value.saturating_mul(radix).saturating_add(digit);
        i += 1;
    }
    if i == start {
        return None;
    }
    if input.get(i) == Some(&';') {
        i += 1;
    }
    Some((Expansion::single(numeric_char(value)), i))
}

fn decode_named(input: &[char], in_attribute: bool) -> Option<(Expansion, usize)> {
    let len = input
        .iter()
        .take(MAX_NAME_LEN)
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    let mut name: String = input[..len].iter().collect();

    if input.get(len) == Some(&';') {
        name.push(';');
        if let Some(expansion) = lookup(&name) {
            return Some((expansion, len + 1));
        }
        name.pop();
    }

    // Longest legacy prefix, no semicolon.
    for end in (2..=len).rev() {
        let prefix = &name[..end];
        if !is_legacy(prefix) {
            continue;
        }
        if in_attribute {
            if let Some(next) = input.get(end) {
                if *next == '=' || next.is_ascii_alphanumeric() {
                    return None;
                }
            }
        }
        return lookup(prefix).map(|expansion| (expansion, end));
    }
    None
}

/// Decode every character reference in a string of text content.
pub fn decode(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        i += 1;
        if ch != '&' {
            result.push(ch);
            continue;
        }
        match decode_reference(&chars[i..], false) {
            Some((expansion, used)) => {
                result.extend(expansion);
                i += used;
            }
            None => result.push('&'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_basic_entities() {
        assert_eq!(decode("&lt;div&gt;"), "<div>");
        assert_eq!(decode("&amp;&quot;&apos;"), "&\"'");
        assert_eq!(decode("&copy; 2024"), "\u{00A9} 2024");
    }

    #[test]
    fn test_html5_names() {
        assert_eq!(decode("&check; &hellip; &NotEqualTilde;"), "\u{2713} \u{2026} \u{2242}\u{0338}");
        assert_eq!(decode("&CounterClockwiseContourIntegral;"), "\u{2233}");
        assert_eq!(decode("&fjlig;"), "fj");
    }

    #[test]
    fn test_two_code_point_lookup() {
        let expansion = lookup("NotEqualTilde;").unwrap();
        assert_eq!(expansion.first(), '\u{2242}');
        assert_eq!(expansion.second(), Some('\u{0338}'));
        assert_eq!(lookup("check;").unwrap().second(), None);
    }

    #[test]
    fn test_prefix_entries_are_not_references() {
        // "hellip" without the semicolon is only a prefix in the table.
        assert_eq!(lookup("hellip"), None);
        assert_eq!(lookup("NotEqualTild"), None);
        assert!(!is_legacy("hellip"));
        assert!(is_legacy("amp"));
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(decode("&#60;&#x3C;&#X3c;"), "<<<");
        assert_eq!(decode("&#106&#97&#118&#97"), "java");
        assert_eq!(decode("&#0;"), "\u{FFFD}");
        assert_eq!(decode("&#xD800;"), "\u{FFFD}");
        assert_eq!(decode("&#x110000;"), "\u{FFFD}");
        assert_eq!(decode("&#99999999999999999999;"), "\u{FFFD}");
        assert_eq!(decode("&#x80;"), "\u{20AC}");
    }

    #[test]
    fn test_control_references_decode() {
        assert_eq!(decode("jav&#x09;ascript"), "jav\tascript");
        assert_eq!(decode("a&Tab;b&NewLine;c"), "a\tb\nc");
        assert_eq!(decode("javascript&colon;"), "javascript:");
    }

    #[test]
    fn test_unknown_and_incomplete() {
        assert_eq!(decode("&unknown;"), "&unknown;");
        assert_eq!(decode("a & b"), "a & b");
        assert_eq!(decode("&#;"), "&#;");
        assert_eq!(decode("&"), "&");
    }

    #[test]
    fn test_legacy_without_semicolon() {
        assert_eq!(decode("&copy 2024"), "\u{00A9} 2024");
        assert_eq!(decode("&ampx"), "&x");
        assert_eq!(decode("&notit;"), "\u{00AC}it;");
        assert_eq!(decode("&notin;"), "\u{2209}");
        // Non-legacy names need the semicolon.
        assert_eq!(decode("&hellip"), "&hellip");
    }

    #[test]
    fn test_attribute_rule() {
        let copy = Expansion::single('\u{00A9}');
        assert_eq!(decode_reference(&chars("copy=2"), true), None);
        assert_eq!(decode_reference(&chars("copyx"), true), None);
        assert_eq!(decode_reference(&chars("copy 2"), true), Some((copy, 4)));
        assert_eq!(decode_reference(&chars("copy;x"), true), Some((copy, 5)));
        assert_eq!(decode_reference(&chars("copy=2"), false), Some((copy, 4)));
    }
}
