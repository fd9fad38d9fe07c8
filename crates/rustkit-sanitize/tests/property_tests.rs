//! Property tests over generated tag soup

use proptest::prelude::*;
use rustkit_sanitize::{sanitize, Policy};

/// Fragments that exercise misnesting, tables, raw text and URL attributes.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<b>".to_string()),
        Just("</b>".to_string()),
        Just("<i>".to_string()),
        Just("</i>".to_string()),
        Just("<p>".to_string()),
        Just("</p>".to_string()),
        Just("<div>".to_string()),
        Just("</div>".to_string()),
        Just("<a href=\"javascript:alert(1)\">".to_string()),
        Just("<a href=\"/ok\">".to_string()),
        Just("</a>".to_string()),
        Just("<table>".to_string()),
        Just("<tr>".to_string()),
        Just("<td>".to_string()),
        Just("</table>".to_string()),
        Just("<ul><li>".to_string()),
        Just("<script>alert(1)</script>".to_string()),
        Just("<svg><style>".to_string()),
        Just("<img src=x onerror=alert(1)>".to_string()),
        Just("<!-- c -->".to_string()),
        Just("&amp;&lt;".to_string()),
        "[a-z <>&\"']{0,6}",
    ]
}

fn soup() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..24).prop_map(|parts| parts.concat())
}

fn control() -> impl Strategy<Value = char> {
    prop::sample::select(
        (0u8..=0x1f)
            .chain(std::iter::once(0x7f))
            .map(char::from)
            .collect::<Vec<_>>(),
    )
}

proptest! {
    #[test]
    fn prop_sanitize_is_idempotent(input in soup()) {
        for policy in [Policy::ugc(), Policy::social(), Policy::oembed(), Policy::text_only()] {
            let once = sanitize(&input, &policy);
            prop_assert_eq!(sanitize(&once, &policy), once);
        }
    }

    #[test]
    fn prop_no_script_markup(input in soup()) {
        for policy in [Policy::ugc(), Policy::basic_with_images(), Policy::links_only()] {
            let output = sanitize(&input, &policy).to_ascii_lowercase();
            prop_assert!(!output.contains("<script"), "output: {}", output);
            prop_assert!(!output.contains("<style"), "output: {}", output);
            prop_assert!(!output.contains("javascript:"), "output: {}", output);
        }
    }

    #[test]
    fn prop_obfuscated_scheme_stripped(
        c in control(),
        position in 0usize..=10,
        uppercase in any::<bool>(),
    ) {
        let word = if uppercase { "JAVASCRIPT" } else { "javascript" };
        let scheme = format!("{}{}{}", &word[..position], c, &word[position..]);
        let input = format!("<a href=\"{}:alert(1)\">x</a>", scheme);
        prop_assert_eq!(
            sanitize(&input, &Policy::ugc()),
            "<a rel=\"nofollow noopener noreferrer\">x</a>"
        );
    }
}
