use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

// Static initialization: automata are built only once, thread-safe
static TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build XML text escaper")
});

static ATTR_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "\t", "\n", "\r"])
        .expect("Failed to build XML attribute escaper")
});

// Use LeftmostLongest to ensure longer entities are matched first (e.g., &amp; instead of &lt;)
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape character data for element content.
///
/// # Examples
///
/// ```
/// use kumquat::common::xml::escape_text;
/// assert_eq!(escape_text("a & <b>"), "a &amp; &lt;b&gt;");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

/// Escape an attribute value for a double-quoted attribute.
///
/// Whitespace control characters are written as character references so that
/// attribute-value normalization on re-read does not turn them into spaces.
///
/// # Examples
///
/// ```
/// use kumquat::common::xml::escape_attr;
/// assert_eq!(escape_attr("say \"hi\"\n"), "say &quot;hi&quot;&#xA;");
/// ```
#[inline]
pub fn escape_attr(s: &str) -> String {
    ATTR_ESCAPER.replace_all(
        s,
        &["&amp;", "&lt;", "&gt;", "&quot;", "&#x9;", "&#xA;", "&#xD;"],
    )
}

/// Unescape the five predefined entities and numeric character references.
///
/// Unknown or malformed references are left unchanged.
///
/// # Examples
///
/// ```
/// use kumquat::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;");
/// ```
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let named = XML_UNESCAPER.replace_all(s, &["\u{0}amp;", "<", ">", "\"", "'"]);
    let resolved = if named.contains("&#") {
        resolve_char_refs(&named)
    } else {
        named
    };
    // `&amp;` was parked behind a NUL marker so that `&amp;#65;` stays literal.
    resolved.replace("\u{0}amp;", "&")
}

fn resolve_char_refs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let decoded = after.find(';').and_then(|end| {
            let body = &after[..end];
            let code = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32).map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            },
            None => {
                out.push_str("&#");
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = "Tom & \"Jerry\" <3\t";
        assert_eq!(unescape_xml(&escape_attr(raw)), raw);
        assert_eq!(unescape_xml(&escape_text(raw)), raw);
    }

    #[test]
    fn test_char_refs() {
        assert_eq!(unescape_xml("&#x2014;"), "\u{2014}");
        assert_eq!(unescape_xml("&#xZZ;"), "&#xZZ;");
        assert_eq!(unescape_xml("&amp;#65;"), "&#65;");
    }
}
