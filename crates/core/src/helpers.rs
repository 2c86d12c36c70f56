//! Text passes used to recover structured data from completion text.
//!
//! Each pass is pure. Fence stripping, span location and control-character
//! removal are idempotent; separator removal drops one comma per closer, so
//! `[1,,]` needs two runs to lose both. The normalizer runs it once.

use regex::Regex;
use std::sync::LazyLock;

// Opening fence with an optional format hint, e.g. ```json
static LEADING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A```[A-Za-z0-9_+.\-]*").unwrap());
static TRAILING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\z").unwrap());
// A separator left dangling before a closing brace or bracket
static TRAILING_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Clean text by normalizing line endings and trimming trailing whitespace.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}

/// Create a fenced code block with optional language tag.
pub fn fenced_block(language: Option<&str>, content: &str) -> String {
    let lang = language.unwrap_or("").to_lowercase();
    format!("```{}\n{}\n```\n", lang, content.trim_end_matches('\n'))
}

/// Remove code fences wrapped around the whole text, plus surrounding whitespace.
///
/// Fences that appear after leading prose are left alone; [`structure_span`]
/// discards them along with the prose.
pub fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    loop {
        let before = s.len();
        if let Some(m) = LEADING_FENCE_RE.find(s) {
            s = s[m.end()..].trim_start();
        }
        if let Some(m) = TRAILING_FENCE_RE.find(s) {
            s = s[..m.start()].trim_end();
        }
        if s.len() == before {
            return s;
        }
    }
}

/// Slice from the first `{` or `[` to the last matching closer.
///
/// Returns `None` when there is no opener, or no closer of the same kind
/// after it.
pub fn structure_span(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let closer = if text.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Drop control characters (Unicode `Cc`), including raw newlines and tabs.
///
/// Whitespace between JSON tokens is optional, and raw control characters
/// inside string literals are what makes model output unparseable.
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

/// Remove a `,` that directly precedes (modulo whitespace) a `}` or `]`.
pub fn remove_trailing_separators(text: &str) -> String {
    TRAILING_SEPARATOR_RE.replace_all(text, "$1").to_string()
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("hello\r\nworld\r"), "hello\nworld");
        assert_eq!(clean_text("test  \n  "), "test");
    }

    #[test]
    fn test_fenced_block() {
        assert_eq!(
            fenced_block(Some("Python"), "print(1)\n"),
            "```python\nprint(1)\n```\n"
        );
        assert_eq!(fenced_block(None, "code"), "```\ncode\n```\n");
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("  ```\n{}\n```  \n"), "{}");
        assert_eq!(strip_fences("[1]"), "[1]");
        // prose before the fence is left for structure_span
        assert_eq!(strip_fences("Sure:\n```json\n[1]\n```"), "Sure:\n```json\n[1]");
    }

    #[test]
    fn test_strip_fences_is_idempotent() {
        let once = strip_fences("```json\n```json\n{}\n```\n```");
        assert_eq!(once, "{}");
        assert_eq!(strip_fences(once), once);
    }

    #[test]
    fn test_structure_span() {
        assert_eq!(structure_span("Here: {\"a\": [1]} bye"), Some("{\"a\": [1]}"));
        assert_eq!(structure_span("list [1, [2]] done."), Some("[1, [2]]"));
        assert_eq!(structure_span("no structure here"), None);
        assert_eq!(structure_span("} backwards {"), None);
    }

    #[test]
    fn test_strip_control_chars() {
        assert_eq!(strip_control_chars("{\"a\":\n\t\"b\u{0}c\"}"), "{\"a\":\"bc\"}");
        assert_eq!(strip_control_chars("😳 ok"), "😳 ok");
    }

    #[test]
    fn test_remove_trailing_separators() {
        assert_eq!(remove_trailing_separators("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(remove_trailing_separators("{\"a\": 1,}"), "{\"a\": 1}");
        assert_eq!(remove_trailing_separators("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn test_remove_trailing_separators_takes_one_comma() {
        let once = remove_trailing_separators("[1,,]");
        assert_eq!(once, "[1,]");
        assert_eq!(remove_trailing_separators(&once), "[1]");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && \"c\""), "a &lt; b &amp;&amp; &quot;c&quot;");
    }
}
