//! Wikilink syntax: `[[target]]` and `[[target|label]]`.

use regex::Regex;
use std::sync::LazyLock;

static WIKILINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]\[|]+)(?:\|([^\]]+))?\]\]").expect("wikilink pattern is valid")
});

/// One wikilink occurrence inside a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink<'a> {
    /// Target exactly as written, trimmed.
    pub target: &'a str,
    pub label: Option<&'a str>,
    /// Byte offset of the opening `[[`.
    pub start: usize,
    /// Byte offset just past the closing `]]`.
    pub end: usize,
    /// Byte range of the untrimmed target text.
    pub target_span: (usize, usize),
}

/// Find every wikilink in `text`. A link preceded by `[` (as in `[[[x]]]`)
/// is not a link.
pub fn find_wikilinks(text: &str) -> Vec<Wikilink<'_>> {
    WIKILINK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if whole.start() > 0 && text.as_bytes()[whole.start() - 1] == b'[' {
                return None;
            }
            let target = caps.get(1)?;
            let trimmed = target.as_str().trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(Wikilink {
                target: trimmed,
                label: caps.get(2).map(|m| m.as_str()),
                start: whole.start(),
                end: whole.end(),
                target_span: (target.start(), target.end()),
            })
        })
        .collect()
}

/// If `s` is exactly one wikilink, return its target.
pub fn parse_whole_wikilink(s: &str) -> Option<&str> {
    let s = s.trim();
    let links = find_wikilinks(s);
    match links.as_slice() {
        [link] if link.start == 0 && link.end == s.len() => Some(link.target),
        _ => None,
    }
}

/// Split a raw link target into its object part and optional `#fragment`.
pub fn split_fragment(target: &str) -> (&str, Option<&str>) {
    match target.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target, None),
    }
}
