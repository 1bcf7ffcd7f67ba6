//! Inline trait annotations: `@name` and `@name(value)`.

use regex::Regex;
use std::sync::LazyLock;

static TRAIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s\-\*])@(\w+)(?:\s*\(([^)]*)\))?").expect("trait pattern is valid")
});

/// One trait usage found on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitMatch<'a> {
    pub name: &'a str,
    /// Raw value with surrounding whitespace trimmed; quotes are kept.
    pub value: Option<&'a str>,
}

/// Find every trait annotation on a line. `@done()` counts as no value.
pub fn find_traits(line: &str) -> Vec<TraitMatch<'_>> {
    TRAIT
        .captures_iter(line)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|v| !v.is_empty());
            Some(TraitMatch { name, value })
        })
        .collect()
}
