//! YAML frontmatter splitting.
//!
//! Frontmatter is optional. When present it is the `---` delimited block at
//! the very top of the file:
//! ```markdown
//! ---
//! type: person
//! name: Alice
//! ---
//!
//! ## Body content here
//! ```
//! Line numbers are 1-based and count the opening delimiter as line 1.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{MdvError, Result};

static TOP_LEVEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(["']?)([A-Za-z0-9_][A-Za-z0-9_\-\.]*)(["']?)\s*:(\s|$)"#)
        .expect("frontmatter key pattern is valid")
});

/// The frontmatter block of a file and the body after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontmatter<'a> {
    /// Raw YAML between the delimiters.
    pub yaml: &'a str,
    /// Everything after the closing delimiter line.
    pub body: &'a str,
    /// Line number of the closing `---`.
    pub close_line: usize,
}

impl Frontmatter<'_> {
    /// First line of YAML content.
    pub const FIRST_LINE: usize = 2;

    /// Whether a 1-based line number falls inside the YAML block.
    pub fn contains_line(&self, line: usize) -> bool {
        (Self::FIRST_LINE..self.close_line).contains(&line)
    }

    /// Line number of the first body line.
    pub fn body_line(&self) -> usize {
        self.close_line + 1
    }
}

/// Split a markdown file into frontmatter and body.
///
/// Returns `Ok(None)` when the file does not open with a `---` line.
///
/// # Errors
///
/// Returns [`MdvError::Parse`] if an opening delimiter has no closing one.
pub fn split_frontmatter(content: &str) -> Result<Option<Frontmatter<'_>>> {
    let mut lines = content.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != "---" {
        return Ok(None);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for (idx, line) in lines.enumerate() {
        if line.trim_end() == "---" {
            return Ok(Some(Frontmatter {
                yaml: &content[yaml_start..offset],
                body: &content[offset + line.len()..],
                close_line: idx + 2,
            }));
        }
        offset += line.len();
    }

    Err(MdvError::Parse(
        "no closing '---' frontmatter delimiter found".to_string(),
    ))
}

/// The key of a top-level `key: value` frontmatter line, if the line is one.
pub fn top_level_key(line: &str) -> Option<&str> {
    let caps = TOP_LEVEL_KEY.captures(line)?;
    if caps.get(1)?.as_str() != caps.get(3)?.as_str() {
        return None;
    }
    caps.get(2).map(|m| m.as_str())
}

/// Byte span of the key on a top-level frontmatter line, quotes excluded.
pub fn top_level_key_span(line: &str) -> Option<(usize, usize)> {
    let caps = TOP_LEVEL_KEY.captures(line)?;
    if caps.get(1)?.as_str() != caps.get(3)?.as_str() {
        return None;
    }
    caps.get(2).map(|m| (m.start(), m.end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_frontmatter_extracts_yaml_and_body() {
        let content = "---\ntype: person\nname: Alice\n---\n\n## Hello\n";
        let fm = split_frontmatter(content).unwrap().expect("frontmatter");
        assert_eq!(fm.yaml, "type: person\nname: Alice\n");
        assert_eq!(fm.body, "\n## Hello\n");
        assert_eq!(fm.close_line, 4);
        assert_eq!(fm.body_line(), 5);
        assert!(fm.contains_line(2));
        assert!(fm.contains_line(3));
        assert!(!fm.contains_line(4));
    }

    #[test]
    fn split_frontmatter_is_optional() {
        assert_eq!(split_frontmatter("# Just a page\n").unwrap(), None);
        assert_eq!(split_frontmatter("").unwrap(), None);
    }

    #[test]
    fn split_frontmatter_rejects_missing_closer() {
        let content = "---\ntype: person\n";
        assert!(split_frontmatter(content).is_err());
    }

    #[test]
    fn split_frontmatter_handles_crlf() {
        let content = "---\r\ntype: person\r\n---\r\nbody\r\n";
        let fm = split_frontmatter(content).unwrap().expect("frontmatter");
        assert_eq!(fm.yaml, "type: person\r\n");
        assert_eq!(fm.body, "body\r\n");
    }

    #[test]
    fn empty_frontmatter_block() {
        let fm = split_frontmatter("---\n---\nbody\n").unwrap().expect("frontmatter");
        assert_eq!(fm.yaml, "");
        assert_eq!(fm.close_line, 2);
    }

    #[test]
    fn top_level_keys() {
        assert_eq!(top_level_key("email: a@b.c"), Some("email"));
        assert_eq!(top_level_key("due_date:"), Some("due_date"));
        assert_eq!(top_level_key("\"quoted\": 1"), Some("quoted"));
        assert_eq!(top_level_key("  nested: 1"), None);
        assert_eq!(top_level_key("- item"), None);
        assert_eq!(top_level_key("url: http://x"), Some("url"));
        assert_eq!(top_level_key_span("name: x"), Some((0, 4)));
        assert_eq!(top_level_key_span("'name': x"), Some((1, 5)));
    }
}
