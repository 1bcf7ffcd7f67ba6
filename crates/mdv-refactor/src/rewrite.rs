//! Targeted substitutions on file text.
//!
//! Files are edited line by line. Everything outside a rewritten span keeps
//! its exact bytes.

use regex::{Captures, NoExpand, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]\[|#]+)(#[^\]|]*)?(\|[^\]]*)?\]\]").expect("link pattern is valid")
});

static FRONTMATTER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*(?:[\w.\-]+:\s*|-\s+))(["']?)([^"'#\s\[\]]+)(#[^"'\s]*)?(["']?)(\s*)$"#)
        .expect("frontmatter value pattern is valid")
});

static FLOW_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*[\w.\-]+:\s*\[)(.*)(\]\s*(?:#.*)?)$").expect("flow list pattern is valid")
});

static FLOW_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)(["']?)([^"'#\s\[\]]+)(#[^"'\s]*)?(["']?)(\s*)$"#)
        .expect("flow item pattern is valid")
});

static DECL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([=\[,]\s*)("?)([^\s"',()\[\]#=]+)(#[^\s"',()\[\]]*)?("?)"#)
        .expect("declaration value pattern is valid")
});

/// A file's text split into lines, each keeping its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileText {
    lines: Vec<String>,
}

impl FileText {
    pub fn new(content: &str) -> Self {
        FileText {
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    /// Line `n` (1-based) without its terminator.
    pub fn line(&self, n: usize) -> Option<&str> {
        let line = self.lines.get(n.checked_sub(1)?)?;
        Some(line.strip_suffix('\n').unwrap_or(line))
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Replace byte spans of line `n`. Spans refer to the line as it is now
    /// and must not overlap.
    pub fn splice(&mut self, n: usize, mut spans: Vec<((usize, usize), String)>) -> bool {
        let Some(line) = n.checked_sub(1).and_then(|idx| self.lines.get_mut(idx)) else {
            return false;
        };
        spans.sort_by(|a, b| b.0 .0.cmp(&a.0 .0));
        let mut changed = false;
        for ((start, end), text) in spans {
            if start <= end && end <= line.len() && line.is_char_boundary(start) && line.is_char_boundary(end) {
                line.replace_range(start..end, &text);
                changed = true;
            }
        }
        changed
    }

    /// Rewrite line `n` (without its terminator) through `f`.
    pub fn rewrite(&mut self, n: usize, f: impl FnOnce(&str) -> Option<String>) -> bool {
        let Some(line) = n.checked_sub(1).and_then(|idx| self.lines.get_mut(idx)) else {
            return false;
        };
        let body_len = line.strip_suffix('\n').map_or(line.len(), str::len);
        match f(&line[..body_len]) {
            Some(updated) if updated != line[..body_len] => {
                line.replace_range(..body_len, &updated);
                true
            }
            _ => false,
        }
    }

    pub fn into_string(self) -> String {
        self.lines.concat()
    }
}

/// Line of the closing `---`, or 0 without frontmatter.
pub fn frontmatter_end(content: &str) -> usize {
    mdv_core::frontmatter::split_frontmatter(content)
        .ok()
        .flatten()
        .map_or(0, |fm| fm.close_line)
}

/// First indented line declaring `key:` in a YAML source, or 0.
pub fn key_line(source: &str, key: &str) -> usize {
    source
        .lines()
        .position(|line| {
            let trimmed = line.trim_start();
            line.len() > trimmed.len()
                && trimmed
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.trim_start().starts_with(':'))
        })
        .map_or(0, |idx| idx + 1)
}

/// `type: old` (optionally quoted, optionally commented) → `type: new`.
pub fn rewrite_type_line(line: &str, old: &str, new: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r#"^(\s*type\s*:\s*)(["']?){}(["']?)(\s*(?:#.*)?)$"#,
        regex::escape(old)
    ))
    .ok()?;
    pattern.is_match(line).then(|| {
        pattern
            .replace(line, |caps: &Captures<'_>| {
                format!("{}{}{new}{}{}", &caps[1], &caps[2], &caps[3], &caps[4])
            })
            .into_owned()
    })
}

/// `{{field.old}}` → `{{field.new}}`. Returns the new text and the 1-based
/// lines that changed.
pub fn rewrite_template_tokens(text: &str, old: &str, new: &str) -> Option<(String, Vec<usize>)> {
    let pattern = Regex::new(&format!(r"\{{\{{(\s*)field\.{}(\s*)\}}\}}", regex::escape(old))).ok()?;
    let mut lines = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if pattern.is_match(line) {
            lines.push(idx + 1);
        }
    }
    if lines.is_empty() {
        return None;
    }
    let updated = pattern
        .replace_all(text, |caps: &Captures<'_>| format!("{{{{{}field.{new}{}}}}}", &caps[1], &caps[2]))
        .into_owned();
    Some((updated, lines))
}

/// Rewrite `.old` field references in a saved query scoped to `object:<type_name>`.
pub fn rewrite_query(query: &str, type_name: &str, old: &str, new: &str) -> Option<String> {
    let scope = Regex::new(&format!(r"\bobject:{}\b", regex::escape(type_name))).ok()?;
    if !scope.is_match(query) {
        return None;
    }
    let field = Regex::new(&format!(r"\.{}\b", regex::escape(old))).ok()?;
    let updated = field.replace_all(query, NoExpand(&format!(".{new}"))).into_owned();
    (updated != query).then_some(updated)
}

/// `object:old` → `object:new` in a saved query.
pub fn rewrite_query_type(query: &str, old: &str, new: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"\bobject:{}\b", regex::escape(old))).ok()?;
    let updated = pattern.replace_all(query, NoExpand(&format!("object:{new}"))).into_owned();
    (updated != query).then_some(updated)
}

/// Naive English plural used to guess directory names.
pub fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    format!("{word}s")
}

fn moved<'m>(ids: &'m BTreeMap<String, String>, target: &str) -> Option<&'m str> {
    let target = target.trim();
    let target = target.strip_suffix(".md").unwrap_or(target);
    ids.get(target).map(String::as_str)
}

/// Point `[[old-id]]`, `[[old-id#frag]]` and `[[old-id|label]]` at the moved IDs.
pub fn rewrite_links(line: &str, ids: &BTreeMap<String, String>) -> Option<String> {
    replace_links(line, ids, &[])
}

/// Like [`rewrite_links`] for a body line: links inside inline code spans
/// are not references and stay as written.
pub fn rewrite_prose_links(line: &str, ids: &BTreeMap<String, String>) -> Option<String> {
    replace_links(line, ids, &inline_code_spans(line))
}

fn replace_links(line: &str, ids: &BTreeMap<String, String>, skip: &[(usize, usize)]) -> Option<String> {
    let mut changed = false;
    let updated = LINK.replace_all(line, |caps: &Captures<'_>| {
        let start = caps.get(0).map_or(0, |m| m.start());
        let in_code = skip.iter().any(|&(from, to)| from <= start && start < to);
        match moved(ids, &caps[1]).filter(|_| !in_code) {
            Some(new_id) => {
                changed = true;
                format!(
                    "[[{new_id}{}{}]]",
                    caps.get(2).map_or("", |m| m.as_str()),
                    caps.get(3).map_or("", |m| m.as_str())
                )
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| updated.into_owned())
}

/// Byte ranges of backtick-delimited code spans, paired left to right the
/// way the parser masks them. An unmatched backtick opens nothing.
fn inline_code_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(open) = line[from..].find('`').map(|at| from + at) {
        let Some(close) = line[open + 1..].find('`').map(|at| open + 1 + at) else {
            break;
        };
        spans.push((open, close + 1));
        from = close + 1;
    }
    spans
}

/// Rewrite a bare `key: old-id` or `- old-id` frontmatter value, or the
/// items of a `key: [old-id, other]` flow list.
pub fn rewrite_frontmatter_value(line: &str, ids: &BTreeMap<String, String>) -> Option<String> {
    if FLOW_LIST.is_match(line) {
        return rewrite_flow_list(line, ids);
    }
    let caps = FRONTMATTER_VALUE.captures(line)?;
    let new_id = moved(ids, &caps[3])?;
    Some(format!(
        "{}{}{new_id}{}{}{}",
        &caps[1],
        &caps[2],
        caps.get(4).map_or("", |m| m.as_str()),
        &caps[5],
        &caps[6]
    ))
}

fn rewrite_flow_list(line: &str, ids: &BTreeMap<String, String>) -> Option<String> {
    let caps = FLOW_LIST.captures(line)?;
    let mut changed = false;
    let items: Vec<String> = caps[2]
        .split(',')
        .map(|item| {
            let rewritten = FLOW_ITEM.captures(item).and_then(|c| {
                let new_id = moved(ids, &c[3])?;
                Some(format!(
                    "{}{}{new_id}{}{}{}",
                    &c[1],
                    &c[2],
                    c.get(4).map_or("", |m| m.as_str()),
                    &c[5],
                    &c[6]
                ))
            });
            changed |= rewritten.is_some();
            rewritten.unwrap_or_else(|| item.to_string())
        })
        .collect();
    changed.then(|| format!("{}{}{}", &caps[1], items.join(","), &caps[3]))
}

/// Rewrite bare or quoted `key=old-id` values (including array items) on a
/// declaration line.
pub fn rewrite_declaration_values(line: &str, ids: &BTreeMap<String, String>) -> Option<String> {
    let mut changed = false;
    let updated = DECL_VALUE.replace_all(line, |caps: &Captures<'_>| {
        let end = caps.get(0).map_or(0, |m| m.end());
        let closes = line[end..].trim_start().starts_with([',', ')', ']']);
        match moved(ids, &caps[3]).filter(|_| closes) {
            Some(new_id) => {
                changed = true;
                format!(
                    "{}{}{new_id}{}{}",
                    &caps[1],
                    &caps[2],
                    caps.get(4).map_or("", |m| m.as_str()),
                    &caps[5]
                )
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| updated.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("events/kickoff".to_string(), "meetings/kickoff".to_string()),
            ("events/planning".to_string(), "meetings/planning".to_string()),
        ])
    }

    #[test]
    fn file_text_round_trips_and_splices() {
        let mut text = FileText::new("a: 1\n::event(id=x)\r\nlast");
        assert_eq!(text.line_count(), 3);
        assert_eq!(text.line(2), Some("::event(id=x)\r"));
        assert!(text.splice(2, vec![((2, 7), "meeting".to_string())]));
        assert!(!text.rewrite(9, |_| Some("x".into())));
        assert_eq!(text.into_string(), "a: 1\n::meeting(id=x)\r\nlast");
    }

    #[test]
    fn locating_lines() {
        assert_eq!(frontmatter_end("---\ntype: x\n---\nbody"), 3);
        assert_eq!(frontmatter_end("# no frontmatter"), 0);
        assert_eq!(frontmatter_end("---\nunterminated"), 0);
        let schema = "types:\n  person:\n    fields:\n      email: { type: string }\n";
        assert_eq!(key_line(schema, "email"), 4);
        assert_eq!(key_line(schema, "types"), 0);
        assert_eq!(key_line(schema, "missing"), 0);
    }

    #[test]
    fn type_lines() {
        assert_eq!(rewrite_type_line("type: event", "event", "meeting").as_deref(), Some("type: meeting"));
        assert_eq!(
            rewrite_type_line("type: \"event\"  # kind", "event", "meeting").as_deref(),
            Some("type: \"meeting\"  # kind")
        );
        assert_eq!(rewrite_type_line("type: events", "event", "meeting"), None);
        assert_eq!(rewrite_type_line("kind: event", "event", "meeting"), None);
    }

    #[test]
    fn template_tokens() {
        let (text, lines) =
            rewrite_template_tokens("Email: {{field.email}}\nName: {{field.name}}\n{{ field.email }}\n", "email", "email_address")
                .unwrap();
        assert_eq!(
            text,
            "Email: {{field.email_address}}\nName: {{field.name}}\n{{ field.email_address }}\n"
        );
        assert_eq!(lines, vec![1, 3]);
        assert!(rewrite_template_tokens("{{field.emails}}", "email", "x").is_none());
    }

    #[test]
    fn queries_are_rewritten_only_in_scope() {
        assert_eq!(
            rewrite_query(r#"object:person .email=="a@x.io""#, "person", "email", "email_address").as_deref(),
            Some(r#"object:person .email_address=="a@x.io""#)
        );
        assert_eq!(rewrite_query("trait:due .value==past", "person", "value", "x"), None);
        assert_eq!(rewrite_query("object:person .email_address==*", "person", "email", "x"), None);
        assert_eq!(
            rewrite_query_type("object:event .title==*", "event", "meeting").as_deref(),
            Some("object:meeting .title==*")
        );
        assert_eq!(rewrite_query_type("object:events", "event", "meeting"), None);
    }

    #[test]
    fn plurals() {
        assert_eq!(pluralize("event"), "events");
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("class"), "classes");
    }

    #[test]
    fn links_keep_fragments_and_labels() {
        assert_eq!(
            rewrite_links("See [[events/kickoff#notes|Kickoff]] and [[events/other]].", &ids()).as_deref(),
            Some("See [[meetings/kickoff#notes|Kickoff]] and [[events/other]].")
        );
        assert_eq!(
            rewrite_links("attendees=[[[events/planning]]]", &ids()).as_deref(),
            Some("attendees=[[[meetings/planning]]]")
        );
        assert_eq!(rewrite_links("[[kickoff]]", &ids()), None);
    }

    #[test]
    fn frontmatter_values() {
        assert_eq!(
            rewrite_frontmatter_value("kickoff: events/kickoff", &ids()).as_deref(),
            Some("kickoff: meetings/kickoff")
        );
        assert_eq!(
            rewrite_frontmatter_value("  - 'events/planning.md'", &ids()).as_deref(),
            Some("  - 'meetings/planning'")
        );
        assert_eq!(rewrite_frontmatter_value("title: events/kickoff notes", &ids()), None);
    }

    #[test]
    fn frontmatter_flow_lists() {
        assert_eq!(
            rewrite_frontmatter_value("kickoffs: [events/kickoff, other]", &ids()).as_deref(),
            Some("kickoffs: [meetings/kickoff, other]")
        );
        assert_eq!(
            rewrite_frontmatter_value("kickoffs: ['events/kickoff']", &ids()).as_deref(),
            Some("kickoffs: ['meetings/kickoff']")
        );
        assert_eq!(
            rewrite_frontmatter_value("kickoffs: [ \"events/planning\" ,events/kickoff#agenda ]  # both", &ids())
                .as_deref(),
            Some("kickoffs: [ \"meetings/planning\" ,meetings/kickoff#agenda ]  # both")
        );
        assert_eq!(rewrite_frontmatter_value("kickoffs: [events/kickoffs, other]", &ids()), None);
        assert_eq!(rewrite_frontmatter_value("kickoffs: []", &ids()), None);
    }

    #[test]
    fn inline_code_links_stay_put() {
        assert_eq!(
            rewrite_prose_links("Use `[[events/kickoff]]` to link [[events/kickoff]].", &ids()).as_deref(),
            Some("Use `[[events/kickoff]]` to link [[meetings/kickoff]].")
        );
        assert_eq!(
            rewrite_prose_links("`a` [[events/kickoff]] `b [[events/planning]]`", &ids()).as_deref(),
            Some("`a` [[meetings/kickoff]] `b [[events/planning]]`")
        );
        assert_eq!(
            rewrite_prose_links("a ` stray [[events/planning]]", &ids()).as_deref(),
            Some("a ` stray [[meetings/planning]]")
        );
    }

    #[test]
    fn declaration_values() {
        assert_eq!(
            rewrite_declaration_values("::project(kickoff=events/kickoff)", &ids()).as_deref(),
            Some("::project(kickoff=meetings/kickoff)")
        );
        assert_eq!(
            rewrite_declaration_values(r#"::x(a="events/kickoff#agenda", b=[events/planning, other])"#, &ids()).as_deref(),
            Some(r#"::x(a="meetings/kickoff#agenda", b=[meetings/planning, other])"#)
        );
        assert_eq!(rewrite_declaration_values("::x(a=events/kickoffs)", &ids()), None);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn file_text_is_lossless(content in "[a-z:\\-\\[\\] \n\r]{0,80}") {
                prop_assert_eq!(FileText::new(&content).into_string(), content);
            }

            #[test]
            fn empty_id_map_never_rewrites(line in "[a-z/\\[\\]|#=(),:\" ]{0,60}") {
                let ids = BTreeMap::new();
                prop_assert!(rewrite_links(&line, &ids).is_none());
                prop_assert!(rewrite_prose_links(&line, &ids).is_none());
                prop_assert!(rewrite_frontmatter_value(&line, &ids).is_none());
                prop_assert!(rewrite_declaration_values(&line, &ids).is_none());
            }

            #[test]
            fn plurals_end_in_s(word in "[a-z]{1,12}") {
                prop_assert!(pluralize(&word).ends_with('s'));
            }
        }
    }
}
