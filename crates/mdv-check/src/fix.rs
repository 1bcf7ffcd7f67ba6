//! Auto-fix engine for issues whose repair is provably correct.
//!
//! Only two kinds qualify: short references the validator resolved to exactly
//! one longer path, and enum values that are a quoted form of a valid member.
//! Everything else is left for a human.

use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use tracing::{debug, info};

use mdv_core::wikilink::find_wikilinks;
use mdv_core::Result;
use mdv_vault::{ChangeSet, Vault};

use crate::issue::{Issue, IssueKind};

static YAML_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*(?:[\w.\-]+:|-)[ \t]+)(\S.*)$").expect("yaml entry pattern is valid")
});

/// One repair the engine knows how to make.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FixableIssue {
    pub file_path: String,
    pub line: usize,
    pub kind: IssueKind,
    pub old_value: String,
    pub new_value: String,
    pub description: String,
}

/// Outcome of [`apply_fixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub file_count: usize,
    pub issue_count: usize,
    /// False for a preview.
    pub applied: bool,
}

/// Pick the issues that can be repaired without judgement.
pub fn collect_fixable(issues: &[Issue]) -> Vec<FixableIssue> {
    let mut seen = BTreeSet::new();
    let mut fixes = Vec::new();
    for issue in issues {
        let Some(suggestion) = &issue.suggestion else {
            continue;
        };
        let description = match issue.kind {
            IssueKind::ShortRefCouldBeFullPath => {
                format!("Replace [[{}]] with [[{suggestion}]]", issue.value)
            }
            IssueKind::InvalidEnumValue => {
                format!("Replace {} with {suggestion}", issue.value)
            }
            _ => continue,
        };
        let fix = FixableIssue {
            file_path: issue.file_path.clone(),
            line: issue.line,
            kind: issue.kind,
            old_value: issue.value.clone(),
            new_value: suggestion.clone(),
            description,
        };
        if seen.insert((fix.file_path.clone(), fix.line, fix.old_value.clone())) {
            fixes.push(fix);
        }
    }
    fixes
}

/// Apply `fixes` file by file. Without `confirm` nothing is written and the
/// result counts what would change.
///
/// # Errors
///
/// Fails if a file cannot be read, or on a write failure once confirmed.
pub fn apply_fixes(vault: &Vault, fixes: &[FixableIssue], confirm: bool) -> Result<FixResult> {
    let mut by_file: BTreeMap<&str, Vec<&FixableIssue>> = BTreeMap::new();
    for fix in fixes {
        by_file.entry(fix.file_path.as_str()).or_default().push(fix);
    }

    let mut result = FixResult {
        applied: confirm,
        ..FixResult::default()
    };
    let mut changes = ChangeSet::new();

    for (path, mut file_fixes) in by_file {
        let original = vault.read_file(path)?;
        file_fixes.sort_by(|a, b| b.line.cmp(&a.line));

        let mut lines: Vec<String> = original.split_inclusive('\n').map(str::to_string).collect();
        let mut fixed = 0;
        for fix in file_fixes {
            let Some(line) = fix.line.checked_sub(1).and_then(|idx| lines.get_mut(idx)) else {
                debug!(file = path, line = fix.line, "fix points past end of file");
                continue;
            };
            if let Some(updated) = fix_line(line, fix) {
                *line = updated;
                fixed += 1;
            }
        }

        if fixed > 0 {
            result.file_count += 1;
            result.issue_count += fixed;
            changes.write(path, lines.concat());
        }
    }

    if confirm && !changes.is_empty() {
        changes.commit(vault)?;
    }
    info!(
        files = result.file_count,
        fixes = result.issue_count,
        applied = confirm,
        "auto-fix finished"
    );
    Ok(result)
}

fn fix_line(line: &str, fix: &FixableIssue) -> Option<String> {
    match fix.kind {
        IssueKind::ShortRefCouldBeFullPath => replace_reference(line, &fix.old_value, &fix.new_value),
        IssueKind::InvalidEnumValue => replace_enum_value(line, &fix.old_value, &fix.new_value),
        _ => None,
    }
}

/// Swap an enum value for `new` in one of the shapes it can be written in:
/// a YAML `key: value` or `- value` scalar, a declaration argument, or a
/// trait argument. Any other shape is left alone.
fn replace_enum_value(line: &str, old: &str, new: &str) -> Option<String> {
    let body = line.strip_suffix('\n').unwrap_or(line);
    let body = body.strip_suffix('\r').unwrap_or(body);
    let ending = &line[body.len()..];
    let replaced = if body.trim_start().starts_with("::") {
        replace_declaration_value(body, old, new)
    } else {
        replace_yaml_scalar(body, old, new).or_else(|| replace_trait_value(body, old, new))
    }?;
    Some(format!("{replaced}{ending}"))
}

/// The scalar after `key:` or `-` must parse as the string `old`. A trailing
/// comment is kept.
fn replace_yaml_scalar(body: &str, old: &str, new: &str) -> Option<String> {
    let caps = YAML_ENTRY.captures(body)?;
    let lead = caps.get(1)?.as_str();
    let rest = caps.get(2)?.as_str();
    let end = rest
        .match_indices(" #")
        .map(|(at, _)| at)
        .chain(std::iter::once(rest.len()))
        .find(|&end| is_yaml_string(rest[..end].trim_end(), old))?;
    let scalar = rest[..end].trim_end();
    let quote = scalar.chars().next().filter(|c| matches!(c, '"' | '\''));
    let replacement = yaml_scalar(new, quote)?;
    Some(format!("{lead}{replacement}{}", &rest[scalar.len()..]))
}

fn is_yaml_string(text: &str, expected: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(text),
        Ok(serde_yaml::Value::String(s)) if s == expected
    )
}

/// `value` as a YAML scalar, preferring the quote style already in use.
fn yaml_scalar(value: &str, quote: Option<char>) -> Option<String> {
    let plain = value.to_string();
    let single = format!("'{}'", value.replace('\'', "''"));
    let double = format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""));
    let candidates = match quote {
        Some('\'') => [single, double, plain],
        Some('"') => [double, single, plain],
        _ => [plain, single, double],
    };
    candidates.into_iter().find(|candidate| is_yaml_string(candidate, value))
}

/// `key=old`, `key="old"` or an array item inside a declaration.
fn replace_declaration_value(body: &str, old: &str, new: &str) -> Option<String> {
    let escaped = regex::escape(old);
    let pattern = Regex::new(&format!(r#"([=\[,]\s*)(?:"{escaped}"|{escaped})(\s*)"#)).ok()?;
    let value = if !new.is_empty() && new.trim() == new && !new.contains([',', '(', ')', '[', ']', '"', '=']) {
        new.to_string()
    } else if !new.contains(['"', '\\']) {
        format!("\"{new}\"")
    } else {
        return None;
    };
    let mut changed = false;
    let updated = pattern.replace_all(body, |caps: &Captures<'_>| {
        let end = caps.get(0).map_or(0, |m| m.end());
        if body[end..].starts_with([',', ')', ']']) {
            changed = true;
            format!("{}{value}{}", &caps[1], &caps[2])
        } else {
            caps[0].to_string()
        }
    });
    changed.then(|| updated.into_owned())
}

/// `@name(old)` → `@name(new)`.
fn replace_trait_value(body: &str, old: &str, new: &str) -> Option<String> {
    if new.contains(['(', ')']) {
        return None;
    }
    let pattern = Regex::new(&format!(r"(@\w+\s*\(\s*){}(\s*\))", regex::escape(old))).ok()?;
    pattern.is_match(body).then(|| {
        pattern
            .replace_all(body, |caps: &Captures<'_>| format!("{}{new}{}", &caps[1], &caps[2]))
            .into_owned()
    })
}

/// Rewrite `[[old]]` and `[[old|label]]` on a line, or a bare `old` value.
fn replace_reference(line: &str, old: &str, new: &str) -> Option<String> {
    let links: Vec<_> = find_wikilinks(line)
        .into_iter()
        .filter(|link| link.target == old)
        .collect();
    if !links.is_empty() {
        let mut out = line.to_string();
        for link in links.iter().rev() {
            let (start, end) = link.target_span;
            out.replace_range(start..end, new);
        }
        return Some(out);
    }
    replace_bare_value(line, old, new)
}

/// `key: old`, `- old` (optionally quoted) in frontmatter, or `=old` inside
/// a declaration's argument list.
fn replace_bare_value(line: &str, old: &str, new: &str) -> Option<String> {
    let escaped = regex::escape(old);
    let yaml = Regex::new(&format!(
        r#"^(\s*(?:[\w.\-]+:\s*|-\s+))(["']?){escaped}(["']?)(\s*)$"#
    ))
    .ok()?;
    let replace = |caps: &Captures<'_>| format!("{}{}{new}{}{}", &caps[1], &caps[2], &caps[3], &caps[4]);
    let body = line.strip_suffix('\n').unwrap_or(line);
    let newline = &line[body.len()..];
    if yaml.is_match(body) {
        return Some(format!("{}{newline}", yaml.replace(body, replace)));
    }

    let decl = Regex::new(&format!(r"([=\[,]\s*){escaped}(\s*[,)\]])")).ok()?;
    if decl.is_match(body) {
        let replaced = decl.replace_all(body, |caps: &Captures<'_>| {
            format!("{}{new}{}", &caps[1], &caps[2])
        });
        return Some(format!("{replaced}{newline}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn short_ref(file: &str, line: usize, old: &str, new: &str) -> Issue {
        Issue::warning(IssueKind::ShortRefCouldBeFullPath, file, line, "short")
            .with_value(old)
            .with_suggestion(new)
    }

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        (dir, vault)
    }

    #[test]
    fn only_proven_repairs_are_collected() {
        let issues = vec![
            short_ref("a.md", 1, "alice", "people/alice"),
            short_ref("a.md", 1, "alice", "people/alice"),
            Issue::error(IssueKind::InvalidEnumValue, "a.md", 2, "enum").with_value("urgent"),
            Issue::error(IssueKind::InvalidEnumValue, "a.md", 3, "enum")
                .with_value("'high'")
                .with_suggestion("high"),
            Issue::error(IssueKind::MissingReference, "a.md", 4, "missing")
                .with_value("peopel/bob")
                .with_suggestion("people/bob"),
        ];
        let fixes = collect_fixable(&issues);
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].new_value, "people/alice");
        assert_eq!(fixes[1].old_value, "'high'");
        assert_eq!(fixes[1].new_value, "high");
    }

    #[test]
    fn rewrites_links_and_keeps_labels() {
        let fix = collect_fixable(&[short_ref("a.md", 1, "alice", "people/alice")]);
        let out = fix_line("Met [[alice|Al]] and [[alice]], not [[alicea]].\n", &fix[0]).unwrap();
        assert_eq!(out, "Met [[people/alice|Al]] and [[people/alice]], not [[alicea]].\n");
    }

    #[test]
    fn rewrites_bare_frontmatter_and_declaration_values() {
        assert_eq!(
            replace_bare_value("owner: alice\n", "alice", "people/alice").as_deref(),
            Some("owner: people/alice\n")
        );
        assert_eq!(
            replace_bare_value("  - \"alice\"", "alice", "people/alice").as_deref(),
            Some("  - \"people/alice\"")
        );
        assert_eq!(
            replace_bare_value("::meeting(owner=alice, attendees=[[[alice]]])", "alice", "people/alice")
                .as_deref(),
            Some("::meeting(owner=people/alice, attendees=[[[people/alice]]])")
        );
        assert_eq!(replace_bare_value("owner: alice smith", "alice", "x"), None);
    }

    fn quoted_enum(line: usize) -> FixableIssue {
        let issue = Issue::error(IssueKind::InvalidEnumValue, "a.md", line, "enum")
            .with_value("'high'")
            .with_suggestion("high");
        collect_fixable(&[issue]).remove(0)
    }

    #[test]
    fn enum_fixes_stay_valid_yaml() {
        let fix = quoted_enum(1);
        for (line, expected) in [
            ("priority: '''high'''\n", "priority: 'high'\n"),
            ("priority: \"'high'\"  # set by import\n", "priority: \"high\"  # set by import\n"),
            ("priority: \"'high'\"\r\n", "priority: \"high\"\r\n"),
        ] {
            let out = fix_line(line, &fix).unwrap();
            assert_eq!(out, expected);
            let parsed: BTreeMap<String, String> = serde_yaml::from_str(&out).unwrap();
            assert_eq!(parsed["priority"], "high");
        }

        let item = fix_line("  - '''high'''\n", &fix).unwrap();
        assert_eq!(item, "  - 'high'\n");
        let parsed: Vec<String> = serde_yaml::from_str(&item).unwrap();
        assert_eq!(parsed, vec!["high"]);
    }

    #[test]
    fn enum_fixes_in_declarations_and_traits() {
        let fix = quoted_enum(1);
        assert_eq!(
            fix_line("::task(priority='high', owner=x)\n", &fix).as_deref(),
            Some("::task(priority=high, owner=x)\n")
        );
        assert_eq!(
            fix_line("::task(priority=\"'high'\")", &fix).as_deref(),
            Some("::task(priority=high)")
        );
        assert_eq!(
            fix_line("- @priority('high') ship it\n", &fix).as_deref(),
            Some("- @priority(high) ship it\n")
        );
    }

    #[test]
    fn unrecognised_enum_shapes_are_left_alone() {
        let fix = quoted_enum(1);
        assert_eq!(fix_line("priority: ['high', low]\n", &fix), None);
        assert_eq!(fix_line("notes: the 'high' road\n", &fix), None);
        assert_eq!(fix_line("::task(label='high'er)", &fix), None);
        assert_eq!(fix_line("priority: high\n", &fix), None);
    }

    #[test]
    fn preview_writes_nothing_and_confirm_is_idempotent() {
        let original = "---\ntype: project\nowner: alice\npriority: \"'high'\"\n---\nSee [[alice]].\n";
        let (_dir, vault) = vault_with(&[("projects/site.md", original)]);
        let issues = vec![
            short_ref("projects/site.md", 3, "alice", "people/alice"),
            Issue::error(IssueKind::InvalidEnumValue, "projects/site.md", 4, "enum")
                .with_value("'high'")
                .with_suggestion("high"),
            short_ref("projects/site.md", 6, "alice", "people/alice"),
        ];
        let fixes = collect_fixable(&issues);

        let preview = apply_fixes(&vault, &fixes, false).unwrap();
        assert_eq!(preview, FixResult { file_count: 1, issue_count: 3, applied: false });
        assert_eq!(vault.read_file("projects/site.md").unwrap(), original);

        let applied = apply_fixes(&vault, &fixes, true).unwrap();
        assert!(applied.applied);
        assert_eq!(
            vault.read_file("projects/site.md").unwrap(),
            "---\ntype: project\nowner: people/alice\npriority: \"high\"\n---\nSee [[people/alice]].\n"
        );

        let again = apply_fixes(&vault, &fixes, true).unwrap();
        assert_eq!(again.issue_count, 0);
    }
}
