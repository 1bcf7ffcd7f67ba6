//! Output shapes for a finished pass: per-kind summaries, JSON and text lines.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::accumulator::{MissingRef, UndefinedTrait};
use crate::issue::{Issue, IssueKind, SchemaIssue};
use crate::CheckReport;

/// Values listed per kind in a summary.
pub const TOP_VALUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// All issues of one kind, collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub issue_type: IssueKind,
    pub count: usize,
    pub unique_values: usize,
    pub top_values: Vec<ValueCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

/// Group issues by kind, most frequent kind first.
pub fn summarize(issues: &[Issue]) -> Vec<IssueSummary> {
    let mut by_kind: BTreeMap<IssueKind, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        by_kind.entry(issue.kind).or_default().push(issue);
    }

    let mut summaries: Vec<IssueSummary> = by_kind
        .into_iter()
        .map(|(kind, group)| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for issue in &group {
                *counts.entry(issue.value.as_str()).or_default() += 1;
            }
            let unique_values = counts.len();
            let mut top: Vec<ValueCount> = counts
                .into_iter()
                .map(|(value, count)| ValueCount {
                    value: value.to_string(),
                    count,
                })
                .collect();
            top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
            top.truncate(TOP_VALUES);

            IssueSummary {
                issue_type: kind,
                count: group.len(),
                unique_values,
                top_values: top,
                fix_command: group.iter().find_map(|i| i.fix_command.clone()),
                fix_hint: group.iter().find_map(|i| i.fix_hint.clone()),
            }
        })
        .collect();
    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.issue_type.cmp(&b.issue_type)));
    summaries
}

/// `mdv check --json` document.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub file_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub issues: &'a [Issue],
    pub schema_issues: &'a [SchemaIssue],
    pub summary: Vec<IssueSummary>,
    pub missing_refs: &'a [MissingRef],
    pub undefined_traits: &'a [UndefinedTrait],
}

impl<'a> JsonReport<'a> {
    pub fn new(report: &'a CheckReport) -> Self {
        JsonReport {
            file_count: report.file_count,
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            issues: &report.issues,
            schema_issues: &report.schema_issues,
            summary: summarize(&report.issues),
            missing_refs: &report.missing_refs,
            undefined_traits: &report.undefined_traits,
        }
    }
}

/// `ERROR people/bob.md:3 Required field 'name' is missing`
pub fn format_issue(issue: &Issue) -> String {
    if issue.file_path.is_empty() {
        format!("{:<5} {}", issue.level.to_string(), issue.message)
    } else {
        format!(
            "{:<5} {}:{} {}",
            issue.level.to_string(),
            issue.file_path,
            issue.line,
            issue.message
        )
    }
}

pub fn format_schema_issue(issue: &SchemaIssue) -> String {
    format!("{:<5} schema: {}", issue.level.to_string(), issue.message)
}

/// Issues grouped by file, in path order. Vault-wide issues use the key `""`.
pub fn group_by_file(issues: &[Issue]) -> BTreeMap<&str, Vec<&Issue>> {
    let mut grouped: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        grouped.entry(issue.file_path.as_str()).or_default().push(issue);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unknown_trait(file: &str, name: &str) -> Issue {
        Issue::warning(IssueKind::UndefinedTrait, file, 1, format!("Undefined trait '@{name}'"))
            .with_value(name)
            .with_hint(format!("Add trait '{name}' to schema.yaml"))
    }

    #[test]
    fn summary_counts_and_ranks_values() {
        let issues = vec![
            unknown_trait("a.md", "mood"),
            unknown_trait("b.md", "mood"),
            unknown_trait("b.md", "energy"),
            Issue::error(IssueKind::MissingReference, "a.md", 2, "Reference [[x]] not found")
                .with_value("x")
                .with_fix_command("mdv check --create-missing --confirm"),
        ];
        let summary = summarize(&issues);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].issue_type, IssueKind::UndefinedTrait);
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[0].unique_values, 2);
        assert_eq!(
            summary[0].top_values[0],
            ValueCount {
                value: "mood".into(),
                count: 2
            }
        );
        assert_eq!(
            summary[1].fix_command.as_deref(),
            Some("mdv check --create-missing --confirm")
        );

        let json = serde_json::to_value(&summary[0]).unwrap();
        assert_eq!(json["issue_type"], "undefined_trait");
        assert!(json.get("fix_command").is_none());
    }

    #[test]
    fn top_values_are_capped() {
        let issues: Vec<_> = (0..15).map(|i| unknown_trait("a.md", &format!("t{i:02}"))).collect();
        let summary = summarize(&issues);
        assert_eq!(summary[0].unique_values, 15);
        assert_eq!(summary[0].top_values.len(), TOP_VALUES);
    }

    #[test]
    fn text_lines() {
        let issue = Issue::error(IssueKind::MissingRequiredField, "people/bob.md", 3, "Required field 'name' is missing");
        assert_eq!(
            format_issue(&issue),
            "ERROR people/bob.md:3 Required field 'name' is missing"
        );
        let stale = Issue::warning(IssueKind::StaleIndex, "", 0, "Index is stale");
        assert_eq!(format_issue(&stale), "WARN  Index is stale");
    }

    #[test]
    fn grouping_by_file() {
        let issues = vec![unknown_trait("b.md", "x"), unknown_trait("a.md", "y"), unknown_trait("b.md", "z")];
        let grouped = group_by_file(&issues);
        let keys: Vec<_> = grouped.keys().copied().collect();
        assert_eq!(keys, vec!["a.md", "b.md"]);
        assert_eq!(grouped["b.md"].len(), 2);
    }
}
