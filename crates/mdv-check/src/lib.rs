//! # mdv-check
//!
//! The consistency engine's read side for mdv vaults.
//!
//! - [`Validator`] checks every document against the schema and runs the
//!   whole-schema integrity checks once per pass
//! - [`Resolver`] turns wikilink text into object IDs
//! - [`confidence`] classifies dangling references as certain, inferred or unknown
//! - [`fix`] repairs the two issue kinds whose fix is provably correct
//! - [`remediate`] creates stub pages for certainly-typed missing references
//! - [`report`] shapes results for text and JSON output
//!
//! [`check_vault`] drives a full pass over a [`VaultSnapshot`].

pub mod accumulator;
pub mod confidence;
pub mod fields;
pub mod fix;
pub mod issue;
pub mod remediate;
pub mod report;
pub mod resolver;
pub mod validator;

use std::collections::BTreeMap;

use tracing::info;

use mdv_core::Result;
use mdv_index::{content_hash, IndexManager, Staleness};
use mdv_vault::{ParseFailure, VaultSnapshot};

pub use accumulator::{CheckAccumulator, MissingRef, UndefinedTrait};
pub use confidence::Confidence;
pub use fix::{apply_fixes, collect_fixable, FixResult, FixableIssue};
pub use issue::{Issue, IssueKind, Level, SchemaIssue};
pub use remediate::{create_stubs, plan_stubs, RemediationPlan, StubPage};
pub use resolver::{Resolution, Resolver};
pub use validator::{object_infos, ObjectInfo, Validator};

/// Everything one `mdv check` pass found.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub file_count: usize,
    /// Parse errors first, then the stale-index warning, then per-document
    /// issues in path order.
    pub issues: Vec<Issue>,
    pub schema_issues: Vec<SchemaIssue>,
    pub missing_refs: Vec<MissingRef>,
    pub undefined_traits: Vec<UndefinedTrait>,
}

impl CheckReport {
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
            + self.schema_issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len() + self.schema_issues.len() - self.error_count()
    }

    /// Whether the pass should fail: any error, or any warning when `strict`.
    pub fn failed(&self, strict: bool) -> bool {
        self.error_count() > 0 || (strict && self.warning_count() > 0)
    }
}

pub fn parse_error_issue(failure: &ParseFailure) -> Issue {
    Issue::error(
        IssueKind::ParseError,
        &failure.file_path,
        1,
        format!("Failed to parse: {}", failure.message),
    )
    .with_value(&failure.file_path)
    .with_hint("Fix the frontmatter or declaration syntax")
}

/// A vault-wide warning when the index no longer matches the files on disk.
pub fn stale_index_issue(staleness: &Staleness) -> Option<Issue> {
    if !staleness.is_stale() {
        return None;
    }
    Some(
        Issue::warning(
            IssueKind::StaleIndex,
            "",
            0,
            format!(
                "Index is stale: {} modified, {} new, {} deleted file(s)",
                staleness.modified_files.len(),
                staleness.new_files.len(),
                staleness.deleted_files.len()
            ),
        )
        .with_value(staleness.total().to_string())
        .with_fix_command("mdv reindex")
        .with_hint("Rebuild the index"),
    )
}

/// Index every parsed document of `snapshot` into `index`.
///
/// # Errors
///
/// Returns [`mdv_core::MdvError::Index`] if a write fails.
pub fn index_snapshot(index: &IndexManager, snapshot: &VaultSnapshot) -> Result<()> {
    for doc in &snapshot.documents {
        let content = snapshot.content(&doc.file_path).unwrap_or_default();
        index.index_document(doc, content)?;
    }
    Ok(())
}

/// Validate the whole snapshot. Aliases, duplicate aliases and staleness come
/// from `index`.
///
/// # Errors
///
/// Returns [`mdv_core::MdvError::Index`] if the index cannot be queried.
pub fn check_vault(snapshot: &VaultSnapshot, index: &IndexManager) -> Result<CheckReport> {
    // Unparseable files never reach the index, so they cannot make it stale.
    let on_disk: BTreeMap<String, String> = snapshot
        .documents
        .iter()
        .map(|doc| {
            let content = snapshot.content(&doc.file_path).unwrap_or_default();
            (doc.file_path.clone(), content_hash(content))
        })
        .collect();
    let staleness = index.check_staleness(&on_disk)?;

    let objects = object_infos(&snapshot.schema, &snapshot.documents);
    let validator = Validator::new(
        &snapshot.schema,
        &snapshot.config,
        &objects,
        index.aliases()?,
        index.duplicate_aliases()?,
    );

    let mut report = CheckReport {
        file_count: snapshot.contents.len(),
        ..CheckReport::default()
    };
    report
        .issues
        .extend(snapshot.parse_failures.iter().map(parse_error_issue));
    report.issues.extend(stale_index_issue(&staleness));

    let mut acc = CheckAccumulator::new();
    for doc in &snapshot.documents {
        report.issues.extend(validator.validate_document(doc, &mut acc));
    }
    report.schema_issues = validator.validate_schema(&acc);
    report.missing_refs = acc.missing_refs().cloned().collect();
    report.undefined_traits = acc.undefined_traits().cloned().collect();

    info!(
        files = report.file_count,
        errors = report.error_count(),
        warnings = report.warning_count(),
        "check finished"
    );
    Ok(report)
}
