//! Rename plans and applying them.

use serde::Serialize;

use tracing::info;

use mdv_vault::{ChangeSet, Vault};

use crate::rewrite::FileText;
use crate::{RefactorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    SchemaType,
    SchemaTarget,
    SchemaField,
    SchemaNameField,
    SchemaDefaultPath,
    FrontmatterType,
    FrontmatterKey,
    DeclarationType,
    DeclarationKey,
    TemplateType,
    TemplateToken,
    SavedQuery,
    Reference,
    Move,
}

/// One planned edit, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub file_path: String,
    pub change_type: ChangeType,
    pub description: String,
    /// 1-based; 0 when the change is not tied to a line.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Old and new keys both present in one scope.
    KeyExists,
    DestinationExists,
    DuplicateDestination,
    SourceMissing,
}

/// Something that blocks applying a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub file_path: String,
    pub conflict_type: ConflictType,
    pub message: String,
    pub line: usize,
}

/// Full new contents for one file, checked against `original` at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub path: String,
    pub original: String,
    pub updated: String,
}

/// Record an edit when the rewritten text differs from `original`.
pub(crate) fn push_edit(edits: &mut Vec<FileEdit>, path: String, original: String, text: FileText) {
    let updated = text.into_string();
    if updated != original {
        edits.push(FileEdit {
            path,
            original,
            updated,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMove {
    pub source_rel_path: String,
    pub dest_rel_path: String,
    pub source_id: String,
    pub dest_id: String,
}

/// Optional directory rename offered with a type rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultPathRenamePlan {
    pub old_path: String,
    pub new_path: String,
    pub moves: Vec<FileMove>,
    /// Changes in addition to the base plan's.
    pub changes: Vec<Change>,
    pub conflicts: Vec<Conflict>,
    /// Complete edit set used instead of the base plan's edits.
    #[serde(skip)]
    pub edits: Vec<FileEdit>,
}

/// A previewable, conflict-checked rename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub changes: Vec<Change>,
    pub conflicts: Vec<Conflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_path: Option<DefaultPathRenamePlan>,
    /// Ordered: schema, templates, config, then documents by path.
    #[serde(skip)]
    pub edits: Vec<FileEdit>,
}

impl RenamePlan {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Files the plan would write, without the directory option.
    pub fn files(&self) -> Vec<&str> {
        self.edits.iter().map(|e| e.path.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub rename_default_path: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub files_written: usize,
    pub files_moved: usize,
    pub default_path_renamed: bool,
}

/// Apply a plan. Nothing is written if the plan (or the chosen directory
/// rename) has conflicts, or if any file changed since planning.
///
/// # Errors
///
/// [`RefactorError::Blocked`], [`RefactorError::NoDefaultPathRename`],
/// [`RefactorError::StalePlan`], or a file-system error from the commit.
pub fn apply_plan(vault: &Vault, plan: &RenamePlan, options: ApplyOptions) -> Result<ApplySummary> {
    if plan.has_conflicts() {
        return Err(RefactorError::Blocked(plan.conflicts.len()));
    }
    let (edits, moves) = if options.rename_default_path {
        let dir = plan
            .default_path
            .as_ref()
            .ok_or(RefactorError::NoDefaultPathRename)?;
        if !dir.conflicts.is_empty() {
            return Err(RefactorError::Blocked(dir.conflicts.len()));
        }
        (&dir.edits, dir.moves.as_slice())
    } else {
        (&plan.edits, &[][..])
    };

    for edit in edits {
        let current = vault.read_file(&edit.path).map_err(|_| RefactorError::StalePlan(edit.path.clone()))?;
        if current != edit.original {
            return Err(RefactorError::StalePlan(edit.path.clone()));
        }
    }

    let mut changes = ChangeSet::new();
    for edit in edits {
        changes.write(&edit.path, &edit.updated);
    }
    for mv in moves {
        changes.move_file(&mv.source_rel_path, &mv.dest_rel_path);
    }
    let summary = changes.commit(vault)?;

    info!(
        written = summary.written.len(),
        moved = summary.moved.len(),
        "rename applied"
    );
    Ok(ApplySummary {
        files_written: summary.written.len(),
        files_moved: summary.moved.len(),
        default_path_renamed: options.rename_default_path,
    })
}
