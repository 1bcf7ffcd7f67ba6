//! Multi-file edits committed in two phases.
//!
//! Every write is first staged into a temporary file next to its destination.
//! Only when all of them are staged are they renamed into place, followed by
//! the file moves. A failure while staging leaves the vault untouched; a
//! failure during the rename sequence is reported with what already landed.

use std::collections::BTreeSet;

use tracing::{debug, info};

use mdv_core::error::MdvError;
use mdv_core::Result;

use crate::{stage, Vault};

/// Ordered whole-file writes followed by file moves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<(String, String)>,
    moves: Vec<(String, String)>,
}

/// What a commit touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitSummary {
    pub written: Vec<String>,
    pub moved: Vec<(String, String)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet::default()
    }

    /// Replace the whole content of `path`. A later write to the same path
    /// supersedes an earlier one.
    pub fn write(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        match self.writes.iter_mut().find(|(p, _)| *p == path) {
            Some(existing) => existing.1 = content,
            None => self.writes.push((path, content)),
        }
    }

    /// Move `from` to `to` after all writes have landed.
    pub fn move_file(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.moves.push((from.into(), to.into()));
    }

    pub fn writes(&self) -> &[(String, String)] {
        &self.writes
    }

    pub fn moves(&self) -> &[(String, String)] {
        &self.moves
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.moves.is_empty()
    }

    /// Check that every move has an existing source and a free destination.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Vault`] describing the first invalid move.
    pub fn validate_moves(&self, vault: &Vault) -> Result<()> {
        let mut destinations = BTreeSet::new();
        for (from, to) in &self.moves {
            if !vault.exists(from) {
                return Err(MdvError::Vault(format!("cannot move {from}: file does not exist")));
            }
            if vault.exists(to) || !destinations.insert(to.as_str()) {
                return Err(MdvError::Vault(format!(
                    "cannot move {from} to {to}: destination already exists"
                )));
            }
        }
        Ok(())
    }

    /// Apply the change set to the vault.
    ///
    /// # Errors
    ///
    /// Returns the first staging, rename or move failure. Staging failures
    /// leave the vault unmodified.
    pub fn commit(self, vault: &Vault) -> Result<CommitSummary> {
        self.validate_moves(vault)?;

        let mut staged = Vec::with_capacity(self.writes.len());
        for (rel, content) in &self.writes {
            let dest = vault.resolve_path(rel)?;
            staged.push((rel.clone(), dest.clone(), stage(&dest, content)?));
        }
        debug!(files = staged.len(), "staged writes");

        let mut summary = CommitSummary::default();
        for (rel, dest, file) in staged {
            file.persist(&dest).map_err(|e| {
                MdvError::Vault(format!(
                    "failed to write {rel} after committing {} file(s): {}",
                    summary.written.len(),
                    e.error
                ))
            })?;
            summary.written.push(rel);
        }

        for (from, to) in self.moves {
            let src = vault.resolve_path(&from)?;
            let dest = vault.resolve_path(&to)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&src, &dest).map_err(|e| {
                MdvError::Vault(format!(
                    "failed to move {from} to {to} after {} move(s): {e}",
                    summary.moved.len()
                ))
            })?;
            prune_empty_dirs(vault, &src);
            summary.moved.push((from, to));
        }

        info!(
            written = summary.written.len(),
            moved = summary.moved.len(),
            "committed change set"
        );
        Ok(summary)
    }
}

/// Remove the now-empty directories above a moved file, stopping at the
/// vault root or the first directory that still has entries.
fn prune_empty_dirs(vault: &Vault, moved_from: &std::path::Path) {
    for dir in moved_from.ancestors().skip(1) {
        if dir == vault.root() || !dir.starts_with(vault.root()) {
            break;
        }
        // Fails on a non-empty directory.
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
    }
}
