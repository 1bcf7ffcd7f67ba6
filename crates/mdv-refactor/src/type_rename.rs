//! Renaming an object type.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use mdv_core::config::CONFIG_FILE;
use mdv_core::frontmatter::top_level_key;
use mdv_core::paths::{file_path_to_object_id, normalize_dir};
use mdv_core::schema::{is_builtin_type, SCHEMA_FILE};
use mdv_core::ParsedDocument;
use mdv_vault::{Vault, VaultSnapshot};

use crate::plan::{
    push_edit, Change, ChangeType, Conflict, ConflictType, DefaultPathRenamePlan, FileEdit,
    FileMove, RenamePlan,
};
use crate::rewrite::{
    frontmatter_end, key_line, pluralize, rewrite_declaration_values, rewrite_frontmatter_value,
    rewrite_links, rewrite_prose_links, rewrite_query_type, rewrite_type_line, FileText,
};
use crate::yaml_doc::YamlDoc;
use crate::{validate_name, RefactorError, Result};

/// Directory half of a type rename: old ID → new ID for every moved file.
struct DirRename<'a> {
    new_path: &'a str,
    ids: BTreeMap<String, String>,
}

/// Plan renaming type `old` to `new`.
///
/// The base plan rewrites the schema (the type key and every `ref` target),
/// `type:` lines in the type's templates, `object:<old>` in saved queries,
/// frontmatter `type:` lines and `::old(...)` declarations. When the type's
/// default path ends in `old` or its plural, a directory rename is offered
/// alongside.
///
/// # Errors
///
/// Fails for invalid or built-in names, an unknown `old`, an existing `new`,
/// or unreadable schema, config or template files.
pub fn plan_type_rename(
    vault: &Vault,
    snapshot: &VaultSnapshot,
    old: &str,
    new: &str,
) -> Result<RenamePlan> {
    validate_name(new)?;
    if is_builtin_type(old) {
        return Err(RefactorError::BuiltinType(old.to_string()));
    }
    if is_builtin_type(new) {
        return Err(RefactorError::BuiltinType(new.to_string()));
    }
    let def = snapshot
        .schema
        .type_def(old)
        .ok_or_else(|| RefactorError::UnknownType(old.to_string()))?;
    if old == new || snapshot.schema.type_def(new).is_some() {
        return Err(RefactorError::TypeExists(new.to_string()));
    }
    let schema_source = snapshot
        .schema_source
        .as_deref()
        .ok_or_else(|| RefactorError::UnknownType(old.to_string()))?;

    let (changes, edits) = build(vault, snapshot, schema_source, old, new, None)?;
    let mut plan = RenamePlan {
        changes,
        conflicts: Vec::new(),
        default_path: None,
        edits,
    };

    let old_path = def.default_path.as_deref().map(normalize_dir).unwrap_or_default();
    if let Some(new_path) = suggest_default_path(&old_path, old, new) {
        let dir = plan_directory(
            vault,
            snapshot,
            schema_source,
            old,
            new,
            &old_path,
            &new_path,
            &plan.changes,
        )?;
        plan.default_path = Some(dir);
    }

    info!(
        old,
        new,
        changes = plan.changes.len(),
        files = plan.edits.len(),
        default_path = plan.default_path.is_some(),
        "planned type rename"
    );
    Ok(plan)
}

/// `events/` for `event` → `meeting` becomes `meetings/`; a last segment
/// equal to the type name itself is replaced by the new name.
pub fn suggest_default_path(default_path: &str, old: &str, new: &str) -> Option<String> {
    let dir = normalize_dir(default_path);
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let (parent, last) = match trimmed.rsplit_once('/') {
        Some((parent, last)) => (format!("{parent}/"), last),
        None => (String::new(), trimmed),
    };
    let segment = if last == old {
        new.to_string()
    } else if last == pluralize(old) {
        pluralize(new)
    } else {
        return None;
    };
    Some(format!("{parent}{segment}/"))
}

#[allow(clippy::too_many_arguments)]
fn plan_directory(
    vault: &Vault,
    snapshot: &VaultSnapshot,
    schema_source: &str,
    old: &str,
    new: &str,
    old_path: &str,
    new_path: &str,
    base_changes: &[Change],
) -> Result<DefaultPathRenamePlan> {
    let mut moves = Vec::new();
    let mut conflicts = Vec::new();
    let mut destinations = BTreeSet::new();

    for source in snapshot.contents.keys() {
        let Some(rest) = source.strip_prefix(old_path) else {
            continue;
        };
        let dest = format!("{new_path}{rest}");
        if vault.exists(&dest) {
            conflicts.push(Conflict {
                file_path: dest.clone(),
                conflict_type: ConflictType::DestinationExists,
                message: format!("Cannot move {source}: {dest} already exists"),
                line: 0,
            });
        } else if !destinations.insert(dest.clone()) {
            conflicts.push(Conflict {
                file_path: dest.clone(),
                conflict_type: ConflictType::DuplicateDestination,
                message: format!("More than one file would move to {dest}"),
                line: 0,
            });
        }
        if !vault.exists(source) {
            conflicts.push(Conflict {
                file_path: source.clone(),
                conflict_type: ConflictType::SourceMissing,
                message: format!("{source} no longer exists"),
                line: 0,
            });
        }
        moves.push(FileMove {
            source_rel_path: source.clone(),
            dest_rel_path: dest.clone(),
            source_id: file_path_to_object_id(source),
            dest_id: file_path_to_object_id(&dest),
        });
    }

    let dir = DirRename {
        new_path,
        ids: moves
            .iter()
            .map(|m| (m.source_id.clone(), m.dest_id.clone()))
            .collect(),
    };
    let (all_changes, edits) = build(vault, snapshot, schema_source, old, new, Some(&dir))?;
    let mut changes: Vec<Change> = all_changes
        .into_iter()
        .filter(|change| !base_changes.contains(change))
        .collect();
    changes.extend(moves.iter().map(|m| Change {
        file_path: m.source_rel_path.clone(),
        change_type: ChangeType::Move,
        description: format!("Move {} to {}", m.source_rel_path, m.dest_rel_path),
        line: 0,
    }));

    debug!(moves = moves.len(), conflicts = conflicts.len(), "planned default path rename");
    Ok(DefaultPathRenamePlan {
        old_path: old_path.to_string(),
        new_path: new_path.to_string(),
        moves,
        changes,
        conflicts,
        edits,
    })
}

fn build(
    vault: &Vault,
    snapshot: &VaultSnapshot,
    schema_source: &str,
    old: &str,
    new: &str,
    dir: Option<&DirRename<'_>>,
) -> Result<(Vec<Change>, Vec<FileEdit>)> {
    let mut changes = Vec::new();
    let mut edits = Vec::new();

    let mut schema = YamlDoc::parse(schema_source, SCHEMA_FILE)?;
    schema.rename_type(old, new);
    changes.push(Change {
        file_path: SCHEMA_FILE.to_string(),
        change_type: ChangeType::SchemaType,
        description: format!("Rename type '{old}' to '{new}'"),
        line: key_line(schema_source, old),
    });
    for field in schema.retarget_fields(old, new) {
        changes.push(Change {
            file_path: SCHEMA_FILE.to_string(),
            change_type: ChangeType::SchemaTarget,
            description: format!("Change target of '{field}' from '{old}' to '{new}'"),
            line: 0,
        });
    }
    if let Some(dir) = dir {
        schema.set_default_path(new, dir.new_path);
        changes.push(Change {
            file_path: SCHEMA_FILE.to_string(),
            change_type: ChangeType::SchemaDefaultPath,
            description: format!("Set default_path of '{new}' to '{}'", dir.new_path),
            line: 0,
        });
    }
    edits.push(FileEdit {
        path: SCHEMA_FILE.to_string(),
        original: schema_source.to_string(),
        updated: schema.to_yaml()?,
    });

    for template in snapshot.schema.template_files(old) {
        if !vault.exists(&template) {
            debug!(template, "template file missing; skipped");
            continue;
        }
        let original = vault.read_file(&template)?;
        let mut text = FileText::new(&original);
        let end = frontmatter_end(&original);
        for n in 2..end {
            if text.rewrite(n, |line| rewrite_type_line(line, old, new)) {
                changes.push(Change {
                    file_path: template.clone(),
                    change_type: ChangeType::TemplateType,
                    description: format!("type: {old} → type: {new}"),
                    line: n,
                });
            }
        }
        push_edit(&mut edits, template, original, text);
    }

    if let Some(config_source) = snapshot.config_source.as_deref() {
        let mut config = YamlDoc::parse(config_source, CONFIG_FILE)?;
        let renamed = config.rewrite_queries(|query| rewrite_query_type(query, old, new));
        if !renamed.is_empty() {
            for name in renamed {
                changes.push(Change {
                    file_path: CONFIG_FILE.to_string(),
                    change_type: ChangeType::SavedQuery,
                    description: format!("Rewrite saved query '{name}'"),
                    line: 0,
                });
            }
            edits.push(FileEdit {
                path: CONFIG_FILE.to_string(),
                original: config_source.to_string(),
                updated: config.to_yaml()?,
            });
        }
    }

    for doc in &snapshot.documents {
        let Some(original) = snapshot.content(&doc.file_path) else {
            continue;
        };
        let mut text = FileText::new(original);
        rewrite_document(doc, &mut text, old, new, dir, &mut changes);
        push_edit(&mut edits, doc.file_path.clone(), original.to_string(), text);
    }

    Ok((changes, edits))
}

fn rewrite_document(
    doc: &ParsedDocument,
    text: &mut FileText,
    old: &str,
    new: &str,
    dir: Option<&DirRename<'_>>,
    changes: &mut Vec<Change>,
) {
    let path = doc.file_path.as_str();
    let fm_end = doc.frontmatter_end.unwrap_or(0);

    if doc.file_object().is_some_and(|obj| obj.object_type == old) {
        for n in 2..fm_end {
            let is_type = text.line(n).and_then(top_level_key) == Some("type");
            if is_type && text.rewrite(n, |line| rewrite_type_line(line, old, new)) {
                changes.push(Change {
                    file_path: path.to_string(),
                    change_type: ChangeType::FrontmatterType,
                    description: format!("type: {old} → type: {new}"),
                    line: n,
                });
            }
        }
    }

    for decl in doc.declarations.iter().filter(|d| d.type_name == old) {
        if text.splice(decl.line, vec![(decl.type_span, new.to_string())]) {
            changes.push(Change {
                file_path: path.to_string(),
                change_type: ChangeType::DeclarationType,
                description: format!("::{old}(...) → ::{new}(...)"),
                line: decl.line,
            });
        }
    }

    let Some(dir) = dir else {
        return;
    };
    let decl_lines: BTreeSet<usize> = doc.declarations.iter().map(|d| d.line).collect();
    let mut fence: Option<&str> = None;
    for n in 1..=text.line_count() {
        let in_frontmatter = n > 1 && n < fm_end;
        if !in_frontmatter && n > fm_end {
            let trimmed = text.line(n).unwrap_or_default().trim_start();
            if let Some(marker) = fence {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
                continue;
            }
            if trimmed.starts_with("```") {
                fence = Some("```");
                continue;
            }
            if trimmed.starts_with("~~~") {
                fence = Some("~~~");
                continue;
            }
        }

        let in_body = n > fm_end && !decl_lines.contains(&n);
        let rewritten = text.rewrite(n, |line| {
            let linked = if in_body {
                rewrite_prose_links(line, &dir.ids)
            } else {
                rewrite_links(line, &dir.ids)
            };
            let current = linked.as_deref().unwrap_or(line);
            let valued = if in_frontmatter {
                rewrite_frontmatter_value(current, &dir.ids)
            } else if decl_lines.contains(&n) {
                rewrite_declaration_values(current, &dir.ids)
            } else {
                None
            };
            valued.or(linked)
        });
        if rewritten {
            changes.push(Change {
                file_path: path.to_string(),
                change_type: ChangeType::Reference,
                description: "Point references at moved files".to_string(),
                line: n,
            });
        }
    }
}
