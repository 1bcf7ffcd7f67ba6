//! Renaming a field of one type.

use tracing::{debug, info};

use mdv_core::config::CONFIG_FILE;
use mdv_core::frontmatter::{top_level_key, top_level_key_span};
use mdv_core::schema::{RESERVED_KEYS, SCHEMA_FILE};
use mdv_core::ParsedDocument;
use mdv_vault::{Vault, VaultSnapshot};

use crate::plan::{push_edit, Change, ChangeType, Conflict, ConflictType, FileEdit, RenamePlan};
use crate::rewrite::{frontmatter_end, key_line, rewrite_query, rewrite_template_tokens, FileText};
use crate::yaml_doc::YamlDoc;
use crate::{validate_name, RefactorError, Result};

/// Plan renaming field `old` of `type_name` to `new`.
///
/// Covers the schema entry (and `name_field` when it names the field),
/// template frontmatter keys and `{{field.old}}` tokens, saved queries
/// scoped to `object:<type_name>`, frontmatter keys of objects of the type
/// and argument keys of its declarations. An object that already carries
/// `new` is a conflict.
///
/// # Errors
///
/// Fails for an unknown type or field, an invalid or reserved new name, or
/// unreadable schema, config or template files.
pub fn plan_field_rename(
    vault: &Vault,
    snapshot: &VaultSnapshot,
    type_name: &str,
    old: &str,
    new: &str,
) -> Result<RenamePlan> {
    let def = snapshot
        .schema
        .type_def(type_name)
        .ok_or_else(|| RefactorError::UnknownType(type_name.to_string()))?;
    if !def.fields.contains_key(old) {
        return Err(RefactorError::UnknownField {
            type_name: type_name.to_string(),
            field: old.to_string(),
        });
    }
    validate_name(new)?;
    if RESERVED_KEYS.contains(&new) {
        return Err(RefactorError::InvalidName {
            name: new.to_string(),
            reason: "reserved for every object",
        });
    }
    if old == new {
        return Err(RefactorError::InvalidName {
            name: new.to_string(),
            reason: "same as the current name",
        });
    }
    let schema_source = snapshot
        .schema_source
        .as_deref()
        .ok_or_else(|| RefactorError::UnknownType(type_name.to_string()))?;

    let mut plan = RenamePlan::default();

    if def.fields.contains_key(new) {
        plan.conflicts.push(Conflict {
            file_path: SCHEMA_FILE.to_string(),
            conflict_type: ConflictType::KeyExists,
            message: format!("Type '{type_name}' already has a field '{new}'"),
            line: key_line(schema_source, new),
        });
    }

    let mut schema = YamlDoc::parse(schema_source, SCHEMA_FILE)?;
    if schema.rename_field(type_name, old, new) {
        plan.changes.push(Change {
            file_path: SCHEMA_FILE.to_string(),
            change_type: ChangeType::SchemaField,
            description: format!("Rename field '{type_name}.{old}' to '{new}'"),
            line: key_line(schema_source, old),
        });
    }
    if schema.rebind_name_field(type_name, old, new) {
        plan.changes.push(Change {
            file_path: SCHEMA_FILE.to_string(),
            change_type: ChangeType::SchemaNameField,
            description: format!("name_field: {old} → name_field: {new}"),
            line: 0,
        });
    }
    plan.edits.push(FileEdit {
        path: SCHEMA_FILE.to_string(),
        original: schema_source.to_string(),
        updated: schema.to_yaml()?,
    });

    for template in snapshot.schema.template_files(type_name) {
        if !vault.exists(&template) {
            debug!(template, "template file missing; skipped");
            continue;
        }
        let original = vault.read_file(&template)?;
        let mut text = FileText::new(&original);
        rename_frontmatter_key(&template, &mut text, frontmatter_end(&original), old, new, &mut plan);
        let mut updated = text.into_string();
        if let Some((rewritten, lines)) = rewrite_template_tokens(&updated, old, new) {
            updated = rewritten;
            plan.changes.extend(lines.into_iter().map(|line| Change {
                file_path: template.clone(),
                change_type: ChangeType::TemplateToken,
                description: format!("{{{{field.{old}}}}} → {{{{field.{new}}}}}"),
                line,
            }));
        }
        push_edit(&mut plan.edits, template, original, FileText::new(&updated));
    }

    if let Some(config_source) = snapshot.config_source.as_deref() {
        let mut config = YamlDoc::parse(config_source, CONFIG_FILE)?;
        let renamed = config.rewrite_queries(|query| rewrite_query(query, type_name, old, new));
        if !renamed.is_empty() {
            plan.changes.extend(renamed.into_iter().map(|name| Change {
                file_path: CONFIG_FILE.to_string(),
                change_type: ChangeType::SavedQuery,
                description: format!("Rewrite saved query '{name}'"),
                line: 0,
            }));
            plan.edits.push(FileEdit {
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
        rename_in_document(doc, &mut text, type_name, old, new, &mut plan);
        push_edit(&mut plan.edits, doc.file_path.clone(), original.to_string(), text);
    }

    info!(
        type_name,
        old,
        new,
        changes = plan.changes.len(),
        conflicts = plan.conflicts.len(),
        "planned field rename"
    );
    Ok(plan)
}

fn rename_in_document(
    doc: &ParsedDocument,
    text: &mut FileText,
    type_name: &str,
    old: &str,
    new: &str,
    plan: &mut RenamePlan,
) {
    let typed_file = doc.file_object().is_some_and(|obj| obj.object_type == type_name);
    if typed_file {
        let end = doc.frontmatter_end.unwrap_or(0);
        rename_frontmatter_key(&doc.file_path, text, end, old, new, plan);
    }

    for decl in doc.declarations.iter().filter(|d| d.type_name == type_name) {
        let Some(arg) = decl.arg(old) else {
            continue;
        };
        if decl.arg(new).is_some() {
            plan.conflicts.push(Conflict {
                file_path: doc.file_path.clone(),
                conflict_type: ConflictType::KeyExists,
                message: format!("Declaration has both '{old}' and '{new}'"),
                line: decl.line,
            });
            continue;
        }
        if text.splice(decl.line, vec![(arg.key_span, new.to_string())]) {
            plan.changes.push(Change {
                file_path: doc.file_path.clone(),
                change_type: ChangeType::DeclarationKey,
                description: format!("{old}= → {new}="),
                line: decl.line,
            });
        }
    }
}

/// Rename a top-level `old:` key on frontmatter lines `2..end`.
fn rename_frontmatter_key(
    path: &str,
    text: &mut FileText,
    end: usize,
    old: &str,
    new: &str,
    plan: &mut RenamePlan,
) {
    let key_at = |text: &FileText, key: &str| {
        (2..end).find(|&n| text.line(n).and_then(top_level_key) == Some(key))
    };
    let Some(line) = key_at(&*text, old) else {
        return;
    };
    if let Some(existing) = key_at(&*text, new) {
        plan.conflicts.push(Conflict {
            file_path: path.to_string(),
            conflict_type: ConflictType::KeyExists,
            message: format!("Frontmatter has both '{old}' and '{new}'"),
            line: existing,
        });
        return;
    }
    let Some(span) = text.line(line).and_then(top_level_key_span) else {
        return;
    };
    if text.splice(line, vec![(span, new.to_string())]) {
        plan.changes.push(Change {
            file_path: path.to_string(),
            change_type: ChangeType::FrontmatterKey,
            description: format!("{old}: → {new}:"),
            line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{apply_plan, ApplyOptions};
    use tempfile::TempDir;

    const SCHEMA: &str = r#"version: 2
types:
  person:
    default_path: people/
    name_field: email
    template: templates/person.md
    fields:
      email: { type: string, required: true }
      team: { type: string }
  project:
    fields:
      email: { type: string }
"#;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, Vault, VaultSnapshot) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        let snapshot = vault.load_snapshot().unwrap();
        (dir, vault, snapshot)
    }

    fn person_vault() -> (TempDir, Vault, VaultSnapshot) {
        vault_with(&[
            ("schema.yaml", SCHEMA),
            (
                "mdv.yaml",
                "queries:\n  contacts:\n    query: 'object:person .email==*'\n  projects:\n    query: 'object:project .email==*'\n",
            ),
            ("templates/person.md", "---\ntype: person\nemail: \"\"\n---\n\nMail: {{field.email}}\n"),
            ("people/alice.md", "---\ntype: person\nemail: alice@example.com\n---\n# Alice\n"),
            ("projects/site.md", "---\ntype: project\nemail: team@example.com\n---\n"),
            ("daily/2025-02-01.md", "## Bob\n::person(id=bob, email=bob@example.com)\n"),
        ])
    }

    #[test]
    fn invalid_requests() {
        let (_dir, vault, snapshot) = person_vault();
        assert!(matches!(
            plan_field_rename(&vault, &snapshot, "robot", "email", "mail"),
            Err(RefactorError::UnknownType(_))
        ));
        assert!(matches!(
            plan_field_rename(&vault, &snapshot, "person", "phone", "mobile"),
            Err(RefactorError::UnknownField { .. })
        ));
        assert!(matches!(
            plan_field_rename(&vault, &snapshot, "person", "email", "alias"),
            Err(RefactorError::InvalidName { .. })
        ));
        assert!(matches!(
            plan_field_rename(&vault, &snapshot, "person", "email", "e mail"),
            Err(RefactorError::InvalidName { .. })
        ));
    }

    #[test]
    fn renames_every_surface_of_one_type() {
        let (_dir, vault, snapshot) = person_vault();
        let plan = plan_field_rename(&vault, &snapshot, "person", "email", "email_address").unwrap();
        assert!(!plan.has_conflicts());
        assert_eq!(
            plan.files(),
            vec![
                "schema.yaml",
                "templates/person.md",
                "mdv.yaml",
                "daily/2025-02-01.md",
                "people/alice.md",
            ]
        );

        apply_plan(&vault, &plan, ApplyOptions::default()).unwrap();

        let schema: serde_yaml::Value = serde_yaml::from_str(&vault.read_file("schema.yaml").unwrap()).unwrap();
        let person = &schema["types"]["person"];
        assert!(person["fields"]["email_address"]["required"].as_bool().unwrap());
        assert!(person["fields"].get("email").is_none());
        assert_eq!(person["name_field"].as_str(), Some("email_address"));
        assert!(schema["types"]["project"]["fields"].get("email").is_some());

        assert_eq!(
            vault.read_file("people/alice.md").unwrap(),
            "---\ntype: person\nemail_address: alice@example.com\n---\n# Alice\n"
        );
        assert_eq!(
            vault.read_file("daily/2025-02-01.md").unwrap(),
            "## Bob\n::person(id=bob, email_address=bob@example.com)\n"
        );
        assert_eq!(
            vault.read_file("projects/site.md").unwrap(),
            "---\ntype: project\nemail: team@example.com\n---\n"
        );
        assert_eq!(
            vault.read_file("templates/person.md").unwrap(),
            "---\ntype: person\nemail_address: \"\"\n---\n\nMail: {{field.email_address}}\n"
        );

        let config = vault.read_file("mdv.yaml").unwrap();
        assert!(config.contains("object:person .email_address==*"));
        assert!(config.contains("object:project .email==*"));
    }

    #[test]
    fn objects_with_both_keys_block_the_rename() {
        let (_dir, vault, snapshot) = vault_with(&[
            ("schema.yaml", SCHEMA),
            ("people/carol.md", "---\ntype: person\nemail: c@example.com\nmail: old@example.com\n---\n"),
            ("notes.md", "::person(id=dan, email=d@example.com, mail=x)\n"),
        ]);
        let plan = plan_field_rename(&vault, &snapshot, "person", "email", "mail").unwrap();
        assert_eq!(plan.conflicts.len(), 2);
        assert!(plan.conflicts.iter().all(|c| c.conflict_type == ConflictType::KeyExists));
        let lines: Vec<_> = plan.conflicts.iter().map(|c| (c.file_path.as_str(), c.line)).collect();
        assert!(lines.contains(&("people/carol.md", 4)));
        assert!(lines.contains(&("notes.md", 1)));

        assert!(matches!(
            apply_plan(&vault, &plan, ApplyOptions::default()),
            Err(RefactorError::Blocked(2))
        ));
        assert!(vault.read_file("people/carol.md").unwrap().contains("email: c@example.com"));
    }

    #[test]
    fn existing_schema_field_is_a_conflict() {
        let (_dir, vault, snapshot) = vault_with(&[("schema.yaml", SCHEMA)]);
        let plan = plan_field_rename(&vault, &snapshot, "person", "email", "team").unwrap();
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].file_path, "schema.yaml");
        assert_eq!(plan.conflicts[0].line, 9);
    }
}
