//! Stub pages for missing references whose type is certain.

use serde::Serialize;
use std::collections::BTreeSet;

use tracing::info;

use mdv_core::paths::{normalize_dir, short_name, slugify};
use mdv_core::wikilink::split_fragment;
use mdv_core::{Result, Schema};
use mdv_vault::{ChangeSet, Vault};

use crate::accumulator::MissingRef;
use crate::confidence::Confidence;

/// A page to be created for a dangling reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StubPage {
    pub target: String,
    pub type_name: String,
    pub file_path: String,
    #[serde(skip)]
    pub content: String,
}

/// Stubs to create, and the references left for a human.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemediationPlan {
    pub stubs: Vec<StubPage>,
    /// Inferred and unknown references; listed, never created.
    pub unresolved: Vec<MissingRef>,
}

impl RemediationPlan {
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty() && self.unresolved.is_empty()
    }
}

/// Plan stub pages. Only [`Confidence::Certain`] references produce stubs, and
/// never over an existing file.
pub fn plan_stubs<'a>(
    schema: &Schema,
    missing: impl IntoIterator<Item = &'a MissingRef>,
    exists: impl Fn(&str) -> bool,
) -> RemediationPlan {
    let mut plan = RemediationPlan::default();
    let mut planned = BTreeSet::new();

    for reference in missing {
        let type_name = match (&reference.confidence, &reference.inferred_type) {
            (Confidence::Certain, Some(type_name)) => type_name,
            _ => {
                plan.unresolved.push(reference.clone());
                continue;
            }
        };
        let (base, _) = split_fragment(&reference.target_path);
        let base = base.trim();
        if base.is_empty() {
            continue;
        }

        let file_path = if base.contains('/') {
            format!("{base}.md")
        } else {
            let dir = schema
                .type_def(type_name)
                .and_then(|def| def.default_path.as_deref())
                .map(normalize_dir)
                .unwrap_or_default();
            format!("{dir}{}.md", slugify(base))
        };
        if exists(&file_path) || !planned.insert(file_path.clone()) {
            continue;
        }

        plan.stubs.push(StubPage {
            target: reference.target_path.clone(),
            type_name: type_name.clone(),
            content: stub_content(schema, type_name, short_name(base)),
            file_path,
        });
    }
    plan
}

fn stub_content(schema: &Schema, type_name: &str, title: &str) -> String {
    let mut out = format!("---\ntype: {type_name}\n");
    if let Some(def) = schema.type_def(type_name) {
        if let Some(name_field) = &def.name_field {
            out.push_str(&format!("{name_field}: {}\n", yaml_scalar(title)));
        }
        for (field, field_def) in &def.fields {
            if field_def.required && !field_def.has_default() && Some(field) != def.name_field.as_ref() {
                out.push_str(&format!("{field}:\n"));
            }
        }
    }
    out.push_str(&format!("---\n\n# {title}\n"));
    out
}

fn yaml_scalar(text: &str) -> String {
    let plain = !text.is_empty()
        && !text.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c) || c.is_whitespace())
        && !text.contains(": ")
        && !text.contains(" #")
        && !text.ends_with(char::is_whitespace);
    if plain {
        text.to_string()
    } else {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Write the planned stubs when `confirm` is set. Returns the number created.
///
/// # Errors
///
/// Fails if any stub cannot be written.
pub fn create_stubs(vault: &Vault, plan: &RemediationPlan, confirm: bool) -> Result<usize> {
    if !confirm || plan.stubs.is_empty() {
        return Ok(0);
    }
    let mut changes = ChangeSet::new();
    for stub in &plan.stubs {
        changes.write(&stub.file_path, &stub.content);
    }
    let summary = changes.commit(vault)?;
    info!(created = summary.written.len(), "created stub pages");
    Ok(summary.written.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn schema() -> Schema {
        Schema::from_yaml(
            r#"
types:
  person:
    default_path: people/
    name_field: name
    fields:
      name: { type: string, required: true }
      email: { type: string, required: true }
      role: { type: string, required: true, default: member }
"#,
        )
        .unwrap()
    }

    fn missing(target: &str, confidence: Confidence, inferred: Option<&str>) -> MissingRef {
        MissingRef {
            target_path: target.to_string(),
            inferred_type: inferred.map(str::to_string),
            confidence,
            source_object_id: "projects/site".into(),
            source_file: "projects/site.md".into(),
            field_source: None,
            line: 3,
        }
    }

    #[test]
    fn only_certain_references_become_stubs() {
        let refs = [
            missing("carol", Confidence::Certain, Some("person")),
            missing("people/dave", Confidence::Inferred, Some("person")),
            missing("nowhere", Confidence::Unknown, None),
            missing("people/erin#bio", Confidence::Certain, Some("person")),
        ];
        let plan = plan_stubs(&schema(), &refs, |_| false);
        let paths: Vec<_> = plan.stubs.iter().map(|s| s.file_path.as_str()).collect();
        assert_eq!(paths, vec!["people/carol.md", "people/erin.md"]);
        assert_eq!(plan.unresolved.len(), 2);
        assert_eq!(
            plan.stubs[0].content,
            "---\ntype: person\nname: carol\nemail:\n---\n\n# carol\n"
        );
    }

    #[test]
    fn existing_and_duplicate_paths_are_skipped() {
        let refs = [
            missing("Carol", Confidence::Certain, Some("person")),
            missing("carol", Confidence::Certain, Some("person")),
            missing("bob", Confidence::Certain, Some("person")),
        ];
        let plan = plan_stubs(&schema(), &refs, |path| path == "people/bob.md");
        assert_eq!(plan.stubs.len(), 1);
        assert_eq!(plan.stubs[0].target, "Carol");
    }

    #[test]
    fn titles_that_need_quoting() {
        assert_eq!(yaml_scalar("Alice"), "Alice");
        assert_eq!(yaml_scalar("Re: plans"), "\"Re: plans\"");
        assert_eq!(yaml_scalar("@home"), "\"@home\"");
    }

    #[test]
    fn stubs_are_written_only_when_confirmed() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(dir.path()).unwrap();
        let plan = plan_stubs(&schema(), &[missing("carol", Confidence::Certain, Some("person"))], |p| {
            vault.exists(p)
        });

        assert_eq!(create_stubs(&vault, &plan, false).unwrap(), 0);
        assert!(!vault.exists("people/carol.md"));

        assert_eq!(create_stubs(&vault, &plan, true).unwrap(), 1);
        assert!(vault.read_file("people/carol.md").unwrap().contains("type: person"));
    }
}
