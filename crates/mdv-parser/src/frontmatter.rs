//! Frontmatter YAML → typed fields, with the line of every top-level key.

use std::collections::BTreeMap;

use mdv_core::frontmatter::{top_level_key, Frontmatter};
use mdv_core::wikilink::find_wikilinks;
use mdv_core::{FieldValue, MdvError, Result};

/// Fields read from a frontmatter block.
#[derive(Debug, Default)]
pub struct FrontmatterFields {
    pub object_type: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub field_lines: BTreeMap<String, usize>,
    /// Every wikilink written in the block.
    pub links: Vec<FrontmatterLink>,
}

/// A wikilink inside frontmatter and the top-level key it sits under.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontmatterLink {
    pub key: Option<String>,
    pub target: String,
    pub label: Option<String>,
    pub line: usize,
}

/// Deserialize a frontmatter block.
///
/// # Errors
///
/// Returns [`MdvError::Parse`] when the YAML is malformed or is not a mapping.
pub fn read_frontmatter(fm: &Frontmatter<'_>) -> Result<FrontmatterFields> {
    let value: serde_yaml::Value = serde_yaml::from_str(fm.yaml)
        .map_err(|e| MdvError::Parse(format!("invalid frontmatter YAML: {e}")))?;

    let mapping = match value {
        serde_yaml::Value::Null => serde_yaml::Mapping::new(),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => {
            return Err(MdvError::Parse(
                "frontmatter must be a YAML mapping".to_string(),
            ))
        }
    };

    let mut out = FrontmatterFields::default();
    for (key, value) in &mapping {
        let Some(key) = yaml_key(key) else {
            continue;
        };
        if key == "type" {
            out.object_type = value
                .as_str()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            continue;
        }
        out.fields.insert(key, FieldValue::from_yaml(value));
    }

    let mut current_key: Option<String> = None;
    for (idx, line) in fm.yaml.lines().enumerate() {
        let line_no = Frontmatter::FIRST_LINE + idx;
        if let Some(key) = top_level_key(line) {
            out.field_lines.entry(key.to_string()).or_insert(line_no);
            current_key = Some(key.to_string());
        } else if !line.starts_with([' ', '\t', '-']) && !line.trim().is_empty() {
            current_key = None;
        }
        for link in find_wikilinks(line) {
            out.links.push(FrontmatterLink {
                key: current_key.clone(),
                target: link.target.to_string(),
                label: link.label.map(str::to_string),
                line: line_no,
            });
        }
    }

    Ok(out)
}

fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
