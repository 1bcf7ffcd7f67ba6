//! Field values as they appear in frontmatter and embedded declarations.

use serde::Serialize;

use crate::paths::{is_valid_date, is_valid_datetime};
use crate::wikilink::parse_whole_wikilink;

/// A parsed field value.
///
/// Dates and datetimes keep their literal text; nothing here is normalised
/// because rewrites always operate on the original file bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    Date(String),
    Datetime(String),
    Ref(String),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Empty strings and empty arrays count as "no value" for required checks.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.trim().is_empty(),
            FieldValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Textual view of scalar values (strings, dates, datetimes, references).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s)
            | FieldValue::Date(s)
            | FieldValue::Datetime(s)
            | FieldValue::Ref(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Reference targets carried by this value: explicit `[[links]]`, or any
    /// plain string when the field is known to be reference-typed.
    pub fn ref_targets(&self, ref_typed: bool) -> Vec<&str> {
        match self {
            FieldValue::Ref(target) => vec![target.as_str()],
            FieldValue::String(s) | FieldValue::Date(s) if ref_typed && !s.trim().is_empty() => {
                vec![s.trim()]
            }
            FieldValue::Array(items) => items
                .iter()
                .flat_map(|item| item.ref_targets(ref_typed))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Convert a YAML frontmatter value.
    ///
    /// A string that is exactly one wikilink becomes [`FieldValue::Ref`], as does
    /// the nested-sequence shape YAML produces for an unquoted `[[target]]`.
    pub fn from_yaml(value: &serde_yaml::Value) -> FieldValue {
        use serde_yaml::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
            Value::String(s) => classify_string(s),
            Value::Sequence(items) => {
                if let Some(target) = unquoted_wikilink(items) {
                    return FieldValue::Ref(target);
                }
                FieldValue::Array(items.iter().map(FieldValue::from_yaml).collect())
            }
            Value::Mapping(_) => FieldValue::String(
                serde_yaml::to_string(value)
                    .unwrap_or_default()
                    .trim_end()
                    .to_string(),
            ),
            Value::Tagged(tagged) => FieldValue::from_yaml(&tagged.value),
        }
    }

    /// Interpret a bare (unquoted) declaration argument.
    pub fn from_bare(raw: &str) -> FieldValue {
        let raw = raw.trim();
        match raw {
            "" => FieldValue::Null,
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => {
                if let Ok(n) = raw.parse::<f64>() {
                    if n.is_finite() {
                        return FieldValue::Number(n);
                    }
                }
                classify_string(raw)
            }
        }
    }
}

fn classify_string(s: &str) -> FieldValue {
    if let Some(link) = parse_whole_wikilink(s) {
        return FieldValue::Ref(link.to_string());
    }
    if is_valid_date(s) {
        FieldValue::Date(s.to_string())
    } else if is_valid_datetime(s) {
        FieldValue::Datetime(s.to_string())
    } else {
        FieldValue::String(s.to_string())
    }
}

/// `owner: [[people/alice]]` parses as `[["people/alice"]]`.
fn unquoted_wikilink(items: &[serde_yaml::Value]) -> Option<String> {
    let [serde_yaml::Value::Sequence(inner)] = items else {
        return None;
    };
    let [serde_yaml::Value::String(target)] = inner.as_slice() else {
        return None;
    };
    let target = target.split('|').next().unwrap_or(target).trim();
    (!target.is_empty()).then(|| target.to_string())
}
