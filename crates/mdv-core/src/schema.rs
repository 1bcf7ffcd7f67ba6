//! Schema definition types: object types, their fields, and traits.
//!
//! The schema lives in `schema.yaml` at the vault root:
//!
//! ```yaml
//! types:
//!   person:
//!     default_path: people/
//!     name_field: name
//!     fields:
//!       name: { type: string, required: true }
//!       email: { type: string }
//!   meeting:
//!     traits: [due]
//!     fields:
//!       attendees: { type: "ref[]", target: person }
//! traits:
//!   due: { type: date }
//!   highlight: {}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{MdvError, Result, SchemaError};

/// Name of the schema file at the vault root.
pub const SCHEMA_FILE: &str = "schema.yaml";

/// Types that exist in every vault, whether or not the schema lists them.
pub const BUILTIN_TYPES: [&str; 3] = ["page", "section", "date"];

/// Keys every object may carry whatever its type.
pub const RESERVED_KEYS: [&str; 4] = ["type", "tags", "id", "alias"];

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// The whole schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
    #[serde(default)]
    pub traits: BTreeMap<String, TraitDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, TemplateDef>,
}

/// An object type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(default, skip_serializing_if = "TypeTraits::is_empty")]
    pub traits: TypeTraits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    /// Legacy single template file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Template ids resolved through [`Schema::templates`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Traits a type uses: either a plain list (all optional) or a map with
/// per-trait requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeTraits {
    List(Vec<String>),
    Map(BTreeMap<String, TraitUsage>),
}

impl Default for TypeTraits {
    fn default() -> Self {
        TypeTraits::List(Vec::new())
    }
}

impl TypeTraits {
    pub fn is_empty(&self) -> bool {
        match self {
            TypeTraits::List(names) => names.is_empty(),
            TypeTraits::Map(map) => map.is_empty(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            TypeTraits::List(names) => names.iter().map(String::as_str).collect(),
            TypeTraits::Map(map) => map.keys().map(String::as_str).collect(),
        }
    }

    pub fn required(&self) -> BTreeSet<&str> {
        match self {
            TypeTraits::List(_) => BTreeSet::new(),
            TypeTraits::Map(map) => map
                .iter()
                .filter(|(_, usage)| usage.required)
                .map(|(name, _)| name.as_str())
                .collect(),
        }
    }
}

/// Per-type trait settings in the map form of `traits:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitUsage {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
}

/// Definition of a single field on a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type", default = "FieldType::string")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
    /// For enum types: allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// For ref types: target object type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    pub fn is_ref(&self) -> bool {
        self.field_type.kind == FieldKind::Ref
    }

    /// `ref` target, if one is declared and non-empty.
    pub fn ref_target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn has_default(&self) -> bool {
        self.default
            .as_ref()
            .is_some_and(|value| !value.is_null())
    }
}

/// A trait definition. A trait with no type, or typed `bool`, is a marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitDef {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub trait_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
}

impl TraitDef {
    pub fn is_marker(&self) -> bool {
        self.trait_type
            .is_none_or(|t| t.kind == FieldKind::Bool && !t.array)
    }
}

/// A named template in the top-level `templates:` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Scalar kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Number,
    Url,
    Date,
    Datetime,
    Bool,
    Enum,
    Ref,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Url => "url",
            FieldKind::Date => "date",
            FieldKind::Datetime => "datetime",
            FieldKind::Bool => "bool",
            FieldKind::Enum => "enum",
            FieldKind::Ref => "ref",
        }
    }
}

/// A field type as written in the schema, e.g. `ref[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldType {
    pub kind: FieldKind,
    pub array: bool,
}

impl FieldType {
    pub fn string() -> Self {
        FieldType {
            kind: FieldKind::String,
            array: false,
        }
    }

    pub fn scalar(kind: FieldKind) -> Self {
        FieldType { kind, array: false }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (base, array) = match trimmed.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (trimmed, false),
        };
        let kind = match base.to_ascii_lowercase().as_str() {
            "" | "string" => FieldKind::String,
            "number" => FieldKind::Number,
            "url" => FieldKind::Url,
            "date" => FieldKind::Date,
            "datetime" => FieldKind::Datetime,
            "bool" | "boolean" => FieldKind::Bool,
            "enum" => FieldKind::Enum,
            "ref" => FieldKind::Ref,
            _ => return Err(SchemaError::InvalidFieldType(s.to_string())),
        };
        Ok(FieldType { kind, array })
    }
}

impl TryFrom<String> for FieldType {
    type Error = SchemaError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if self.array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl Schema {
    /// Parse schema YAML. Built-in types are added when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ParseError`] for malformed YAML or unknown field types.
    pub fn from_yaml(yaml: &str) -> Result<Schema> {
        let mut schema: Schema = if yaml.trim().is_empty() {
            Schema::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::ParseError(e.to_string()))?
        };
        schema.add_builtins();
        Ok(schema)
    }

    /// Load `schema.yaml` from the vault root, or the built-in-only schema if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Io`] if the file exists but cannot be read, and
    /// [`MdvError::Schema`] if it cannot be parsed.
    pub fn load(vault_root: &Path) -> Result<Schema> {
        let path = vault_root.join(SCHEMA_FILE);
        if !path.exists() {
            return Schema::from_yaml("");
        }
        let content = std::fs::read_to_string(&path)?;
        Schema::from_yaml(&content)
    }

    fn add_builtins(&mut self) {
        for name in BUILTIN_TYPES {
            self.types.entry(name.to_string()).or_default();
        }
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownType`] when the type is not defined.
    pub fn require_type(&self, name: &str) -> Result<&TypeDef> {
        self.types
            .get(name)
            .ok_or_else(|| MdvError::Schema(SchemaError::UnknownType(name.to_string())))
    }

    /// User-defined (non built-in) type names, sorted.
    pub fn user_types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types
            .iter()
            .filter(|(name, _)| !is_builtin_type(name))
    }

    /// Every template file the type uses: the legacy `template`, the ids in
    /// `templates`, and `default_template`, resolved through the top-level
    /// template map. Unknown ids are skipped; duplicates are removed.
    pub fn template_files(&self, type_name: &str) -> Vec<String> {
        let Some(def) = self.types.get(type_name) else {
            return Vec::new();
        };
        let mut files: Vec<String> = Vec::new();
        let mut push = |file: &str| {
            let file = file.trim();
            if !file.is_empty() && !files.iter().any(|f| f == file) {
                files.push(file.to_string());
            }
        };
        if let Some(legacy) = def.template.as_deref().filter(|t| looks_like_file(t)) {
            push(legacy);
        }
        let ids = def.templates.iter().chain(def.default_template.iter());
        for id in ids {
            if let Some(template) = self.templates.get(id) {
                push(&template.file);
            }
        }
        files
    }
}

/// Inline template bodies are allowed in `template:`; only single-line
/// markdown paths are treated as files.
fn looks_like_file(s: &str) -> bool {
    !s.contains('\n') && s.trim().ends_with(".md")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
types:
  person:
    default_path: people/
    name_field: name
    fields:
      name: { type: string, required: true }
      tags_count: { type: "number[]" }
      active: { type: boolean }
  meeting:
    default_path: meetings/
    templates: [standard]
    default_template: standard
    template: templates/legacy-meeting.md
    traits:
      due: { required: true }
      highlight: {}
    fields:
      attendees: { type: "ref[]", target: person }
      status: { type: enum, values: [planned, done], default: planned }
traits:
  due: { type: date }
  highlight: {}
  starred: { type: bool }
templates:
  standard: { file: templates/meeting.md }
"#;

    #[test]
    fn parses_types_fields_and_traits() {
        let schema = Schema::from_yaml(SCHEMA).expect("parse");
        let person = schema.type_def("person").expect("person");
        assert_eq!(person.default_path.as_deref(), Some("people/"));
        assert_eq!(person.fields["name"].field_type, FieldType::string());
        assert!(person.fields["name"].required);
        assert_eq!(
            person.fields["tags_count"].field_type,
            FieldType {
                kind: FieldKind::Number,
                array: true
            }
        );
        assert_eq!(person.fields["active"].field_type.kind, FieldKind::Bool);

        let meeting = schema.type_def("meeting").expect("meeting");
        assert!(meeting.fields["attendees"].is_ref());
        assert_eq!(meeting.fields["attendees"].ref_target(), Some("person"));
        assert!(meeting.fields["status"].has_default());
        assert_eq!(meeting.traits.required(), BTreeSet::from(["due"]));
        assert_eq!(meeting.traits.names(), vec!["due", "highlight"]);
    }

    #[test]
    fn builtins_are_always_present() {
        let schema = Schema::from_yaml("").expect("parse");
        for name in BUILTIN_TYPES {
            assert!(schema.type_def(name).is_some(), "missing {name}");
        }
        assert_eq!(schema.user_types().count(), 0);
    }

    #[test]
    fn marker_traits() {
        let schema = Schema::from_yaml(SCHEMA).expect("parse");
        assert!(schema.traits["highlight"].is_marker());
        assert!(schema.traits["starred"].is_marker());
        assert!(!schema.traits["due"].is_marker());
    }

    #[test]
    fn rejects_unknown_field_type() {
        let err = Schema::from_yaml("types:\n  x:\n    fields:\n      a: { type: color }\n")
            .expect_err("should fail");
        assert!(err.to_string().contains("color"));
    }

    #[test]
    fn field_type_string_roundtrip() {
        let ft: FieldType = "ref[]".parse().expect("parse");
        assert_eq!(ft.to_string(), "ref[]");
        let json = serde_json::to_string(&ft).expect("serialize");
        assert_eq!(json, "\"ref[]\"");
    }

    #[test]
    fn template_files_resolve_ids_and_legacy() {
        let schema = Schema::from_yaml(SCHEMA).expect("parse");
        assert_eq!(
            schema.template_files("meeting"),
            vec![
                "templates/legacy-meeting.md".to_string(),
                "templates/meeting.md".to_string()
            ]
        );
        assert!(schema.template_files("person").is_empty());
    }
}
