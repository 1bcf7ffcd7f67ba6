//! Parsed document model: objects, trait usages, references and the raw
//! declaration spans that rewrites operate on.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::value::FieldValue;

/// One markdown file after parsing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedDocument {
    /// Vault-relative path with `/` separators.
    pub file_path: String,
    /// Objects in source order; the file-level object comes first.
    pub objects: Vec<ParsedObject>,
    pub traits: Vec<ParsedTrait>,
    pub refs: Vec<ParsedRef>,
    pub declarations: Vec<Declaration>,
    /// Line of the closing frontmatter delimiter, if the file has frontmatter.
    pub frontmatter_end: Option<usize>,
}

impl ParsedDocument {
    /// The file-level object.
    pub fn file_object(&self) -> Option<&ParsedObject> {
        self.objects.first()
    }

    pub fn object(&self, id: &str) -> Option<&ParsedObject> {
        self.objects.iter().find(|obj| obj.id == id)
    }
}

/// A file, a heading section, or an embedded typed declaration.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedObject {
    pub id: String,
    pub object_type: String,
    pub fields: BTreeMap<String, FieldValue>,
    /// 1-based line of each field, where known.
    pub field_lines: BTreeMap<String, usize>,
    pub source_file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Declared with `::type(...)` rather than frontmatter or a bare heading.
    pub embedded: bool,
    /// A standalone declaration that gave no `id=`.
    pub anonymous: bool,
}

impl ParsedObject {
    pub fn field_line(&self, name: &str) -> usize {
        self.field_lines.get(name).copied().unwrap_or(self.line)
    }
}

/// An inline `@trait` or `@trait(value)` usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTrait {
    pub name: String,
    /// Raw value between the parentheses, quotes included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub object_id: String,
    pub line: usize,
}

/// A reference to another object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRef {
    pub source_id: String,
    pub target_raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    pub line: usize,
    /// Frontmatter key or declaration argument that holds the link, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A `::type(key=value, ...)` line with byte spans relative to the line start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub line: usize,
    pub object_id: String,
    pub type_name: String,
    pub type_span: (usize, usize),
    pub args: Vec<DeclArg>,
}

impl Declaration {
    pub fn arg(&self, key: &str) -> Option<&DeclArg> {
        self.args.iter().find(|arg| arg.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclArg {
    pub key: String,
    pub key_span: (usize, usize),
    pub raw_value: String,
    pub value: FieldValue,
}
