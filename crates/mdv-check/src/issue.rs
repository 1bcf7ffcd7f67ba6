//! Findings produced by a validation pass.

use serde::Serialize;
use std::fmt;

/// Severity of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => f.write_str("ERROR"),
            Level::Warning => f.write_str("WARN"),
        }
    }
}

/// What went wrong. Serialized in `snake_case` for `--json` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownType,
    MissingReference,
    UndefinedTrait,
    UnknownFrontmatterKey,
    DuplicateObjectId,
    MissingRequiredField,
    MissingRequiredTrait,
    InvalidEnumValue,
    InvalidFieldValue,
    AmbiguousReference,
    InvalidTraitValue,
    ParseError,
    MissingEmbeddedId,
    WrongTargetType,
    InvalidDateFormat,
    ShortRefCouldBeFullPath,
    StaleIndex,
    StaleFragment,
    UnusedType,
    UnusedTrait,
    MissingTargetType,
    SelfReferentialRequired,
    AliasCollision,
    DuplicateAlias,
    EnumWithoutValues,
    UndefinedRequiredTrait,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::UnknownType => "unknown_type",
            IssueKind::MissingReference => "missing_reference",
            IssueKind::UndefinedTrait => "undefined_trait",
            IssueKind::UnknownFrontmatterKey => "unknown_frontmatter_key",
            IssueKind::DuplicateObjectId => "duplicate_object_id",
            IssueKind::MissingRequiredField => "missing_required_field",
            IssueKind::MissingRequiredTrait => "missing_required_trait",
            IssueKind::InvalidEnumValue => "invalid_enum_value",
            IssueKind::InvalidFieldValue => "invalid_field_value",
            IssueKind::AmbiguousReference => "ambiguous_reference",
            IssueKind::InvalidTraitValue => "invalid_trait_value",
            IssueKind::ParseError => "parse_error",
            IssueKind::MissingEmbeddedId => "missing_embedded_id",
            IssueKind::WrongTargetType => "wrong_target_type",
            IssueKind::InvalidDateFormat => "invalid_date_format",
            IssueKind::ShortRefCouldBeFullPath => "short_ref_could_be_full_path",
            IssueKind::StaleIndex => "stale_index",
            IssueKind::StaleFragment => "stale_fragment",
            IssueKind::UnusedType => "unused_type",
            IssueKind::UnusedTrait => "unused_trait",
            IssueKind::MissingTargetType => "missing_target_type",
            IssueKind::SelfReferentialRequired => "self_referential_required",
            IssueKind::AliasCollision => "alias_collision",
            IssueKind::DuplicateAlias => "duplicate_alias",
            IssueKind::EnumWithoutValues => "enum_without_values",
            IssueKind::UndefinedRequiredTrait => "undefined_required_trait",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding tied to a file and line. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub level: Level,
    pub kind: IssueKind,
    pub file_path: String,
    pub line: usize,
    pub message: String,
    /// The offending value: a type name, trait name, reference, literal...
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    /// Exact replacement for `value`, set only when it is provably correct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn error(kind: IssueKind, file_path: &str, line: usize, message: impl Into<String>) -> Self {
        Issue::new(Level::Error, kind, file_path, line, message)
    }

    pub fn warning(
        kind: IssueKind,
        file_path: &str,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Issue::new(Level::Warning, kind, file_path, line, message)
    }

    fn new(
        level: Level,
        kind: IssueKind,
        file_path: &str,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Issue {
            level,
            kind,
            file_path: file_path.to_string(),
            line,
            message: message.into(),
            value: String::new(),
            fix_command: None,
            fix_hint: None,
            suggestion: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_fix_command(mut self, command: impl Into<String>) -> Self {
        self.fix_command = Some(command.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// A finding about the schema itself, or the vault as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIssue {
    pub level: Level,
    pub kind: IssueKind,
    pub message: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
}

impl SchemaIssue {
    pub fn error(kind: IssueKind, value: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaIssue {
            level: Level::Error,
            kind,
            message: message.into(),
            value: value.into(),
            fix_command: None,
            fix_hint: None,
        }
    }

    pub fn warning(kind: IssueKind, value: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaIssue {
            level: Level::Warning,
            ..SchemaIssue::error(kind, value, message)
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_as_snake_case() {
        let json = serde_json::to_string(&IssueKind::ShortRefCouldBeFullPath).unwrap();
        assert_eq!(json, "\"short_ref_could_be_full_path\"");
        assert_eq!(IssueKind::DuplicateAlias.to_string(), "duplicate_alias");
    }

    #[test]
    fn optional_parts_are_omitted_from_json() {
        let issue = Issue::warning(IssueKind::UndefinedTrait, "a.md", 3, "Undefined trait '@x'")
            .with_value("x");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["kind"], "undefined_trait");
        assert!(json.get("suggestion").is_none());
        assert!(json.get("fix_command").is_none());
    }

    #[test]
    fn levels_display_like_log_prefixes() {
        assert_eq!(Level::Error.to_string(), "ERROR");
        assert_eq!(Level::Warning.to_string(), "WARN");
    }
}
