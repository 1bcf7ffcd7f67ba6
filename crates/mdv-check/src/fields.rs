//! Value checks for fields and trait arguments.

use regex::Regex;
use std::sync::LazyLock;

use mdv_core::paths::{is_valid_date, is_valid_datetime};
use mdv_core::schema::FieldKind;
use mdv_core::{FieldDef, FieldValue, TraitDef};

use crate::issue::IssueKind;

static URL_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):(.*)$").expect("url scheme pattern is valid")
});

/// A rejected value, before it is placed in a file and line.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueProblem {
    pub kind: IssueKind,
    pub message: String,
    pub value: String,
    pub suggestion: Option<String>,
}

impl ValueProblem {
    fn new(kind: IssueKind, value: impl Into<String>, message: String) -> Self {
        ValueProblem {
            kind,
            message,
            value: value.into(),
            suggestion: None,
        }
    }
}

/// Check a present field value against its definition. Null is always accepted;
/// missing required values are reported elsewhere.
pub fn check_field(name: &str, value: &FieldValue, def: &FieldDef) -> Option<ValueProblem> {
    if value.is_null() {
        return None;
    }
    let ty = def.field_type;
    match value.as_array() {
        Some(items) if ty.array => items
            .iter()
            .find_map(|item| check_scalar(name, item, ty.kind, def)),
        Some(_) => Some(ValueProblem::new(
            IssueKind::InvalidFieldValue,
            display(value),
            format!("Field '{name}' expects a single {}, got a list", ty.kind.as_str()),
        )),
        None => check_scalar(name, value, ty.kind, def),
    }
}

fn check_scalar(name: &str, value: &FieldValue, kind: FieldKind, def: &FieldDef) -> Option<ValueProblem> {
    let shown = display(value);
    let invalid = |expected: &str| {
        Some(ValueProblem::new(
            IssueKind::InvalidFieldValue,
            shown.clone(),
            format!("Field '{name}' expects {expected}, got '{shown}'"),
        ))
    };

    match kind {
        FieldKind::String => value.as_array().and_then(|_| invalid("a string")),
        FieldKind::Number => {
            let Some(n) = value.as_number() else {
                return invalid("a number");
            };
            if let Some(min) = def.min.filter(|min| n < *min) {
                return Some(ValueProblem::new(
                    IssueKind::InvalidFieldValue,
                    shown.clone(),
                    format!("Field '{name}' value {shown} is below minimum {}", format_number(min)),
                ));
            }
            if let Some(max) = def.max.filter(|max| n > *max) {
                return Some(ValueProblem::new(
                    IssueKind::InvalidFieldValue,
                    shown.clone(),
                    format!("Field '{name}' value {shown} is above maximum {}", format_number(max)),
                ));
            }
            None
        }
        FieldKind::Url => match value.as_str() {
            Some(s) if is_valid_url(s) => None,
            _ => invalid("a URL with a scheme"),
        },
        FieldKind::Date => match value {
            FieldValue::Date(_) => None,
            _ => Some(ValueProblem::new(
                IssueKind::InvalidDateFormat,
                shown.clone(),
                format!("Invalid date '{shown}' for field '{name}' (expected YYYY-MM-DD)"),
            )),
        },
        FieldKind::Datetime => match value {
            FieldValue::Datetime(_) => None,
            FieldValue::String(s) if is_valid_datetime(s) => None,
            _ => Some(ValueProblem::new(
                IssueKind::InvalidDateFormat,
                shown.clone(),
                format!(
                    "Invalid datetime '{shown}' for field '{name}' (expected YYYY-MM-DDTHH:MM[:SS])"
                ),
            )),
        },
        FieldKind::Bool => match value.as_bool() {
            Some(_) => None,
            None => invalid("true or false"),
        },
        FieldKind::Enum => {
            if value.as_array().is_some() {
                return invalid("a single value");
            }
            enum_problem(&shown, &def.values, || format!("Field '{name}'"))
        }
        FieldKind::Ref => match value {
            FieldValue::Ref(_) | FieldValue::String(_) | FieldValue::Date(_) => None,
            _ => invalid("a reference"),
        },
    }
}

/// Check the raw text of a valued trait usage, e.g. `2025-02-01` in `@due(2025-02-01)`.
pub fn check_trait_value(name: &str, raw: &str, def: &TraitDef) -> Option<ValueProblem> {
    let kind = def.trait_type?.kind;
    let raw = raw.trim();
    match kind {
        FieldKind::Date if !is_valid_date(raw) => Some(ValueProblem::new(
            IssueKind::InvalidDateFormat,
            raw,
            format!("Invalid date format '{raw}' for trait '@{name}' (expected YYYY-MM-DD)"),
        )),
        FieldKind::Datetime if !is_valid_datetime(raw) => Some(ValueProblem::new(
            IssueKind::InvalidDateFormat,
            raw,
            format!("Invalid datetime format '{raw}' for trait '@{name}'"),
        )),
        FieldKind::Enum => enum_problem(raw, &def.values, || format!("Trait '@{name}'")),
        FieldKind::Number if raw.parse::<f64>().is_err() => Some(ValueProblem::new(
            IssueKind::InvalidTraitValue,
            raw,
            format!("Invalid number '{raw}' for trait '@{name}'"),
        )),
        FieldKind::Url if !is_valid_url(raw) => Some(ValueProblem::new(
            IssueKind::InvalidTraitValue,
            raw,
            format!("Invalid URL '{raw}' for trait '@{name}'"),
        )),
        FieldKind::Bool if raw != "true" && raw != "false" => Some(ValueProblem::new(
            IssueKind::InvalidTraitValue,
            raw,
            format!("Invalid boolean '{raw}' for trait '@{name}' (expected true or false)"),
        )),
        FieldKind::Ref if raw.is_empty() => Some(ValueProblem::new(
            IssueKind::InvalidTraitValue,
            raw,
            format!("Trait '@{name}' expects a reference"),
        )),
        _ => None,
    }
}

fn enum_problem(
    literal: &str,
    values: &[String],
    subject: impl FnOnce() -> String,
) -> Option<ValueProblem> {
    if values.is_empty() || values.iter().any(|v| v == literal) {
        return None;
    }
    let mut problem = ValueProblem::new(
        IssueKind::InvalidEnumValue,
        literal,
        format!(
            "{} has invalid value '{literal}' (allowed: {})",
            subject(),
            values.join(", ")
        ),
    );
    problem.suggestion = unquote_member(literal, values).map(str::to_string);
    Some(problem)
}

/// If `literal` is a valid enum member wrapped in matching quotes, return the member.
pub fn unquote_member<'a>(literal: &str, values: &'a [String]) -> Option<&'a str> {
    let inner = ['\'', '"'].iter().find_map(|q| {
        literal
            .strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    })?;
    values.iter().find(|v| *v == inner).map(String::as_str)
}

/// A URL needs a scheme; `http` and `https` also need a host.
pub fn is_valid_url(raw: &str) -> bool {
    let value = raw.trim();
    if value.is_empty() || value.contains(char::is_whitespace) {
        return false;
    }
    let Some(caps) = URL_SCHEME.captures(value) else {
        return false;
    };
    let scheme = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let rest = caps.get(2).map_or("", |m| m.as_str());
    match scheme.as_str() {
        "http" | "https" => rest
            .strip_prefix("//")
            .and_then(|after| after.split(['/', '?', '#']).next())
            .is_some_and(|host| !host.is_empty()),
        _ => !rest.is_empty(),
    }
}

/// Text form of a value, as it would be compared against enum members.
pub fn display(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::String(s)
        | FieldValue::Date(s)
        | FieldValue::Datetime(s)
        | FieldValue::Ref(s) => s.clone(),
        FieldValue::Number(n) => format_number(*n),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Array(items) => format!(
            "[{}]",
            items.iter().map(display).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
