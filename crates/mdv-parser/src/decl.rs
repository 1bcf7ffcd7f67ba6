//! Embedded declaration parsing (`::type(key=value, ...)`) with the pest grammar
//! in `decl.pest`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use mdv_core::wikilink::parse_whole_wikilink;
use mdv_core::{DeclArg, FieldValue, MdvError, Result};

#[derive(Parser)]
#[grammar = "decl.pest"]
struct DeclParser;

/// A declaration line before it is attached to an object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDeclaration {
    pub type_name: String,
    /// Byte span of the type name within the original line.
    pub type_span: (usize, usize),
    pub args: Vec<DeclArg>,
}

impl RawDeclaration {
    /// The `id=` argument, if it is a non-empty scalar.
    pub fn explicit_id(&self) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.key == "id")
            .and_then(|arg| arg.value.as_str())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Parse one line as a declaration.
///
/// Returns `Ok(None)` when the line does not start with `::`.
///
/// # Errors
///
/// Returns [`MdvError::Parse`] when the line starts with `::` but is not a
/// well-formed declaration.
pub fn parse_declaration(line: &str) -> Result<Option<RawDeclaration>> {
    let trimmed = line.trim();
    if !trimmed.starts_with("::") {
        return Ok(None);
    }
    let indent = line.len() - line.trim_start().len();

    let decl = DeclParser::parse(Rule::decl, trimmed)
        .map_err(|e| {
            MdvError::Parse(format!(
                "invalid declaration '{trimmed}': {}",
                e.variant.message()
            ))
        })?
        .next()
        .ok_or_else(|| MdvError::Parse(format!("invalid declaration '{trimmed}'")))?;

    let mut type_name = String::new();
    let mut type_span = (0, 0);
    let mut args = Vec::new();

    for pair in decl.into_inner() {
        match pair.as_rule() {
            Rule::head => {
                if let Some(name) = pair.into_inner().next() {
                    let span = name.as_span();
                    type_name = name.as_str().to_string();
                    type_span = (indent + span.start(), indent + span.end());
                }
            }
            Rule::args => {
                for arg in pair.into_inner() {
                    args.push(convert_arg(arg, indent));
                }
            }
            _ => {}
        }
    }

    Ok(Some(RawDeclaration {
        type_name,
        type_span,
        args,
    }))
}

fn convert_arg(arg: Pair<'_, Rule>, indent: usize) -> DeclArg {
    let mut inner = arg.into_inner();
    let (key, key_span) = match inner.next() {
        Some(key) => {
            let span = key.as_span();
            (
                key.as_str().to_string(),
                (indent + span.start(), indent + span.end()),
            )
        }
        None => (String::new(), (0, 0)),
    };
    match inner.next() {
        Some(value) => DeclArg {
            key,
            key_span,
            raw_value: value.as_str().trim().to_string(),
            value: convert_value(value),
        },
        None => DeclArg {
            key,
            key_span,
            raw_value: String::new(),
            value: FieldValue::Null,
        },
    }
}

fn convert_value(pair: Pair<'_, Rule>) -> FieldValue {
    let pair = match pair.as_rule() {
        Rule::value => match pair.into_inner().next() {
            Some(inner) => inner,
            None => return FieldValue::Null,
        },
        _ => pair,
    };
    match pair.as_rule() {
        Rule::wikilink => parse_whole_wikilink(pair.as_str())
            .map_or(FieldValue::Null, |target| FieldValue::Ref(target.to_string())),
        Rule::array => FieldValue::Array(pair.into_inner().map(convert_value).collect()),
        Rule::quoted => {
            let s = pair.as_str();
            let unquoted = &s[1..s.len() - 1];
            FieldValue::String(unquoted.replace("\\\"", "\""))
        }
        _ => FieldValue::from_bare(pair.as_str()),
    }
}
