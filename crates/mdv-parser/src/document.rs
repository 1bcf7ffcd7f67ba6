//! Whole-document parsing: frontmatter, headings, declarations, traits and links.

use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use mdv_core::frontmatter::split_frontmatter;
use mdv_core::paths::{file_path_to_object_id, slugify};
use mdv_core::wikilink::find_wikilinks;
use mdv_core::{
    Declaration, MdvError, ParsedDocument, ParsedObject, ParsedRef, ParsedTrait, Result,
};

use crate::decl::{parse_declaration, RawDeclaration};
use crate::frontmatter::read_frontmatter;
use crate::traits::find_traits;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("heading pattern is valid")
});

/// A declaration must sit within this many lines of its heading to attach to it.
const DECL_HEADING_DISTANCE: usize = 2;

enum Event<'a> {
    Heading {
        level: usize,
        text: String,
        line: usize,
    },
    Decl {
        decl: RawDeclaration,
        line: usize,
    },
    Content {
        text: Cow<'a, str>,
        line: usize,
    },
}

/// Parse a markdown file. `file_path` is vault-relative.
///
/// # Errors
///
/// Returns [`MdvError::Parse`] for malformed frontmatter or declaration syntax.
pub fn parse_document(file_path: &str, content: &str) -> Result<ParsedDocument> {
    let file_path = file_path.replace('\\', "/");
    let file_id = file_path_to_object_id(&file_path);

    let fm = split_frontmatter(content)?;
    let fm_fields = fm.as_ref().map(read_frontmatter).transpose()?;
    let body_start = fm.map_or(0, |fm| fm.close_line);

    let mut doc = ParsedDocument {
        file_path: file_path.clone(),
        frontmatter_end: fm.map(|fm| fm.close_line),
        ..ParsedDocument::default()
    };

    let mut file_object = ParsedObject {
        id: file_id.clone(),
        object_type: "page".to_string(),
        fields: BTreeMap::new(),
        field_lines: BTreeMap::new(),
        source_file: file_path.clone(),
        line: 1,
        heading: None,
        parent_id: None,
        embedded: false,
        anonymous: false,
    };
    if let Some(fm_fields) = fm_fields {
        if let Some(object_type) = fm_fields.object_type {
            file_object.object_type = object_type;
        }
        file_object.fields = fm_fields.fields;
        file_object.field_lines = fm_fields.field_lines;
        for link in fm_fields.links {
            doc.refs.push(ParsedRef {
                source_id: file_id.clone(),
                target_raw: link.target,
                display_text: link.label,
                line: link.line,
                field: link.key,
            });
        }
    }
    doc.objects.push(file_object);

    let events = scan_body(content, body_start)?;
    build_objects(&mut doc, &file_id, events);

    Ok(doc)
}

fn scan_body(content: &str, body_start: usize) -> Result<Vec<Event<'_>>> {
    let mut events = Vec::new();
    let mut fence: Option<&str> = None;

    for (idx, line) in content.lines().enumerate().skip(body_start) {
        let line_no = idx + 1;
        let trimmed = line.trim_start();

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

        if let Some(caps) = HEADING.captures(line) {
            let level = caps.get(1).map_or(1, |m| m.as_str().len());
            let text = caps.get(2).map_or("", |m| m.as_str()).to_string();
            events.push(Event::Heading {
                level,
                text,
                line: line_no,
            });
            events.push(Event::Content {
                text: mask_inline_code(line),
                line: line_no,
            });
            continue;
        }

        let decl = parse_declaration(line).map_err(|e| match e {
            MdvError::Parse(msg) => MdvError::Parse(format!("line {line_no}: {msg}")),
            other => other,
        })?;
        if let Some(decl) = decl {
            events.push(Event::Decl {
                decl,
                line: line_no,
            });
            continue;
        }

        if !line.trim().is_empty() {
            events.push(Event::Content {
                text: mask_inline_code(line),
                line: line_no,
            });
        }
    }

    Ok(events)
}

struct Scope {
    level: usize,
    id: String,
    typed: bool,
}

fn build_objects(doc: &mut ParsedDocument, file_id: &str, events: Vec<Event<'_>>) {
    let mut used_ids: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<Scope> = Vec::new();
    let mut claimed_decls: BTreeSet<usize> = BTreeSet::new();

    let owner = |stack: &[Scope]| -> String {
        stack
            .iter()
            .rev()
            .find(|scope| scope.typed)
            .map_or_else(|| file_id.to_string(), |scope| scope.id.clone())
    };

    for (idx, event) in events.iter().enumerate() {
        match event {
            Event::Heading { level, text, line } => {
                while stack.last().is_some_and(|scope| scope.level >= *level) {
                    stack.pop();
                }
                let parent_id = owner(&stack);

                let attached = events.get(idx + 2).and_then(|next| match next {
                    Event::Decl { decl, line: decl_line }
                        if decl_line - line <= DECL_HEADING_DISTANCE =>
                    {
                        Some((idx + 2, decl, *decl_line))
                    }
                    _ => None,
                });

                let slug = heading_slug(text, *line);
                match attached {
                    Some((decl_idx, decl, decl_line)) => {
                        claimed_decls.insert(decl_idx);
                        let fragment = decl.explicit_id().map_or(slug, str::to_string);
                        let id = format!("{file_id}#{fragment}");
                        used_ids.insert(id.clone());
                        push_declared(doc, decl, &id, decl_line, Some(text.as_str()), &parent_id, false);
                        stack.push(Scope {
                            level: *level,
                            id,
                            typed: true,
                        });
                    }
                    None => {
                        let id = unique_id(&mut used_ids, file_id, &slug);
                        doc.objects.push(ParsedObject {
                            id: id.clone(),
                            object_type: "section".to_string(),
                            fields: BTreeMap::new(),
                            field_lines: BTreeMap::new(),
                            source_file: doc.file_path.clone(),
                            line: *line,
                            heading: Some(text.clone()),
                            parent_id: Some(parent_id),
                            embedded: false,
                            anonymous: false,
                        });
                        stack.push(Scope {
                            level: *level,
                            id,
                            typed: false,
                        });
                    }
                }
            }
            Event::Decl { decl, line } => {
                if claimed_decls.contains(&idx) {
                    continue;
                }
                let parent_id = owner(&stack);
                let (fragment, anonymous) = match decl.explicit_id() {
                    Some(id) => (id.to_string(), false),
                    None => (slugify(&decl.type_name), true),
                };
                let id = format!("{file_id}#{fragment}");
                used_ids.insert(id.clone());
                push_declared(doc, decl, &id, *line, None, &parent_id, anonymous);
            }
            Event::Content { text, line } => {
                let object_id = owner(&stack);
                let is_heading = idx > 0
                    && matches!(events.get(idx - 1), Some(Event::Heading { line: l, .. }) if l == line);
                if !is_heading {
                    for found in find_traits(text) {
                        doc.traits.push(ParsedTrait {
                            name: found.name.to_string(),
                            value: found.value.map(str::to_string),
                            object_id: object_id.clone(),
                            line: *line,
                        });
                    }
                }
                for link in find_wikilinks(text) {
                    doc.refs.push(ParsedRef {
                        source_id: object_id.clone(),
                        target_raw: link.target.to_string(),
                        display_text: link.label.map(str::to_string),
                        line: *line,
                        field: None,
                    });
                }
            }
        }
    }
}

fn push_declared(
    doc: &mut ParsedDocument,
    decl: &RawDeclaration,
    id: &str,
    line: usize,
    heading: Option<&str>,
    parent_id: &str,
    anonymous: bool,
) {
    let mut fields = BTreeMap::new();
    let mut field_lines = BTreeMap::new();
    for arg in &decl.args {
        fields.insert(arg.key.clone(), arg.value.clone());
        field_lines.insert(arg.key.clone(), line);
        for target in arg.value.ref_targets(false) {
            doc.refs.push(ParsedRef {
                source_id: id.to_string(),
                target_raw: target.to_string(),
                display_text: None,
                line,
                field: Some(arg.key.clone()),
            });
        }
    }

    doc.objects.push(ParsedObject {
        id: id.to_string(),
        object_type: decl.type_name.clone(),
        fields,
        field_lines,
        source_file: doc.file_path.clone(),
        line,
        heading: heading.map(str::to_string),
        parent_id: Some(parent_id.to_string()),
        embedded: true,
        anonymous,
    });
    doc.declarations.push(Declaration {
        line,
        object_id: id.to_string(),
        type_name: decl.type_name.clone(),
        type_span: decl.type_span,
        args: decl.args.clone(),
    });
}

fn heading_slug(text: &str, line: usize) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        format!("section-{line}")
    } else {
        slug
    }
}

/// Section IDs get `-2`, `-3`, ... when a heading repeats.
fn unique_id(used: &mut BTreeSet<String>, file_id: &str, slug: &str) -> String {
    let mut id = format!("{file_id}#{slug}");
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{file_id}#{slug}-{n}");
        n += 1;
    }
    used.insert(id.clone());
    id
}

/// Blank out inline code spans so links and traits inside them are ignored.
/// Byte offsets are preserved.
fn mask_inline_code(line: &str) -> Cow<'_, str> {
    if !line.contains('`') {
        return Cow::Borrowed(line);
    }
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('`') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('`') else {
            break;
        };
        out.push_str(&rest[..open]);
        let span_len = close + 2;
        out.extend(std::iter::repeat(' ').take(span_len));
        rest = &rest[open + span_len..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}
