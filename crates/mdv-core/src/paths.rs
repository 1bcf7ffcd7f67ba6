//! Object ID and vault path conventions.
//!
//! A file-level object ID is the vault-relative path of the markdown file
//! without its `.md` extension, always using `/` separators. Embedded objects
//! append `#fragment` to the ID of the file that contains them.

use chrono::{NaiveDate, NaiveDateTime};

/// Convert a vault-relative file path into a file-level object ID.
pub fn file_path_to_object_id(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");
    normalized
        .strip_suffix(".md")
        .unwrap_or(normalized)
        .to_string()
}

/// Convert an object ID (file-level or embedded) into the file that holds it.
pub fn object_id_to_file_path(id: &str) -> String {
    let base = split_embedded_id(id).map_or(id, |(file, _)| file);
    format!("{base}.md")
}

/// Split `file#fragment` into its two halves. Returns `None` for file-level IDs.
pub fn split_embedded_id(id: &str) -> Option<(&str, &str)> {
    id.split_once('#')
}

/// The name a reference may use without its directory: the fragment of an
/// embedded ID, or the last path segment of a file ID.
pub fn short_name(id: &str) -> &str {
    if let Some((_, fragment)) = split_embedded_id(id) {
        return fragment;
    }
    id.rsplit('/').next().unwrap_or(id)
}

/// Lowercase slug: alphanumerics are kept, every other run of
/// characters collapses into a single `-`.
pub fn slugify(s: &str) -> String {
    let s = s.strip_suffix(".md").unwrap_or(s);
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Slugify every `/` component of a path, and both halves of an embedded ID.
pub fn slugify_path(path: &str) -> String {
    let path = path.strip_suffix(".md").unwrap_or(path);
    path.split('/')
        .map(|part| match part.split_once('#') {
            Some((file, fragment)) => format!("{}#{}", slugify(file), slugify(fragment)),
            None => slugify(part),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a directory setting to `dir/` form (empty stays empty).
pub fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Strict `YYYY-MM-DD`.
pub fn is_valid_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// RFC 3339, or a local `YYYY-MM-DDTHH:MM[:SS]` timestamp.
pub fn is_valid_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}
