//! # mdv-parser
//!
//! Markdown document parser for mdv vaults.
//!
//! Turns one markdown file into a [`ParsedDocument`](mdv_core::ParsedDocument):
//! frontmatter fields, heading sections, `::type(...)` declarations (parsed
//! with the pest grammar in `decl.pest`), `@trait` annotations and wikilinks.
//! Fenced code blocks and inline code are ignored.

pub mod decl;
pub mod document;
pub mod frontmatter;
pub mod traits;

pub use decl::{parse_declaration, RawDeclaration};
pub use document::parse_document;
pub use traits::{find_traits, TraitMatch};
