//! # mdv-core
//!
//! Core types for mdv, a consistency engine for schema-governed markdown vaults.
//!
//! This crate defines the data model shared by every other mdv crate:
//! - [`Schema`] - object types, fields and traits loaded from `schema.yaml`
//! - [`VaultConfig`] - vault settings and saved queries from `mdv.yaml`
//! - [`ParsedDocument`] and [`ParsedObject`] - a parsed markdown file
//! - [`FieldValue`] - typed frontmatter and declaration values
//! - Object ID conventions ([`paths`]) and wikilink syntax ([`wikilink`])
//! - Error hierarchy ([`MdvError`], [`SchemaError`])
//! - Frontmatter splitting ([`frontmatter`])

pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod paths;
pub mod schema;
pub mod value;
pub mod wikilink;

pub use config::{SavedQuery, VaultConfig};
pub use document::{DeclArg, Declaration, ParsedDocument, ParsedObject, ParsedRef, ParsedTrait};
pub use error::{MdvError, Result, SchemaError};
pub use schema::{FieldDef, FieldKind, FieldType, Schema, TraitDef, TypeDef, TypeTraits};
pub use value::FieldValue;
