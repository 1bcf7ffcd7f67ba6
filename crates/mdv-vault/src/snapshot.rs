//! One consistent, parsed view of the vault for a single pass.

use std::collections::BTreeMap;

use tracing::{info, warn};

use mdv_core::config::CONFIG_FILE;
use mdv_core::schema::SCHEMA_FILE;
use mdv_core::{ParsedDocument, ParsedObject, Result, Schema, VaultConfig};
use mdv_parser::parse_document;

use crate::Vault;

/// A file the parser rejected. The walk continues past it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub file_path: String,
    pub message: String,
}

/// Schema, config and every parsed document, plus the exact bytes each was
/// read from so later writes can detect concurrent edits.
#[derive(Debug, Clone)]
pub struct VaultSnapshot {
    pub schema: Schema,
    pub config: VaultConfig,
    /// Raw `schema.yaml`, if present.
    pub schema_source: Option<String>,
    /// Raw `mdv.yaml`, if present.
    pub config_source: Option<String>,
    /// Successfully parsed documents, sorted by path.
    pub documents: Vec<ParsedDocument>,
    /// Content of every walked markdown file, parsed or not.
    pub contents: BTreeMap<String, String>,
    pub parse_failures: Vec<ParseFailure>,
}

impl VaultSnapshot {
    pub fn document(&self, file_path: &str) -> Option<&ParsedDocument> {
        self.documents.iter().find(|doc| doc.file_path == file_path)
    }

    pub fn content(&self, file_path: &str) -> Option<&str> {
        self.contents.get(file_path).map(String::as_str)
    }

    /// Every object in every parsed document, in path order.
    pub fn objects(&self) -> impl Iterator<Item = &ParsedObject> {
        self.documents.iter().flat_map(|doc| doc.objects.iter())
    }
}

impl Vault {
    /// Walk and parse the whole vault.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable file or a malformed `schema.yaml`. Individual
    /// documents that fail to parse are collected in
    /// [`VaultSnapshot::parse_failures`] instead.
    pub fn load_snapshot(&self) -> Result<VaultSnapshot> {
        let schema_source = self.read_optional(SCHEMA_FILE)?;
        let schema = match &schema_source {
            Some(text) => Schema::from_yaml(text)?,
            None => Schema::from_yaml("")?,
        };
        let config_source = self.read_optional(CONFIG_FILE)?;

        let mut documents = Vec::new();
        let mut contents = BTreeMap::new();
        let mut parse_failures = Vec::new();

        for file_path in self.walk_markdown()? {
            let content = self.read_file(&file_path)?;
            match parse_document(&file_path, &content) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(file = %file_path, error = %e, "failed to parse document");
                    parse_failures.push(ParseFailure {
                        file_path: file_path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            contents.insert(file_path, content);
        }

        info!(
            documents = documents.len(),
            failures = parse_failures.len(),
            "loaded vault snapshot"
        );

        Ok(VaultSnapshot {
            schema,
            config: self.config().clone(),
            schema_source,
            config_source,
            documents,
            contents,
            parse_failures,
        })
    }

    fn read_optional(&self, rel: &str) -> Result<Option<String>> {
        if self.exists(rel) {
            Ok(Some(self.read_file(rel)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn snapshot_collects_documents_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("schema.yaml"),
            "types:\n  person:\n    fields:\n      email: { type: string }\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("people")).unwrap();
        fs::write(
            dir.path().join("people/alice.md"),
            "---\ntype: person\nemail: a@example.com\n---\n# Alice\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.md"), "---\ntype: [unclosed\n---\n").unwrap();

        let vault = Vault::open(dir.path()).unwrap();
        let snap = vault.load_snapshot().unwrap();

        assert!(snap.schema.type_def("person").is_some());
        assert!(snap.schema_source.is_some());
        assert!(snap.config_source.is_none());
        assert_eq!(snap.documents.len(), 1);
        assert_eq!(snap.documents[0].file_path, "people/alice.md");
        assert_eq!(snap.parse_failures.len(), 1);
        assert_eq!(snap.parse_failures[0].file_path, "broken.md");
        assert_eq!(snap.contents.len(), 2);
        assert!(snap.objects().any(|o| o.id == "people/alice"));
        assert!(snap.document("people/alice.md").is_some());
    }

    #[test]
    fn missing_schema_yields_builtins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.md"), "plain text\n").unwrap();
        let snap = Vault::open(dir.path()).unwrap().load_snapshot().unwrap();
        assert!(snap.schema.type_def("page").is_some());
        assert_eq!(snap.documents[0].objects[0].object_type, "page");
    }

    #[test]
    fn malformed_schema_aborts_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("schema.yaml"), "types: [not, a, map").unwrap();
        assert!(Vault::open(dir.path()).unwrap().load_snapshot().is_err());
    }
}
