//! # mdv-vault
//!
//! File system operations for an mdv vault.
//!
//! The vault is the authoritative source of truth. All knowledge lives as
//! markdown files in the vault directory; the index is a derived cache that
//! can be rebuilt from them. This crate walks the vault, loads a parsed
//! [`VaultSnapshot`] for one pass, and commits multi-file edits through a
//! staged [`ChangeSet`].

pub mod changeset;
pub mod snapshot;

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use mdv_core::config::CONFIG_FILE;
use mdv_core::error::MdvError;
use mdv_core::paths::normalize_dir;
use mdv_core::schema::SCHEMA_FILE;
use mdv_core::{Result, Schema, VaultConfig};

pub use changeset::{ChangeSet, CommitSummary};
pub use snapshot::{ParseFailure, VaultSnapshot};

/// Hidden directory holding derived state such as the index.
pub const STATE_DIR: &str = ".mdv";

/// `schema.yaml` written by [`Vault::init`].
pub const STARTER_SCHEMA: &str = "\
version: 2
types:
  person:
    default_path: people/
    name_field: name
    fields:
      name: { type: string, required: true }
      email: { type: string }
traits:
  due: { type: date }
  highlight: {}
";

/// An opened vault directory.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    config: VaultConfig,
}

impl Vault {
    /// Open the vault rooted at `root` and load its `mdv.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Vault`] if `root` is not a directory, or the config
    /// error if `mdv.yaml` is malformed.
    pub fn open(root: &Path) -> Result<Vault> {
        if !root.is_dir() {
            return Err(MdvError::Vault(format!(
                "vault root {} is not a directory",
                root.display()
            )));
        }
        let config = VaultConfig::load(root)?;
        Ok(Vault {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Create a vault skeleton at `root`: the directory itself, a starter
    /// `schema.yaml`, a default `mdv.yaml` and the `.mdv/` state directory.
    /// Existing files are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Io`] if a directory or file cannot be created.
    pub fn init(root: &Path) -> Result<Vault> {
        std::fs::create_dir_all(root.join(STATE_DIR).join("index"))?;
        let schema_path = root.join(SCHEMA_FILE);
        if !schema_path.exists() {
            std::fs::write(&schema_path, STARTER_SCHEMA)?;
        }
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            std::fs::write(&config_path, VaultConfig::default().to_yaml()?)?;
        }
        debug!(root = %root.display(), "initialized vault");
        Vault::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns the schema load error when `schema.yaml` is unreadable or malformed.
    pub fn load_schema(&self) -> Result<Schema> {
        Schema::load(&self.root)
    }

    /// Resolve a vault-relative path to an absolute one, refusing anything
    /// that would escape the vault root.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Vault`] for absolute paths or `..` components.
    pub fn resolve_path(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        let escapes = rel_path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if rel.is_empty() || escapes {
            return Err(MdvError::Vault(format!(
                "path '{rel}' is outside the vault"
            )));
        }
        Ok(self.root.join(rel_path))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.resolve_path(rel).is_ok_and(|path| path.exists())
    }

    /// Every markdown file in the vault as a sorted vault-relative path.
    /// Hidden directories and the templates directory are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Io`] if a directory cannot be read.
    pub fn walk_markdown(&self) -> Result<Vec<String>> {
        let templates_dir = normalize_dir(&self.config.templates_directory);
        let root = self.root.clone();

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry, &root, &templates_dir));

        for entry in walker {
            let entry = entry.map_err(|e| MdvError::Io(std::io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            files.push(relative_path(&self.root, entry.path()));
        }

        files.sort();
        debug!(count = files.len(), root = %self.root.display(), "walked vault");
        Ok(files)
    }

    /// # Errors
    ///
    /// Returns [`MdvError::Io`] if the file cannot be read.
    pub fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.resolve_path(rel)?;
        Ok(std::fs::read_to_string(path)?)
    }

    /// Atomically replace (or create) one file: the content is written to a
    /// temporary file in the same directory and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Io`] if staging or the final rename fails.
    pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.resolve_path(rel)?;
        let staged = stage(&path, content)?;
        staged
            .persist(&path)
            .map_err(|e| MdvError::Io(e.error))?;
        Ok(())
    }
}

/// Write `content` to a temporary file next to `dest`.
pub(crate) fn stage(dest: &Path, content: &str) -> Result<tempfile::NamedTempFile> {
    let parent = dest
        .parent()
        .ok_or_else(|| MdvError::Vault(format!("{} has no parent directory", dest.display())))?;
    std::fs::create_dir_all(parent)?;
    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn is_skipped(entry: &DirEntry, root: &Path, templates_dir: &str) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let hidden = entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'));
    if hidden {
        return true;
    }
    !templates_dir.is_empty() && format!("{}/", relative_path(root, entry.path())) == templates_dir
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vault_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        (dir, vault)
    }

    #[test]
    fn walk_skips_hidden_and_template_directories() {
        let (_dir, vault) = vault_with(&[
            ("people/alice.md", "a"),
            ("index.md", "i"),
            ("notes.txt", "n"),
            (".mdv/cache.md", "c"),
            (".obsidian/x.md", "x"),
            ("templates/person.md", "t"),
            ("projects/templates/keep.md", "k"),
        ]);
        assert_eq!(
            vault.walk_markdown().unwrap(),
            vec!["index.md", "people/alice.md", "projects/templates/keep.md"]
        );
    }

    #[test]
    fn custom_templates_directory_is_honoured() {
        let (_dir, vault) = vault_with(&[
            ("mdv.yaml", "templates_directory: _tpl\n"),
            ("_tpl/a.md", "t"),
            ("templates/b.md", "b"),
        ]);
        assert_eq!(vault.walk_markdown().unwrap(), vec!["templates/b.md"]);
    }

    #[test]
    fn resolve_path_rejects_traversal() {
        let (_dir, vault) = vault_with(&[]);
        assert!(vault.resolve_path("../etc/passwd").is_err());
        assert!(vault.resolve_path("/etc/passwd").is_err());
        assert!(vault.resolve_path("").is_err());
        assert!(vault.resolve_path("people/alice.md").is_ok());
    }

    #[test]
    fn write_file_creates_directories_and_replaces_content() {
        let (dir, vault) = vault_with(&[]);
        vault.write_file("a/b/c.md", "one").unwrap();
        vault.write_file("a/b/c.md", "two").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a/b/c.md")).unwrap(), "two");
        assert_eq!(vault.read_file("a/b/c.md").unwrap(), "two");
    }

    #[test]
    fn init_writes_a_skeleton_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("vault");
        let vault = Vault::init(&root).unwrap();
        assert!(root.join(".mdv/index").is_dir());
        assert_eq!(vault.config(), &VaultConfig::default());
        let schema = vault.load_schema().unwrap();
        assert!(schema.type_def("person").is_some());

        fs::write(root.join("schema.yaml"), "types: {}\n").unwrap();
        Vault::init(&root).unwrap();
        assert_eq!(fs::read_to_string(root.join("schema.yaml")).unwrap(), "types: {}\n");
    }

    #[test]
    fn open_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Vault::open(&dir.path().join("nope")).is_err());
    }
}
