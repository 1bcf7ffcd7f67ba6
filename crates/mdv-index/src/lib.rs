//! # mdv-index
//!
//! SQLite index of vault objects for mdv.
//!
//! Maintains a derived index from vault markdown files:
//! - Files table with a SHA-256 content hash per file, for staleness checks
//! - Objects table (id, type, file, line, alias) for alias lookup
//!
//! The index is a cache. Everything in it can be rebuilt from the vault.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use mdv_core::error::MdvError;
use mdv_core::{FieldValue, ParsedDocument};

/// Default index location, relative to the vault root.
pub const INDEX_PATH: &str = ".mdv/index/mdv.db";

/// Frontmatter or declaration field that names an alias.
pub const ALIAS_FIELD: &str = "alias";

/// The IndexManager manages the SQLite index database.
pub struct IndexManager {
    conn: Connection,
}

impl IndexManager {
    /// Open or create an index database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, MdvError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| MdvError::Index(e.to_string()))?;
        let mgr = Self { conn };
        mgr.create_schema()?;
        Ok(mgr)
    }

    /// Create an in-memory index (used when no index exists yet, and in tests).
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if schema creation fails.
    pub fn in_memory() -> Result<Self, MdvError> {
        let conn = Connection::open_in_memory().map_err(|e| MdvError::Index(e.to_string()))?;
        let mgr = Self { conn };
        mgr.create_schema()?;
        Ok(mgr)
    }

    fn create_schema(&self) -> Result<(), MdvError> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS files (
                file_path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS objects (
                id TEXT PRIMARY KEY,
                object_type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                line INTEGER NOT NULL,
                alias TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_objects_file ON objects(file_path);
            CREATE INDEX IF NOT EXISTS idx_objects_alias ON objects(alias);
            ",
            )
            .map_err(|e| MdvError::Index(e.to_string()))?;

        Ok(())
    }

    /// Index one parsed file, replacing whatever was indexed for it before.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if any statement fails; the file's previous
    /// rows are kept in that case.
    pub fn index_document(&self, doc: &ParsedDocument, content: &str) -> Result<(), MdvError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| MdvError::Index(e.to_string()))?;

        tx.execute(
            "DELETE FROM objects WHERE file_path = ?1",
            params![doc.file_path],
        )
        .map_err(|e| MdvError::Index(e.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO files (file_path, content_hash, indexed_at)
             VALUES (?1, ?2, ?3)",
            params![
                doc.file_path,
                content_hash(content),
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| MdvError::Index(e.to_string()))?;

        for obj in &doc.objects {
            let alias = obj
                .fields
                .get(ALIAS_FIELD)
                .and_then(FieldValue::as_str)
                .map(str::trim)
                .filter(|a| !a.is_empty());
            tx.execute(
                "INSERT OR REPLACE INTO objects (id, object_type, file_path, line, alias)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![obj.id, obj.object_type, doc.file_path, obj.line as i64, alias],
            )
            .map_err(|e| MdvError::Index(e.to_string()))?;
        }

        tx.commit().map_err(|e| MdvError::Index(e.to_string()))?;
        debug!(file = %doc.file_path, objects = doc.objects.len(), "indexed file");
        Ok(())
    }

    /// Remove a file and its objects from the index.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the delete fails.
    pub fn remove_file(&self, file_path: &str) -> Result<(), MdvError> {
        self.conn
            .execute("DELETE FROM objects WHERE file_path = ?1", params![file_path])
            .map_err(|e| MdvError::Index(e.to_string()))?;
        self.conn
            .execute("DELETE FROM files WHERE file_path = ?1", params![file_path])
            .map_err(|e| MdvError::Index(e.to_string()))?;
        Ok(())
    }

    /// Drop every row; used before a full rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the delete fails.
    pub fn clear(&self) -> Result<(), MdvError> {
        self.conn
            .execute_batch("DELETE FROM objects; DELETE FROM files;")
            .map_err(|e| MdvError::Index(e.to_string()))
    }

    /// Alias → object ID. When an alias is shared, the lowest object ID wins;
    /// see [`IndexManager::duplicate_aliases`] for the full groups.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn aliases(&self) -> Result<BTreeMap<String, String>, MdvError> {
        let mut aliases = BTreeMap::new();
        for (alias, id) in self.alias_rows()? {
            aliases.entry(alias).or_insert(id);
        }
        Ok(aliases)
    }

    /// Aliases used by more than one object, with every object that uses them.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn duplicate_aliases(&self) -> Result<Vec<DuplicateAlias>, MdvError> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (alias, id) in self.alias_rows()? {
            groups.entry(alias).or_default().push(id);
        }
        Ok(groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(alias, object_ids)| DuplicateAlias { alias, object_ids })
            .collect())
    }

    fn alias_rows(&self) -> Result<Vec<(String, String)>, MdvError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT alias, id FROM objects
                 WHERE alias IS NOT NULL AND alias != ''
                 ORDER BY alias, id",
            )
            .map_err(|e| MdvError::Index(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| MdvError::Index(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MdvError::Index(e.to_string()))?;

        Ok(rows)
    }

    /// Compare indexed content hashes with the files currently on disk.
    ///
    /// `on_disk` maps vault-relative file paths to their [`content_hash`].
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn check_staleness(
        &self,
        on_disk: &BTreeMap<String, String>,
    ) -> Result<Staleness, MdvError> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, content_hash FROM files ORDER BY file_path")
            .map_err(|e| MdvError::Index(e.to_string()))?;

        let indexed: BTreeMap<String, String> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| MdvError::Index(e.to_string()))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MdvError::Index(e.to_string()))?;

        let mut staleness = Staleness::default();
        for (path, hash) in on_disk {
            match indexed.get(path) {
                None => staleness.new_files.push(path.clone()),
                Some(indexed_hash) if indexed_hash != hash => {
                    staleness.modified_files.push(path.clone())
                }
                Some(_) => {}
            }
        }
        staleness.deleted_files = indexed
            .keys()
            .filter(|path| !on_disk.contains_key(*path))
            .cloned()
            .collect();

        Ok(staleness)
    }

    /// All indexed objects, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn objects(&self) -> Result<Vec<IndexedObject>, MdvError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, object_type, file_path, line, alias
                 FROM objects
                 ORDER BY id",
            )
            .map_err(|e| MdvError::Index(e.to_string()))?;

        let results = stmt
            .query_map([], |row| {
                let line: i64 = row.get(3)?;
                Ok(IndexedObject {
                    id: row.get(0)?,
                    object_type: row.get(1)?,
                    file_path: row.get(2)?,
                    line: usize::try_from(line).unwrap_or_default(),
                    alias: row.get(4)?,
                })
            })
            .map_err(|e| MdvError::Index(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MdvError::Index(e.to_string()))?;

        Ok(results)
    }

    /// Number of indexed objects.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn object_count(&self) -> Result<u64, MdvError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))
            .map_err(|e| MdvError::Index(e.to_string()))?;
        Ok(count as u64)
    }

    /// Number of indexed files.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Index`] if the query fails.
    pub fn file_count(&self) -> Result<u64, MdvError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .map_err(|e| MdvError::Index(e.to_string()))?;
        Ok(count as u64)
    }
}

/// Hex-encoded SHA-256 of a file's content.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// An alias claimed by more than one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAlias {
    pub alias: String,
    pub object_ids: Vec<String>,
}

/// Differences between the index and the vault on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Staleness {
    pub modified_files: Vec<String>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !self.modified_files.is_empty()
            || !self.new_files.is_empty()
            || !self.deleted_files.is_empty()
    }

    pub fn total(&self) -> usize {
        self.modified_files.len() + self.new_files.len() + self.deleted_files.len()
    }
}

/// An object as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedObject {
    pub id: String,
    pub object_type: String,
    pub file_path: String,
    pub line: usize,
    pub alias: Option<String>,
}
