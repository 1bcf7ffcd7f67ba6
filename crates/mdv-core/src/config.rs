//! Vault configuration (`mdv.yaml`) and saved queries.
//!
//! Saved queries are named query strings kept in the config so users can
//! run them by name. mdv never evaluates them; the refactor engine only
//! rewrites their text when a field is renamed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{MdvError, Result};

/// Name of the config file at the vault root.
pub const CONFIG_FILE: &str = "mdv.yaml";

/// Vault-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Directory holding daily notes; `[[2025-02-01]]` resolves to `<dir>/2025-02-01`.
    #[serde(default = "default_daily_directory")]
    pub daily_directory: String,
    /// Directory holding templates; excluded from the vault walk.
    #[serde(default = "default_templates_directory")]
    pub templates_directory: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub queries: BTreeMap<String, SavedQuery>,
}

/// A saved query with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    /// The query string, e.g. `object:person .email==*`.
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_daily_directory() -> String {
    "daily".to_string()
}

fn default_templates_directory() -> String {
    "templates".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            daily_directory: default_daily_directory(),
            templates_directory: default_templates_directory(),
            queries: BTreeMap::new(),
        }
    }
}

impl VaultConfig {
    /// # Errors
    ///
    /// Returns [`MdvError::Config`] if the YAML cannot be deserialized.
    pub fn from_yaml(yaml: &str) -> Result<VaultConfig> {
        if yaml.trim().is_empty() {
            return Ok(VaultConfig::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| MdvError::Config(e.to_string()))
    }

    /// Load `mdv.yaml` from the vault root; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MdvError::Io`] or [`MdvError::Config`] for unreadable or
    /// malformed files.
    pub fn load(vault_root: &Path) -> Result<VaultConfig> {
        let path = vault_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(VaultConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        VaultConfig::from_yaml(&content)
    }

    /// # Errors
    ///
    /// Returns [`MdvError::Serialization`] if the config cannot be serialized.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| MdvError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = VaultConfig::from_yaml("queries: {}\n").expect("parse");
        assert_eq!(config.daily_directory, "daily");
        assert_eq!(config.templates_directory, "templates");
        assert_eq!(VaultConfig::from_yaml("").expect("parse"), VaultConfig::default());
    }

    #[test]
    fn saved_queries_yaml_roundtrip() {
        let mut config = VaultConfig::default();
        config.queries.insert(
            "people-with-email".to_string(),
            SavedQuery {
                query: "object:person .email==*".to_string(),
                description: Some("Everyone we can mail".to_string()),
            },
        );
        config.queries.insert(
            "due-soon".to_string(),
            SavedQuery {
                query: "trait:due".to_string(),
                description: None,
            },
        );

        let yaml = config.to_yaml().expect("serialize");
        let back = VaultConfig::from_yaml(&yaml).expect("deserialize");
        assert_eq!(config, back);
    }

    #[test]
    fn load_without_file_returns_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = VaultConfig::load(dir.path()).expect("load");
        assert_eq!(config, VaultConfig::default());
    }
}
