//! `schema.yaml` and `mdv.yaml` as ordered YAML values.
//!
//! Rewrites re-serialize the whole document. Key order is kept; comments
//! and formatting are not.

use serde_yaml::{Mapping, Value};

use mdv_core::MdvError;

use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct YamlDoc {
    root: Value,
}

impl YamlDoc {
    /// # Errors
    ///
    /// Returns [`MdvError::Serialization`] if `source` is not valid YAML.
    pub fn parse(source: &str, file: &str) -> Result<Self> {
        let root = serde_yaml::from_str(source)
            .map_err(|e| MdvError::Serialization(format!("{file}: {e}")))?;
        Ok(YamlDoc { root })
    }

    /// # Errors
    ///
    /// Returns [`MdvError::Serialization`] if the value cannot be written.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root).map_err(|e| MdvError::Serialization(e.to_string()))?)
    }

    fn mapping_mut(&mut self, path: &[&str]) -> Option<&mut Mapping> {
        let mut node = &mut self.root;
        for key in path {
            node = node.get_mut(*key)?;
        }
        node.as_mapping_mut()
    }

    fn types_mut(&mut self) -> Option<&mut Mapping> {
        self.mapping_mut(&["types"])
    }

    /// Rename `types.<old>` to `types.<new>` in place.
    pub fn rename_type(&mut self, old: &str, new: &str) -> bool {
        self.types_mut().is_some_and(|types| rename_key(types, old, new))
    }

    /// Point every `target: <old>` field at `<new>`. Returns the changed
    /// fields as `type.field`.
    pub fn retarget_fields(&mut self, old: &str, new: &str) -> Vec<String> {
        let mut changed = Vec::new();
        let Some(types) = self.types_mut() else {
            return changed;
        };
        for (type_name, def) in types.iter_mut() {
            let Some(fields) = def.get_mut("fields").and_then(Value::as_mapping_mut) else {
                continue;
            };
            for (field_name, field) in fields.iter_mut() {
                let Some(target) = field.get_mut("target") else {
                    continue;
                };
                if target.as_str() == Some(old) {
                    *target = Value::String(new.to_string());
                    changed.push(format!(
                        "{}.{}",
                        type_name.as_str().unwrap_or_default(),
                        field_name.as_str().unwrap_or_default()
                    ));
                }
            }
        }
        changed
    }

    pub fn set_default_path(&mut self, type_name: &str, path: &str) -> bool {
        match self.mapping_mut(&["types", type_name]) {
            Some(def) => {
                def.insert(Value::from("default_path"), Value::from(path));
                true
            }
            None => false,
        }
    }

    /// Rename `types.<type>.fields.<old>` to `<new>`.
    pub fn rename_field(&mut self, type_name: &str, old: &str, new: &str) -> bool {
        self.mapping_mut(&["types", type_name, "fields"])
            .is_some_and(|fields| rename_key(fields, old, new))
    }

    /// Move `name_field: <old>` to `<new>` on one type.
    pub fn rebind_name_field(&mut self, type_name: &str, old: &str, new: &str) -> bool {
        let Some(def) = self.mapping_mut(&["types", type_name]) else {
            return false;
        };
        match def.get_mut("name_field") {
            Some(value) if value.as_str() == Some(old) => {
                *value = Value::from(new);
                true
            }
            _ => false,
        }
    }

    /// Rewrite every `queries.<name>.query` through `f`. Returns the names of
    /// the queries that changed.
    pub fn rewrite_queries(&mut self, f: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut changed = Vec::new();
        let Some(queries) = self.mapping_mut(&["queries"]) else {
            return changed;
        };
        for (name, entry) in queries.iter_mut() {
            let Some(query) = entry.get_mut("query") else {
                continue;
            };
            if let Some(updated) = query.as_str().and_then(&f) {
                *query = Value::String(updated);
                changed.push(name.as_str().unwrap_or_default().to_string());
            }
        }
        changed
    }
}

/// Rename a key without moving it. False if `old` is absent or `new` taken.
fn rename_key(map: &mut Mapping, old: &str, new: &str) -> bool {
    if !map.contains_key(old) || map.contains_key(new) {
        return false;
    }
    let entries = std::mem::take(map);
    for (key, value) in entries {
        let key = if key.as_str() == Some(old) {
            Value::from(new)
        } else {
            key
        };
        map.insert(key, value);
    }
    true
}
