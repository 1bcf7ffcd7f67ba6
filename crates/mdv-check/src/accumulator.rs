//! Per-pass state folded over every document.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::confidence::Confidence;

/// Example locations kept per undefined trait.
pub const MAX_TRAIT_LOCATIONS: usize = 5;

/// A reference whose target does not exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingRef {
    pub target_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<String>,
    pub confidence: Confidence,
    pub source_object_id: String,
    pub source_file: String,
    /// Field the reference was written in, when it came from a typed field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_source: Option<String>,
    pub line: usize,
}

/// A trait used in documents but absent from the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedTrait {
    pub trait_name: String,
    pub usage_count: usize,
    pub has_value: bool,
    /// Up to [`MAX_TRAIT_LOCATIONS`] `file:line` examples.
    pub locations: Vec<String>,
}

/// Owned by whoever drives a validation pass; start a new one per pass.
#[derive(Debug, Clone, Default)]
pub struct CheckAccumulator {
    missing_refs: BTreeMap<String, MissingRef>,
    undefined_traits: BTreeMap<String, UndefinedTrait>,
    used_types: BTreeSet<String>,
    used_traits: BTreeSet<String>,
}

impl CheckAccumulator {
    pub fn new() -> Self {
        CheckAccumulator::default()
    }

    /// Record a missing reference. Per target the most confident sighting wins;
    /// ties keep the first.
    pub fn track_missing_ref(&mut self, missing: MissingRef) {
        match self.missing_refs.get_mut(&missing.target_path) {
            Some(existing) if missing.confidence > existing.confidence => *existing = missing,
            Some(_) => {}
            None => {
                self.missing_refs.insert(missing.target_path.clone(), missing);
            }
        }
    }

    pub fn track_undefined_trait(&mut self, name: &str, file: &str, line: usize, has_value: bool) {
        let location = format!("{file}:{line}");
        let entry = self
            .undefined_traits
            .entry(name.to_string())
            .or_insert_with(|| UndefinedTrait {
                trait_name: name.to_string(),
                usage_count: 0,
                has_value: false,
                locations: Vec::new(),
            });
        entry.usage_count += 1;
        entry.has_value |= has_value;
        if entry.locations.len() < MAX_TRAIT_LOCATIONS {
            entry.locations.push(location);
        }
    }

    pub fn mark_type_used(&mut self, name: &str) {
        if !self.used_types.contains(name) {
            self.used_types.insert(name.to_string());
        }
    }

    pub fn mark_trait_used(&mut self, name: &str) {
        if !self.used_traits.contains(name) {
            self.used_traits.insert(name.to_string());
        }
    }

    pub fn is_type_used(&self, name: &str) -> bool {
        self.used_types.contains(name)
    }

    pub fn is_trait_used(&self, name: &str) -> bool {
        self.used_traits.contains(name)
    }

    /// Missing references sorted by target path.
    pub fn missing_refs(&self) -> impl Iterator<Item = &MissingRef> {
        self.missing_refs.values()
    }

    /// Undefined traits sorted by name.
    pub fn undefined_traits(&self) -> impl Iterator<Item = &UndefinedTrait> {
        self.undefined_traits.values()
    }
}
