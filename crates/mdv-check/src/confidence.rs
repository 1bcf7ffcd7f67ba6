//! How sure we are about the type a dangling reference was meant to have.

use serde::Serialize;
use std::fmt;

use mdv_core::paths::normalize_dir;
use mdv_core::Schema;

/// Ordered from least to most certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No hint about the type.
    Unknown,
    /// The path sits under some type's `default_path`.
    Inferred,
    /// The reference came from a `ref` field with a declared target.
    Certain,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Unknown => "unknown",
            Confidence::Inferred => "inferred",
            Confidence::Certain => "certain",
        })
    }
}

/// Classify a missing reference target.
///
/// `field_target` is the target type of the `ref` field the reference was
/// written in, if any. Otherwise the first type (in name order) whose
/// default path is a strict prefix of `target` wins.
pub fn classify(
    schema: &Schema,
    target: &str,
    field_target: Option<&str>,
) -> (Confidence, Option<String>) {
    if let Some(type_name) = field_target.filter(|t| !t.is_empty()) {
        return (Confidence::Certain, Some(type_name.to_string()));
    }
    match infer_type_from_path(schema, target) {
        Some(type_name) => (Confidence::Inferred, Some(type_name)),
        None => (Confidence::Unknown, None),
    }
}

pub fn infer_type_from_path(schema: &Schema, target: &str) -> Option<String> {
    schema.types.iter().find_map(|(name, def)| {
        let prefix = normalize_dir(def.default_path.as_deref()?);
        (!prefix.is_empty() && target.len() > prefix.len() && target.starts_with(&prefix))
            .then(|| name.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_yaml(
            "types:\n  person:\n    default_path: people/\n  project:\n    default_path: projects\n  note: {}\n",
        )
        .unwrap()
    }

    #[test]
    fn typed_field_is_certain() {
        assert_eq!(
            classify(&schema(), "whoever", Some("person")),
            (Confidence::Certain, Some("person".to_string()))
        );
    }

    #[test]
    fn default_path_prefix_is_inferred() {
        assert_eq!(
            classify(&schema(), "people/carol", None),
            (Confidence::Inferred, Some("person".to_string()))
        );
        assert_eq!(
            classify(&schema(), "projects/x", None),
            (Confidence::Inferred, Some("project".to_string()))
        );
    }

    #[test]
    fn near_misses_are_unknown() {
        assert_eq!(classify(&schema(), "people/", None), (Confidence::Unknown, None));
        assert_eq!(classify(&schema(), "project/x", None), (Confidence::Unknown, None));
        assert_eq!(classify(&schema(), "peoplex/y", None), (Confidence::Unknown, None));
    }

    #[test]
    fn confidence_orders_by_certainty() {
        assert!(Confidence::Certain > Confidence::Inferred);
        assert!(Confidence::Inferred > Confidence::Unknown);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn typed_fields_always_win(target in "[a-z/]{0,20}", ty in "[a-z]{1,10}") {
                let schema = Schema::from_yaml("types:\n  person:\n    default_path: people/\n").unwrap();
                let (confidence, inferred) = classify(&schema, &target, Some(&ty));
                prop_assert_eq!(confidence, Confidence::Certain);
                prop_assert_eq!(inferred, Some(ty));
            }
        }
    }
}
