//! # mdv-refactor
//!
//! Schema refactoring for mdv vaults: renaming a type or a field and every
//! surface that depends on it.
//!
//! Planning reads a [`VaultSnapshot`](mdv_vault::VaultSnapshot) and produces
//! a [`RenamePlan`]: the changes for preview, any conflicts, and the full new
//! contents of every affected file. [`apply_plan`] writes that content as one
//! staged [`ChangeSet`](mdv_vault::ChangeSet), refusing to run when the plan
//! has conflicts or a file changed since planning.

pub mod field_rename;
pub mod plan;
pub mod rewrite;
pub mod type_rename;
pub mod yaml_doc;

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use mdv_core::MdvError;

pub use field_rename::plan_field_rename;
pub use plan::{
    apply_plan, ApplyOptions, ApplySummary, Change, ChangeType, Conflict, ConflictType,
    DefaultPathRenamePlan, FileEdit, FileMove, RenamePlan,
};
pub use type_rename::plan_type_rename;

pub type Result<T> = std::result::Result<T, RefactorError>;

#[derive(Debug, Error)]
pub enum RefactorError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("'{0}' is a built-in type and cannot be renamed")]
    BuiltinType(String),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("type '{0}' already exists")]
    TypeExists(String),

    #[error("rename blocked by {0} conflict(s); no files were changed")]
    Blocked(usize),

    #[error("this plan offers no default path rename")]
    NoDefaultPathRename,

    #[error("'{0}' changed since the plan was made; run the command again")]
    StalePlan(String),

    #[error(transparent)]
    Mdv(#[from] MdvError),
}

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("name pattern is valid"));

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if NAME.is_match(name) {
        Ok(())
    } else {
        Err(RefactorError::InvalidName {
            name: name.to_string(),
            reason: "use letters, digits, '_' or '-', starting with a letter or '_'",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(validate_name("email_address").is_ok());
        assert!(validate_name("due-date").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("1st").is_err());
        assert!(validate_name("a b").is_err());
        assert!(validate_name("a.b").is_err());
    }

    #[test]
    fn errors_read_well() {
        let err = RefactorError::UnknownField {
            type_name: "person".into(),
            field: "mail".into(),
        };
        assert_eq!(err.to_string(), "type 'person' has no field 'mail'");
        assert!(RefactorError::Blocked(2).to_string().contains("2 conflict(s)"));
    }
}
