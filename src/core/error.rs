use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Store unreadable at '{path}': {reason}")]
    StoreUnreadable { path: PathBuf, reason: String },

    #[error("No migration path from schema '{0}'")]
    NoMigrationPath(String),

    #[error("Ambiguous migration path from schema '{source_schema}': candidates {candidates:?}")]
    AmbiguousMigrationPath {
        source_schema: String,
        candidates: Vec<String>,
    },

    #[error("Migration step {from} -> {to} failed: {reason}")]
    MigrationStepFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Store swap failed: {0}")]
    SwapFailed(String),

    #[error("Schema '{0}' not found")]
    ModelNotFound(String),

    #[error("Duplicate schema: {0}")]
    DuplicateSchema(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Entity '{0}' not found")]
    EntityNotFound(String),

    #[error("Attribute '{0}' not found on entity '{1}'")]
    AttributeNotFound(String, String),

    #[error("Relationship '{0}' not found on entity '{1}'")]
    RelationshipNotFound(String, String),

    #[error("Record '{0}' not found")]
    RecordNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Wraps any error raised inside a step so the caller sees which transition broke.
    pub(crate) fn into_step_failure(self, from: &str, to: &str) -> Self {
        match self {
            err @ Self::MigrationStepFailed { .. } => err,
            other => Self::MigrationStepFailed {
                from: from.to_string(),
                to: to.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// True for the error kinds that leave no usable store behind.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreUnreadable { .. }
                | Self::NoMigrationPath(_)
                | Self::AmbiguousMigrationPath { .. }
                | Self::MigrationStepFailed { .. }
                | Self::SwapFailed(_)
        )
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_wraps_once() {
        let err = VaultError::EntityNotFound("Image".into()).into_step_failure("v1.1", "v1.2");
        let rewrapped = err.into_step_failure("v1.2", "v1.3");
        match rewrapped {
            VaultError::MigrationStepFailed { from, to, reason } => {
                assert_eq!(from, "v1.1");
                assert_eq!(to, "v1.2");
                assert!(reason.contains("Image"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(VaultError::SwapFailed("disk full".into()).is_fatal());
        assert!(VaultError::NoMigrationPath("v0".into()).is_fatal());
        assert!(!VaultError::RecordNotFound("x".into()).is_fatal());
    }
}
