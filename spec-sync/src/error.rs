//! Error types for spec synchronization
//!
//! Expected absence (missing spec or tasks file) and consistency conflicts are
//! never errors: they are returned as warnings/conflicts in result objects.
//! Everything here is either fatal to a single call or aborts one unit of work.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Sync result type alias
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error category for structured logging and batch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed identifier or invalid input handed to an API
    Structural,
    /// An expected input file or folder is absent
    MissingInput,
    /// Two projections disagree
    Consistency,
    /// Filesystem failure during a read or mutation
    IoFailure,
    /// Appending to the metadata audit trail failed
    AuditLog,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "STRUCTURAL",
            Self::MissingInput => "MISSING_INPUT",
            Self::Consistency => "CONSISTENCY",
            Self::IoFailure => "IO_FAILURE",
            Self::AuditLog => "AUDIT_LOG",
        }
    }

    /// Whether the failing call must surface this error to its caller.
    ///
    /// Missing input, conflicts and audit failures are reported and the
    /// operation carries on.
    pub fn is_fatal_to_call(self) -> bool {
        matches!(self, Self::Structural | Self::IoFailure)
    }
}

/// Sync engine error taxonomy
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid FS-ID format: {0}")]
    InvalidFeatureId(String),

    #[error("Feature number {number} is already allocated ({existing})")]
    FeatureIdCollision { number: u32, existing: String },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize JSON: {0}")]
    JsonSerialize(#[source] serde_json::Error),

    #[error("Failed to serialize front-matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{path} is locked by {holder}")]
    Locked { path: PathBuf, holder: String },

    #[error("Tracker request failed: {0}")]
    Tracker(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Category used for logging and batch abort decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileRead { source, .. } | Self::DirectoryRead { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ErrorCategory::MissingInput
            }
            Self::FileRead { .. }
            | Self::FileWrite { .. }
            | Self::DirectoryRead { .. }
            | Self::DirectoryCreate { .. }
            | Self::Remove { .. }
            | Self::Copy { .. }
            | Self::Rename { .. }
            | Self::Locked { .. } => ErrorCategory::IoFailure,
            Self::InvalidFeatureId(_)
            | Self::FeatureIdCollision { .. }
            | Self::Json { .. }
            | Self::JsonSerialize(_)
            | Self::Yaml(_)
            | Self::Config(_)
            | Self::Other(_) => ErrorCategory::Structural,
            Self::Tracker(_) => ErrorCategory::Consistency,
        }
    }
}

impl From<String> for SyncError {
    fn from(s: String) -> Self {
        SyncError::Other(s)
    }
}

impl From<&str> for SyncError {
    fn from(s: &str) -> Self {
        SyncError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_missing_input() {
        let err = SyncError::FileRead {
            path: PathBuf::from("spec.md"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.category(), ErrorCategory::MissingInput);
        assert!(!err.category().is_fatal_to_call());
    }

    #[test]
    fn test_permission_denied_is_io_failure() {
        let err = SyncError::Remove {
            path: PathBuf::from("increments/_archive/0001-x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.category(), ErrorCategory::IoFailure);
        assert!(err.category().is_fatal_to_call());
        assert!(err.to_string().contains("0001-x"));
    }

    #[test]
    fn test_invalid_feature_id_message() {
        let err = SyncError::InvalidFeatureId("XYZ-1".to_string());
        assert_eq!(err.to_string(), "Invalid FS-ID format: XYZ-1");
        assert_eq!(err.category().as_str(), "STRUCTURAL");
    }

    #[test]
    fn test_from_string() {
        let err: SyncError = "boom".into();
        assert!(matches!(err, SyncError::Other(ref s) if s == "boom"));
    }
}
