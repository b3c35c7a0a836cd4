//! Error types shared across vcompose crates.
//!
//! Failures are split by phase so callers can tell "the timeline could not
//! be built" apart from "the engine could not export it".

use std::path::PathBuf;

/// Failure while compiling a source expression into a timeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Source unavailable: {reference}: {reason}")]
    SourceUnavailable { reference: String, reason: String },

    #[error("Insertion failed: {reason}")]
    InsertionFailed { reason: String },

    #[error("Not implemented: {kind}")]
    NotImplemented { kind: String },
}

impl BuildError {
    pub fn source_unavailable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn insertion_failed(reason: impl Into<String>) -> Self {
        Self::InsertionFailed {
            reason: reason.into(),
        }
    }

    pub fn not_implemented(kind: impl ToString) -> Self {
        Self::NotImplemented {
            kind: kind.to_string(),
        }
    }
}

/// Failure reported by the export engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Export session could not be created: {reason}")]
    SessionCreationFailed { reason: String },

    #[error("Export failed: {}", cause.as_deref().unwrap_or("unknown cause"))]
    ExportFailed { cause: Option<String> },

    #[error("Export canceled")]
    ExportCanceled,

    #[error("Export finished with illegal status: {status}")]
    IllegalStatus { status: String },
}

impl ExportError {
    pub fn session_creation(reason: impl Into<String>) -> Self {
        Self::SessionCreationFailed {
            reason: reason.into(),
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self::ExportFailed {
            cause: Some(cause.into()),
        }
    }
}

/// Top-level error type for a build + export run.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComposeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// The expression tree could not be turned into a timeline.
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// The timeline was built but the engine failed to write it out.
    pub fn is_export(&self) -> bool {
        matches!(self, Self::Export(_))
    }
}

/// Result of a build step.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result of an export run.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type alias using ComposeError.
pub type ComposeResult<T> = Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        let build: ComposeError = BuildError::not_implemented("concat").into();
        assert!(build.is_build());
        assert!(!build.is_export());

        let export: ComposeError = ExportError::ExportCanceled.into();
        assert!(export.is_export());
        assert!(!export.is_build());
    }

    #[test]
    fn test_export_failed_without_cause_renders() {
        let err = ExportError::ExportFailed { cause: None };
        assert_eq!(err.to_string(), "Export failed: unknown cause");
        assert_eq!(
            ExportError::failed("disk full").to_string(),
            "Export failed: disk full"
        );
    }

    #[test]
    fn test_not_implemented_carries_kind() {
        let err = BuildError::not_implemented("in_memory_image");
        assert_eq!(err.to_string(), "Not implemented: in_memory_image");
    }
}
