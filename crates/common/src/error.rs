//! Error types shared across clipchain crates.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for clipchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipchainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Empty input: {message}")]
    EmptyInput { message: String },

    #[error("Engine failure: {message}")]
    EngineFailure { message: String },

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Job cancelled before the next stage started")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipchainError.
pub type ClipchainResult<T> = Result<T, ClipchainError>;

/// Coarse classification of a failure, as reported to job callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input rejected before any subprocess was spawned.
    Validation,
    /// Zero inputs where at least one is required.
    EmptyInput,
    /// The external media engine exited abnormally.
    EngineFailure,
    /// An artifact could not be written, read or removed.
    Filesystem,
    /// A cancellation request stopped the job between stages.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::EmptyInput => "empty_input",
            Self::EngineFailure => "engine_failure",
            Self::Filesystem => "filesystem",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClipchainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: msg.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Map this error onto the job-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Config { .. } | Self::FileNotFound { .. } => {
                ErrorKind::Validation
            }
            Self::EmptyInput { .. } => ErrorKind::EmptyInput,
            Self::EngineFailure { .. } | Self::Unsupported { .. } | Self::Other(_) => {
                ErrorKind::EngineFailure
            }
            Self::Filesystem { .. } | Self::Io(_) | Self::Json(_) => ErrorKind::Filesystem,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ClipchainError::validation("bad cue").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ClipchainError::empty_input("no clips").kind(),
            ErrorKind::EmptyInput
        );
        assert_eq!(
            ClipchainError::engine("exit 1").kind(),
            ErrorKind::EngineFailure
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            ClipchainError::filesystem("/tmp/x", io).kind(),
            ErrorKind::Filesystem
        );
        assert_eq!(ClipchainError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_engine_message_is_passed_through() {
        let err = ClipchainError::engine("Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "Engine failure: Invalid data found when processing input"
        );
    }
}
