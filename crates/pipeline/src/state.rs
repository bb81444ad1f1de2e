//! Orchestrator states and the stage-tagged job error.

use std::fmt;
use std::path::PathBuf;

use clipchain_common::error::{ClipchainError, ErrorKind};

/// Non-terminal phase of a job. Every failure is attributed to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Validation and preflight checks; nothing has been spawned yet.
    Init,
    Transcoding,
    Concatenating,
    Overlaying,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Transcoding => "transcoding",
            Self::Concatenating => "concatenating",
            Self::Overlaying => "overlaying",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// Created, not yet started.
    Init,
    /// Transcoding the clip at this zero-based position.
    Transcoding { clip: usize },
    Concatenating,
    /// Burning in overlays; `clip` is set for per-clip overlays.
    Overlaying { clip: Option<usize> },
    /// The final artifact was written.
    Completed { output: PathBuf },
    /// Absorbing failure state.
    Failed {
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
}

impl PipelineState {
    /// The stage this state belongs to, if the job is still running.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Init => Some(Stage::Init),
            Self::Transcoding { .. } => Some(Stage::Transcoding),
            Self::Concatenating => Some(Stage::Concatenating),
            Self::Overlaying { .. } => Some(Stage::Overlaying),
            Self::Completed { .. } | Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Transcoding { clip } => write!(f, "transcoding clip #{}", clip + 1),
            Self::Concatenating => write!(f, "concatenating"),
            Self::Overlaying { clip: Some(clip) } => write!(f, "overlaying clip #{}", clip + 1),
            Self::Overlaying { clip: None } => write!(f, "overlaying"),
            Self::Completed { output } => write!(f, "completed ({})", output.display()),
            Self::Failed {
                stage,
                kind,
                message,
            } => write!(f, "failed in {stage} [{kind}]: {message}"),
        }
    }
}

/// A job failure, tagged with the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    stage: Stage,
    #[source]
    source: ClipchainError,
}

impl StageError {
    pub fn new(stage: Stage, source: ClipchainError) -> Self {
        Self { stage, source }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// The underlying message; engine messages pass through unchanged.
    pub fn message(&self) -> String {
        match &self.source {
            ClipchainError::Validation { message }
            | ClipchainError::EmptyInput { message }
            | ClipchainError::EngineFailure { message }
            | ClipchainError::Config { message }
            | ClipchainError::Unsupported { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The terminal state this error puts a job in.
    pub fn to_state(&self) -> PipelineState {
        PipelineState::Failed {
            stage: self.stage,
            kind: self.kind(),
            message: self.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_message_passes_through() {
        let err = StageError::new(
            Stage::Concatenating,
            ClipchainError::engine("Invalid data found when processing input"),
        );
        assert_eq!(err.stage(), Stage::Concatenating);
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.message(), "Invalid data found when processing input");
        assert_eq!(
            err.to_string(),
            "concatenating stage failed: Engine failure: Invalid data found when processing input"
        );
    }

    #[test]
    fn test_failed_state_from_error() {
        let err = StageError::new(Stage::Init, ClipchainError::validation("cue #1: bad"));
        assert_eq!(
            err.to_state(),
            PipelineState::Failed {
                stage: Stage::Init,
                kind: ErrorKind::Validation,
                message: "cue #1: bad".to_string(),
            }
        );
    }

    #[test]
    fn test_terminal_states_have_no_stage() {
        assert_eq!(
            PipelineState::Transcoding { clip: 2 }.stage(),
            Some(Stage::Transcoding)
        );
        assert_eq!(
            PipelineState::Completed {
                output: PathBuf::from("out.mp4")
            }
            .stage(),
            None
        );
        assert_eq!(PipelineState::Init.stage(), Some(Stage::Init));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            PipelineState::Overlaying { clip: Some(0) }.to_string(),
            "overlaying clip #1"
        );
        assert_eq!(PipelineState::Transcoding { clip: 4 }.to_string(), "transcoding clip #5");
    }
}
