//! Overlay cue types.

use serde::{Deserialize, Serialize};

use clipchain_common::error::{ClipchainError, ClipchainResult};

/// A text overlay bound to a time window.
///
/// Times are seconds relative to the owning timeline: the clip's own
/// timeline for clip cues, the final concatenated timeline for job-level cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayCue {
    /// Text to burn in.
    pub text: String,

    /// Window start (inclusive), seconds.
    #[serde(rename = "start")]
    pub start_secs: f64,

    /// Window end (inclusive), seconds.
    #[serde(rename = "end")]
    pub end_secs: f64,
}

impl OverlayCue {
    pub fn new(text: impl Into<String>, start_secs: f64, end_secs: f64) -> Self {
        Self {
            text: text.into(),
            start_secs,
            end_secs,
        }
    }

    /// The same cue moved `offset_secs` later.
    pub fn shifted(&self, offset_secs: f64) -> Self {
        Self {
            text: self.text.clone(),
            start_secs: self.start_secs + offset_secs,
            end_secs: self.end_secs + offset_secs,
        }
    }

    /// Enforce `0 <= start < end` with finite bounds.
    pub fn validate(&self) -> ClipchainResult<()> {
        if !self.start_secs.is_finite() || !self.end_secs.is_finite() {
            return Err(ClipchainError::validation(format!(
                "cue {:?} has a non-finite time bound",
                self.text
            )));
        }
        if self.start_secs < 0.0 {
            return Err(ClipchainError::validation(format!(
                "cue {:?} starts before zero ({})",
                self.text, self.start_secs
            )));
        }
        if self.start_secs >= self.end_secs {
            return Err(ClipchainError::validation(format!(
                "cue {:?} must start before it ends (start={}, end={})",
                self.text, self.start_secs, self.end_secs
            )));
        }
        Ok(())
    }
}

/// Validate every cue in order, reporting the first offender with its index.
pub fn validate_cues(cues: &[OverlayCue]) -> ClipchainResult<()> {
    for (index, cue) in cues.iter().enumerate() {
        cue.validate().map_err(|e| match e {
            ClipchainError::Validation { message } => {
                ClipchainError::validation(format!("cue #{}: {message}", index + 1))
            }
            other => other,
        })?;
    }
    Ok(())
}
