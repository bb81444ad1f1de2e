//! Input clip definitions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use clipchain_common::error::ClipchainResult;

use crate::cue::{validate_cues, OverlayCue};

/// One input video and the overlay it carries.
///
/// Immutable once constructed; build a new one to change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    source: PathBuf,

    #[serde(default)]
    overlay: ClipOverlay,
}

/// The overlay attached to a single clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClipOverlay {
    /// No text on this clip.
    #[default]
    None,
    /// One text spanning the clip's whole duration.
    FullDuration { text: String },
    /// Time-windowed cues on the clip's own timeline, in display order.
    Cues { cues: Vec<OverlayCue> },
}

impl ClipOverlay {
    /// Whether this overlay would produce no directive at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::FullDuration { text } => text.is_empty(),
            Self::Cues { cues } => cues.is_empty(),
        }
    }

    pub fn validate(&self) -> ClipchainResult<()> {
        match self {
            Self::Cues { cues } => validate_cues(cues),
            Self::None | Self::FullDuration { .. } => Ok(()),
        }
    }
}

impl ClipSpec {
    /// A clip without overlay.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            overlay: ClipOverlay::None,
        }
    }

    /// A clip with one text across its whole duration.
    pub fn with_full_duration_text(source: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            overlay: ClipOverlay::FullDuration { text: text.into() },
        }
    }

    /// A clip with time-windowed cues.
    pub fn with_cues(source: impl Into<PathBuf>, cues: Vec<OverlayCue>) -> Self {
        Self {
            source: source.into(),
            overlay: ClipOverlay::Cues { cues },
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn overlay(&self) -> &ClipOverlay {
        &self.overlay
    }

    /// Resolve a relative source path against `base`.
    pub(crate) fn resolved_against(&self, base: &Path) -> Self {
        if self.source.is_absolute() {
            return self.clone();
        }
        Self {
            source: base.join(&self.source),
            overlay: self.overlay.clone(),
        }
    }
}
