//! Pipeline job definition and manifest persistence.
//!
//! A job is created once per run. It owns the ordered clip list, the
//! working directory namespace for intermediates, and the path of the
//! final artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use clipchain_common::error::{ClipchainError, ClipchainResult};

use crate::artifact::ArtifactLayout;
use crate::clip::ClipSpec;
use crate::cue::{validate_cues, OverlayCue};

/// How text overlays are burned in. Exactly one strategy per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayStrategy {
    /// Transcode and concatenate only.
    #[default]
    None,
    /// One timeline burned into the concatenated output.
    Global,
    /// Each clip burned in on its own timeline before concatenation.
    PerClip,
}

impl OverlayStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Global => "global",
            Self::PerClip => "per_clip",
        }
    }
}

impl std::str::FromStr for OverlayStrategy {
    type Err = ClipchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "global" => Ok(Self::Global),
            "per-clip" | "per_clip" => Ok(Self::PerClip),
            other => Err(ClipchainError::validation(format!(
                "unknown overlay strategy {other:?} (expected none, global or per-clip)"
            ))),
        }
    }
}

/// One run of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineJob {
    /// Clips in final video order.
    pub clips: Vec<ClipSpec>,

    /// Working directory for intermediates, exclusively owned by this job.
    pub work_dir: PathBuf,

    /// Directory holding the final artifact.
    pub output_dir: PathBuf,

    /// Path of the final video.
    pub final_artifact: PathBuf,

    #[serde(default)]
    pub strategy: OverlayStrategy,

    /// Cues on the final timeline (global strategy only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_cues: Vec<OverlayCue>,
}

impl PipelineJob {
    /// Create a job writing `<output_dir>/<final_name>`.
    pub fn new(
        clips: Vec<ClipSpec>,
        work_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        final_name: &str,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            clips,
            work_dir: work_dir.into(),
            final_artifact: output_dir.join(final_name),
            output_dir,
            strategy: OverlayStrategy::None,
            global_cues: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: OverlayStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_global_cues(mut self, cues: Vec<OverlayCue>) -> Self {
        self.global_cues = cues;
        self
    }

    /// Whether any clip or the job itself carries overlay text.
    pub fn has_overlay_text(&self) -> bool {
        !self.global_cues.is_empty() || self.clips.iter().any(|c| !c.overlay().is_empty())
    }

    /// Check cue timing and strategy consistency. Never touches the engine.
    ///
    /// An empty clip list is not rejected here: concatenation reports it.
    pub fn validate(&self) -> ClipchainResult<()> {
        for (index, clip) in self.clips.iter().enumerate() {
            clip.overlay().validate().map_err(|e| match e {
                ClipchainError::Validation { message } => ClipchainError::validation(format!(
                    "clip #{} ({}): {message}",
                    index + 1,
                    clip.source().display()
                )),
                other => other,
            })?;
        }
        validate_cues(&self.global_cues)?;

        match self.strategy {
            OverlayStrategy::None if self.has_overlay_text() => {
                return Err(ClipchainError::validation(
                    "job carries overlay text but its overlay strategy is none",
                ));
            }
            OverlayStrategy::PerClip if !self.global_cues.is_empty() => {
                return Err(ClipchainError::validation(
                    "global cues cannot be combined with the per-clip overlay strategy",
                ));
            }
            _ => {}
        }

        if self.final_artifact.starts_with(&self.work_dir) && self.work_dir != self.output_dir {
            return Err(ClipchainError::validation(format!(
                "final artifact {} must not live inside the working directory",
                self.final_artifact.display()
            )));
        }

        Ok(())
    }

    /// Check that neither a clip source nor the final artifact shares a path
    /// with an intermediate named by `layout`.
    pub fn validate_layout(&self, layout: &ArtifactLayout) -> ClipchainResult<()> {
        let reserved = layout.reserved_paths(self.clips.len());
        let collision = |path: &Path| reserved.iter().find(|r| same_file(r, path)).cloned();

        if let Some(taken) = collision(&self.final_artifact) {
            return Err(ClipchainError::validation(format!(
                "final artifact {} collides with intermediate {}",
                self.final_artifact.display(),
                taken.display()
            )));
        }
        for (index, clip) in self.clips.iter().enumerate() {
            if let Some(taken) = collision(clip.source()) {
                return Err(ClipchainError::validation(format!(
                    "clip #{} ({}) collides with intermediate {}",
                    index + 1,
                    clip.source().display(),
                    taken.display()
                )));
            }
        }

        Ok(())
    }

    /// Load a job manifest. Relative paths resolve against the manifest's directory.
    pub fn load(path: impl AsRef<Path>) -> ClipchainResult<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ClipchainError::filesystem(path, e))?;
        let job: PipelineJob = serde_json::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(job.resolved_against(base))
    }

    /// Write this job as a pretty-printed manifest.
    pub fn save(&self, path: impl AsRef<Path>) -> ClipchainResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ClipchainError::filesystem(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ClipchainError::filesystem(path, e))
    }

    fn resolved_against(self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        Self {
            clips: self
                .clips
                .iter()
                .map(|c| c.resolved_against(base))
                .collect(),
            work_dir: resolve(self.work_dir),
            output_dir: resolve(self.output_dir),
            final_artifact: resolve(self.final_artifact),
            strategy: self.strategy,
            global_cues: self.global_cues,
        }
    }
}

/// Lexically equal, or equal once resolved against the filesystem. A path
/// that does not exist yet is resolved through its parent.
fn same_file(a: &Path, b: &Path) -> bool {
    a == b || resolve(a).zip(resolve(b)).is_some_and(|(a, b)| a == b)
}

fn resolve(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok().or_else(|| {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty())?;
        Some(std::fs::canonicalize(parent).ok()?.join(path.file_name()?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_clips() -> Vec<ClipSpec> {
        vec![
            ClipSpec::with_full_duration_text("a.mp4", "first"),
            ClipSpec::with_full_duration_text("b.mp4", "second"),
            ClipSpec::with_full_duration_text("c.mp4", "third"),
        ]
    }

    #[test]
    fn test_new_job_places_final_in_output_dir() {
        let job = PipelineJob::new(three_clips(), "tmp", "output", "final.mp4");
        assert_eq!(job.final_artifact, PathBuf::from("output/final.mp4"));
        assert_eq!(job.strategy, OverlayStrategy::None);
    }

    #[test]
    fn test_overlay_text_requires_strategy() {
        let job = PipelineJob::new(three_clips(), "tmp", "output", "final.mp4");
        assert!(job.validate().is_err());
        assert!(job
            .clone()
            .with_strategy(OverlayStrategy::PerClip)
            .validate()
            .is_ok());
        assert!(job.with_strategy(OverlayStrategy::Global).validate().is_ok());
    }

    #[test]
    fn test_per_clip_rejects_global_cues() {
        let job = PipelineJob::new(three_clips(), "tmp", "output", "final.mp4")
            .with_strategy(OverlayStrategy::PerClip)
            .with_global_cues(vec![OverlayCue::new("x", 0.0, 1.0)]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_bad_global_cue_is_validation_error() {
        let job = PipelineJob::new(vec![ClipSpec::new("a.mp4")], "tmp", "output", "final.mp4")
            .with_strategy(OverlayStrategy::Global)
            .with_global_cues(vec![OverlayCue::new("late", 70.0, 70.0)]);
        let err = job.validate().unwrap_err();
        assert!(matches!(err, ClipchainError::Validation { .. }));
    }

    #[test]
    fn test_empty_job_passes_validation() {
        let job = PipelineJob::new(vec![], "tmp", "output", "final.mp4");
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "per-clip".parse::<OverlayStrategy>().unwrap(),
            OverlayStrategy::PerClip
        );
        assert_eq!(
            "global".parse::<OverlayStrategy>().unwrap(),
            OverlayStrategy::Global
        );
        assert!("sideways".parse::<OverlayStrategy>().is_err());
    }

    #[test]
    fn test_manifest_roundtrip_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("job.json");
        let job = PipelineJob::new(three_clips(), "tmp", "output", "final.mp4")
            .with_strategy(OverlayStrategy::Global);
        job.save(&manifest).unwrap();

        let loaded = PipelineJob::load(&manifest).unwrap();
        assert_eq!(loaded.strategy, OverlayStrategy::Global);
        assert_eq!(loaded.work_dir, dir.path().join("tmp"));
        assert_eq!(loaded.final_artifact, dir.path().join("output/final.mp4"));
        assert_eq!(loaded.clips[1].source(), dir.path().join("b.mp4"));
    }

    #[test]
    fn test_final_artifact_cannot_take_an_intermediate_name() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("tmp");
        let layout = ArtifactLayout::new(&work, "mp4");
        let clips = vec![ClipSpec::new("a.mp4"), ClipSpec::new("b.mp4")];

        let job = PipelineJob::new(clips.clone(), &work, &work, "1.mp4");
        job.validate().unwrap();
        let err = job.validate_layout(&layout).unwrap_err();
        assert!(matches!(err, ClipchainError::Validation { .. }));

        let job = PipelineJob::new(clips.clone(), &work, &work, "concat.mp4");
        assert!(job.validate_layout(&layout).is_err());

        let job = PipelineJob::new(clips, &work, &work, "final.mp4");
        assert!(job.validate_layout(&layout).is_ok());
    }

    #[test]
    fn test_clip_source_cannot_take_an_intermediate_name() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("tmp");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(work.join("2.mp4"), b"x").unwrap();
        let layout = ArtifactLayout::new(&work, "mp4");

        // Interior `.` components still name the same file.
        let detour = work.join(".").join("2.mp4");
        let job = PipelineJob::new(
            vec![ClipSpec::new("a.mp4"), ClipSpec::new(detour)],
            &work,
            dir.path().join("output"),
            "final.mp4",
        );
        let err = job.validate_layout(&layout).unwrap_err();
        assert!(err.to_string().contains("clip #2"));
    }

    #[test]
    fn test_missing_manifest_is_filesystem_error() {
        let err = PipelineJob::load("/definitely/not/here/job.json").unwrap_err();
        assert!(matches!(err, ClipchainError::Filesystem { .. }));
    }
}
