//! Stage artifacts and their deterministic names.
//!
//! Every intermediate is named from the clip's position in the job, never
//! from directory listing order, so a re-run against the same working
//! directory overwrites exactly the files the previous run produced.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which stage produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TranscodeOutput,
    ConcatOutput,
    OverlayOutput,
}

/// A file produced by one stage and consumed by the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageArtifact {
    pub path: PathBuf,

    pub kind: ArtifactKind,

    /// Zero-based clip position for per-clip artifacts.
    pub clip_index: Option<usize>,
}

impl StageArtifact {
    pub fn per_clip(path: PathBuf, kind: ArtifactKind, clip_index: usize) -> Self {
        Self {
            path,
            kind,
            clip_index: Some(clip_index),
        }
    }

    pub fn whole_job(path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            path,
            kind,
            clip_index: None,
        }
    }
}

/// Naming scheme for artifacts inside a job's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    work_dir: PathBuf,
    container: String,
}

impl ArtifactLayout {
    pub fn new(work_dir: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            container: container.into(),
        }
    }

    /// `<work>/<n>.<ext>` with `n` one-based.
    pub fn transcoded(&self, clip_index: usize) -> PathBuf {
        self.work_dir
            .join(format!("{}.{}", clip_index + 1, self.container))
    }

    /// `<work>/<n>.overlay.<ext>` with `n` one-based.
    pub fn clip_overlay(&self, clip_index: usize) -> PathBuf {
        self.work_dir
            .join(format!("{}.overlay.{}", clip_index + 1, self.container))
    }

    /// The concatenated intermediate used when a global overlay follows.
    pub fn concatenated(&self) -> PathBuf {
        self.work_dir.join(format!("concat.{}", self.container))
    }

    /// The transient list file handed to the concat stage.
    pub fn concat_list(&self) -> PathBuf {
        self.work_dir.join("filelist.txt")
    }

    /// Every name this layout hands out for a job of `clip_count` clips.
    pub fn reserved_paths(&self, clip_count: usize) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = (0..clip_count)
            .flat_map(|i| [self.transcoded(i), self.clip_overlay(i)])
            .collect();
        paths.push(self.concatenated());
        paths.push(self.concat_list());
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names_follow_input_order() {
        let layout = ArtifactLayout::new("/work", "mp4");
        assert_eq!(layout.transcoded(0), PathBuf::from("/work/1.mp4"));
        assert_eq!(layout.transcoded(8), PathBuf::from("/work/9.mp4"));
        assert_eq!(layout.clip_overlay(2), PathBuf::from("/work/3.overlay.mp4"));
        assert_eq!(layout.concatenated(), PathBuf::from("/work/concat.mp4"));
        assert_eq!(layout.concat_list(), PathBuf::from("/work/filelist.txt"));
    }

    #[test]
    fn test_reserved_paths_cover_every_stage() {
        let layout = ArtifactLayout::new("/work", "mp4");
        let reserved = layout.reserved_paths(2);
        assert_eq!(
            reserved,
            vec![
                PathBuf::from("/work/1.mp4"),
                PathBuf::from("/work/1.overlay.mp4"),
                PathBuf::from("/work/2.mp4"),
                PathBuf::from("/work/2.overlay.mp4"),
                PathBuf::from("/work/concat.mp4"),
                PathBuf::from("/work/filelist.txt"),
            ]
        );
    }

    #[test]
    fn test_layout_is_stable_across_instances() {
        let a = ArtifactLayout::new("tmp", "mkv");
        let b = ArtifactLayout::new("tmp", "mkv");
        let names_a: Vec<_> = (0..5).map(|i| a.transcoded(i)).collect();
        let names_b: Vec<_> = (0..5).map(|i| b.transcoded(i)).collect();
        assert_eq!(names_a, names_b);
    }
}
