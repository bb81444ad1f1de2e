//! The pipeline orchestrator.
//!
//! One [`Pipeline`] runs one [`PipelineJob`]:
//!
//! ```text
//! strategy none:     Init → Transcoding → Concatenating ─────────────────────► Completed
//! strategy global:   Init → Transcoding → Concatenating → Overlaying ────────► Completed
//! strategy per-clip: Init → Transcoding → Overlaying (per clip) → Concatenating → Completed
//! ```
//!
//! Any non-terminal state may move to `Failed`, which is absorbing. Stages
//! run strictly one after another; the next engine invocation only starts
//! once the previous one has settled.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clipchain_common::config::{AppConfig, PipelineSettings};
use clipchain_common::error::{ClipchainError, ClipchainResult};
use clipchain_job_model::{
    ArtifactKind, ArtifactLayout, ClipOverlay, OverlayStrategy, PipelineJob, StageArtifact,
};
use clipchain_render_engine::{
    build_clip_timeline, build_global_timeline, duration_millis, CommandBuilder, ConcatMode,
    EngineCommand, MediaEngine, OverlayDirective, OverlayStyle, StageExecutor, StageObserver,
};

use crate::state::{PipelineState, Stage, StageError};

/// Runs one job through its stages.
pub struct Pipeline {
    job: PipelineJob,
    layout: ArtifactLayout,
    commands: CommandBuilder,
    style: OverlayStyle,
    settings: PipelineSettings,
    executor: StageExecutor,
    state: PipelineState,
    artifacts: Vec<StageArtifact>,
    cancel_flag: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a pipeline for `job`. The overlay font is resolved here and
    /// checked before the first stage runs.
    pub fn new(job: PipelineJob, config: &AppConfig, engine: Arc<dyn MediaEngine>) -> Self {
        let layout = ArtifactLayout::new(job.work_dir.clone(), config.encoding.container.clone());
        Self {
            layout,
            commands: CommandBuilder::new(config.engine.ffmpeg_path.clone(), config.encoding.clone()),
            style: OverlayStyle::from_config(&config.overlay),
            settings: config.pipeline.clone(),
            executor: StageExecutor::new(engine),
            state: PipelineState::Init,
            artifacts: Vec::new(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
            job,
        }
    }

    /// Deliver stage events to `observer`.
    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    /// Share a flag that, once set, stops the job before its next engine invocation.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = flag;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every artifact produced so far, in production order.
    pub fn artifacts(&self) -> &[StageArtifact] {
        &self.artifacts
    }

    /// Run the job to a terminal state.
    ///
    /// A pipeline runs once; to retry, build a new one from the same job.
    /// Deterministic artifact names make the rerun overwrite the same files.
    pub async fn run(&mut self) -> Result<PathBuf, StageError> {
        if self.state != PipelineState::Init {
            return Err(StageError::new(
                Stage::Init,
                ClipchainError::unsupported(format!(
                    "pipeline already ran (state: {}); create a new one to retry",
                    self.state
                )),
            ));
        }

        tracing::info!(
            clips = self.job.clips.len(),
            strategy = self.job.strategy.as_str(),
            work_dir = %self.job.work_dir.display(),
            output = %self.job.final_artifact.display(),
            "Starting pipeline"
        );
        let started = Instant::now();

        match self.drive().await {
            Ok(output) => {
                self.state = PipelineState::Completed {
                    output: output.clone(),
                };
                tracing::info!(
                    output = %output.display(),
                    elapsed_ms = duration_millis(started.elapsed()),
                    "Pipeline completed"
                );
                if !self.settings.retain_intermediates {
                    self.remove_intermediates();
                }
                Ok(output)
            }
            Err(err) => {
                self.state = err.to_state();
                tracing::error!(
                    stage = %err.stage(),
                    kind = %err.kind(),
                    artifacts_kept = self.artifacts.len(),
                    "Pipeline failed: {}",
                    err.message()
                );
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<PathBuf, StageError> {
        self.preflight()
            .map_err(|e| StageError::new(Stage::Init, e))?;

        let transcoded = self.transcode_all().await?;
        let final_path = self.job.final_artifact.clone();

        match self.job.strategy {
            OverlayStrategy::None => {
                let mode = self.concat_mode(ConcatMode::StreamCopy);
                self.concatenate(transcoded, &final_path, mode).await?;
            }
            OverlayStrategy::Global => {
                let clip_paths: Vec<PathBuf> =
                    transcoded.iter().map(|a| a.path.clone()).collect();
                let concat_path = self.layout.concatenated();
                let mode = self.concat_mode(ConcatMode::StreamCopy);
                let concatenated = self.concatenate(transcoded, &concat_path, mode).await?;
                self.overlay_global(concatenated, &clip_paths, &final_path)
                    .await?;
            }
            OverlayStrategy::PerClip => {
                let overlaid = self.overlay_per_clip(transcoded).await?;
                self.concatenate(overlaid, &final_path, ConcatMode::Reencode)
                    .await?;
            }
        }

        Ok(final_path)
    }

    /// Validate the job, prepare directories and clear what an earlier run
    /// left under this job's names. Never spawns anything.
    fn preflight(&mut self) -> ClipchainResult<()> {
        self.job.validate()?;
        self.job.validate_layout(&self.layout)?;

        if self.job.strategy != OverlayStrategy::None && self.job.has_overlay_text() {
            self.style.validate_font()?;
            tracing::debug!(font = %self.style.font_file.display(), "Overlay font resolved");
        }

        for dir in [&self.job.work_dir, &self.job.output_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ClipchainError::filesystem(dir, e))?;
        }
        if let Some(parent) = self.job.final_artifact.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ClipchainError::filesystem(parent, e))?;
            }
        }

        let mut stale = self.layout.reserved_paths(self.job.clips.len());
        stale.push(self.job.final_artifact.clone());
        for path in &stale {
            remove_stale(path)?;
        }

        Ok(())
    }

    async fn transcode_all(&mut self) -> Result<Vec<StageArtifact>, StageError> {
        let mut produced = Vec::with_capacity(self.job.clips.len());

        for index in 0..self.job.clips.len() {
            self.state = PipelineState::Transcoding { clip: index };
            let source = self.job.clips[index].source().to_path_buf();
            let output = self.layout.transcoded(index);
            tracing::info!(
                clip = index + 1,
                total = self.job.clips.len(),
                source = %source.display(),
                "Transcoding clip"
            );

            self.ensure_not_cancelled()?;
            require_input(&source).map_err(|e| StageError::new(Stage::Transcoding, e))?;

            let command = self.commands.transcode(&source, &output);
            self.run_command(&command)
                .await
                .map_err(|e| StageError::new(Stage::Transcoding, e))?;

            let artifact = StageArtifact::per_clip(output, ArtifactKind::TranscodeOutput, index);
            self.artifacts.push(artifact.clone());
            produced.push(artifact);
        }

        Ok(produced)
    }

    async fn overlay_per_clip(
        &mut self,
        inputs: Vec<StageArtifact>,
    ) -> Result<Vec<StageArtifact>, StageError> {
        let mut produced = Vec::with_capacity(inputs.len());

        for input in inputs {
            let index = input.clip_index.unwrap_or(produced.len());
            self.state = PipelineState::Overlaying { clip: Some(index) };
            self.ensure_not_cancelled()?;

            let directives = build_clip_timeline(self.job.clips[index].overlay(), &self.style)
                .map_err(|e| StageError::new(Stage::Overlaying, e))?;
            if directives.is_empty() {
                tracing::debug!(clip = index + 1, "No overlay text, re-encoding unchanged");
            }

            let output = self.layout.clip_overlay(index);
            let command = self.commands.overlay(&input.path, &output, &directives);
            self.run_command(&command)
                .await
                .map_err(|e| StageError::new(Stage::Overlaying, e))?;

            let artifact = StageArtifact::per_clip(output, ArtifactKind::OverlayOutput, index);
            self.artifacts.push(artifact.clone());
            produced.push(artifact);
        }

        Ok(produced)
    }

    async fn concatenate(
        &mut self,
        inputs: Vec<StageArtifact>,
        output: &Path,
        mode: ConcatMode,
    ) -> Result<StageArtifact, StageError> {
        self.state = PipelineState::Concatenating;
        self.ensure_not_cancelled()?;
        tracing::info!(
            inputs = inputs.len(),
            mode = ?mode,
            output = %output.display(),
            "Concatenating clips"
        );

        let paths: Vec<PathBuf> = inputs.into_iter().map(|a| a.path).collect();
        let list_path = self.layout.concat_list();
        let commands = &self.commands;
        let executed = self
            .executor
            .execute_concat(&list_path, &paths, |list| {
                commands.concat(list, output, mode)
            })
            .await;
        if executed.is_err() {
            discard_partial_output(output);
        }
        executed
            .and_then(|()| require_output(output))
            .map_err(|e| StageError::new(Stage::Concatenating, e))?;

        let artifact = StageArtifact::whole_job(output.to_path_buf(), ArtifactKind::ConcatOutput);
        self.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    async fn overlay_global(
        &mut self,
        input: StageArtifact,
        clip_paths: &[PathBuf],
        output: &Path,
    ) -> Result<StageArtifact, StageError> {
        self.state = PipelineState::Overlaying { clip: None };
        self.ensure_not_cancelled()?;

        let directives = self
            .global_directives(clip_paths)
            .await
            .map_err(|e| StageError::new(Stage::Overlaying, e))?;
        tracing::info!(
            directives = directives.len(),
            output = %output.display(),
            "Burning in global overlay"
        );

        let command = self.commands.overlay(&input.path, output, &directives);
        self.run_command(&command)
            .await
            .map_err(|e| StageError::new(Stage::Overlaying, e))?;

        let artifact = StageArtifact::whole_job(output.to_path_buf(), ArtifactKind::OverlayOutput);
        self.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    /// Global cues plus every clip overlay shifted onto the final timeline.
    async fn global_directives(
        &self,
        clip_paths: &[PathBuf],
    ) -> ClipchainResult<Vec<OverlayDirective>> {
        let overlays: Vec<&ClipOverlay> = self.job.clips.iter().map(|c| c.overlay()).collect();

        let mut durations = vec![0.0; overlays.len()];
        if overlays.iter().any(|o| !o.is_empty()) {
            for (index, path) in clip_paths.iter().enumerate() {
                durations[index] = self.executor.engine().probe_duration(path).await?;
                tracing::debug!(clip = index + 1, duration_secs = durations[index], "Probed clip");
            }
        }

        let clips: Vec<(&ClipOverlay, f64)> = overlays.into_iter().zip(durations).collect();
        build_global_timeline(&self.job.global_cues, &clips, &self.style)
    }

    async fn run_command(&self, command: &EngineCommand) -> ClipchainResult<()> {
        if let Err(e) = self.executor.execute(command).await {
            discard_partial_output(&command.output);
            return Err(e);
        }
        require_output(&command.output)
    }

    fn concat_mode(&self, preferred: ConcatMode) -> ConcatMode {
        if self.settings.force_concat_reencode {
            ConcatMode::Reencode
        } else {
            preferred
        }
    }

    /// Fails with `Cancelled`, attributed to the current stage, once the flag is set.
    fn ensure_not_cancelled(&self) -> Result<(), StageError> {
        if self.cancel_flag.load(Ordering::SeqCst) {
            let stage = self.state.stage().unwrap_or(Stage::Init);
            tracing::warn!(stage = %stage, "Cancellation requested, not starting next invocation");
            return Err(StageError::new(stage, ClipchainError::Cancelled));
        }
        Ok(())
    }

    /// Delete consumed intermediates. Failures are warnings only.
    fn remove_intermediates(&mut self) {
        let final_path = self.job.final_artifact.clone();
        self.artifacts.retain(|artifact| {
            if artifact.path == final_path {
                return true;
            }
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => {
                    tracing::debug!(path = %artifact.path.display(), "Removed intermediate");
                    false
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => {
                    tracing::warn!(
                        path = %artifact.path.display(),
                        error = %e,
                        "Failed to remove intermediate"
                    );
                    true
                }
            }
        });
    }
}

fn remove_stale(path: &Path) -> ClipchainResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed output of an earlier run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClipchainError::filesystem(path, e)),
    }
}

/// A failed invocation's output is never an artifact; drop whatever it wrote.
fn discard_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove partial output"
        ),
    }
}

fn require_input(path: &Path) -> ClipchainResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ClipchainError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

fn require_output(path: &Path) -> ClipchainResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ClipchainError::engine(format!(
            "engine reported success but {} was not written",
            path.display()
        )))
    }
}
