//! The external media engine boundary.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use clipchain_common::config::EngineConfig;
use clipchain_common::error::{ClipchainError, ClipchainResult};

use crate::command::EngineCommand;
use crate::progress::{parse_duration_line, ProgressState};

/// Number of trailing diagnostic lines kept for failure messages.
const FAILURE_TAIL_LINES: usize = 12;

/// Something the engine reported while running.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Completion percentage in `[0, 100]`.
    Progress(f64),
    /// One raw line of the engine's diagnostic stream.
    Diagnostic(String),
}

/// Receives engine events as they are produced.
pub type EngineEventSink<'a> = &'a (dyn Fn(EngineEvent) + Send + Sync);

/// Trait for media engines (ffmpeg, test doubles).
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this engine is available on the system.
    fn is_available(&self) -> bool;

    /// Run one command to completion.
    ///
    /// Resolves once: `Ok` on normal termination, `EngineFailure` otherwise.
    async fn execute(&self, command: &EngineCommand, events: EngineEventSink<'_>)
        -> ClipchainResult<()>;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> ClipchainResult<f64>;
}

/// ffmpeg/ffprobe subprocess engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    /// Whether ffprobe can be started; needed only for global overlay timing.
    pub fn probe_available(&self) -> bool {
        binary_runs(&self.ffprobe_path)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        binary_runs(&self.ffmpeg_path)
    }

    async fn execute(
        &self,
        command: &EngineCommand,
        events: EngineEventSink<'_>,
    ) -> ClipchainResult<()> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClipchainError::engine(format!(
                    "failed to start {}: {e}",
                    command.program.display()
                ))
            })?;

        tracing::debug!(pid = child.id(), stage = %command.stage, "Engine process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipchainError::engine("failed to capture engine stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClipchainError::engine("failed to capture engine stderr"))?;

        let mut progress_lines = BufReader::new(stdout).lines();
        let mut diagnostic_lines = BufReader::new(stderr).lines();
        let mut progress_done = false;
        let mut diagnostics_done = false;

        let mut state = ProgressState::default();
        let mut total_secs: Option<f64> = None;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(FAILURE_TAIL_LINES);

        // Both pipes are drained together so a full stderr buffer never blocks the engine.
        while !(progress_done && diagnostics_done) {
            tokio::select! {
                line = progress_lines.next_line(), if !progress_done => match line {
                    Ok(Some(line)) => {
                        if let Some((key, value)) = line.trim().split_once('=') {
                            if state.update(key, value) {
                                if let Some(percent) = state.percent(total_secs) {
                                    events(EngineEvent::Progress(percent));
                                }
                            }
                        }
                    }
                    Ok(None) => progress_done = true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed reading engine progress");
                        progress_done = true;
                    }
                },
                line = diagnostic_lines.next_line(), if !diagnostics_done => match line {
                    Ok(Some(line)) => {
                        if total_secs.is_none() {
                            total_secs = parse_duration_line(&line);
                        }
                        if tail.len() == FAILURE_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.clone());
                        events(EngineEvent::Diagnostic(line));
                    }
                    Ok(None) => diagnostics_done = true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed reading engine diagnostics");
                        diagnostics_done = true;
                    }
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ClipchainError::engine(format!("failed to wait on engine: {e}")))?;

        if !status.success() {
            let detail = tail
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ClipchainError::engine(format!(
                "{} exited with {status}: {}",
                self.name(),
                detail.trim()
            )));
        }

        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> ClipchainResult<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ClipchainError::engine(format!(
                    "failed to start {}: {e}",
                    self.ffprobe_path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(ClipchainError::engine(format!(
                "ffprobe failed on {} ({}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ClipchainError::engine(format!(
                "ffprobe reported no duration for {}",
                path.display()
            ))
        })
    }
}

fn parse_probe_output(raw: &str) -> Option<f64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

fn binary_runs(binary: &Path) -> bool {
    std::process::Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
