//! Stage execution: runs one engine command and fans its output out to the
//! log and to an optional observer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use clipchain_common::error::ClipchainResult;
use clipchain_common::logging::ENGINE_LOG_TARGET;

use crate::command::{EngineCommand, StageKind};
use crate::concat_list::with_concat_list;
use crate::engine::{EngineEvent, MediaEngine};

/// Observable lifecycle of one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started {
        stage: StageKind,
        command_line: String,
    },
    Progress {
        stage: StageKind,
        percent: f64,
    },
    Diagnostic {
        stage: StageKind,
        line: String,
    },
    Finished {
        stage: StageKind,
        success: bool,
        elapsed_ms: u64,
    },
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Callback receiving stage events. Must not block.
pub type StageObserver = Arc<dyn Fn(StageEvent) + Send + Sync>;

/// Observer that forwards every event into an unbounded channel.
pub fn observer_channel() -> (StageObserver, mpsc::UnboundedReceiver<StageEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer: StageObserver = Arc::new(move |event| {
        // A dropped receiver just means nobody is listening anymore.
        let _ = tx.send(event);
    });
    (observer, rx)
}

/// Runs engine commands one at a time.
#[derive(Clone)]
pub struct StageExecutor {
    engine: Arc<dyn MediaEngine>,
    observer: Option<StageObserver>,
}

impl StageExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    fn emit(&self, event: StageEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    /// Run `command` once. The command line is logged before the process starts.
    pub async fn execute(&self, command: &EngineCommand) -> ClipchainResult<()> {
        let stage = command.stage;
        let command_line = command.command_line();
        tracing::info!(stage = %stage, command = %command_line, "Running engine command");
        self.emit(StageEvent::Started {
            stage,
            command_line,
        });

        let started = Instant::now();
        let sink = |event: EngineEvent| match event {
            EngineEvent::Progress(percent) => {
                tracing::trace!(stage = %stage, percent, "Engine progress");
                self.emit(StageEvent::Progress { stage, percent });
            }
            EngineEvent::Diagnostic(line) => {
                tracing::debug!(target: ENGINE_LOG_TARGET, stage = %stage, "{line}");
                self.emit(StageEvent::Diagnostic { stage, line });
            }
        };
        let result = self.engine.execute(command, &sink).await;
        let elapsed_ms = duration_millis(started.elapsed());

        match &result {
            Ok(()) => tracing::info!(
                stage = %stage,
                output = %command.output.display(),
                elapsed_ms,
                "Engine command finished"
            ),
            Err(e) => tracing::error!(stage = %stage, elapsed_ms, error = %e, "Engine command failed"),
        }
        self.emit(StageEvent::Finished {
            stage,
            success: result.is_ok(),
            elapsed_ms,
        });

        result
    }

    /// Write a concat list for `inputs`, run the command `build` makes from
    /// it, and remove the list afterwards.
    pub async fn execute_concat<F>(
        &self,
        list_path: &Path,
        inputs: &[PathBuf],
        build: F,
    ) -> ClipchainResult<()>
    where
        F: FnOnce(&Path) -> EngineCommand,
    {
        with_concat_list(list_path, inputs, |list| async move {
            let command = build(&list);
            self.execute(&command).await
        })
        .await
    }
}
