//! Run a pipeline job.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use clipchain_common::config::AppConfig;
use clipchain_common::error::ErrorKind;
use clipchain_job_model::{
    discover_inputs, ClipSpec, OverlayCue, OverlayStrategy, PipelineJob, StageArtifact,
};
use clipchain_pipeline::{Pipeline, StageError};
use clipchain_render_engine::{
    observer_channel, FfmpegEngine, MediaEngine, StageEvent, StageObserver,
};

/// Options of `clipchain run`.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub job: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub strategy: Option<OverlayStrategy>,
    pub label_clips: bool,
    pub cues: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub retries: u32,
    pub retain_intermediates: Option<bool>,
}

/// Written next to the final artifact after every run.
#[derive(Debug, Serialize)]
struct RunReport {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    attempts: u32,
    strategy: OverlayStrategy,
    clips: Vec<PathBuf>,
    status: &'static str,
    output: Option<PathBuf>,
    failure: Option<FailureReport>,
    artifacts: Vec<StageArtifact>,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    stage: &'static str,
    kind: &'static str,
    message: String,
}

pub async fn run(mut config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(retain) = args.retain_intermediates {
        config.pipeline.retain_intermediates = retain;
    }

    let job = build_job(&config, &args)?;
    println!("Running {} clip(s)", job.clips.len());
    println!("  Strategy: {}", job.strategy.as_str());
    println!("  Work dir: {}", job.work_dir.display());
    println!("  Output: {}", job.final_artifact.display());

    let engine = FfmpegEngine::new(&config.engine);
    if !engine.is_available() {
        anyhow::bail!(
            "{} is not runnable; install ffmpeg or set engine.ffmpeg_path in the config",
            engine.ffmpeg_path().display()
        );
    }
    let engine: Arc<dyn MediaEngine> = Arc::new(engine);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted: finishing the current step, then stopping");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let (observer, mut events) = observer_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let started_at = Utc::now();
    let Attempts {
        result,
        artifacts,
        count: attempts,
    } = run_attempts(&job, &config, engine, observer, cancel, args.retries).await;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer stopped abnormally");
    }

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        attempts,
        strategy: job.strategy,
        clips: job.clips.iter().map(|c| c.source().to_path_buf()).collect(),
        status: if result.is_ok() { "completed" } else { "failed" },
        output: result.as_ref().ok().cloned(),
        failure: result.as_ref().err().map(failure_report),
        artifacts,
    };
    let report_path = report_path(&job.final_artifact);
    match write_report(&report_path, &report) {
        Ok(()) => println!("\nReport: {}", report_path.display()),
        Err(e) => tracing::warn!(path = %report_path.display(), error = %e, "Failed to write run report"),
    }

    match result {
        Ok(output) => {
            println!("Done: {}", output.display());
            Ok(())
        }
        Err(e) => {
            println!("Failed in {} [{}]: {}", e.stage(), e.kind(), e.message());
            Err(e.into())
        }
    }
}

/// The last attempt's outcome and how many attempts were made.
struct Attempts {
    result: Result<PathBuf, StageError>,
    artifacts: Vec<StageArtifact>,
    count: u32,
}

/// Run `job` once, then again up to `retries` times while it fails on an
/// engine error. Each attempt is a fresh pipeline over the same names.
async fn run_attempts(
    job: &PipelineJob,
    config: &AppConfig,
    engine: Arc<dyn MediaEngine>,
    observer: StageObserver,
    cancel: Arc<AtomicBool>,
    retries: u32,
) -> Attempts {
    let mut count = 0;
    loop {
        count += 1;
        let mut pipeline = Pipeline::new(job.clone(), config, engine.clone())
            .with_observer(observer.clone())
            .with_cancel_flag(cancel.clone());
        let result = pipeline.run().await;

        let retry = matches!(
            &result,
            Err(e) if e.kind() == ErrorKind::EngineFailure && count <= retries
        );
        if !retry {
            return Attempts {
                result,
                artifacts: pipeline.artifacts().to_vec(),
                count,
            };
        }
        if let Err(e) = &result {
            tracing::warn!(
                attempt = count,
                stage = %e.stage(),
                "Engine failed, retrying job: {}",
                e.message()
            );
            println!("\nAttempt {count} failed in {}, retrying", e.stage());
        }
    }
}

fn build_job(config: &AppConfig, args: &RunArgs) -> anyhow::Result<PipelineJob> {
    let mut job = match &args.job {
        Some(manifest) => PipelineJob::load(manifest)
            .map_err(|e| anyhow::anyhow!("Failed to load job {}: {e}", manifest.display()))?,
        None => {
            let dir = args
                .input_dir
                .clone()
                .unwrap_or_else(|| config.directories.input_dir.clone());
            let inputs = discover_inputs(&dir, &config.directories.input_extensions)?;
            tracing::info!(dir = %dir.display(), count = inputs.len(), "Discovered input clips");
            let clips = inputs
                .into_iter()
                .map(|path| {
                    if args.label_clips {
                        let label = clip_label(&path);
                        ClipSpec::with_full_duration_text(path, label)
                    } else {
                        ClipSpec::new(path)
                    }
                })
                .collect();
            let mut job = PipelineJob::new(
                clips,
                config.directories.work_dir.clone(),
                config.directories.output_dir.clone(),
                &config.pipeline.final_name,
            );
            job.strategy = if args.label_clips {
                OverlayStrategy::PerClip
            } else if args.cues.is_some() {
                OverlayStrategy::Global
            } else {
                OverlayStrategy::None
            };
            job
        }
    };

    if let Some(path) = &args.cues {
        job.global_cues = load_cues(path)?;
    }
    if let Some(strategy) = args.strategy {
        job.strategy = strategy;
    }
    if let Some(output) = &args.output {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            job.output_dir = parent.to_path_buf();
        }
        job.final_artifact = output.clone();
    }

    Ok(job)
}

fn load_cues(path: &Path) -> anyhow::Result<Vec<OverlayCue>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read cues {}: {e}", path.display()))?;
    let cues = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse cues {}: {e}", path.display()))?;
    Ok(cues)
}

fn clip_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default()
}

fn report_path(final_artifact: &Path) -> PathBuf {
    let mut name = final_artifact.as_os_str().to_owned();
    name.push(".report.json");
    PathBuf::from(name)
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

fn failure_report(err: &StageError) -> FailureReport {
    FailureReport {
        stage: err.stage().as_str(),
        kind: err.kind().as_str(),
        message: err.message(),
    }
}

fn print_event(event: &StageEvent) {
    match event {
        StageEvent::Started { stage, .. } => {
            print!("\n  {stage}: starting");
        }
        StageEvent::Progress { stage, percent } => {
            print!("\r  {stage}: {percent:.1}%   ");
        }
        StageEvent::Finished {
            stage,
            success,
            elapsed_ms,
        } => {
            let outcome = if *success { "done" } else { "failed" };
            print!("\r  {stage}: {outcome} in {:.1}s   ", *elapsed_ms as f64 / 1000.0);
        }
        StageEvent::Diagnostic { .. } => return,
    }
    let _ = std::io::stdout().flush();
}
