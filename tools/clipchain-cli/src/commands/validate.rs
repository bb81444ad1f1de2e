//! Validate a job manifest.

use std::path::PathBuf;

use clipchain_common::config::AppConfig;
use clipchain_job_model::{ArtifactLayout, ClipOverlay, PipelineJob};

pub fn run(config: &AppConfig, manifest: PathBuf) -> anyhow::Result<()> {
    println!("Validating job at: {}", manifest.display());

    let job = PipelineJob::load(&manifest)
        .map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?;

    println!("  Clips: {}", job.clips.len());
    println!("  Strategy: {}", job.strategy.as_str());
    println!("  Global cues: {}", job.global_cues.len());
    println!("  Work dir: {}", job.work_dir.display());
    println!("  Output: {}", job.final_artifact.display());

    let mut missing = Vec::new();
    for (index, clip) in job.clips.iter().enumerate() {
        let overlay = match clip.overlay() {
            ClipOverlay::None => "no overlay".to_string(),
            ClipOverlay::FullDuration { text } => format!("full-duration \"{text}\""),
            ClipOverlay::Cues { cues } => format!("{} cue(s)", cues.len()),
        };
        println!("  {:>3}. {} ({overlay})", index + 1, clip.source().display());
        if !clip.source().is_file() {
            missing.push(clip.source().to_path_buf());
        }
    }

    let layout = ArtifactLayout::new(job.work_dir.clone(), config.encoding.container.clone());
    job.validate()
        .and_then(|()| job.validate_layout(&layout))
        .map_err(|e| anyhow::anyhow!("Job is invalid: {e}"))?;

    if missing.is_empty() {
        println!("  Sources: All present");
        println!("\nJob is valid.");
    } else {
        println!("\nMissing sources:");
        for path in &missing {
            println!("  - {}", path.display());
        }
        println!(
            "\n{} source(s) missing. The job will fail when it reaches them.",
            missing.len()
        );
    }

    Ok(())
}
