//! Write a sample job manifest.

use std::path::PathBuf;

use clipchain_common::config::AppConfig;
use clipchain_job_model::{discover_inputs, ClipSpec, OverlayCue, OverlayStrategy, PipelineJob};

pub fn run(
    config: &AppConfig,
    path: PathBuf,
    input_dir: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let job = match &input_dir {
        Some(dir) => {
            let clips = discover_inputs(dir, &config.directories.input_extensions)?
                .into_iter()
                .map(ClipSpec::new)
                .collect();
            PipelineJob::new(
                clips,
                config.directories.work_dir.clone(),
                config.directories.output_dir.clone(),
                &config.pipeline.final_name,
            )
        }
        None => sample_job(config),
    };

    job.save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write manifest: {e}"))?;

    println!("Manifest written to {}", path.display());
    println!("  Clips: {}", job.clips.len());
    println!("  Strategy: {}", job.strategy.as_str());
    println!();
    println!("Relative paths resolve against the manifest's directory.");
    println!("Run it with: clipchain run --job {}", path.display());

    Ok(())
}

fn sample_job(config: &AppConfig) -> PipelineJob {
    let input = &config.directories.input_dir;
    let clips = vec![
        ClipSpec::with_full_duration_text(input.join("1.mp4"), "Part one"),
        ClipSpec::with_cues(
            input.join("2.mp4"),
            vec![
                OverlayCue::new("Watch closely", 0.0, 2.5),
                OverlayCue::new("There it is", 3.0, 5.0),
            ],
        ),
        ClipSpec::new(input.join("3.mp4")),
    ];
    PipelineJob::new(
        clips,
        config.directories.work_dir.clone(),
        config.directories.output_dir.clone(),
        &config.pipeline.final_name,
    )
    .with_strategy(OverlayStrategy::PerClip)
}
