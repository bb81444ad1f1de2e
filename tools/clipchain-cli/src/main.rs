//! Clipchain CLI: transcode, concatenate and caption video clips.
//!
//! Usage:
//!   clipchain run [OPTIONS]          Run a job from a manifest or an input directory
//!   clipchain validate <MANIFEST>    Validate a job manifest without running it
//!   clipchain check                  Check engine binaries and overlay font
//!   clipchain init <PATH>            Write a sample job manifest

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clipchain_common::config::AppConfig;
use clipchain_job_model::OverlayStrategy;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipchain",
    about = "Assemble one video from many clips, with burned-in captions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/clipchain/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline job
    Run {
        /// Job manifest to run
        #[arg(long, conflicts_with = "input_dir")]
        job: Option<PathBuf>,

        /// Directory to discover clips in (defaults to the configured input dir)
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Overlay strategy: none, global or per-clip
        #[arg(long)]
        strategy: Option<OverlayStrategy>,

        /// Caption each discovered clip with its file name for its whole duration
        #[arg(long)]
        label_clips: bool,

        /// JSON file with cues on the final timeline
        #[arg(long)]
        cues: Option<PathBuf>,

        /// Final output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extra attempts after an engine failure
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Keep intermediates after success
        #[arg(long, overrides_with = "no_keep")]
        keep: bool,

        /// Delete intermediates after success
        #[arg(long, overrides_with = "keep")]
        no_keep: bool,
    },

    /// Validate a job manifest
    Validate {
        /// Path to the manifest
        manifest: PathBuf,
    },

    /// Check engine binaries and overlay font
    Check,

    /// Write a sample job manifest
    Init {
        /// Where to write the manifest
        path: PathBuf,

        /// Build the clip list from the media in this directory
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipchain_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Run {
            job,
            input_dir,
            strategy,
            label_clips,
            cues,
            output,
            retries,
            keep,
            no_keep,
        } => {
            let retain = if keep {
                Some(true)
            } else if no_keep {
                Some(false)
            } else {
                None
            };
            commands::run::run(
                config,
                commands::run::RunArgs {
                    job,
                    input_dir,
                    strategy,
                    label_clips,
                    cues,
                    output,
                    retries,
                    retain_intermediates: retain,
                },
            )
            .await
        }
        Commands::Validate { manifest } => commands::validate::run(&config, manifest),
        Commands::Check => commands::check::run(&config),
        Commands::Init {
            path,
            input_dir,
            force,
        } => commands::init::run(&config, path, input_dir, force),
    }
}
