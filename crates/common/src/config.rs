//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClipchainError, ClipchainResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Input, working and output directories.
    pub directories: DirectoryConfig,

    /// Target codec/format every stage encodes to.
    pub encoding: EncodingProfile,

    /// Text overlay styling.
    pub overlay: OverlayStyleConfig,

    /// External media engine binaries.
    pub engine: EngineConfig,

    /// Orchestrator behavior.
    pub pipeline: PipelineSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Filesystem layout used by the job driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Directory scanned for source clips.
    pub input_dir: PathBuf,

    /// Directory for intermediate artifacts (created if absent).
    pub work_dir: PathBuf,

    /// Directory for final artifacts (created if absent).
    pub output_dir: PathBuf,

    /// File extensions accepted during discovery, without the leading dot.
    pub input_extensions: Vec<String>,
}

/// Fixed encoding parameters shared by transcode, re-encoding concat and
/// overlay stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingProfile {
    /// Container extension for every artifact (e.g. "mp4").
    pub container: String,

    pub video_codec: String,
    pub audio_codec: String,

    /// Encoder speed preset.
    pub preset: String,

    /// Constant rate factor.
    pub crf: u8,

    pub pixel_format: String,

    /// Output frame rate.
    pub frame_rate: u32,

    /// Audio sample rate (Hz).
    pub audio_sample_rate: u32,

    /// Audio channel count.
    pub audio_channels: u8,

    /// Audio bitrate (e.g. "128k").
    pub audio_bitrate: String,
}

/// Styling applied to every burned-in text directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyleConfig {
    /// Font file. `None` selects the platform default (see [`default_font_file`]).
    pub font_file: Option<PathBuf>,

    pub font_size: u32,

    /// Fill color, in any color syntax the engine accepts.
    pub font_color: String,

    /// Whether a background box is drawn behind the text.
    pub box_enabled: bool,

    pub box_color: String,

    /// Box opacity in `[0.0, 1.0]`.
    pub box_alpha: f64,

    pub box_border_width: u32,

    /// Distance in pixels between the text baseline area and the frame bottom.
    pub bottom_offset: u32,
}

/// External binaries invoked as the media engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

/// Orchestrator behavior toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Keep consumed intermediates after a successful run.
    pub retain_intermediates: bool,

    /// Re-encode during concatenation even when stream copy would do.
    pub force_concat_reencode: bool,

    /// File name of the final artifact inside the output directory.
    pub final_name: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipchain=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("resources"),
            work_dir: PathBuf::from("tmp"),
            output_dir: PathBuf::from("output"),
            input_extensions: vec!["mp4".to_string()],
        }
    }
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            container: "mp4".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
            pixel_format: "yuv420p".to_string(),
            frame_rate: 25,
            audio_sample_rate: 44100,
            audio_channels: 2,
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl Default for OverlayStyleConfig {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: 24,
            font_color: "white".to_string(),
            box_enabled: true,
            box_color: "black".to_string(),
            box_alpha: 0.5,
            box_border_width: 8,
            bottom_offset: 80,
        }
    }
}

impl OverlayStyleConfig {
    /// The configured font file, or the platform default when unset.
    pub fn resolved_font_file(&self) -> PathBuf {
        self.font_file.clone().unwrap_or_else(default_font_file)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retain_intermediates: true,
            force_concat_reencode: false,
            final_name: "final.mp4".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], any
    /// failure is reported to the caller.
    pub fn load_from(path: impl AsRef<Path>) -> ClipchainResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClipchainError::config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ClipchainError::config(format!("{}: {e}", path.display())))
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipchain").join("config.json")
}

/// Platform-dependent default font used by text overlays.
///
/// - macOS: `/System/Library/Fonts/Supplemental/Arial.ttf`
/// - Windows: `C:\Windows\Fonts\arial.ttf`
/// - other Unix: `/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf`
pub fn default_font_file() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/System/Library/Fonts/Supplemental/Arial.ttf")
    } else if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\Windows\Fonts\arial.ttf")
    } else {
        PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
    }
}
