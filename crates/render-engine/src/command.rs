//! ffmpeg argument lists for each stage.

use std::fmt;
use std::path::{Path, PathBuf};

use clipchain_common::config::EncodingProfile;

use crate::overlay::{filter_graph, OverlayDirective};

/// The three transforms a job is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Transcode,
    Concat,
    Overlay,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcode => "transcode",
            Self::Concat => "concat",
            Self::Overlay => "overlay",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the concat stage writes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// `-c copy`; valid when every input shares one codec configuration.
    StreamCopy,
    /// Full re-encode with the job's encoding profile.
    Reencode,
}

/// One fully-resolved engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub stage: StageKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl EngineCommand {
    /// Single-line, shell-quoted rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds stage commands for one engine binary and encoding profile.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    profile: EncodingProfile,
}

impl CommandBuilder {
    pub fn new(program: impl Into<PathBuf>, profile: EncodingProfile) -> Self {
        Self {
            program: program.into(),
            profile,
        }
    }

    /// Normalize one clip to the job's codec/format.
    pub fn transcode(&self, input: &Path, output: &Path) -> EngineCommand {
        let mut args = common_args();
        args.push("-i".to_string());
        args.push(path_arg(input));
        args.extend(encode_args(&self.profile));
        self.finish(StageKind::Transcode, args, output)
    }

    /// Join the files named in `list` in list order.
    pub fn concat(&self, list: &Path, output: &Path, mode: ConcatMode) -> EngineCommand {
        let mut args = common_args();
        args.extend(
            ["-f", "concat", "-safe", "0", "-i"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(path_arg(list));
        match mode {
            ConcatMode::StreamCopy => {
                args.push("-c".to_string());
                args.push("copy".to_string());
            }
            ConcatMode::Reencode => args.extend(encode_args(&self.profile)),
        }
        self.finish(StageKind::Concat, args, output)
    }

    /// Burn `directives` into `input`. No directives means a plain re-encode.
    pub fn overlay(
        &self,
        input: &Path,
        output: &Path,
        directives: &[OverlayDirective],
    ) -> EngineCommand {
        let mut args = common_args();
        args.push("-i".to_string());
        args.push(path_arg(input));
        if let Some(graph) = filter_graph(directives) {
            args.push("-vf".to_string());
            args.push(graph);
        }
        args.extend(encode_args(&self.profile));
        self.finish(StageKind::Overlay, args, output)
    }

    fn finish(&self, stage: StageKind, mut args: Vec<String>, output: &Path) -> EngineCommand {
        args.push(path_arg(output));
        EngineCommand {
            stage,
            program: self.program.clone(),
            args,
            output: output.to_path_buf(),
        }
    }
}

fn common_args() -> Vec<String> {
    ["-y", "-hide_banner", "-nostats", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn encode_args(profile: &EncodingProfile) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        profile.video_codec.clone(),
        "-preset".to_string(),
        profile.preset.clone(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-pix_fmt".to_string(),
        profile.pixel_format.clone(),
        "-r".to_string(),
        profile.frame_rate.to_string(),
        "-c:a".to_string(),
        profile.audio_codec.clone(),
        "-b:a".to_string(),
        profile.audio_bitrate.clone(),
        "-ar".to_string(),
        profile.audio_sample_rate.to_string(),
        "-ac".to_string(),
        profile.audio_channels.to_string(),
    ]
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{ActivationWindow, OverlayStyle};

    fn builder() -> CommandBuilder {
        CommandBuilder::new("ffmpeg", EncodingProfile::default())
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_transcode_carries_fixed_profile() {
        let cmd = builder().transcode(Path::new("in/a.mp4"), Path::new("tmp/1.mp4"));
        assert_eq!(cmd.stage, StageKind::Transcode);
        assert_eq!(value_after(&cmd.args, "-i"), Some("in/a.mp4"));
        assert_eq!(value_after(&cmd.args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&cmd.args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&cmd.args, "-ar"), Some("44100"));
        assert_eq!(value_after(&cmd.args, "-ac"), Some("2"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("tmp/1.mp4"));
        assert_eq!(cmd.output, PathBuf::from("tmp/1.mp4"));
    }

    #[test]
    fn test_concat_modes() {
        let copy = builder().concat(
            Path::new("tmp/filelist.txt"),
            Path::new("out.mp4"),
            ConcatMode::StreamCopy,
        );
        assert_eq!(value_after(&copy.args, "-f"), Some("concat"));
        assert_eq!(value_after(&copy.args, "-safe"), Some("0"));
        assert_eq!(value_after(&copy.args, "-c"), Some("copy"));
        assert!(value_after(&copy.args, "-c:v").is_none());

        let reencode = builder().concat(
            Path::new("tmp/filelist.txt"),
            Path::new("out.mp4"),
            ConcatMode::Reencode,
        );
        assert!(value_after(&reencode.args, "-c").is_none());
        assert_eq!(value_after(&reencode.args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&reencode.args, "-c:a"), Some("aac"));
    }

    #[test]
    fn test_overlay_without_directives_is_plain_reencode() {
        let cmd = builder().overlay(Path::new("a.mp4"), Path::new("b.mp4"), &[]);
        assert!(!cmd.args.iter().any(|a| a == "-vf"));
        assert_eq!(value_after(&cmd.args, "-crf"), Some("18"));
    }

    #[test]
    fn test_overlay_with_directives_adds_filter() {
        let directive = OverlayDirective {
            text: "hello".to_string(),
            style: OverlayStyle::from_config(&Default::default()),
            window: Some(ActivationWindow {
                start_secs: 0.0,
                end_secs: 2.0,
            }),
        };
        let cmd = builder().overlay(Path::new("a.mp4"), Path::new("b.mp4"), &[directive]);
        let vf = value_after(&cmd.args, "-vf").unwrap();
        assert!(vf.starts_with("drawtext="));
        assert!(vf.contains("text=hello"));
    }

    #[test]
    fn test_command_line_quotes_spaces() {
        let cmd = builder().transcode(Path::new("my clips/a.mp4"), Path::new("tmp/1.mp4"));
        let line = cmd.command_line();
        assert!(line.starts_with("ffmpeg -y -hide_banner"));
        assert!(line.contains("'my clips/a.mp4'"));
    }
}
