//! Overlay timeline builder.
//!
//! Turns clip overlays and cues into `drawtext` directives. Each directive
//! carries its full styling plus an activation window in seconds on the
//! timeline of the video it is burned into.

use std::path::PathBuf;

use clipchain_common::config::OverlayStyleConfig;
use clipchain_common::error::{ClipchainError, ClipchainResult};
use clipchain_job_model::{validate_cues, ClipOverlay, OverlayCue};

/// Horizontal centering expression shared by all directives.
pub const CENTERED_X_EXPR: &str = "(w-text_w)/2";

/// Resolved overlay styling. The font path is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub font_file: PathBuf,
    pub font_size: u32,
    pub font_color: String,
    pub box_enabled: bool,
    pub box_color: String,
    pub box_alpha: f64,
    pub box_border_width: u32,
    pub bottom_offset: u32,
}

impl OverlayStyle {
    /// Resolve the configured style, substituting the platform default font
    /// when none is configured.
    pub fn from_config(config: &OverlayStyleConfig) -> Self {
        Self {
            font_file: config.resolved_font_file(),
            font_size: config.font_size,
            font_color: config.font_color.clone(),
            box_enabled: config.box_enabled,
            box_color: config.box_color.clone(),
            box_alpha: config.box_alpha.clamp(0.0, 1.0),
            box_border_width: config.box_border_width,
            bottom_offset: config.bottom_offset,
        }
    }

    /// Fail fast when the font file is missing, before any overlay stage runs.
    pub fn validate_font(&self) -> ClipchainResult<()> {
        if self.font_file.is_file() {
            Ok(())
        } else {
            Err(ClipchainError::FileNotFound {
                path: self.font_file.clone(),
            })
        }
    }

    /// Vertical position: a fixed offset from the frame bottom.
    pub fn y_expr(&self) -> String {
        format!("h-{}", self.bottom_offset)
    }
}

/// Closed interval `[start, end]` during which a directive is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ActivationWindow {
    pub fn to_enable_expr(self) -> String {
        format!(
            "between(t,{},{})",
            format_secs(self.start_secs),
            format_secs(self.end_secs)
        )
    }
}

/// One `drawtext` instruction for the media engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDirective {
    pub text: String,
    pub style: OverlayStyle,

    /// `None` means visible for the whole video.
    pub window: Option<ActivationWindow>,
}

impl OverlayDirective {
    /// Render as a single filter-graph entry.
    pub fn to_drawtext(&self) -> String {
        let style = &self.style;
        let mut options = vec![
            format!(
                "fontfile={}",
                escape_filter_value(&style.font_file.to_string_lossy())
            ),
            format!("text={}", escape_drawtext_text(&self.text)),
            format!("fontsize={}", style.font_size),
            format!("fontcolor={}", escape_filter_value(&style.font_color)),
        ];

        if style.box_enabled {
            options.push("box=1".to_string());
            options.push(format!(
                "boxcolor={}",
                escape_filter_value(&format!("{}@{}", style.box_color, style.box_alpha))
            ));
            options.push(format!("boxborderw={}", style.box_border_width));
        }

        options.push(format!("x={}", escape_filter_value(CENTERED_X_EXPR)));
        options.push(format!("y={}", escape_filter_value(&style.y_expr())));

        if let Some(window) = self.window {
            options.push(format!(
                "enable={}",
                escape_filter_value(&window.to_enable_expr())
            ));
        }

        format!("drawtext={}", options.join(":"))
    }
}

/// Join directives into a `-vf` filter graph. `None` when there is nothing to draw.
pub fn filter_graph(directives: &[OverlayDirective]) -> Option<String> {
    if directives.is_empty() {
        return None;
    }
    Some(
        directives
            .iter()
            .map(OverlayDirective::to_drawtext)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Directives for one clip, on the clip's own timeline.
///
/// An empty overlay yields no directive; cue timing is validated first.
pub fn build_clip_timeline(
    overlay: &ClipOverlay,
    style: &OverlayStyle,
) -> ClipchainResult<Vec<OverlayDirective>> {
    overlay.validate()?;
    let directives = match overlay {
        ClipOverlay::None => Vec::new(),
        ClipOverlay::FullDuration { text } if text.is_empty() => Vec::new(),
        ClipOverlay::FullDuration { text } => vec![OverlayDirective {
            text: text.clone(),
            style: style.clone(),
            window: None,
        }],
        ClipOverlay::Cues { cues } => cues.iter().map(|cue| cue_directive(cue, style)).collect(),
    };
    Ok(directives)
}

/// Directives for the concatenated video.
///
/// `global_cues` are already on the final timeline. Each clip overlay is
/// shifted by the summed duration of the clips before it and clamped to the
/// clip's own span so it never bleeds into the next clip.
pub fn build_global_timeline(
    global_cues: &[OverlayCue],
    clips: &[(&ClipOverlay, f64)],
    style: &OverlayStyle,
) -> ClipchainResult<Vec<OverlayDirective>> {
    validate_cues(global_cues)?;
    for (overlay, _) in clips {
        overlay.validate()?;
    }

    let mut directives: Vec<OverlayDirective> = global_cues
        .iter()
        .map(|cue| cue_directive(cue, style))
        .collect();

    let mut offset = 0.0;
    for (index, (overlay, duration)) in clips.iter().enumerate() {
        let clip_start = offset;
        let clip_end = offset + duration.max(0.0);
        match overlay {
            ClipOverlay::None => {}
            ClipOverlay::FullDuration { text } if text.is_empty() => {}
            ClipOverlay::FullDuration { text } => {
                if clip_end > clip_start {
                    directives.push(OverlayDirective {
                        text: text.clone(),
                        style: style.clone(),
                        window: Some(ActivationWindow {
                            start_secs: clip_start,
                            end_secs: clip_end,
                        }),
                    });
                }
            }
            ClipOverlay::Cues { cues } => {
                for cue in cues {
                    let shifted = cue.shifted(clip_start);
                    let end = shifted.end_secs.min(clip_end);
                    if shifted.start_secs >= end {
                        tracing::warn!(
                            clip = index + 1,
                            text = %cue.text,
                            clip_duration_secs = duration,
                            "Cue starts after the clip ends, dropping it from the global timeline"
                        );
                        continue;
                    }
                    directives.push(OverlayDirective {
                        text: cue.text.clone(),
                        style: style.clone(),
                        window: Some(ActivationWindow {
                            start_secs: shifted.start_secs,
                            end_secs: end,
                        }),
                    });
                }
            }
        }
        offset = clip_end;
    }

    Ok(directives)
}

fn cue_directive(cue: &OverlayCue, style: &OverlayStyle) -> OverlayDirective {
    OverlayDirective {
        text: cue.text.clone(),
        style: style.clone(),
        window: Some(ActivationWindow {
            start_secs: cue.start_secs,
            end_secs: cue.end_secs,
        }),
    }
}

/// Seconds with at most millisecond precision and no trailing zeros.
fn format_secs(secs: f64) -> String {
    let rounded = (secs * 1000.0).round() / 1000.0;
    let s = format!("{rounded:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape_with(input: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a filter option value for both the option parser and the
/// filter-graph parser it is nested in.
pub fn escape_filter_value(value: &str) -> String {
    let option_level = escape_with(value, &['\'', ':']);
    escape_with(&option_level, &['\'', '[', ']', ',', ';'])
}

/// Escape text for `drawtext`, which expands `%` sequences on top of the
/// usual filter escaping.
///
/// Newlines are escaped at the filter-graph level and reach `drawtext` as
/// line breaks.
pub fn escape_drawtext_text(text: &str) -> String {
    let expansion_level = escape_with(text, &['%']);
    escape_filter_value(&expansion_level).replace('\n', "\\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> OverlayStyle {
        OverlayStyle {
            font_file: PathBuf::from("/fonts/Arial.ttf"),
            font_size: 24,
            font_color: "white".to_string(),
            box_enabled: true,
            box_color: "black".to_string(),
            box_alpha: 0.5,
            box_border_width: 8,
            bottom_offset: 80,
        }
    }

    #[test]
    fn test_full_duration_has_no_window() {
        let overlay = ClipOverlay::FullDuration {
            text: "hello".to_string(),
        };
        let directives = build_clip_timeline(&overlay, &style()).unwrap();
        assert_eq!(directives.len(), 1);
        assert!(directives[0].window.is_none());
        assert!(!directives[0].to_drawtext().contains("enable="));
    }

    #[test]
    fn test_empty_overlay_yields_no_filter() {
        let directives =
            build_clip_timeline(&ClipOverlay::Cues { cues: vec![] }, &style()).unwrap();
        assert!(directives.is_empty());
        assert!(filter_graph(&directives).is_none());
    }

    #[test]
    fn test_cues_keep_order_and_windows() {
        let overlay = ClipOverlay::Cues {
            cues: vec![
                OverlayCue::new("subtitle 1", 1.0, 3.0),
                OverlayCue::new("subtitle 22", 5.0, 10.0),
            ],
        };
        let directives = build_clip_timeline(&overlay, &style()).unwrap();
        let texts: Vec<_> = directives.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["subtitle 1", "subtitle 22"]);
        assert_eq!(
            directives[1].window,
            Some(ActivationWindow {
                start_secs: 5.0,
                end_secs: 10.0
            })
        );
    }

    #[test]
    fn test_invalid_cue_rejected() {
        let overlay = ClipOverlay::Cues {
            cues: vec![OverlayCue::new("bad", 3.0, 1.0)],
        };
        let err = build_clip_timeline(&overlay, &style()).unwrap_err();
        assert!(matches!(err, ClipchainError::Validation { .. }));
    }

    #[test]
    fn test_drawtext_rendering() {
        let directive = OverlayDirective {
            text: "subtitle 1".to_string(),
            style: style(),
            window: Some(ActivationWindow {
                start_secs: 1.0,
                end_secs: 3.0,
            }),
        };
        assert_eq!(
            directive.to_drawtext(),
            "drawtext=fontfile=/fonts/Arial.ttf:text=subtitle 1:fontsize=24:fontcolor=white:\
             box=1:boxcolor=black@0.5:boxborderw=8:x=(w-text_w)/2:y=h-80:\
             enable=between(t\\,1\\,3)"
        );
    }

    #[test]
    fn test_box_disabled_omits_box_options() {
        let mut s = style();
        s.box_enabled = false;
        let directive = OverlayDirective {
            text: "x".to_string(),
            style: s,
            window: None,
        };
        assert!(!directive.to_drawtext().contains("box"));
    }

    #[test]
    fn test_text_escaping() {
        assert_eq!(escape_drawtext_text("a:b"), "a\\\\:b");
        assert_eq!(escape_drawtext_text("it's"), "it\\\\\\'s");
        assert_eq!(escape_drawtext_text("100%"), "100\\\\\\\\%");
        assert_eq!(escape_drawtext_text("a,b"), "a\\,b");
    }

    #[test]
    fn test_newline_kept_as_line_break() {
        assert_eq!(escape_drawtext_text("top\nbottom"), "top\\\nbottom");
        assert_eq!(escape_drawtext_text("end\n"), "end\\\n");
    }

    #[test]
    fn test_global_timeline_shifts_by_clip_durations() {
        let a = ClipOverlay::FullDuration {
            text: "first".to_string(),
        };
        let b = ClipOverlay::None;
        let c = ClipOverlay::Cues {
            cues: vec![OverlayCue::new("third", 1.0, 2.0)],
        };
        let directives =
            build_global_timeline(&[], &[(&a, 10.0), (&b, 5.5), (&c, 4.0)], &style()).unwrap();

        assert_eq!(directives.len(), 2);
        assert_eq!(
            directives[0].window,
            Some(ActivationWindow {
                start_secs: 0.0,
                end_secs: 10.0
            })
        );
        assert_eq!(
            directives[1].window,
            Some(ActivationWindow {
                start_secs: 16.5,
                end_secs: 17.5
            })
        );
    }

    #[test]
    fn test_global_timeline_clamps_cues_to_clip_span() {
        let a = ClipOverlay::Cues {
            cues: vec![
                OverlayCue::new("overruns", 2.0, 8.0),
                OverlayCue::new("too late", 6.0, 7.0),
            ],
        };
        let directives = build_global_timeline(&[], &[(&a, 5.0)], &style()).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].window.unwrap().end_secs, 5.0);
    }

    #[test]
    fn test_global_cues_come_first_unshifted() {
        let a = ClipOverlay::FullDuration {
            text: "clip".to_string(),
        };
        let global = vec![OverlayCue::new("subtitle 7777777", 45.0, 60.0)];
        let directives = build_global_timeline(&global, &[(&a, 3.0)], &style()).unwrap();
        assert_eq!(directives[0].text, "subtitle 7777777");
        assert_eq!(directives[0].window.unwrap().start_secs, 45.0);
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(1.0), "1");
        assert_eq!(format_secs(16.5), "16.5");
        assert_eq!(format_secs(0.1 + 0.2), "0.3");
        assert_eq!(format_secs(0.0), "0");
    }

    #[test]
    fn test_missing_font_fails_validation() {
        let mut s = style();
        s.font_file = PathBuf::from("/no/such/font.ttf");
        assert!(matches!(
            s.validate_font(),
            Err(ClipchainError::FileNotFound { .. })
        ));
    }
}
