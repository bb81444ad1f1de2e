//! Parsing of ffmpeg's `-progress` stream and duration diagnostics.

/// Accumulated state of one `-progress` block sequence.
#[derive(Debug, Default)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    /// Apply one `key=value` line. Returns true when the line closes a block.
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
                false
            }
            "progress" => {
                self.complete = value == "end";
                true
            }
            _ => false,
        }
    }

    /// Percentage in `[0, 100]`, if the total duration is known.
    pub fn percent(&self, total_secs: Option<f64>) -> Option<f64> {
        if self.complete {
            return Some(100.0);
        }
        let total = total_secs.filter(|t| *t > 0.0)?;
        Some((self.out_time_secs / total * 100.0).clamp(0.0, 100.0))
    }
}

/// Extract the input duration from a `Duration: HH:MM:SS.xx, ...` diagnostic line.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(stamp)
}

/// Parse `HH:MM:SS(.frac)` into seconds.
pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
