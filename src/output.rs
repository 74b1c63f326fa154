//! Terminal rendering for the CLI: progress bar and status lines.
//!
//! Everything goes to stderr so stdout stays free for `config get` and
//! similar machine-readable output.

use crate::error::NarrateError;
use crate::pipeline::GenerationProgress;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

/// Segment progress bar, hidden in quiet mode.
pub struct SegmentProgress {
    bar: ProgressBar,
}

impl SegmentProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet || !std::io::stderr().is_terminal() {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] segment {pos}/{len} {prefix:>4} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Show that segment `progress.current` of `progress.total` has started.
    pub fn update(&self, progress: GenerationProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.current as u64);
        self.bar.set_prefix(format!("{:.0}%", progress.fraction() * 100.0));
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// `3.2s` below a minute, `1m 05.0s` above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{}m {:04.1}s", minutes as u64, secs - minutes * 60.0)
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

/// Report a written file.
pub fn print_saved(path: &std::path::Path, duration: Duration, bytes: usize) {
    eprintln!(
        "{} {} ({}, {})",
        "Saved".green(),
        path.display(),
        format_duration(duration),
        format_bytes(bytes).dimmed()
    );
}

/// Report a cancelled run. Not an error.
pub fn print_stopped() {
    eprintln!("{}", NarrateError::Aborted.user_message().yellow());
}

/// Report a failed run with the end-user wording and the technical cause.
pub fn print_failure(error: &NarrateError) {
    eprintln!("{}", format!("Error: {}", error.user_message()).red());
    let detail = error.to_string();
    if detail != error.user_message() {
        eprintln!("  {}", detail.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_short_and_long() {
        assert_eq!(format_duration(Duration::from_millis(3200)), "3.2s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05.0s");
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn hidden_progress_accepts_updates() {
        let progress = SegmentProgress::new(true);
        progress.update(GenerationProgress {
            current: 2,
            total: 3,
        });
        assert_eq!(progress.bar.prefix(), "67%");
        progress.set_message("working");
        progress.finish();
    }
}
