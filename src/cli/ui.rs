//! Terminal reporting for pipeline runs.
//!
//! Each task gets a [`RunReporter`] owning the cue progress bar, labelled
//! with the media name so bulk runs stay readable; the free `status_*`
//! helpers cover one-off lines outside a task (discovery, probe output,
//! bulk-driver decisions).

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::pipeline::supervisor::ProgressSink;

/// Per-task progress reporting: a bar over the cue list plus the final
/// written/already-done summary line.
pub struct RunReporter {
    label: String,
    bar: ProgressBar,
}

impl RunReporter {
    /// Start reporting a task over `total_cues` cues of `media`.
    pub fn start(media: &Path, total_cues: usize) -> Self {
        let label = media
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bar = ProgressBar::new(total_cues as u64);
        let style = ProgressStyle::with_template(
            "{msg:.cyan} {wide_bar:.green/white} {pos}/{len} cues ({eta} left)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(label.clone());
        Self { label, bar }
    }

    /// Supervisor observer advancing the bar as records land in the ledger.
    pub fn progress_sink(&self) -> ProgressSink {
        let bar = self.bar.clone();
        Arc::new(move |done, _total| bar.set_position(done as u64))
    }

    /// Clear the bar and print the task summary.
    pub fn finish(&self, written: usize, skipped: usize) {
        self.bar.finish_and_clear();
        println!(
            "{} {}: {} cues written, {} already done",
            "ok".green().bold(),
            self.label.bold(),
            written,
            skipped
        );
    }
}

/// Print a standalone success line.
pub fn status_ok(message: &str) {
    println!("{} {}", "ok".green().bold(), message);
}

/// Print a warning line.
pub fn status_warn(message: &str) {
    println!("{} {}", "warn".yellow().bold(), message);
}

/// Print an error line to stderr.
pub fn status_err(message: &str) {
    eprintln!("{} {}", "error".red().bold(), message);
}
