// ABOUTME: Push-style progress contract for exports
// ABOUTME: Includes a no-op reporter and an indicatif progress bar for terminals

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives export progress, one table at a time
///
/// For each exported table the exporter calls `start_table` once, `increment` once per
/// non-empty page with that page's length, and `finish_table` once with the number of rows
/// actually written (which can differ from `total` when the table changes mid-export).
pub trait ExportProgress {
    fn start_table(&mut self, table: &str, total: u64);
    fn increment(&mut self, table: &str, delta: u64);
    fn finish_table(&mut self, table: &str, exported: u64);
}

/// Discards all progress events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ExportProgress for NoProgress {
    fn start_table(&mut self, _table: &str, _total: u64) {}
    fn increment(&mut self, _table: &str, _delta: u64) {}
    fn finish_table(&mut self, _table: &str, _exported: u64) {}
}

/// Renders one progress bar per table on stderr
#[derive(Default)]
pub struct ProgressBarReporter {
    bar: Option<ProgressBar>,
}

impl ProgressBarReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:>20} [{bar:40.cyan/blue}] {pos}/{len} rows ({per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }
}

impl ExportProgress for ProgressBarReporter {
    fn start_table(&mut self, table: &str, total: u64) {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(table.to_string());
        self.bar = Some(bar);
    }

    fn increment(&mut self, _table: &str, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    fn finish_table(&mut self, table: &str, exported: u64) {
        if let Some(bar) = self.bar.take() {
            bar.set_length(exported);
            bar.set_position(exported);
            bar.finish_with_message(format!("{} done", table));
        }
    }
}
