//! Progress reporting for migration passes

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::MigrationReport;

/// Receives progress events from the driver
pub trait ProgressSink: Send + Sync {
    /// Streaming is about to start; `total` is the source's record count
    fn start(&self, _total: u64) {}

    /// One record was attempted
    fn record(&self, _id: &str, _succeeded: bool) {}

    /// The pass reached a terminal phase
    fn finish(&self, _report: &MigrationReport) {}
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Terminal progress bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} films ({eta}) {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    /// A bar that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn record(&self, id: &str, succeeded: bool) {
        if !succeeded {
            self.bar.set_message(format!("last failure: {}", id));
        }
        self.bar.inc(1);
    }

    fn finish(&self, report: &MigrationReport) {
        self.bar.finish_with_message(format!(
            "{}: {} migrated, {} failed",
            report.phase, report.succeeded, report.failed
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts() {
        let progress = BarProgress::hidden();
        progress.start(3);
        progress.record("1", true);
        progress.record("2", false);
        assert_eq!(progress.bar.position(), 2);
        assert_eq!(progress.bar.length(), Some(3));
    }
}
