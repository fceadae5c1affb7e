//! Progress tracking for export lanes
//!
//! Each running lane shows a spinner with its current stage. Spinners of
//! concurrent lanes share one `MultiProgress` so they do not overwrite each
//! other.

use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress tracker for one export run
pub struct ProgressTracker {
    /// Start time of the run
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `label` - Lane name shown in front of the stage
    /// * `multi` - Display to attach the spinner to, `None` disables it
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(label: &str, multi: Option<&MultiProgress>) -> Self {
        let bar = multi.map(|multi| {
            let bar = multi.add(ProgressBar::new_spinner());
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} {prefix:.bold} {msg} [{elapsed}]");
            if let Ok(style) = style {
                bar.set_style(style);
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        Self {
            start_time: Instant::now(),
            bar,
        }
    }

    /// A tracker that displays nothing
    pub fn hidden() -> Self {
        Self::new("", None)
    }

    /// Show the current stage
    pub fn stage(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Milliseconds since the tracker was created
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}
