//! User-visible export notifications

use crate::error::ExportError;

use super::coordinator::ExportReport;
use super::format::ExportFormat;

/// Message shown when an export fails
pub const FAILURE_MESSAGE: &str = "Failed to download data. Please try again.";

/// Receives the outcome of every export run
///
/// Exactly one call is made per run that got past the busy check.
pub trait ExportNotifier: Send + Sync {
    fn export_completed(&self, report: &ExportReport);

    fn export_failed(&self, format: ExportFormat, error: &ExportError);
}

/// Prints outcomes to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    quiet: bool,
}

impl ConsoleNotifier {
    /// # Arguments
    /// * `quiet` - Suppress success messages; failures are always printed
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ExportNotifier for ConsoleNotifier {
    fn export_completed(&self, report: &ExportReport) {
        if !self.quiet {
            println!(
                "Saved {} ({} feature(s), {} bytes)",
                report.location, report.features, report.bytes
            );
        }
    }

    fn export_failed(&self, format: ExportFormat, error: &ExportError) {
        eprintln!("{} export: {}\n  {}", format, FAILURE_MESSAGE, error);
    }
}
