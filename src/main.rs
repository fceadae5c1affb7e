//! wfs-export
//!
//! Exports a WFS feature layer to GeoJSON and CSV files.
//!
//! # Features
//!
//! - GeoJSON export reprojected to WGS84, or kept in the native projection
//! - Attribute-only CSV export
//! - Both formats exported concurrently with independent lanes
//! - Paged retrieval for large layers
//! - Configuration file with environment overrides
//!
//! # Usage
//!
//! ```bash
//! # Export both formats
//! wfs-export https://example.org/geoserver/wfs --layer parks:trees
//!
//! # CSV only, first 500 features
//! wfs-export https://example.org/geoserver/wfs -l parks:trees -f csv --max-features 500 --no-download-all
//! ```

use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::{debug, Level};

use wfs_export::cli::CliInterface;
use wfs_export::error::Result;
use wfs_export::export::{
    ConsoleNotifier, DownloadDirExporter, ExportOrchestrator, ExportOutcome, ExportReport,
    OrchestratorSettings,
};
use wfs_export::{ReferenceSystemCode, WfsRetriever};

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// This function orchestrates the application startup:
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Handle subcommands or run the export
///
/// # Returns
/// * `Result<bool>` - Whether every requested export succeeded
async fn run() -> Result<bool> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(true);
    }

    let orchestrator = build_orchestrator(&cli)?;
    let outcomes = run_exports(&cli, &orchestrator).await;

    let reports: Vec<ExportReport> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ExportOutcome::Completed(report) => Some(report.clone()),
            _ => None,
        })
        .collect();
    cli.print_summary(&reports);

    Ok(!outcomes.iter().any(ExportOutcome::is_failure))
}

/// Wire the retriever, exporter and notifier into an orchestrator
fn build_orchestrator(cli: &CliInterface) -> Result<ExportOrchestrator> {
    let config = cli.config();
    let context = cli.export_context()?;
    debug!(
        "Exporting layer {} from {}",
        context.layer.id, context.service_url
    );

    let retriever = WfsRetriever::new(&config.service)?
        .with_standard_projection(ReferenceSystemCode::new(&config.export.standard_projection));
    let exporter = DownloadDirExporter::new(&config.export.download_dir);
    let notifier = ConsoleNotifier::new(cli.args().quiet);

    let mut orchestrator = ExportOrchestrator::new(
        context,
        Arc::new(retriever),
        Arc::new(exporter),
        Arc::new(notifier),
    )
    .with_settings(OrchestratorSettings::from_config(&config.export))
    .with_options(cli.export_options());

    if config.export.show_progress {
        orchestrator = orchestrator.with_progress(MultiProgress::new());
    }

    Ok(orchestrator)
}

/// Trigger every selected format; two formats run concurrently
async fn run_exports(cli: &CliInterface, orchestrator: &ExportOrchestrator) -> Vec<ExportOutcome> {
    match cli.formats().as_slice() {
        [first, second] => {
            let (a, b) = tokio::join!(orchestrator.trigger(*first), orchestrator.trigger(*second));
            vec![a, b]
        }
        formats => {
            let mut outcomes = Vec::with_capacity(formats.len());
            for format in formats {
                outcomes.push(orchestrator.trigger(*format).await);
            }
            outcomes
        }
    }
}

/// Initialize logging system
///
/// # Arguments
/// * `cli` - CLI interface with configuration
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    // Progress spinners and the summary own stdout
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
