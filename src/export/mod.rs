//! Export pipeline
//!
//! This module turns a feature layer into downloadable files. It supports:
//! - GeoJSON export with client-side reprojection to the standard projection
//! - Attribute-only CSV export
//! - Independent lanes per format, each busy at most once
//! - Atomic saves into a download directory
//!
//! # Architecture
//!
//! The pipeline is built from four components:
//!
//! 1. **FeatureRetriever** (`crate::retriever`): fetches the complete payload
//! 2. **Reprojector** (`crate::geo`): converts GeoJSON-lane geometries
//! 3. **FormatWriter**: encodes the collection (`GeoJsonEncoder`, `TabularFlattener`)
//! 4. **ArtifactExporter**: saves the encoded payload under its derived filename
//!
//! These components are orchestrated by the **ExportOrchestrator**, which owns
//! the lane state and reports every outcome to an **ExportNotifier**.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wfs_export::config::Config;
//! use wfs_export::export::{
//!     ConsoleNotifier, DownloadDirExporter, ExportContext, ExportFormat, ExportOrchestrator,
//! };
//! use wfs_export::model::LayerDescriptor;
//! use wfs_export::retriever::WfsRetriever;
//!
//! # async fn demo() -> wfs_export::error::Result<()> {
//! let config = Config::default();
//! let context = ExportContext::new(
//!     "https://example.org/geoserver/wfs",
//!     LayerDescriptor::new("parks:trees"),
//! );
//! let orchestrator = ExportOrchestrator::new(
//!     context,
//!     Arc::new(WfsRetriever::new(&config.service)?),
//!     Arc::new(DownloadDirExporter::new(&config.export.download_dir)),
//!     Arc::new(ConsoleNotifier::new(false)),
//! );
//! orchestrator.trigger(ExportFormat::GeoJson).await;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod coordinator;
pub mod format;
pub mod notify;
pub mod progress;
pub mod writers;

pub use artifact::{
    ArtifactExporter, ArtifactHandle, ArtifactReceipt, DownloadDirExporter, HandleRegistry,
    Payload,
};
pub use coordinator::{
    ExportContext, ExportOptions, ExportOrchestrator, ExportOutcome, ExportReport, LaneGuard,
    LaneState, OrchestratorSettings,
};
pub use format::{derive_filename, ExportFormat, ExportRequest};
pub use notify::{ConsoleNotifier, ExportNotifier, FAILURE_MESSAGE};
pub use progress::ProgressTracker;
pub use writers::{FormatWriter, GeoJsonEncoder, TabularFlattener};
