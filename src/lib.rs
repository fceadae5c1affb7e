//! WFS Export Library
//!
//! This library provides the core functionality of the wfs-export tool: it
//! retrieves a feature layer from an OGC WFS service and saves it as GeoJSON
//! or CSV files.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export lanes, encoders and artifact saving
//! - `geo`: Reference systems, geometries and reprojection
//! - `model`: Feature collections and layer descriptors
//! - `retriever`: WFS feature retrieval
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use wfs_export::export::{
//!     ConsoleNotifier, DownloadDirExporter, ExportContext, ExportFormat, ExportOrchestrator,
//! };
//! use wfs_export::{Config, LayerDescriptor, WfsRetriever};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let context = ExportContext::new(
//!         "https://example.org/geoserver/wfs",
//!         LayerDescriptor::new("parks:trees"),
//!     );
//!     let orchestrator = ExportOrchestrator::new(
//!         context,
//!         Arc::new(WfsRetriever::new(&config.service)?),
//!         Arc::new(DownloadDirExporter::new(&config.export.download_dir)),
//!         Arc::new(ConsoleNotifier::new(false)),
//!     );
//!
//!     let (geojson, csv) = tokio::join!(
//!         orchestrator.trigger(ExportFormat::GeoJson),
//!         orchestrator.trigger(ExportFormat::Tabular),
//!     );
//!     println!("{:?} {:?}", geojson, csv);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geo;
pub mod model;
pub mod retriever;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportFormat, ExportOrchestrator, ExportOutcome};
pub use geo::{Geometry, ReferenceSystemCode, Reprojector};
pub use model::{Feature, FeatureCollection, LayerDescriptor};
pub use retriever::{FeatureRetriever, WfsRetriever};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn version() -> &'static str {
    VERSION
}
