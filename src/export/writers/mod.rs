//! Format writers for export operations
//!
//! A writer turns a complete, parsed feature collection into the payload of
//! one output format. Writers are synchronous: the whole document is encoded
//! in memory before anything is handed to the artifact exporter, so a failed
//! encode never leaves a partial file behind.

pub mod geojson;
pub mod tabular;

pub use geojson::GeoJsonEncoder;
pub use tabular::TabularFlattener;

use crate::error::Result;
use crate::model::FeatureCollection;

use super::artifact::Payload;
use super::format::ExportFormat;

/// Trait for encoding feature collections into an output format
pub trait FormatWriter: Send + Sync {
    /// Format produced by this writer
    fn format(&self) -> ExportFormat;

    /// Encode a feature collection
    ///
    /// # Arguments
    /// * `collection` - Collection to encode
    ///
    /// # Returns
    /// * `Result<Payload>` - Fully encoded document or error
    fn encode(&self, collection: &FeatureCollection) -> Result<Payload>;
}
