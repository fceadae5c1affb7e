//! Error handling module for export operations.
//!
//! Every stage of the export pipeline has its own error kind:
//! - `FetchError`: the feature service could not be reached or refused the request
//! - `ParseError`: the service payload is not a GeoJSON FeatureCollection
//! - `GeometryError`: a geometry could not be reprojected
//! - `SerializationError`: the output document could not be encoded
//! - `ArtifactError`: the encoded payload could not be saved
//!
//! All of them convert into the crate-wide [`ExportError`], which is what the
//! export orchestrator catches and reports to the user.
//!
//! # Example
//!
//! ```rust
//! use wfs_export::error::{ExportError, FetchError, Result};
//!
//! fn fetch_layer() -> Result<String> {
//!     Err(FetchError::Timeout.into())
//! }
//!
//! let err: ExportError = fetch_layer().unwrap_err();
//! assert!(err.to_string().contains("timed out"));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ArtifactError, ConfigError, ExportError, FetchError, GeometryError, ParseError, Result,
    SerializationError,
};
