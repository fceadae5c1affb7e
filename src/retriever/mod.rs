//! Feature retrieval
//!
//! The export pipeline consumes the feature service through the
//! [`FeatureRetriever`] trait. A retrieval is atomic: it yields the complete
//! payload or an error, never a partial result. [`WfsRetriever`] is the
//! HTTP implementation for OGC WFS 2.0 services.

pub mod wfs;

pub use wfs::WfsRetriever;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::LayerDescriptor;

/// Parameters of one retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Base URL of the feature service
    pub service_url: String,

    /// Layer (feature type) to retrieve
    pub layer_id: String,

    /// Maximum number of features, 0 = all
    pub max_features: u64,

    pub layer: LayerDescriptor,

    /// Request coordinates in the layer's native reference system
    pub use_native_projection: bool,

    /// The caller reprojects on its side, so native coordinates are wanted
    pub client_side_reprojection: bool,
}

impl FetchRequest {
    /// Whether the service should answer in the layer's native reference system
    pub fn wants_native_coordinates(&self) -> bool {
        self.use_native_projection || self.client_side_reprojection
    }

    /// Whether the retrieval is capped
    pub fn is_capped(&self) -> bool {
        self.max_features > 0
    }
}

/// Trait for retrieving feature payloads from a service
#[async_trait]
pub trait FeatureRetriever: Send + Sync {
    /// Retrieve a layer as a GeoJSON FeatureCollection payload
    ///
    /// # Arguments
    /// * `request` - What to retrieve
    ///
    /// # Returns
    /// * `Result<String>` - Complete payload text or error
    async fn fetch(&self, request: &FetchRequest) -> Result<String>;
}
