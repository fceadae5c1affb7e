//! Output formats, export requests and filename derivation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::LayerDescriptor;

/// Output format of an export lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Full geometry export as a GeoJSON FeatureCollection
    GeoJson,
    /// Attribute-only export as delimited text
    Tabular,
}

impl ExportFormat {
    /// Both lanes, GeoJSON first
    pub const ALL: [ExportFormat; 2] = [ExportFormat::GeoJson, ExportFormat::Tabular];

    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Tabular => "csv",
        }
    }

    /// MIME type handed to the artifact exporter
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "application/json",
            ExportFormat::Tabular => "text/csv; charset=utf-8",
        }
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "GeoJSON",
            ExportFormat::Tabular => "CSV",
        }
    }

    pub(crate) fn lane_index(self) -> usize {
        match self {
            ExportFormat::GeoJson => 0,
            ExportFormat::Tabular => 1,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs of a single export run, built fresh per trigger
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub layer: LayerDescriptor,

    /// Feature cap passed to the retriever, 0 = all
    pub max_feature_count: u64,

    /// Retrieve coordinates in the layer's native reference system
    pub use_native_projection: bool,

    /// Keep native coordinates instead of converting to the standard projection
    pub keep_native_projection: bool,

    pub format: ExportFormat,
}

impl ExportRequest {
    /// Whether the filename takes a native projection label
    ///
    /// True when native coordinates were requested because of a projection
    /// issue, even if the GeoJSON lane later converts them, or when GeoJSON
    /// output keeps native coordinates that differ from the standard.
    ///
    /// # Arguments
    /// * `source_is_standard` - The retrieved data is already in the standard projection
    pub fn native_coordinates_in_output(&self, source_is_standard: bool) -> bool {
        self.use_native_projection
            || (self.format == ExportFormat::GeoJson
                && self.keep_native_projection
                && !source_is_standard)
    }

    /// Filename for this request
    ///
    /// # Arguments
    /// * `native_in_output` - See [`ExportRequest::native_coordinates_in_output`]
    /// * `standard_label` - Label used when coordinates are in the standard projection
    pub fn filename(&self, native_in_output: bool, standard_label: &str) -> String {
        let label = if native_in_output {
            self.layer.native_projection_label()
        } else {
            standard_label
        };
        derive_filename(&self.layer.id, label, self.format)
    }
}

/// `<layer id>_<projection label>.<extension>` with every ':' replaced by '_'
///
/// # Examples
///
/// ```
/// use wfs_export::export::{derive_filename, ExportFormat};
///
/// assert_eq!(
///     derive_filename("parks:trees", "EPSG:25832", ExportFormat::Tabular),
///     "parks_trees_EPSG_25832.csv"
/// );
/// ```
pub fn derive_filename(layer_id: &str, projection_label: &str, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        layer_id.replace(':', "_"),
        projection_label.replace(':', "_"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ReferenceSystemCode;

    fn request(format: ExportFormat) -> ExportRequest {
        ExportRequest {
            layer: LayerDescriptor::new("parks:trees")
                .with_default_projection(ReferenceSystemCode::new("EPSG:25832")),
            max_feature_count: 0,
            use_native_projection: false,
            keep_native_projection: false,
            format,
        }
    }

    #[test]
    fn test_derive_filename() {
        assert_eq!(
            derive_filename("parks:trees", "WGS84", ExportFormat::GeoJson),
            "parks_trees_WGS84.geojson"
        );
        assert_eq!(
            derive_filename("a:b:c", "urn:ogc:def:crs:EPSG::3857", ExportFormat::Tabular),
            "a_b_c_urn_ogc_def_crs_EPSG__3857.csv"
        );
    }

    #[test]
    fn test_native_projection_filename() {
        let mut req = request(ExportFormat::Tabular);
        req.use_native_projection = true;
        let native = req.native_coordinates_in_output(false);
        assert!(native);
        assert_eq!(req.filename(native, "WGS84"), "parks_trees_EPSG_25832.csv");
    }

    #[test]
    fn test_keep_native_applies_to_geojson_only() {
        let mut geojson = request(ExportFormat::GeoJson);
        geojson.keep_native_projection = true;
        assert!(geojson.native_coordinates_in_output(false));
        assert!(!geojson.native_coordinates_in_output(true));

        let mut tabular = request(ExportFormat::Tabular);
        tabular.keep_native_projection = true;
        assert!(!tabular.native_coordinates_in_output(false));
        assert_eq!(tabular.filename(false, "WGS84"), "parks_trees_WGS84.csv");
    }

    #[test]
    fn test_layer_without_native_projection() {
        let mut req = request(ExportFormat::GeoJson);
        req.layer.default_projection = None;
        assert_eq!(req.filename(true, "WGS84"), "parks_trees_Native.geojson");
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::GeoJson.mime_type(), "application/json");
        assert_eq!(ExportFormat::Tabular.mime_type(), "text/csv; charset=utf-8");
        assert_eq!(ExportFormat::Tabular.to_string(), "CSV");
    }
}
