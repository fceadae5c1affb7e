//! GeoJSON encoder

use tracing::debug;

use crate::error::Result;
use crate::export::artifact::Payload;
use crate::export::format::ExportFormat;
use crate::model::FeatureCollection;

use super::FormatWriter;

/// Encodes a collection as a GeoJSON document
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonEncoder {
    pretty: bool,
}

impl GeoJsonEncoder {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl FormatWriter for GeoJsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::GeoJson
    }

    fn encode(&self, collection: &FeatureCollection) -> Result<Payload> {
        let text = collection.to_geojson(self.pretty)?;
        debug!(
            "Encoded {} feature(s) as GeoJSON ({} bytes)",
            collection.len(),
            text.len()
        );
        Ok(Payload::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encode_standard_shape() {
        let collection = FeatureCollection::from_payload(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[13.4,52.5]},"properties":{"name":"x"}}
            ]}"#,
        )
        .unwrap();

        let payload = GeoJsonEncoder::new(false).encode(&collection).unwrap();
        let value: Value = serde_json::from_slice(payload.as_bytes()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [13.4, 52.5] },
                    "properties": { "name": "x" }
                }]
            })
        );
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let collection = FeatureCollection::new(Vec::new());
        let payload = GeoJsonEncoder::new(true).encode(&collection).unwrap();
        let Payload::Text(text) = payload else {
            panic!("expected text payload");
        };
        assert!(text.contains("\n  \"type\": \"FeatureCollection\""));
    }
}
