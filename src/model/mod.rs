//! Feature data model
//!
//! Serde mirrors of the GeoJSON documents a feature service returns:
//! - `LayerDescriptor`: the layer being exported, supplied by the caller
//! - `FeatureCollection`: the parsed payload, features in service order
//! - `Feature`: id, nullable geometry and attribute properties
//!
//! Members this crate does not interpret (`numberMatched`, `timeStamp`,
//! `geometry_name`, ...) are kept as foreign members and written back out
//! unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ParseError, SerializationError};
use crate::geo::geometry::merge_bounds;
use crate::geo::{Geometry, ReferenceSystemCode};

/// Label used for a layer that does not declare its native projection
pub const NATIVE_PROJECTION_FALLBACK_LABEL: &str = "Native";

/// Layer exported from the feature service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Namespaced layer name, e.g. `parks:trees`
    pub id: String,

    /// Native reference system of the layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_projection: Option<ReferenceSystemCode>,

    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Display description
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LayerDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_projection: None,
            title: None,
            description: None,
        }
    }

    pub fn with_default_projection(mut self, code: ReferenceSystemCode) -> Self {
        self.default_projection = Some(code);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Label of the native projection as the service spells it
    pub fn native_projection_label(&self) -> &str {
        self.default_projection
            .as_ref()
            .map(|code| code.label())
            .unwrap_or(NATIVE_PROJECTION_FALLBACK_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionType {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureType {
    Feature,
}

/// Feature identifier, string or number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(serde_json::Number),
    String(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{n}"),
            FeatureId::String(s) => f.write_str(s),
        }
    }
}

/// Legacy GeoJSON (2008) `crs` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCrs {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl NamedCrs {
    /// A `{"type": "name"}` member for the given code
    pub fn named(code: &ReferenceSystemCode) -> Self {
        let mut properties = Map::new();
        properties.insert("name".to_string(), Value::String(code.label().to_string()));
        Self {
            kind: "name".to_string(),
            properties,
        }
    }

    /// The named reference system, if this is a named CRS member
    pub fn code(&self) -> Option<ReferenceSystemCode> {
        if !self.kind.eq_ignore_ascii_case("name") {
            return None;
        }
        self.properties
            .get("name")
            .and_then(Value::as_str)
            .map(ReferenceSystemCode::new)
    }
}

/// A single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: FeatureType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,

    #[serde(default)]
    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(flatten)]
    pub foreign_members: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Map<String, Value>) -> Self {
        Self {
            kind: FeatureType::Feature,
            id: None,
            geometry,
            properties: Some(properties),
            bbox: None,
            foreign_members: Map::new(),
        }
    }

    pub fn with_id(mut self, id: FeatureId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attribute value by name
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    /// Attribute names in document order
    pub fn property_names(&self) -> impl Iterator<Item = &String> {
        self.properties.iter().flat_map(|p| p.keys())
    }

    /// Recompute `bbox` from the geometry if the feature carries one
    pub fn refresh_bbox(&mut self) {
        if self.bbox.is_some() {
            self.bbox = self
                .geometry
                .as_ref()
                .and_then(Geometry::bounds)
                .map(|b| b.to_vec());
        }
    }
}

/// A feature collection as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: CollectionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<NamedCrs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(default)]
    pub features: Vec<Feature>,

    #[serde(flatten)]
    pub foreign_members: Map<String, Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionType::FeatureCollection,
            name: None,
            crs: None,
            bbox: None,
            features,
            foreign_members: Map::new(),
        }
    }

    /// Parse a service payload
    ///
    /// # Arguments
    /// * `payload` - GeoJSON text
    ///
    /// # Returns
    /// * `Result<Self, ParseError>` - Parsed collection or error
    pub fn from_payload(payload: &str) -> Result<Self, ParseError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
        if kind != "FeatureCollection" {
            let found = if kind.is_empty() { "<missing>" } else { kind };
            return Err(ParseError::NotAFeatureCollection(found.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))
    }

    /// Encode as GeoJSON text
    pub fn to_geojson(&self, pretty: bool) -> Result<String, SerializationError> {
        let encoded = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        encoded.map_err(|e| SerializationError::Json(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Reference system named by the legacy `crs` member
    pub fn declared_crs(&self) -> Option<ReferenceSystemCode> {
        self.crs.as_ref().and_then(NamedCrs::code)
    }

    /// Replace the legacy `crs` member
    pub fn set_declared_crs(&mut self, code: Option<&ReferenceSystemCode>) {
        self.crs = code.map(NamedCrs::named);
    }

    /// 2D bounds over all feature geometries
    pub fn compute_bbox(&self) -> Option<Vec<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref().and_then(Geometry::bounds))
            .fold(None, |acc, b| merge_bounds(acc, Some(b)))
            .map(|b| b.to_vec())
    }

    /// Recompute collection and feature `bbox` members that are present
    pub fn refresh_bboxes(&mut self) {
        for feature in &mut self.features {
            feature.refresh_bbox();
        }
        if self.bbox.is_some() {
            self.bbox = self.compute_bbox();
        }
    }
}
