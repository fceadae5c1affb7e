//! Reference system codes
//!
//! Feature services spell the same reference system in many ways
//! (`EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, `CRS:84`, ...). A
//! [`ReferenceSystemCode`] keeps the caller's spelling for display and
//! compares on a normalized `EPSG:<n>` form.
//!
//! # Example
//!
//! ```
//! use wfs_export::geo::ReferenceSystemCode;
//!
//! let a = ReferenceSystemCode::new("urn:ogc:def:crs:EPSG::25832");
//! let b = ReferenceSystemCode::new(" epsg:25832 ");
//! assert_eq!(a, b);
//! assert_eq!(a.epsg(), Some(25832));
//! assert_eq!(ReferenceSystemCode::new("CRS:84"), ReferenceSystemCode::wgs84());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// EPSG code of geographic WGS 84
pub const WGS84_EPSG: u32 = 4326;

/// EPSG code of spherical Web Mercator
pub const WEB_MERCATOR_EPSG: u32 = 3857;

/// Spellings of CRS84 / WGS 84 lon-lat (already upper-cased, whitespace removed)
const WGS84_ALIASES: &[&str] = &[
    "CRS:84",
    "CRS84",
    "OGC:CRS84",
    "URN:OGC:DEF:CRS:OGC:1.3:CRS84",
    "URN:OGC:DEF:CRS:OGC::CRS84",
    "HTTP://WWW.OPENGIS.NET/DEF/CRS/OGC/1.3/CRS84",
    "WGS84",
];

/// Legacy codes that all denote spherical Web Mercator
const WEB_MERCATOR_ALIASES: &[u32] = &[900913, 3785, 102100, 102113];

/// A coordinate reference system identifier.
///
/// Two codes are equal iff their normalized forms match.
#[derive(Debug, Clone)]
pub struct ReferenceSystemCode {
    /// Caller's spelling, trimmed
    raw: String,
    /// Normalized form used for comparison
    normalized: String,
}

impl ReferenceSystemCode {
    /// Create a code from any supported spelling
    pub fn new(code: &str) -> Self {
        let raw = code.trim().to_string();
        let normalized = normalize(&raw);
        Self { raw, normalized }
    }

    /// Create a code from an EPSG number
    pub fn from_epsg(code: u32) -> Self {
        Self::new(&format!("EPSG:{code}"))
    }

    /// Geographic WGS 84 (`EPSG:4326`)
    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// Normalized form, e.g. `EPSG:25832`
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// The spelling this code was created from
    pub fn label(&self) -> &str {
        &self.raw
    }

    /// EPSG number, if the code is an EPSG code
    pub fn epsg(&self) -> Option<u32> {
        self.normalized
            .strip_prefix("EPSG:")
            .and_then(|n| n.parse().ok())
    }

    /// Whether this is geographic WGS 84
    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(WGS84_EPSG)
    }
}

/// Normalize a CRS spelling to `EPSG:<n>` where possible.
///
/// Unknown spellings are returned upper-cased with whitespace removed.
fn normalize(code: &str) -> String {
    let compact: String = code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if WGS84_ALIASES.contains(&compact.as_str()) {
        return format!("EPSG:{WGS84_EPSG}");
    }

    match parse_epsg(&compact) {
        Some(n) if WEB_MERCATOR_ALIASES.contains(&n) => format!("EPSG:{WEB_MERCATOR_EPSG}"),
        Some(n) => format!("EPSG:{n}"),
        None => compact,
    }
}

/// Extract the EPSG number from an upper-cased spelling
fn parse_epsg(compact: &str) -> Option<u32> {
    if compact.is_empty() {
        return None;
    }
    if compact.chars().all(|c| c.is_ascii_digit()) {
        return compact.parse().ok();
    }
    // EPSG:25832 and the occasional EPSG::25832
    if let Some(rest) = compact.strip_prefix("EPSG:") {
        return rest.trim_start_matches(':').parse().ok();
    }
    // urn:ogc:def:crs:EPSG::25832 / urn:ogc:def:crs:EPSG:6.9:25832
    if compact.starts_with("URN:OGC:DEF:CRS:EPSG:") {
        return compact.rsplit(':').next()?.parse().ok();
    }
    // http://www.opengis.net/def/crs/EPSG/0/25832
    if compact.contains("OPENGIS.NET/DEF/CRS/EPSG/") {
        return compact.rsplit('/').next()?.parse().ok();
    }
    // http://www.opengis.net/gml/srs/epsg.xml#25832
    if let Some((_, n)) = compact.split_once("EPSG.XML#") {
        return n.parse().ok();
    }
    None
}

impl PartialEq for ReferenceSystemCode {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ReferenceSystemCode {}

impl Hash for ReferenceSystemCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for ReferenceSystemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl From<&str> for ReferenceSystemCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl Serialize for ReferenceSystemCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ReferenceSystemCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_epsg_normalization() {
        assert_eq!(ReferenceSystemCode::new("epsg:4326").as_str(), "EPSG:4326");
        assert_eq!(ReferenceSystemCode::new(" EPSG : 25832 ").as_str(), "EPSG:25832");
        assert_eq!(ReferenceSystemCode::new("25833").as_str(), "EPSG:25833");
    }

    #[test]
    fn test_urn_and_url_spellings() {
        let expected = ReferenceSystemCode::from_epsg(25832);
        for spelling in [
            "urn:ogc:def:crs:EPSG::25832",
            "urn:ogc:def:crs:EPSG:6.9:25832",
            "http://www.opengis.net/def/crs/EPSG/0/25832",
            "http://www.opengis.net/gml/srs/epsg.xml#25832",
        ] {
            assert_eq!(ReferenceSystemCode::new(spelling), expected, "{spelling}");
        }
    }

    #[test]
    fn test_wgs84_aliases() {
        for spelling in ["CRS:84", "crs84", "OGC:CRS84", "urn:ogc:def:crs:OGC:1.3:CRS84"] {
            assert!(ReferenceSystemCode::new(spelling).is_wgs84(), "{spelling}");
        }
    }

    #[test]
    fn test_web_mercator_aliases() {
        assert_eq!(ReferenceSystemCode::new("EPSG:900913").epsg(), Some(3857));
        assert_eq!(ReferenceSystemCode::new("EPSG:102100").epsg(), Some(3857));
    }

    #[test]
    fn test_label_keeps_original_spelling() {
        let code = ReferenceSystemCode::new("urn:ogc:def:crs:EPSG::25832");
        assert_eq!(code.label(), "urn:ogc:def:crs:EPSG::25832");
        assert_eq!(code.to_string(), "EPSG:25832");
    }

    #[test]
    fn test_unknown_code() {
        let code = ReferenceSystemCode::new("local:grid");
        assert_eq!(code.as_str(), "LOCAL:GRID");
        assert_eq!(code.epsg(), None);
        assert_ne!(code, ReferenceSystemCode::wgs84());
    }
}
