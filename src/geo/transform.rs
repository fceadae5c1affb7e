//! Coordinate transforms
//!
//! The reprojector only walks geometry trees; the actual math lives behind
//! the [`CoordinateTransform`] trait. [`BuiltinTransform`] covers the
//! reference systems feature services hand out most often:
//!
//! - geographic lon/lat (WGS 84, ETRS89, NAD83, GDA94, CGCS2000)
//! - spherical Web Mercator (EPSG:3857)
//! - UTM on WGS 84 (EPSG:326zz / 327zz) and ETRS89 (EPSG:258zz)
//!
//! Every transform goes through geographic coordinates. Datum shifts between
//! the supported geographic systems are below a metre and are ignored.

use std::f64::consts::PI;

use crate::error::GeometryError;

use super::crs::ReferenceSystemCode;

/// Point transform between two reference systems
pub trait CoordinateTransform: Send + Sync {
    /// Transform a single `(x, y)` pair from `source` to `target`
    fn transform(
        &self,
        source: &ReferenceSystemCode,
        target: &ReferenceSystemCode,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), GeometryError>;
}

/// Reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };
}

/// Sphere radius used by Web Mercator
const WEB_MERCATOR_RADIUS: f64 = Ellipsoid::WGS84.a;

/// Latitude limit of Web Mercator (degrees)
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779;

/// UTM scale factor on the central meridian
const UTM_K0: f64 = 0.9996;

/// Transverse Mercator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Central meridian (degrees)
    pub central_meridian: f64,
    pub scale_factor: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// UTM zone parameters
    pub fn utm(zone: u8, north: bool, ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            central_meridian: f64::from(zone) * 6.0 - 183.0,
            scale_factor: UTM_K0,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
        }
    }

    /// Third flattening and rectifying radius `A`
    fn series_base(&self) -> (f64, f64) {
        let f = self.ellipsoid.f;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let a = self.ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        (n, a)
    }

    /// Geographic (degrees) to projected (metres), Krüger series to n^3
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (n, big_a) = self.series_base();
        let (n2, n3) = (n * n, n * n * n);
        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];

        let e = 2.0 * n.sqrt() / (1.0 + n);
        let phi = lat.to_radians();
        let dlambda = (lon - self.central_meridian).to_radians();

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_p = t.atan2(dlambda.cos());
        let eta_p = (dlambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let k0a = self.scale_factor * big_a;
        (
            self.false_easting + k0a * eta,
            self.false_northing + k0a * xi,
        )
    }

    /// Projected (metres) to geographic (degrees)
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (n, big_a) = self.series_base();
        let (n2, n3) = (n * n, n * n * n);
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ];

        let k0a = self.scale_factor * big_a;
        let xi = (y - self.false_northing) / k0a;
        let eta = (x - self.false_easting) / k0a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += d * (k * chi).sin();
        }
        let lambda = eta_p.sinh().atan2(xi_p.cos());

        (self.central_meridian + lambda.to_degrees(), phi.to_degrees())
    }
}

/// A reference system the builtin transform knows how to handle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Lon/lat in degrees
    Geographic,
    /// Spherical Web Mercator in metres
    WebMercator,
    /// Transverse Mercator in metres
    TransverseMercator(TransverseMercator),
}

impl Projection {
    /// Resolve a reference system code
    pub fn from_code(code: &ReferenceSystemCode) -> Result<Self, GeometryError> {
        let unsupported = || GeometryError::UnsupportedCrs(code.label().to_string());
        let epsg = code.epsg().ok_or_else(unsupported)?;
        match epsg {
            4326 | 4258 | 4269 | 4283 | 4490 | 4617 => Ok(Projection::Geographic),
            3857 => Ok(Projection::WebMercator),
            32601..=32660 => Ok(Self::utm(epsg - 32600, true, Ellipsoid::WGS84)),
            32701..=32760 => Ok(Self::utm(epsg - 32700, false, Ellipsoid::WGS84)),
            25801..=25860 => Ok(Self::utm(epsg - 25800, true, Ellipsoid::GRS80)),
            _ => Err(unsupported()),
        }
    }

    fn utm(zone: u32, north: bool, ellipsoid: Ellipsoid) -> Self {
        // zone is 1..=60 by construction of the match ranges above
        Projection::TransverseMercator(TransverseMercator::utm(zone as u8, north, ellipsoid))
    }

    fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => {
                let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
                let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees();
                (lon, lat)
            }
            Projection::TransverseMercator(tm) => tm.inverse(x, y),
        }
    }

    fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => {
                let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
                let x = WEB_MERCATOR_RADIUS * lon.to_radians();
                let y = WEB_MERCATOR_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
                (x, y)
            }
            Projection::TransverseMercator(tm) => tm.forward(lon, lat),
        }
    }
}

/// Transform for the reference systems listed in the module docs
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTransform;

impl BuiltinTransform {
    pub fn new() -> Self {
        Self
    }
}

impl CoordinateTransform for BuiltinTransform {
    fn transform(
        &self,
        source: &ReferenceSystemCode,
        target: &ReferenceSystemCode,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), GeometryError> {
        let from = Projection::from_code(source)?;
        let to = Projection::from_code(target)?;

        let (lon, lat) = from.to_geographic(x, y);
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeometryError::TransformFailed(format!(
                "latitude {lat} out of range for ({x}, {y}) in {source}"
            )));
        }

        let (tx, ty) = to.from_geographic(lon, lat);
        if !tx.is_finite() || !ty.is_finite() {
            return Err(GeometryError::TransformFailed(format!(
                "({x}, {y}) in {source} has no finite image in {target}"
            )));
        }
        Ok((tx, ty))
    }
}
