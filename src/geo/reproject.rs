//! Geometry reprojection
//!
//! Walks a geometry tree and transforms every position from one reference
//! system to another. The walk itself is structural: each position is
//! visited exactly once, in order, and z/m ordinates are left untouched.

use std::sync::Arc;

use tracing::trace;

use crate::error::GeometryError;

use super::crs::ReferenceSystemCode;
use super::geometry::{Geometry, Position};
use super::transform::{BuiltinTransform, CoordinateTransform};

/// Reprojects geometries through a [`CoordinateTransform`]
#[derive(Clone)]
pub struct Reprojector {
    transform: Arc<dyn CoordinateTransform>,
}

impl Reprojector {
    /// Create a reprojector backed by the given transform
    pub fn new(transform: Arc<dyn CoordinateTransform>) -> Self {
        Self { transform }
    }

    /// Create a reprojector backed by [`BuiltinTransform`]
    pub fn builtin() -> Self {
        Self::new(Arc::new(BuiltinTransform::new()))
    }

    /// Reproject `geometry` in place from `source` to `target`
    ///
    /// Equal codes are a no-op and leave the geometry bit-for-bit unchanged.
    /// On error the geometry is left as it was.
    ///
    /// # Returns
    /// * `Result<usize, GeometryError>` - Number of positions transformed
    pub fn reproject(
        &self,
        geometry: &mut Geometry,
        source: &ReferenceSystemCode,
        target: &ReferenceSystemCode,
    ) -> Result<usize, GeometryError> {
        if source == target {
            return Ok(0);
        }

        let mut projected = geometry.clone();
        let mut index = 0usize;
        projected.try_for_each_position_mut(&mut |position: &mut Position| {
            let current = index;
            index += 1;
            self.transform_position(position, current, source, target)
        })?;

        trace!(
            "Reprojected {} {} position(s) from {} to {}",
            index,
            geometry.kind(),
            source,
            target
        );
        *geometry = projected;
        Ok(index)
    }

    fn transform_position(
        &self,
        position: &mut Position,
        index: usize,
        source: &ReferenceSystemCode,
        target: &ReferenceSystemCode,
    ) -> Result<(), GeometryError> {
        if position.len() < 2 {
            return Err(GeometryError::InvalidPosition {
                index,
                len: position.len(),
            });
        }
        let (x, y) = (position[0], position[1]);
        if !x.is_finite() || !y.is_finite() {
            return Err(GeometryError::NonFiniteCoordinate { index });
        }

        let (tx, ty) = self.transform.transform(source, target, x, y)?;
        if !tx.is_finite() || !ty.is_finite() {
            return Err(GeometryError::TransformFailed(format!(
                "position #{index} maps to a non-finite coordinate"
            )));
        }
        position[0] = tx;
        position[1] = ty;
        Ok(())
    }
}

impl Default for Reprojector {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shifts every pair by (+1, +2) and counts calls
    #[derive(Default)]
    struct CountingTransform {
        calls: AtomicUsize,
    }

    impl CoordinateTransform for CountingTransform {
        fn transform(
            &self,
            _source: &ReferenceSystemCode,
            _target: &ReferenceSystemCode,
            x: f64,
            y: f64,
        ) -> Result<(f64, f64), GeometryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((x + 1.0, y + 2.0))
        }
    }

    fn all_variants() -> Vec<Geometry> {
        let ring = vec![
            vec![0.0, 0.0],
            vec![4.0, 0.0],
            vec![4.0, 4.0],
            vec![0.0, 0.0],
        ];
        vec![
            Geometry::Point {
                coordinates: vec![1.5, 2.5, 30.0],
            },
            Geometry::LineString {
                coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
            },
            Geometry::Polygon {
                coordinates: vec![ring.clone(), ring.clone()],
            },
            Geometry::MultiPoint {
                coordinates: vec![vec![0.0, 0.0], vec![2.0, 2.0], vec![3.0, 3.0]],
            },
            Geometry::MultiLineString {
                coordinates: vec![vec![vec![0.0, 0.0], vec![1.0, 1.0]], vec![vec![2.0, 2.0]]],
            },
            Geometry::MultiPolygon {
                coordinates: vec![vec![ring.clone()], vec![ring.clone(), ring]],
            },
            Geometry::GeometryCollection {
                geometries: vec![
                    Geometry::Point {
                        coordinates: vec![9.0, 9.0],
                    },
                    Geometry::LineString {
                        coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                    },
                ],
            },
        ]
    }

    #[test]
    fn test_same_code_is_identity() {
        let reprojector = Reprojector::builtin();
        let code = ReferenceSystemCode::new("EPSG:25832");
        let alias = ReferenceSystemCode::new("urn:ogc:def:crs:EPSG::25832");
        for geometry in all_variants() {
            let mut copy = geometry.clone();
            let visited = reprojector.reproject(&mut copy, &code, &alias).unwrap();
            assert_eq!(visited, 0);
            assert_eq!(copy, geometry);
        }
    }

    #[test]
    fn test_every_position_visited_once() {
        let transform = Arc::new(CountingTransform::default());
        let reprojector = Reprojector::new(transform.clone());
        let source = ReferenceSystemCode::new("EPSG:25832");
        let target = ReferenceSystemCode::wgs84();

        for geometry in all_variants() {
            let before = geometry.position_count();
            transform.calls.store(0, Ordering::SeqCst);

            let mut copy = geometry.clone();
            let visited = reprojector.reproject(&mut copy, &source, &target).unwrap();

            assert_eq!(visited, before, "{}", geometry.kind());
            assert_eq!(transform.calls.load(Ordering::SeqCst), before);
            assert_eq!(copy.position_count(), before);
        }
    }

    #[test]
    fn test_order_and_extra_ordinates_preserved() {
        let reprojector = Reprojector::new(Arc::new(CountingTransform::default()));
        let mut geometry = Geometry::LineString {
            coordinates: vec![vec![0.0, 0.0, 7.0], vec![10.0, 20.0, 8.0, 99.0]],
        };
        reprojector
            .reproject(
                &mut geometry,
                &ReferenceSystemCode::new("EPSG:3857"),
                &ReferenceSystemCode::wgs84(),
            )
            .unwrap();
        assert_eq!(
            geometry,
            Geometry::LineString {
                coordinates: vec![vec![1.0, 2.0, 7.0], vec![11.0, 22.0, 8.0, 99.0]],
            }
        );
    }

    #[test]
    fn test_short_position_fails_and_leaves_geometry_untouched() {
        let reprojector = Reprojector::new(Arc::new(CountingTransform::default()));
        let original = Geometry::MultiPoint {
            coordinates: vec![vec![1.0, 1.0], vec![2.0]],
        };
        let mut geometry = original.clone();
        let err = reprojector
            .reproject(
                &mut geometry,
                &ReferenceSystemCode::new("EPSG:3857"),
                &ReferenceSystemCode::wgs84(),
            )
            .unwrap_err();
        assert!(matches!(err, GeometryError::InvalidPosition { index: 1, len: 1 }));
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_non_finite_coordinate_fails() {
        let reprojector = Reprojector::builtin();
        let mut geometry = Geometry::Point {
            coordinates: vec![f64::NAN, 1.0],
        };
        let err = reprojector
            .reproject(
                &mut geometry,
                &ReferenceSystemCode::new("EPSG:3857"),
                &ReferenceSystemCode::wgs84(),
            )
            .unwrap_err();
        assert!(matches!(err, GeometryError::NonFiniteCoordinate { index: 0 }));
    }

    #[test]
    fn test_builtin_utm_to_wgs84() {
        let reprojector = Reprojector::builtin();
        let mut geometry = Geometry::Point {
            coordinates: vec![500_000.0, 0.0],
        };
        reprojector
            .reproject(
                &mut geometry,
                &ReferenceSystemCode::new("EPSG:32632"),
                &ReferenceSystemCode::wgs84(),
            )
            .unwrap();
        let Geometry::Point { coordinates } = geometry else {
            panic!("expected a point");
        };
        assert!((coordinates[0] - 9.0).abs() < 1e-9);
        assert!(coordinates[1].abs() < 1e-9);
    }
}
