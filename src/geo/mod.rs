//! Geometry, reference systems and reprojection
//!
//! - `crs`: reference system codes and their normalization
//! - `geometry`: the closed set of GeoJSON geometry variants
//! - `transform`: point transforms between reference systems
//! - `reproject`: structural reprojection of whole geometries

pub mod crs;
pub mod geometry;
pub mod reproject;
pub mod transform;

pub use crs::ReferenceSystemCode;
pub use geometry::{Geometry, Position};
pub use reproject::Reprojector;
pub use transform::{BuiltinTransform, CoordinateTransform};
