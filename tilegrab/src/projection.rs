//! Geographic to planar projection.

use std::f64::consts::PI;

use thiserror::Error;

use crate::coord::{BoundingBox, ProjectedBox};

/// Earth radius used by the spherical Web Mercator projection (EPSG:3857), in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude limit of Web Mercator, where the projected world becomes a square.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ProjectionError {
    #[error("invalid longitude {0}, expected a value within [-180, 180]")]
    InvalidLongitude(f64),
    #[error("invalid latitude {0}, expected a value within [-85.05112878, 85.05112878]")]
    InvalidLatitude(f64),
}

/// Converts geographic coordinates into planar coordinates.
pub trait Projector: Send + Sync {
    /// Project `(lon, lat)` in degrees.
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError>;

    /// Width of the whole projected world, ie. the edge length of the single tile at zoom 0.
    fn extent(&self) -> f64;

    /// Project the two opposite corners of `bbox`.
    fn project_box(&self, bbox: &BoundingBox) -> Result<ProjectedBox, ProjectionError> {
        let (west, north) = bbox.north_west();
        let (east, south) = bbox.south_east();

        let (left, top) = self.project(west, north)?;
        let (right, bottom) = self.project(east, south)?;

        Ok(ProjectedBox { left, right, top, bottom })
    }
}

/// Spherical Web Mercator projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl Projector for WebMercator {
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ProjectionError::InvalidLongitude(lon));
        }
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) {
            return Err(ProjectionError::InvalidLatitude(lat));
        }

        let x = EARTH_RADIUS * lon.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();

        Ok((x, y))
    }

    #[inline]
    fn extent(&self) -> f64 {
        2.0 * PI * EARTH_RADIUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_origin() {
        let (x, y) = WebMercator.project(0.0, 0.0).unwrap();
        assert!(x.abs() < EPSILON && y.abs() < EPSILON);
    }

    #[test]
    fn test_world_edges() {
        let half = WebMercator.extent() / 2.0;

        let (x, y) = WebMercator.project(-180.0, MAX_LATITUDE).unwrap();
        assert!((x + half).abs() < EPSILON);
        assert!((y - half).abs() < 1.0, "{y} should be close to {half}");

        let (x, y) = WebMercator.project(180.0, -MAX_LATITUDE).unwrap();
        assert!((x - half).abs() < EPSILON);
        assert!((y + half).abs() < 1.0, "{y} should be close to -{half}");
    }

    #[test]
    fn test_invalid_coordinates() {
        assert_eq!(WebMercator.project(180.5, 0.0), Err(ProjectionError::InvalidLongitude(180.5)));
        assert_eq!(WebMercator.project(0.0, -89.0), Err(ProjectionError::InvalidLatitude(-89.0)));
        assert!(matches!(WebMercator.project(f64::NAN, 0.0), Err(ProjectionError::InvalidLongitude(_))));
        assert!(matches!(WebMercator.project(0.0, f64::NAN), Err(ProjectionError::InvalidLatitude(_))));
    }

    #[test]
    fn test_project_box() {
        let bbox = BoundingBox::new(-10.0, 10.0, 20.0, -20.0);
        let projected = WebMercator.project_box(&bbox).unwrap();

        assert!(projected.left < projected.right);
        assert!(projected.top > projected.bottom);
        assert!((projected.left + projected.right).abs() < EPSILON);
        assert!((projected.top + projected.bottom).abs() < EPSILON);
    }

    #[test]
    fn test_project_box_fails_on_any_corner() {
        let bbox = BoundingBox::new(-10.0, 200.0, 20.0, -20.0);
        assert_eq!(WebMercator.project_box(&bbox), Err(ProjectionError::InvalidLongitude(200.0)));
    }
}
