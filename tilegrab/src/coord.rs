//! Geographic and tile coordinate types.

use std::fmt;
use std::ops::RangeInclusive;

/// A geographic bounding box in degrees.
///
/// The caller is expected to provide `west < east` and `south < north`, nothing checks it here:
/// an inverted box simply plans no tile along the inverted axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, north: f64, south: f64) -> Self {
        Self { west, east, north, south }
    }

    /// North-west corner as `(lon, lat)`.
    #[inline]
    pub fn north_west(&self) -> (f64, f64) {
        (self.west, self.north)
    }

    /// South-east corner as `(lon, lat)`.
    #[inline]
    pub fn south_east(&self) -> (f64, f64) {
        (self.east, self.south)
    }
}

/// A bounding box in projected planar units (Web Mercator meters).
///
/// `top` is the northern edge, so `top > bottom` for a well-formed box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Highest zoom level whose tile indices fit a `u32`: zoom `z` has `2^z` columns and rows.
pub const MAX_ZOOM: u8 = 31;

/// An inclusive range of zoom levels.
///
/// Levels above [`MAX_ZOOM`] are never iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Iterate over every level of the range up to [`MAX_ZOOM`], empty when `min > max`.
    #[inline]
    pub fn levels(&self) -> RangeInclusive<u8> {
        self.min..=self.max.min(MAX_ZOOM)
    }
}

/// A tile of the slippy-tile scheme: column `x`, row `y` (growing southward) at zoom `z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_levels() {
        assert!(ZoomRange::new(3, 5).levels().eq([3, 4, 5]));
        assert!(ZoomRange::new(7, 7).levels().eq([7]));
        assert_eq!(ZoomRange::new(5, 3).levels().count(), 0);
    }

    #[test]
    fn test_zoom_levels_capped() {
        assert!(ZoomRange::new(30, 40).levels().eq([30, 31]));
        assert_eq!(ZoomRange::new(32, 40).levels().count(), 0);
        assert_eq!(ZoomRange::new(0, u8::MAX).levels().count(), usize::from(MAX_ZOOM) + 1);
    }

    #[test]
    fn test_tile_display() {
        assert_eq!(TileCoord::new(12, 34, 5).to_string(), "5/12/34");
    }
}
