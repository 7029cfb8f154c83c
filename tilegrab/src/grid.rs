//! Tile grid planning.
//!
//! Turns a projected bounding box into the inclusive rectangle of tile indices covering it at every requested zoom level.
//!
//! Tiles follow the slippy XYZ scheme: the grid origin is the north-west corner of the projected world, columns grow eastward
//! and rows grow southward. Projected `y` grows northward, so a row index is computed from the distance to the northern edge
//! of the world. Indices are never clamped: a box reaching outside the valid extent yields out-of-range tiles which the
//! provider will just refuse.

use std::collections::BTreeMap;

use crate::coord::{ProjectedBox, TileCoord, ZoomRange};
use crate::projection::Projector;

/// An inclusive rectangle of tile indices at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRect {
    /// Number of tiles in the rectangle, zero when inverted along any axis.
    pub fn count(&self) -> u64 {
        let width = (u64::from(self.max_x) + 1).saturating_sub(self.min_x.into());
        let height = (u64::from(self.max_y) + 1).saturating_sub(self.min_y.into());
        width * height
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.max_x.saturating_add(1).saturating_sub(self.min_x)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.max_y.saturating_add(1).saturating_sub(self.min_y)
    }

    /// Iterate over the tiles of the rectangle at zoom `z`, column by column.
    pub fn tiles(&self, z: u8) -> impl Iterator<Item = TileCoord> {
        let Self { min_x, max_x, min_y, max_y } = *self;
        (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord::new(x, y, z)))
    }
}

/// A square tile grid whose single zoom 0 tile covers `extent` projected units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    extent: f64,
}

impl TileGrid {
    pub fn new(extent: f64) -> Self {
        Self { extent }
    }

    /// The grid matching the projected world of `projector`.
    pub fn for_projector(projector: &impl Projector) -> Self {
        Self::new(projector.extent())
    }

    /// Tile edge length in projected units at zoom `z`.
    #[inline]
    pub fn edge_length(&self, z: u8) -> f64 {
        self.extent / 2f64.powi(z.into())
    }

    /// Tile rectangle covering `bbox` at zoom `z`.
    pub fn rect(&self, bbox: &ProjectedBox, z: u8) -> TileRect {
        let edge = self.edge_length(z);
        let half = self.extent / 2.0;

        // saturating casts: anything north or west of the world lands on index 0.
        // Up to `MAX_ZOOM`, every index inside the world fits a u32.
        let index = |offset: f64| (offset / edge).floor() as u32;

        TileRect {
            min_x: index(bbox.left + half),
            max_x: index(bbox.right + half),
            min_y: index(half - bbox.top),
            max_y: index(half - bbox.bottom),
        }
    }

    /// Plan every level of `zooms`.
    pub fn plan(&self, bbox: &ProjectedBox, zooms: ZoomRange) -> GridPlan {
        GridPlan {
            levels: zooms.levels().map(|z| (z, self.rect(bbox, z))).collect(),
        }
    }
}

/// Tile rectangles indexed by zoom level, in increasing zoom order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridPlan {
    levels: BTreeMap<u8, TileRect>,
}

impl GridPlan {
    /// Total number of tiles over all levels.
    pub fn total(&self) -> u64 {
        self.levels.values().map(TileRect::count).fold(0, u64::saturating_add)
    }

    #[inline]
    pub fn get(&self, z: u8) -> Option<&TileRect> {
        self.levels.get(&z)
    }

    #[inline]
    pub fn levels(&self) -> impl Iterator<Item = (u8, &TileRect)> {
        self.levels.iter().map(|(z, rect)| (*z, rect))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{BoundingBox, MAX_ZOOM};
    use crate::projection::WebMercator;

    fn grid() -> TileGrid {
        TileGrid::for_projector(&WebMercator)
    }

    /// A box strictly inside the tile right below and to the right of the projected origin at zoom 5,
    /// and straddling that tile's center.
    fn single_tile_box() -> ProjectedBox {
        let edge = grid().edge_length(5);

        ProjectedBox {
            left: 0.25 * edge,
            right: 0.75 * edge,
            top: -0.25 * edge,
            bottom: -0.75 * edge,
        }
    }

    #[test]
    fn test_edge_length_halves() {
        let grid = grid();

        assert_eq!(grid.edge_length(0), WebMercator.extent());
        for z in 0..24 {
            assert_eq!(grid.edge_length(z + 1), grid.edge_length(z) / 2.0);
        }
    }

    #[test]
    fn test_single_tile_subdivision() {
        let plan = grid().plan(&single_tile_box(), ZoomRange::new(5, 6));

        let z5 = plan.get(5).unwrap();
        assert_eq!(*z5, TileRect { min_x: 16, max_x: 16, min_y: 16, max_y: 16 });
        assert_eq!(z5.count(), 1);

        let z6 = plan.get(6).unwrap();
        assert_eq!(*z6, TileRect { min_x: 32, max_x: 33, min_y: 32, max_y: 33 });
        assert_eq!(z6.count(), 4);

        assert_eq!(plan.total(), 5);
    }

    #[test]
    fn test_reference_tile() {
        // New York City, 40.7128°N 74.0060°W
        let bbox = BoundingBox::new(-74.0060, -74.0060, 40.7128, 40.7128);
        let projected = WebMercator.project_box(&bbox).unwrap();

        let rect = grid().rect(&projected, 16);

        assert_eq!((rect.min_x, rect.min_y), (19295, 24640));
        assert_eq!(rect.count(), 1);
    }

    #[test]
    fn test_whole_world() {
        let bbox = BoundingBox::new(-179.9, 179.9, 85.0, -85.0);
        let projected = WebMercator.project_box(&bbox).unwrap();

        let plan = grid().plan(&projected, ZoomRange::new(0, 3));

        for (z, rect) in plan.levels() {
            let n = 1u32 << z;
            assert_eq!(*rect, TileRect { min_x: 0, max_x: n - 1, min_y: 0, max_y: n - 1 });
        }
        assert_eq!(plan.total(), 1 + 4 + 16 + 64);
    }

    #[test]
    fn test_total_matches_rect_areas() {
        let bbox = BoundingBox::new(2.2, 2.5, 48.95, 48.8);
        let projected = WebMercator.project_box(&bbox).unwrap();

        let plan = grid().plan(&projected, ZoomRange::new(8, 14));

        let mut total = 0;
        for (_, rect) in plan.levels() {
            assert!(rect.min_x <= rect.max_x);
            assert!(rect.min_y <= rect.max_y);
            assert_eq!(rect.count(), u64::from(rect.width()) * u64::from(rect.height()));
            assert_eq!(rect.count(), rect.tiles(0).count() as u64);
            total += (u64::from(rect.max_x) - u64::from(rect.min_x) + 1) * (u64::from(rect.max_y) - u64::from(rect.min_y) + 1);
        }

        assert_eq!(plan.total(), total);
        assert_eq!(plan.levels().count(), 7);
    }

    #[test]
    fn test_deepest_level() {
        let bbox = BoundingBox::new(2.30, 2.31, 48.86, 48.85);
        let projected = WebMercator.project_box(&bbox).unwrap();

        let plan = grid().plan(&projected, ZoomRange::new(MAX_ZOOM, u8::MAX));

        assert_eq!(plan.levels().count(), 1);

        // about 0.01 / 360 of the 2^31 columns
        let rect = plan.get(MAX_ZOOM).unwrap();
        assert!((59_000..60_500).contains(&rect.width()), "{rect:?}");
        assert!(rect.max_x < u32::MAX && rect.max_y < u32::MAX, "{rect:?}");
        assert!(plan.get(MAX_ZOOM + 1).is_none());
    }

    #[test]
    fn test_whole_world_up_to_deepest_level() {
        let bbox = BoundingBox::new(-179.9, 179.9, 85.0, -85.0);
        let projected = WebMercator.project_box(&bbox).unwrap();

        let plan = grid().plan(&projected, ZoomRange::new(0, u8::MAX));

        assert_eq!(plan.levels().count(), usize::from(MAX_ZOOM) + 1);

        let deepest = plan.get(MAX_ZOOM).unwrap();
        assert!(deepest.max_x < 1 << MAX_ZOOM && deepest.max_y < 1 << MAX_ZOOM, "{deepest:?}");

        let total = plan.levels().fold(0u64, |total, (_, rect)| total.checked_add(rect.count()).unwrap());
        assert_eq!(plan.total(), total);
    }

    #[test]
    fn test_inverted_box_is_empty() {
        let bbox = ProjectedBox {
            left: 1_000.0,
            right: -1_000_000.0,
            top: 1_000_000.0,
            bottom: -1_000_000.0,
        };

        let rect = grid().rect(&bbox, 10);

        assert_eq!(rect.count(), 0);
        assert_eq!(rect.tiles(10).count(), 0);
    }

    #[test]
    fn test_empty_zoom_range() {
        let plan = grid().plan(&single_tile_box(), ZoomRange::new(6, 5));

        assert!(plan.is_empty());
        assert_eq!(plan.total(), 0);
    }
}
