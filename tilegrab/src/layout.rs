use std::path::{Path, PathBuf};

use crate::coord::TileCoord;
use crate::provider::Provider;

const TILE_EXT: &str = "jpg";

/// On-disk layout of downloaded tiles and combined levels.
///
/// ```text
///     - root
///       L {provider}
///         L {z}
///           L {x}
///             L {y}.jpg
///         L level_{z}.jpg
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    root: PathBuf,
    provider: Provider,
}

impl TileLayout {
    pub fn new(root: impl Into<PathBuf>, provider: Provider) -> Self {
        Self {
            root: root.into(),
            provider,
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    #[inline]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Directory holding every file of the provider.
    pub fn provider_dir(&self) -> PathBuf {
        self.root.join(self.provider.name())
    }

    pub fn tile_path(&self, coord: TileCoord) -> PathBuf {
        let mut path = self.provider_dir();
        path.push(coord.z.to_string());
        path.push(coord.x.to_string());
        path.push(coord.y.to_string());
        path.set_extension(TILE_EXT);
        path
    }

    /// Path of the mosaic combining all tiles of level `z`.
    pub fn level_path(&self, z: u8) -> PathBuf {
        self.provider_dir().join(format!("level_{z}.{TILE_EXT}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_path() {
        let layout = TileLayout::new("a/b", Provider::AMapSatellite);
        let path = layout.tile_path(TileCoord::new(12, 34, 5));

        assert!(
            path.iter().eq(["a", "b", "AMapSatellite", "5", "12", "34.jpg"]),
            "'{}' didn't match expected path",
            path.display()
        );
    }

    #[test]
    fn test_level_path() {
        let layout = TileLayout::new("a", Provider::GoogleImage);
        let path = layout.level_path(7);

        assert!(
            path.iter().eq(["a", "GoogleImage", "level_7.jpg"]),
            "'{}' didn't match expected path",
            path.display()
        );
    }
}
