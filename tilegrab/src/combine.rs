//! Per-level mosaic assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, ImageFormat, ImageReader, RgbImage};

use crate::grid::{GridPlan, TileRect};
use crate::layout::TileLayout;
use crate::Error;

/// Largest mosaic edge, in pixels, a JPEG file can hold.
pub const MAX_MOSAIC_EDGE: u64 = 65_535;

/// Assemble the downloaded tiles of a level into a single image.
pub trait Combiner: Send + Sync + 'static {
    /// Combine the tiles of `rect` at zoom `z` and return the path of the produced image.
    fn combine(&self, rect: &TileRect, z: u8, layout: &TileLayout) -> Result<PathBuf, Error>;
}

/// Stitch tiles side by side into a JPEG mosaic, leaving missing tiles black.
///
/// The tile size is taken from the first readable tile of the level.
#[derive(Debug, Default, Clone, Copy)]
pub struct MosaicCombiner;

impl MosaicCombiner {
    fn read_tile(path: &Path) -> Result<RgbImage, Error> {
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8())
    }
}

impl Combiner for MosaicCombiner {
    fn combine(&self, rect: &TileRect, z: u8, layout: &TileLayout) -> Result<PathBuf, Error> {
        let mut canvas: Option<(RgbImage, u32, u32)> = None;

        for coord in rect.tiles(z) {
            let path = layout.tile_path(coord);

            let tile = match Self::read_tile(&path) {
                Ok(tile) => tile,
                Err(err) => {
                    tracing::trace!("Leaving tile {coord} out of level {z}: {err}");
                    continue;
                }
            };

            if canvas.is_none() {
                let (tile_width, tile_height) = tile.dimensions();
                let width = u64::from(rect.width()) * u64::from(tile_width);
                let height = u64::from(rect.height()) * u64::from(tile_height);

                if width > MAX_MOSAIC_EDGE || height > MAX_MOSAIC_EDGE {
                    return Err(Error::MosaicTooLarge { zoom: z, width, height });
                }

                tracing::debug!("Combining level {z} into a {width}x{height} mosaic");

                canvas = Some((RgbImage::new(width as u32, height as u32), tile_width, tile_height));
            }

            if let Some((ref mut image, tile_width, tile_height)) = canvas {
                let x = i64::from(coord.x - rect.min_x) * i64::from(tile_width);
                let y = i64::from(coord.y - rect.min_y) * i64::from(tile_height);

                imageops::replace(image, &tile, x, y);
            }
        }

        let (image, ..) = canvas.ok_or(Error::NoTiles(z))?;

        let path = layout.level_path(z);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image.save_with_format(&path, ImageFormat::Jpeg)?;

        Ok(path)
    }
}

/// Combine every level of `plan` in turn, on the blocking thread pool.
///
/// A level failing to combine is logged and does not prevent the other levels from being combined.
/// Return the paths of the mosaics produced.
pub async fn combine_levels<C: Combiner>(combiner: Arc<C>, plan: &GridPlan, layout: &TileLayout) -> Vec<PathBuf> {
    let mut combined = Vec::new();

    for (z, rect) in plan.levels() {
        let combiner = Arc::clone(&combiner);
        let layout = layout.clone();
        let rect = *rect;

        let result = match tokio::task::spawn_blocking(move || combiner.combine(&rect, z, &layout)).await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(path) => {
                tracing::info!("Combined level {z} into `{}`", path.display());
                combined.push(path);
            }
            Err(err) => tracing::error!("Failed to combine level {z}: {err}"),
        }
    }

    combined
}
