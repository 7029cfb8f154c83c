use thiserror::Error;
use tokio::io;

use crate::projection::ProjectionError;

/// Crate-wide error.
///
/// Per-tile failures (`Reqwest`, `Io`, `Status`, `Panicked`) never escape a batch: they are folded into a skipped tile by the scheduler.
/// The other variants are startup or combine failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error("unexpected HTTP status {status} for `{url}`")]
    Status { status: reqwest::StatusCode, url: String },
    #[error("unknown tile provider `{0}`")]
    UnknownProvider(String),
    #[error("worker pool is closed")]
    PoolClosed,
    #[error("tile task panicked: {0}")]
    Panicked(String),
    #[error("no tile could be read for level {0}")]
    NoTiles(u8),
    #[error("mosaic of level {zoom} would be {width}x{height} pixels, too large to be saved")]
    MosaicTooLarge { zoom: u8, width: u64, height: u64 },
}
