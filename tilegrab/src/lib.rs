//! A simple crate to download raster map tiles.
//!
//! A robust and efficient crate providing features dedicated to:
//! - projecting a geographic bounding box and planning the tiles covering it over a range of zoom levels,
//! - resolving tile URLs for several public tile providers, spreading requests over their mirror hosts,
//! - downloading tens of thousands of tiles with a fixed-size pool of workers and a bounded retry policy,
//! - stitching the tiles of each level into a single mosaic.
//!
//! Concurrency is kept simple: a fixed number of workers drains a bounded queue of tile jobs, so that submitting
//! jobs suspends when the queue is full. The only state mutated by several workers at once is the batch accounting
//! (an atomic completion counter, the list of skipped tiles behind a `Mutex`) and the progress reporter. Everything
//! else is shared read-only through `Arc`s.
//!
//! As a **strong hypothesis**, we can assume that:
//! - every tile is downloaded to its own file, so that no two workers ever write to the same path;
//! - a tile which cannot be downloaded is not worth aborting the whole batch, it is just skipped and reported.
//!
//! Here is the layout of the local storage:
//!
//! ```text
//!     - root local storage
//!       L {provider}
//!         L {z}
//!           L {x}
//!             L {y}.jpg
//!         L level_{z}.jpg
//! ```
//!
//! Downloaded tiles are never deduplicated: running a batch twice downloads every tile twice.

mod error;
pub use error::Error;

pub mod combine;
pub mod coord;
pub mod fetch;
pub mod grid;
pub mod layout;
pub mod progress;
pub mod projection;
pub mod provider;
pub mod scheduler;
pub mod task;
pub mod umask;

pub use coord::{BoundingBox, ProjectedBox, TileCoord, ZoomRange};
pub use grid::{GridPlan, TileGrid, TileRect};
pub use layout::TileLayout;
pub use provider::{Provider, Style};
pub use scheduler::{Report, Scheduler, SchedulerConfig};
