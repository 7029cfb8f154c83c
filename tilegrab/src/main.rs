//! tilegrab - download the map tiles covering a bounding box.

use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tilegrab::combine::{combine_levels, MosaicCombiner};
use tilegrab::coord::MAX_ZOOM;
use tilegrab::fetch::HttpFetcher;
use tilegrab::progress::{NoProgress, Progress, ProgressBar};
use tilegrab::projection::{Projector, WebMercator};
use tilegrab::umask::UmaskGuard;
use tilegrab::{BoundingBox, Error, Provider, Scheduler, SchedulerConfig, Style, TileGrid, TileLayout, ZoomRange};

#[derive(Debug, Parser)]
#[command(name = "tilegrab", version)]
#[command(about = "Download the map tiles covering a bounding box over a range of zoom levels", long_about = None)]
struct Args {
    /// Western longitude of the bounding box, in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    west: f64,

    /// Eastern longitude of the bounding box, in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    east: f64,

    /// Northern latitude of the bounding box, in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    north: f64,

    /// Southern latitude of the bounding box, in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    south: f64,

    /// Lowest zoom level to download
    #[arg(long, value_parser = clap::value_parser!(u8).range(..=i64::from(MAX_ZOOM)))]
    min_zoom: u8,

    /// Highest zoom level to download, at most 31
    #[arg(long, value_parser = clap::value_parser!(u8).range(..=i64::from(MAX_ZOOM)))]
    max_zoom: u8,

    /// Tile provider: GoogleSatellite, GoogleImage, GoogleTerrain, AMapSatellite, AMapCover, AMapImage or YMapImage
    #[arg(long, default_value = "GoogleSatellite")]
    provider: Provider,

    /// Keep labels on the tiles (Google providers only)
    #[arg(long)]
    with_labels: bool,

    /// Number of concurrent downloads
    #[arg(long, default_value = "16")]
    workers: NonZeroUsize,

    /// Number of zoom levels dispatched between two one-second pauses
    #[arg(long, default_value = "10")]
    qps: NonZeroU32,

    /// Retries per tile after a failed first attempt
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Number of tiles waiting for a worker before dispatch blocks
    #[arg(long, default_value = "1024")]
    queue_capacity: NonZeroUsize,

    /// Root directory of the downloaded tiles
    #[arg(long, default_value = "tiles")]
    output: PathBuf,

    /// Stitch the tiles of every level into a single image once downloaded
    #[arg(long)]
    combine: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    quiet: bool,
}

impl Args {
    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_workers(self.workers)
            .with_levels_per_pause(self.qps)
            .with_max_retries(self.max_retries)
            .with_queue_capacity(self.queue_capacity)
    }
}

/// Log to stderr, filtered by `RUST_LOG` and defaulting to `info`.
///
/// Log lines are written around `bar`, if any.
fn init_logging(bar: Option<&ProgressBar>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match bar {
        Some(bar) => BoxMakeWriter::new(bar.writer()),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();
}

async fn run(args: Args, progress: Arc<dyn Progress>) -> Result<(), Error> {
    // permissive tile files and directories for the whole run
    let _umask = UmaskGuard::set(0);

    tracing::debug!("Starting with {args:?}");

    let bbox = BoundingBox::new(args.west, args.east, args.north, args.south);
    if bbox.west >= bbox.east || bbox.south >= bbox.north {
        tracing::warn!("Bounding box {bbox:?} is inverted, some levels may plan no tile");
    }

    let projected = WebMercator.project_box(&bbox)?;
    let plan = TileGrid::for_projector(&WebMercator).plan(&projected, ZoomRange::new(args.min_zoom, args.max_zoom));

    for (z, rect) in plan.levels() {
        tracing::debug!("Level {z}: x {}..={}, y {}..={}, {} tile(s)", rect.min_x, rect.max_x, rect.min_y, rect.max_y, rect.count());
    }

    let layout = TileLayout::new(args.output.clone(), args.provider);
    let style = Style {
        with_labels: args.with_labels,
    };
    let scheduler = Scheduler::new(HttpFetcher::new()?, args.scheduler_config());

    let report = scheduler.run(&plan, args.provider, style, &layout, progress).await;

    for tile in &report.skipped {
        tracing::warn!("Skipped tile {} after {} attempt(s): {}", tile.coord, tile.attempts, tile.error);
    }
    tracing::info!(
        "{} of {} tile(s) saved under `{}`, {} skipped",
        report.saved,
        report.total,
        layout.provider_dir().display(),
        report.skipped.len()
    );

    if args.combine {
        let combined = combine_levels(Arc::new(MosaicCombiner), &plan, &layout).await;

        tracing::info!("Combined {} of {} level(s)", combined.len(), plan.levels().count());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let bar = (!args.quiet).then(|| ProgressBar::new("Downloading"));
    init_logging(bar.as_ref());

    let progress: Arc<dyn Progress> = match bar {
        Some(bar) => Arc::new(bar),
        None => Arc::new(NoProgress),
    };

    match run(args, progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
