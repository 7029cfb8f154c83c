//! Batch download scheduling.
//!
//! The scheduler walks a [`GridPlan`] level by level, turns every tile into a [`DownloadTask`] and hands it to a fixed-size
//! worker [`Pool`]. Every task reaches a terminal state, saved or skipped, and signals its completion exactly once whatever
//! happened to it, panics included. [`Scheduler::run()`] only returns once all dispatched tasks have signaled.
//!
//! Submission is throttled coarsely, per zoom level: every `levels_per_pause`-th level waits `pause` before being dispatched.
//! This bounds how fast new levels are opened, not how many requests are in flight, which only depends on the pool size.

use std::num::{NonZeroU32, NonZeroUsize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;

use crate::coord::TileCoord;
use crate::fetch::{fetch_and_save, Fetch, FetchOutcome};
use crate::grid::{GridPlan, TileRect};
use crate::layout::TileLayout;
use crate::progress::Progress;
use crate::provider::{Provider, Style};
use crate::task::{panic_message, Pool};
use crate::Error;

/// Scheduler settings, shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of concurrent workers, ie. the bound on in-flight requests.
    pub workers: NonZeroUsize,
    /// Number of zoom levels between two pauses.
    pub levels_per_pause: NonZeroU32,
    pub pause: Duration,
    /// Retries allowed per tile after a failed first attempt.
    pub max_retries: u32,
    /// Number of tasks waiting for a worker before submission blocks.
    pub queue_capacity: NonZeroUsize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: NonZeroUsize::new(16).unwrap(),
            levels_per_pause: NonZeroU32::new(10).unwrap(),
            pause: Duration::from_secs(1),
            max_retries: 3,
            queue_capacity: NonZeroUsize::new(1_024).unwrap(),
        }
    }
}

impl SchedulerConfig {
    #[inline]
    pub fn with_workers(self, workers: NonZeroUsize) -> Self {
        Self { workers, ..self }
    }

    #[inline]
    pub fn with_levels_per_pause(self, levels_per_pause: NonZeroU32) -> Self {
        Self { levels_per_pause, ..self }
    }

    #[inline]
    pub fn with_pause(self, pause: Duration) -> Self {
        Self { pause, ..self }
    }

    #[inline]
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self { max_retries, ..self }
    }

    #[inline]
    pub fn with_queue_capacity(self, queue_capacity: NonZeroUsize) -> Self {
        Self { queue_capacity, ..self }
    }
}

/// A single tile to download, owned by the worker executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub coord: TileCoord,
    pub url: String,
    pub path: PathBuf,
}

impl DownloadTask {
    pub fn new(coord: TileCoord, provider: Provider, style: Style, layout: &TileLayout) -> Self {
        Self {
            coord,
            url: provider.resolve(style, coord),
            path: layout.tile_path(coord),
        }
    }

    /// Every task of the level `z` covered by `rect`.
    pub fn level<'a>(rect: &TileRect, z: u8, provider: Provider, style: Style, layout: &'a TileLayout) -> impl Iterator<Item = Self> + 'a {
        rect.tiles(z).map(move |coord| Self::new(coord, provider, style, layout))
    }
}

/// A tile given up after exhausting its attempts.
#[derive(Debug)]
pub struct SkippedTile {
    pub coord: TileCoord,
    /// Zero when the count is unknown, ie. the download panicked or was never started.
    pub attempts: u32,
    pub error: Error,
}

/// Batch summary.
#[derive(Debug, Default)]
pub struct Report {
    /// Number of tiles planned.
    pub total: u64,
    pub saved: u64,
    pub skipped: Vec<SkippedTile>,
}

impl Report {
    /// Number of tiles which reached a terminal state.
    #[inline]
    pub fn completed(&self) -> u64 {
        self.saved + self.skipped.len() as u64
    }
}

/// Completion barrier: counts terminal tasks and wakes up the waiter once all expected tasks are done.
#[derive(Debug, Default)]
struct Completion {
    done: AtomicU64,
    notify: Notify,
}

impl Completion {
    fn signal(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    #[inline]
    fn done(&self) -> u64 {
        self.done.load(Ordering::Acquire)
    }

    async fn wait(&self, expected: u64) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            // register before checking so that a signal in between is not missed
            notified.as_mut().enable();

            if self.done() >= expected {
                return;
            }

            notified.await;
        }
    }
}

/// State shared by the jobs of a batch.
#[derive(Debug, Default)]
struct Batch {
    completion: Completion,
    saved: AtomicU64,
    skipped: Mutex<Vec<SkippedTile>>,
}

impl Batch {
    fn record(&self, coord: TileCoord, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Saved { .. } => {
                self.saved.fetch_add(1, Ordering::Relaxed);
            }
            FetchOutcome::Exhausted { attempts, error } => {
                self.skipped.lock().unwrap().push(SkippedTile { coord, attempts, error });
            }
        }
    }

    fn report(&self, total: u64) -> Report {
        let mut skipped = std::mem::take(&mut *self.skipped.lock().unwrap());
        skipped.sort_unstable_by_key(|tile| tile.coord);

        Report {
            total,
            saved: self.saved.load(Ordering::Acquire),
            skipped,
        }
    }
}

/// Tile download scheduler.
#[derive(Debug)]
pub struct Scheduler<F> {
    fetcher: Arc<F>,
    config: Arc<SchedulerConfig>,
}

impl<F: Fetch> Scheduler<F> {
    pub fn new(fetcher: F, config: SchedulerConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Download every tile of `plan` and wait for all of them to reach a terminal state.
    ///
    /// Tiles failing all their attempts are skipped: they are listed in the returned [`Report`] and still tick `progress`.
    pub async fn run(&self, plan: &GridPlan, provider: Provider, style: Style, layout: &TileLayout, progress: Arc<dyn Progress>) -> Report {
        let total = plan.total();
        progress.set_total(total);

        tracing::info!("Downloading {total} tile(s) from {provider} over {} level(s)", plan.levels().count());

        let mut pool = Pool::default();
        pool.start(self.config.workers, self.config.queue_capacity);

        let batch = Arc::new(Batch::default());
        let mut dispatched = 0;

        for (iteration, (z, rect)) in (1u64..).zip(plan.levels()) {
            if iteration % u64::from(self.config.levels_per_pause.get()) == 0 {
                tracing::debug!("Pausing for {:?} before level {z}", self.config.pause);

                tokio::time::sleep(self.config.pause).await;
            }

            tracing::debug!("Dispatching {} tile(s) of level {z}", rect.count());

            for task in DownloadTask::level(rect, z, provider, style, layout) {
                let coord = task.coord;
                let job = Self::execute(Arc::clone(&self.fetcher), self.config.max_retries, task, Arc::clone(&batch), Arc::clone(&progress));

                dispatched += 1;

                if !pool.submit(job).await {
                    tracing::error!("Worker pool refused tile {coord}");

                    batch.record(coord, FetchOutcome::Exhausted { attempts: 0, error: Error::PoolClosed });
                    progress.tick();
                    batch.completion.signal();
                }
            }
        }

        batch.completion.wait(dispatched).await;

        debug_assert_eq!(batch.completion.done(), dispatched);

        pool.close().await;
        progress.finish();

        let report = batch.report(total);

        tracing::info!("Downloaded {} tile(s), skipped {}", report.saved, report.skipped.len());

        report
    }

    /// Run `task` to a terminal state, then signal its completion whatever the outcome.
    async fn execute(fetcher: Arc<F>, max_retries: u32, task: DownloadTask, batch: Arc<Batch>, progress: Arc<dyn Progress>) {
        let DownloadTask { coord, url, path } = task;

        let outcome = AssertUnwindSafe(fetch_and_save(fetcher.as_ref(), &url, &path, max_retries))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let error = Error::Panicked(panic_message(panic.as_ref()));

                tracing::error!("Tile {coord} aborted: {error}");

                // the attempts made before the panic are unknown
                FetchOutcome::Exhausted { attempts: 0, error }
            });

        batch.record(coord, outcome);
        progress.tick();
        batch.completion.signal();
    }
}
