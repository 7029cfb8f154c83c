//! Download progress reporting.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::ProgressStyle;
use tracing_subscriber::fmt::MakeWriter;

/// A sink receiving one tick per tile reaching a terminal state, whether saved or skipped.
///
/// Implementors are shared by every worker and must be safe to tick concurrently.
pub trait Progress: Send + Sync {
    /// Set the number of tiles expected, before any tick.
    fn set_total(&self, total: u64);

    fn tick(&self);

    fn finish(&self) {}
}

/// Discard every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_total(&self, _total: u64) {}

    fn tick(&self) {}
}

/// A terminal progress bar.
pub struct ProgressBar {
    bar: indicatif::ProgressBar,
}

impl ProgressBar {
    pub fn new(message: &str) -> Self {
        let bar = indicatif::ProgressBar::new(0);
        bar.set_message(message.to_owned());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} ▕{wide_bar}▏ {pos}/{len} ({percent}%) {per_sec} {eta_precise}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        Self { bar }
    }

    /// A progress bar drawing nothing, for non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }

    /// A stderr writer clearing the bar while a log line is written, then redrawing it.
    pub fn writer(&self) -> SuspendingWriter {
        SuspendingWriter { bar: self.bar.clone() }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    #[inline]
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

/// Write to stderr without tearing the progress bar it was made from.
#[derive(Clone)]
pub struct SuspendingWriter {
    bar: indicatif::ProgressBar,
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.bar.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.bar.suspend(|| io::stderr().flush())
    }
}

impl<'a> MakeWriter<'a> for SuspendingWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Progress for ProgressBar {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.enable_steady_tick(Duration::from_millis(250));
    }

    #[inline]
    fn tick(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

/// Count ticks, mostly useful to check a batch accounting.
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicU64,
    ticks: AtomicU64,
}

impl Counter {
    #[inline]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}

impl Progress for Counter {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    #[inline]
    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_ticks() {
        let progress = ProgressBar::hidden();
        progress.set_total(10);

        for _ in 0..4 {
            progress.tick();
        }

        assert_eq!(progress.length(), Some(10));
        assert_eq!(progress.position(), 4);
    }

    #[test]
    fn test_log_through_bar() {
        let progress = ProgressBar::hidden();
        progress.set_total(3);
        progress.tick();

        let mut writer = progress.writer();
        writer.write_all(b"tile 1/2/3 skipped\n").unwrap();
        writer.flush().unwrap();

        let subscriber = tracing_subscriber::fmt().with_writer(progress.writer()).finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Giving up on tile 1/2/3");
            progress.tick();
        });

        assert_eq!(progress.position(), 2);
        assert_eq!(progress.length(), Some(3));
    }

    #[test]
    fn test_concurrent_ticks() {
        let counter = Counter::default();
        counter.set_total(8 * 250);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| (0..250).for_each(|_| counter.tick()));
            }
        });

        assert_eq!(counter.ticks(), counter.total());
    }
}
