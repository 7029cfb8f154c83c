//! This module provides the fixed-size worker pool running tile jobs.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{self, Future, FutureExt};
use tokio::sync::{mpsc, Mutex};

type Job = future::BoxFuture<'static, ()>;

/// A fixed-size pool of workers draining a bounded job queue in the background.
///
/// # Backpressure
/// Submitting a job through [`Pool::submit()`] waits for a free slot when the queue is full.
///
/// # Panics isolation
/// A panicking job is caught and logged by its worker, which then keeps serving the next jobs.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use tilegrab::task::Pool;
/// let mut pool = Pool::default();
/// pool.start(3.try_into().unwrap(), 16.try_into().unwrap());
///
/// for i in 0..=5 {
///     pool.submit(async move { println!("Hello from job #{i}!") }).await;
/// }
///
/// pool.close().await;
/// # })
/// ```
/// ```text
/// Hello from job #0!
/// Hello from job #1!
/// Hello from job #2!
/// Hello from job #3!
/// Hello from job #4!
/// Hello from job #5!
/// ```
#[derive(Debug, Default)]
pub struct Pool {
    /// The pool of workers.
    workers: Vec<Worker>,
    /// The sending part of a bounded channel to push jobs to the workers.
    ///
    /// The next available worker will wait for a job to be received through the channel.
    sender: Option<mpsc::Sender<Job>>,
}

impl Pool {
    /// Start a pool with `size` workers and room for `capacity` pending jobs.
    ///
    /// # Panics
    /// This method panics if the pool is already running, ie. when called more than once without stopping the pool in between.
    pub fn start(&mut self, size: NonZeroUsize, capacity: NonZeroUsize) {
        assert!(self.sender.is_none() && self.workers.is_empty());

        let (sender, receiver) = mpsc::channel(capacity.get());

        let receiver = Arc::new(Mutex::new(receiver));

        static WORKER_ID: AtomicUsize = AtomicUsize::new(0);
        let size = size.get();
        let id = WORKER_ID.fetch_add(size, Ordering::Relaxed);

        self.workers = (0..size).map(|i| Worker::new(id.wrapping_add(i), Arc::clone(&receiver))).collect();
        self.sender = Some(sender);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, waiting for a free slot if the queue is full.
    ///
    /// Return `false` when the job has been refused because the pool is not running, in which case it is dropped without executing anything.
    pub async fn submit(&self, future: impl Future<Output = ()> + Send + 'static) -> bool {
        match self.sender {
            Some(ref sender) => sender.send(future.boxed()).await.is_ok(),
            None => false,
        }
    }

    /// Stop current pool of workers, waiting for all pending jobs to complete.
    ///
    /// Once stopped, the pool can be started again with any number of workers.
    pub async fn stop(&mut self) {
        drop(self.sender.take());
        let workers = std::mem::take(&mut self.workers);

        future::join_all(workers.into_iter().inspect(|worker| {
            tracing::debug!("Stopping worker {}...", worker.id);
        }))
        .await;
    }

    /// Close current pool of workers, waiting for all pending jobs to complete.
    ///
    /// Once closed, the pool cannot be used since it is consumed.
    pub async fn close(mut self) {
        self.stop().await
    }
}

/// Best effort description of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) -> Worker {
        tracing::debug!("Starting worker {id}...");

        Worker {
            id,
            handle: tokio::spawn(async move {
                loop {
                    let message = receiver.lock().await.recv().await;

                    match message {
                        Some(job) => {
                            tracing::trace!("Executing job on worker {id}...");

                            if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                                tracing::error!("Job panicked on worker {id}: {}", panic_message(panic.as_ref()));
                            }
                        }
                        None => {
                            tracing::debug!("All jobs exhausted, shutting down worker {id}.");
                            break;
                        }
                    }
                }
            }),
        }
    }
}

impl Future for Worker {
    type Output = Result<(), tokio::task::JoinError>;

    #[inline]
    fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        self.handle.poll_unpin(cx)
    }
}
