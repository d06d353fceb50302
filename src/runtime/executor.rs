//! Fixed-size worker pool over the shared job queue.

use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{panic_message, Error};
use crate::runtime::{context, queue::TaskQueue};
use crate::task::{self, JoinHandle};

/// Worker count when the hardware parallelism cannot be detected.
const FALLBACK_THREADS: usize = 2;

/// A pool of worker threads consuming ready jobs from one shared FIFO.
///
/// The executor owns its threads and queue exclusively. Everything else holds
/// at most a submit capability into the queue. Jobs run to completion on one
/// worker; a job that panics is caught and logged, never allowed to take the
/// pool down.
pub struct Executor {
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    running: AtomicBool,
    threads: usize,
}

impl Executor {
    /// Creates a stopped executor sized to the detected hardware parallelism.
    pub fn new() -> Self {
        let threads = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(FALLBACK_THREADS);
        Self::with_threads(threads)
    }

    /// Creates a stopped executor with a fixed worker count.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            queue: Arc::new(TaskQueue::new()),
            workers: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            threads: threads.max(1),
        }
    }

    /// Spins up the workers. Idempotent on an already-running executor.
    pub fn run(&self) {
        if self.queue.is_shut_down() {
            log::warn!("executor: run() after stop() has no effect");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("executor: already running");
            return;
        }

        log::info!("executor: starting {} worker(s)", self.threads);
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..self.threads {
            let queue = self.queue.clone();
            workers.push(thread::spawn(move || worker_loop(queue)));
        }
    }

    /// Enqueues a ready work item, waking an idle worker if one is sleeping.
    ///
    /// # Errors
    /// [`Error::InvalidUsage`] after [`stop`](Self::stop).
    pub fn submit<F>(&self, job: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(job))
    }

    /// Schedules `future` as a new task on this executor.
    ///
    /// # Panics
    /// Panics if the executor has been stopped.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        task::schedule(future, self.queue.clone())
    }

    /// Stops the pool: queued jobs are finished, the workers joined, and any
    /// leftovers discarded. Idempotent; submissions afterwards are an error.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            log::debug!("executor: already stopped");
            return;
        }

        log::info!("executor: stopping");
        self.queue.shut_down();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            let _ = worker.join();
        }
        self.queue.discard_pending();
    }

    /// Crash-path stop: wakes the workers and detaches them without joining.
    /// The queue is left as-is. Normal shutdown goes through [`stop`](Self::stop).
    pub fn stop_hard(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        log::warn!("executor: hard stop, detaching workers");
        self.queue.shut_down();
        self.workers.lock().unwrap().clear();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of worker threads currently owned by the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Number of workers sleeping on the empty queue.
    pub fn waiting_workers(&self) -> usize {
        self.queue.waiting_workers()
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Per-worker loop: idle -> running-job -> idle, exiting once the queue is
/// shut down and drained.
fn worker_loop(queue: Arc<TaskQueue>) {
    context::enter(queue.clone(), || {
        while let Some(job) = queue.next() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                log::error!("executor: job panicked: {}", panic_message(payload.as_ref()));
            }
        }
        log::debug!("executor: worker exiting");
    });
}
