//! Shared FIFO of ready work items.
//!
//! The queue is the single hand-off point between everything that produces
//! ready work (spawns, task wakers, the reactor) and the worker threads that
//! consume it. Items are opaque zero-argument callables, so the queue stays
//! agnostic of what a task is.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::Error;

/// A ready work item: run once, on whichever worker pops it.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread-safe FIFO with a condition variable for sleeping workers.
///
/// Invariants: workers sleep on the condition only while the queue is empty
/// and the queue has not been shut down; they exit only once it is shut down
/// *and* drained. Pushes after shutdown are rejected.
pub(crate) struct TaskQueue {
    jobs: Mutex<VecDeque<Job>>,
    ready: Condvar,
    /// Workers currently blocked in [`next`](Self::next).
    waiting: AtomicUsize,
    shutdown: AtomicBool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            waiting: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Enqueues a job, waking one sleeping worker if any.
    ///
    /// # Errors
    /// [`Error::InvalidUsage`] once the owning executor has been stopped.
    pub(crate) fn push(&self, job: Job) -> Result<(), Error> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::InvalidUsage("submit on a stopped executor"));
        }

        self.jobs.lock().unwrap().push_back(job);

        if self.waiting.load(Ordering::Relaxed) > 0 {
            self.ready.notify_one();
        }
        Ok(())
    }

    /// Blocks until a job is available or the queue is shut down and empty.
    ///
    /// `None` tells the calling worker to exit.
    pub(crate) fn next(&self) -> Option<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        loop {
            if let Some(job) = jobs.pop_front() {
                return Some(job);
            }
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }

            self.waiting.fetch_add(1, Ordering::Relaxed);
            jobs = self.ready.wait(jobs).unwrap();
            self.waiting.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Rejects further pushes and wakes every sleeping worker so it can
    /// drain the queue and exit.
    pub(crate) fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Drops whatever is still queued. Called after the workers have joined.
    pub(crate) fn discard_pending(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.is_empty() {
            log::debug!("queue: discarding {} unfinished job(s)", jobs.len());
            jobs.clear();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub(crate) fn waiting_workers(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }
}
