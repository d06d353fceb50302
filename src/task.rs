//! Spawned tasks and join handles.
//!
//! A [`Task`] is the unit of suspendable computation: a boxed future (the
//! frame, owning all local state live across suspension points), a result
//! slot filled exactly once, and a single continuation slot holding the waker
//! of whoever awaited it. The task also carries a non-owning submit
//! capability into its executor's queue; waking the task pushes it back onto
//! that queue, so resumption always happens on a worker thread.
//!
//! Completion (a value, or a panic captured from the body) stores into the
//! result slot, then wakes the continuation if one was registered. Awaiting
//! the [`JoinHandle`] either reads an already-stored result immediately or
//! parks the caller's waker in the continuation slot. The handle is consumed
//! by `.await`, so a task has at most one consumer by construction.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread;

use crate::error::JoinError;
use crate::runtime::waker::make_waker;
use crate::runtime::{context, Job, TaskQueue};

pub(crate) struct Task<T: Send + 'static> {
    /// The frame. Taken out while polling, put back while suspended, dropped
    /// on completion.
    future: Mutex<Option<Pin<Box<dyn Future<Output = T> + Send>>>>,
    /// Written exactly once, by the completing poll.
    result: Mutex<Option<thread::Result<T>>>,
    completed: AtomicBool,
    /// Waker of the single awaiter, resumed once on completion.
    continuation: Mutex<Option<std::task::Waker>>,
    /// Submit capability into the owning executor.
    queue: Arc<TaskQueue>,
}

impl<T: Send + 'static> Task<T> {
    fn new<F>(future: F, queue: Arc<TaskQueue>) -> Arc<Self>
    where
        F: Future<Output = T> + Send + 'static,
    {
        Arc::new(Self {
            future: Mutex::new(Some(Box::pin(future))),
            result: Mutex::new(None),
            completed: AtomicBool::new(false),
            continuation: Mutex::new(None),
            queue,
        })
    }

    /// Resumes the task: polls the frame once with this task's waker.
    ///
    /// A panic escaping the body is captured and becomes the failure result;
    /// it is surfaced at the awaiter, not on the worker.
    pub(crate) fn run(self: Arc<Self>) {
        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut frame = self.future.lock().unwrap();
        let Some(mut future) = frame.take() else {
            // Woken after completion; nothing left to resume.
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => {
                *frame = Some(future);
            }
            Ok(Poll::Ready(value)) => {
                drop(frame);
                self.complete(Ok(value));
            }
            Err(payload) => {
                drop(frame);
                self.complete(Err(payload));
            }
        }
    }

    fn complete(&self, outcome: thread::Result<T>) {
        *self.result.lock().unwrap() = Some(outcome);
        self.completed.store(true, Ordering::Release);

        // Wake outside the lock: the continuation submits to the executor.
        let continuation = self.continuation.lock().unwrap().take();
        if let Some(waker) = continuation {
            waker.wake();
        }
    }

    /// Pushes the task back onto its executor queue for one resumption.
    pub(crate) fn resubmit(self: Arc<Self>) {
        let queue = self.queue.clone();
        let job: Job = Box::new(move || self.run());
        if let Err(error) = queue.push(job) {
            log::debug!("task: resumption dropped, {error}");
        }
    }
}

/// Creates a task for `future`, submits it for its first resumption, and
/// returns the handle.
pub(crate) fn schedule<F>(future: F, queue: Arc<TaskQueue>) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = Task::new(future, queue.clone());
    let scheduled = task.clone();
    queue
        .push(Box::new(move || scheduled.run()))
        .expect("spawn on a stopped executor");

    JoinHandle { task }
}

/// Spawns a new task on the executor driving the current thread.
///
/// Only usable from inside a running task (worker threads enter the runtime
/// context). Top-level tasks go through [`Reactor::spawn`](crate::Reactor::spawn)
/// or [`Executor::spawn`](crate::Executor::spawn) instead.
///
/// # Panics
/// Panics when called outside of a runtime context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let queue = context::current_queue().expect("spawn() called outside of a runtime context");
    schedule(future, queue)
}

/// Handle to a spawned task, resolving to its result.
///
/// Awaiting the handle yields `Ok(value)` once the task returns, or
/// `Err(JoinError)` if its body panicked. The result is handed out once;
/// polling the handle again after `Ready` resolves to a [`JoinError`]
/// reporting the misuse. Dropping the handle detaches the task; it keeps
/// running to completion.
pub struct JoinHandle<T: Send + 'static> {
    task: Arc<Task<T>>,
}

impl<T: Send + 'static> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.task.completed.load(Ordering::Acquire) {
            let mut continuation = self.task.continuation.lock().unwrap();
            // Re-check under the lock: completion flips the flag before it
            // takes the continuation, so either we see it completed here or
            // the waker we store is guaranteed to be woken.
            if !self.task.completed.load(Ordering::Acquire) {
                *continuation = Some(cx.waker().clone());
                return Poll::Pending;
            }
        }

        match self.task.result.lock().unwrap().take() {
            Some(outcome) => Poll::Ready(outcome.map_err(JoinError::panicked)),
            // Completed but the slot is empty: the result was already handed
            // out by an earlier poll. Surface the misuse instead of blowing
            // up the polling thread.
            None => Poll::Ready(Err(JoinError::already_joined())),
        }
    }
}
