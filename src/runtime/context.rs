//! Thread-local runtime context.
//!
//! Worker threads enter a context around their loop so code running inside a
//! task can reach the executor it is already running on. This is what lets
//! [`spawn`](crate::spawn) work without an explicit handle, and what makes an
//! inner task inherit the outer task's executor. The core APIs never depend
//! on it; it is convenience, set up by the bootstrap path only.

use std::cell::RefCell;
use std::sync::Arc;

use crate::runtime::queue::TaskQueue;

thread_local! {
    /// Submit capability of the executor driving the current thread.
    static CURRENT_QUEUE: RefCell<Option<Arc<TaskQueue>>> = const { RefCell::new(None) };
}

/// Runs `function` with `queue` installed as the current executor queue,
/// restoring the previous context on exit.
pub(crate) fn enter<F, R>(queue: Arc<TaskQueue>, function: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_QUEUE.with(|current| {
        let previous = current.borrow_mut().replace(queue);
        let result = function();
        *current.borrow_mut() = previous;
        result
    })
}

/// The current executor queue, if this thread is a worker.
pub(crate) fn current_queue() -> Option<Arc<TaskQueue>> {
    CURRENT_QUEUE.with(|current| current.borrow().clone())
}
