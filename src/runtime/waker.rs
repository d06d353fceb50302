//! Waker integration: waking a task re-submits it to its executor queue.
//!
//! This is the only bridge between the standard task-waking protocol and the
//! worker pool. The reactor, a completed inner task, or any other event
//! source holds a [`Waker`]; invoking it pushes the owning task back onto the
//! queue, where a worker picks it up and resumes it. One wake therefore is
//! exactly one submission.

use std::sync::Arc;
use std::task::{Wake, Waker};

use crate::task::Task;

impl<T: Send + 'static> Wake for Task<T> {
    fn wake(self: Arc<Self>) {
        self.resubmit();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().resubmit();
    }
}

/// Builds the [`Waker`] handed to a task's future while it is being polled.
pub(crate) fn make_waker<T: Send + 'static>(task: Arc<Task<T>>) -> Waker {
    Waker::from(task)
}
