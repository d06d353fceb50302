//! Awaitable fd readiness.

use std::future::Future;
use std::io;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::reactor::Reactor;

/// Future returned by [`Reactor::await_fd`].
///
/// The first poll records the current task as the descriptor's waiter and
/// updates the poller mask, then suspends; the reactor resolves it when the
/// requested events arrive. The caller is expected to re-issue its
/// non-blocking syscall afterwards; readiness is a hint, not a guarantee.
#[must_use = "futures do nothing unless awaited"]
pub struct Readiness<'a> {
    reactor: &'a Reactor,
    fd: RawFd,
    mask: u32,
    registered: bool,
}

impl<'a> Readiness<'a> {
    pub(crate) fn new(reactor: &'a Reactor, fd: RawFd, mask: u32) -> Self {
        Self {
            reactor,
            fd,
            mask,
            registered: false,
        }
    }
}

impl Future for Readiness<'_> {
    type Output = io::Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.registered {
            // Re-polled after the reactor dispatched our wake.
            return Poll::Ready(Ok(()));
        }

        self.registered = true;
        match self.reactor.add_waiter(self.fd, self.mask, cx.waker().clone()) {
            Ok(()) => Poll::Pending,
            // Resolve with the failure rather than suspending with no waiter
            // registered; suspending here would strand the task forever.
            Err(error) => Poll::Ready(Err(error)),
        }
    }
}
