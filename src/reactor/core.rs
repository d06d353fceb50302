//! The reactor: one thread demultiplexing readiness events into executor
//! submissions.
//!
//! The reactor owns the poller and a map `fd -> Waiter`. A waiter is the
//! resumption capability of the one task suspended on that descriptor plus
//! the event mask it asked for. Exactly one thread runs [`Reactor::run`];
//! workers never touch the wait loop, and the loop never runs task code. It
//! only takes wakers out of the map and invokes them, which re-submits the
//! owning task to the executor.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

use crate::error::Error;
use crate::reactor::future::Readiness;
use crate::reactor::poller::{Poller, READABLE};
use crate::runtime::Executor;
use crate::task::JoinHandle;

/// Events handed out per wait-loop iteration.
const EVENTS_MAX: usize = 64;

/// The reactor's record for a watched descriptor.
///
/// The waker is taken on dispatch but the entry (and its mask) stays until
/// the descriptor is unregistered, so `current_mask` keeps answering between
/// a wake and the next registration.
struct Waiter {
    waker: Option<Waker>,
    mask: u32,
}

pub struct Reactor {
    poller: Poller,
    executor: Arc<Executor>,
    waiters: Mutex<HashMap<RawFd, Waiter>>,
    running: AtomicBool,
    /// eventfd used to nudge a blocked `epoll_wait` when `stop` is called.
    wake_fd: RawFd,
}

impl Reactor {
    /// Creates a reactor over `executor` and a fresh epoll instance.
    pub fn new(executor: Arc<Executor>) -> crate::Result<Self> {
        let poller = Poller::new().map_err(Error::Poller)?;

        let wake_fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if wake_fd < 0 {
            return Err(Error::Poller(io::Error::last_os_error()));
        }
        if let Err(error) = poller.add(wake_fd, READABLE) {
            unsafe { libc::close(wake_fd) };
            return Err(Error::Poller(error));
        }

        Ok(Self {
            poller,
            executor,
            waiters: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            wake_fd,
        })
    }

    /// Starts watching `fd` with `mask`. The waiter entry stays empty until a
    /// task suspends on the descriptor.
    pub fn register_fd(&self, fd: RawFd, mask: u32) -> crate::Result<()> {
        self.poller.add(fd, mask).map_err(Error::Poller)?;
        self.waiters
            .lock()
            .unwrap()
            .insert(fd, Waiter { waker: None, mask });
        log::trace!("reactor: fd {fd} registered, mask {mask:#x}");
        Ok(())
    }

    /// Stops watching `fd`, dropping any waiter. The reactor never closes the
    /// descriptor; that stays with its owner.
    pub fn unregister_fd(&self, fd: RawFd) {
        self.waiters.lock().unwrap().remove(&fd);
        if let Err(error) = self.poller.remove(fd) {
            log::warn!("reactor: failed to unregister fd {fd}: {error}");
        }
        log::trace!("reactor: fd {fd} unregistered");
    }

    /// Replaces the event mask watched on `fd`.
    pub fn modify_fd(&self, fd: RawFd, mask: u32) -> crate::Result<()> {
        self.poller.modify(fd, mask).map_err(Error::Poller)?;
        if let Some(waiter) = self.waiters.lock().unwrap().get_mut(&fd) {
            waiter.mask = mask;
        }
        log::trace!("reactor: fd {fd} modified, mask {mask:#x}");
        Ok(())
    }

    /// The event mask recorded on `fd`'s waiter, 0 when unknown. Sockets use
    /// this to OR additional events into an existing registration.
    pub fn current_mask(&self, fd: RawFd) -> u32 {
        self.waiters
            .lock()
            .unwrap()
            .get(&fd)
            .map(|waiter| waiter.mask)
            .unwrap_or(0)
    }

    /// Awaitable readiness: suspends the current task until `mask` events
    /// arrive on `fd`. At most one task may wait per descriptor; a second
    /// registration overwrites the first.
    pub fn await_fd(&self, fd: RawFd, mask: u32) -> Readiness<'_> {
        Readiness::new(self, fd, mask)
    }

    /// Spawns a top-level task on this reactor's executor.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.executor.spawn(future)
    }

    /// Drives the event loop on the calling thread, starting the executor
    /// first. Returns once [`stop`](Self::stop) is called, or with the error
    /// that killed the loop.
    pub fn run(&self) -> crate::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidUsage("reactor is already running"));
        }
        self.executor.run();
        log::info!("reactor: event loop started");

        let mut events = [libc::epoll_event { events: 0, u64: 0 }; EVENTS_MAX];

        while self.running.load(Ordering::Acquire) {
            let count = match self.poller.wait(&mut events, -1) {
                Ok(count) => count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    log::error!("reactor: wait failed: {error}");
                    self.running.store(false, Ordering::Release);
                    // A fatal wait error tears down the paired executor the
                    // same way stop() does; the workers must not outlive the
                    // loop that feeds them.
                    self.executor.stop();
                    return Err(Error::Poller(error));
                }
            };

            for event in &events[..count] {
                let fd = event.u64 as RawFd;
                if fd == self.wake_fd {
                    self.drain_wake();
                    continue;
                }

                // Take the waker under the lock, wake after unlocking: the
                // wake submits to the executor and must not hold the map.
                let waker = {
                    let mut waiters = self.waiters.lock().unwrap();
                    waiters.get_mut(&fd).and_then(|waiter| waiter.waker.take())
                };
                match waker {
                    Some(waker) => waker.wake(),
                    // No waiter: either a second event before the task
                    // re-registered, or a stray fd. Both are ignorable.
                    None => log::trace!("reactor: spurious event on fd {fd}"),
                }
            }
        }

        log::info!("reactor: event loop stopped");
        Ok(())
    }

    /// Stops the event loop and the executor. Safe to call from any thread
    /// except an executor worker (stopping the executor joins them).
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("reactor: stop requested");
        }
        self.notify();
        self.executor.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of descriptors currently registered.
    pub fn registered_fds(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    /// Number of registered descriptors with a task suspended on them.
    pub fn pending_waiters(&self) -> usize {
        self.waiters
            .lock()
            .unwrap()
            .values()
            .filter(|waiter| waiter.waker.is_some())
            .count()
    }

    /// Records `waker` as the waiter for `fd` and points the poller at
    /// `mask`. On poller failure the waiter is dropped so the task fails
    /// instead of hanging.
    pub(crate) fn add_waiter(&self, fd: RawFd, mask: u32, waker: Waker) -> io::Result<()> {
        let mut waiters = self.waiters.lock().unwrap();
        let waiter = waiters.entry(fd).or_insert(Waiter {
            waker: None,
            mask: 0,
        });
        waiter.waker = Some(waker);
        waiter.mask = mask;

        if let Err(error) = self.poller.modify(fd, mask) {
            log::warn!("reactor: failed to arm fd {fd}, dropping waiter: {error}");
            waiters.remove(&fd);
            return Err(error);
        }
        log::trace!("reactor: fd {fd} armed, mask {mask:#x}");
        Ok(())
    }

    /// Wakes a blocked `epoll_wait`. Coalesces: the eventfd counter makes
    /// repeated nudges before the loop drains them a single event.
    fn notify(&self) {
        let one: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.wake_fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let error = io::Error::last_os_error();
            // EAGAIN means the counter is saturated, so a nudge is pending.
            if error.raw_os_error() != Some(libc::EAGAIN) {
                log::warn!("reactor: failed to nudge event loop: {error}");
            }
        }
    }

    fn drain_wake(&self) {
        let mut counter: u64 = 0;
        unsafe {
            libc::read(
                self.wake_fd,
                &mut counter as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        unsafe { libc::close(self.wake_fd) };
    }
}
