//! Thin wrapper over `epoll(7)`.
//!
//! Registrations are level-triggered: a readiness event dropped between
//! waiter removal and re-registration is reported again on the next wait, and
//! the resumed task re-issues its syscall anyway.

use std::io;
use std::os::unix::io::RawFd;

/// The descriptor has data to read.
pub const READABLE: u32 = libc::EPOLLIN as u32;
/// The descriptor accepts writes.
pub const WRITABLE: u32 = libc::EPOLLOUT as u32;
/// An error condition is pending on the descriptor.
pub const ERROR: u32 = libc::EPOLLERR as u32;
/// The peer hung up.
pub const HANGUP: u32 = libc::EPOLLHUP as u32;

pub(crate) struct Poller {
    epoll_fd: RawFd,
}

impl Poller {
    pub(crate) fn new() -> io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { epoll_fd })
    }

    pub(crate) fn add(&self, fd: RawFd, mask: u32) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, mask)
    }

    pub(crate) fn modify(&self, fd: RawFd, mask: u32) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, mask)
    }

    pub(crate) fn remove(&self, fd: RawFd) -> io::Result<()> {
        let ret = unsafe {
            libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocks until events arrive, the timeout expires (`-1` blocks forever),
    /// or a signal interrupts the wait. Fills `events` and returns the count.
    pub(crate) fn wait(
        &self,
        events: &mut [libc::epoll_event],
        timeout_ms: i32,
    ) -> io::Result<usize> {
        let n = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                events.as_mut_ptr(),
                events.len() as i32,
                timeout_ms,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn ctl(&self, op: i32, fd: RawFd, mask: u32) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: mask,
            u64: fd as u64,
        };
        let ret = unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe { libc::close(self.epoll_fd) };
    }
}
