//! Growable byte buffer backing socket reads and writes.
//!
//! The buffer keeps three indices into one backing allocation:
//!
//! ```text
//! 0        prepend       read            write         capacity
//! |  head reserve  | readable bytes | writable bytes |
//! ```
//!
//! with `prepend <= read <= write <= capacity` at all times. The head reserve
//! stays free so callers can prepend framing without copying the payload.
//! Reads from a file descriptor are scattered across the writable tail and a
//! stack spill area so a single `readv(2)` drains as much of the socket as
//! possible; whatever lands in the spill is appended afterwards, growing the
//! buffer.

use std::fmt;
use std::io;
use std::os::unix::io::RawFd;

/// Fixed head reserve kept free in front of the readable region.
const CHEAP_PREPEND: usize = 8;

/// Default size of the region behind the reserve.
const INITIAL_SIZE: usize = 1024;

/// Stack spill area used as the second `readv` segment.
const SPILL_SIZE: usize = 64 * 1024;

pub struct Buffer {
    storage: Vec<u8>,
    read_index: usize,
    write_index: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_SIZE)
    }

    pub fn with_capacity(initial: usize) -> Self {
        Self {
            storage: vec![0; CHEAP_PREPEND + initial],
            read_index: CHEAP_PREPEND,
            write_index: CHEAP_PREPEND,
        }
    }

    /// Number of bytes available to read.
    pub fn readable(&self) -> usize {
        self.write_index - self.read_index
    }

    /// Number of bytes that can be appended without growing.
    pub fn writable(&self) -> usize {
        self.storage.len() - self.write_index
    }

    /// Number of bytes in front of the readable region, head reserve included.
    pub fn prependable(&self) -> usize {
        self.read_index
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Read-only view of the readable region.
    pub fn peek(&self) -> &[u8] {
        &self.storage[self.read_index..self.write_index]
    }

    /// Discards up to `len` readable bytes. Taking everything resets both
    /// cursors back to the head reserve.
    pub fn retrieve(&mut self, len: usize) {
        if len < self.readable() {
            self.read_index += len;
        } else {
            self.retrieve_all();
        }
    }

    pub fn retrieve_all(&mut self) {
        self.read_index = CHEAP_PREPEND;
        self.write_index = CHEAP_PREPEND;
    }

    /// Copies out up to `len` readable bytes and discards them.
    pub fn retrieve_as_string(&mut self, len: usize) -> String {
        let len = len.min(self.readable());
        let taken =
            String::from_utf8_lossy(&self.storage[self.read_index..self.read_index + len])
                .into_owned();
        self.retrieve(len);
        taken
    }

    pub fn retrieve_all_as_string(&mut self) -> String {
        self.retrieve_as_string(self.readable())
    }

    /// Appends `data`, growing or compacting the backing storage as needed.
    pub fn append(&mut self, data: &[u8]) {
        if data.len() > self.writable() {
            self.make_space(data.len());
        }
        self.storage[self.write_index..self.write_index + data.len()].copy_from_slice(data);
        self.write_index += data.len();
    }

    fn make_space(&mut self, len: usize) {
        if self.writable() + self.prependable() < len + CHEAP_PREPEND {
            self.storage.resize(self.write_index + len, 0);
        } else {
            // Enough slack overall: move the readable bytes back onto the
            // reserve instead of reallocating.
            let readable = self.readable();
            self.storage
                .copy_within(self.read_index..self.write_index, CHEAP_PREPEND);
            self.read_index = CHEAP_PREPEND;
            self.write_index = CHEAP_PREPEND + readable;
        }
    }

    /// Reads from `fd` with one scattered syscall over the writable tail and
    /// a stack spill area, so even a small buffer drains up to
    /// `writable + 64 KiB` in a single call.
    ///
    /// Returns the byte count (0 means end of stream). On `EAGAIN` the error
    /// maps to [`io::ErrorKind::WouldBlock`] and no index moves.
    pub fn read_fd(&mut self, fd: RawFd) -> io::Result<usize> {
        let mut spill = [0u8; SPILL_SIZE];
        let writable = self.writable();

        let mut segments = [
            libc::iovec {
                iov_base: unsafe { self.storage.as_mut_ptr().add(self.write_index) }
                    as *mut libc::c_void,
                iov_len: writable,
            },
            libc::iovec {
                iov_base: spill.as_mut_ptr() as *mut libc::c_void,
                iov_len: SPILL_SIZE,
            },
        ];
        let count = if writable < SPILL_SIZE { 2 } else { 1 };

        let n = unsafe { libc::readv(fd, segments.as_mut_ptr(), count) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        let n = n as usize;
        if n <= writable {
            self.write_index += n;
        } else {
            self.write_index = self.storage.len();
            self.append(&spill[..n - writable]);
        }

        Ok(n)
    }

    /// Writes the readable region to `fd` and discards what was accepted.
    pub fn write_fd(&mut self, fd: RawFd) -> io::Result<usize> {
        let n = unsafe {
            libc::write(
                fd,
                self.peek().as_ptr() as *const libc::c_void,
                self.readable(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        let n = n as usize;
        self.retrieve(n);
        Ok(n)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .field("prependable", &self.prependable())
            .field("capacity", &self.capacity())
            .finish()
    }
}
