use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

use crate::error::Error;
use crate::io::Buffer;
use crate::reactor::{Reactor, READABLE, WRITABLE};

/// A connected non-blocking socket.
///
/// Created from an accepted descriptor; registered readable with the reactor
/// on construction. Move-only: dropping the stream unregisters the
/// descriptor and closes it. One task per stream: the reactor keeps a
/// single waiter per descriptor.
pub struct TcpStream {
    fd: RawFd,
    reactor: Arc<Reactor>,
}

impl TcpStream {
    pub(crate) fn from_fd(fd: RawFd, reactor: Arc<Reactor>) -> crate::Result<Self> {
        if let Err(error) = reactor.register_fd(fd, READABLE) {
            unsafe { libc::close(fd) };
            return Err(error);
        }
        Ok(Self { fd, reactor })
    }

    /// Reads once into `buffer`, suspending on the reactor while the socket
    /// has nothing. Returns the byte count; 0 means the peer closed.
    pub async fn read(&self, buffer: &mut Buffer) -> crate::Result<usize> {
        loop {
            match buffer.read_fd(self.fd) {
                Ok(n) => {
                    log::trace!("stream: fd {} read {n} bytes", self.fd);
                    return Ok(n);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    let mask = self.reactor.current_mask(self.fd) | READABLE;
                    self.reactor
                        .await_fd(self.fd, mask)
                        .await
                        .map_err(Error::Poller)?;
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(Error::System(error)),
            }
        }
    }

    /// Writes the readable region of `buffer` once, suspending while the
    /// socket is full. Returns the bytes accepted by the kernel (already
    /// retrieved from the buffer); 0 when the buffer had nothing to write.
    pub async fn write(&self, buffer: &mut Buffer) -> crate::Result<usize> {
        loop {
            if buffer.readable() == 0 {
                return Ok(0);
            }
            match buffer.write_fd(self.fd) {
                Ok(n) => {
                    log::trace!("stream: fd {} wrote {n} bytes", self.fd);
                    return Ok(n);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    let mask = self.reactor.current_mask(self.fd) | WRITABLE;
                    self.reactor
                        .await_fd(self.fd, mask)
                        .await
                        .map_err(Error::Poller)?;
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(Error::System(error)),
            }
        }
    }

    /// Writes until `buffer` is drained.
    pub async fn write_all(&self, buffer: &mut Buffer) -> crate::Result<()> {
        while buffer.readable() > 0 {
            self.write(buffer).await?;
        }
        Ok(())
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.reactor.unregister_fd(self.fd);
        unsafe { libc::close(self.fd) };
    }
}
