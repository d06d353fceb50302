use std::io;
use std::mem;
use std::net::{SocketAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;

use crate::error::Error;
use crate::net::sockaddr;
use crate::net::tcp_stream::TcpStream;
use crate::reactor::{Reactor, READABLE};

/// A non-blocking listening socket registered with the reactor.
pub struct TcpListener {
    fd: RawFd,
    reactor: Arc<Reactor>,
}

impl TcpListener {
    /// Binds `addr` (IPv4 `host:port`, port 0 for kernel-assigned), starts
    /// listening, and registers the descriptor readable with the reactor.
    pub fn bind(reactor: Arc<Reactor>, addr: &str) -> crate::Result<Self> {
        let addr: SocketAddrV4 = addr
            .parse()
            .map_err(|_| Error::InvalidUsage("listen address must be an IPv4 host:port"))?;

        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(Error::System(io::Error::last_os_error()));
        }

        let result = Self::setup(fd, addr, &reactor);
        if let Err(error) = result {
            unsafe { libc::close(fd) };
            return Err(error);
        }

        log::debug!("listener: fd {fd} bound to {addr}");
        Ok(Self { fd, reactor })
    }

    fn setup(fd: RawFd, addr: SocketAddrV4, reactor: &Arc<Reactor>) -> crate::Result<()> {
        let reuse: libc::c_int = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        sockaddr::set_nonblocking(fd)?;

        let raw = sockaddr::to_raw(addr);
        let ret = unsafe {
            libc::bind(
                fd,
                &raw as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::System(io::Error::last_os_error()));
        }

        if unsafe { libc::listen(fd, libc::SOMAXCONN) } < 0 {
            return Err(Error::System(io::Error::last_os_error()));
        }

        reactor.register_fd(fd, READABLE)
    }

    /// Accepts one connection, suspending on the reactor while none is
    /// pending. The accepted socket comes back non-blocking, wrapped as a
    /// [`TcpStream`] registered with the same reactor.
    pub async fn accept(&self) -> crate::Result<(TcpStream, SocketAddr)> {
        loop {
            let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
            let mut addr_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

            let fd = unsafe {
                libc::accept4(
                    self.fd,
                    &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
                    &mut addr_len,
                    libc::SOCK_NONBLOCK,
                )
            };
            if fd >= 0 {
                let peer = sockaddr::from_raw(&addr);
                log::debug!("listener: accepted fd {fd} from {peer}");
                let stream = TcpStream::from_fd(fd, self.reactor.clone())?;
                return Ok((stream, peer));
            }

            let error = io::Error::last_os_error();
            let errno = error.raw_os_error().unwrap_or(0);
            if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
                self.reactor
                    .await_fd(self.fd, READABLE)
                    .await
                    .map_err(Error::Poller)?;
            } else if errno == libc::EINTR {
                continue;
            } else {
                return Err(Error::System(error));
            }
        }
    }

    /// The locally bound address, useful after binding port 0.
    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if ret < 0 {
            return Err(Error::System(io::Error::last_os_error()));
        }
        Ok(sockaddr::from_raw(&addr))
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        self.reactor.unregister_fd(self.fd);
        unsafe { libc::close(self.fd) };
    }
}
