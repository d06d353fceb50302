//! Minimal multi-threaded async network runtime.
//!
//! This crate provides a small concurrency engine that lets network servers be
//! written as linear async procedures while a fixed pool of worker threads
//! drives many of them concurrently, multiplexing their I/O through a single
//! epoll instance.
//!
//! # Architecture
//!
//! - **Executor**: fixed worker pool consuming ready jobs from one shared FIFO
//! - **Task**: a spawned future with a result slot and a single continuation,
//!   resumed by pushing it back onto the executor queue
//! - **Reactor**: single-threaded epoll loop mapping file descriptors to
//!   suspended tasks and dispatching wake-ups onto the executor
//! - **TcpListener / TcpStream**: non-blocking sockets whose `accept`, `read`
//!   and `write` first attempt the syscall and suspend only on `EAGAIN`
//! - **Buffer**: growable byte buffer with a scattered read into a stack
//!   spill area and a contiguous write from a read cursor
//!
//! The calling thread drives [`Reactor::run`]; task code only ever runs on
//! executor workers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coronet::{Buffer, Executor, Reactor, TcpListener};
//!
//! let executor = Arc::new(Executor::new());
//! let reactor = Arc::new(Reactor::new(executor)?);
//!
//! let listener = TcpListener::bind(reactor.clone(), "127.0.0.1:8080")?;
//! reactor.spawn(async move {
//!     loop {
//!         let (stream, peer) = listener.accept().await.unwrap();
//!         coronet::spawn(async move {
//!             let mut buffer = Buffer::new();
//!             let n = stream.read(&mut buffer).await.unwrap();
//!             log::info!("{peer}: {n} bytes");
//!             stream.write_all(&mut buffer).await.unwrap();
//!         });
//!     }
//! });
//!
//! reactor.run()?; // blocks until reactor.stop()
//! # Ok::<(), coronet::Error>(())
//! ```

pub mod error;
pub mod io;
pub mod net;
pub mod reactor;
pub mod runtime;
mod task;

pub use error::{Error, JoinError, Result};
pub use io::Buffer;
pub use net::{TcpListener, TcpStream};
pub use reactor::Reactor;
pub use runtime::Executor;
pub use task::{spawn, JoinHandle};

#[cfg(not(target_os = "linux"))]
compile_error!("coronet requires a Linux system that supports epoll(7).");
