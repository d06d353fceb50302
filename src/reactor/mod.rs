//! Readiness demultiplexing: the epoll wrapper and the reactor loop.

mod core;
mod future;
mod poller;

pub use self::core::Reactor;
pub use self::future::Readiness;
pub use self::poller::{ERROR, HANGUP, READABLE, WRITABLE};
