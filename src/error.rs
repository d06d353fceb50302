//! Error taxonomy for the runtime.
//!
//! Syscall failures travel out-of-band as [`std::io::Error`] inside the I/O
//! helpers; at the crate boundary they surface as [`Error::System`]. A refusal
//! from the readiness facility is a distinct kind ([`Error::Poller`]) because
//! the reactor handles it differently: the waiter is dropped and the awaiting
//! task gets the error instead of staying suspended forever. A panicking task
//! body becomes a [`JoinError`] carrying the original payload, surfaced at the
//! awaiter of its [`JoinHandle`](crate::JoinHandle).

use std::any::Any;
use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A syscall returned an error other than `EAGAIN`/`EWOULDBLOCK`/`EINTR`.
    #[error("system call failed: {0}")]
    System(#[from] io::Error),

    /// The readiness facility refused a register/modify/remove or wait.
    #[error("readiness poller failed: {0}")]
    Poller(io::Error),

    /// An API contract was violated at the call site.
    #[error("invalid usage: {0}")]
    InvalidUsage(&'static str),
}

/// Failure result of awaiting a task.
///
/// Either the task body panicked (the payload is preserved so the awaiter can
/// recover the original error value via [`JoinError::into_panic`]), or the
/// handle was polled again after its result had already been taken.
pub struct JoinError {
    repr: Repr,
}

enum Repr {
    Panicked(Box<dyn Any + Send + 'static>),
    AlreadyJoined,
}

impl JoinError {
    pub(crate) fn panicked(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self {
            repr: Repr::Panicked(payload),
        }
    }

    pub(crate) fn already_joined() -> Self {
        Self {
            repr: Repr::AlreadyJoined,
        }
    }

    /// True when the task body panicked, false when the handle was misused.
    pub fn is_panic(&self) -> bool {
        matches!(self.repr, Repr::Panicked(_))
    }

    /// Consumes the error, yielding the panic payload of the failed task.
    ///
    /// # Panics
    /// Panics if [`is_panic`](Self::is_panic) is false.
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        match self.repr {
            Repr::Panicked(payload) => payload,
            Repr::AlreadyJoined => panic!("into_panic() on a non-panic JoinError"),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Panicked(payload) => {
                write!(f, "task panicked: {}", panic_message(payload.as_ref()))
            }
            Repr::AlreadyJoined => write!(f, "invalid usage: task result already taken"),
        }
    }
}

impl fmt::Debug for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match &self.repr {
            Repr::Panicked(payload) => panic_message(payload.as_ref()),
            Repr::AlreadyJoined => "result already taken",
        };
        f.debug_tuple("JoinError").field(&detail).finish()
    }
}

impl std::error::Error for JoinError {}

/// Best-effort extraction of the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<opaque panic payload>"
    }
}
