//! Byte buffering for socket I/O.

mod buffer;

pub use buffer::Buffer;
