//! Nbstream: buffered byte streams over non-blocking pipes and sockets.
//!
//! # Overview
//!
//! Nbstream makes two POSIX transport primitives — anonymous pipes and
//! sockets (stream and datagram) — behave as ordinary buffered
//! readable/writable streams while the underlying descriptors are
//! non-blocking. A read that would block waits on that one descriptor's
//! readiness and retries; a write that would block is deferred, with the
//! unaccepted bytes preserved in a write window that grows to absorb bursts
//! and shrinks back once drained. Sockets additionally carry connectionless
//! addressing, ancillary (control) data, implicit connect-on-write, and a
//! named option protocol.
//!
//! A separate readiness layer — a `poll(2)` wrapper plus an interest-set
//! overlay — serves callers multiplexing many streams at once. The stream
//! buffers do not go through it for their own blocking.
//!
//! # Core Guarantees
//!
//! - **Exact byte transport**: bytes written and flushed are read back in
//!   order, without loss or duplication, across window grow/shrink cycles
//! - **Would-block is not failure**: flow control defers writes and retries
//!   reads; only a genuine zero-length read reports end of stream
//! - **Signal interruptions are invisible**: EINTR-class failures are
//!   retried inside the operation
//! - **Single ownership**: each buffer owns its descriptors and windows
//!   exclusively; moves transfer that ownership, and descriptors 0-2 are
//!   never closed by destructors
//!
//! # Module Structure
//!
//! - [`pipe`]: buffered duplex streams over anonymous pipes
//! - [`sock`]: buffered socket streams with addressing, ancillary data, and
//!   the option protocol
//! - [`poll`]: the readiness poller and interest-set trigger
//! - [`test_utils`]: logging and assertion helpers for tests
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//! use nbstream::PipeStream;
//!
//! let mut stream = PipeStream::open()?;
//! stream.write_all(b"hello")?;
//! stream.flush()?;
//!
//! let mut out = [0u8; 5];
//! stream.read_exact(&mut out)?;
//! assert_eq!(&out, b"hello");
//! # std::io::Result::Ok(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod pipe;
pub mod poll;
pub mod sock;
pub mod test_utils;
mod window;

pub use pipe::{PipeBuf, PipeStream};
pub use poll::{Event, Interest, Poller, Readiness, Trigger};
pub use sock::{
    ancillary_space_for_fds, AddrError, Ancillary, AncillaryMessage, AncillaryMessages, GetOptFn,
    ScmRights, SetOptFn, SockAddr, SockBuf, SockOpt, SockStream,
};
pub use window::OpenMode;
