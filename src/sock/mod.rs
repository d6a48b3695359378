//! Buffered non-blocking streams over sockets.
//!
//! [`SockBuf`] is the buffered-stream engine for one socket descriptor,
//! stream or datagram: scatter/gather transfers with per-direction windows,
//! ancillary control data, peer addressing, implicit connect-on-write, and a
//! named option protocol. [`SockStream`] is the thin
//! [`std::io::Read`]/[`std::io::Write`]/[`std::io::Seek`] facade over one
//! buffer.
//!
//! # Socket construction
//!
//! Sockets are opened with a raw domain/type/protocol triple plus a list of
//! named options applied atomically, or built around an already-open
//! descriptor:
//!
//! ```no_run
//! use nbstream::{OpenMode, SockAddr, SockBuf, SockOpt};
//!
//! let addr = SockAddr::unix("/tmp/server.sock")?;
//! let server = SockBuf::open_with(
//!     libc::AF_UNIX,
//!     libc::SOCK_STREAM,
//!     0,
//!     &[SockOpt::bind(&addr), SockOpt::listen(8)],
//!     OpenMode::read_write(),
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Datagram addressing
//!
//! On an unconnected socket, sends go to the configured destination and
//! receives record the sender:
//!
//! ```no_run
//! use nbstream::{SockAddr, SockBuf};
//! # fn example(mut tx: SockBuf, mut rx: SockBuf) -> std::io::Result<()> {
//! tx.set_destination(SockAddr::unix("/tmp/peer.sock")?);
//! tx.write(b"datagram payload")?;
//! tx.flush()?;
//!
//! let mut out = [0u8; 64];
//! let n = rx.read(&mut out)?;
//! let sender = rx.source_addr();
//! # Ok(())
//! # }
//! ```

pub mod addr;
pub mod ancillary;
pub mod buffer;
pub mod options;
pub mod stream;

pub use addr::{AddrError, SockAddr};
pub use ancillary::{ancillary_space_for_fds, Ancillary, AncillaryMessage, AncillaryMessages, ScmRights};
pub use buffer::{SockBuf, DEFAULT_CAPACITY};
pub use options::{GetOptFn, SetOptFn, SockOpt};
pub use stream::SockStream;
