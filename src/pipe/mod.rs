//! Buffered non-blocking streams over anonymous pipes.
//!
//! [`PipeBuf`] is the buffered-stream engine: independent read and write
//! windows over the pipe's two non-blocking descriptors, with retry-on-EAGAIN
//! reads and deferred (grow-on-would-block) writes. [`PipeStream`] is the
//! thin [`std::io::Read`]/[`std::io::Write`] facade over one buffer.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//! use nbstream::PipeStream;
//!
//! let mut stream = PipeStream::open()?;
//! stream.write_all(b"ping")?;
//! stream.flush()?;
//!
//! let mut out = [0u8; 4];
//! stream.read_exact(&mut out)?;
//! assert_eq!(&out, b"ping");
//! # std::io::Result::Ok(())
//! ```

pub mod buffer;
pub mod stream;

pub use buffer::{PipeBuf, DEFAULT_CAPACITY};
pub use stream::PipeStream;
