//! Thin stream wrapper over a [`PipeBuf`].

use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;

use super::buffer::PipeBuf;
use crate::window::OpenMode;

/// Standard-stream facade over one [`PipeBuf`].
///
/// Owns exactly one buffer and forwards [`Read`] and [`Write`] to it; all
/// buffering logic lives in the buffer itself.
#[derive(Debug)]
pub struct PipeStream {
    buf: PipeBuf,
}

impl PipeStream {
    /// Opens a fresh duplex pipe stream.
    ///
    /// # Errors
    ///
    /// Propagates [`PipeBuf::open`] failures.
    pub fn open() -> io::Result<Self> {
        Ok(Self {
            buf: PipeBuf::open()?,
        })
    }

    /// Opens a pipe stream with the given directions enabled.
    ///
    /// # Errors
    ///
    /// Propagates [`PipeBuf::open_mode`] failures.
    pub fn open_mode(mode: OpenMode) -> io::Result<Self> {
        Ok(Self {
            buf: PipeBuf::open_mode(mode)?,
        })
    }

    /// Wraps an existing buffer.
    #[must_use]
    pub fn new(buf: PipeBuf) -> Self {
        Self { buf }
    }

    /// Returns a reference to the underlying buffer.
    #[must_use]
    pub fn get_ref(&self) -> &PipeBuf {
        &self.buf
    }

    /// Returns a mutable reference to the underlying buffer.
    pub fn get_mut(&mut self) -> &mut PipeBuf {
        &mut self.buf
    }

    /// Consumes the stream and returns the underlying buffer.
    #[must_use]
    pub fn into_inner(self) -> PipeBuf {
        self.buf
    }

    /// The read end's descriptor, if still open.
    #[must_use]
    pub fn read_fd(&self) -> Option<RawFd> {
        self.buf.read_fd()
    }

    /// The write end's descriptor, if still open.
    #[must_use]
    pub fn write_fd(&self) -> Option<RawFd> {
        self.buf.write_fd()
    }

    /// Closes the read end. See [`PipeBuf::close_read`].
    pub fn close_read(&mut self) {
        self.buf.close_read();
    }

    /// Closes the write end. See [`PipeBuf::close_write`].
    pub fn close_write(&mut self) {
        self.buf.close_write();
    }

    /// Bytes buffered but not yet accepted by the kernel.
    #[must_use]
    pub fn write_remaining(&self) -> usize {
        self.buf.write_remaining()
    }
}

impl Read for PipeStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.buf.read(out)
    }
}

impl Write for PipeStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buf.flush()
    }
}
