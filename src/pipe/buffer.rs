#![allow(unsafe_code)]
//! Buffered non-blocking duplex byte stream over an anonymous pipe.
//!
//! This module uses unsafe code for the `pipe`, `fcntl`, `read`, `write`,
//! and `close` syscalls.

use std::io;
use std::os::unix::io::RawFd;

use crate::poll::{self, Interest};
use crate::window::{OpenMode, ReadWindow, WriteWindow};

/// Default window capacity for pipe buffers, per direction.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Outcome of one non-blocking fill attempt on the read window.
enum Fill {
    /// Bytes were received (possibly zero when the window had no room).
    Data(usize),
    /// The kernel has nothing to deliver right now.
    WouldBlock,
    /// The peer closed; a genuine zero-length read.
    Eof,
}

/// Buffered byte stream over a pipe's two descriptors.
///
/// Both descriptors are set non-blocking at construction. Reads and writes go
/// through in-memory windows; when a window is exhausted the buffer performs
/// a direct non-blocking syscall, and a read that would block waits on the
/// descriptor's readiness before retrying. A write that would block is
/// deferred instead: the unaccepted bytes stay at the front of the write
/// window and the call succeeds, with the window growing to absorb further
/// writes until the kernel drains.
///
/// Each buffer owns its descriptors and windows exclusively; moving the
/// buffer transfers that ownership. Concurrent use from multiple threads is
/// not supported.
#[derive(Debug)]
pub struct PipeBuf {
    /// Read end of the pipe; -1 once closed.
    read_fd: RawFd,
    /// Write end of the pipe; -1 once closed.
    write_fd: RawFd,
    mode: OpenMode,
    read: Option<ReadWindow>,
    write: Option<WriteWindow>,
    capacity: usize,
}

impl PipeBuf {
    /// Opens a fresh pipe with both directions enabled and the default
    /// window capacity.
    ///
    /// # Errors
    ///
    /// Fails if the OS cannot allocate a pipe or the descriptors cannot be
    /// made non-blocking.
    pub fn open() -> io::Result<Self> {
        Self::with_capacity(OpenMode::read_write(), DEFAULT_CAPACITY)
    }

    /// Opens a fresh pipe with the given directions enabled.
    ///
    /// # Errors
    ///
    /// See [`open`](PipeBuf::open).
    pub fn open_mode(mode: OpenMode) -> io::Result<Self> {
        Self::with_capacity(mode, DEFAULT_CAPACITY)
    }

    /// Opens a fresh pipe with the given directions and window capacity.
    ///
    /// Windows are allocated only for enabled directions.
    ///
    /// # Errors
    ///
    /// See [`open`](PipeBuf::open).
    pub fn with_capacity(mode: OpenMode, capacity: usize) -> io::Result<Self> {
        assert!(capacity > 0, "window capacity must be nonzero");
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds points at a two-element array as pipe(2) requires.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let buf = Self {
            read_fd: fds[0],
            write_fd: fds[1],
            mode,
            read: mode.is_read().then(|| ReadWindow::new(capacity)),
            write: mode.is_write().then(|| WriteWindow::new(capacity)),
            capacity,
        };
        // Descriptors are owned by `buf` from here on; an fcntl failure
        // closes them through Drop.
        set_nonblocking(buf.read_fd)?;
        set_nonblocking(buf.write_fd)?;
        tracing::trace!(read_fd = buf.read_fd, write_fd = buf.write_fd, "opened pipe");
        Ok(buf)
    }

    /// The read end's descriptor, if still open.
    #[must_use]
    pub fn read_fd(&self) -> Option<RawFd> {
        (self.read_fd >= 0).then_some(self.read_fd)
    }

    /// The write end's descriptor, if still open.
    #[must_use]
    pub fn write_fd(&self) -> Option<RawFd> {
        (self.write_fd >= 0).then_some(self.write_fd)
    }

    /// The enabled directions.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The configured default window capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consumes and returns the next byte.
    ///
    /// An exhausted window is compacted and refilled with one non-blocking
    /// read; if the kernel has nothing to deliver, the call blocks on the
    /// descriptor's readiness and retries. Returns `Ok(None)` at end of
    /// stream (peer closed, or the read side of this buffer closed).
    ///
    /// # Errors
    ///
    /// Any read failure other than a signal interruption or a would-block
    /// condition is fatal and surfaces here.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            let Some(win) = self.read.as_mut() else {
                return Ok(None);
            };
            if let Some(byte) = win.pop() {
                return Ok(Some(byte));
            }
            match self.fill()? {
                Fill::Data(_) => {}
                Fill::Eof => return Ok(None),
                Fill::WouldBlock => {
                    poll::wait_ready(self.read_fd, Interest::readable())?;
                }
            }
        }
    }

    /// Reads buffered bytes into `out`, refilling the window as needed.
    ///
    /// Blocks only when no data is available at all; otherwise returns
    /// whatever the window holds, up to `out.len()`. Returns `Ok(0)` only at
    /// end of stream (or for an empty `out`).
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`read_byte`](PipeBuf::read_byte).
    pub fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(win) = self.read.as_mut() else {
                return Ok(0);
            };
            let n = win.drain_into(out);
            if n > 0 {
                return Ok(n);
            }
            match self.fill()? {
                Fill::Data(_) => {}
                Fill::Eof => return Ok(0),
                Fill::WouldBlock => {
                    poll::wait_ready(self.read_fd, Interest::readable())?;
                }
            }
        }
    }

    /// Number of bytes immediately readable after a non-blocking top-up of
    /// the read window.
    ///
    /// # Errors
    ///
    /// Propagates fatal read failures; a would-block condition is not an
    /// error and simply leaves the count as-is.
    pub fn available(&mut self) -> io::Result<usize> {
        if self.read.is_some() {
            let _ = self.fill()?;
        }
        Ok(self.read.as_ref().map_or(0, ReadWindow::len))
    }

    /// Appends one byte to the write window.
    ///
    /// A full window is drained first; bytes the kernel rejects because the
    /// call would block stay buffered (deferred write) and the window grows,
    /// so this call does not block.
    ///
    /// # Errors
    ///
    /// Fails if the write side is closed or the drain hits a fatal error.
    pub fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        loop {
            let Some(win) = self.write.as_mut() else {
                return Err(write_side_closed());
            };
            if !win.is_full() {
                win.push(byte);
                return Ok(());
            }
            self.flush()?;
        }
    }

    /// Appends `buf` to the write window, draining whenever it fills.
    ///
    /// Always accepts the whole slice; rejected kernel writes are deferred
    /// as in [`write_byte`](PipeBuf::write_byte).
    ///
    /// # Errors
    ///
    /// Fails if the write side is closed or a drain hits a fatal error.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.write.is_none() {
            return Err(write_side_closed());
        }
        let mut written = 0;
        while written < buf.len() {
            let Some(win) = self.write.as_mut() else {
                return Err(write_side_closed());
            };
            written += win.extend_from(&buf[written..]);
            if win.is_full() {
                self.flush()?;
            }
        }
        Ok(buf.len())
    }

    /// Drains the write window into the kernel and applies the window's
    /// grow/shrink policy.
    ///
    /// Bytes the kernel rejects because the call would block are preserved
    /// at the front of the window and the call still succeeds; the caller is
    /// expected to wait for writability before further progress is possible.
    ///
    /// # Errors
    ///
    /// Any write failure other than a signal interruption or a would-block
    /// condition is fatal. The unsent bytes remain buffered either way.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.write.is_none() {
            return Ok(());
        }
        let result = self.drain();
        if let Some(win) = self.write.as_mut() {
            win.apply_resize_policy();
        }
        result
    }

    /// Number of bytes buffered but not yet accepted by the kernel.
    #[must_use]
    pub fn write_remaining(&self) -> usize {
        self.write.as_ref().map_or(0, WriteWindow::pending)
    }

    /// Currently allocated write window capacity.
    #[must_use]
    pub fn write_capacity(&self) -> usize {
        self.write.as_ref().map_or(0, WriteWindow::capacity)
    }

    /// Idempotently closes the read end, releases its window, and clears the
    /// read capability. Subsequent reads report end of stream.
    pub fn close_read(&mut self) {
        if self.read_fd >= 0 {
            tracing::trace!(fd = self.read_fd, "closing pipe read end");
            // SAFETY: the descriptor is owned by this buffer and still open.
            unsafe { libc::close(self.read_fd) };
            self.read_fd = -1;
        }
        self.read = None;
        self.mode = self.mode.remove(OpenMode::READ);
    }

    /// Idempotently closes the write end, releases its window, and clears
    /// the write capability. Subsequent writes fail immediately.
    pub fn close_write(&mut self) {
        if self.write_fd >= 0 {
            tracing::trace!(fd = self.write_fd, "closing pipe write end");
            // SAFETY: the descriptor is owned by this buffer and still open.
            unsafe { libc::close(self.write_fd) };
            self.write_fd = -1;
        }
        self.write = None;
        self.mode = self.mode.remove(OpenMode::WRITE);
    }

    /// One non-blocking read into the compacted window.
    fn fill(&mut self) -> io::Result<Fill> {
        let fd = self.read_fd;
        let Some(win) = self.read.as_mut() else {
            return Ok(Fill::Eof);
        };
        win.compact();
        if win.spare_mut().is_empty() {
            return Ok(Fill::Data(0));
        }
        loop {
            let ret = {
                let spare = win.spare_mut();
                // SAFETY: spare points into the live window allocation and
                // the length matches it.
                unsafe { libc::read(fd, spare.as_mut_ptr().cast::<libc::c_void>(), spare.len()) }
            };
            if ret > 0 {
                let n = ret as usize;
                win.advance_limit(n);
                return Ok(Fill::Data(n));
            }
            if ret == 0 {
                return Ok(Fill::Eof);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => {}
                io::ErrorKind::WouldBlock => return Ok(Fill::WouldBlock),
                _ => return Err(err),
            }
        }
    }

    /// Loops a non-blocking write until the pending span is fully accepted
    /// or the kernel rejects the remainder.
    fn drain(&mut self) -> io::Result<()> {
        let fd = self.write_fd;
        let Some(win) = self.write.as_mut() else {
            return Ok(());
        };
        let total = win.pending();
        if total == 0 {
            return Ok(());
        }
        let mut sent = 0;
        while sent < total {
            let ret = {
                let bytes = &win.pending_bytes()[sent..];
                // SAFETY: bytes points into the live window allocation and
                // the length matches it.
                unsafe { libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) }
            };
            if ret > 0 {
                sent += ret as usize;
                continue;
            }
            if ret == 0 {
                // Kernel accepted nothing further; defer the remainder.
                break;
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => {}
                io::ErrorKind::WouldBlock => break,
                _ => {
                    win.consume_front(sent);
                    tracing::debug!(fd, error = %err, "pipe write failed");
                    return Err(err);
                }
            }
        }
        if sent == total {
            win.mark_flushed();
        } else {
            win.consume_front(sent);
        }
        Ok(())
    }
}

impl Drop for PipeBuf {
    fn drop(&mut self) {
        // Descriptors 0-2 are externally owned and never closed here.
        for fd in [self.read_fd, self.write_fd] {
            if fd > 2 {
                // SAFETY: the descriptor is owned by this buffer and still
                // open.
                unsafe { libc::close(fd) };
            }
        }
    }
}

fn write_side_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe write side closed")
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on an owned, open descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_both_ends() {
        crate::test_utils::init_test_logging();
        let mut pipe = PipeBuf::open().unwrap();

        pipe.write(b"hello").unwrap();
        pipe.flush().unwrap();
        assert_eq!(pipe.write_remaining(), 0);

        let mut out = [0u8; 5];
        let mut got = 0;
        while got < 5 {
            got += pipe.read(&mut out[got..]).unwrap();
        }
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn read_byte_sees_flushed_bytes_in_order() {
        let mut pipe = PipeBuf::open().unwrap();
        pipe.write(b"abc").unwrap();
        pipe.flush().unwrap();

        assert_eq!(pipe.read_byte().unwrap(), Some(b'a'));
        assert_eq!(pipe.read_byte().unwrap(), Some(b'b'));
        assert_eq!(pipe.read_byte().unwrap(), Some(b'c'));
    }

    #[test]
    fn closed_write_end_yields_end_of_stream() {
        let mut pipe = PipeBuf::open().unwrap();
        pipe.write(b"xy").unwrap();
        pipe.flush().unwrap();
        pipe.close_write();

        assert_eq!(pipe.read_byte().unwrap(), Some(b'x'));
        assert_eq!(pipe.read_byte().unwrap(), Some(b'y'));
        assert_eq!(pipe.read_byte().unwrap(), None);
    }

    #[test]
    fn close_read_is_idempotent_and_terminal() {
        let mut pipe = PipeBuf::open().unwrap();
        pipe.close_read();
        pipe.close_read();

        assert!(!pipe.mode().is_read());
        assert_eq!(pipe.read_fd(), None);
        assert_eq!(pipe.read_byte().unwrap(), None);
        assert_eq!(pipe.available().unwrap(), 0);
    }

    #[test]
    fn write_after_close_write_fails_fast() {
        let mut pipe = PipeBuf::open().unwrap();
        pipe.close_write();

        let err = pipe.write_byte(b'z').unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(pipe.write_remaining(), 0);
    }

    #[test]
    fn available_reflects_unread_bytes() {
        let mut pipe = PipeBuf::open().unwrap();
        assert_eq!(pipe.available().unwrap(), 0);

        pipe.write(b"abcd").unwrap();
        pipe.flush().unwrap();
        assert_eq!(pipe.available().unwrap(), 4);

        pipe.read_byte().unwrap();
        assert_eq!(pipe.available().unwrap(), 3);
    }

    #[test]
    fn write_only_mode_has_no_read_window() {
        let mut pipe = PipeBuf::open_mode(OpenMode::write_only()).unwrap();
        assert_eq!(pipe.read_byte().unwrap(), None);
        pipe.write(b"data").unwrap();
        pipe.flush().unwrap();
        assert_eq!(pipe.write_remaining(), 0);
    }
}
