//! Thin stream wrapper over a [`SockBuf`].

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::RawFd;

use libc::c_int;

use super::addr::SockAddr;
use super::ancillary::Ancillary;
use super::buffer::SockBuf;
use super::options::{GetOptFn, SetOptFn, SockOpt};
use crate::window::OpenMode;

/// Standard-stream facade over one [`SockBuf`].
///
/// Owns exactly one buffer and forwards [`Read`], [`Write`], and [`Seek`] to
/// it; all buffering logic lives in the buffer itself.
///
/// The [`Seek`] implementation is window-local: positions are offsets into
/// the bytes currently buffered for the stream's read direction (or its
/// write window when reading is disabled), not absolute stream offsets —
/// sockets have none. Seeking outside the buffered span fails.
#[derive(Debug)]
pub struct SockStream {
    buf: SockBuf,
}

impl SockStream {
    /// Opens a fresh socket stream. See [`SockBuf::open`].
    ///
    /// # Errors
    ///
    /// Propagates [`SockBuf::open`] failures.
    pub fn open(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<Self> {
        Ok(Self {
            buf: SockBuf::open(domain, ty, protocol)?,
        })
    }

    /// Opens a fresh socket stream and applies options atomically. See
    /// [`SockBuf::open_with`].
    ///
    /// # Errors
    ///
    /// Propagates [`SockBuf::open_with`] failures.
    pub fn open_with(
        domain: c_int,
        ty: c_int,
        protocol: c_int,
        options: &[SockOpt],
        mode: OpenMode,
    ) -> io::Result<Self> {
        Ok(Self {
            buf: SockBuf::open_with(domain, ty, protocol, options, mode)?,
        })
    }

    /// Wraps an existing descriptor, taking ownership of it. See
    /// [`SockBuf::adopt`].
    #[must_use]
    pub fn adopt(fd: RawFd, mode: OpenMode) -> Self {
        Self {
            buf: SockBuf::adopt(fd, mode),
        }
    }

    /// Wraps an existing buffer.
    #[must_use]
    pub fn new(buf: SockBuf) -> Self {
        Self { buf }
    }

    /// Returns a reference to the underlying buffer.
    #[must_use]
    pub fn get_ref(&self) -> &SockBuf {
        &self.buf
    }

    /// Returns a mutable reference to the underlying buffer.
    pub fn get_mut(&mut self) -> &mut SockBuf {
        &mut self.buf
    }

    /// Consumes the stream and returns the underlying buffer.
    #[must_use]
    pub fn into_inner(self) -> SockBuf {
        self.buf
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn fd(&self) -> RawFd {
        self.buf.fd()
    }

    /// Raw OS error code of the most recent failed syscall, if any.
    #[must_use]
    pub fn last_errno(&self) -> Option<i32> {
        self.buf.last_errno()
    }

    /// Applies a named mutating option. See [`SockBuf::set_option`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure.
    pub fn set_option(&mut self, name: &str, value: &[u8]) -> io::Result<()> {
        self.buf.set_option(name, value)
    }

    /// Evaluates a named query option. See [`SockBuf::get_option`].
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure.
    pub fn get_option(&mut self, name: &str, value: &[u8]) -> io::Result<Vec<u8>> {
        self.buf.get_option(name, value)
    }

    /// Registers or replaces a mutating-option handler.
    pub fn register_set_option(&mut self, name: &str, handler: SetOptFn) {
        self.buf.register_set_option(name, handler);
    }

    /// Registers or replaces a query-option handler.
    pub fn register_get_option(&mut self, name: &str, handler: GetOptFn) {
        self.buf.register_get_option(name, handler);
    }

    /// The source address of the most recent receive.
    #[must_use]
    pub fn source_addr(&self) -> &SockAddr {
        self.buf.source_addr()
    }

    /// The configured destination address.
    #[must_use]
    pub fn destination(&self) -> &SockAddr {
        self.buf.destination()
    }

    /// Configures the destination for sends and implicit connects.
    pub fn set_destination(&mut self, addr: SockAddr) {
        self.buf.set_destination(addr);
    }

    /// Connects to `addr`. See [`SockBuf::connect_to`].
    ///
    /// # Errors
    ///
    /// Propagates connect failures.
    pub fn connect_to(&mut self, addr: &SockAddr) -> io::Result<()> {
        self.buf.connect_to(addr)
    }

    /// The receive-direction control buffer.
    pub fn recv_control(&mut self) -> &mut Ancillary {
        self.buf.recv_control()
    }

    /// The send-direction control buffer.
    pub fn send_control(&mut self) -> &mut Ancillary {
        self.buf.send_control()
    }

    /// Bytes buffered but not yet accepted by the kernel.
    #[must_use]
    pub fn write_remaining(&self) -> usize {
        self.buf.write_remaining()
    }

    fn seek_window(&self) -> (usize, usize, bool) {
        if self.buf.mode().is_read() {
            (self.buf.read_position(), self.buf.read_span(), true)
        } else {
            (self.buf.write_position(), self.buf.write_span(), false)
        }
    }
}

impl Read for SockStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.buf.read(out)
    }
}

impl Write for SockStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buf.flush()
    }
}

impl Seek for SockStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (cursor, span, read_dir) = self.seek_window();
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek overflow"))?,
            SeekFrom::End(delta) => span as i64 + delta,
            SeekFrom::Current(delta) => cursor as i64 + delta,
        };
        let target = usize::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before window start")
        })?;
        if read_dir {
            self.buf.seek_read(target)?;
        } else {
            self.buf.seek_write(target)?;
        }
        Ok(target as u64)
    }
}

#[cfg(test)]
mod tests {
    #![allow(unsafe_code)]

    use super::*;
    use std::os::unix::io::RawFd;

    fn stream_pair() -> (SockStream, SockStream) {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds points at a two-element array as socketpair(2)
        // requires.
        let ret =
            unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        assert_eq!(ret, 0);
        (
            SockStream::adopt(fds[0], OpenMode::read_write()),
            SockStream::adopt(fds[1], OpenMode::read_write()),
        )
    }

    #[test]
    fn std_io_traits_roundtrip() {
        crate::test_utils::init_test_logging();
        let (mut a, mut b) = stream_pair();

        a.write_all(b"facade bytes").unwrap();
        a.flush().unwrap();

        let mut out = vec![0u8; 12];
        b.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"facade bytes");
    }

    #[test]
    fn seek_rewinds_buffered_reads() {
        let (mut a, mut b) = stream_pair();
        a.write_all(b"abcdef").unwrap();
        a.flush().unwrap();

        let mut out = [0u8; 6];
        b.read_exact(&mut out).unwrap();

        b.seek(SeekFrom::Start(2)).unwrap();
        let mut tail = [0u8; 4];
        b.read_exact(&mut tail).unwrap();
        assert_eq!(&tail, b"cdef");
    }

    #[test]
    fn seek_outside_buffered_span_fails() {
        let (_a, mut b) = stream_pair();
        let err = b.seek(SeekFrom::Start(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
