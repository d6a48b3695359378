#![allow(unsafe_code)]
//! Buffered non-blocking byte stream over a socket descriptor.
//!
//! This module uses unsafe code for the `socket`, `connect`, `sendmsg`,
//! `recvmsg`, and `close` syscalls and the message-header structures they
//! take.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use libc::c_int;

use super::addr::SockAddr;
use super::ancillary::Ancillary;
use super::options::{GetOptFn, OptionTable, SetOptFn, SockOpt};
use crate::poll::{self, Interest};
use crate::window::{OpenMode, ReadWindow, WriteWindow};

/// Default window capacity for socket buffers, per direction.
pub const DEFAULT_CAPACITY: usize = 16535;

/// Outcome of one non-blocking fill attempt on the read window.
enum Fill {
    Data(usize),
    WouldBlock,
    Eof,
}

/// Outcome of one connect attempt.
enum ConnectStep {
    /// The socket is connected (including the already-connected case).
    Ready,
    /// The connection is in progress; wait for writability and retry.
    Pending,
    Fatal(io::Error),
}

/// Buffered byte stream over one socket descriptor, for stream and datagram
/// sockets alike.
///
/// Transfers go through `sendmsg`/`recvmsg` with per-direction windows,
/// ancillary control buffers, and address records. Sends that would block
/// are deferred (bytes preserved in the window, the call succeeds); reads
/// that would block wait on the descriptor's readiness and retry. A send on
/// an unconnected socket with a configured destination triggers an implicit
/// connect.
///
/// The most recent failed syscall's OS error code is retained for caller
/// inspection via [`last_errno`](SockBuf::last_errno).
///
/// Each buffer owns its descriptor and windows exclusively; moving the
/// buffer transfers that ownership. Concurrent use from multiple threads is
/// not supported.
#[derive(Debug)]
pub struct SockBuf {
    fd: RawFd,
    mode: OpenMode,
    capacity: usize,
    read: Option<ReadWindow>,
    write: Option<WriteWindow>,
    recv_control: Ancillary,
    send_control: Ancillary,
    /// Source of the most recent receive.
    source: SockAddr,
    /// Configured destination for sends and implicit connects.
    dest: SockAddr,
    /// Whether the socket is connectionless (datagram-style). Only such
    /// sockets take a destination in the message header; connection-oriented
    /// ones reach the destination through implicit connect instead.
    connectionless: bool,
    connected: bool,
    /// Raw OS error of the most recent failed syscall; 0 when none.
    last_errno: i32,
    options: OptionTable,
}

impl SockBuf {
    /// Opens a fresh socket of the given domain, type, and protocol with
    /// both directions enabled.
    ///
    /// # Errors
    ///
    /// Fails if the OS cannot allocate the socket.
    pub fn open(domain: c_int, ty: c_int, protocol: c_int) -> io::Result<Self> {
        Self::open_with(domain, ty, protocol, &[], OpenMode::read_write())
    }

    /// Opens a fresh socket and applies the given options atomically.
    ///
    /// Options are applied in order through the same dispatch as
    /// [`set_option`](SockBuf::set_option).
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be allocated or any option handler fails;
    /// on option failure the freshly created descriptor is closed before the
    /// error propagates.
    pub fn open_with(
        domain: c_int,
        ty: c_int,
        protocol: c_int,
        options: &[SockOpt],
        mode: OpenMode,
    ) -> io::Result<Self> {
        // SAFETY: plain socket(2) call.
        let fd = unsafe { libc::socket(domain, ty, protocol) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        tracing::trace!(fd, domain, ty, protocol, "opened socket");
        let mut sock = Self::from_parts(fd, mode);
        sock.connectionless = is_connectionless(ty);
        for opt in options {
            // A failure drops `sock`, closing the descriptor.
            sock.set_option(&opt.name, &opt.value)?;
        }
        Ok(sock)
    }

    /// Wraps an existing descriptor, taking ownership of it.
    ///
    /// The descriptor must not be closed elsewhere afterwards; this buffer
    /// closes it on drop (unless it is one of the reserved descriptors 0-2).
    #[must_use]
    pub fn adopt(fd: RawFd, mode: OpenMode) -> Self {
        let mut sock = Self::from_parts(fd, mode);
        sock.connectionless = is_connectionless(queried_socket_type(fd));
        sock
    }

    fn from_parts(fd: RawFd, mode: OpenMode) -> Self {
        Self {
            fd,
            mode,
            capacity: DEFAULT_CAPACITY,
            read: mode.is_read().then(|| ReadWindow::new(DEFAULT_CAPACITY)),
            write: mode.is_write().then(|| WriteWindow::new(DEFAULT_CAPACITY)),
            recv_control: Ancillary::new(),
            send_control: Ancillary::new(),
            source: SockAddr::unspecified(),
            dest: SockAddr::unspecified(),
            connectionless: false,
            connected: false,
            last_errno: 0,
            options: OptionTable::with_defaults(),
        }
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn fd(&self) -> RawFd {
        self.fd
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

    /// Raw OS error code of the most recent failed syscall, if any.
    #[must_use]
    pub fn last_errno(&self) -> Option<i32> {
        (self.last_errno != 0).then_some(self.last_errno)
    }

    pub(crate) fn record_errno(&mut self, err: &io::Error) {
        self.last_errno = err.raw_os_error().unwrap_or(0);
    }

    /// Applies a named mutating option through the dispatch table.
    ///
    /// Unknown names are silently ignored.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure; a bad address family in a `BIND`
    /// value is a fatal configuration error.
    pub fn set_option(&mut self, name: &str, value: &[u8]) -> io::Result<()> {
        let key = name.to_ascii_uppercase();
        match self.options.lookup_set(&key) {
            Some(handler) => handler(self, value),
            None => {
                tracing::trace!(option = %key, "ignoring unknown set option");
                Ok(())
            }
        }
    }

    /// Evaluates a named query option through the dispatch table.
    ///
    /// Unknown names return an empty value.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure.
    pub fn get_option(&mut self, name: &str, value: &[u8]) -> io::Result<Vec<u8>> {
        let key = name.to_ascii_uppercase();
        match self.options.lookup_get(&key) {
            Some(handler) => handler(self, value),
            None => Ok(Vec::new()),
        }
    }

    /// Registers or replaces a mutating-option handler.
    pub fn register_set_option(&mut self, name: &str, handler: SetOptFn) {
        self.options.register_set(name.to_ascii_uppercase(), handler);
    }

    /// Registers or replaces a query-option handler.
    pub fn register_get_option(&mut self, name: &str, handler: GetOptFn) {
        self.options.register_get(name.to_ascii_uppercase(), handler);
    }

    /// The source address of the most recent receive.
    #[must_use]
    pub fn source_addr(&self) -> &SockAddr {
        &self.source
    }

    /// The configured destination address.
    #[must_use]
    pub fn destination(&self) -> &SockAddr {
        &self.dest
    }

    /// Configures the destination used by sends on an unconnected socket and
    /// by implicit connects. No syscall is made.
    pub fn set_destination(&mut self, addr: SockAddr) {
        self.dest = addr;
    }

    /// Returns true once a connect has succeeded (explicitly or implicitly).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connects to `addr`, recording it as the destination.
    ///
    /// Signal interruptions are retried; a connection still in progress
    /// waits for writability and retries until the socket reports a result.
    /// An already-connected socket reports success.
    ///
    /// # Errors
    ///
    /// A hard connect failure is recorded in
    /// [`last_errno`](SockBuf::last_errno) and returned.
    pub fn connect_to(&mut self, addr: &SockAddr) -> io::Result<()> {
        self.dest = *addr;
        loop {
            match self.connect_step() {
                ConnectStep::Ready => return Ok(()),
                ConnectStep::Pending => {
                    poll::wait_ready(self.fd, Interest::writable())?;
                }
                ConnectStep::Fatal(err) => return Err(err),
            }
        }
    }

    /// Consumes and returns the next byte.
    ///
    /// Same contract as [`PipeBuf::read_byte`](crate::PipeBuf::read_byte):
    /// would-block waits on readiness and retries; only a genuine
    /// zero-length receive reports end of stream.
    ///
    /// # Errors
    ///
    /// Fatal receive failures are recorded in
    /// [`last_errno`](SockBuf::last_errno) and returned.
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
                    poll::wait_ready(self.fd, Interest::readable())?;
                }
            }
        }
    }

    /// Reads buffered bytes into `out`, refilling the window as needed.
    ///
    /// Returns `Ok(0)` only at end of stream (or for an empty `out`).
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`read_byte`](SockBuf::read_byte).
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
                    poll::wait_ready(self.fd, Interest::readable())?;
                }
            }
        }
    }

    /// Number of bytes immediately readable after a non-blocking top-up of
    /// the read window.
    ///
    /// # Errors
    ///
    /// Propagates fatal receive failures.
    pub fn available(&mut self) -> io::Result<usize> {
        if self.read.is_some() {
            let _ = self.fill()?;
        }
        Ok(self.read.as_ref().map_or(0, ReadWindow::len))
    }

    /// Appends one byte to the write window, draining a full window first.
    ///
    /// # Errors
    ///
    /// Fails if the write direction is disabled or a drain hits a fatal
    /// error.
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
    /// Always accepts the whole slice; kernel-rejected bytes are deferred.
    ///
    /// # Errors
    ///
    /// Fails if the write direction is disabled or a drain hits a fatal
    /// error.
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

    /// Drains pending bytes (and staged control data) into the kernel and
    /// applies the write window's grow/shrink policy.
    ///
    /// A send rejected because the socket is not yet connected triggers an
    /// implicit connect when a destination is configured: connect-in-progress
    /// results wait for writability and the send is retried; a hard connect
    /// failure is fatal. Would-block sends are deferred with the unsent
    /// bytes preserved.
    ///
    /// # Errors
    ///
    /// Fatal send and connect failures are recorded in
    /// [`last_errno`](SockBuf::last_errno) and returned.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.write.is_some() {
            let result = self.flush_with_connect();
            if let Some(win) = self.write.as_mut() {
                win.apply_resize_policy();
            }
            result?;
        }
        Ok(())
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

    /// The receive-direction control buffer.
    pub fn recv_control(&mut self) -> &mut Ancillary {
        &mut self.recv_control
    }

    /// The send-direction control buffer. Staged messages are attached to
    /// the next flush and cleared after the first successful send.
    pub fn send_control(&mut self) -> &mut Ancillary {
        &mut self.send_control
    }

    /// Repositions the read cursor within the bytes currently buffered.
    ///
    /// This is window-local repositioning, not a stream seek: positions are
    /// relative to the window's start and invalidated by the next fill.
    ///
    /// # Errors
    ///
    /// Positions past the buffered span are rejected with `InvalidInput`.
    pub fn seek_read(&mut self, pos: usize) -> io::Result<()> {
        if self.read.as_mut().is_some_and(|win| win.seek(pos)) {
            Ok(())
        } else {
            Err(seek_out_of_span())
        }
    }

    /// Repositions the write cursor within the window's allocated span.
    ///
    /// Window-local, like [`seek_read`](SockBuf::seek_read).
    ///
    /// # Errors
    ///
    /// Positions past the allocated span are rejected with `InvalidInput`.
    pub fn seek_write(&mut self, pos: usize) -> io::Result<()> {
        if self.write.as_mut().is_some_and(|win| win.seek(pos)) {
            Ok(())
        } else {
            Err(seek_out_of_span())
        }
    }

    /// Current read cursor offset within the window.
    #[must_use]
    pub fn read_position(&self) -> usize {
        self.read.as_ref().map_or(0, ReadWindow::cursor)
    }

    /// End of the valid buffered read span.
    #[must_use]
    pub fn read_span(&self) -> usize {
        self.read.as_ref().map_or(0, ReadWindow::limit)
    }

    /// Current write cursor offset within the window.
    #[must_use]
    pub fn write_position(&self) -> usize {
        self.write.as_ref().map_or(0, WriteWindow::cursor)
    }

    /// End of the write window's allocated span.
    #[must_use]
    pub fn write_span(&self) -> usize {
        self.write.as_ref().map_or(0, WriteWindow::capacity)
    }

    fn connect_step(&mut self) -> ConnectStep {
        loop {
            // SAFETY: dest holds a validated address of socklen() bytes.
            let ret =
                unsafe { libc::connect(self.fd, self.dest.as_sockaddr_ptr(), self.dest.socklen()) };
            if ret == 0 {
                self.connected = true;
                return ConnectStep::Ready;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => {}
                // Already connected: a success signal, not a retry trigger.
                Some(libc::EISCONN) => {
                    self.connected = true;
                    return ConnectStep::Ready;
                }
                Some(libc::EINPROGRESS | libc::EALREADY) => return ConnectStep::Pending,
                _ if err.kind() == io::ErrorKind::WouldBlock => return ConnectStep::Pending,
                _ => {
                    self.record_errno(&err);
                    tracing::debug!(fd = self.fd, error = %err, "connect failed");
                    return ConnectStep::Fatal(err);
                }
            }
        }
    }

    fn flush_with_connect(&mut self) -> io::Result<()> {
        loop {
            let err = match self.drain() {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if err.raw_os_error() != Some(libc::ENOTCONN) || self.dest.is_unspecified() {
                return Err(err);
            }
            tracing::debug!(fd = self.fd, "send on unconnected socket, connecting implicitly");
            match self.connect_step() {
                ConnectStep::Ready => {}
                ConnectStep::Pending => {
                    poll::wait_ready(self.fd, Interest::writable())?;
                }
                ConnectStep::Fatal(err) => return Err(err),
            }
        }
    }

    /// One non-blocking `recvmsg` into the compacted window, populating the
    /// source-address record and the receive control buffer.
    fn fill(&mut self) -> io::Result<Fill> {
        let fd = self.fd;
        let Some(win) = self.read.as_mut() else {
            return Ok(Fill::Eof);
        };
        win.compact();
        let (spare_ptr, spare_len) = {
            let spare = win.spare_mut();
            (spare.as_mut_ptr(), spare.len())
        };
        if spare_len == 0 {
            return Ok(Fill::Data(0));
        }
        loop {
            // SAFETY: all-zero is a valid msghdr/iovec bit pattern.
            let mut msg: libc::msghdr = unsafe { mem::zeroed() };
            let mut iov = libc::iovec {
                iov_base: spare_ptr.cast::<libc::c_void>(),
                iov_len: spare_len,
            };
            msg.msg_name = self.source.as_mut_sockaddr_ptr().cast::<libc::c_void>();
            msg.msg_namelen = SockAddr::CAPACITY as libc::socklen_t;
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;
            if self.recv_control.capacity() > 0 {
                msg.msg_control = self.recv_control.as_mut_ptr().cast::<libc::c_void>();
                msg.msg_controllen = self.recv_control.capacity() as _;
            }
            // SAFETY: every pointer in msg refers to storage owned by self
            // that outlives the call.
            let ret = unsafe { libc::recvmsg(fd, &mut msg, libc::MSG_DONTWAIT) };
            if ret > 0 {
                let n = ret as usize;
                win.advance_limit(n);
                self.source.set_socklen(msg.msg_namelen);
                let truncated = msg.msg_flags & libc::MSG_CTRUNC != 0;
                self.recv_control
                    .set_valid_len(msg.msg_controllen as usize, truncated);
                return Ok(Fill::Data(n));
            }
            if ret == 0 {
                return Ok(Fill::Eof);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => {}
                io::ErrorKind::WouldBlock => return Ok(Fill::WouldBlock),
                _ => {
                    self.last_errno = err.raw_os_error().unwrap_or(0);
                    return Err(err);
                }
            }
        }
    }

    /// Loops a non-blocking `sendmsg` until the pending span (and any staged
    /// control data) is accepted or the kernel rejects the remainder.
    fn drain(&mut self) -> io::Result<()> {
        let fd = self.fd;
        let Some(win) = self.write.as_mut() else {
            return Ok(());
        };
        let total = win.pending();
        let mut control_pending = !self.send_control.is_empty();
        if total == 0 && !control_pending {
            return Ok(());
        }
        let mut sent = 0;
        loop {
            // SAFETY: all-zero is a valid msghdr/iovec bit pattern.
            let mut msg: libc::msghdr = unsafe { mem::zeroed() };
            let mut iov: libc::iovec = unsafe { mem::zeroed() };
            if self.connectionless && !self.connected && !self.dest.is_unspecified() {
                msg.msg_name = self.dest.as_sockaddr_ptr().cast_mut().cast::<libc::c_void>();
                msg.msg_namelen = self.dest.socklen();
            }
            if sent < total {
                let bytes = &win.pending_bytes()[sent..];
                iov.iov_base = bytes.as_ptr().cast_mut().cast::<libc::c_void>();
                iov.iov_len = bytes.len();
                msg.msg_iov = &mut iov;
                msg.msg_iovlen = 1;
            }
            if control_pending {
                msg.msg_control = self.send_control.as_mut_ptr().cast::<libc::c_void>();
                msg.msg_controllen = self.send_control.len() as _;
            }
            // SAFETY: every pointer in msg refers to storage owned by self
            // that outlives the call; the kernel does not write through
            // msg_name on send.
            let ret = unsafe { libc::sendmsg(fd, &msg, libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL) };
            if ret >= 0 {
                if control_pending {
                    // Control data goes out at most once per flush.
                    self.send_control.clear();
                    control_pending = false;
                }
                sent += ret as usize;
                if sent >= total {
                    win.mark_flushed();
                    return Ok(());
                }
                continue;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => {}
                // Already connected: drop the stale destination and resend.
                Some(libc::EISCONN) => self.connected = true,
                _ if err.kind() == io::ErrorKind::WouldBlock => {
                    win.consume_front(sent);
                    return Ok(());
                }
                _ => {
                    win.consume_front(sent);
                    self.last_errno = err.raw_os_error().unwrap_or(0);
                    tracing::debug!(fd, error = %err, "socket send failed");
                    return Err(err);
                }
            }
        }
    }
}

impl Drop for SockBuf {
    fn drop(&mut self) {
        // Descriptors 0-2 are externally owned and never closed here.
        if self.fd > 2 {
            // SAFETY: the descriptor is owned by this buffer and still open.
            unsafe { libc::close(self.fd) };
        }
    }
}

fn write_side_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "socket write direction disabled")
}

fn is_connectionless(ty: c_int) -> bool {
    // Mask off SOCK_NONBLOCK/SOCK_CLOEXEC, which Linux packs into the type.
    let base = ty & 0xf;
    base != libc::SOCK_STREAM && base != libc::SOCK_SEQPACKET
}

/// The socket type of an adopted descriptor, via `SO_TYPE`.
fn queried_socket_type(fd: RawFd) -> c_int {
    let mut ty: c_int = libc::SOCK_STREAM;
    let mut len = mem::size_of::<c_int>() as libc::socklen_t;
    // SAFETY: ty/len describe a live c_int-sized out-parameter.
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_TYPE,
            std::ptr::addr_of_mut!(ty).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if ret != 0 {
        // Treat an unqueryable descriptor as connection-oriented; sends then
        // simply never carry an address.
        return libc::SOCK_STREAM;
    }
    ty
}

fn seek_out_of_span() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        "position outside the buffered window span",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_pair() -> (SockBuf, SockBuf) {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds points at a two-element array as socketpair(2)
        // requires.
        let ret =
            unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        assert_eq!(ret, 0);
        (
            SockBuf::adopt(fds[0], OpenMode::read_write()),
            SockBuf::adopt(fds[1], OpenMode::read_write()),
        )
    }

    #[test]
    fn stream_pair_roundtrip() {
        crate::test_utils::init_test_logging();
        let (mut a, mut b) = stream_pair();

        a.write(b"over the pair").unwrap();
        a.flush().unwrap();
        assert_eq!(a.write_remaining(), 0);

        let mut out = vec![0u8; 13];
        let mut got = 0;
        while got < out.len() {
            got += b.read(&mut out[got..]).unwrap();
        }
        assert_eq!(&out, b"over the pair");
    }

    #[test]
    fn peer_close_reports_end_of_stream() {
        let (mut a, mut b) = stream_pair();
        a.write(b"z").unwrap();
        a.flush().unwrap();
        drop(a);

        assert_eq!(b.read_byte().unwrap(), Some(b'z'));
        assert_eq!(b.read_byte().unwrap(), None);
    }

    #[test]
    fn unknown_options_are_ignored_or_empty() {
        let (mut a, _b) = stream_pair();
        a.set_option("NoDelay", &[1]).unwrap();
        assert_eq!(a.get_option("PEERCRED", &[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn registered_option_handler_is_dispatched() {
        fn reject(_: &mut SockBuf, _: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "rejected"))
        }
        let (mut a, _b) = stream_pair();
        a.register_set_option("veto", reject);

        let err = a.set_option("VETO", &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn bind_failure_records_errno() {
        let (mut a, _b) = stream_pair();
        let addr = SockAddr::unix("/nonexistent-dir-for-sure/x.sock").unwrap();
        let err = a.set_option("bind", &addr.to_bytes()).unwrap_err();

        assert_eq!(err.raw_os_error(), a.last_errno());
        assert!(a.last_errno().is_some());
    }

    #[test]
    fn bind_with_unknown_family_is_fatal() {
        let (mut a, _b) = stream_pair();
        let mut bytes = vec![0u8; 16];
        bytes[..2].copy_from_slice(&(libc::AF_PACKET as libc::sa_family_t).to_ne_bytes());

        let err = a.set_option("BIND", &bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn seek_read_rewinds_within_the_window() {
        let (mut a, mut b) = stream_pair();
        a.write(b"abcd").unwrap();
        a.flush().unwrap();

        assert_eq!(b.read_byte().unwrap(), Some(b'a'));
        assert_eq!(b.read_byte().unwrap(), Some(b'b'));
        b.seek_read(0).unwrap();
        assert_eq!(b.read_byte().unwrap(), Some(b'a'));

        let err = b.seek_read(b.read_span() + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn write_only_direction_rejects_reads() {
        let (a, _b) = stream_pair();
        let fd = a.fd();
        std::mem::forget(a);
        let mut wr = SockBuf::adopt(fd, OpenMode::write_only());

        assert_eq!(wr.read_byte().unwrap(), None);
        assert_eq!(wr.available().unwrap(), 0);
    }
}
