#![allow(unsafe_code)]
//! Ancillary (control) data buffers for socket messages.
//!
//! This module uses unsafe code for the libc control-message layout macros
//! (`CMSG_SPACE`, `CMSG_LEN`, `CMSG_DATA`).
//!
//! Each [`SockBuf`](super::SockBuf) direction owns one [`Ancillary`] buffer.
//! On the send side the buffer is attached to the next `sendmsg` and cleared
//! after the first successful send, so control data goes out at most once per
//! flush. On the receive side a buffer with nonzero capacity is attached to
//! every `recvmsg`, and [`Ancillary::messages`] parses what arrived.
//!
//! # File descriptor passing
//!
//! ```no_run
//! use nbstream::{ancillary_space_for_fds, SockBuf};
//! # fn example(mut tx: SockBuf, mut rx: SockBuf, fd: std::os::unix::io::RawFd) -> std::io::Result<()> {
//! tx.send_control().add_fds(&[fd]);
//! tx.write(b"one file descriptor attached")?;
//! tx.flush()?;
//!
//! rx.recv_control().set_capacity(ancillary_space_for_fds(1));
//! let mut out = [0u8; 64];
//! rx.read(&mut out)?;
//! for msg in rx.recv_control().messages() {
//!     // match on AncillaryMessage::ScmRights(..) and adopt the descriptors
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Received descriptors are raw: wrap them in an owning type or close them
//! explicitly, or they leak.

use std::marker::PhantomData;
use std::mem;
use std::os::unix::io::RawFd;

/// Bytes of control-buffer capacity needed to receive `count` descriptors.
#[must_use]
pub fn ancillary_space_for_fds(count: usize) -> usize {
    let payload = count * mem::size_of::<RawFd>();
    // SAFETY: CMSG_SPACE is a pure size computation.
    unsafe { libc::CMSG_SPACE(payload as u32) as usize }
}

/// Owned buffer of socket control messages.
///
/// Tracks the valid length separately from the allocated capacity: capacity
/// is what `recvmsg` may fill, length is what is currently meaningful (either
/// staged for send or received).
#[derive(Debug, Default)]
pub struct Ancillary {
    buffer: Vec<u8>,
    /// Length of valid control data within the buffer.
    length: usize,
    /// Whether the kernel truncated control data on the last receive.
    truncated: bool,
}

impl Ancillary {
    /// An empty buffer with no capacity; it is not attached to messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed buffer with `capacity` bytes available for receives.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity],
            length: 0,
            truncated: false,
        }
    }

    /// Resizes the buffer to `capacity` bytes and discards any staged or
    /// received messages.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.buffer.clear();
        self.buffer.resize(capacity, 0);
        self.length = 0;
        self.truncated = false;
    }

    /// Allocated capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Length of valid control data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if no control data is staged or received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true if the last receive truncated control data. Truncation
    /// can leak descriptors the kernel already allocated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Discards staged or received messages, keeping the capacity.
    pub fn clear(&mut self) {
        self.length = 0;
        self.truncated = false;
    }

    /// Stages file descriptors to be sent as `SCM_RIGHTS`, growing the
    /// buffer as needed.
    #[allow(clippy::cast_ptr_alignment)]
    pub fn add_fds(&mut self, fds: &[RawFd]) {
        if fds.is_empty() {
            return;
        }
        let payload = mem::size_of_val(fds);
        // SAFETY: CMSG_SPACE/CMSG_LEN are pure size computations.
        let space = unsafe { libc::CMSG_SPACE(payload as u32) } as usize;
        if self.length + space > self.buffer.len() {
            self.buffer.resize(self.length + space, 0);
        }
        // SAFETY: the buffer holds at least `length + space` bytes, so the
        // header and payload writes stay in bounds.
        unsafe {
            let cmsg = self
                .buffer
                .as_mut_ptr()
                .add(self.length)
                .cast::<libc::cmsghdr>();
            (*cmsg).cmsg_len = libc::CMSG_LEN(payload as u32) as _;
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
            std::ptr::copy_nonoverlapping(fds.as_ptr(), data, fds.len());
        }
        self.length += space;
    }

    /// Iterates over the parsed control messages.
    #[must_use]
    pub fn messages(&self) -> AncillaryMessages<'_> {
        AncillaryMessages {
            buffer: &self.buffer[..self.length],
            current: 0,
            _marker: PhantomData,
        }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    /// Records the valid length reported by a receive.
    pub(crate) fn set_valid_len(&mut self, len: usize, truncated: bool) {
        self.length = len.min(self.buffer.len());
        self.truncated = truncated;
    }
}

/// Iterator over parsed ancillary messages.
#[derive(Debug)]
pub struct AncillaryMessages<'a> {
    buffer: &'a [u8],
    current: usize,
    _marker: PhantomData<&'a ()>,
}

impl<'a> Iterator for AncillaryMessages<'a> {
    type Item = AncillaryMessage<'a>;

    #[allow(clippy::cast_ptr_alignment)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current + mem::size_of::<libc::cmsghdr>() > self.buffer.len() {
            return None;
        }
        // SAFETY: the span was either built by add_fds or filled by recvmsg,
        // and the header bounds were checked above.
        unsafe {
            let cmsg = self
                .buffer
                .as_ptr()
                .add(self.current)
                .cast::<libc::cmsghdr>();
            let cmsg_len = (*cmsg).cmsg_len as usize;
            if cmsg_len < mem::size_of::<libc::cmsghdr>() {
                return None;
            }
            let data_len = cmsg_len - mem::size_of::<libc::cmsghdr>();
            let space = libc::CMSG_SPACE(data_len as u32) as usize;
            self.current += space.max(mem::size_of::<libc::cmsghdr>());

            let level = (*cmsg).cmsg_level;
            let ty = (*cmsg).cmsg_type;
            let data = libc::CMSG_DATA(cmsg);
            if level == libc::SOL_SOCKET && ty == libc::SCM_RIGHTS {
                let count = data_len / mem::size_of::<RawFd>();
                let fds = std::slice::from_raw_parts(data.cast::<RawFd>(), count);
                Some(AncillaryMessage::ScmRights(ScmRights { fds, next: 0 }))
            } else {
                Some(AncillaryMessage::Unknown { level, ty })
            }
        }
    }
}

/// A parsed control message.
#[derive(Debug)]
pub enum AncillaryMessage<'a> {
    /// File descriptors passed via `SCM_RIGHTS`.
    ScmRights(ScmRights<'a>),
    /// A control message this crate does not interpret.
    Unknown {
        /// The protocol level, e.g. `SOL_SOCKET`.
        level: i32,
        /// The message type within that level.
        ty: i32,
    },
}

/// File descriptors received via `SCM_RIGHTS`.
///
/// The descriptors are raw and owned by the receiver once iterated; wrap
/// them in an owning type or close them explicitly.
#[derive(Debug)]
pub struct ScmRights<'a> {
    fds: &'a [RawFd],
    next: usize,
}

impl Iterator for ScmRights<'_> {
    type Item = RawFd;

    fn next(&mut self) -> Option<RawFd> {
        let fd = self.fds.get(self.next).copied()?;
        self.next += 1;
        Some(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_fds_parse_back() {
        let mut anc = Ancillary::new();
        anc.add_fds(&[3, 4, 5]);
        assert!(!anc.is_empty());

        let mut msgs = anc.messages();
        match msgs.next() {
            Some(AncillaryMessage::ScmRights(rights)) => {
                assert_eq!(rights.collect::<Vec<_>>(), vec![3, 4, 5]);
            }
            other => unreachable!("expected ScmRights, got {other:?}"),
        }
        assert!(msgs.next().is_none());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut anc = Ancillary::with_capacity(ancillary_space_for_fds(2));
        let cap = anc.capacity();
        anc.add_fds(&[9]);
        anc.clear();

        assert!(anc.is_empty());
        assert!(!anc.is_truncated());
        assert_eq!(anc.capacity(), cap);
        assert!(anc.messages().next().is_none());
    }

    #[test]
    fn empty_buffer_yields_no_messages() {
        let anc = Ancillary::new();
        assert_eq!(anc.capacity(), 0);
        assert!(anc.messages().next().is_none());
    }

    #[test]
    fn add_fds_grows_a_small_buffer() {
        let mut anc = Ancillary::with_capacity(4);
        anc.add_fds(&[7, 8]);
        assert!(anc.capacity() >= anc.len());
        match anc.messages().next() {
            Some(AncillaryMessage::ScmRights(rights)) => {
                assert_eq!(rights.collect::<Vec<_>>(), vec![7, 8]);
            }
            other => unreachable!("expected ScmRights, got {other:?}"),
        }
    }
}
