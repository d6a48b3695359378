#![allow(unsafe_code)]
//! Readiness poller over an ordered descriptor list.
//!
//! This module uses unsafe code for the `poll(2)` syscall.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use libc::c_int;

use super::interest::{Interest, Readiness};

/// One entry of a readiness snapshot: a descriptor, the events requested for
/// it, and the events the kernel reported at the last [`Poller::wait`].
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// The registered descriptor.
    pub fd: RawFd,
    /// The requested event mask.
    pub interest: Interest,
    /// What the kernel reported for this descriptor.
    pub readiness: Readiness,
}

/// Thin wrapper around `poll(2)` owning an ordered collection of
/// (descriptor, requested-events) entries.
///
/// Each descriptor is unique within the collection; a single poll syscall
/// covers the whole list. Registration order is insertion order. Membership
/// operations report rejection (duplicate register, unknown update or
/// deregister) as a `false` no-op result rather than an error.
#[derive(Default)]
pub struct Poller {
    fds: Vec<libc::pollfd>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("registered", &self.fds.len())
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Creates an empty poller.
    #[must_use]
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Returns true if no descriptors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Adds a new entry. Returns `false` without side effects if the
    /// descriptor is already registered.
    pub fn register(&mut self, fd: RawFd, interest: Interest) -> bool {
        if self.position(fd).is_some() {
            tracing::trace!(fd, "register rejected: descriptor already present");
            return false;
        }
        self.fds.push(libc::pollfd {
            fd,
            events: interest.bits(),
            revents: 0,
        });
        true
    }

    /// Replaces the requested mask for an existing entry. Returns `false` if
    /// the descriptor is not registered.
    pub fn update(&mut self, fd: RawFd, interest: Interest) -> bool {
        let Some(idx) = self.position(fd) else {
            return false;
        };
        self.fds[idx].events = interest.bits();
        true
    }

    /// Removes the entry for `fd`. Returns `false` if it was not registered.
    pub fn deregister(&mut self, fd: RawFd) -> bool {
        let Some(idx) = self.position(fd) else {
            return false;
        };
        self.fds.remove(idx);
        true
    }

    /// The requested mask for `fd`, if registered.
    #[must_use]
    pub fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.position(fd)
            .map(|idx| Interest::from_bits(self.fds[idx].events))
    }

    /// Issues one readiness check over all registered entries.
    ///
    /// `None` waits indefinitely. Returns the number of entries with events
    /// pending; the per-entry results are available through [`events`].
    ///
    /// # Errors
    ///
    /// Any `poll(2)` failure, including signal interruption, surfaces as the
    /// corresponding OS error.
    ///
    /// [`events`]: Poller::events
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let millis = timeout.map_or(-1, |d| c_int::try_from(d.as_millis()).unwrap_or(c_int::MAX));
        // SAFETY: the pointer and length describe the live pollfd vector,
        // which outlives the call.
        let ret = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                millis,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        tracing::trace!(ready = ret, registered = self.fds.len(), "poll returned");
        Ok(ret as usize)
    }

    /// Iterates over the current entries and the readiness recorded by the
    /// most recent [`wait`](Poller::wait), in registration order.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.fds.iter().map(|pfd| Event {
            fd: pfd.fd,
            interest: Interest::from_bits(pfd.events),
            readiness: Readiness::from_bits(pfd.revents),
        })
    }

    fn position(&self, fd: RawFd) -> Option<usize> {
        self.fds.iter().position(|pfd| pfd.fd == fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe_fds() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds points at a two-element array as pipe(2) requires.
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(ret, 0);
        (fds[0], fds[1])
    }

    fn close_pair((r, w): (RawFd, RawFd)) {
        // SAFETY: both descriptors came from pipe(2) above and are still open.
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn duplicate_register_is_rejected() {
        crate::test_utils::init_test_logging();
        let pair = pipe_fds();
        let mut poller = Poller::new();

        assert!(poller.register(pair.0, Interest::readable()));
        assert!(!poller.register(pair.0, Interest::writable()));
        assert_eq!(poller.len(), 1);
        assert_eq!(poller.interest(pair.0), Some(Interest::readable()));
        close_pair(pair);
    }

    #[test]
    fn update_and_deregister_unknown_are_noops() {
        let mut poller = Poller::new();
        assert!(!poller.update(42, Interest::readable()));
        assert!(!poller.deregister(42));
        assert!(poller.is_empty());
    }

    #[test]
    fn wait_reports_writable_pipe_end() {
        crate::test_utils::init_test_logging();
        let pair = pipe_fds();
        let mut poller = Poller::new();
        poller.register(pair.1, Interest::writable());
        poller.register(pair.0, Interest::readable());

        let ready = poller.wait(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(ready, 1);

        let events: Vec<Event> = poller.events().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].fd, pair.1);
        assert!(events[0].readiness.is_writable());
        assert!(events[1].readiness.is_empty());
        close_pair(pair);
    }

    #[test]
    fn wait_times_out_with_nothing_ready() {
        let pair = pipe_fds();
        let mut poller = Poller::new();
        poller.register(pair.0, Interest::readable());

        let ready = poller.wait(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(ready, 0);
        close_pair(pair);
    }
}
