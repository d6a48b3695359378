//! Interest and readiness flags for descriptor polling.

use libc::c_short;

/// Events a caller wants to be notified about for a descriptor.
///
/// Wraps the `poll(2)` request bits. Hangup and error conditions are always
/// reported by the kernel and need not be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(c_short);

impl Interest {
    /// Interest in readable events (`POLLIN`).
    pub const READABLE: Interest = Interest(libc::POLLIN);
    /// Interest in writable events (`POLLOUT`).
    pub const WRITABLE: Interest = Interest(libc::POLLOUT);

    /// Returns interest in readable events.
    #[must_use]
    pub const fn readable() -> Self {
        Self::READABLE
    }

    /// Returns interest in writable events.
    #[must_use]
    pub const fn writable() -> Self {
        Self::WRITABLE
    }

    /// Returns interest in both readable and writable events.
    #[must_use]
    pub const fn both() -> Self {
        Interest(libc::POLLIN | libc::POLLOUT)
    }

    /// Returns true if readable interest is set.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        self.0 & libc::POLLIN != 0
    }

    /// Returns true if writable interest is set.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.0 & libc::POLLOUT != 0
    }

    /// Returns true if no events are requested.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combines interests.
    #[must_use]
    pub const fn add(self, other: Interest) -> Self {
        Interest(self.0 | other.0)
    }

    /// Removes interest bits.
    #[must_use]
    pub const fn remove(self, other: Interest) -> Self {
        Interest(self.0 & !other.0)
    }

    /// The raw `poll(2)` event bits.
    #[must_use]
    pub const fn bits(self) -> c_short {
        self.0
    }

    pub(crate) const fn from_bits(bits: c_short) -> Self {
        Interest(bits)
    }
}

/// Events the kernel reported for a descriptor after a wait.
///
/// Wraps the `poll(2)` `revents` bits, which can include conditions that were
/// never requested (hangup, error, invalid descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness(c_short);

impl Readiness {
    /// A readiness value with no events set.
    pub const EMPTY: Readiness = Readiness(0);

    /// Returns true if the descriptor is readable without blocking.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        self.0 & libc::POLLIN != 0
    }

    /// Returns true if the descriptor is writable without blocking.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.0 & libc::POLLOUT != 0
    }

    /// Returns true if the peer hung up.
    #[must_use]
    pub const fn is_hangup(self) -> bool {
        self.0 & libc::POLLHUP != 0
    }

    /// Returns true if an error condition is pending on the descriptor.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 & libc::POLLERR != 0
    }

    /// Returns true if the descriptor was not open at wait time.
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 & libc::POLLNVAL != 0
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The raw `poll(2)` revents bits.
    #[must_use]
    pub const fn bits(self) -> c_short {
        self.0
    }

    pub(crate) const fn from_bits(bits: c_short) -> Self {
        Readiness(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_accumulates_and_removes() {
        let both = Interest::READABLE.add(Interest::WRITABLE);
        assert!(both.is_readable());
        assert!(both.is_writable());

        let read_only = both.remove(Interest::WRITABLE);
        assert!(read_only.is_readable());
        assert!(!read_only.is_writable());
        assert!(read_only.remove(Interest::READABLE).is_empty());
    }

    #[test]
    fn readiness_reports_unrequested_conditions() {
        let r = Readiness::from_bits(libc::POLLIN | libc::POLLHUP);
        assert!(r.is_readable());
        assert!(r.is_hangup());
        assert!(!r.is_error());
        assert!(Readiness::EMPTY.is_empty());
    }
}
