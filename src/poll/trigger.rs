//! Interest-set overlay on top of a [`Poller`].

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use super::interest::Interest;
use super::poller::{Event, Poller};

/// Accumulated per-descriptor interest backed by one [`Poller`].
///
/// [`set`](Trigger::set) merges bits into a descriptor's interest and keeps
/// the poller's registration in sync; [`clear`](Trigger::clear) subtracts
/// bits and deregisters the descriptor once nothing remains. This lets
/// independent parties express interest in the same descriptor without
/// tracking each other.
#[derive(Debug, Default)]
pub struct Trigger {
    interests: Vec<(RawFd, Interest)>,
    poller: Poller,
}

impl Trigger {
    /// Creates a trigger with an empty interest set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interests: Vec::new(),
            poller: Poller::new(),
        }
    }

    /// Merges `interest` into the descriptor's accumulated interest and
    /// registers or updates the backing poller to match.
    pub fn set(&mut self, fd: RawFd, interest: Interest) -> bool {
        if let Some(entry) = self.interests.iter_mut().find(|(h, _)| *h == fd) {
            entry.1 = entry.1.add(interest);
            let merged = entry.1;
            self.poller.update(fd, merged)
        } else {
            self.interests.push((fd, interest));
            self.poller.register(fd, interest)
        }
    }

    /// Clears the given bits from the descriptor's interest. When the
    /// remaining interest is empty the descriptor is deregistered from the
    /// poller entirely. Returns `false` if the descriptor was not tracked.
    pub fn clear(&mut self, fd: RawFd, interest: Interest) -> bool {
        let Some(idx) = self.interests.iter().position(|(h, _)| *h == fd) else {
            return false;
        };
        let remaining = self.interests[idx].1.remove(interest);
        if remaining.is_empty() {
            self.interests.remove(idx);
            self.poller.deregister(fd)
        } else {
            self.interests[idx].1 = remaining;
            self.poller.update(fd, remaining)
        }
    }

    /// Removes the descriptor's entire interest and its poller registration.
    pub fn clear_all(&mut self, fd: RawFd) -> bool {
        self.clear(fd, Interest::both())
    }

    /// The accumulated interest for `fd`, if tracked.
    #[must_use]
    pub fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.interests
            .iter()
            .find(|(h, _)| *h == fd)
            .map(|(_, i)| *i)
    }

    /// Number of descriptors with non-empty interest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interests.len()
    }

    /// Returns true if no interest is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interests.is_empty()
    }

    /// Delegates one readiness check to the backing poller.
    ///
    /// # Errors
    ///
    /// Propagates the poller's OS error.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        self.poller.wait(timeout)
    }

    /// Snapshot copy of the poller's current readiness results, safe for the
    /// caller to retain across subsequent waits.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.poller.events().collect()
    }

    /// The backing poller.
    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_accumulates_interest_bits() {
        crate::test_utils::init_test_logging();
        let mut trigger = Trigger::new();

        assert!(trigger.set(7, Interest::readable()));
        assert!(trigger.set(7, Interest::writable()));

        assert_eq!(trigger.interest(7), Some(Interest::both()));
        assert_eq!(trigger.poller().interest(7), Some(Interest::both()));
        assert_eq!(trigger.len(), 1);
    }

    #[test]
    fn partial_clear_keeps_remaining_interest() {
        let mut trigger = Trigger::new();
        trigger.set(7, Interest::readable());
        trigger.set(7, Interest::writable());

        assert!(trigger.clear(7, Interest::readable()));
        assert_eq!(trigger.interest(7), Some(Interest::writable()));
        assert_eq!(trigger.poller().interest(7), Some(Interest::writable()));
    }

    #[test]
    fn full_clear_deregisters_from_poller() {
        let mut trigger = Trigger::new();
        trigger.set(7, Interest::readable());
        trigger.set(7, Interest::writable());

        assert!(trigger.clear(7, Interest::both()));
        assert_eq!(trigger.interest(7), None);
        assert!(trigger.poller().is_empty());
        assert!(trigger.is_empty());
    }

    #[test]
    fn clear_unknown_descriptor_is_noop() {
        let mut trigger = Trigger::new();
        assert!(!trigger.clear(42, Interest::readable()));
        assert!(!trigger.clear_all(42));
    }

    #[test]
    fn events_snapshot_outlives_later_waits() {
        let mut trigger = Trigger::new();
        trigger.set(7, Interest::readable());

        let snapshot = trigger.events();
        trigger.clear_all(7);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].fd, 7);
    }
}
