#![allow(unsafe_code)]
//! Descriptor-readiness polling: a `poll(2)` wrapper and an interest-set
//! overlay.
//!
//! This module uses unsafe code for the single-descriptor `poll(2)` wait the
//! stream buffers block on.
//!
//! Two layers are provided:
//!
//! - [`Poller`]: owns an ordered collection of (descriptor, requested-events)
//!   entries and performs one multiplexed readiness check with a timeout.
//! - [`Trigger`]: overlays a per-descriptor accumulated interest mask on top
//!   of a [`Poller`], merging and clearing interest bits while keeping the
//!   poller's registration in sync.
//!
//! The stream buffers do not go through this registry for their own blocking;
//! they wait on their single descriptor directly. The registry exists for
//! callers managing many streams at once.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use nbstream::{Interest, Trigger};
//!
//! let mut trigger = Trigger::new();
//! trigger.set(5, Interest::readable());
//! trigger.set(5, Interest::writable());
//!
//! let ready = trigger.wait(Some(Duration::from_millis(50)))?;
//! for event in trigger.events() {
//!     if event.readiness.is_readable() {
//!         // pull bytes from the stream registered under event.fd
//!     }
//! }
//! # std::io::Result::Ok(())
//! ```

pub mod interest;
pub mod poller;
pub mod trigger;

pub use interest::{Interest, Readiness};
pub use poller::{Event, Poller};
pub use trigger::Trigger;

use std::io;
use std::os::unix::io::RawFd;

/// Blocks until `fd` reports any of the requested events (or a hangup/error
/// condition, which `poll(2)` reports regardless). Signal interruptions are
/// retried; the caller retries its syscall to discover the real condition
/// behind a hangup or error wake-up.
pub(crate) fn wait_ready(fd: RawFd, interest: Interest) -> io::Result<Readiness> {
    let mut pfd = libc::pollfd {
        fd,
        events: interest.bits(),
        revents: 0,
    };
    loop {
        // SAFETY: pfd is a live pollfd and the length is one.
        let ret = unsafe { libc::poll(&mut pfd, 1, -1) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(Readiness::from_bits(pfd.revents));
    }
}
