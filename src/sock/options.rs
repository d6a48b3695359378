#![allow(unsafe_code)]
//! Named socket options and their dispatch table.
//!
//! This module uses unsafe code for the `bind`, `listen`, `accept`, and
//! `getsockname` syscalls behind the built-in handlers.
//!
//! An option is a (case-insensitive name, opaque byte value) pair. The
//! [`SockBuf`] owns a table mapping names to handler functions; callers
//! extend the supported set by registering handlers, without the buffer's
//! public surface changing. Unknown mutating options are silently ignored
//! and unknown queries return an empty value, so option lists can be passed
//! through layers that only understand a subset.
//!
//! Built-in handlers and their value encodings:
//!
//! | name       | kind  | value                                            |
//! |------------|-------|--------------------------------------------------|
//! | `BIND`     | set   | raw sockaddr bytes (validated address family)    |
//! | `LISTEN`   | set   | native-endian `i32` backlog                      |
//! | `ACCEPT`   | get   | none; returns the accepted fd as native `i32`    |
//! | `SOCKNAME` | get   | none; returns the locally bound sockaddr bytes   |

use std::io;

use super::addr::SockAddr;
use super::buffer::SockBuf;

/// A named option: case-insensitive text name plus an opaque byte value
/// whose encoding is option-specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SockOpt {
    /// The option name; matched case-insensitively.
    pub name: String,
    /// The option value, encoded as the handler expects.
    pub value: Vec<u8>,
}

impl SockOpt {
    /// Builds an option from a name and a pre-encoded value.
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A `BIND` option for the given address.
    #[must_use]
    pub fn bind(addr: &SockAddr) -> Self {
        Self::new("BIND", addr.to_bytes())
    }

    /// A `LISTEN` option with the given backlog.
    #[must_use]
    pub fn listen(backlog: i32) -> Self {
        Self::new("LISTEN", backlog.to_ne_bytes().to_vec())
    }
}

/// Handler for a mutating option.
pub type SetOptFn = fn(&mut SockBuf, &[u8]) -> io::Result<()>;

/// Handler for a query option. Returns the encoded result value.
pub type GetOptFn = fn(&mut SockBuf, &[u8]) -> io::Result<Vec<u8>>;

/// Name-to-handler dispatch table owned by a [`SockBuf`].
#[derive(Debug)]
pub(crate) struct OptionTable {
    set: Vec<(String, SetOptFn)>,
    get: Vec<(String, GetOptFn)>,
}

impl OptionTable {
    /// A table pre-populated with the built-in handlers.
    pub(crate) fn with_defaults() -> Self {
        Self {
            set: vec![
                ("BIND".to_owned(), opt_bind as SetOptFn),
                ("LISTEN".to_owned(), opt_listen as SetOptFn),
            ],
            get: vec![
                ("ACCEPT".to_owned(), opt_accept as GetOptFn),
                ("SOCKNAME".to_owned(), opt_sockname as GetOptFn),
            ],
        }
    }

    pub(crate) fn lookup_set(&self, name: &str) -> Option<SetOptFn> {
        self.set.iter().find(|(n, _)| n == name).map(|(_, f)| *f)
    }

    pub(crate) fn lookup_get(&self, name: &str) -> Option<GetOptFn> {
        self.get.iter().find(|(n, _)| n == name).map(|(_, f)| *f)
    }

    /// Registers or replaces a mutating-option handler.
    pub(crate) fn register_set(&mut self, name: String, handler: SetOptFn) {
        if let Some(entry) = self.set.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = handler;
        } else {
            self.set.push((name, handler));
        }
    }

    /// Registers or replaces a query-option handler.
    pub(crate) fn register_get(&mut self, name: String, handler: GetOptFn) {
        if let Some(entry) = self.get.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = handler;
        } else {
            self.get.push((name, handler));
        }
    }
}

/// `BIND`: binds the socket to the address encoded in the value.
fn opt_bind(sock: &mut SockBuf, value: &[u8]) -> io::Result<()> {
    let addr = SockAddr::from_bytes(value)?;
    // SAFETY: addr holds a validated address of socklen() bytes.
    let ret = unsafe { libc::bind(sock.fd(), addr.as_sockaddr_ptr(), addr.socklen()) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        sock.record_errno(&err);
        return Err(err);
    }
    Ok(())
}

/// `LISTEN`: marks the socket passive with the backlog in the value.
fn opt_listen(sock: &mut SockBuf, value: &[u8]) -> io::Result<()> {
    let backlog: [u8; 4] = value.try_into().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "LISTEN expects a native-endian i32 backlog",
        )
    })?;
    // SAFETY: plain listen(2) call.
    let ret = unsafe { libc::listen(sock.fd(), i32::from_ne_bytes(backlog)) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        sock.record_errno(&err);
        return Err(err);
    }
    Ok(())
}

/// `ACCEPT`: accepts one pending connection, returning the new descriptor
/// as native-endian `i32` bytes.
fn opt_accept(sock: &mut SockBuf, _value: &[u8]) -> io::Result<Vec<u8>> {
    // SAFETY: null name/namelen asks accept(2) to discard the peer address.
    let fd = unsafe { libc::accept(sock.fd(), std::ptr::null_mut(), std::ptr::null_mut()) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        sock.record_errno(&err);
        return Err(err);
    }
    Ok(fd.to_ne_bytes().to_vec())
}

/// `SOCKNAME`: returns the locally bound address as raw sockaddr bytes.
fn opt_sockname(sock: &mut SockBuf, _value: &[u8]) -> io::Result<Vec<u8>> {
    let mut addr = SockAddr::unspecified();
    let mut len = SockAddr::CAPACITY as libc::socklen_t;
    // SAFETY: the storage has CAPACITY bytes and len describes it.
    let ret = unsafe { libc::getsockname(sock.fd(), addr.as_mut_sockaddr_ptr(), &mut len) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        sock.record_errno(&err);
        return Err(err);
    }
    addr.set_socklen(len);
    Ok(addr.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_value_is_native_endian_backlog() {
        let opt = SockOpt::listen(16);
        assert_eq!(opt.name, "LISTEN");
        assert_eq!(i32::from_ne_bytes(opt.value.try_into().unwrap()), 16);
    }

    #[test]
    fn bind_value_is_the_sockaddr_encoding() {
        let addr = SockAddr::unix("/tmp/opt.sock").unwrap();
        let opt = SockOpt::bind(&addr);
        assert_eq!(opt.name, "BIND");
        assert_eq!(opt.value, addr.to_bytes());
    }

    #[test]
    fn table_lookup_replaces_on_reregister() {
        fn noop(_: &mut SockBuf, _: &[u8]) -> io::Result<()> {
            Ok(())
        }
        let mut table = OptionTable::with_defaults();
        assert!(table.lookup_set("BIND").is_some());
        assert!(table.lookup_set("NODELAY").is_none());

        table.register_set("BIND".to_owned(), noop);
        assert_eq!(table.lookup_set("BIND"), Some(noop as SetOptFn));
    }
}
