#![allow(unsafe_code)]
//! Socket address records.
//!
//! This module uses unsafe code to view `sockaddr_storage` as the concrete
//! per-family sockaddr structures and as raw bytes.

use std::ffi::OsStr;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{sa_family_t, sockaddr_storage, socklen_t};

/// Validation failure for an encoded socket address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    /// The address family is not one this crate knows how to size.
    #[error("unsupported address family {0}")]
    UnsupportedFamily(u16),
    /// A filesystem path does not fit in `sockaddr_un.sun_path`.
    #[error("socket path of {0} bytes does not fit in sockaddr_un")]
    PathTooLong(usize),
    /// The encoded address is shorter than an address-family tag.
    #[error("address of {0} bytes is shorter than an address-family tag")]
    Truncated(usize),
    /// The encoded length does not match the family's sockaddr size.
    #[error("address length {len} does not match family {family}")]
    LengthMismatch {
        /// The declared address family.
        family: u16,
        /// The encoded byte length.
        len: usize,
    },
}

impl From<AddrError> for io::Error {
    fn from(err: AddrError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// A variable-length socket address plus its declared length.
///
/// Backed by a `sockaddr_storage`, so it can hold any address the kernel
/// reports. Receives overwrite the record in place; sends pass it through
/// unchanged.
#[derive(Clone, Copy)]
pub struct SockAddr {
    storage: sockaddr_storage,
    len: socklen_t,
}

impl SockAddr {
    /// Storage capacity available to the kernel when it writes an address.
    pub(crate) const CAPACITY: usize = mem::size_of::<sockaddr_storage>();

    /// An empty record: family `AF_UNSPEC`, zero length.
    #[must_use]
    pub fn unspecified() -> Self {
        Self {
            // SAFETY: all-zero is a valid sockaddr_storage bit pattern.
            storage: unsafe { mem::zeroed() },
            len: 0,
        }
    }

    /// A unix-domain address for a filesystem path.
    ///
    /// # Errors
    ///
    /// Fails if the path does not fit in `sun_path`.
    pub fn unix<P: AsRef<Path>>(path: P) -> Result<Self, AddrError> {
        let bytes = path.as_ref().as_os_str().as_bytes();
        let mut addr = Self::unspecified();
        // SAFETY: sockaddr_storage is large enough for sockaddr_un and the
        // all-zero pattern is valid for it.
        let sun = unsafe { &mut *std::ptr::addr_of_mut!(addr.storage).cast::<libc::sockaddr_un>() };
        if bytes.len() >= sun.sun_path.len() {
            return Err(AddrError::PathTooLong(bytes.len()));
        }
        sun.sun_family = libc::AF_UNIX as sa_family_t;
        for (dst, src) in sun.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }
        addr.len = (sun_path_offset() + bytes.len()) as socklen_t;
        Ok(addr)
    }

    /// Decodes a raw sockaddr byte encoding, validating it against the known
    /// address families.
    ///
    /// # Errors
    ///
    /// Unknown families and length mismatches are rejected; such a value is
    /// a configuration error, not something to pass to the kernel.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddrError> {
        let tag = mem::size_of::<sa_family_t>();
        if bytes.len() < tag {
            return Err(AddrError::Truncated(bytes.len()));
        }
        let mut family_bytes = [0u8; 2];
        family_bytes.copy_from_slice(&bytes[..tag]);
        let family = sa_family_t::from_ne_bytes(family_bytes);
        if bytes.len() > Self::CAPACITY {
            return Err(AddrError::LengthMismatch {
                family,
                len: bytes.len(),
            });
        }
        match libc::c_int::from(family) {
            libc::AF_UNIX => {}
            libc::AF_INET => {
                if bytes.len() != mem::size_of::<libc::sockaddr_in>() {
                    return Err(AddrError::LengthMismatch {
                        family,
                        len: bytes.len(),
                    });
                }
            }
            libc::AF_INET6 => {
                if bytes.len() != mem::size_of::<libc::sockaddr_in6>() {
                    return Err(AddrError::LengthMismatch {
                        family,
                        len: bytes.len(),
                    });
                }
            }
            _ => return Err(AddrError::UnsupportedFamily(u16::from(family))),
        }
        let mut addr = Self::unspecified();
        // SAFETY: bytes.len() <= CAPACITY was checked above; both regions
        // are plain bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                std::ptr::addr_of_mut!(addr.storage).cast::<u8>(),
                bytes.len(),
            );
        }
        addr.len = bytes.len() as socklen_t;
        Ok(addr)
    }

    /// The raw sockaddr byte encoding, `len` bytes long.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// The declared address length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns true if no address has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The address family tag.
    #[must_use]
    pub fn family(&self) -> sa_family_t {
        self.storage.ss_family
    }

    /// Returns true if the record holds no usable destination.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.len == 0 || libc::c_int::from(self.storage.ss_family) == libc::AF_UNSPEC
    }

    /// The filesystem path of a unix-domain address, if this record holds a
    /// non-abstract one.
    #[must_use]
    pub fn as_unix_path(&self) -> Option<&Path> {
        if libc::c_int::from(self.family()) != libc::AF_UNIX {
            return None;
        }
        let offset = sun_path_offset();
        if self.len() <= offset {
            return None;
        }
        let path = &self.as_bytes()[offset..];
        // The kernel may or may not count the trailing NUL in the length.
        let end = path.iter().position(|&b| b == 0).unwrap_or(path.len());
        if end == 0 {
            // Leading NUL marks a Linux abstract-namespace name.
            return None;
        }
        Some(Path::new(OsStr::from_bytes(&path[..end])))
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: len never exceeds CAPACITY and the storage is plain bytes.
        unsafe {
            std::slice::from_raw_parts(
                std::ptr::addr_of!(self.storage).cast::<u8>(),
                self.len(),
            )
        }
    }

    pub(crate) fn socklen(&self) -> socklen_t {
        self.len
    }

    pub(crate) fn set_socklen(&mut self, len: socklen_t) {
        self.len = len.min(Self::CAPACITY as socklen_t);
    }

    pub(crate) fn as_sockaddr_ptr(&self) -> *const libc::sockaddr {
        std::ptr::addr_of!(self.storage).cast()
    }

    pub(crate) fn as_mut_sockaddr_ptr(&mut self) -> *mut libc::sockaddr {
        std::ptr::addr_of_mut!(self.storage).cast()
    }
}

impl std::fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SockAddr")
            .field("family", &self.family())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Byte offset of `sun_path` within `sockaddr_un`.
pub(crate) fn sun_path_offset() -> usize {
    // SAFETY: all-zero is a valid sockaddr_un bit pattern; only field
    // addresses are taken.
    let sun: libc::sockaddr_un = unsafe { mem::zeroed() };
    let base = std::ptr::addr_of!(sun) as usize;
    let path = std::ptr::addr_of!(sun.sun_path) as usize;
    path - base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_path_roundtrips() {
        let addr = SockAddr::unix("/tmp/some.sock").unwrap();
        assert_eq!(libc::c_int::from(addr.family()), libc::AF_UNIX);
        assert_eq!(addr.as_unix_path(), Some(Path::new("/tmp/some.sock")));
        assert_eq!(addr.len(), sun_path_offset() + "/tmp/some.sock".len());
    }

    #[test]
    fn encoded_bytes_roundtrip() {
        let addr = SockAddr::unix("/tmp/rt.sock").unwrap();
        let decoded = SockAddr::from_bytes(&addr.to_bytes()).unwrap();
        assert_eq!(decoded.as_unix_path(), Some(Path::new("/tmp/rt.sock")));
        assert_eq!(decoded.len(), addr.len());
    }

    #[test]
    fn unknown_family_is_rejected() {
        let mut bytes = vec![0u8; 16];
        bytes[..2].copy_from_slice(&(libc::AF_PACKET as sa_family_t).to_ne_bytes());
        assert_eq!(
            SockAddr::from_bytes(&bytes).unwrap_err(),
            AddrError::UnsupportedFamily(libc::AF_PACKET as u16)
        );
    }

    #[test]
    fn oversized_path_is_rejected() {
        let long = "x".repeat(200);
        assert_eq!(
            SockAddr::unix(&long).unwrap_err(),
            AddrError::PathTooLong(200)
        );
    }

    #[test]
    fn truncated_encoding_is_rejected() {
        assert_eq!(
            SockAddr::from_bytes(&[1]).unwrap_err(),
            AddrError::Truncated(1)
        );
    }

    #[test]
    fn unspecified_record_has_no_destination() {
        let addr = SockAddr::unspecified();
        assert!(addr.is_unspecified());
        assert!(addr.is_empty());
        assert_eq!(addr.as_unix_path(), None);
    }
}
