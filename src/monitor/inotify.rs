use std::ffi::{CString, OsString};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use crate::event::EventMask;

const RECORD_HEADER: usize = mem::size_of::<libc::inotify_event>();

/// Room for the longest name the kernel will append to a record.
const RECORD_NAME: usize = 256;

/// Read buffer sized to hold 1024 maximum-length records per read.
pub(crate) const BUFFER_LEN: usize = (RECORD_HEADER + RECORD_NAME) * 1024;

/// The shared change-notification descriptor.
///
/// One handle is created lazily per monitor instance and shared by all of
/// its workers; the kernel serializes concurrent reads. Dropping the handle
/// closes the descriptor.
#[derive(Debug)]
pub(crate) struct Inotify {
    fd: OwnedFd,
}

impl Inotify {
    /// The descriptor is non-blocking: workers park in `poll` instead of
    /// `read`, so every sibling sharing the descriptor observes
    /// cancellation within one poll timeout even when another worker
    /// drained the teardown records.
    pub(crate) fn init() -> io::Result<Self> {
        let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Register `path` for the kinds in `mask`, returning the kernel's
    /// watch descriptor.
    pub(crate) fn add_watch(&self, path: &Path, mask: EventMask) -> io::Result<i32> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;
        let wd =
            unsafe { libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask.bits()) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(wd)
    }

    /// Deregister a watch. Queues an IN_IGNORED record, which wakes workers
    /// parked waiting for events during teardown.
    pub(crate) fn remove_watch(&self, wd: i32) {
        unsafe {
            libc::inotify_rm_watch(self.fd.as_raw_fd(), wd);
        }
    }
}

/// Wait up to `timeout_ms` for the descriptor to become readable.
/// `Ok(false)` is a timeout.
pub(crate) fn wait_readable(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ready > 0)
}

/// Read raw records into `buf`.
///
/// Workers read on the raw descriptor value rather than the handle so the
/// owning instance can close it out from under them at stop time.
pub(crate) fn read_into(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// One decoded record from the event buffer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Record {
    pub(crate) mask: EventMask,
    /// Name of the affected entry, relative to the watched directory.
    /// Absent when the event targets the watched directory itself.
    pub(crate) name: Option<OsString>,
}

/// Sequential decoder over the bytes returned by one read.
///
/// Records are packed back to back: a fixed header followed by `len` bytes
/// of NUL-padded name. The iterator advances by each record's declared
/// length and stops at a truncated tail.
pub(crate) fn records(buf: &[u8]) -> RecordIter<'_> {
    RecordIter { buf, offset: 0 }
}

pub(crate) struct RecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl Iterator for RecordIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.offset + RECORD_HEADER > self.buf.len() {
            return None;
        }
        // The kernel gives no alignment promise for records after the first.
        let header = unsafe {
            self.buf
                .as_ptr()
                .add(self.offset)
                .cast::<libc::inotify_event>()
                .read_unaligned()
        };

        let name_end = self.offset + RECORD_HEADER + header.len as usize;
        if name_end > self.buf.len() {
            return None;
        }
        let name_bytes = &self.buf[self.offset + RECORD_HEADER..name_end];
        let name_len = name_bytes
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(name_bytes.len());
        let name = (name_len > 0).then(|| OsString::from_vec(name_bytes[..name_len].to_vec()));

        self.offset = name_end;
        Some(Record {
            mask: EventMask::from_bits(header.mask),
            name,
        })
    }
}
