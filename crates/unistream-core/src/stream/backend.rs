//! The closed set of backend variants and their per-variant dispatch.

use std::borrow::Cow;
use std::fmt;

use crate::errno::{EBADF, Result, StreamError};

use super::custom::CustomBackend;
use super::memory::{DynamicBuffer, SizedBuffer};
use super::os::OsHandle;
use super::position::{Whence, resolve_seek};
use super::stdio::StdioFile;
use super::thread_buffer::ThreadBuffer;

/// Which variant backs a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Empty,
    StdioFile,
    OwnedStdioFile,
    OsHandle,
    OwnedOsHandle,
    SizedBuffer,
    DynamicBuffer,
    ThreadBuffer,
    Custom,
    Closed,
}

impl BackendKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::StdioFile => "stdio file",
            Self::OwnedStdioFile => "owned stdio file",
            Self::OsHandle => "os handle",
            Self::OwnedOsHandle => "owned os handle",
            Self::SizedBuffer => "sized buffer",
            Self::DynamicBuffer => "dynamic buffer",
            Self::ThreadBuffer => "thread buffer",
            Self::Custom => "custom",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) enum Backend {
    Empty,
    Stdio(StdioFile),
    Os(OsHandle),
    Sized(SizedBuffer),
    Dynamic(DynamicBuffer),
    Thread(ThreadBuffer),
    Custom(Box<dyn CustomBackend>),
    Closed,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Custom(c) => write!(f, "Custom({})", c.what()),
            other => f.write_str(other.kind(false).name()),
        }
    }
}

const CLOSED: StreamError = StreamError::Os(EBADF);

impl Backend {
    pub(crate) fn kind(&self, owned: bool) -> BackendKind {
        match (self, owned) {
            (Backend::Empty, _) => BackendKind::Empty,
            (Backend::Stdio(_), false) => BackendKind::StdioFile,
            (Backend::Stdio(_), true) => BackendKind::OwnedStdioFile,
            (Backend::Os(_), false) => BackendKind::OsHandle,
            (Backend::Os(_), true) => BackendKind::OwnedOsHandle,
            (Backend::Sized(_), _) => BackendKind::SizedBuffer,
            (Backend::Dynamic(_), _) => BackendKind::DynamicBuffer,
            (Backend::Thread(_), _) => BackendKind::ThreadBuffer,
            (Backend::Custom(_), _) => BackendKind::Custom,
            (Backend::Closed, _) => BackendKind::Closed,
        }
    }

    pub(crate) fn description(&self, owned: bool) -> Cow<'static, str> {
        match self {
            Backend::Custom(c) => c.what(),
            other => Cow::Borrowed(other.kind(owned).name()),
        }
    }

    /// `Ok(0)` on a non-empty `out` is end of data.
    pub(crate) fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        match self {
            Backend::Empty => Ok(0),
            Backend::Stdio(s) => s.read(out),
            Backend::Os(h) => h.read(out),
            Backend::Sized(b) => Ok(b.read(out)),
            Backend::Dynamic(b) => Ok(b.read(out)),
            Backend::Thread(t) => Ok(t.read(out)),
            Backend::Custom(c) => c.read(out),
            Backend::Closed => Err(CLOSED),
        }
    }

    /// May write less than `bytes.len()`; fails only when nothing was taken.
    pub(crate) fn write(&mut self, bytes: &[u8], append: bool) -> Result<usize> {
        match self {
            Backend::Empty => Err(StreamError::WriteNotAllowed),
            Backend::Stdio(s) => s.write(bytes),
            Backend::Os(h) => h.write(bytes),
            Backend::Sized(b) => b.write(bytes),
            Backend::Dynamic(b) => b.write(bytes, append),
            Backend::Thread(t) => t.write(bytes),
            Backend::Custom(c) => match c.write(bytes) {
                Ok(0) if !bytes.is_empty() => Err(StreamError::Io),
                other => other,
            },
            Backend::Closed => Err(CLOSED),
        }
    }

    pub(crate) fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        match self {
            Backend::Empty => match resolve_seek(0, 0, offset, whence)? {
                0 => Ok(0),
                _ => Err(StreamError::InvalidArgument),
            },
            Backend::Stdio(s) => s.seek(offset, whence),
            Backend::Os(h) => h.seek(offset, whence),
            Backend::Sized(b) => b.seek(offset, whence),
            Backend::Dynamic(b) => b.seek(offset, whence),
            Backend::Thread(_) => Err(StreamError::SeekNotAllowed),
            Backend::Custom(c) => c.seek(offset, whence),
            Backend::Closed => Err(CLOSED),
        }
    }

    pub(crate) fn tell(&mut self) -> Result<u64> {
        match self {
            Backend::Empty => Ok(0),
            Backend::Stdio(s) => s.tell(),
            Backend::Os(h) => h.tell(),
            Backend::Sized(b) => Ok(b.position()),
            Backend::Dynamic(b) => Ok(b.position()),
            Backend::Thread(_) => Err(StreamError::SeekNotAllowed),
            Backend::Custom(c) => c.tell(),
            Backend::Closed => Err(CLOSED),
        }
    }

    pub(crate) fn size(&mut self) -> Result<u64> {
        match self {
            Backend::Empty => Ok(0),
            Backend::Stdio(s) => s.size(),
            Backend::Os(h) => h.size(),
            Backend::Sized(b) => Ok(b.capacity() as u64),
            Backend::Dynamic(b) => Ok(b.size() as u64),
            Backend::Thread(t) => Ok(t.len() as u64),
            Backend::Custom(c) => c.size(),
            Backend::Closed => Err(CLOSED),
        }
    }

    pub(crate) fn resize(&mut self, size: u64) -> Result<()> {
        match self {
            Backend::Stdio(s) => s.resize(size),
            Backend::Os(h) => h.resize(size),
            Backend::Dynamic(b) => {
                b.resize(usize::try_from(size).map_err(|_| StreamError::NoMemory)?)
            }
            Backend::Closed => Err(CLOSED),
            _ => Err(StreamError::NotSupported),
        }
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        match self {
            Backend::Stdio(s) => s.flush(),
            Backend::Custom(c) => c.flush(),
            _ => Ok(()),
        }
    }

    pub(crate) fn close(&mut self, owned: bool) -> Result<()> {
        match self {
            Backend::Stdio(s) => s.close(owned),
            Backend::Os(h) => h.close(owned),
            Backend::Custom(c) => c.close(),
            _ => Ok(()),
        }
    }

    pub(crate) fn is_seekable(&self) -> bool {
        match self {
            Backend::Stdio(s) => s.is_seekable(),
            Backend::Thread(_) | Backend::Closed => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_reflects_ownership() {
        let b = Backend::Empty;
        assert_eq!(b.kind(true), BackendKind::Empty);
        let t = Backend::Thread(ThreadBuffer::new());
        assert_eq!(t.kind(false).name(), "thread buffer");
        assert!(!t.is_seekable());
    }

    #[test]
    fn empty_backend_reads_nothing_and_only_seeks_to_zero() {
        let mut b = Backend::Empty;
        let mut out = [0u8; 4];
        assert_eq!(b.read(&mut out), Ok(0));
        assert_eq!(b.write(b"x", false), Err(StreamError::WriteNotAllowed));
        assert_eq!(b.seek(0, Whence::End), Ok(0));
        assert_eq!(b.seek(1, Whence::Set), Err(StreamError::InvalidArgument));
    }

    #[test]
    fn closed_backend_is_bad_handle() {
        let mut b = Backend::Closed;
        assert_eq!(b.tell(), Err(StreamError::Os(EBADF)));
    }
}
