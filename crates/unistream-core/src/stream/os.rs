//! Operating-system file handles.
//!
//! The handle is a `std::fs::File` used without any std-side buffering; the
//! engine's own buffer sits in front of it. A handle the stream does not own
//! is released on close without closing the descriptor.
//!
//! This is the only place in the crate that needs `unsafe`: adopting the
//! process's standard descriptors and setting socket timeouts.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::errno::{Result, StreamError};

use super::position::Whence;

/// Which timeout a call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Read,
    Write,
}

/// Unbuffered OS handle.
#[derive(Debug)]
pub struct OsHandle {
    file: Option<File>,
}

impl OsHandle {
    pub(crate) fn new(file: File) -> Self {
        Self { file: Some(file) }
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(StreamError::Os(crate::errno::EBADF))
    }

    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let file = self.file()?;
        loop {
            match file.read(out) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let file = self.file()?;
        loop {
            match file.write(bytes) {
                Ok(0) if !bytes.is_empty() => return Err(StreamError::Io),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let from = match whence {
            Whence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| StreamError::InvalidArgument)?),
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(self.file()?.seek(from)?)
    }

    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.file()?.stream_position()?)
    }

    pub fn size(&mut self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    pub fn resize(&mut self, size: u64) -> Result<()> {
        Ok(self.file()?.set_len(size)?)
    }

    /// Close the descriptor when `owned`, otherwise just let go of it.
    pub fn close(&mut self, owned: bool) -> Result<()> {
        match self.file.take() {
            Some(file) if owned => close_file(file),
            Some(file) => {
                release_file(file);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Apply a socket timeout. Handles that are not sockets accept the value
    /// silently.
    pub fn set_timeout(&mut self, kind: TimeoutKind, usec: u64) -> Result<()> {
        let file = self.file()?;
        set_socket_timeout(file, kind, usec)
    }
}

// ---------------------------------------------------------------------------
// Platform glue
// ---------------------------------------------------------------------------

/// Close and report the error a plain `drop` would swallow.
#[cfg(unix)]
#[allow(unsafe_code)]
fn close_file(file: File) -> Result<()> {
    use std::os::fd::IntoRawFd;
    let fd = file.into_raw_fd();
    // SAFETY: `fd` came out of an owned `File`, so nothing else closes it.
    let rc = unsafe { libc::close(fd) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error().into())
    }
}

#[cfg(not(unix))]
fn close_file(file: File) -> Result<()> {
    drop(file);
    Ok(())
}

/// Give up the `File` without closing the descriptor.
pub(crate) fn release_file(file: File) {
    #[cfg(unix)]
    {
        use std::os::fd::IntoRawFd;
        let _ = file.into_raw_fd();
    }
    #[cfg(windows)]
    {
        use std::os::windows::io::IntoRawHandle;
        let _ = file.into_raw_handle();
    }
    #[cfg(not(any(unix, windows)))]
    drop(file);
}

/// A `File` over one of the process's standard descriptors (0, 1, 2).
///
/// The stream that wraps it must not own it, so the descriptor outlives the
/// stream.
#[cfg(unix)]
#[allow(unsafe_code)]
pub(crate) fn std_descriptor(fd: i32) -> Result<File> {
    use std::os::fd::FromRawFd;
    if !(0..=2).contains(&fd) {
        return Err(StreamError::InvalidArgument);
    }
    // SAFETY: 0, 1 and 2 are open for the life of the process, and the
    // caller releases (never closes) the returned `File`.
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn set_socket_timeout(file: &File, kind: TimeoutKind, usec: u64) -> Result<()> {
    use std::os::fd::AsRawFd;
    let tv = libc::timeval {
        tv_sec: (usec / 1_000_000) as libc::time_t,
        tv_usec: (usec % 1_000_000) as libc::suseconds_t,
    };
    let opt = match kind {
        TimeoutKind::Read => libc::SO_RCVTIMEO,
        TimeoutKind::Write => libc::SO_SNDTIMEO,
    };
    // SAFETY: `tv` lives across the call and the length matches its type.
    let rc = unsafe {
        libc::setsockopt(
            file.as_raw_fd(),
            libc::SOL_SOCKET,
            opt,
            (&raw const tv).cast(),
            std::mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::ENOTSOCK) => Ok(()),
        Some(code) => Err(StreamError::from_code(code).unwrap_or(StreamError::Io)),
        None => Err(StreamError::Io),
    }
}

#[cfg(not(unix))]
fn set_socket_timeout(_file: &File, _kind: TimeoutKind, _usec: u64) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_seek_on_temp_file() {
        let file = tempfile::tempfile().unwrap();
        let mut handle = OsHandle::new(file);
        assert_eq!(handle.write(b"abcdef").unwrap(), 6);
        assert_eq!(handle.tell().unwrap(), 6);
        assert_eq!(handle.seek(-4, Whence::End).unwrap(), 2);
        let mut out = [0u8; 8];
        assert_eq!(handle.read(&mut out).unwrap(), 4);
        assert_eq!(&out[..4], b"cdef");
        assert_eq!(handle.size().unwrap(), 6);
        handle.resize(3).unwrap();
        assert_eq!(handle.size().unwrap(), 3);
        handle.close(true).unwrap();
        assert!(handle.read(&mut out).is_err());
    }

    #[test]
    fn timeout_on_plain_file_is_accepted() {
        let mut handle = OsHandle::new(tempfile::tempfile().unwrap());
        handle.set_timeout(TimeoutKind::Read, 1_500_000).unwrap();
        handle.close(true).unwrap();
    }

    #[test]
    fn negative_absolute_seek_is_rejected() {
        let mut handle = OsHandle::new(tempfile::tempfile().unwrap());
        assert_eq!(handle.seek(-1, Whence::Set), Err(StreamError::InvalidArgument));
    }
}
