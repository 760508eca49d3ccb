//! Backends built on the standard library's own buffered handles.
//!
//! The std handle does its own buffering, so the engine never adds a buffer
//! in front of these.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use crate::errno::{Result, StreamError};

use super::os::release_file;
use super::position::Whence;

/// A std-buffered file that switches between a reader and a writer.
#[derive(Debug)]
pub struct BufferedFile {
    state: FileState,
}

#[derive(Debug)]
enum FileState {
    Reading(BufReader<File>),
    Writing(BufWriter<File>),
    Detached,
}

impl BufferedFile {
    #[must_use]
    pub fn new(file: File) -> Self {
        Self {
            state: FileState::Reading(BufReader::new(file)),
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<File>> {
        self.state = match std::mem::replace(&mut self.state, FileState::Detached) {
            FileState::Writing(w) => match w.into_inner() {
                Ok(file) => FileState::Reading(BufReader::new(file)),
                Err(e) => {
                    let (err, w) = e.into_parts();
                    self.state = FileState::Writing(w);
                    return Err(err.into());
                }
            },
            other => other,
        };
        match &mut self.state {
            FileState::Reading(r) => Ok(r),
            _ => Err(StreamError::Os(crate::errno::EBADF)),
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.state = match std::mem::replace(&mut self.state, FileState::Detached) {
            FileState::Reading(mut r) => {
                // Move the descriptor to the logical position, dropping read-ahead.
                if let Err(e) = r.seek(SeekFrom::Current(0)) {
                    self.state = FileState::Reading(r);
                    return Err(e.into());
                }
                FileState::Writing(BufWriter::new(r.into_inner()))
            }
            other => other,
        };
        match &mut self.state {
            FileState::Writing(w) => Ok(w),
            _ => Err(StreamError::Os(crate::errno::EBADF)),
        }
    }

    fn seek_from(offset: i64, whence: Whence) -> Result<SeekFrom> {
        Ok(match whence {
            Whence::Set => {
                SeekFrom::Start(u64::try_from(offset).map_err(|_| StreamError::InvalidArgument)?)
            }
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        })
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let from = Self::seek_from(offset, whence)?;
        Ok(match &mut self.state {
            FileState::Reading(r) => r.seek(from)?,
            FileState::Writing(w) => w.seek(from)?,
            FileState::Detached => return Err(StreamError::Os(crate::errno::EBADF)),
        })
    }

    pub fn tell(&mut self) -> Result<u64> {
        Ok(match &mut self.state {
            FileState::Reading(r) => r.stream_position()?,
            FileState::Writing(w) => w.stream_position()?,
            FileState::Detached => return Err(StreamError::Os(crate::errno::EBADF)),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        if let FileState::Writing(w) = &mut self.state {
            w.flush()?;
        }
        Ok(())
    }

    fn file_ref(&self) -> Result<&File> {
        match &self.state {
            FileState::Reading(r) => Ok(r.get_ref()),
            FileState::Writing(w) => Ok(w.get_ref()),
            FileState::Detached => Err(StreamError::Os(crate::errno::EBADF)),
        }
    }

    pub fn size(&mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.file_ref()?.metadata()?.len())
    }

    pub fn resize(&mut self, size: u64) -> Result<()> {
        self.flush()?;
        Ok(self.file_ref()?.set_len(size)?)
    }

    /// Flush and give up the file, closing it only when `owned`.
    pub fn close(&mut self, owned: bool) -> Result<()> {
        let state = std::mem::replace(&mut self.state, FileState::Detached);
        let (file, flushed) = match state {
            FileState::Reading(r) => (r.into_inner(), Ok(())),
            FileState::Writing(w) => match w.into_inner() {
                Ok(file) => (file, Ok(())),
                Err(e) => {
                    let (err, w) = e.into_parts();
                    // The unwritten bytes are lost with the writer.
                    let (file, _) = w.into_parts();
                    (file, Err(StreamError::from(err)))
                }
            },
            FileState::Detached => return Ok(()),
        };
        if !owned {
            release_file(file);
        }
        flushed
    }
}

/// A stdio-backed stream target.
#[derive(Debug)]
pub enum StdioFile {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(BufferedFile),
}

impl StdioFile {
    #[must_use]
    pub fn stdin() -> Self {
        StdioFile::Stdin(io::stdin())
    }

    #[must_use]
    pub fn stdout() -> Self {
        StdioFile::Stdout(io::stdout())
    }

    #[must_use]
    pub fn stderr() -> Self {
        StdioFile::Stderr(io::stderr())
    }

    #[must_use]
    pub fn from_file(file: File) -> Self {
        StdioFile::File(BufferedFile::new(file))
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        matches!(self, StdioFile::File(_))
    }

    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let res = match self {
            StdioFile::Stdin(h) => h.read(out),
            StdioFile::File(f) => f.reader()?.read(out),
            StdioFile::Stdout(_) | StdioFile::Stderr(_) => {
                return Err(StreamError::ReadNotAllowed);
            }
        };
        Ok(res?)
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let res = match self {
            StdioFile::Stdout(h) => h.write(bytes),
            StdioFile::Stderr(h) => h.write(bytes),
            StdioFile::File(f) => f.writer()?.write(bytes),
            StdioFile::Stdin(_) => return Err(StreamError::WriteNotAllowed),
        };
        match res {
            Ok(0) if !bytes.is_empty() => Err(StreamError::Io),
            Ok(n) => Ok(n),
            Err(e) => Err(e.into()),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            StdioFile::Stdout(h) => h.flush()?,
            StdioFile::Stderr(h) => h.flush()?,
            StdioFile::File(f) => f.flush()?,
            StdioFile::Stdin(_) => {}
        }
        Ok(())
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        match self {
            StdioFile::File(f) => f.seek(offset, whence),
            _ => Err(StreamError::SeekNotAllowed),
        }
    }

    pub fn tell(&mut self) -> Result<u64> {
        match self {
            StdioFile::File(f) => f.tell(),
            _ => Err(StreamError::SeekNotAllowed),
        }
    }

    pub fn size(&mut self) -> Result<u64> {
        match self {
            StdioFile::File(f) => f.size(),
            _ => Err(StreamError::NotSupported),
        }
    }

    pub fn resize(&mut self, size: u64) -> Result<()> {
        match self {
            StdioFile::File(f) => f.resize(size),
            _ => Err(StreamError::NotSupported),
        }
    }

    pub fn close(&mut self, owned: bool) -> Result<()> {
        match self {
            StdioFile::File(f) => f.close(owned),
            other => other.flush(),
        }
    }
}
