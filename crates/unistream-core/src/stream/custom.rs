//! User-supplied backends.
//!
//! Every method is optional. Reads and writes follow `std::io` conventions:
//! `read` returning `Ok(0)` for a non-empty buffer is end of data, and a
//! short `write` is retried by the engine with the remainder.

use std::borrow::Cow;

use crate::errno::{Result, StreamError};

use super::flags::StreamFlags;
use super::position::Whence;

/// Callback table for a `Custom` stream.
pub trait CustomBackend: Send {
    /// Called once by `Stream::open_custom` before the stream is returned.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when the stream closes, after the engine flushed.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(StreamError::NotSupported)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(StreamError::NotSupported)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// The stream's error and EOF indicators were cleared.
    fn clearerr(&mut self) {}

    /// The stream switched between reading and writing. `NotSupported` is
    /// treated as "nothing to do".
    fn state_switch(&mut self) -> Result<()> {
        Err(StreamError::NotSupported)
    }

    /// Move the cursor; returns the new absolute position.
    fn seek(&mut self, _offset: i64, _whence: Whence) -> Result<u64> {
        Err(StreamError::NotSupported)
    }

    fn tell(&mut self) -> Result<u64> {
        Err(StreamError::NotSupported)
    }

    /// Total size. The default seeks to the end and back; a backend whose
    /// seek has side effects should report its size directly.
    fn size(&mut self) -> Result<u64> {
        let here = self.tell()?;
        let back = i64::try_from(here).map_err(|_| StreamError::Overflow)?;
        let end = self.seek(0, Whence::End)?;
        self.seek(back, Whence::Set)?;
        Ok(end)
    }

    /// Extra state bits the stream should carry, e.g. `NO_STATE_SWITCH`.
    fn flags(&self) -> StreamFlags {
        StreamFlags::empty()
    }

    /// Self-description reported by `Stream::type_name`.
    fn what(&self) -> Cow<'static, str> {
        Cow::Borrowed("custom")
    }
}

/// Words of scratch space every stream carries for its backend's use.
pub const TEMPDATA_WORDS: usize = 3;

/// The scratch area behind `Stream::tempdata`.
pub type TempData = [usize; TEMPDATA_WORDS];
