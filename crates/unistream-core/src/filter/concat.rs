//! Two streams exposed back to back as one.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::errno::{Result, StreamError};
use crate::stream::{CustomBackend, SharedStream, Stream, StreamFlags, Whence};

/// Filter backend reading and writing `lhs` first, then `rhs`.
///
/// Reads move on to `rhs` once `lhs` comes up short without an error;
/// writes move on once `lhs` reports `NoSpaceLeft`. Offsets below
/// `size(lhs)` address `lhs`, the rest address `rhs`.
#[derive(Debug)]
pub struct ConcatFilter {
    lhs: SharedStream,
    rhs: SharedStream,
    use_lhs: bool,
}

impl ConcatFilter {
    #[must_use]
    pub fn new(lhs: SharedStream, rhs: SharedStream) -> Self {
        Self {
            lhs,
            rhs,
            use_lhs: true,
        }
    }

    fn lhs_size(&self) -> Result<u64> {
        self.lhs.try_with(Stream::size64)
    }
}

/// Bytes read, or the stream's error if there were none.
fn read_from(stream: &SharedStream, buf: &mut [u8]) -> Result<(usize, bool)> {
    stream.try_with(|s| {
        let n = s.read_bytes(buf);
        match s.error() {
            Some(err) if n == 0 => Err(err),
            err => Ok((n, err.is_some())),
        }
    })
}

impl CustomBackend for ConcatFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.use_lhs {
            let (n, failed) = read_from(&self.lhs, buf)?;
            if n < buf.len() && !failed {
                trace!("concat switching to rhs for reads");
                self.use_lhs = false;
            }
            if n > 0 {
                return Ok(n);
            }
        }
        read_from(&self.rhs, buf).map(|(n, _)| n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.use_lhs {
            let (n, full) = self.lhs.with(|s| {
                let n = s.write_bytes(buf);
                let full = n < buf.len() && s.error() == Some(StreamError::NoSpaceLeft);
                if full {
                    s.clearerr();
                }
                (n, full, s.error())
            })
            .and_then(|(n, full, err)| match err {
                Some(err) if n == 0 && !full => Err(err),
                _ => Ok((n, full)),
            })?;
            if full {
                trace!("concat switching to rhs for writes");
                self.use_lhs = false;
            }
            if n > 0 {
                return Ok(n);
            }
        }
        self.rhs.try_with(|s| {
            let n = s.write_bytes(buf);
            match s.error() {
                Some(err) if n == 0 => Err(err),
                _ => Ok(n),
            }
        })
    }

    fn flush(&mut self) -> Result<()> {
        let lhs = self.lhs.try_with(Stream::flush);
        let rhs = self.rhs.try_with(Stream::flush);
        lhs.and(rhs)
    }

    fn clearerr(&mut self) {
        // Best effort; a busy inner stream keeps its indicators.
        let _ = self.lhs.with(Stream::clearerr);
        let _ = self.rhs.with(Stream::clearerr);
    }

    fn state_switch(&mut self) -> Result<()> {
        self.flush()
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let lhs_size = self.lhs_size()?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.tell()?,
            Whence::End => lhs_size + self.rhs.try_with(Stream::size64)?,
        };
        let target = base
            .checked_add_signed(offset)
            .ok_or(StreamError::InvalidArgument)?;
        if target < lhs_size {
            let off = i64::try_from(target).map_err(|_| StreamError::Overflow)?;
            self.lhs.try_with(|s| s.seek(off, Whence::Set))?;
            self.rhs.try_with(|s| s.seek(0, Whence::Set))?;
            self.use_lhs = true;
        } else {
            let off = i64::try_from(target - lhs_size).map_err(|_| StreamError::Overflow)?;
            self.rhs.try_with(|s| s.seek(off, Whence::Set))?;
            self.use_lhs = false;
        }
        Ok(target)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.lhs_size()? + self.rhs.try_with(Stream::size64)?)
    }

    fn tell(&mut self) -> Result<u64> {
        if self.use_lhs {
            self.lhs.try_with(Stream::tell64)
        } else {
            Ok(self.lhs_size()? + self.rhs.try_with(Stream::tell64)?)
        }
    }

    fn flags(&self) -> StreamFlags {
        StreamFlags::NO_STATE_SWITCH
    }

    fn what(&self) -> Cow<'static, str> {
        Cow::Borrowed("concat")
    }
}

/// Open `lhs` followed by `rhs` as one stream.
pub fn open_concat(
    lhs: impl Into<SharedStream>,
    rhs: impl Into<SharedStream>,
    mode: &str,
) -> Result<Stream> {
    let stream = Stream::open_custom(ConcatFilter::new(lhs.into(), rhs.into()), mode)?;
    debug!(stream = stream.id(), "concat filter opened");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_defg() -> Stream {
        open_concat(
            Stream::open_const_buffer(&b"abc"[..], "rb").unwrap(),
            Stream::open_const_buffer(&b"defg"[..], "rb").unwrap(),
            "rb",
        )
        .unwrap()
    }

    #[test]
    fn reads_run_across_the_seam() {
        let mut s = abc_defg();
        let mut out = [0u8; 16];
        let n = s.read_bytes(&mut out);
        assert_eq!(&out[..n], b"abcdefg");
        assert!(s.eof());
        assert_eq!(s.size64().unwrap(), 7);
    }

    #[test]
    fn seek_maps_onto_either_side() {
        let mut s = abc_defg();
        s.seek(4, Whence::Set).unwrap();
        let mut out = [0u8; 3];
        assert_eq!(s.read_bytes(&mut out), 3);
        assert_eq!(&out, b"efg");
        assert_eq!(s.tell().unwrap(), 7);

        s.seek(2, Whence::Set).unwrap();
        assert_eq!(s.read_bytes(&mut out), 3);
        assert_eq!(&out, b"cde");

        s.seek(-1, Whence::End).unwrap();
        assert_eq!(s.getc(), Some(b'g'));
        assert_eq!(s.seek(-9, Whence::End), Err(StreamError::InvalidArgument));
    }

    #[test]
    fn writes_spill_into_rhs() {
        let lhs = SharedStream::new(Stream::open_buffer(vec![0; 3], "r+b").unwrap());
        let rhs = SharedStream::new(Stream::open_dynamic_buffer("w+b").unwrap());
        let mut s = open_concat(lhs.clone(), rhs.clone(), "r+b").unwrap();
        s.write_all(b"hello").unwrap();
        assert_eq!(
            lhs.with(|l| l.underlying_buffer().unwrap().to_vec()).unwrap(),
            b"hel"
        );
        assert_eq!(
            rhs.with(|r| r.underlying_buffer().unwrap().to_vec()).unwrap(),
            b"lo"
        );
        assert_eq!(lhs.with(|l| l.error()).unwrap(), None);
        assert_eq!(s.tell64().unwrap(), 5);
    }
}
