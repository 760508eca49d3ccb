//! `std::io` adapters, so a [`Stream`] can sit under `BufReader`,
//! `io::copy`, `byteorder` and friends.

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{Stream, Whence};

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_bytes(buf);
        if n == 0
            && let Some(err) = self.error()
        {
            return Err(err.into());
        }
        Ok(n)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.write_bytes(buf);
        if n == 0
            && !buf.is_empty()
            && let Some(err) = self.error()
        {
            return Err(err.into());
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Stream::flush(self).map_err(Into::into)
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| io::Error::from(crate::StreamError::Overflow))?,
                Whence::Set,
            ),
            SeekFrom::Current(n) => (n, Whence::Cur),
            SeekFrom::End(n) => (n, Whence::End),
        };
        self.seek64(offset, whence).map_err(Into::into)
    }
}
