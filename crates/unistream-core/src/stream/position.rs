//! Stream positions and seek origins.

use crate::errno::{Result, StreamError};

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl From<Whence> for i32 {
    fn from(w: Whence) -> i32 {
        match w {
            Whence::Set => 0,
            Whence::Cur => 1,
            Whence::End => 2,
        }
    }
}

impl TryFrom<i32> for Whence {
    type Error = StreamError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(StreamError::InvalidArgument),
        }
    }
}

/// Absolute target of a seek, given the current position and the end.
///
/// A target before the start is `InvalidArgument`; one past `u64::MAX` is
/// `Overflow`.
pub fn resolve_seek(current: u64, end: u64, offset: i64, whence: Whence) -> Result<u64> {
    let base = match whence {
        Whence::Set => 0,
        Whence::Cur => current,
        Whence::End => end,
    };
    let target = i128::from(base) + i128::from(offset);
    if target < 0 {
        return Err(StreamError::InvalidArgument);
    }
    u64::try_from(target).map_err(|_| StreamError::Overflow)
}

/// Position inside a stdio-backed stream.
///
/// The value is only meaningful to the stream it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StdioPos(pub(crate) u64);

/// Saved cursor returned by `getpos` and accepted by `setpos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPos {
    Stdio(StdioPos),
    Offset(u64),
}

const TAG_STDIO: u8 = 1;
const TAG_OFFSET: u8 = 2;

/// Encoded size of a [`StreamPos`].
pub const STREAM_POS_LEN: usize = 9;

impl StreamPos {
    /// Tag byte followed by the 64-bit little-endian payload.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STREAM_POS_LEN] {
        let (tag, raw) = match *self {
            StreamPos::Stdio(StdioPos(raw)) => (TAG_STDIO, raw),
            StreamPos::Offset(off) => (TAG_OFFSET, off),
        };
        let mut out = [0u8; STREAM_POS_LEN];
        out[0] = tag;
        out[1..].copy_from_slice(&raw.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; STREAM_POS_LEN] =
            bytes.try_into().map_err(|_| StreamError::InvalidArgument)?;
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&bytes[1..]);
        let raw = u64::from_le_bytes(payload);
        match bytes[0] {
            TAG_STDIO => Ok(StreamPos::Stdio(StdioPos(raw))),
            TAG_OFFSET => Ok(StreamPos::Offset(raw)),
            _ => Err(StreamError::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_seek_origins() {
        assert_eq!(resolve_seek(5, 10, 3, Whence::Set), Ok(3));
        assert_eq!(resolve_seek(5, 10, -2, Whence::Cur), Ok(3));
        assert_eq!(resolve_seek(5, 10, -10, Whence::End), Ok(0));
        assert_eq!(resolve_seek(5, 10, 4, Whence::End), Ok(14));
        assert_eq!(
            resolve_seek(5, 10, -6, Whence::Cur),
            Err(StreamError::InvalidArgument)
        );
    }

    #[test]
    fn whence_from_raw() {
        assert_eq!(Whence::try_from(2), Ok(Whence::End));
        assert_eq!(Whence::try_from(7), Err(StreamError::InvalidArgument));
        assert_eq!(i32::from(Whence::Cur), 1);
    }

    #[test]
    fn pos_bytes_are_tagged_little_endian() {
        let pos = StreamPos::Offset(0x0102);
        let bytes = pos.to_bytes();
        assert_eq!(bytes[0], TAG_OFFSET);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]);
        assert_eq!(StreamPos::from_bytes(&bytes), Ok(pos));

        let stdio = StreamPos::Stdio(StdioPos(77));
        assert_eq!(StreamPos::from_bytes(&stdio.to_bytes()), Ok(stdio));
    }

    #[test]
    fn pos_from_bad_bytes() {
        assert!(StreamPos::from_bytes(&[TAG_OFFSET, 0, 0]).is_err());
        let mut bytes = StreamPos::Offset(1).to_bytes();
        bytes[0] = 9;
        assert_eq!(StreamPos::from_bytes(&bytes), Err(StreamError::InvalidArgument));
    }
}
