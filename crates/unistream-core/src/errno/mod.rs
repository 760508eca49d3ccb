//! Error taxonomy for stream operations.
//!
//! Every failure carries a stable integer code. Where a POSIX errno with the
//! same meaning exists the code reuses its Linux value, so codes coming back
//! from the operating system and codes produced by the engine share one
//! numbering space. Codes with no errno counterpart live above `0x1000`.

use std::io;

use thiserror::Error;

/// Success.
pub const OK: i32 = 0;
/// End of stream (a condition, not an error).
pub const EOF: i32 = -1;

pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const ENOMEM: i32 = 12;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;
pub const ENOSPC: i32 = 28;
pub const ESPIPE: i32 = 29;
pub const EDEADLK: i32 = 35;
pub const EBADMSG: i32 = 74;
pub const EOVERFLOW: i32 = 75;
pub const ENOTSOCK: i32 = 88;
pub const ENOTSUP: i32 = 95;

/// Read attempted on a stream whose mode or state forbids it.
pub const EREADNOTALLOWED: i32 = 0x1001;
/// Write attempted on a stream whose mode or state forbids it.
pub const EWRITENOTALLOWED: i32 = 0x1002;

/// Failure recorded by a stream operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StreamError {
    #[error("end of stream")]
    Eof,
    #[error("stream is not readable in its current mode or state")]
    ReadNotAllowed,
    #[error("stream is not writable in its current mode or state")]
    WriteNotAllowed,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    NoMemory,
    #[error("no space left in fixed buffer")]
    NoSpaceLeft,
    #[error("seek not allowed on this stream")]
    SeekNotAllowed,
    #[error("input/output error")]
    Io,
    #[error("operation not supported by this backend")]
    NotSupported,
    #[error("malformed input")]
    BadMessage,
    #[error("value too large for the result type")]
    Overflow,
    #[error("backend error {0}")]
    Os(i32),
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;

impl StreamError {
    /// Stable integer code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Eof => EOF,
            Self::ReadNotAllowed => EREADNOTALLOWED,
            Self::WriteNotAllowed => EWRITENOTALLOWED,
            Self::InvalidArgument => EINVAL,
            Self::NoMemory => ENOMEM,
            Self::NoSpaceLeft => ENOSPC,
            Self::SeekNotAllowed => ESPIPE,
            Self::Io => EIO,
            Self::NotSupported => ENOTSUP,
            Self::BadMessage => EBADMSG,
            Self::Overflow => EOVERFLOW,
            Self::Os(code) => code,
        }
    }

    /// Map an integer code back to an error. `OK` maps to `None`; unknown
    /// codes are kept verbatim as `Os`.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            OK => return None,
            EOF => Self::Eof,
            EREADNOTALLOWED => Self::ReadNotAllowed,
            EWRITENOTALLOWED => Self::WriteNotAllowed,
            EINVAL => Self::InvalidArgument,
            ENOMEM => Self::NoMemory,
            ENOSPC => Self::NoSpaceLeft,
            ESPIPE => Self::SeekNotAllowed,
            EIO => Self::Io,
            ENOTSUP => Self::NotSupported,
            EBADMSG => Self::BadMessage,
            EOVERFLOW => Self::Overflow,
            other => Self::Os(other),
        })
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            return Self::from_code(code).unwrap_or(Self::Io);
        }
        // Errors we produced ourselves round-trip through the payload.
        if let Some(inner) = err.get_ref().and_then(|e| e.downcast_ref::<StreamError>()) {
            return *inner;
        }
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Eof,
            io::ErrorKind::InvalidInput => Self::InvalidArgument,
            io::ErrorKind::InvalidData => Self::BadMessage,
            io::ErrorKind::OutOfMemory => Self::NoMemory,
            io::ErrorKind::Unsupported => Self::NotSupported,
            io::ErrorKind::WriteZero => Self::NoSpaceLeft,
            _ => Self::Io,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match err {
            StreamError::Os(code) => return io::Error::from_raw_os_error(code),
            StreamError::Eof => io::ErrorKind::UnexpectedEof,
            StreamError::InvalidArgument => io::ErrorKind::InvalidInput,
            StreamError::BadMessage => io::ErrorKind::InvalidData,
            StreamError::NoMemory => io::ErrorKind::OutOfMemory,
            StreamError::NotSupported => io::ErrorKind::Unsupported,
            StreamError::NoSpaceLeft => io::ErrorKind::WriteZero,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        let all = [
            StreamError::Eof,
            StreamError::ReadNotAllowed,
            StreamError::WriteNotAllowed,
            StreamError::InvalidArgument,
            StreamError::NoMemory,
            StreamError::NoSpaceLeft,
            StreamError::SeekNotAllowed,
            StreamError::Io,
            StreamError::NotSupported,
            StreamError::BadMessage,
            StreamError::Overflow,
            StreamError::Os(110),
        ];
        for err in all {
            assert_eq!(StreamError::from_code(err.code()), Some(err));
        }
        assert_eq!(StreamError::from_code(OK), None);
    }

    #[test]
    fn io_error_conversion_keeps_variant() {
        let io_err: io::Error = StreamError::SeekNotAllowed.into();
        assert_eq!(StreamError::from(io_err), StreamError::SeekNotAllowed);

        let raw = io::Error::from_raw_os_error(ENOSPC);
        assert_eq!(StreamError::from(raw), StreamError::NoSpaceLeft);

        let unknown = io::Error::from_raw_os_error(110);
        assert_eq!(StreamError::from(unknown), StreamError::Os(110));
    }

    #[test]
    fn io_error_kind_fallback() {
        let e = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert_eq!(StreamError::from(e), StreamError::Eof);
        let e = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(StreamError::from(e), StreamError::Io);
    }
}
