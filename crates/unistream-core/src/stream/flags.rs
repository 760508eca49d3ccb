//! Stream state flag set.

use bitflags::bitflags;

bitflags! {
    /// Persistent and transient state bits of a stream.
    ///
    /// `JUST_READ` and `JUST_WROTE` are never set together.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StreamFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        /// Opened for both directions.
        const UPDATE = 1 << 2;
        /// Every write goes to the end.
        const APPEND = 1 << 3;
        /// Opening failed if the target existed.
        const EXCLUSIVE = 1 << 4;
        /// No newline translation.
        const BINARY = 1 << 5;
        const JUST_READ = 1 << 6;
        const JUST_WROTE = 1 << 7;
        const EOF = 1 << 8;
        const ERROR = 1 << 9;
        /// Inside a `SharedStream`.
        const IN_USE = 1 << 10;
        /// The stream owns its handle (OS and stdio backends).
        const OWNS_HANDLE = 1 << 11;
        /// The stream owns the storage of its memory buffer.
        const OWNS_BUFFER = 1 << 12;
        /// Reads and writes may interleave without a state switch.
        const NO_STATE_SWITCH = 1 << 13;
    }
}

impl StreamFlags {
    /// Bits that describe the current I/O direction or condition rather than
    /// how the stream was opened.
    pub const TRANSIENT: Self = Self::JUST_READ
        .union(Self::JUST_WROTE)
        .union(Self::EOF)
        .union(Self::ERROR);
}
