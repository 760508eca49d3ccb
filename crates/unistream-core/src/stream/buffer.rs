//! Engine-side buffer for OS-handle and custom backends.
//!
//! Three modes: fully buffered, line buffered and unbuffered.
//!
//! One allocation serves both directions, with a different alignment for
//! each:
//! - reading: the `len` unconsumed bytes sit at the END of the storage,
//!   so consuming never moves data; a refill reads into the front and
//!   moves the result to the end.
//! - writing: the `len` pending bytes sit at the FRONT; a partial drain
//!   moves the residue back to the front.
//!
//! Which direction is live is tracked by the owning stream's
//! `JUST_READ`/`JUST_WROTE` bits; the buffer itself only holds bytes.

/// Buffering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufMode {
    /// Drain when the buffer is full.
    Full,
    /// Drain after any write containing `\n`, or when full.
    Line,
    /// No engine buffer.
    None,
}

/// Integer constants accepted by [`BufMode::from_raw`].
pub const IOFBF: i32 = 0;
pub const IOLBF: i32 = 1;
pub const IONBF: i32 = 2;

impl BufMode {
    /// Convert from the classic `_IOFBF`/`_IOLBF`/`_IONBF` integer.
    #[must_use]
    pub fn from_raw(mode: i32) -> Option<BufMode> {
        match mode {
            IOFBF => Some(BufMode::Full),
            IOLBF => Some(BufMode::Line),
            IONBF => Some(BufMode::None),
            _ => Option::None,
        }
    }
}

/// Dual-aligned byte buffer.
///
/// Invariant: `len <= data.len()`.
#[derive(Debug)]
pub struct EngineBuffer {
    data: Vec<u8>,
    len: usize,
    mode: BufMode,
}

impl EngineBuffer {
    /// Allocate a buffer. `BufMode::None` has no use for one, so callers
    /// keep `Option<EngineBuffer>` and store `None` instead.
    #[must_use]
    pub fn new(mode: BufMode, capacity: usize) -> Self {
        Self::with_storage(mode, vec![0u8; capacity.max(1)])
    }

    /// Adopt caller-provided storage; its length is the capacity.
    #[must_use]
    pub fn with_storage(mode: BufMode, mut storage: Vec<u8>) -> Self {
        if storage.is_empty() {
            storage.push(0);
        }
        Self {
            data: storage,
            len: 0,
            mode,
        }
    }

    #[must_use]
    pub fn mode(&self) -> BufMode {
        self.mode
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently held (unconsumed when reading, pending when writing).
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Throw away whatever the buffer holds.
    pub fn discard(&mut self) {
        self.len = 0;
    }

    // -----------------------------------------------------------------------
    // Read side (right-aligned)
    // -----------------------------------------------------------------------

    /// Copy up to `out.len()` buffered bytes into `out`. Returns the count.
    pub fn take_read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        let start = self.data.len() - self.len;
        out[..n].copy_from_slice(&self.data[start..start + n]);
        self.len -= n;
        n
    }

    /// Peek at the next buffered byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        (self.len > 0).then(|| self.data[self.data.len() - self.len])
    }

    /// Storage to refill into. Call [`Self::commit_refill`] afterwards.
    pub fn refill_slot(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.data
    }

    /// Right-align `n` freshly read bytes that landed at the front.
    pub fn commit_refill(&mut self, n: usize) {
        let n = n.min(self.data.len());
        let cap = self.data.len();
        self.data.copy_within(0..n, cap - n);
        self.len = n;
    }

    // -----------------------------------------------------------------------
    // Write side (left-aligned)
    // -----------------------------------------------------------------------

    /// Append as much of `bytes` as fits. Returns the count taken.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.data.len() - self.len);
        self.data[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Bytes waiting to be written.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Drop the first `n` pending bytes after a (possibly partial) drain.
    pub fn consume_front(&mut self, n: usize) {
        let n = n.min(self.len);
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Hand the storage back, e.g. when the buffer is replaced.
    #[must_use]
    pub fn into_storage(self) -> Vec<u8> {
        self.data
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refill_right_aligns() {
        let mut buf = EngineBuffer::new(BufMode::Full, 8);
        buf.refill_slot()[..3].copy_from_slice(b"abc");
        buf.commit_refill(3);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.peek(), Some(b'a'));

        let mut out = [0u8; 2];
        assert_eq!(buf.take_read(&mut out), 2);
        assert_eq!(&out, b"ab");
        let mut out = [0u8; 4];
        assert_eq!(buf.take_read(&mut out), 1);
        assert_eq!(out[0], b'c');
        assert!(buf.is_empty());
        assert_eq!(buf.peek(), None);
    }

    #[test]
    fn test_append_is_bounded_by_capacity() {
        let mut buf = EngineBuffer::new(BufMode::Full, 4);
        assert_eq!(buf.append(b"hello"), 4);
        assert!(buf.is_full());
        assert_eq!(buf.pending(), b"hell");
    }

    #[test]
    fn test_partial_drain_moves_residue_to_front() {
        let mut buf = EngineBuffer::new(BufMode::Line, 8);
        buf.append(b"abcdef");
        buf.consume_front(4);
        assert_eq!(buf.pending(), b"ef");
        assert_eq!(buf.append(b"gh"), 2);
        assert_eq!(buf.pending(), b"efgh");
    }

    #[test]
    fn test_with_storage_uses_length_as_capacity() {
        let buf = EngineBuffer::with_storage(BufMode::Full, vec![0; 32]);
        assert_eq!(buf.capacity(), 32);
        assert_eq!(buf.into_storage().len(), 32);
    }

    #[test]
    fn test_bufmode_from_raw() {
        assert_eq!(BufMode::from_raw(0), Some(BufMode::Full));
        assert_eq!(BufMode::from_raw(1), Some(BufMode::Line));
        assert_eq!(BufMode::from_raw(2), Some(BufMode::None));
        assert_eq!(BufMode::from_raw(3), Option::None);
    }
}
