//! Growable byte buffer with inline small-string storage.
//!
//! Up to [`INLINE_CAPACITY`] bytes live inside the value itself; the first
//! append past that moves the contents to the heap. The scanners use it to
//! collect the characters of a number before converting it.

use crate::errno::{Result, StreamError};

/// Bytes stored without a heap allocation.
pub const INLINE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
enum Repr {
    Inline { data: [u8; INLINE_CAPACITY], len: usize },
    Heap(Vec<u8>),
}

/// Small-buffer-optimised byte container.
#[derive(Debug, Clone)]
pub struct SmallBuf {
    repr: Repr,
}

impl Default for SmallBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl SmallBuf {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            repr: Repr::Inline {
                data: [0; INLINE_CAPACITY],
                len: 0,
            },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Inline { len, .. } => *len,
            Repr::Heap(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the contents still fit inline.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self.repr, Repr::Inline { .. })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Inline { .. } => INLINE_CAPACITY,
            Repr::Heap(v) => v.capacity(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Inline { data, len } => &data[..*len],
            Repr::Heap(v) => v,
        }
    }

    /// Contents as text, if they are valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Make room for `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len()
            .checked_add(additional)
            .ok_or(StreamError::NoMemory)?;
        match &mut self.repr {
            Repr::Inline { data, len } => {
                if needed <= INLINE_CAPACITY {
                    return Ok(());
                }
                let mut heap = Vec::new();
                heap.try_reserve(needed).map_err(|_| StreamError::NoMemory)?;
                heap.extend_from_slice(&data[..*len]);
                self.repr = Repr::Heap(heap);
                Ok(())
            }
            Repr::Heap(v) => v.try_reserve(additional).map_err(|_| StreamError::NoMemory),
        }
    }

    /// Drop the contents, keeping any heap allocation.
    pub fn clear(&mut self) {
        match &mut self.repr {
            Repr::Inline { len, .. } => *len = 0,
            Repr::Heap(v) => v.clear(),
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.extend(&[byte])
    }

    /// Append bytes up to (not including) the first NUL.
    pub fn push_cstr(&mut self, bytes: &[u8]) -> Result<()> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.extend(&bytes[..end])
    }

    /// Append a counted byte sequence.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        match &mut self.repr {
            Repr::Inline { data, len } => {
                data[*len..*len + bytes.len()].copy_from_slice(bytes);
                *len += bytes.len();
            }
            Repr::Heap(v) => v.extend_from_slice(bytes),
        }
        Ok(())
    }

    /// Move the contents out, leaving the buffer empty and inline.
    pub fn take(&mut self) -> Vec<u8> {
        match std::mem::replace(&mut self.repr, Self::new().repr) {
            Repr::Inline { data, len } => data[..len].to_vec(),
            Repr::Heap(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_inline_up_to_capacity() {
        let mut buf = SmallBuf::new();
        buf.extend(&[b'7'; INLINE_CAPACITY]).unwrap();
        assert!(buf.is_inline());
        assert_eq!(buf.len(), INLINE_CAPACITY);
        buf.push(b'8').unwrap();
        assert!(!buf.is_inline());
        assert_eq!(buf.len(), INLINE_CAPACITY + 1);
        assert_eq!(buf.as_bytes()[INLINE_CAPACITY], b'8');
    }

    #[test]
    fn push_cstr_stops_at_nul() {
        let mut buf = SmallBuf::new();
        buf.push_cstr(b"12\x0034").unwrap();
        assert_eq!(buf.as_bytes(), b"12");
        buf.push_cstr(b"5").unwrap();
        assert_eq!(buf.as_str(), Some("125"));
    }

    #[test]
    fn take_moves_out_and_resets() {
        let mut buf = SmallBuf::new();
        buf.extend(b"0x1f").unwrap();
        assert_eq!(buf.take(), b"0x1f".to_vec());
        assert!(buf.is_empty());
        assert!(buf.is_inline());

        let long = vec![b'9'; 100];
        buf.extend(&long).unwrap();
        assert_eq!(buf.take(), long);
    }

    #[test]
    fn clear_keeps_heap_allocation() {
        let mut buf = SmallBuf::new();
        buf.reserve(64).unwrap();
        assert!(!buf.is_inline());
        buf.push(b'a').unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
    }
}
