//! Circular byte buffer shared between threads.
//!
//! Every access takes the ring's mutex. Several stream handles may refer to
//! the same ring (see `Stream::clone_thread_buffer`), which is how a producer
//! thread hands bytes to a consumer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errno::{Result, StreamError};

use super::memory::grow_capacity;

/// Ring storage.
///
/// Invariants: `head < cap` and `tail < cap` whenever `cap > 0`;
/// `head == tail` means empty. One slot always stays free so that a full
/// ring is never mistaken for an empty one.
#[derive(Debug, Default)]
pub struct Ring {
    data: Vec<u8>,
    head: usize,
    tail: usize,
}

impl Ring {
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let cap = self.data.len();
        if cap == 0 { 0 } else { (self.tail + cap - self.head) % cap }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Grow so that `additional` more bytes fit, realigning to index 0.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        let len = self.len();
        let required = len
            .checked_add(additional)
            .and_then(|n| n.checked_add(1))
            .ok_or(StreamError::NoMemory)?;
        if required <= self.data.len() {
            return Ok(());
        }
        let new_cap = grow_capacity(self.data.len(), required);
        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(new_cap)
            .map_err(|_| StreamError::NoMemory)?;
        fresh.resize(new_cap, 0);
        let copied = self.copy_out(&mut fresh[..len]);
        debug_assert_eq!(copied, len);
        self.data = fresh;
        self.head = 0;
        self.tail = len;
        Ok(())
    }

    /// Copy without consuming. Returns the count copied.
    fn copy_out(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len());
        let cap = self.data.len();
        let first = n.min(cap - self.head);
        out[..first].copy_from_slice(&self.data[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.data[..n - first]);
        n
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.copy_out(out);
        if n > 0 {
            self.head = (self.head + n) % self.data.len();
        }
        n
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        self.reserve(bytes.len())?;
        let cap = self.data.len();
        let first = bytes.len().min(cap - self.tail);
        self.data[self.tail..self.tail + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        self.tail = (self.tail + bytes.len()) % cap;
        Ok(bytes.len())
    }

    /// Contents in order, without consuming.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len()];
        self.copy_out(&mut out);
        out
    }

    pub fn take(&mut self) -> Vec<u8> {
        let out = self.to_vec();
        *self = Ring::default();
        out
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

/// Handle to a mutex-protected ring.
#[derive(Debug, Clone, Default)]
pub struct ThreadBuffer {
    ring: Arc<Mutex<Ring>>,
}

impl ThreadBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, out: &mut [u8]) -> usize {
        self.ring.lock().read(out)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.ring.lock().write(bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.ring.lock().to_vec()
    }

    pub fn take(&self) -> Vec<u8> {
        self.ring.lock().take()
    }

    /// Replace the contents.
    pub fn grab(&self, data: &[u8]) -> Result<()> {
        let mut ring = self.ring.lock();
        ring.clear();
        ring.write(data).map(|_| ())
    }

    /// Number of stream handles sharing this ring.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.ring)
    }
}
