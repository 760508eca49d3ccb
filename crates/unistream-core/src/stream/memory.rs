//! In-memory backends: fixed-size and growable buffers.

use bytes::Bytes;

use crate::errno::{Result, StreamError};

use super::position::{Whence, resolve_seek};

/// Smallest capacity a dynamic buffer grows to.
pub const MIN_DYNAMIC_CAPACITY: usize = 16;

/// Next capacity for a buffer that must hold `required` bytes.
#[must_use]
pub fn grow_capacity(current: usize, required: usize) -> usize {
    (current + current / 2).max(required).max(MIN_DYNAMIC_CAPACITY)
}

// ---------------------------------------------------------------------------
// Sized buffer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum SizedStorage {
    /// Read-only view; shares storage with the caller's `Bytes`.
    Const(Bytes),
    Mut(Vec<u8>),
}

/// Fixed-capacity buffer. The size is always the capacity.
#[derive(Debug)]
pub struct SizedBuffer {
    storage: SizedStorage,
    pos: usize,
}

impl SizedBuffer {
    pub(crate) fn new_const(bytes: Bytes) -> Self {
        Self {
            storage: SizedStorage::Const(bytes),
            pos: 0,
        }
    }

    pub(crate) fn new_mut(storage: Vec<u8>) -> Self {
        Self {
            storage: SizedStorage::Mut(storage),
            pos: 0,
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            SizedStorage::Const(b) => b,
            SizedStorage::Mut(v) => v,
        }
    }

    #[must_use]
    pub fn is_const(&self) -> bool {
        matches!(self.storage, SizedStorage::Const(_))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.as_slice().len()
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let src = self.as_slice();
        let n = out.len().min(src.len() - self.pos);
        out[..n].copy_from_slice(&src[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Write in place. Fails with `NoSpaceLeft` only when nothing fits.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let SizedStorage::Mut(dst) = &mut self.storage else {
            return Err(StreamError::WriteNotAllowed);
        };
        let n = bytes.len().min(dst.len() - self.pos);
        if n == 0 && !bytes.is_empty() {
            return Err(StreamError::NoSpaceLeft);
        }
        dst[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.pos += n;
        Ok(n)
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let cap = self.capacity() as u64;
        let target = resolve_seek(self.position(), cap, offset, whence)?;
        if target > cap {
            return Err(StreamError::InvalidArgument);
        }
        self.pos = target as usize;
        Ok(target)
    }

    /// Move the storage out, leaving an empty buffer behind.
    pub fn take(&mut self) -> Result<Vec<u8>> {
        match &mut self.storage {
            SizedStorage::Const(_) => Err(StreamError::NotSupported),
            SizedStorage::Mut(v) => {
                self.pos = 0;
                Ok(std::mem::take(v))
            }
        }
    }

    /// Install new storage; its length becomes the capacity.
    pub fn grab(&mut self, storage: Vec<u8>) {
        self.storage = SizedStorage::Mut(storage);
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// Dynamic buffer
// ---------------------------------------------------------------------------

/// Growable buffer.
///
/// `data.len()` is the logical size. The position may sit past the size;
/// the next write zero-fills the gap.
#[derive(Debug, Default)]
pub struct DynamicBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl DynamicBuffer {
    pub(crate) fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        if self.pos >= self.data.len() {
            return 0;
        }
        let n = out.len().min(self.data.len() - self.pos);
        out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    pub fn write(&mut self, bytes: &[u8], append: bool) -> Result<usize> {
        if append {
            self.pos = self.data.len();
        }
        let end = self
            .pos
            .checked_add(bytes.len())
            .ok_or(StreamError::NoMemory)?;
        self.ensure_capacity(end)?;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        let overlap = (self.data.len() - self.pos).min(bytes.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.pos = end;
        Ok(bytes.len())
    }

    fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        if required <= self.data.capacity() {
            return Ok(());
        }
        let target = grow_capacity(self.data.capacity(), required);
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| StreamError::NoMemory)
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let target = resolve_seek(self.position(), self.data.len() as u64, offset, whence)?;
        self.pos = usize::try_from(target).map_err(|_| StreamError::Overflow)?;
        Ok(target)
    }

    /// Truncate or zero-extend to `size` bytes.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        self.ensure_capacity(size)?;
        self.data.resize(size, 0);
        Ok(())
    }

    pub fn take(&mut self) -> Vec<u8> {
        self.pos = 0;
        std::mem::take(&mut self.data)
    }

    pub fn grab(&mut self, data: Vec<u8>) {
        self.data = data;
        self.pos = 0;
    }
}
