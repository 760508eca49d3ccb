//! Lockable streams.
//!
//! A [`SharedStream`] is a stream behind a reentrant mutex. Every call takes
//! the lock, so operations from different threads are totally ordered;
//! [`SharedStream::lock`] holds it across a sequence of calls. The same
//! thread may re-enter the lock, but not re-borrow the stream while a call
//! on it is still running: that fails with `Os(EDEADLK)`.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::errno::{EDEADLK, Result, StreamError};

use super::Stream;

/// Cloneable handle to a stream guarded by a recursive mutex.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<ReentrantMutex<RefCell<Stream>>>,
}

impl SharedStream {
    #[must_use]
    pub fn new(stream: Stream) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(stream))),
        }
    }

    /// Run `f` on the stream under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Stream) -> R) -> Result<R> {
        let guard = self.inner.lock();
        let mut stream = guard
            .try_borrow_mut()
            .map_err(|_| StreamError::Os(EDEADLK))?;
        stream.mark_in_use(true);
        let out = f(&mut *stream);
        stream.mark_in_use(false);
        Ok(out)
    }

    /// [`Self::with`] for operations that already return a `Result`.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Stream) -> Result<R>) -> Result<R> {
        self.with(f)?
    }

    /// Hold the lock until the guard drops.
    pub fn lock(&self) -> SharedGuard<'_> {
        SharedGuard {
            guard: self.inner.lock(),
        }
    }

    /// Whether both handles refer to the same stream.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Close the stream if this is the last handle; otherwise hand the
    /// handle back.
    pub fn try_close(self) -> std::result::Result<Result<()>, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().into_inner().close()),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl From<Stream> for SharedStream {
    fn from(stream: Stream) -> Self {
        Self::new(stream)
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        match guard.try_borrow() {
            Ok(s) => f.debug_tuple("SharedStream").field(&s.id()).finish(),
            Err(_) => f.write_str("SharedStream(<busy>)"),
        }
    }
}

/// The lock held by [`SharedStream::lock`].
pub struct SharedGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<Stream>>,
}

impl SharedGuard<'_> {
    /// Borrow the stream. Fails with `Os(EDEADLK)` if it is already borrowed
    /// further up this thread's stack.
    pub fn stream(&self) -> Result<RefMut<'_, Stream>> {
        self.guard
            .try_borrow_mut()
            .map_err(|_| StreamError::Os(EDEADLK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_runs_under_lock() {
        let shared = SharedStream::new(Stream::open_dynamic_buffer("w+b").unwrap());
        let n = shared.with(|s| s.write_bytes(b"abc")).unwrap();
        assert_eq!(n, 3);
        let again = shared.clone();
        assert!(again.ptr_eq(&shared));
        assert_eq!(again.try_with(Stream::size).unwrap(), 3);
    }

    #[test]
    fn reentrant_borrow_is_deadlock_error() {
        let shared = SharedStream::new(Stream::open_empty());
        let inner = shared.clone();
        let res = shared.with(move |_| inner.with(|_| ())).unwrap();
        assert_eq!(res, Err(StreamError::Os(EDEADLK)));
    }

    #[test]
    fn guard_spans_several_calls() {
        let shared = SharedStream::new(Stream::open_dynamic_buffer("w+b").unwrap());
        {
            let guard = shared.lock();
            let mut s = guard.stream().unwrap();
            s.puts("ab").unwrap();
            s.puts("cd").unwrap();
            // The lock is reentrant, so `with` on the same thread still works
            // once the borrow above is released.
            drop(s);
            shared.with(|s| s.puts("ef")).unwrap().unwrap();
        }
        assert_eq!(shared.try_with(Stream::size).unwrap(), 6);
    }

    #[test]
    fn try_close_needs_last_handle() {
        let shared = SharedStream::new(Stream::open_empty());
        let other = shared.clone();
        let shared = shared.try_close().unwrap_err();
        drop(other);
        assert_eq!(shared.try_close().unwrap(), Ok(()));
    }
}
