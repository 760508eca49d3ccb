//! The stream engine.
//!
//! A [`Stream`] owns one backend variant plus the engine state around it:
//! the flag set, the last error, a 15-byte unget stack, an optional engine
//! buffer, timeouts and the text-mode line ending.
//!
//! Direction rules: a stream is idle, reading (`JUST_READ`) or writing
//! (`JUST_WROTE`). Changing direction requires a state switch (`flush`,
//! `seek(0, Cur)` or any real seek) unless the backend has a single shared
//! cursor and no engine buffer (`NO_STATE_SWITCH`).
//!
//! Failure rules: an operation that fails records its error, sets `ERROR`,
//! and every later I/O operation fails with that error until `clearerr`.

pub mod backend;
pub mod buffer;
pub mod copy;
pub mod custom;
pub mod flags;
pub mod io;
pub mod memory;
pub mod mode;
pub mod os;
pub mod position;
pub mod primitive;
pub mod shared;
pub mod stdio;
pub mod thread_buffer;

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::{LineEnding, config};
use crate::errno::{Result, StreamError};
use crate::metrics::{StreamMetrics, global_metrics};

use backend::Backend;
pub use backend::BackendKind;
pub use buffer::{BufMode, EngineBuffer};
pub use copy::{copy, copy_and_close, slow_copy};
pub use custom::{CustomBackend, TEMPDATA_WORDS, TempData};
pub use flags::StreamFlags;
use memory::{DynamicBuffer, SizedBuffer};
pub use mode::{OpenFlags, parse_mode};
use os::{OsHandle, TimeoutKind};
pub use position::{StdioPos, StreamPos, Whence};
pub use shared::{SharedGuard, SharedStream};
pub use stdio::StdioFile;
use thread_buffer::ThreadBuffer;

/// Capacity of the unget stack.
pub const UNGET_CAPACITY: usize = 15;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Bytes pushed back by `ungetc`, plus at most one byte the text-mode
/// newline peek read past. Pushed bytes come out first and are delivered
/// as pushed; the lookahead is still raw input.
#[derive(Debug, Default)]
struct UngetStack {
    bytes: [u8; UNGET_CAPACITY],
    len: usize,
    lookahead: Option<u8>,
}

impl UngetStack {
    fn push(&mut self, byte: u8) -> bool {
        if self.len == UNGET_CAPACITY {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    fn pop_pushed(&mut self) -> Option<u8> {
        self.len = self.len.checked_sub(1)?;
        Some(self.bytes[self.len])
    }

    fn pop(&mut self) -> Option<u8> {
        self.pop_pushed().or_else(|| self.lookahead.take())
    }

    fn pending(&self) -> usize {
        self.len + usize::from(self.lookahead.is_some())
    }

    fn clear(&mut self) {
        self.len = 0;
        self.lookahead = None;
    }
}

/// A byte stream over one of the backend variants.
#[derive(Debug)]
pub struct Stream {
    id: u64,
    backend: Backend,
    flags: StreamFlags,
    error: Option<StreamError>,
    unget: UngetStack,
    read_timeout: u64,
    write_timeout: u64,
    line_ending: LineEnding,
    buffer: Option<EngineBuffer>,
    /// The buffer holds read-ahead that could not be handed back to a
    /// non-seekable backend; writes bypass it until it is consumed.
    pinned: bool,
    written: u64,
    tempdata: TempData,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Stream {
    fn with_backend(backend: Backend, flags: StreamFlags) -> Self {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        StreamMetrics::inc(&global_metrics().opened);
        let stream = Self {
            id,
            backend,
            flags,
            error: None,
            unget: UngetStack::default(),
            read_timeout: 0,
            write_timeout: 0,
            line_ending: config().line_ending,
            buffer: None,
            pinned: false,
            written: 0,
            tempdata: [0; TEMPDATA_WORDS],
        };
        debug!(stream = id, kind = %stream.kind(), "stream opened");
        stream
    }

    fn read_only(mode: &str) -> Result<OpenFlags> {
        let open = parse_mode(mode)?;
        if open.writable {
            return Err(StreamError::InvalidArgument);
        }
        Ok(open)
    }

    /// Open a file through the std-buffered backend.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        let file = open.to_open_options().open(path)?;
        let flags = open.stream_flags() | StreamFlags::OWNS_HANDLE;
        Ok(Self::with_backend(
            Backend::Stdio(StdioFile::from_file(file)),
            flags,
        ))
    }

    /// Open a file as a raw OS handle with a fully buffered engine buffer.
    pub fn open_os(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        let file = open.to_open_options().open(path)?;
        let mut stream = Self::with_backend(
            Backend::Os(OsHandle::new(file)),
            open.stream_flags() | StreamFlags::OWNS_HANDLE,
        );
        stream.buffer = Some(EngineBuffer::new(BufMode::Full, config().bufsiz));
        Ok(stream)
    }

    /// Wrap a stdio target without taking ownership of it.
    ///
    /// The direction follows the target. These streams are binary: the std
    /// handle is already the text layer.
    #[must_use]
    pub fn from_stdio(file: StdioFile) -> Self {
        let flags = match &file {
            StdioFile::Stdin(_) => StreamFlags::READ,
            StdioFile::Stdout(_) | StdioFile::Stderr(_) => StreamFlags::WRITE,
            StdioFile::File(_) => StreamFlags::READ | StreamFlags::WRITE | StreamFlags::UPDATE,
        };
        Self::with_backend(Backend::Stdio(file), flags | StreamFlags::BINARY)
    }

    /// Wrap an open file as an OS handle. The stream owns it only when the
    /// mode contains `g`.
    pub fn from_os_handle(file: File, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        let mut flags = open.stream_flags();
        flags.set(StreamFlags::OWNS_HANDLE, open.grab);
        let mut stream = Self::with_backend(Backend::Os(OsHandle::new(file)), flags);
        stream.buffer = Some(EngineBuffer::new(BufMode::Full, config().bufsiz));
        Ok(stream)
    }

    /// A read-only stream that is always at end of data.
    #[must_use]
    pub fn open_empty() -> Self {
        Self::with_backend(
            Backend::Empty,
            StreamFlags::READ | StreamFlags::BINARY | StreamFlags::NO_STATE_SWITCH,
        )
    }

    /// Read-only view of a NUL-terminated byte string; the view stops at the
    /// first NUL (or the end, if there is none).
    pub fn open_cstring(s: impl Into<Bytes>, mode: &str) -> Result<Self> {
        let bytes: Bytes = s.into();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Self::open_const_buffer(bytes.slice(..end), mode)
    }

    /// Read-only view of bytes.
    pub fn open_const_buffer(data: impl Into<Bytes>, mode: &str) -> Result<Self> {
        let open = Self::read_only(mode)?;
        Ok(Self::with_backend(
            Backend::Sized(SizedBuffer::new_const(data.into())),
            open.stream_flags() | StreamFlags::NO_STATE_SWITCH,
        ))
    }

    /// Read-write view of fixed-size storage; `storage.len()` is the capacity.
    pub fn open_buffer(storage: Vec<u8>, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        Ok(Self::with_backend(
            Backend::Sized(SizedBuffer::new_mut(storage)),
            open.stream_flags() | StreamFlags::NO_STATE_SWITCH | StreamFlags::OWNS_BUFFER,
        ))
    }

    /// Growable in-memory stream.
    pub fn open_dynamic_buffer(mode: &str) -> Result<Self> {
        Self::open_dynamic_buffer_with(Vec::new(), mode)
    }

    /// Growable in-memory stream starting with `data`. A truncating mode
    /// (`w`) discards it.
    pub fn open_dynamic_buffer_with(mut data: Vec<u8>, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        if open.truncate {
            data.clear();
        }
        Ok(Self::with_backend(
            Backend::Dynamic(DynamicBuffer::from_vec(data)),
            open.stream_flags() | StreamFlags::NO_STATE_SWITCH | StreamFlags::OWNS_BUFFER,
        ))
    }

    /// Read-write circular buffer for handing bytes between threads.
    #[must_use]
    pub fn open_thread_buffer() -> Self {
        Self::thread_stream(ThreadBuffer::new())
    }

    fn thread_stream(ring: ThreadBuffer) -> Self {
        Self::with_backend(
            Backend::Thread(ring),
            StreamFlags::READ
                | StreamFlags::WRITE
                | StreamFlags::UPDATE
                | StreamFlags::BINARY
                | StreamFlags::NO_STATE_SWITCH
                | StreamFlags::OWNS_BUFFER,
        )
    }

    /// Another handle onto the same thread-buffer ring.
    pub fn clone_thread_buffer(&self) -> Result<Self> {
        match &self.backend {
            Backend::Thread(ring) => Ok(Self::thread_stream(ring.clone())),
            _ => Err(StreamError::NotSupported),
        }
    }

    /// Stream over a user-supplied backend.
    pub fn open_custom<B: CustomBackend + 'static>(mut backend: B, mode: &str) -> Result<Self> {
        let open = parse_mode(mode)?;
        backend.open()?;
        let flags = open.stream_flags() | backend.flags();
        Ok(Self::with_backend(Backend::Custom(Box::new(backend)), flags))
    }
}

// ---------------------------------------------------------------------------
// Close
// ---------------------------------------------------------------------------

impl Stream {
    /// Flush, close the backend and release the stream.
    ///
    /// A failed flush takes precedence over a failed backend close.
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    /// Close every stream, returning the first failure.
    pub fn vclose(streams: impl IntoIterator<Item = Stream>) -> Result<()> {
        let mut first = Ok(());
        for stream in streams {
            let res = stream.close();
            if first.is_ok() {
                first = res;
            }
        }
        first
    }

    fn close_inner(&mut self) -> Result<()> {
        if matches!(self.backend, Backend::Closed) {
            return Ok(());
        }
        let mut flushed = if self.flags.contains(StreamFlags::JUST_WROTE) {
            self.drain_all()
        } else {
            Ok(())
        };
        if flushed.is_ok() && self.flags.contains(StreamFlags::WRITE) {
            flushed = self.backend.flush();
        }
        let owned = self.flags.contains(StreamFlags::OWNS_HANDLE);
        let closed = self.backend.close(owned);
        let kind = self.kind();
        self.backend = Backend::Closed;
        self.buffer = None;
        self.unget.clear();
        StreamMetrics::inc(&global_metrics().closed);
        debug!(stream = self.id, kind = %kind, "stream closed");
        flushed.and(closed)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            warn!(stream = self.id, error = %err, "error discarded while dropping stream");
        }
    }
}

// ---------------------------------------------------------------------------
// Error and state bookkeeping
// ---------------------------------------------------------------------------

impl Stream {
    /// Record `err` and return it.
    fn fail(&mut self, err: StreamError) -> StreamError {
        self.flags.insert(StreamFlags::ERROR);
        self.error = Some(err);
        StreamMetrics::inc(&global_metrics().errors);
        trace!(stream = self.id, error = %err, "error recorded");
        err
    }

    fn check_error(&self) -> Result<()> {
        if self.flags.contains(StreamFlags::ERROR) {
            Err(self.error.unwrap_or(StreamError::Io))
        } else {
            Ok(())
        }
    }

    fn begin_read(&mut self) -> Result<()> {
        self.check_error()?;
        if !self.flags.contains(StreamFlags::READ) {
            return Err(self.fail(StreamError::ReadNotAllowed));
        }
        if self.flags.contains(StreamFlags::JUST_WROTE) {
            if !self.flags.contains(StreamFlags::NO_STATE_SWITCH) {
                return Err(self.fail(StreamError::ReadNotAllowed));
            }
            self.switch_state().map_err(|e| self.fail(e))?;
        }
        self.flags.insert(StreamFlags::JUST_READ);
        Ok(())
    }

    fn begin_write(&mut self) -> Result<()> {
        self.check_error()?;
        if !self.flags.contains(StreamFlags::WRITE) {
            return Err(self.fail(StreamError::WriteNotAllowed));
        }
        if self.flags.contains(StreamFlags::JUST_READ) {
            if !self.flags.contains(StreamFlags::NO_STATE_SWITCH) {
                return Err(self.fail(StreamError::WriteNotAllowed));
            }
            self.switch_state().map_err(|e| self.fail(e))?;
        }
        self.flags.insert(StreamFlags::JUST_WROTE);
        Ok(())
    }

    /// Bytes the engine holds ahead of the caller's read position.
    fn read_ahead(&self) -> u64 {
        let buffered = match &self.buffer {
            Some(b) if self.pinned || self.flags.contains(StreamFlags::JUST_READ) => b.len(),
            _ => 0,
        };
        (buffered + self.unget.pending()) as u64
    }

    /// Bytes accepted from the caller but not yet handed to the backend.
    fn write_behind(&self) -> u64 {
        match &self.buffer {
            Some(b) if !self.pinned && self.flags.contains(StreamFlags::JUST_WROTE) => b.len() as u64,
            _ => 0,
        }
    }

    /// Leave the reading/writing state: drain pending writes, hand read-ahead
    /// back to the backend, and tell a custom backend about it.
    fn switch_state(&mut self) -> Result<()> {
        let was = self.flags & (StreamFlags::JUST_READ | StreamFlags::JUST_WROTE);
        if was.is_empty() {
            return Ok(());
        }
        if was.contains(StreamFlags::JUST_WROTE) {
            self.drain_all()?;
        }
        if was.contains(StreamFlags::JUST_READ) {
            self.return_read_ahead();
        }
        self.flags
            .remove(StreamFlags::JUST_READ | StreamFlags::JUST_WROTE);
        if let Backend::Custom(c) = &mut self.backend {
            match c.state_switch() {
                Ok(()) | Err(StreamError::NotSupported) => {}
                Err(e) => return Err(e),
            }
        }
        trace!(stream = self.id, "state switch");
        Ok(())
    }

    /// Seek the backend back over unconsumed bytes and drop them. A backend
    /// that cannot seek keeps them, pinned, for later reads.
    fn return_read_ahead(&mut self) {
        let ahead = self.read_ahead();
        if ahead == 0 {
            return;
        }
        let back = i64::try_from(ahead).map_or(i64::MIN, |n| -n);
        match self.backend.seek(back, Whence::Cur) {
            Ok(_) => {
                if let Some(b) = self.buffer.as_mut() {
                    b.discard();
                }
                self.unget.clear();
                self.pinned = false;
            }
            Err(_) => {
                self.pinned = self.buffer.as_ref().is_some_and(|b| !b.is_empty());
            }
        }
    }

    fn discard_read_ahead(&mut self) {
        if let Some(b) = self.buffer.as_mut()
            && (self.pinned || self.flags.contains(StreamFlags::JUST_READ))
        {
            b.discard();
        }
        self.unget.clear();
        self.pinned = false;
    }
}

// ---------------------------------------------------------------------------
// Buffered transfer
// ---------------------------------------------------------------------------

impl Stream {
    /// One backend write of the pending bytes; the residue moves to the front.
    fn drain_once(&mut self) -> Result<()> {
        let Some(buf) = self.buffer.as_mut() else {
            return Ok(());
        };
        if buf.is_empty() {
            return Ok(());
        }
        let append = self.flags.contains(StreamFlags::APPEND);
        StreamMetrics::inc(&global_metrics().backend_calls);
        let n = self.backend.write(buf.pending(), append)?;
        buf.consume_front(n);
        StreamMetrics::inc(&global_metrics().drains);
        trace!(stream = self.id, bytes = n, "buffer drained");
        Ok(())
    }

    fn drain_all(&mut self) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        while self.buffer.as_ref().is_some_and(|b| !b.is_empty()) {
            self.drain_once()?;
        }
        Ok(())
    }

    /// Refill the read buffer with a single backend read.
    fn refill(&mut self) -> Result<usize> {
        let Some(buf) = self.buffer.as_mut() else {
            return Ok(0);
        };
        StreamMetrics::inc(&global_metrics().backend_calls);
        let slot = buf.refill_slot();
        let n = self.backend.read(slot)?;
        buf.commit_refill(n);
        StreamMetrics::inc(&global_metrics().refills);
        trace!(stream = self.id, bytes = n, "buffer refilled");
        Ok(n)
    }

    /// Untranslated read. Sets `EOF` when the backend runs dry and records
    /// any error; returns the bytes delivered either way.
    fn read_raw(&mut self, out: &mut [u8]) -> usize {
        let mut done = 0;
        while done < out.len() {
            match self.unget.pop() {
                Some(b) => {
                    out[done] = b;
                    done += 1;
                }
                None => break,
            }
        }
        if let Some(buf) = self.buffer.as_mut() {
            done += buf.take_read(&mut out[done..]);
            if buf.is_empty() {
                self.pinned = false;
            }
        }
        while done < out.len() {
            let want = out.len() - done;
            let buffered = self
                .buffer
                .as_ref()
                .is_some_and(|b| b.mode() != BufMode::None && want < b.capacity());
            let got = if buffered {
                self.refill()
            } else {
                StreamMetrics::inc(&global_metrics().backend_calls);
                self.backend.read(&mut out[done..])
            };
            match got {
                Ok(0) => {
                    self.flags.insert(StreamFlags::EOF);
                    break;
                }
                Ok(_) if buffered => {
                    if let Some(buf) = self.buffer.as_mut() {
                        done += buf.take_read(&mut out[done..]);
                    }
                }
                Ok(n) => done += n,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }
        done
    }

    /// Read one byte for the newline peek. EOF hit by the peek is not left
    /// set; an error stays recorded.
    fn peek_raw(&mut self) -> Option<u8> {
        let had_eof = self.flags.contains(StreamFlags::EOF);
        let mut byte = [0u8; 1];
        if self.read_raw(&mut byte) == 1 {
            Some(byte[0])
        } else {
            self.flags.set(StreamFlags::EOF, had_eof);
            None
        }
    }

    /// Text-mode read: `CR`, `LF`, `CR LF` and `LF CR` each become `\n`.
    /// Bytes pushed back with `ungetc` were translated already and are not
    /// paired again.
    fn read_translated(&mut self, out: &mut [u8]) -> usize {
        let mut done = 0;
        while done < out.len() {
            match self.unget.pop_pushed() {
                Some(b) => {
                    out[done] = b;
                    done += 1;
                }
                None => break,
            }
        }
        while done < out.len() {
            let want = out.len() - done;
            let n = self.read_raw(&mut out[done..]);
            let end = done + n;
            let mut r = done;
            let mut w = done;
            while r < end {
                let byte = out[r];
                r += 1;
                if byte == b'\r' || byte == b'\n' {
                    let partner = if byte == b'\r' { b'\n' } else { b'\r' };
                    if r < end {
                        if out[r] == partner {
                            r += 1;
                        }
                    } else if let Some(next) = self.peek_raw()
                        && next != partner
                    {
                        self.unget.lookahead = Some(next);
                    }
                    out[w] = b'\n';
                } else {
                    out[w] = byte;
                }
                w += 1;
            }
            done = w;
            if n < want {
                break;
            }
        }
        done
    }

    fn write_direct(&mut self, data: &[u8]) -> usize {
        let append = self.flags.contains(StreamFlags::APPEND);
        let mut done = 0;
        while done < data.len() {
            StreamMetrics::inc(&global_metrics().backend_calls);
            match self.backend.write(&data[done..], append) {
                Ok(n) => done += n,
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }
        done
    }

    /// Untranslated write through the engine buffer, if there is one.
    fn write_raw(&mut self, data: &[u8]) -> usize {
        let (cap, mode) = match &self.buffer {
            Some(b) if !self.pinned && b.mode() != BufMode::None => (b.capacity(), b.mode()),
            _ => return self.write_direct(data),
        };
        if data.len() >= cap {
            if let Err(e) = self.drain_all() {
                self.fail(e);
                return 0;
            }
            return self.write_direct(data);
        }
        let mut done = 0;
        while done < data.len() {
            let Some(buf) = self.buffer.as_mut() else {
                break;
            };
            done += buf.append(&data[done..]);
            if buf.is_full()
                && let Err(e) = self.drain_once()
            {
                self.fail(e);
                return done;
            }
        }
        if mode == BufMode::Line
            && data.contains(&b'\n')
            && let Err(e) = self.drain_all()
        {
            self.fail(e);
        }
        done
    }

    /// Text-mode write: each `\n` goes out as the stream's line ending.
    fn write_translated(&mut self, data: &[u8]) -> usize {
        let ending = self.line_ending.as_bytes();
        let mut done = 0;
        let mut rest = data;
        while !rest.is_empty() {
            let (segment, newline) = match rest.iter().position(|&b| b == b'\n') {
                Some(i) => (&rest[..i], true),
                None => (rest, false),
            };
            let n = self.write_raw(segment);
            done += n;
            if n < segment.len() {
                return done;
            }
            if newline {
                if self.write_raw(ending) < ending.len() {
                    return done;
                }
                done += 1;
                rest = &rest[segment.len() + 1..];
            } else {
                rest = &[];
            }
        }
        done
    }
}

// ---------------------------------------------------------------------------
// Block and character I/O
// ---------------------------------------------------------------------------

impl Stream {
    fn block_len(&mut self, len: usize, size: usize, count: usize) -> Option<usize> {
        if size == 0 || count == 0 {
            if size != count {
                self.fail(StreamError::InvalidArgument);
            }
            return None;
        }
        match size.checked_mul(count) {
            Some(total) if total <= len => Some(total),
            _ => {
                self.fail(StreamError::InvalidArgument);
                None
            }
        }
    }

    /// Read up to `count` blocks of `size` bytes. Returns whole blocks read;
    /// a short count means EOF or an error (see [`Self::eof`], [`Self::error`]).
    pub fn read(&mut self, buf: &mut [u8], size: usize, count: usize) -> usize {
        match self.block_len(buf.len(), size, count) {
            Some(total) => self.read_bytes(&mut buf[..total]) / size,
            None => 0,
        }
    }

    /// Write up to `count` blocks of `size` bytes. Returns whole blocks written.
    pub fn write(&mut self, buf: &[u8], size: usize, count: usize) -> usize {
        match self.block_len(buf.len(), size, count) {
            Some(total) => self.write_bytes(&buf[..total]) / size,
            None => 0,
        }
    }

    /// Fill `out` as far as possible. Returns the bytes read.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> usize {
        if out.is_empty() || self.begin_read().is_err() {
            return 0;
        }
        self.flags.remove(StreamFlags::EOF);
        let n = if self.flags.contains(StreamFlags::BINARY) {
            self.read_raw(out)
        } else {
            self.read_translated(out)
        };
        StreamMetrics::add(&global_metrics().bytes_read, n);
        n
    }

    /// Write as much of `data` as possible. Returns the bytes accepted.
    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        if data.is_empty() || self.begin_write().is_err() {
            return 0;
        }
        let n = if self.flags.contains(StreamFlags::BINARY) || self.line_ending == LineEnding::Lf
        {
            self.write_raw(data)
        } else {
            self.write_translated(data)
        };
        StreamMetrics::add(&global_metrics().bytes_written, n);
        self.written += n as u64;
        n
    }

    /// Write all of `data` or report why not.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.write_bytes(data) == data.len() {
            Ok(())
        } else {
            Err(self.error.unwrap_or(StreamError::Io))
        }
    }

    /// Next byte, or `None` at end of data or on error.
    pub fn getc(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read_bytes(&mut byte) == 1).then_some(byte[0])
    }

    /// Push `byte` back so the next read returns it. Returns `None` when the
    /// stack is full or the stream cannot read.
    pub fn ungetc(&mut self, byte: u8) -> Option<u8> {
        if !self.flags.contains(StreamFlags::READ) {
            return None;
        }
        if self.flags.contains(StreamFlags::JUST_WROTE) {
            if !self.flags.contains(StreamFlags::NO_STATE_SWITCH) {
                return None;
            }
            self.switch_state().ok()?;
        }
        if !self.unget.push(byte) {
            return None;
        }
        self.flags.insert(StreamFlags::JUST_READ);
        self.flags.remove(StreamFlags::EOF);
        Some(byte)
    }

    pub fn putc(&mut self, byte: u8) -> Result<()> {
        self.write_all(&[byte])
    }

    /// Write `byte` `count` times.
    pub fn putc_n(&mut self, byte: u8, count: usize) -> Result<()> {
        let chunk = [byte; 256];
        let mut left = count;
        while left > 0 {
            let n = left.min(chunk.len());
            self.write_all(&chunk[..n])?;
            left -= n;
        }
        Ok(())
    }

    /// Write a byte string as-is (no newline is added).
    pub fn puts(&mut self, s: impl AsRef<[u8]>) -> Result<()> {
        self.write_all(s.as_ref())
    }

    /// Read a line into `buf`, keeping the `\n`, stopping when `buf` is
    /// full. Returns the bytes stored, or `None` if nothing could be read.
    pub fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = self.getc() else {
                break;
            };
            buf[n] = byte;
            n += 1;
            if byte == b'\n' {
                break;
            }
        }
        (n > 0).then_some(n)
    }

    /// Hand buffered writes to the backend (or hand read-ahead back to it)
    /// and leave the reading/writing state.
    pub fn flush(&mut self) -> Result<()> {
        self.check_error()?;
        self.switch_state().map_err(|e| self.fail(e))?;
        self.backend.flush().map_err(|e| self.fail(e))
    }
}

// ---------------------------------------------------------------------------
// Positioning
// ---------------------------------------------------------------------------

impl Stream {
    fn seek_inner(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if self.flags.contains(StreamFlags::JUST_WROTE) {
            self.drain_all()?;
        }
        let (offset, whence) = match whence {
            Whence::Cur => {
                let ahead = i64::try_from(self.read_ahead()).map_err(|_| StreamError::Overflow)?;
                (offset.checked_sub(ahead).ok_or(StreamError::Overflow)?, Whence::Cur)
            }
            other => (offset, other),
        };
        let pos = self.backend.seek(offset, whence)?;
        self.discard_read_ahead();
        self.flags
            .remove(StreamFlags::JUST_READ | StreamFlags::JUST_WROTE | StreamFlags::EOF);
        Ok(pos)
    }

    /// Move the cursor. `seek(0, Whence::Cur)` is a pure state switch and
    /// succeeds on backends that cannot seek.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        self.check_error()?;
        if offset == 0 && whence == Whence::Cur {
            return self.switch_state().map_err(|e| self.fail(e));
        }
        self.seek_inner(offset, whence)
            .map(|_| ())
            .map_err(|e| self.fail(e))
    }

    /// Move the cursor and return the new absolute position.
    pub fn seek64(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.check_error()?;
        if offset == 0 && whence == Whence::Cur {
            self.switch_state().map_err(|e| self.fail(e))?;
            return self.tell64();
        }
        self.seek_inner(offset, whence).map_err(|e| self.fail(e))
    }

    /// Current position as seen by the caller.
    pub fn tell64(&mut self) -> Result<u64> {
        let base = self.backend.tell().map_err(|e| self.fail(e))?;
        Ok((base + self.write_behind()).saturating_sub(self.read_ahead()))
    }

    /// [`Self::tell64`] narrowed to `i64`.
    pub fn tell(&mut self) -> Result<i64> {
        let pos = self.tell64()?;
        i64::try_from(pos).map_err(|_| self.fail(StreamError::Overflow))
    }

    pub fn getpos(&mut self) -> Result<StreamPos> {
        let pos = self.tell64()?;
        Ok(match self.backend {
            Backend::Stdio(_) => StreamPos::Stdio(StdioPos(pos)),
            _ => StreamPos::Offset(pos),
        })
    }

    pub fn setpos(&mut self, pos: &StreamPos) -> Result<()> {
        let raw = match (&self.backend, *pos) {
            (Backend::Stdio(_), StreamPos::Stdio(StdioPos(raw))) => raw,
            (Backend::Stdio(_), StreamPos::Offset(_)) | (_, StreamPos::Stdio(_)) => {
                return Err(self.fail(StreamError::InvalidArgument));
            }
            (_, StreamPos::Offset(off)) => off,
        };
        let offset = i64::try_from(raw).map_err(|_| self.fail(StreamError::Overflow))?;
        self.seek64(offset, Whence::Set).map(|_| ())
    }

    /// Total size in bytes, including writes still in the engine buffer.
    pub fn size64(&mut self) -> Result<u64> {
        self.check_error()?;
        if self.flags.contains(StreamFlags::JUST_WROTE) {
            self.drain_all().map_err(|e| self.fail(e))?;
        }
        self.backend.size().map_err(|e| self.fail(e))
    }

    pub fn size(&mut self) -> Result<i64> {
        let size = self.size64()?;
        i64::try_from(size).map_err(|_| self.fail(StreamError::Overflow))
    }

    /// Seek to the start and clear the error and EOF indicators.
    pub fn rewind(&mut self) -> Result<()> {
        self.clearerr();
        self.seek(0, Whence::Set)
    }

    /// Truncate or extend to `size` bytes.
    pub fn resize(&mut self, size: u64) -> Result<()> {
        self.check_error()?;
        if self.flags.contains(StreamFlags::JUST_WROTE) {
            self.drain_all().map_err(|e| self.fail(e))?;
        }
        self.backend.resize(size).map_err(|e| self.fail(e))
    }
}

// ---------------------------------------------------------------------------
// Indicators and properties
// ---------------------------------------------------------------------------

impl Stream {
    /// Process-unique id, used in log fields.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The recorded error, if the error indicator is set.
    #[must_use]
    pub fn error(&self) -> Option<StreamError> {
        if self.flags.contains(StreamFlags::ERROR) {
            self.error
        } else {
            None
        }
    }

    pub fn set_error(&mut self, err: StreamError) {
        self.fail(err);
    }

    #[must_use]
    pub fn eof(&self) -> bool {
        self.flags.contains(StreamFlags::EOF)
    }

    pub fn clearerr(&mut self) {
        self.flags.remove(StreamFlags::ERROR | StreamFlags::EOF);
        self.error = None;
        if let Backend::Custom(c) = &mut self.backend {
            c.clearerr();
        }
    }

    #[must_use]
    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    #[must_use]
    pub fn just_read(&self) -> bool {
        self.flags.contains(StreamFlags::JUST_READ)
    }

    #[must_use]
    pub fn just_wrote(&self) -> bool {
        self.flags.contains(StreamFlags::JUST_WROTE)
    }

    #[must_use]
    pub fn binary(&self) -> bool {
        self.flags.contains(StreamFlags::BINARY)
    }

    #[must_use]
    pub fn text(&self) -> bool {
        !self.binary()
    }

    #[must_use]
    pub fn readable(&self) -> bool {
        self.flags.contains(StreamFlags::READ)
    }

    #[must_use]
    pub fn writable(&self) -> bool {
        self.flags.contains(StreamFlags::WRITE)
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend
            .kind(self.flags.contains(StreamFlags::OWNS_HANDLE))
    }

    /// The backend variant's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// The variant name, or a custom backend's own description.
    #[must_use]
    pub fn description(&self) -> Cow<'static, str> {
        self.backend
            .description(self.flags.contains(StreamFlags::OWNS_HANDLE))
    }

    #[must_use]
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn set_line_ending(&mut self, ending: LineEnding) {
        self.line_ending = ending;
    }

    /// Scratch space reserved for the backend.
    pub fn tempdata(&mut self) -> &mut TempData {
        &mut self.tempdata
    }

    /// Bytes accepted by writes over the stream's lifetime.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Make the stream own its stdio or OS handle.
    pub fn grab_file(&mut self) -> Result<()> {
        self.set_owns_handle(true)
    }

    /// Make the stream leave its stdio or OS handle open on close.
    pub fn ungrab_file(&mut self) -> Result<()> {
        self.set_owns_handle(false)
    }

    fn set_owns_handle(&mut self, owned: bool) -> Result<()> {
        match self.backend {
            Backend::Stdio(_) | Backend::Os(_) => {
                self.flags.set(StreamFlags::OWNS_HANDLE, owned);
                Ok(())
            }
            _ => Err(StreamError::NotSupported),
        }
    }
}

// ---------------------------------------------------------------------------
// Underlying storage of memory backends
// ---------------------------------------------------------------------------

impl Stream {
    /// Contents of a sized or dynamic buffer.
    #[must_use]
    pub fn underlying_buffer(&self) -> Option<&[u8]> {
        match &self.backend {
            Backend::Sized(b) => Some(b.as_slice()),
            Backend::Dynamic(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn underlying_buffer_size(&self) -> Result<usize> {
        match &self.backend {
            Backend::Sized(b) => Ok(b.capacity()),
            Backend::Dynamic(b) => Ok(b.size()),
            Backend::Thread(t) => Ok(t.len()),
            _ => Err(StreamError::NotSupported),
        }
    }

    pub fn underlying_buffer_capacity(&self) -> Result<usize> {
        match &self.backend {
            Backend::Sized(b) => Ok(b.capacity()),
            Backend::Dynamic(b) => Ok(b.capacity()),
            Backend::Thread(t) => Ok(t.capacity()),
            _ => Err(StreamError::NotSupported),
        }
    }

    /// Move the storage out. The stream is left empty and positioned at 0.
    pub fn take_underlying_buffer(&mut self) -> Result<Vec<u8>> {
        let data = match &mut self.backend {
            Backend::Sized(b) => b.take()?,
            Backend::Dynamic(b) => b.take(),
            Backend::Thread(t) => t.take(),
            _ => return Err(StreamError::NotSupported),
        };
        self.unget.clear();
        self.flags.remove(StreamFlags::OWNS_BUFFER | StreamFlags::EOF);
        Ok(data)
    }

    /// Install `data` as the storage and take ownership of it.
    pub fn grab_underlying_buffer(&mut self, data: Vec<u8>) -> Result<()> {
        match &mut self.backend {
            Backend::Sized(b) if !b.is_const() => b.grab(data),
            Backend::Dynamic(b) => b.grab(data),
            Backend::Thread(t) => t.grab(&data)?,
            _ => return Err(StreamError::NotSupported),
        }
        self.unget.clear();
        self.flags.insert(StreamFlags::OWNS_BUFFER);
        self.flags.remove(StreamFlags::EOF);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine buffer and timeouts
// ---------------------------------------------------------------------------

impl Stream {
    fn accepts_engine_buffer(&self) -> bool {
        matches!(self.backend, Backend::Os(_) | Backend::Custom(_))
    }

    fn replace_buffer(&mut self, buffer: Option<EngineBuffer>) -> Result<()> {
        if !self.accepts_engine_buffer() {
            return Err(StreamError::NotSupported);
        }
        self.check_error()?;
        self.switch_state().map_err(|e| self.fail(e))?;
        if self.pinned || self.unget.pending() > 0 {
            // Unreturned read-ahead would be lost.
            return Err(StreamError::InvalidArgument);
        }
        self.buffer = buffer;
        Ok(())
    }

    /// `Some(storage)` buffers fully in `storage`; `None` turns buffering off.
    pub fn setbuf(&mut self, storage: Option<Vec<u8>>) -> Result<()> {
        self.replace_buffer(storage.map(|s| EngineBuffer::with_storage(BufMode::Full, s)))
    }

    /// Choose the buffering mode. A `size` of 0 means the configured default.
    pub fn setvbuf(&mut self, mode: BufMode, size: usize) -> Result<()> {
        let size = if size == 0 { config().bufsiz } else { size };
        let buffer = (mode != BufMode::None).then(|| EngineBuffer::new(mode, size));
        self.replace_buffer(buffer)
    }

    #[must_use]
    pub fn buf_mode(&self) -> BufMode {
        self.buffer.as_ref().map_or(BufMode::None, EngineBuffer::mode)
    }

    fn set_timeout(&mut self, kind: TimeoutKind, usec: u64) -> Result<()> {
        if let Backend::Os(h) = &mut self.backend {
            h.set_timeout(kind, usec)?;
        }
        match kind {
            TimeoutKind::Read => self.read_timeout = usec,
            TimeoutKind::Write => self.write_timeout = usec,
        }
        Ok(())
    }

    /// Receive timeout in microseconds (0 = none). Applied to OS handles
    /// that are sockets; recorded on every stream.
    pub fn set_read_timeout(&mut self, usec: u64) -> Result<()> {
        self.set_timeout(TimeoutKind::Read, usec)
    }

    pub fn set_write_timeout(&mut self, usec: u64) -> Result<()> {
        self.set_timeout(TimeoutKind::Write, usec)
    }

    #[must_use]
    pub fn read_timeout(&self) -> u64 {
        self.read_timeout
    }

    #[must_use]
    pub fn write_timeout(&self) -> u64 {
        self.write_timeout
    }

    /// Whether the backend supports seeking at all.
    #[must_use]
    pub fn seekable(&self) -> bool {
        self.backend.is_seekable()
    }

    pub(crate) fn mark_in_use(&mut self, in_use: bool) {
        self.flags.set(StreamFlags::IN_USE, in_use);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic() -> Stream {
        Stream::open_dynamic_buffer("w+b").unwrap()
    }

    #[test]
    fn dynamic_write_rewind_read() {
        let mut s = dynamic();
        assert_eq!(s.write_bytes(b"Hello"), 5);
        s.rewind().unwrap();
        let mut out = [0u8; 4];
        assert_eq!(s.read_bytes(&mut out), 4);
        assert_eq!(&out, b"Hell");
        assert_eq!(s.tell().unwrap(), 4);
        assert!(!s.eof());
        assert_eq!(s.getc(), Some(b'o'));
        assert_eq!(s.read_bytes(&mut out), 0);
        assert!(s.eof());
    }

    #[test]
    fn zero_size_or_count_is_invalid_unless_both() {
        let mut s = dynamic();
        let buf = [0u8; 4];
        assert_eq!(s.write(&buf, 0, 0), 0);
        assert_eq!(s.error(), None);
        assert_eq!(s.write(&buf, 0, 3), 0);
        assert_eq!(s.error(), Some(StreamError::InvalidArgument));
    }

    #[test]
    fn block_counts() {
        let mut s = dynamic();
        assert_eq!(s.write(b"abcdefg", 2, 3), 3);
        s.rewind().unwrap();
        let mut out = [0u8; 8];
        // Four blocks of two need eight bytes; only six exist.
        assert_eq!(s.read(&mut out, 2, 4), 3);
        assert!(s.eof());
    }

    #[test]
    fn error_is_sticky_until_clearerr() {
        let mut s = Stream::open_const_buffer(&b"abc"[..], "r").unwrap();
        assert_eq!(s.write_bytes(b"x"), 0);
        assert_eq!(s.error(), Some(StreamError::WriteNotAllowed));
        assert_eq!(s.getc(), None);
        s.clearerr();
        assert_eq!(s.getc(), Some(b'a'));
    }

    #[test]
    fn read_only_views_reject_write_modes() {
        assert_eq!(
            Stream::open_const_buffer(&b"abc"[..], "r+").err(),
            Some(StreamError::InvalidArgument)
        );
    }

    #[test]
    fn cstring_stops_at_nul() {
        let mut s = Stream::open_cstring(&b"ab\0cd"[..], "rb").unwrap();
        assert_eq!(s.size().unwrap(), 2);
        assert_eq!(s.getc(), Some(b'a'));
        assert_eq!(s.getc(), Some(b'b'));
        assert_eq!(s.getc(), None);
    }

    #[test]
    fn text_mode_collapses_line_endings() {
        let mut s = Stream::open_const_buffer(&b"x\r\ny\ny\r"[..], "r").unwrap();
        let got: Vec<_> = std::iter::from_fn(|| s.getc()).collect();
        assert_eq!(got, b"x\ny\ny\n");
        assert!(s.eof());
    }

    #[test]
    fn text_mode_lf_cr_pair_and_bulk_read() {
        let mut s = Stream::open_const_buffer(&b"a\n\rb\r\rc\r\n"[..], "r").unwrap();
        let mut out = [0u8; 16];
        let n = s.read_bytes(&mut out);
        assert_eq!(&out[..n], b"a\nb\n\nc\n");
    }

    #[test]
    fn text_mode_write_expands_newlines() {
        let mut s = Stream::open_dynamic_buffer("w").unwrap();
        s.set_line_ending(LineEnding::CrLf);
        assert_eq!(s.write_bytes(b"a\nb\n"), 4);
        assert_eq!(s.underlying_buffer(), Some(&b"a\r\nb\r\n"[..]));
    }

    #[test]
    fn binary_mode_leaves_bytes_alone() {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        s.set_line_ending(LineEnding::CrLf);
        s.write_bytes(b"a\n");
        assert_eq!(s.underlying_buffer(), Some(&b"a\n"[..]));
    }

    #[test]
    fn unget_stack_holds_fifteen() {
        let mut s = Stream::open_const_buffer(&b"z"[..], "rb").unwrap();
        for i in 0..UNGET_CAPACITY as u8 {
            assert_eq!(s.ungetc(b'a' + i), Some(b'a' + i));
        }
        assert_eq!(s.ungetc(b'!'), None);
        for i in (0..UNGET_CAPACITY as u8).rev() {
            assert_eq!(s.getc(), Some(b'a' + i));
        }
        assert_eq!(s.getc(), Some(b'z'));
    }

    #[test]
    fn ungetc_clears_eof_and_adjusts_tell() {
        let mut s = Stream::open_const_buffer(&b"ab"[..], "rb").unwrap();
        let mut out = [0u8; 4];
        s.read_bytes(&mut out);
        assert!(s.eof());
        assert_eq!(s.ungetc(b'b'), Some(b'b'));
        assert!(!s.eof());
        assert_eq!(s.tell().unwrap(), 1);
        assert_eq!(s.getc(), Some(b'b'));
    }

    #[test]
    fn text_mode_unget_does_not_pair_again() {
        let mut s = Stream::open_const_buffer(&b"\n\r\rX"[..], "r").unwrap();
        assert_eq!(s.getc(), Some(b'\n'));
        assert_eq!(s.ungetc(b'\n'), Some(b'\n'));
        assert_eq!(s.getc(), Some(b'\n'));
        assert_eq!(s.getc(), Some(b'\n'));
        assert_eq!(s.getc(), Some(b'X'));
        assert_eq!(s.getc(), None);

        // A lookahead left by the peek still translates after a push.
        let mut s = Stream::open_const_buffer(&b"a\r\rb"[..], "r").unwrap();
        let mut out = [0u8; 2];
        assert_eq!(s.read_bytes(&mut out), 2);
        assert_eq!(&out, b"a\n");
        assert_eq!(s.ungetc(b'\r'), Some(b'\r'));
        let mut rest = [0u8; 4];
        assert_eq!(s.read_bytes(&mut rest), 3);
        assert_eq!(&rest[..3], b"\r\nb");
    }

    #[test]
    fn ungetc_on_write_only_fails() {
        let mut s = Stream::open_dynamic_buffer("w").unwrap();
        assert_eq!(s.ungetc(b'x'), None);
    }

    #[test]
    fn sized_buffer_reports_no_space() {
        let mut s = Stream::open_buffer(vec![0; 3], "r+b").unwrap();
        assert_eq!(s.write_bytes(b"abcd"), 3);
        assert_eq!(s.error(), Some(StreamError::NoSpaceLeft));
        s.clearerr();
        s.rewind().unwrap();
        let mut out = [0u8; 3];
        assert_eq!(s.read_bytes(&mut out), 3);
        assert_eq!(&out, b"abc");
    }

    #[test]
    fn seek_then_tell_round_trips() {
        let mut s = dynamic();
        s.write_bytes(b"0123456789");
        for p in [0u64, 3, 10, 7] {
            s.seek(p as i64, Whence::Set).unwrap();
            assert_eq!(s.tell64().unwrap(), p);
        }
        s.seek(-2, Whence::End).unwrap();
        assert_eq!(s.getc(), Some(b'8'));
        s.seek(-3, Whence::Cur).unwrap();
        assert_eq!(s.getc(), Some(b'6'));
    }

    #[test]
    fn getpos_setpos_restores_cursor() {
        let mut s = dynamic();
        s.write_bytes(b"abcdef");
        s.seek(2, Whence::Set).unwrap();
        let pos = s.getpos().unwrap();
        assert_eq!(pos, StreamPos::Offset(2));
        s.getc();
        s.getc();
        s.setpos(&pos).unwrap();
        assert_eq!(s.getc(), Some(b'c'));
        assert_eq!(
            s.setpos(&StreamPos::Stdio(StdioPos(0))),
            Err(StreamError::InvalidArgument)
        );
    }

    #[test]
    fn thread_buffer_cannot_seek_but_can_switch_state() {
        let mut s = Stream::open_thread_buffer();
        s.write_bytes(b"abc");
        assert_eq!(s.seek(0, Whence::Cur), Ok(()));
        assert_eq!(s.seek(1, Whence::Set), Err(StreamError::SeekNotAllowed));
        s.clearerr();
        assert_eq!(s.size().unwrap(), 3);
        assert_eq!(s.getc(), Some(b'a'));
    }

    #[test]
    fn thread_buffer_handles_share_ring() {
        let mut writer = Stream::open_thread_buffer();
        let mut reader = writer.clone_thread_buffer().unwrap();
        let handle = std::thread::spawn(move || {
            writer.write_all(b"ping").unwrap();
            writer.close().unwrap();
        });
        handle.join().unwrap();
        let mut out = [0u8; 8];
        assert_eq!(reader.read_bytes(&mut out), 4);
        assert_eq!(&out[..4], b"ping");
    }

    #[test]
    fn dynamic_append_mode() {
        let mut s = Stream::open_dynamic_buffer_with(b"ab".to_vec(), "a+b").unwrap();
        s.seek(0, Whence::Set).unwrap();
        assert_eq!(s.getc(), Some(b'a'));
        s.write_bytes(b"c");
        assert_eq!(s.underlying_buffer(), Some(&b"abc"[..]));
    }

    #[test]
    fn take_and_grab_underlying_buffer() {
        let mut s = dynamic();
        s.write_bytes(b"abc");
        assert_eq!(s.take_underlying_buffer().unwrap(), b"abc".to_vec());
        assert_eq!(s.underlying_buffer_size().unwrap(), 0);
        assert!(!s.flags().contains(StreamFlags::OWNS_BUFFER));
        s.grab_underlying_buffer(b"xyz".to_vec()).unwrap();
        assert!(s.flags().contains(StreamFlags::OWNS_BUFFER));
        assert_eq!(s.getc(), Some(b'x'));
        let empty = Stream::open_empty();
        assert!(empty.underlying_buffer().is_none());
    }

    #[test]
    fn empty_stream_is_eof_and_read_only() {
        let mut s = Stream::open_empty();
        assert_eq!(s.getc(), None);
        assert!(s.eof());
        assert!(s.putc(b'x').is_err());
        assert_eq!(s.type_name(), "empty");
    }

    #[test]
    fn gets_and_puts() {
        let mut s = dynamic();
        s.puts("one\ntwo").unwrap();
        s.putc_n(b'!', 3).unwrap();
        s.rewind().unwrap();
        let mut line = [0u8; 16];
        assert_eq!(s.gets(&mut line), Some(4));
        assert_eq!(&line[..4], b"one\n");
        assert_eq!(s.gets(&mut line), Some(6));
        assert_eq!(&line[..6], b"two!!!");
        assert_eq!(s.gets(&mut line), None);
    }

    #[test]
    fn setvbuf_only_for_os_and_custom() {
        let mut s = dynamic();
        assert_eq!(s.setvbuf(BufMode::Full, 64), Err(StreamError::NotSupported));
        assert_eq!(s.buf_mode(), BufMode::None);
    }

    #[test]
    fn timeouts_are_recorded() {
        let mut s = dynamic();
        s.set_read_timeout(250).unwrap();
        s.set_write_timeout(500).unwrap();
        assert_eq!(s.read_timeout(), 250);
        assert_eq!(s.write_timeout(), 500);
    }

    #[test]
    fn tempdata_is_writable_scratch() {
        let mut s = dynamic();
        s.tempdata()[2] = 42;
        assert_eq!(s.tempdata()[2], 42);
    }

    #[test]
    fn vclose_reports_first_failure() {
        let a = dynamic();
        let b = Stream::open_empty();
        assert_eq!(Stream::vclose([a, b]), Ok(()));
    }
}
