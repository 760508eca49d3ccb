//! Base-N codecs (base64, base32, base16) and the filter stream over them.
//!
//! A group is the smallest run of bytes and symbols carrying the same number
//! of bits: 3 bytes / 4 symbols for base64, 5 / 8 for base32, 1 / 2 for
//! base16. A final group may be short; it is valid only when its count of
//! data symbols is exactly the number its bytes need.

use std::collections::VecDeque;

use tracing::debug;

use crate::errno::{Result, StreamError};
use crate::stream::{CustomBackend, SharedStream, Stream, StreamFlags, Whence};

const INVALID: u8 = 0xff;
const CHUNK: usize = 768;

/// Symbol set plus padding byte. A padding byte of 0 disables padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alphabet {
    symbols: &'static [u8],
    pad: u8,
    bits: u32,
}

impl Alphabet {
    pub const BASE64: Self = Self {
        symbols: b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
        pad: b'=',
        bits: 6,
    };
    pub const BASE64_URL: Self = Self {
        symbols: b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_",
        pad: b'=',
        bits: 6,
    };
    pub const BASE32: Self = Self {
        symbols: b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567",
        pad: b'=',
        bits: 5,
    };
    pub const BASE32_HEX: Self = Self {
        symbols: b"0123456789ABCDEFGHIJKLMNOPQRSTUV",
        pad: b'=',
        bits: 5,
    };
    pub const BASE16: Self = Self {
        symbols: b"0123456789ABCDEF",
        pad: 0,
        bits: 4,
    };

    /// A custom alphabet of 16, 32 or 64 distinct symbols.
    pub fn new(symbols: &'static [u8], pad: u8) -> Result<Self> {
        let bits = match symbols.len() {
            16 => 4,
            32 => 5,
            64 => 6,
            _ => return Err(StreamError::InvalidArgument),
        };
        let mut seen = [false; 256];
        for &s in symbols {
            if s == 0 || s == pad || std::mem::replace(&mut seen[usize::from(s)], true) {
                return Err(StreamError::InvalidArgument);
            }
        }
        Ok(Self { symbols, pad, bits })
    }

    #[must_use]
    pub const fn without_padding(self) -> Self {
        Self { pad: 0, ..self }
    }

    #[must_use]
    pub const fn padded(&self) -> bool {
        self.pad != 0
    }

    const fn group_bits(&self) -> u32 {
        // lcm(8, bits); bits is 4, 5 or 6.
        match self.bits {
            4 => 8,
            5 => 40,
            _ => 24,
        }
    }

    /// Bytes per group.
    #[must_use]
    pub const fn group_bytes(&self) -> usize {
        (self.group_bits() / 8) as usize
    }

    /// Symbols per group.
    #[must_use]
    pub const fn group_symbols(&self) -> usize {
        (self.group_bits() / self.bits) as usize
    }

    /// Encoded length of `n` bytes.
    #[must_use]
    pub fn encoded_len(&self, n: usize) -> usize {
        if self.padded() {
            n.div_ceil(self.group_bytes()) * self.group_symbols()
        } else {
            (n * 8).div_ceil(self.bits as usize)
        }
    }

    /// Whether `data_symbols` symbols can end a group.
    fn valid_tail(&self, data_symbols: usize) -> bool {
        (1..=self.group_bytes()).any(|k| (8 * k).div_ceil(self.bits as usize) == data_symbols)
    }

    fn decode_table(&self) -> [u8; 256] {
        let mut table = [INVALID; 256];
        for (value, &symbol) in (0u8..).zip(self.symbols) {
            table[usize::from(symbol)] = value;
        }
        table
    }

    const fn mask(&self) -> u64 {
        (1 << self.bits) - 1
    }
}

/// Streaming encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    alphabet: Alphabet,
    reg: u64,
    nbits: u32,
    emitted: usize,
}

impl Encoder {
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            reg: 0,
            nbits: 0,
            emitted: 0,
        }
    }

    fn emit(&mut self, value: u64, out: &mut Vec<u8>) {
        let index = (value & self.alphabet.mask()) as usize;
        out.push(self.alphabet.symbols[index]);
        self.emitted = (self.emitted + 1) % self.alphabet.group_symbols();
    }

    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let bits = self.alphabet.bits;
        for &byte in input {
            self.reg = (self.reg << 8) | u64::from(byte);
            self.nbits += 8;
            while self.nbits >= bits {
                self.nbits -= bits;
                self.emit(self.reg >> self.nbits, out);
            }
            self.reg &= (1 << self.nbits) - 1;
        }
    }

    /// Flush a partial group and pad it. The encoder is ready for a new
    /// document afterwards.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.nbits > 0 {
            self.emit(self.reg << (self.alphabet.bits - self.nbits), out);
        }
        if self.alphabet.padded() {
            while self.emitted != 0 {
                out.push(self.alphabet.pad);
                self.emitted = (self.emitted + 1) % self.alphabet.group_symbols();
            }
        }
        self.reset();
    }

    /// No partial group is pending.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.nbits == 0
    }

    pub fn reset(&mut self) {
        self.reg = 0;
        self.nbits = 0;
        self.emitted = 0;
    }
}

/// Streaming decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    alphabet: Alphabet,
    table: [u8; 256],
    reg: u64,
    nbits: u32,
    in_group: usize,
    pads: usize,
    done: bool,
}

impl Decoder {
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            table: alphabet.decode_table(),
            reg: 0,
            nbits: 0,
            in_group: 0,
            pads: 0,
            done: false,
        }
    }

    /// Decode `input`. An invalid symbol, data after padding, or a padded
    /// group of the wrong length is `BadMessage`.
    pub fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for &symbol in input {
            if self.done {
                return Err(StreamError::BadMessage);
            }
            if self.alphabet.padded() && symbol == self.alphabet.pad {
                self.pads += 1;
            } else {
                let value = self.table[usize::from(symbol)];
                if value == INVALID || self.pads > 0 {
                    return Err(StreamError::BadMessage);
                }
                self.reg = (self.reg << self.alphabet.bits) | u64::from(value);
                self.nbits += self.alphabet.bits;
                if self.nbits >= 8 {
                    self.nbits -= 8;
                    out.push((self.reg >> self.nbits) as u8);
                    self.reg &= (1 << self.nbits) - 1;
                }
            }
            self.in_group += 1;
            if self.in_group == self.alphabet.group_symbols() {
                self.end_group()?;
            }
        }
        Ok(())
    }

    fn end_group(&mut self) -> Result<()> {
        if self.pads > 0 {
            if !self.alphabet.valid_tail(self.in_group - self.pads) {
                return Err(StreamError::BadMessage);
            }
            self.done = true;
        }
        self.reg = 0;
        self.nbits = 0;
        self.in_group = 0;
        self.pads = 0;
        Ok(())
    }

    /// Check the final group at end of input.
    pub fn finish(&mut self) -> Result<()> {
        let tail_ok = self.in_group == 0 || (self.pads == 0 && self.alphabet.valid_tail(self.in_group));
        self.reset();
        if tail_ok {
            Ok(())
        } else {
            Err(StreamError::BadMessage)
        }
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.in_group == 0
    }

    pub fn reset(&mut self) {
        self.reg = 0;
        self.nbits = 0;
        self.in_group = 0;
        self.pads = 0;
        self.done = false;
    }
}

#[must_use]
pub fn encode_to_vec(data: &[u8], alphabet: &Alphabet) -> Vec<u8> {
    let mut out = Vec::with_capacity(alphabet.encoded_len(data.len()));
    let mut enc = Encoder::new(*alphabet);
    enc.update(data, &mut out);
    enc.finish(&mut out);
    out
}

pub fn decode_to_vec(text: &[u8], alphabet: &Alphabet) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / alphabet.group_symbols() * alphabet.group_bytes() + 8);
    let mut dec = Decoder::new(*alphabet);
    dec.update(text, &mut out)?;
    dec.finish()?;
    Ok(out)
}

/// Which way a [`BaseNFilter`] transforms bytes passing through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reads yield, and writes emit, encoded symbols.
    Encode,
    /// Reads yield, and writes emit, decoded bytes.
    Decode,
}

#[derive(Debug)]
enum Codec {
    Encode(Encoder),
    Decode(Decoder),
}

impl Codec {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
        match self {
            Codec::Encode(e) => {
                e.update(input, out);
                Ok(())
            }
            Codec::Decode(d) => d.update(input, out),
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Codec::Encode(e) => {
                e.finish(out);
                Ok(())
            }
            Codec::Decode(d) => d.finish(),
        }
    }

    fn is_aligned(&self) -> bool {
        match self {
            Codec::Encode(e) => e.is_aligned(),
            Codec::Decode(d) => d.is_aligned(),
        }
    }

    fn reset(&mut self) {
        match self {
            Codec::Encode(e) => e.reset(),
            Codec::Decode(d) => d.reset(),
        }
    }
}

/// Filter backend: the codec applied to an inner stream.
///
/// Reads pull from the inner stream and transform; writes transform and
/// push to it. Closing finishes the last group (writing padding when
/// encoding). Seeks must land on a group boundary.
#[derive(Debug)]
pub struct BaseNFilter {
    inner: SharedStream,
    alphabet: Alphabet,
    direction: Direction,
    codec: Codec,
    ready: VecDeque<u8>,
    position: u64,
    inner_eof: bool,
    wrote: bool,
}

impl BaseNFilter {
    #[must_use]
    pub fn new(inner: SharedStream, alphabet: Alphabet, direction: Direction) -> Self {
        let codec = match direction {
            Direction::Encode => Codec::Encode(Encoder::new(alphabet)),
            Direction::Decode => Codec::Decode(Decoder::new(alphabet)),
        };
        Self {
            inner,
            alphabet,
            direction,
            codec,
            ready: VecDeque::new(),
            position: 0,
            inner_eof: false,
            wrote: false,
        }
    }

    /// (filter-side, inner-side) group lengths.
    fn units(&self) -> (u64, u64) {
        let bytes = self.alphabet.group_bytes() as u64;
        let symbols = self.alphabet.group_symbols() as u64;
        match self.direction {
            Direction::Encode => (symbols, bytes),
            Direction::Decode => (bytes, symbols),
        }
    }

    fn pull(&mut self) -> Result<()> {
        let mut chunk = [0u8; CHUNK];
        let n = self.inner.try_with(|s| {
            let n = s.read_bytes(&mut chunk);
            match s.error() {
                Some(err) if n == 0 => Err(err),
                _ => Ok(n),
            }
        })?;
        let mut produced = Vec::with_capacity(n * 2);
        if n == 0 {
            self.inner_eof = true;
            self.codec.finish(&mut produced)?;
        } else {
            self.codec.update(&chunk[..n], &mut produced)?;
        }
        self.ready.extend(produced);
        Ok(())
    }

    fn push(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.inner.try_with(|s| s.write_all(bytes))
    }

    fn filter_size(&self) -> Result<u64> {
        let inner = self.inner.try_with(Stream::size64)?;
        let (outer_unit, inner_unit) = self.units();
        Ok(match self.direction {
            Direction::Encode => {
                let n = usize::try_from(inner).map_err(|_| StreamError::Overflow)?;
                self.alphabet.encoded_len(n) as u64
            }
            Direction::Decode => inner / inner_unit * outer_unit,
        })
    }
}

impl CustomBackend for BaseNFilter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        while self.ready.is_empty() && !self.inner_eof {
            self.pull()?;
        }
        let n = buf.len().min(self.ready.len());
        for (slot, byte) in buf.iter_mut().zip(self.ready.drain(..n)) {
            *slot = byte;
        }
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut produced = Vec::with_capacity(buf.len() * 2);
        self.codec.update(buf, &mut produced)?;
        self.push(&produced)?;
        self.wrote = true;
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.try_with(Stream::flush)
    }

    fn close(&mut self) -> Result<()> {
        if !self.wrote {
            return Ok(());
        }
        let mut tail = Vec::new();
        self.codec.finish(&mut tail)?;
        self.push(&tail)?;
        self.wrote = false;
        self.inner.try_with(Stream::flush)
    }

    fn state_switch(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if self.wrote && !self.codec.is_aligned() {
            return Err(StreamError::InvalidArgument);
        }
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.position,
            Whence::End => self.filter_size()?,
        };
        let target = base
            .checked_add_signed(offset)
            .ok_or(StreamError::InvalidArgument)?;
        let (outer_unit, inner_unit) = self.units();
        if target % outer_unit != 0 {
            return Err(StreamError::InvalidArgument);
        }
        let inner_offset =
            i64::try_from(target / outer_unit * inner_unit).map_err(|_| StreamError::Overflow)?;
        self.inner
            .try_with(|s| s.seek64(inner_offset, Whence::Set))?;
        self.codec.reset();
        self.ready.clear();
        self.inner_eof = false;
        self.position = target;
        Ok(target)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.position)
    }

    /// Derived from the inner size; seeking would reset the codec.
    fn size(&mut self) -> Result<u64> {
        self.filter_size()
    }

    fn flags(&self) -> StreamFlags {
        StreamFlags::BINARY
    }

    fn what(&self) -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed(match self.direction {
            Direction::Encode => "basen-encode",
            Direction::Decode => "basen-decode",
        })
    }
}

/// Open a codec filter over `inner`.
pub fn open_basen(
    inner: impl Into<SharedStream>,
    alphabet: Alphabet,
    direction: Direction,
    mode: &str,
) -> Result<Stream> {
    let filter = BaseNFilter::new(inner.into(), alphabet, direction);
    let stream = Stream::open_custom(filter, mode)?;
    debug!(stream = stream.id(), ?direction, "base-n filter opened");
    Ok(stream)
}
