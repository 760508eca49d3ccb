//! JSON serializer and incremental parser.
//!
//! The serializer walks a container base directly. The parser reads one
//! document byte by byte off the stream (leaving whatever follows it
//! unread), builds a [`Value`], then assigns it into the target through the
//! base's collection callbacks.

use std::any::Any;
use std::borrow::Cow;
use std::io::Write as _;

use crate::errno::{Result, StreamError};
use crate::smallbuf::SmallBuf;
use crate::stream::Stream;

use super::base::{BaseKind, ContainerBase, Identity, Scalar, downcast};
use super::value::{Value, assign};

/// Nesting limit for the parser.
pub const MAX_DEPTH: usize = 128;

/// Format name of the variant that escapes everything outside ASCII.
pub const JSON_ASCII: &str = "json:ascii";

struct JsonWriter<'s> {
    stream: &'s mut Stream,
    ascii: bool,
}

impl JsonWriter<'_> {
    fn number(&mut self, n: impl std::fmt::Display) -> Result<()> {
        write!(self.stream, "{n}").map_err(StreamError::from)
    }

    fn float(&mut self, f: f64) -> Result<()> {
        if !f.is_finite() {
            return Err(StreamError::InvalidArgument);
        }
        write!(self.stream, "{f:?}").map_err(StreamError::from)
    }

    fn escape(&mut self, unit: u32) -> Result<()> {
        write!(self.stream, "\\u{unit:04x}").map_err(StreamError::from)
    }

    fn char(&mut self, c: char) -> Result<()> {
        match c {
            '"' => self.stream.puts("\\\""),
            '\\' => self.stream.puts("\\\\"),
            '\n' => self.stream.puts("\\n"),
            '\r' => self.stream.puts("\\r"),
            '\t' => self.stream.puts("\\t"),
            '\u{8}' => self.stream.puts("\\b"),
            '\u{c}' => self.stream.puts("\\f"),
            c if (c as u32) < 0x20 => self.escape(c as u32),
            c if c.is_ascii() => self.stream.putc(c as u8),
            c if self.ascii => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    self.escape(u32::from(*unit))?;
                }
                Ok(())
            }
            c => {
                let mut utf8 = [0u8; 4];
                self.stream.puts(c.encode_utf8(&mut utf8).as_bytes())
            }
        }
    }

    fn text(&mut self, s: &str) -> Result<()> {
        self.stream.putc(b'"')?;
        for c in s.chars() {
            self.char(c)?;
        }
        self.stream.putc(b'"')
    }

    /// Bytes go out as the code points U+0000..=U+00FF.
    fn binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.putc(b'"')?;
        for &b in bytes {
            self.char(char::from(b))?;
        }
        self.stream.putc(b'"')
    }

    fn scalar(&mut self, scalar: Scalar<'_>) -> Result<()> {
        match scalar {
            Scalar::Null => self.stream.puts("null"),
            Scalar::Bool(b) => self.stream.puts(if b { "true" } else { "false" }),
            Scalar::Int(n) => self.number(n),
            Scalar::Uint(n) => self.number(n),
            Scalar::Float(f) => self.float(f),
            Scalar::Text(s) => self.text(s),
            Scalar::Bytes(b) => self.binary(b),
        }
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::List(items) => {
                self.stream.putc(b'[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.stream.putc(b',')?;
                    }
                    self.value(item)?;
                }
                self.stream.putc(b']')
            }
            Value::Map(entries) => {
                self.stream.putc(b'{')?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.stream.putc(b',')?;
                    }
                    self.text(k)?;
                    self.stream.putc(b':')?;
                    self.value(v)?;
                }
                self.stream.putc(b'}')
            }
            other => match other.as_scalar() {
                Some(s) => self.scalar(s),
                None => Err(StreamError::InvalidArgument),
            },
        }
    }

    fn any(&mut self, data: &dyn Any, base: &ContainerBase) -> Result<()> {
        match base.kind {
            BaseKind::List => {
                let child = base.value_child()?;
                let items =
                    (base.collection()?.iter)(data).ok_or(StreamError::InvalidArgument)?;
                self.stream.putc(b'[')?;
                for (i, (_, item)) in items.enumerate() {
                    if i > 0 {
                        self.stream.putc(b',')?;
                    }
                    self.any(item, child)?;
                }
                self.stream.putc(b']')
            }
            BaseKind::Map => {
                let key_base = base.key_child()?;
                let child = base.value_child()?;
                let entries =
                    (base.collection()?.iter)(data).ok_or(StreamError::InvalidArgument)?;
                self.stream.putc(b'{')?;
                for (i, (key, item)) in entries.enumerate() {
                    if i > 0 {
                        self.stream.putc(b',')?;
                    }
                    let key = key.ok_or(StreamError::InvalidArgument)?;
                    let Scalar::Text(key) = key_base.scalar_of(key)? else {
                        return Err(StreamError::InvalidArgument);
                    };
                    self.text(key)?;
                    self.stream.putc(b':')?;
                    self.any(item, child)?;
                }
                self.stream.putc(b'}')
            }
            BaseKind::Dynamic => self.value(downcast::<Value>(data)?),
            BaseKind::Opaque => self.opaque(data, base),
            _ => self.scalar(base.scalar_of(data)?),
        }
    }

    /// A value only its own serializer understands: stage that output and
    /// embed it, raw if it already is JSON, as a string otherwise.
    fn opaque(&mut self, data: &dyn Any, base: &ContainerBase) -> Result<()> {
        let (staged, id) = super::dispatch::stage(data, base)?;
        if id.format.starts_with("json") {
            return self.stream.puts(&staged);
        }
        match std::str::from_utf8(&staged) {
            Ok(s) => self.text(s),
            Err(_) => self.binary(&staged),
        }
    }
}

/// Write `data` as JSON. `id.format == "json:ascii"` escapes every
/// non-ASCII character.
pub fn serialize_json(
    stream: &mut Stream,
    data: &dyn Any,
    base: &ContainerBase,
    id: &mut Identity,
) -> Result<()> {
    let ascii = id.format == JSON_ASCII;
    let start = stream.bytes_written();
    JsonWriter { stream, ascii }.any(data, base)?;
    id.format = Cow::Borrowed(if ascii { JSON_ASCII } else { "json" });
    id.utf8 = true;
    id.written = usize::try_from(stream.bytes_written() - start).map_err(|_| StreamError::Overflow)?;
    Ok(())
}

/// Write a [`Value`] as JSON.
pub fn write_json(stream: &mut Stream, value: &Value) -> Result<()> {
    JsonWriter {
        stream,
        ascii: false,
    }
    .value(value)
}

struct JsonReader<'s> {
    stream: &'s mut Stream,
    depth: usize,
}

impl JsonReader<'_> {
    fn next(&mut self) -> Result<Option<u8>> {
        match self.stream.getc() {
            Some(b) => Ok(Some(b)),
            None => match self.stream.error() {
                Some(err) => Err(err),
                None => Ok(None),
            },
        }
    }

    fn require(&mut self) -> Result<u8> {
        self.next()?.ok_or(StreamError::BadMessage)
    }

    fn skip_ws(&mut self) -> Result<Option<u8>> {
        loop {
            match self.next()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => {}
                other => return Ok(other),
            }
        }
    }

    fn literal(&mut self, rest: &[u8], value: Value) -> Result<Value> {
        for &expected in rest {
            if self.require()? != expected {
                return Err(StreamError::BadMessage);
            }
        }
        Ok(value)
    }

    /// Parse a value whose first byte was already consumed.
    fn value(&mut self, first: u8) -> Result<Value> {
        match first {
            b'n' => self.literal(b"ull", Value::Null),
            b't' => self.literal(b"rue", Value::Bool(true)),
            b'f' => self.literal(b"alse", Value::Bool(false)),
            b'"' => self.string().map(Value::Text),
            b'[' => self.nested(Self::list),
            b'{' => self.nested(Self::map),
            b'-' | b'0'..=b'9' => self.number(first),
            _ => Err(StreamError::BadMessage),
        }
    }

    fn nested(&mut self, f: fn(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(StreamError::BadMessage);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn list(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        let mut b = self.skip_ws()?.ok_or(StreamError::BadMessage)?;
        if b == b']' {
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.value(b)?);
            match self.skip_ws()? {
                Some(b',') => b = self.skip_ws()?.ok_or(StreamError::BadMessage)?,
                Some(b']') => return Ok(Value::List(items)),
                _ => return Err(StreamError::BadMessage),
            }
        }
    }

    fn map(&mut self) -> Result<Value> {
        let mut entries = std::collections::BTreeMap::new();
        let mut b = self.skip_ws()?.ok_or(StreamError::BadMessage)?;
        if b == b'}' {
            return Ok(Value::Map(entries));
        }
        loop {
            if b != b'"' {
                return Err(StreamError::BadMessage);
            }
            let key = self.string()?;
            if self.skip_ws()? != Some(b':') {
                return Err(StreamError::BadMessage);
            }
            let first = self.skip_ws()?.ok_or(StreamError::BadMessage)?;
            entries.insert(key, self.value(first)?);
            match self.skip_ws()? {
                Some(b',') => b = self.skip_ws()?.ok_or(StreamError::BadMessage)?,
                Some(b'}') => return Ok(Value::Map(entries)),
                _ => return Err(StreamError::BadMessage),
            }
        }
    }

    fn hex4(&mut self) -> Result<u32> {
        let mut unit = 0;
        for _ in 0..4 {
            let digit = char::from(self.require()?)
                .to_digit(16)
                .ok_or(StreamError::BadMessage)?;
            unit = unit << 4 | digit;
        }
        Ok(unit)
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let unit = self.hex4()?;
        let code = match unit {
            0xd800..=0xdbff => {
                if self.require()? != b'\\' || self.require()? != b'u' {
                    return Err(StreamError::BadMessage);
                }
                let low = self.hex4()?;
                if !(0xdc00..=0xdfff).contains(&low) {
                    return Err(StreamError::BadMessage);
                }
                0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00)
            }
            0xdc00..=0xdfff => return Err(StreamError::BadMessage),
            _ => unit,
        };
        char::from_u32(code).ok_or(StreamError::BadMessage)
    }

    /// The opening quote was consumed.
    fn string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.require()? {
                b'"' => break,
                b'\\' => {
                    let c = match self.require()? {
                        b'"' => '"',
                        b'\\' => '\\',
                        b'/' => '/',
                        b'b' => '\u{8}',
                        b'f' => '\u{c}',
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'u' => self.unicode_escape()?,
                        _ => return Err(StreamError::BadMessage),
                    };
                    let mut utf8 = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                }
                b if b < 0x20 => return Err(StreamError::BadMessage),
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| StreamError::BadMessage)
    }

    fn number(&mut self, first: u8) -> Result<Value> {
        let mut digits = SmallBuf::new();
        digits.push(first)?;
        let mut integral = true;
        while let Some(b) = self.next()? {
            match b {
                b'0'..=b'9' | b'-' | b'+' => digits.push(b)?,
                b'.' | b'e' | b'E' => {
                    integral = false;
                    digits.push(b)?;
                }
                _ => {
                    self.stream.ungetc(b);
                    break;
                }
            }
        }
        let text = digits.as_str().ok_or(StreamError::BadMessage)?;
        if !valid_number(text.as_bytes()) {
            return Err(StreamError::BadMessage);
        }
        if integral {
            let parsed = if first == b'-' {
                text.parse().map(Value::Int).ok()
            } else {
                text.parse().map(Value::Uint).ok()
            };
            if let Some(v) = parsed {
                return Ok(v);
            }
        }
        text.parse()
            .map(Value::Float)
            .map_err(|_| StreamError::BadMessage)
    }
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`
fn valid_number(mut s: &[u8]) -> bool {
    fn digits(s: &[u8]) -> usize {
        s.iter().take_while(|b| b.is_ascii_digit()).count()
    }
    if let [b'-', rest @ ..] = s {
        s = rest;
    }
    let int = digits(s);
    if int == 0 || (int > 1 && s[0] == b'0') {
        return false;
    }
    s = &s[int..];
    if let [b'.', rest @ ..] = s {
        let frac = digits(rest);
        if frac == 0 {
            return false;
        }
        s = &rest[frac..];
    }
    if let [b'e' | b'E', rest @ ..] = s {
        let rest = match rest {
            [b'+' | b'-', tail @ ..] => tail,
            _ => rest,
        };
        let exp = digits(rest);
        if exp == 0 {
            return false;
        }
        s = &rest[exp..];
    }
    s.is_empty()
}

/// Read one JSON document into a [`Value`]. Fails with `Eof` when the
/// stream holds nothing but whitespace.
pub fn read_json(stream: &mut Stream) -> Result<Value> {
    let mut reader = JsonReader { stream, depth: 0 };
    let first = reader.skip_ws()?.ok_or(StreamError::Eof)?;
    reader.value(first)
}

/// Strings meant for a binary slot carry one byte per code point.
fn bytes_from_text(value: Value, base: &ContainerBase) -> Result<Value> {
    Ok(match (base.kind, value) {
        (BaseKind::Binary, Value::Text(s)) => Value::Binary(
            s.chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| StreamError::BadMessage))
                .collect::<Result<_>>()?,
        ),
        (BaseKind::List, Value::List(items)) => {
            let child = base.value_child()?;
            Value::List(
                items
                    .into_iter()
                    .map(|v| bytes_from_text(v, child))
                    .collect::<Result<_>>()?,
            )
        }
        (BaseKind::Map, Value::Map(entries)) => {
            let child = base.value_child()?;
            Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok::<_, StreamError>((k, bytes_from_text(v, child)?)))
                    .collect::<Result<_>>()?,
            )
        }
        (_, value) => value,
    })
}

/// Parse one JSON document into `data`.
pub fn parse_json(
    stream: &mut Stream,
    data: &mut dyn Any,
    base: &ContainerBase,
    id: &mut Identity,
) -> Result<()> {
    let value = read_json(stream)?;
    assign(data, base, bytes_from_text(value, base)?)?;
    id.format = Cow::Borrowed("json");
    id.utf8 = true;
    Ok(())
}
