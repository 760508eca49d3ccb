//! Generic UTF-8 text serializer: the native format of the builtin bases.
//!
//! Lists render as `[a, b]`, maps as `{k: v}`, text and bytes verbatim.
//! The parser only handles scalars, one whitespace-delimited token each.

use std::any::Any;
use std::borrow::Cow;
use std::io::Write as _;

use crate::errno::{Result, StreamError};
use crate::smallbuf::SmallBuf;
use crate::stream::Stream;

use super::base::{BaseKind, ContainerBase, Identity, Scalar};
use super::value::Value;

fn put_display(stream: &mut Stream, value: impl std::fmt::Display) -> Result<()> {
    write!(stream, "{value}").map_err(StreamError::from)
}

fn write_scalar(stream: &mut Stream, scalar: Scalar<'_>) -> Result<()> {
    match scalar {
        Scalar::Null => stream.puts("null"),
        Scalar::Bool(b) => stream.puts(if b { "true" } else { "false" }),
        Scalar::Int(n) => put_display(stream, n),
        Scalar::Uint(n) => put_display(stream, n),
        Scalar::Float(f) => put_display(stream, f),
        Scalar::Text(s) => stream.puts(s),
        Scalar::Bytes(b) => stream.puts(b),
    }
}

fn write_value(stream: &mut Stream, value: &Value) -> Result<()> {
    match value {
        Value::List(items) => {
            stream.putc(b'[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    stream.puts(", ")?;
                }
                write_value(stream, item)?;
            }
            stream.putc(b']')
        }
        Value::Map(entries) => {
            stream.putc(b'{')?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    stream.puts(", ")?;
                }
                stream.puts(k)?;
                stream.puts(": ")?;
                write_value(stream, v)?;
            }
            stream.putc(b'}')
        }
        scalar => match scalar.as_scalar() {
            Some(s) => write_scalar(stream, s),
            None => Err(StreamError::InvalidArgument),
        },
    }
}

fn write_any(stream: &mut Stream, data: &dyn Any, base: &ContainerBase) -> Result<()> {
    match base.kind {
        BaseKind::List => {
            let child = base.value_child()?;
            let items = (base.collection()?.iter)(data).ok_or(StreamError::InvalidArgument)?;
            stream.putc(b'[')?;
            for (i, (_, item)) in items.enumerate() {
                if i > 0 {
                    stream.puts(", ")?;
                }
                write_any(stream, item, child)?;
            }
            stream.putc(b']')
        }
        BaseKind::Map => {
            let key_base = base.key_child()?;
            let child = base.value_child()?;
            let entries = (base.collection()?.iter)(data).ok_or(StreamError::InvalidArgument)?;
            stream.putc(b'{')?;
            for (i, (key, item)) in entries.enumerate() {
                if i > 0 {
                    stream.puts(", ")?;
                }
                write_any(stream, key.ok_or(StreamError::InvalidArgument)?, key_base)?;
                stream.puts(": ")?;
                write_any(stream, item, child)?;
            }
            stream.putc(b'}')
        }
        BaseKind::Dynamic => write_value(stream, super::base::downcast::<Value>(data)?),
        BaseKind::Opaque => {
            let serialize = base.serialize.ok_or(StreamError::NotSupported)?;
            serialize(stream, data, base, &mut Identity::requesting("utf8"))
        }
        _ => write_scalar(stream, base.scalar_of(data)?),
    }
}

/// Write `data` as UTF-8 text.
pub fn serialize_utf8(
    stream: &mut Stream,
    data: &dyn Any,
    base: &ContainerBase,
    id: &mut Identity,
) -> Result<()> {
    let start = stream.bytes_written();
    write_any(stream, data, base)?;
    id.format = Cow::Borrowed("utf8");
    id.utf8 = true;
    id.written = usize::try_from(stream.bytes_written() - start).map_err(|_| StreamError::Overflow)?;
    Ok(())
}

/// Skip leading whitespace and collect one token.
fn read_token(stream: &mut Stream) -> Result<SmallBuf> {
    let mut token = SmallBuf::new();
    loop {
        match stream.getc() {
            Some(b) if b.is_ascii_whitespace() && token.is_empty() => {}
            Some(b) if b.is_ascii_whitespace() => {
                stream.ungetc(b);
                break;
            }
            Some(b) => token.push(b)?,
            None => {
                if let Some(err) = stream.error() {
                    return Err(err);
                }
                break;
            }
        }
    }
    if token.is_empty() {
        return Err(StreamError::Eof);
    }
    Ok(token)
}

fn parse_number<T: std::str::FromStr>(token: &SmallBuf) -> Result<T> {
    token
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or(StreamError::BadMessage)
}

/// Read a scalar written by [`serialize_utf8`] back into `data`.
pub fn parse_utf8(
    stream: &mut Stream,
    data: &mut dyn Any,
    base: &ContainerBase,
    id: &mut Identity,
) -> Result<()> {
    let store = base.store.ok_or(StreamError::NotSupported)?;
    let token = read_token(stream)?;
    let bytes = token.as_bytes();
    match base.kind {
        BaseKind::Null if bytes == b"null" => store(data, Scalar::Null)?,
        BaseKind::Bool if bytes == b"true" => store(data, Scalar::Bool(true))?,
        BaseKind::Bool if bytes == b"false" => store(data, Scalar::Bool(false))?,
        BaseKind::Signed => store(data, Scalar::Int(parse_number(&token)?))?,
        BaseKind::Unsigned => store(data, Scalar::Uint(parse_number(&token)?))?,
        BaseKind::Float => store(data, Scalar::Float(parse_number(&token)?))?,
        BaseKind::Text => {
            let text = token.as_str().ok_or(StreamError::BadMessage)?;
            store(data, Scalar::Text(text))?;
        }
        BaseKind::Binary => store(data, Scalar::Bytes(bytes))?,
        BaseKind::Null | BaseKind::Bool => return Err(StreamError::BadMessage),
        _ => return Err(StreamError::NotSupported),
    }
    id.format = Cow::Borrowed("utf8");
    id.utf8 = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::serial::base::{list_base, map_base, scalar_base};

    fn render(data: &dyn Any, base: &ContainerBase) -> String {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        let mut id = Identity::default();
        serialize_utf8(&mut s, data, base, &mut id).unwrap();
        assert_eq!(id.format, "utf8");
        let out = s.take_underlying_buffer().unwrap();
        assert_eq!(id.written, out.len());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scalars_render_plainly() {
        assert_eq!(render(&-12_i64, &scalar_base::<i64>()), "-12");
        assert_eq!(render(&true, &scalar_base::<bool>()), "true");
        assert_eq!(render(&2.5_f64, &scalar_base::<f64>()), "2.5");
        assert_eq!(render(&"hi".to_string(), &scalar_base::<String>()), "hi");
    }

    #[test]
    fn collections_render_recursively() {
        let list = list_base::<i64>(Arc::new(scalar_base::<i64>()));
        assert_eq!(render(&vec![1_i64, 2, 3], &list), "[1, 2, 3]");

        let map = map_base::<String, Vec<i64>>(Arc::new(scalar_base::<String>()), Arc::new(list));
        let data = BTreeMap::from([("a".to_string(), vec![1_i64]), ("b".to_string(), vec![])]);
        assert_eq!(render(&data, &map), "{a: [1], b: []}");
    }

    #[test]
    fn parse_reads_one_token() {
        let mut s = Stream::open_const_buffer(&b"  42 rest"[..], "rb").unwrap();
        let base = scalar_base::<u64>();
        let mut n = 0_u64;
        parse_utf8(&mut s, &mut n, &base, &mut Identity::default()).unwrap();
        assert_eq!(n, 42);
        assert_eq!(s.getc(), Some(b' '));
    }

    #[test]
    fn parse_rejects_garbage() {
        let mut s = Stream::open_const_buffer(&b"maybe"[..], "rb").unwrap();
        let mut b = false;
        assert_eq!(
            parse_utf8(&mut s, &mut b, &scalar_base::<bool>(), &mut Identity::default()),
            Err(StreamError::BadMessage)
        );
        let mut empty = Stream::open_const_buffer(&b"   "[..], "rb").unwrap();
        let mut n = 0_i64;
        assert_eq!(
            parse_utf8(&mut empty, &mut n, &scalar_base::<i64>(), &mut Identity::default()),
            Err(StreamError::Eof)
        );
    }
}
