//! Format negotiation between a caller's requested format and the base's
//! own serializer.

use std::any::Any;
use std::borrow::Cow;

use tracing::trace;

use crate::errno::{Result, StreamError};
use crate::filter::basen::{Alphabet, encode_to_vec};
use crate::registry;
use crate::stream::Stream;

use super::base::{ContainerBase, Identity};

fn requested(format: &str) -> Cow<'static, str> {
    Cow::Owned(format.to_owned())
}

/// Write `data` in `format` (`None` for the base's native format). Returns
/// the bytes written.
///
/// The base's own serializer runs when it already produces the requested
/// format; otherwise the format registry supplies one.
pub fn serialize(
    stream: &mut Stream,
    data: &dyn Any,
    base: &ContainerBase,
    format: Option<&str>,
) -> Result<usize> {
    let start = stream.bytes_written();
    let (serialize, mut id) = match format {
        None => (base.serialize, Identity::requesting(base.native_format.clone())),
        Some(name) if name == base.native_format => (base.serialize, Identity::requesting(requested(name))),
        Some(name) => {
            let entry = registry::lookup_format(name).ok_or(StreamError::InvalidArgument)?;
            (entry.serialize, Identity::requesting(requested(name)))
        }
    };
    let serialize = serialize.ok_or(StreamError::NotSupported)?;
    serialize(stream, data, base, &mut id)?;
    trace!(base = %base.name, format = %id.format, "serialized");
    usize::try_from(stream.bytes_written() - start).map_err(|_| StreamError::Overflow)
}

/// Read `data` from `stream` in `format` (`None` for the base's native
/// format).
pub fn parse(
    stream: &mut Stream,
    data: &mut dyn Any,
    base: &ContainerBase,
    format: Option<&str>,
) -> Result<()> {
    let (parse, mut id) = match format {
        None => (base.parse, Identity::requesting(base.native_format.clone())),
        Some(name) if name == base.native_format => (base.parse, Identity::requesting(requested(name))),
        Some(name) => {
            let entry = registry::lookup_format(name).ok_or(StreamError::InvalidArgument)?;
            (entry.parse, Identity::requesting(requested(name)))
        }
    };
    let parse = parse.ok_or(StreamError::NotSupported)?;
    parse(stream, data, base, &mut id)
}

/// Run the base's own serializer into a staging buffer and return its
/// output along with what it reported.
pub fn stage(data: &dyn Any, base: &ContainerBase) -> Result<(Vec<u8>, Identity)> {
    let serialize = base.serialize.ok_or(StreamError::NotSupported)?;
    let mut staging = Stream::open_dynamic_buffer("w+b")?;
    let mut id = Identity::requesting(base.native_format.clone());
    serialize(&mut staging, data, base, &mut id)?;
    let staged = staging.take_underlying_buffer()?;
    staging.close()?;
    Ok((staged, id))
}

/// The `base64` format: the base's native output, base64-encoded.
pub fn serialize_base64(
    stream: &mut Stream,
    data: &dyn Any,
    base: &ContainerBase,
    id: &mut Identity,
) -> Result<()> {
    let (staged, _) = stage(data, base)?;
    let encoded = encode_to_vec(&staged, &Alphabet::BASE64);
    stream.write_all(&encoded)?;
    id.format = Cow::Borrowed("base64");
    id.utf8 = true;
    id.written = encoded.len();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::base::scalar_base;
    use crate::serial::value::{Value, value_base};

    fn written(data: &dyn Any, base: &ContainerBase, format: Option<&str>) -> String {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        let n = serialize(&mut s, data, base, format).unwrap();
        let out = String::from_utf8(s.take_underlying_buffer().unwrap()).unwrap();
        assert_eq!(n, out.len());
        out
    }

    #[test]
    fn native_format_uses_base_serializer() {
        let text = "a\"b".to_string();
        assert_eq!(written(&text, &scalar_base::<String>(), None), "a\"b");
        assert_eq!(written(&text, &scalar_base::<String>(), Some("utf8")), "a\"b");
    }

    #[test]
    fn other_formats_come_from_registry() {
        let text = "a\"b".to_string();
        assert_eq!(written(&text, &scalar_base::<String>(), Some("json")), r#""a\"b""#);
        assert_eq!(written(&"Hi".to_string(), &scalar_base::<String>(), Some("base64")), "SGk=");
    }

    #[test]
    fn unknown_format_is_invalid() {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        assert_eq!(
            serialize(&mut s, &1_i64, &scalar_base::<i64>(), Some("yaml")),
            Err(StreamError::InvalidArgument)
        );
    }

    #[test]
    fn parse_defaults_to_native() {
        let mut s = Stream::open_const_buffer(&br#"{"k": [1, "x"]}"#[..], "rb").unwrap();
        let mut v = Value::Null;
        parse(&mut s, &mut v, &value_base(), None).unwrap();
        assert_eq!(
            v,
            Value::Map([("k".to_string(), Value::List(vec![Value::Int(1), Value::from("x")]))].into())
        );
    }
}
