//! End-to-end scenarios across the engine, format, registry and filters.

use std::any::Any;

use unistream_core::filter::{Alphabet, Direction, decode_to_vec, encode_to_vec, open_basen, open_concat};
use unistream_core::registry;
use unistream_core::serial::{ContainerBase, Identity};
use unistream_core::{Arg, Result, Stream, StreamError, Whence};

#[test]
fn dynamic_buffer_write_then_read_back() {
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(s.write_bytes(&[0x48, 0x65, 0x6c, 0x6c, 0x6f]), 5);
    s.rewind().unwrap();

    let mut four = [0u8; 4];
    assert_eq!(s.read_bytes(&mut four), 4);
    assert_eq!(four, [0x48, 0x65, 0x6c, 0x6c]);
    assert_eq!(s.tell().unwrap(), 4);

    let mut one = [0u8; 1];
    assert_eq!(s.read_bytes(&mut one), 1);
    assert_eq!(one, [0x6f]);
    assert_eq!(s.read_bytes(&mut one), 0);
    assert!(s.eof());
}

#[test]
fn concatenation_seek() {
    let a = Stream::open_const_buffer(&b"abc"[..], "rb").unwrap();
    let b = Stream::open_const_buffer(&b"defg"[..], "rb").unwrap();
    let mut s = open_concat(a, b, "rb").unwrap();

    s.seek(4, Whence::Set).unwrap();
    let mut out = [0u8; 3];
    assert_eq!(s.read_bytes(&mut out), 3);
    assert_eq!(&out, b"efg");
    assert_eq!(s.tell().unwrap(), 7);

    s.seek(2, Whence::Set).unwrap();
    assert_eq!(s.read_bytes(&mut out), 3);
    assert_eq!(&out, b"cde");
}

#[test]
fn text_mode_translation() {
    let mut s = Stream::open_const_buffer(&b"x\r\ny\ny\r"[..], "r").unwrap();
    let got: Vec<Option<u8>> = (0..7).map(|_| s.getc()).collect();
    assert_eq!(
        got,
        [Some(b'x'), Some(b'\n'), Some(b'y'), Some(b'\n'), Some(b'y'), Some(b'\n'), None]
    );
    assert!(s.eof());
}

#[test]
fn printf_field_width_and_sign() {
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(s.printf("%+6d", &[42.into()]).unwrap(), 6);
    assert_eq!(s.underlying_buffer().unwrap(), b"   +42");

    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(s.printf("%-6d|", &[42.into()]).unwrap(), 7);
    assert_eq!(s.underlying_buffer().unwrap(), b"42    |");
}

fn write_decimal(stream: &mut Stream, data: &dyn Any, _: &ContainerBase, id: &mut Identity) -> Result<()> {
    let n = data.downcast_ref::<i64>().ok_or(StreamError::InvalidArgument)?;
    id.written = stream.printf("%d", &[(*n).into()])?;
    id.utf8 = true;
    Ok(())
}

#[test]
fn typed_value_directive() {
    registry::register_type("int", ContainerBase::opaque::<i64>("int", write_decimal)).unwrap();

    let n = 123_i64;
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(s.printf("%{int}", &[Arg::Value(&n)]).unwrap(), 3);
    assert_eq!(s.underlying_buffer().unwrap(), b"123");

    // Staged through a buffer when padded.
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(s.printf("[%-5{int}]", &[Arg::Value(&n)]).unwrap(), 7);
    assert_eq!(s.underlying_buffer().unwrap(), b"[123  ]");

    registry::remove_type("int");
}

#[test]
fn base64_of_hi() {
    assert_eq!(encode_to_vec(b"Hi", &Alphabet::BASE64), b"SGk=");
    assert_eq!(decode_to_vec(b"SGk=", &Alphabet::BASE64).unwrap(), b"Hi");

    let inner = Stream::open_const_buffer(&b"Hi"[..], "rb").unwrap();
    let mut enc = open_basen(inner, Alphabet::BASE64, Direction::Encode, "rb").unwrap();
    let mut out = [0u8; 8];
    let n = enc.read_bytes(&mut out);
    assert_eq!(&out[..n], b"SGk=");

    let inner = Stream::open_const_buffer(&b"SGk="[..], "rb").unwrap();
    let mut dec = open_basen(inner, Alphabet::BASE64, Direction::Decode, "rb").unwrap();
    let n = dec.read_bytes(&mut out);
    assert_eq!(&out[..n], b"Hi");
}

#[test]
fn unget_supports_fifteen_pushes() {
    let mut s = Stream::open_const_buffer(&b"z"[..], "rb").unwrap();
    for b in 0..15_u8 {
        assert_eq!(s.ungetc(b'a' + b), Some(b'a' + b));
    }
    assert_eq!(s.ungetc(b'!'), None);
    for b in (0..15_u8).rev() {
        assert_eq!(s.getc(), Some(b'a' + b));
    }
    assert_eq!(s.getc(), Some(b'z'));
}

#[test]
fn getpos_setpos_round_trip() {
    let mut s = Stream::open_const_buffer(&b"0123456789"[..], "rb").unwrap();
    s.seek(3, Whence::Set).unwrap();
    let pos = s.getpos().unwrap();
    let bytes = pos.to_bytes();
    assert_eq!(s.getc(), Some(b'3'));
    s.setpos(&unistream_core::StreamPos::from_bytes(&bytes).unwrap()).unwrap();
    assert_eq!(s.getc(), Some(b'3'));
}

#[test]
fn printf_scanf_integer_round_trip() {
    for i in [-1_000_000_i64, -1, 0, 7, 65_535, i64::MAX] {
        let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
        s.printf("%d", &[i.into()]).unwrap();
        s.rewind().unwrap();
        let mut back = 0_i64;
        assert_eq!(s.scanf("%d", &mut [(&mut back).into()]).unwrap(), 1);
        assert_eq!(back, i);
    }
}

#[test]
fn printf_rejects_widths_past_int_range() {
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    assert_eq!(
        s.printf("%*d", &[Arg::Int(i64::MAX), Arg::Int(1)]),
        Err(StreamError::InvalidArgument)
    );
    assert_eq!(
        s.printf("%.*s", &[Arg::Int(1 << 40), "abc".into()]),
        Err(StreamError::InvalidArgument)
    );
    assert_eq!(
        unistream_core::format_string("%99999999999999999999999d", &[Arg::Int(1)]),
        Err(StreamError::InvalidArgument)
    );
    assert_eq!(s.printf("[%*d]", &[Arg::Int(-3), Arg::Int(1)]).unwrap(), 5);
    assert_eq!(s.underlying_buffer(), Some(&b"[1  ]"[..]));
}

#[test]
fn scanf_integer_overflow_saturates() {
    let mut s = Stream::open_dynamic_buffer("w+b").unwrap();
    s.puts("9223372036854775808 -9223372036854775809 18446744073709551616").unwrap();
    s.rewind().unwrap();
    let (mut hi, mut lo, mut u) = (0_i64, 0_i64, 0_u64);
    let n = s
        .scanf("%d %d %u", &mut [(&mut hi).into(), (&mut lo).into(), (&mut u).into()])
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!((hi, lo, u), (i64::MAX, i64::MIN, u64::MAX));
}
