//! Base-N codecs checked against the `base64` crate.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};
use unistream_core::filter::{Alphabet, Direction, decode_to_vec, encode_to_vec, open_basen};
use unistream_core::{SharedStream, Stream, StreamError, Whence};

fn samples() -> Vec<Vec<u8>> {
    let mut out = vec![Vec::new(), b"f".to_vec(), b"fo".to_vec(), b"foo".to_vec(), b"foob".to_vec()];
    out.push((0..=255).collect());
    out.push((0..1000_u32).map(|i| (i * 31 % 256) as u8).collect());
    out
}

#[test]
fn base64_matches_reference_encoder() {
    for data in samples() {
        let ours = encode_to_vec(&data, &Alphabet::BASE64);
        assert_eq!(ours, STANDARD.encode(&data).into_bytes());
        assert_eq!(ours.len(), 4 * data.len().div_ceil(3));
        assert_eq!(decode_to_vec(&ours, &Alphabet::BASE64).unwrap(), data);

        assert_eq!(encode_to_vec(&data, &Alphabet::BASE64_URL), URL_SAFE.encode(&data).into_bytes());
        let unpadded = Alphabet::BASE64.without_padding();
        assert_eq!(encode_to_vec(&data, &unpadded), STANDARD_NO_PAD.encode(&data).into_bytes());
    }
}

#[test]
fn reference_output_decodes() {
    for data in samples() {
        let text = STANDARD.encode(&data);
        assert_eq!(decode_to_vec(text.as_bytes(), &Alphabet::BASE64).unwrap(), data);
    }
}

#[test]
fn malformed_input_is_a_bad_message() {
    for bad in [&b"S"[..], b"S===", b"SG!=", b"SGk=SGk="] {
        assert_eq!(decode_to_vec(bad, &Alphabet::BASE64), Err(StreamError::BadMessage), "{bad:?}");
    }
}

#[test]
fn other_alphabets_round_trip() {
    assert_eq!(encode_to_vec(b"foobar", &Alphabet::BASE32), b"MZXW6YTBOI======");
    assert_eq!(encode_to_vec(b"foobar", &Alphabet::BASE32_HEX), b"CPNMUOJ1E8======");
    assert_eq!(encode_to_vec(b"\x01\xab", &Alphabet::BASE16), b"01AB");
    for alphabet in [Alphabet::BASE32, Alphabet::BASE32_HEX, Alphabet::BASE16] {
        for data in samples() {
            let text = encode_to_vec(&data, &alphabet);
            assert_eq!(decode_to_vec(&text, &alphabet).unwrap(), data);
        }
    }
}

#[test]
fn encoding_filter_writes_through_to_inner() {
    let sink = SharedStream::new(Stream::open_dynamic_buffer("w+b").unwrap());
    let mut enc = open_basen(sink.clone(), Alphabet::BASE64, Direction::Encode, "wb").unwrap();
    enc.write_all(b"hello ").unwrap();
    enc.write_all(b"world").unwrap();
    enc.close().unwrap();
    let written = sink.with(|s| s.underlying_buffer().unwrap().to_vec()).unwrap();
    assert_eq!(written, STANDARD.encode(b"hello world").into_bytes());
}

#[test]
fn decoding_filter_seeks_by_whole_groups() {
    let text = STANDARD.encode(b"abcdefghi");
    let inner = Stream::open_const_buffer(text.into_bytes(), "rb").unwrap();
    let mut dec = open_basen(inner, Alphabet::BASE64, Direction::Decode, "rb").unwrap();
    dec.seek(3, Whence::Set).unwrap();
    let mut out = [0u8; 3];
    assert_eq!(dec.read_bytes(&mut out), 3);
    assert_eq!(&out, b"def");
    assert_eq!(dec.tell().unwrap(), 6);
    assert_eq!(dec.seek(4, Whence::Set), Err(StreamError::InvalidArgument));
}
