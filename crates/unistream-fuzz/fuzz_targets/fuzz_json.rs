#![no_main]
use libfuzzer_sys::fuzz_target;
use unistream_core::serial::{read_json, write_json};
use unistream_core::stream::Stream;

fuzz_target!(|data: &[u8]| {
    let Ok(mut input) = Stream::open_const_buffer(data.to_vec(), "rb") else {
        return;
    };
    let Ok(value) = read_json(&mut input) else {
        return;
    };

    // Whatever parses must serialize and parse back to the same value.
    let mut out = Stream::open_dynamic_buffer("w+b").unwrap();
    if write_json(&mut out, &value).is_err() {
        return;
    }
    out.rewind().unwrap();
    let again = read_json(&mut out).unwrap();
    assert_eq!(value, again);
});
