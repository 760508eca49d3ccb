#![no_main]
use std::cell::Cell;

use libfuzzer_sys::fuzz_target;
use unistream_core::format::{Arg, format_bytes};
use unistream_core::serial::Value;

fuzz_target!(|data: &[u8]| {
    // Huge widths only measure the allocator.
    if data.len() > 256 || data.windows(6).any(|w| w.iter().all(u8::is_ascii_digit)) {
        return;
    }
    let count = Cell::new(0);
    let value = Value::from("fuzz");
    let args = [
        Arg::Int(-7),
        Arg::Uint(42),
        Arg::Float(1.5),
        Arg::Str(b"text"),
        Arg::Count(&count),
        Arg::Value(&value),
        Arg::Char(b'c'),
        Arg::Ptr(0x1000),
    ];
    // Should never panic; mismatched arguments are errors.
    let _ = format_bytes(data, &args);
});
