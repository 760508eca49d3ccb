#![no_main]
use libfuzzer_sys::fuzz_target;
use unistream_core::format::{ScanArg, sscanf};

fuzz_target!(|data: &[u8]| {
    // First line is the format, the rest is the input.
    let Some(split) = data.iter().position(|&b| b == b'\n') else {
        return;
    };
    let (fmt, input) = (&data[..split], &data[split + 1..]);

    let (mut a, mut b, mut f) = (0_i64, 0_u64, 0.0_f64);
    let (mut s, mut bytes, mut n) = (String::new(), Vec::new(), 0_usize);
    let mut args = [
        ScanArg::from(&mut a),
        (&mut b).into(),
        (&mut f).into(),
        (&mut s).into(),
        (&mut bytes).into(),
        (&mut n).into(),
    ];
    let _ = sscanf(input, fmt, &mut args);
});
