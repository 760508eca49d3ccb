//! Base-N codec and filter throughput.
//!
//! Usage: `cargo bench -p unistream-bench --bench codec_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use unistream_core::filter::{Alphabet, Direction, decode_to_vec, encode_to_vec, open_basen};
use unistream_core::stream::Stream;

fn bench_codecs(c: &mut Criterion) {
    let data: Vec<u8> = (0..48 * 1024).map(|i| (i * 7 % 256) as u8).collect();
    let mut group = c.benchmark_group("basen");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for (label, alphabet) in [("base64", Alphabet::BASE64), ("base32", Alphabet::BASE32), ("base16", Alphabet::BASE16)] {
        let encoded = encode_to_vec(&data, &alphabet);
        group.bench_with_input(BenchmarkId::new("encode", label), &data, |b, data| {
            b.iter(|| black_box(encode_to_vec(data, &alphabet)));
        });
        group.bench_with_input(BenchmarkId::new("decode", label), &encoded, |b, encoded| {
            b.iter(|| black_box(decode_to_vec(encoded, &alphabet).unwrap()));
        });
    }
    group.finish();
}

fn bench_filter_stream(c: &mut Criterion) {
    let data: Vec<u8> = (0..48 * 1024).map(|i| (i % 256) as u8).collect();
    let mut group = c.benchmark_group("basen_filter");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("read_encoded", |b| {
        b.iter(|| {
            let inner = Stream::open_const_buffer(data.clone(), "rb").unwrap();
            let mut filter = open_basen(inner, Alphabet::BASE64, Direction::Encode, "rb").unwrap();
            let mut out = vec![0u8; 4096];
            let mut total = 0;
            loop {
                let n = filter.read_bytes(&mut out);
                if n == 0 {
                    break;
                }
                total += n;
            }
            black_box(total);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_codecs, bench_filter_stream);
criterion_main!(benches);
