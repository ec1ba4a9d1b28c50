use bizrepack::codec::{compress, compress_aligned, decompress, CompressOptions, BLOCK_ALIGN};
use bizrepack::sniff::identify;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Texture-like data: runs of repeated words broken by a slow ramp.
fn sample(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if (i / 64) % 3 == 0 { (i / 7) as u8 } else { 0x40 })
        .collect()
}

fn bench_compression(c: &mut Criterion) {
    let data = sample(256 * 1024);
    let short = CompressOptions::new(0x7FF, 11);

    c.bench_function("compress_256k", |b| b.iter(|| compress(black_box(&data))));
    c.bench_function("compress_256k_short_matches", |b| {
        b.iter(|| compress_aligned(black_box(&data), &short, BLOCK_ALIGN))
    });
    c.bench_function("compress_64k_zeros", |b| {
        let zeros = vec![0u8; 64 * 1024];
        b.iter(|| compress(black_box(&zeros)))
    });
}

fn bench_decompression(c: &mut Criterion) {
    let stream = compress(&sample(256 * 1024));

    c.bench_function("decompress_256k", |b| b.iter(|| decompress(black_box(&stream)).unwrap()));
}

fn bench_identify(c: &mut Criterion) {
    let mut tex = b"TIM2".to_vec();
    tex.extend(sample(64 * 1024));
    let stream = compress_aligned(&tex, &CompressOptions::default(), BLOCK_ALIGN);

    c.bench_function("identify_compressed_tim2_64k", |b| {
        b.iter(|| identify(black_box(stream.clone())).unwrap())
    });
}

criterion_group!(benches, bench_compression, bench_decompression, bench_identify);
criterion_main!(benches);
