//! Benchmarks for the header rewrite.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mailforward::headers::{rewrite_message, RewriteOptions};
use mailforward::testing::SAMPLE_MESSAGE;

fn rewrite_benchmark(c: &mut Criterion) {
    let options = RewriteOptions {
        noreply_address: "noreply@forward.example.net".to_string(),
        to_override: None,
        subject_prefix: Some("[fwd] ".to_string()),
    };

    c.bench_function("rewrite_sample", |b| {
        b.iter(|| rewrite_message(black_box(SAMPLE_MESSAGE.as_bytes()), &options));
    });

    let mut large = SAMPLE_MESSAGE.as_bytes().to_vec();
    large.extend(std::iter::repeat(b'x').take(1 << 20));
    c.bench_function("rewrite_1mb_body", |b| {
        b.iter(|| rewrite_message(black_box(&large), &options));
    });
}

criterion_group!(benches, rewrite_benchmark);
criterion_main!(benches);
