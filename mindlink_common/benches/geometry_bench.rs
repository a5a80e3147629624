//! Gaze geometry benchmarks.
//!
//! Measures the per-sample conversions run for every binocular sample.

use criterion::{Criterion, criterion_group, criterion_main};
use mindlink_common::geometry::{
    RotationOrder, normalized_to_display, vector_to_angles, vectors_to_angles,
};
use mindlink_common::tracker::host::CoordBounds;
use std::hint::black_box;

fn bench_vector_to_angles(c: &mut Criterion) {
    let v = [0.12, -0.31, -0.94];

    c.bench_function("vector_to_angles_xy", |b| {
        b.iter(|| {
            black_box(vector_to_angles(
                black_box(v[0]),
                black_box(v[1]),
                black_box(v[2]),
                RotationOrder::XY,
            ))
        });
    });

    c.bench_function("vector_to_angles_yx", |b| {
        b.iter(|| {
            black_box(vector_to_angles(
                black_box(v[0]),
                black_box(v[1]),
                black_box(v[2]),
                RotationOrder::YX,
            ))
        });
    });
}

fn bench_batch(c: &mut Criterion) {
    // One second of data at 500 Hz.
    let vectors: Vec<[f64; 3]> = (0..500_u32)
        .map(|i| {
            let t = f64::from(i) * 0.002;
            [0.2 * t.sin(), 0.1 * t.cos(), -1.0]
        })
        .collect();

    c.bench_function("vectors_to_angles_500", |b| {
        b.iter(|| black_box(vectors_to_angles(black_box(&vectors), RotationOrder::XY)));
    });
}

fn bench_normalized_to_display(c: &mut Criterion) {
    let bounds = CoordBounds::centered(1920.0, 1080.0);

    c.bench_function("normalized_to_display", |b| {
        b.iter(|| black_box(normalized_to_display(black_box((0.31, 0.72)), Some(&bounds))));
    });
}

criterion_group!(
    benches,
    bench_vector_to_angles,
    bench_batch,
    bench_normalized_to_display
);
criterion_main!(benches);
