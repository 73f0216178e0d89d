use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winograd63::{
    ConvConfig, ConvOptions, FeatureMap, MicrokernelChoice, OutputShape, RecyclingAllocator,
    conv3x3_direct, convolve, transform_filter,
};

fn random_values(len: usize, scale: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-scale..scale)).collect()
}

fn bench_convolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolve");
    group.sample_size(20);

    let pooled = ConvOptions::from_config(&ConvConfig::default())
        .expect("worker pool")
        .with_allocator(Arc::new(RecyclingAllocator::default()));
    let portable = ConvOptions::single_threaded().with_microkernel(MicrokernelChoice::Portable);
    let single = ConvOptions::single_threaded();

    for &(channels, size) in &[(32usize, 30usize), (64, 56), (128, 28)] {
        let input = random_values(channels * (size + 2) * (size + 2), 1.0, 42);
        let weights = random_values(channels * channels * 9, 1.0 / (9.0 * channels as f32).sqrt(), 7);
        let map = FeatureMap::from_planar_f32(&input, size + 2, size + 2, channels).expect("input map");
        let filter = transform_filter(&weights, channels, channels, &single).expect("filter");
        let shape = OutputShape::new(size, size);
        let label = format!("{channels}x{size}x{size}");

        group.bench_with_input(BenchmarkId::new("direct", &label), &map, |b, _| {
            b.iter(|| {
                black_box(conv3x3_direct(
                    black_box(&input),
                    size + 2,
                    size + 2,
                    channels,
                    &weights,
                    None,
                    channels,
                    size,
                    size,
                ))
            })
        });

        for (name, options) in [("portable", &portable), ("single", &single), ("pooled", &pooled)] {
            group.bench_with_input(BenchmarkId::new(name, &label), &map, |b, map| {
                b.iter(|| {
                    let out = convolve(black_box(map), &filter, None, shape, options)
                        .expect("convolve succeeds");
                    black_box(out)
                })
            });
        }
    }

    group.finish();
}

fn bench_filter_transform(c: &mut Criterion) {
    let options = ConvOptions::single_threaded();
    let weights = random_values(128 * 128 * 9, 0.1, 3);

    c.bench_function("transform_filter_128x128", |b| {
        b.iter(|| black_box(transform_filter(black_box(&weights), 128, 128, &options).expect("filter")))
    });
}

criterion_group!(benches, bench_convolve, bench_filter_transform);
criterion_main!(benches);
