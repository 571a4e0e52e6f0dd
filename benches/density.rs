//! Benchmarks for density field generation and the CPU ray marcher.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{UVec2, Vec3};

use gascloud::raymarch::{jitter, march, Ray};
use gascloud::{DensityFieldGenerator, ImprovedNoise, NoiseKind, RenderParameters};

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(10);

    for size in [32u32, 64, 128] {
        group.bench_with_input(BenchmarkId::new("improved", size), &size, |b, &size| {
            let gen = DensityFieldGenerator::new(size);
            let noise = ImprovedNoise::new();
            b.iter(|| black_box(gen.generate(&noise)))
        });
    }

    for kind in [NoiseKind::Perlin, NoiseKind::Fbm] {
        group.bench_function(BenchmarkId::new(kind.name(), 64), |b| {
            let gen = DensityFieldGenerator::new(64);
            let noise = kind.build(0);
            b.iter(|| black_box(gen.generate(noise.as_ref())))
        });
    }

    group.finish();
}

fn bench_march(c: &mut Criterion) {
    let mut group = c.benchmark_group("march");
    let field = DensityFieldGenerator::new(64).generate(&ImprovedNoise::new());
    let ray = Ray::toward(Vec3::new(0.0, 0.0, 1.5), Vec3::new(0.05, -0.02, 0.0));
    let base = Vec3::new(0.43, 0.0, 0.8);

    for steps in [25u32, 100, 200] {
        group.bench_with_input(BenchmarkId::new("center_ray", steps), &steps, |b, &steps| {
            let params = RenderParameters::new().with_steps(steps);
            let j = jitter(UVec2::new(320, 180), 0);
            b.iter(|| black_box(march(&field, black_box(ray), &params, base, j)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_march);
criterion_main!(benches);
