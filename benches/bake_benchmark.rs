/*
 * Asset Pipeline Benchmark
 *
 * This file contains benchmarks for the load-time hot paths: baking the
 * morph-target clip into the animation texture and tiling the base mesh
 * into the merged instance buffers. Both run once per process start, but
 * they scale with vertex and agent count and gate the time to first frame.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use gpu_flock::assets::{AnimationClip, BaseMesh};
use gpu_flock::baker::bake_animation_texture;
use gpu_flock::geometry::build_instance_geometry;

fn synthetic_clip(keyframes: usize, vertices: usize) -> AnimationClip {
    let poses = (0..keyframes)
        .map(|k| {
            (0..vertices)
                .map(|v| {
                    let phase = (k * vertices + v) as f32;
                    [phase.sin(), phase.cos(), phase.sin() * 0.5]
                })
                .collect()
        })
        .collect();
    AnimationClip {
        keyframes: poses,
        duration_frames: 60,
    }
}

fn synthetic_mesh(vertices: usize) -> BaseMesh {
    BaseMesh {
        positions: (0..vertices)
            .map(|v| [v as f32, (v % 7) as f32, (v % 13) as f32])
            .collect(),
        colors: vec![[0.8, 0.8, 0.8]; vertices],
        indices: (0..vertices as u32).collect(),
    }
}

// Benchmark baking the animation clip across mesh sizes
fn bench_bake(c: &mut Criterion) {
    let mut group = c.benchmark_group("bake_animation_texture");

    for vertices in [64, 256, 1024].iter() {
        let clip = synthetic_clip(8, *vertices);
        group.bench_with_input(BenchmarkId::from_parameter(vertices), vertices, |b, &n| {
            b.iter(|| bake_animation_texture(black_box(&clip), black_box(n)).unwrap());
        });
    }

    group.finish();
}

// Benchmark tiling the base mesh across flock sizes
fn bench_instance_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_instance_geometry");

    let mesh = synthetic_mesh(128);
    let animation = bake_animation_texture(&synthetic_clip(8, 128), 128).unwrap();

    for agents in [256u32, 1024, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(agents), agents, |b, &n| {
            let grid_width = (n as f32).sqrt() as u32;
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(42);
                build_instance_geometry(
                    black_box(&mesh),
                    black_box(&animation),
                    n,
                    grid_width,
                    &mut rng,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

// Configure the benchmarks
criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_bake, bench_instance_build
}

criterion_main!(benches);
