//! Physics benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- broadphase

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rein2d::collision::{collide, compute_distance, DistanceInput, DistanceProxy, SimplexCache};
use rein2d::{Aabb, BroadPhase, CircleShape, PolygonShape, Shape, Transform};
use rein2d_bench::*;

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn random_boxes(n: usize, extent: f32) -> Vec<Aabb> {
    let mut rng = Lcg::new(7);
    (0..n)
        .map(|_| {
            let center = Vec2::new(rng.range(-extent, extent), rng.range(-extent, extent));
            Aabb::from_center(center, Vec2::splat(rng.range(0.1, 1.0)))
        })
        .collect()
}

fn bench_broadphase(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("broadphase/insert");
        for &n in &[100, 1000, 5000] {
            let boxes = random_boxes(n, (n as f32).sqrt() * 2.0);
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| {
                    let mut bp: BroadPhase<usize> = BroadPhase::new(0.1, 4.0);
                    for (i, aabb) in boxes.iter().enumerate() {
                        bp.create_proxy(aabb, i);
                    }
                    bp
                });
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("broadphase/update_pairs");
        for &n in &[100, 1000, 5000] {
            let boxes = random_boxes(n, (n as f32).sqrt() * 2.0);
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter_batched(
                    || {
                        let mut bp: BroadPhase<usize> = BroadPhase::new(0.1, 4.0);
                        for (i, aabb) in boxes.iter().enumerate() {
                            bp.create_proxy(aabb, i);
                        }
                        bp
                    },
                    |mut bp| {
                        let mut pairs = 0usize;
                        bp.update_pairs(|_, _| pairs += 1);
                        pairs
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("broadphase/query");
        let n = 5000;
        let boxes = random_boxes(n, (n as f32).sqrt() * 2.0);
        let mut bp: BroadPhase<usize> = BroadPhase::new(0.1, 4.0);
        for (i, aabb) in boxes.iter().enumerate() {
            bp.create_proxy(aabb, i);
        }
        let window = Aabb::from_center(Vec2::ZERO, Vec2::splat(10.0));
        group.bench_function("window_5000", |b| {
            b.iter(|| {
                let mut hits = 0usize;
                bp.query(&window, |_| {
                    hits += 1;
                    true
                });
                hits
            });
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn bench_narrowphase(c: &mut Criterion) {
    let (circle, square) = match (CircleShape::new(0.5), PolygonShape::new_box(0.5, 0.5)) {
        (Ok(circle), Ok(square)) => (Shape::from(circle), Shape::from(square)),
        _ => return,
    };
    let xf_a = Transform::new(Vec2::ZERO, 0.0);
    let xf_b = Transform::new(Vec2::new(0.8, 0.3), 0.4);

    let mut group = c.benchmark_group("narrowphase/manifold");
    group.bench_function("circle_circle", |b| {
        b.iter(|| collide(&circle, 0, &xf_a, &circle, &xf_b));
    });
    group.bench_function("polygon_circle", |b| {
        b.iter(|| collide(&square, 0, &xf_a, &circle, &xf_b));
    });
    group.bench_function("polygon_polygon", |b| {
        b.iter(|| collide(&square, 0, &xf_a, &square, &xf_b));
    });
    group.finish();

    let mut group = c.benchmark_group("narrowphase/gjk");
    let proxy = DistanceProxy::from_shape(&square, 0);
    let far = Transform::new(Vec2::new(3.0, 1.0), 0.7);
    group.bench_function("polygon_polygon_cold", |b| {
        b.iter(|| {
            let mut cache = SimplexCache::default();
            compute_distance(&DistanceInput::new(proxy, proxy, xf_a, far, true), &mut cache)
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("pipeline/step");
        group.sample_size(30);
        for &n in &[50, 100, 500, 1000] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n).ok(),
                    |world| {
                        if let Some(mut world) = world {
                            world.step(1.0 / 60.0, 8, 3);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/sustained_60steps");
        group.sample_size(10);
        for &n in &[100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n).ok(),
                    |world| {
                        if let Some(mut world) = world {
                            run_steps(&mut world, 60);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/pyramid");
        group.sample_size(10);
        for &rows in &[10, 20] {
            group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
                b.iter_batched(
                    || setup_pyramid(rows).ok(),
                    |world| {
                        if let Some(mut world) = world {
                            run_steps(&mut world, 60);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_broadphase, bench_narrowphase, bench_pipeline);
criterion_main!(benches);
