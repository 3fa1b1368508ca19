//! Cluster Index Benchmarks
//!
//! - Index build time vs point count
//! - Viewport query at city and country zoom
//! - Per-heading AR frame projection

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use waterfinder_geo::{BoundingBox, ClusterIndex, ClusterOptions, GeoPoint, PointOfInterest, Projector};

/// Uniform fountains over a box roughly the size of a large city region
fn create_points(count: usize) -> Vec<PointOfInterest> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| PointOfInterest::new(rng.gen_range(48.0..49.5), rng.gen_range(1.5..3.5)))
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_build");
    group.sample_size(20);

    for count in [1_000, 10_000, 100_000] {
        let points = create_points(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| ClusterIndex::build(black_box(points.clone()), &ClusterOptions::default()))
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let index = ClusterIndex::build(create_points(100_000), &ClusterOptions::default()).unwrap();
    let mut group = c.benchmark_group("cluster_query");

    let city = BoundingBox::new(2.25, 48.81, 2.42, 48.90);
    let country = BoundingBox::new(-5.0, 42.0, 8.0, 51.0);
    group.bench_function("city_z14", |b| b.iter(|| index.query(black_box(&city), 14)));
    group.bench_function("country_z6", |b| b.iter(|| index.query(black_box(&country), 6)));
    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let points = create_points(10_000);
    let projector = Projector::default();
    let user = GeoPoint::new(48.8566, 2.3522);

    c.bench_function("ar_frame_10k", |b| {
        let mut heading = 0.0;
        b.iter(|| {
            heading = (heading + 7.0) % 360.0;
            projector.frame(user, black_box(heading), &points)
        })
    });
}

criterion_group!(benches, bench_build, bench_query, bench_frame);
criterion_main!(benches);
