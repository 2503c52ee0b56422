use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use minioctree::{
    geometry::WorldBox,
    octree::{Octree, OctreeSettings, TraversalOptions},
    scene::generation,
    workload::{self, QueryKind, WorkloadSettings},
};

fn criterion_benchmark(c: &mut Criterion) {
    let spheres = generation::showcase(0);
    let targets = WorldBox::new([-10.0, 0.0, -10.0].into(), [10.0, 2.0, 10.0].into());
    let rays = workload::rays_from_shell(100_000, &targets, 30.0, 0);

    c.bench_function("build_showcase", |b| {
        b.iter(|| Octree::from_objects(&spheres, &OctreeSettings::default()).unwrap())
    });

    let octree = Octree::from_objects(&spheres, &OctreeSettings::default()).unwrap();

    for (name, query, distance_pruning) in [
        ("nearest_hit", QueryKind::Nearest, true),
        ("nearest_hit_no_pruning", QueryKind::Nearest, false),
        ("any_hit", QueryKind::Any, true),
    ] {
        let settings = WorkloadSettings {
            query,
            options: TraversalOptions { distance_pruning },
            ..Default::default()
        };
        c.bench_function(name, |b| {
            b.iter(|| workload::run(&octree, &spheres, &rays, &settings, |_, _| {}).unwrap())
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20).measurement_time(Duration::from_secs(20));
    targets = criterion_benchmark
}
criterion_main!(benches);
