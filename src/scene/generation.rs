//! Deterministic sphere scenes for tests, benchmarks and the CLI.

use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::geometry::{FloatType, WorldBox, WorldPoint};

use super::primitives::Sphere;

/// Ground sphere, a jittered grid of small spheres lying on it and three large spheres
/// in the middle.
pub fn showcase(seed: u64) -> Vec<Sphere> {
    const SMALL_RADIUS: FloatType = 0.2;
    const GRID_HALF_SIZE: i32 = 4;
    const GRID_SPACING: FloatType = 2.0;

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut spheres = vec![Sphere::new(WorldPoint::new(0.0, -1000.0, 0.0), 1000.0)];

    for a in -GRID_HALF_SIZE..=GRID_HALF_SIZE {
        for b in -GRID_HALF_SIZE..=GRID_HALF_SIZE {
            let center = WorldPoint::new(
                a as FloatType * GRID_SPACING + rng.random_range(0.0..0.9),
                SMALL_RADIUS,
                b as FloatType * GRID_SPACING + rng.random_range(0.0..0.9),
            );
            spheres.push(Sphere::new(center, SMALL_RADIUS));
        }
    }

    spheres.push(Sphere::new(WorldPoint::new(0.0, 1.0, 0.0), 1.0));
    spheres.push(Sphere::new(WorldPoint::new(-4.0, 1.0, 0.0), 1.0));
    spheres.push(Sphere::new(WorldPoint::new(4.0, 1.0, 0.0), 1.0));

    spheres
}

/// `count` spheres with centers uniformly distributed in `region` and radii in `radius_range`.
pub fn random_cloud(
    count: usize,
    region: &WorldBox,
    radius_range: std::ops::Range<FloatType>,
    seed: u64,
) -> Vec<Sphere> {
    let mut rng = SmallRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let center = random_point(&mut rng, region);
            let radius = if radius_range.is_empty() {
                radius_range.start
            } else {
                rng.random_range(radius_range.clone())
            };
            Sphere::new(center, radius)
        })
        .collect()
}

/// Uniformly distributed point in the region. Flat axes give the region's coordinate.
pub fn random_point<R: Rng + ?Sized>(rng: &mut R, region: &WorldBox) -> WorldPoint {
    WorldPoint::from(region.min.coords.zip_map(&region.max.coords, |min, max| {
        if min < max {
            rng.random_range(min..max)
        } else {
            min
        }
    }))
}

/// Three well separated spheres, small enough to read the whole tree dump.
pub fn debug_layout() -> Vec<Sphere> {
    vec![
        Sphere::new(WorldPoint::new(-10.0, -10.0, -10.0), 3.0),
        Sphere::new(WorldPoint::new(10.0, 10.0, 10.0), 3.0),
        Sphere::new(WorldPoint::new(-10.0, 10.0, -10.0), 3.0),
    ]
}
