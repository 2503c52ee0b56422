//! Batches of ray queries against a built octree, spread over worker threads.

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::debug;
use rand::{SeedableRng as _, rngs::SmallRng};
use rand_distr::{Distribution as _, UnitSphere};

use crate::{
    geometry::{FloatType, Ray, WorldBox, WorldVector},
    octree::{Octree, TraversalOptions, TraversalStack, TraversalStatistics},
    scene::{HitRecord, Object, PrimitiveIdx, generation::random_point, nearest_hit_linear},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// Closest hit along each ray
    Nearest,
    /// Any hit along each ray, stops at the first one found
    Any,
}

#[derive(Copy, Clone, Debug)]
pub struct WorkloadSettings {
    pub threads: NonZeroUsize,
    /// Number of rays a worker takes at once
    pub chunk_size: NonZeroUsize,
    pub query: QueryKind,
    pub options: TraversalOptions,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        WorkloadSettings {
            threads: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
            chunk_size: NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN),
            query: QueryKind::Nearest,
            options: TraversalOptions::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkloadResult {
    /// One entry per input ray, in input order.
    /// For any hit queries this is the hit that ended the search, not necessarily the closest.
    pub hits: Vec<Option<HitRecord>>,
    pub statistics: TraversalStatistics,
    pub elapsed: Duration,
}

impl WorkloadResult {
    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|hit| hit.is_some()).count()
    }

    pub fn rays_per_second(&self) -> f64 {
        self.hits.len() as f64 / self.elapsed.as_secs_f64().max(f64::MIN_POSITIVE)
    }
}

/// Rays starting at uniformly random points of `origins`, aimed at uniformly random
/// points of `targets`.
pub fn rays_from_box(count: usize, origins: &WorldBox, targets: &WorldBox, seed: u64) -> Vec<Ray> {
    let mut rng = SmallRng::seed_from_u64(seed);

    std::iter::repeat_with(|| {
        let origin = random_point(&mut rng, origins);
        let target = random_point(&mut rng, targets);
        Ray::try_new(origin, target - origin).ok()
    })
    .flatten()
    .take(count)
    .collect()
}

/// Rays starting on a sphere of the given radius around the center of `targets`,
/// aimed at uniformly random points of `targets`.
pub fn rays_from_shell(count: usize, targets: &WorldBox, radius: FloatType, seed: u64) -> Vec<Ray> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let center = targets.center();

    std::iter::repeat_with(|| {
        let offset: [FloatType; 3] = UnitSphere.sample(&mut rng);
        let origin = center + WorldVector::from(offset) * radius;
        let target = random_point(&mut rng, targets);
        Ray::try_new(origin, target - origin).ok()
    })
    .flatten()
    .take(count)
    .collect()
}

/// Answers all rays, each worker thread has its own traversal stack and counters.
/// `progress` is called with the number of finished and total rays after every chunk.
pub fn run<O, F>(
    octree: &Octree,
    objects: &[O],
    rays: &[Ray],
    settings: &WorkloadSettings,
    progress: F,
) -> anyhow::Result<WorkloadResult>
where
    O: Object + Sync,
    F: Fn(usize, usize) + Sync,
{
    let start = Instant::now();
    let chunk_size = settings.chunk_size.get();
    let chunk_count = rays.len().div_ceil(chunk_size);
    let next_chunk = AtomicUsize::new(0);
    let finished_rays = AtomicUsize::new(0);

    let worker_results = thread::scope(|scope| -> anyhow::Result<Vec<_>> {
        let handles = (0..settings.threads.get().min(chunk_count.max(1)))
            .map(|worker_id| {
                let next_chunk = &next_chunk;
                let finished_rays = &finished_rays;
                let progress = &progress;

                thread::Builder::new()
                    .name(format!("worker{worker_id}"))
                    .spawn_scoped(scope, move || {
                        let mut stack = TraversalStack::default();
                        let mut statistics = TraversalStatistics::default();
                        let mut chunks = Vec::new();

                        loop {
                            let chunk = next_chunk.fetch_add(1, Ordering::AcqRel);
                            if chunk >= chunk_count {
                                break;
                            }

                            let first = chunk * chunk_size;
                            let chunk_rays = &rays[first..(first + chunk_size).min(rays.len())];
                            let hits = chunk_rays
                                .iter()
                                .map(|ray| {
                                    query(octree, objects, ray, settings, &mut stack, &mut statistics)
                                })
                                .collect::<Vec<_>>();
                            chunks.push((first, hits));

                            let finished = finished_rays
                                .fetch_add(chunk_rays.len(), Ordering::AcqRel)
                                + chunk_rays.len();
                            progress(finished, rays.len());
                        }

                        debug!("Worker {worker_id} finished {} chunks", chunks.len());
                        (chunks, statistics)
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect())
    })?;

    let mut hits = vec![None; rays.len()];
    let mut statistics = TraversalStatistics::default();
    for (chunks, worker_statistics) in worker_results {
        statistics += worker_statistics;
        for (first, chunk_hits) in chunks {
            hits[first..first + chunk_hits.len()].copy_from_slice(&chunk_hits);
        }
    }

    Ok(WorkloadResult {
        hits,
        statistics,
        elapsed: start.elapsed(),
    })
}

fn query<O: Object>(
    octree: &Octree,
    objects: &[O],
    ray: &Ray,
    settings: &WorkloadSettings,
    stack: &mut TraversalStack,
    statistics: &mut TraversalStatistics,
) -> Option<HitRecord> {
    let hit_test = |primitive: PrimitiveIdx, ray: &Ray| {
        objects[primitive.index()].intersect(ray)
    };

    statistics.rays += 1;
    match settings.query {
        QueryKind::Nearest => {
            octree.find_nearest_hit_with(ray, stack, &settings.options, statistics, hit_test)
        }
        QueryKind::Any => octree.first_hit_with(ray, stack, statistics, hit_test),
    }
}

/// Nearest hits found by testing every object, single threaded.
/// Serves as the reference for both query kinds.
pub fn run_linear<O: Object>(objects: &[O], rays: &[Ray]) -> WorkloadResult {
    let start = Instant::now();

    let hits = rays
        .iter()
        .map(|ray| nearest_hit_linear(objects, ray))
        .collect();

    WorkloadResult {
        hits,
        statistics: TraversalStatistics {
            rays: rays.len(),
            primitive_tests: rays.len() * objects.len(),
            ..Default::default()
        },
        elapsed: start.elapsed(),
    }
}

/// Number of rays where the two results disagree.
/// Nearest hits must agree in distance within `tolerance`, any hits only in being present.
pub fn count_mismatches(
    result: &WorkloadResult,
    reference: &WorkloadResult,
    query: QueryKind,
    tolerance: FloatType,
) -> usize {
    result
        .hits
        .iter()
        .zip(&reference.hits)
        .filter(|(a, b)| match (a, b, query) {
            (None, None, _) => false,
            (Some(_), Some(_), QueryKind::Any) => false,
            (Some(a), Some(b), QueryKind::Nearest) => (a.distance - b.distance).abs() > tolerance,
            _ => true,
        })
        .count()
        + result.hits.len().abs_diff(reference.hits.len())
}
