use std::{fmt::Display, ops::AddAssign};

use assert2::debug_assert;

use crate::{
    geometry::{FloatType, InvalidRay, Ray, RayIntersectionExt as _, WorldBox, WorldPoint, WorldVector},
    scene::{HitRecord, Object, PrimitiveIdx},
};

use super::{NodeContent, NodeIdx, Octant, Octree, TraversalOrder};

/// Reusable storage for the traversal work list.
/// Keeping one per worker avoids allocating for every ray.
#[derive(Clone, Debug, Default)]
pub struct TraversalStack {
    /// Node and the ray distance where it is entered
    stack: Vec<(u32, FloatType)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Skip nodes entered further away than the best hit so far (nearest hit queries only).
    /// Never changes results, only the amount of work.
    pub distance_pruning: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions {
            distance_pruning: true,
        }
    }
}

/// Observability hook for traversal work.
/// Implemented for `()` (counts nothing) and `TraversalStatistics`.
pub trait TraversalCounters {
    fn node_visited(&mut self) {}
    fn leaf_visited(&mut self) {}
    fn primitive_tested(&mut self) {}
    /// Child box missed by the ray
    fn box_missed(&mut self) {}
    /// Node skipped because a closer hit was already known
    fn distance_pruned(&mut self) {}
}

impl TraversalCounters for () {}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalStatistics {
    pub rays: usize,
    pub nodes_visited: usize,
    pub leaves_visited: usize,
    pub primitive_tests: usize,
    pub box_misses: usize,
    pub distance_prunes: usize,
}

impl TraversalCounters for TraversalStatistics {
    fn node_visited(&mut self) {
        self.nodes_visited += 1;
    }

    fn leaf_visited(&mut self) {
        self.leaves_visited += 1;
    }

    fn primitive_tested(&mut self) {
        self.primitive_tests += 1;
    }

    fn box_missed(&mut self) {
        self.box_misses += 1;
    }

    fn distance_pruned(&mut self) {
        self.distance_prunes += 1;
    }
}

impl AddAssign for TraversalStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.rays += rhs.rays;
        self.nodes_visited += rhs.nodes_visited;
        self.leaves_visited += rhs.leaves_visited;
        self.primitive_tests += rhs.primitive_tests;
        self.box_misses += rhs.box_misses;
        self.distance_prunes += rhs.distance_prunes;
    }
}

impl Display for TraversalStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per_ray = |count: usize| count as f32 / self.rays.max(1) as f32;
        write!(
            f,
            "{} rays; per ray: {:.1} nodes, {:.1} leaves, {:.1} primitive tests, \
             {:.1} box misses, {:.1} distance prunes",
            self.rays,
            per_ray(self.nodes_visited),
            per_ray(self.leaves_visited),
            per_ray(self.primitive_tests),
            per_ray(self.box_misses),
            per_ray(self.distance_prunes),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum QueryMode {
    Nearest,
    Any,
}

/// Node storage that the traversal can walk.
/// Nodes are identified by raw u32 indices, the root must intersect every hit.
pub(super) trait TraversableTree {
    fn root(&self) -> u32;
    fn node_box(&self, node: u32) -> WorldBox;
    /// Children in octant order, None for leaves
    fn children(&self, node: u32) -> Option<[u32; Octant::COUNT]>;
    fn leaf_primitives(&self, node: u32) -> impl Iterator<Item = PrimitiveIdx> + '_;
}

impl TraversableTree for Octree {
    fn root(&self) -> u32 {
        Octree::root_index().raw()
    }

    fn node_box(&self, node: u32) -> WorldBox {
        self.nodes[NodeIdx::from_raw(node)].bounding_box
    }

    fn children(&self, node: u32) -> Option<[u32; Octant::COUNT]> {
        match &self.nodes[NodeIdx::from_raw(node)].content {
            NodeContent::Leaf { .. } => None,
            NodeContent::Inner { children } => Some(children.map(|child| child.raw())),
        }
    }

    fn leaf_primitives(&self, node: u32) -> impl Iterator<Item = PrimitiveIdx> + '_ {
        Octree::leaf_primitives(self, &self.nodes[NodeIdx::from_raw(node)])
            .iter()
            .copied()
    }
}

/// Depth first walk over the tree, nearest child first.
///
/// In nearest mode returns the closest hit, in any mode returns the first hit found.
/// `hit_test` is the primitive intersection routine, hits with negative distance are ignored.
pub(super) fn traverse<T, C, F>(
    tree: &T,
    ray: &Ray,
    mode: QueryMode,
    options: &TraversalOptions,
    stack: &mut TraversalStack,
    counters: &mut C,
    mut hit_test: F,
) -> Option<HitRecord>
where
    T: TraversableTree + ?Sized,
    C: TraversalCounters + ?Sized,
    F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
{
    debug_assert!(stack.stack.is_empty());

    let root = tree.root();
    let Some((root_t, _)) = tree.node_box(root).intersect(ray) else {
        counters.box_missed();
        return None;
    };
    stack.stack.push((root, root_t));

    let order = TraversalOrder::for_direction(&ray.direction);
    let prune_by_distance = mode == QueryMode::Nearest && options.distance_pruning;
    let mut best: Option<HitRecord> = None;

    while let Some((node, node_t)) = stack.stack.pop() {
        if let Some(best) = &best
            && prune_by_distance
            && node_t > best.distance
        {
            // If the node's minimum intersection distance is further away than the best
            // hit found so far, the node can't do any good any more and we can skip it.
            counters.distance_pruned();
            continue;
        }

        counters.node_visited();

        match tree.children(node) {
            Some(children) => {
                // Nearest child gets pushed last, so that it is popped first
                for octant in order.iter().rev() {
                    let child = children[octant.index()];
                    match tree.node_box(child).intersect(ray) {
                        Some((child_t, _)) => stack.stack.push((child, child_t)),
                        None => counters.box_missed(),
                    }
                }
            }
            None => {
                counters.leaf_visited();

                for primitive in tree.leaf_primitives(node) {
                    counters.primitive_tested();

                    let Some(distance) = hit_test(primitive, ray) else {
                        continue;
                    };
                    if distance < 0.0 {
                        continue;
                    }

                    let hit = HitRecord {
                        primitive,
                        distance,
                    };

                    match mode {
                        QueryMode::Any => {
                            stack.stack.clear();
                            return Some(hit);
                        }
                        QueryMode::Nearest => {
                            if best.is_none_or(|best| distance < best.distance) {
                                best = Some(hit);
                            }
                        }
                    }
                }
            }
        }
    }

    best
}

impl Octree {
    /// Closest hit along the ray.
    /// `hit_test` intersects the ray with a primitive given by its index.
    pub fn find_nearest_hit<F>(
        &self,
        ray: &Ray,
        stack: &mut TraversalStack,
        hit_test: F,
    ) -> Option<HitRecord>
    where
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        self.find_nearest_hit_with(ray, stack, &TraversalOptions::default(), &mut (), hit_test)
    }

    /// True if the ray hits anything. Stops at the first confirmed hit.
    pub fn find_any_hit<F>(&self, ray: &Ray, stack: &mut TraversalStack, hit_test: F) -> bool
    where
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        self.find_any_hit_with(ray, stack, &mut (), hit_test)
    }

    pub fn find_nearest_hit_with<C, F>(
        &self,
        ray: &Ray,
        stack: &mut TraversalStack,
        options: &TraversalOptions,
        counters: &mut C,
        hit_test: F,
    ) -> Option<HitRecord>
    where
        C: TraversalCounters + ?Sized,
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        traverse(
            self,
            ray,
            QueryMode::Nearest,
            options,
            stack,
            counters,
            hit_test,
        )
    }

    /// Any hit query with traversal counters.
    pub fn find_any_hit_with<C, F>(
        &self,
        ray: &Ray,
        stack: &mut TraversalStack,
        counters: &mut C,
        hit_test: F,
    ) -> bool
    where
        C: TraversalCounters + ?Sized,
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        self.first_hit_with(ray, stack, counters, hit_test).is_some()
    }

    /// Any hit query that also returns the hit that was found.
    /// The hit is not necessarily the closest one.
    pub fn first_hit_with<C, F>(
        &self,
        ray: &Ray,
        stack: &mut TraversalStack,
        counters: &mut C,
        hit_test: F,
    ) -> Option<HitRecord>
    where
        C: TraversalCounters + ?Sized,
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        traverse(
            self,
            ray,
            QueryMode::Any,
            &TraversalOptions::default(),
            stack,
            counters,
            hit_test,
        )
    }

    /// Nearest hit against the objects the tree was built from.
    pub fn nearest_hit_in<O: Object>(
        &self,
        objects: &[O],
        ray: &Ray,
        stack: &mut TraversalStack,
    ) -> Option<HitRecord> {
        self.find_nearest_hit(ray, stack, |primitive, ray| {
            objects[primitive.index()].intersect(ray)
        })
    }

    /// Any hit against the objects the tree was built from.
    pub fn any_hit_in<O: Object>(
        &self,
        objects: &[O],
        ray: &Ray,
        stack: &mut TraversalStack,
    ) -> bool {
        self.find_any_hit(ray, stack, |primitive, ray| {
            objects[primitive.index()].intersect(ray)
        })
    }

    /// One-off nearest hit query from raw ray parameters, rejecting non-finite input.
    pub fn nearest_hit_from<O: Object>(
        &self,
        objects: &[O],
        origin: WorldPoint,
        direction: WorldVector,
    ) -> Result<Option<HitRecord>, InvalidRay> {
        let ray = Ray::try_new(origin, direction)?;
        Ok(self.nearest_hit_in(objects, &ray, &mut TraversalStack::default()))
    }

    /// One-off any hit query from raw ray parameters, rejecting non-finite input.
    pub fn any_hit_from<O: Object>(
        &self,
        objects: &[O],
        origin: WorldPoint,
        direction: WorldVector,
    ) -> Result<bool, InvalidRay> {
        let ray = Ray::try_new(origin, direction)?;
        Ok(self.any_hit_in(objects, &ray, &mut TraversalStack::default()))
    }
}
