use std::{array, collections::VecDeque};

use bytemuck::{Pod, Zeroable};

use crate::{
    geometry::{FloatType, Ray, WorldBox, WorldPoint},
    scene::{HitRecord, Object, PrimitiveIdx},
};

use super::{
    NodeContent, Octant, Octree, TraversalCounters, TraversalOptions, TraversalStack,
    ray_octree_intersection::{QueryMode, TraversableTree, traverse},
};

/// Offset value used for "no children" and "no primitives".
pub const NO_OFFSET: i32 = -1;

/// Node of the flattened octree, laid out for direct upload to a GPU buffer.
/// The eight children of an inner node are stored contiguously starting at `children_offset`,
/// in octant order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FlatNode {
    pub min: [f32; 3],
    /// Index of the first child, `NO_OFFSET` for leaves
    pub children_offset: i32,
    pub max: [f32; 3],
    /// Index of the first primitive in the flat primitive index list, `NO_OFFSET` if the node
    /// has none
    pub objects_offset: i32,
    pub object_count: u32,
    pub depth: u32,
    _padding: [u32; 2],
}

/// Octree converted to two flat arrays, nodes in breadth first order with the root first.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatOctree {
    nodes: Vec<FlatNode>,
    primitive_indices: Vec<u32>,
}

impl FlatNode {
    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::new(self.min.into(), self.max.into())
    }

    pub fn is_leaf(&self) -> bool {
        self.children_offset == NO_OFFSET
    }
}

impl Octree {
    pub fn flatten(&self) -> FlatOctree {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut primitive_indices = Vec::with_capacity(self.primitive_references.len());

        // Flat index of a node is its position in the breadth first order, so children
        // enqueued together end up next to each other.
        let mut queue = VecDeque::from([Octree::root_index()]);
        let mut enqueued = 1;

        while let Some(index) = queue.pop_front() {
            let node = &self.nodes[index];
            let mut flat = FlatNode {
                min: node.bounding_box.min.coords.into(),
                children_offset: NO_OFFSET,
                max: node.bounding_box.max.coords.into(),
                objects_offset: NO_OFFSET,
                object_count: 0,
                depth: node.depth,
                _padding: [0; 2],
            };

            match &node.content {
                NodeContent::Inner { children } => {
                    flat.children_offset = to_offset(enqueued);
                    enqueued += Octant::COUNT;
                    queue.extend(children.iter().copied());
                }
                NodeContent::Leaf { primitives } if !primitives.is_empty() => {
                    flat.objects_offset = to_offset(primitive_indices.len());
                    flat.object_count = primitives.len() as u32;
                    primitive_indices.extend(
                        self.primitive_references[primitives.clone()]
                            .iter()
                            .map(|p| p.raw()),
                    );
                }
                NodeContent::Leaf { .. } => {}
            }

            nodes.push(flat);
        }

        assert2::debug_assert!(nodes.len() == self.nodes.len());

        FlatOctree {
            nodes,
            primitive_indices,
        }
    }
}

fn to_offset(value: usize) -> i32 {
    i32::try_from(value).expect("Octree too large for 32 bit offsets")
}

impl FlatOctree {
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    pub fn primitive_indices(&self) -> &[u32] {
        &self.primitive_indices
    }

    /// Node array as raw bytes, ready for a buffer upload.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    pub fn primitive_index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.primitive_indices)
    }

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

    pub fn find_any_hit<F>(&self, ray: &Ray, stack: &mut TraversalStack, hit_test: F) -> bool
    where
        F: FnMut(PrimitiveIdx, &Ray) -> Option<FloatType>,
    {
        traverse(
            self,
            ray,
            QueryMode::Any,
            &TraversalOptions::default(),
            stack,
            &mut (),
            hit_test,
        )
        .is_some()
    }

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

    pub fn print(&self) {
        for (i, node) in self.nodes.iter().enumerate() {
            println!(
                "Node {i}: depth {}, {:?}-{:?}, children at {}, {} objects at {}",
                node.depth,
                WorldPoint::from(node.min),
                WorldPoint::from(node.max),
                node.children_offset,
                node.object_count,
                node.objects_offset,
            );
        }
        println!("Primitive indices: {:?}", self.primitive_indices);
    }
}

impl TraversableTree for FlatOctree {
    fn root(&self) -> u32 {
        0
    }

    fn node_box(&self, node: u32) -> WorldBox {
        self.nodes[node as usize].bounding_box()
    }

    fn children(&self, node: u32) -> Option<[u32; Octant::COUNT]> {
        let node = &self.nodes[node as usize];
        if node.is_leaf() {
            return None;
        }
        let first = node.children_offset as u32;
        Some(array::from_fn(|i| first + i as u32))
    }

    fn leaf_primitives(&self, node: u32) -> impl Iterator<Item = PrimitiveIdx> + '_ {
        let node = &self.nodes[node as usize];
        let range = if node.objects_offset == NO_OFFSET {
            0..0
        } else {
            let first = node.objects_offset as usize;
            first..(first + node.object_count as usize)
        };

        self.primitive_indices[range]
            .iter()
            .map(|&index| PrimitiveIdx::from_raw(index))
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        geometry::{WorldVector, test::{NonzeroWorldVectorWrapper, WorldPointWrapper}},
        octree::{NodeIdx, OctreeSettings},
        scene::{generation, primitives::Sphere},
    };
    use assert2::{assert, let_assert};
    use test_strategy::proptest;

    fn settings(max_depth: u32, max_primitives_per_leaf: usize) -> OctreeSettings {
        OctreeSettings::builder()
            .max_depth(max_depth)
            .max_primitives_per_leaf(NonZeroUsize::new(max_primitives_per_leaf).unwrap())
            .build()
    }

    fn showcase_octree() -> (Vec<Sphere>, Octree) {
        let spheres = generation::showcase(5);
        let octree = Octree::from_objects(&spheres, &OctreeSettings::default()).unwrap();
        (spheres, octree)
    }

    /// Tree nodes in the order their flat counterparts are stored.
    fn breadth_first_order(octree: &Octree) -> Vec<NodeIdx> {
        let mut order = vec![Octree::root_index()];
        let mut i = 0;
        while i < order.len() {
            if let Some(children) = octree.node(order[i]).children() {
                order.extend(children.iter().copied());
            }
            i += 1;
        }
        order
    }

    #[test]
    fn node_layout() {
        assert!(std::mem::size_of::<FlatNode>() == 48);
        assert!(std::mem::align_of::<FlatNode>() == 4);
    }

    #[test]
    fn structure_matches_tree() {
        let (_, octree) = showcase_octree();
        let flat = octree.flatten();

        assert!(flat.nodes().len() == octree.nodes().len());
        assert!(flat.node_bytes().len() == flat.nodes().len() * 48);

        let order = breadth_first_order(&octree);
        for (flat_node, &index) in flat.nodes().iter().zip(&order) {
            let node = octree.node(index);
            assert!(flat_node.bounding_box() == node.bounding_box);
            assert!(flat_node.depth == node.depth);

            match &node.content {
                NodeContent::Inner { children } => {
                    assert!(flat_node.objects_offset == NO_OFFSET);
                    let first = flat_node.children_offset as usize;
                    for (i, child) in children.iter().enumerate() {
                        assert!(order[first + i] == *child);
                    }
                }
                NodeContent::Leaf { .. } => {
                    assert!(flat_node.is_leaf());
                    let expected: Vec<u32> = octree
                        .leaf_primitives(node)
                        .iter()
                        .map(|p| p.raw())
                        .collect();
                    let found = if flat_node.objects_offset == NO_OFFSET {
                        assert!(flat_node.object_count == 0);
                        &[][..]
                    } else {
                        let first = flat_node.objects_offset as usize;
                        &flat.primitive_indices()[first..first + flat_node.object_count as usize]
                    };
                    assert!(found == expected.as_slice());
                }
            }
        }
    }

    #[test]
    fn single_leaf() {
        let spheres = generation::debug_layout();
        let octree = Octree::from_objects(&spheres, &settings(0, 1)).unwrap();
        let flat = octree.flatten();

        let_assert!([root] = flat.nodes());
        assert!(root.is_leaf());
        assert!(root.objects_offset == 0);
        assert!(root.object_count == 3);
        assert!(flat.primitive_indices() == [0, 1, 2]);
    }

    #[test]
    fn empty_tree() {
        let octree = Octree::build(&[], &OctreeSettings::default()).unwrap();
        let flat = octree.flatten();

        let_assert!([root] = flat.nodes());
        assert!(root.objects_offset == NO_OFFSET);
        assert!(flat.primitive_indices().is_empty());

        let ray = Ray::new(WorldPoint::new(1.0, 2.0, 3.0), WorldVector::x());
        let spheres: [Sphere; 0] = [];
        assert!(flat.nearest_hit_in(&spheres, &ray, &mut TraversalStack::default()) == None);
    }

    #[proptest(cases = 64)]
    fn same_results_as_tree(origin: WorldPointWrapper, direction: NonzeroWorldVectorWrapper) {
        let (spheres, octree) = showcase_octree();
        let flat = octree.flatten();
        let ray = Ray::new(*origin, *direction);
        let mut stack = TraversalStack::default();

        assert!(
            flat.nearest_hit_in(&spheres, &ray, &mut stack)
                == octree.nearest_hit_in(&spheres, &ray, &mut stack)
        );
        assert!(
            flat.any_hit_in(&spheres, &ray, &mut stack)
                == octree.any_hit_in(&spheres, &ray, &mut stack)
        );
    }
}
