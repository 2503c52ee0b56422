mod building;
mod flattening;
mod octant;
mod printing;
mod ray_octree_intersection;
mod traversal_order;

use std::{num::NonZeroUsize, ops::Range};

use bon::bon;
use index_vec::IndexVec;

use crate::{
    geometry::{WorldBox, WorldPoint},
    scene::PrimitiveIdx,
};

pub use building::BuildError;
pub use flattening::{FlatNode, FlatOctree};
pub use octant::Octant;
pub use printing::OctreeStatistics;
pub use ray_octree_intersection::{
    TraversalCounters, TraversalOptions, TraversalStack, TraversalStatistics,
};
pub use traversal_order::TraversalOrder;

/// Octree over primitive bounding boxes.
///
/// Nodes are stored in an arena, the root is always the first node. Leaves reference
/// ranges of a shared primitive reference list. A primitive that overlaps several leaves
/// is referenced from each of them.
#[derive(Clone, Debug)]
pub struct Octree {
    nodes: IndexVec<NodeIdx, Node>,
    primitive_references: Vec<PrimitiveIdx>,
    primitive_count: usize,
    excluded_primitives: usize,
    settings: OctreeSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub bounding_box: WorldBox,
    pub depth: u32,
    pub content: NodeContent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeContent {
    /// Range in the octree's primitive reference list
    Leaf { primitives: Range<usize> },
    /// Children indexed by octant code
    Inner { children: [NodeIdx; Octant::COUNT] },
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

/// Build time limits of the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OctreeSettings {
    /// Nodes at this depth are always leaves. Zero makes the whole tree a single leaf.
    pub max_depth: u32,
    /// Nodes with at most this many primitives are not subdivided further.
    pub max_primitives_per_leaf: NonZeroUsize,
}

pub const DEFAULT_MAX_DEPTH: u32 = 8;
pub const DEFAULT_MAX_PRIMITIVES_PER_LEAF: NonZeroUsize = NonZeroUsize::new(4).unwrap();

#[bon]
impl OctreeSettings {
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_DEPTH)] max_depth: u32,
        #[builder(default = DEFAULT_MAX_PRIMITIVES_PER_LEAF)]
        max_primitives_per_leaf: NonZeroUsize,
    ) -> Self {
        OctreeSettings {
            max_depth,
            max_primitives_per_leaf,
        }
    }
}

impl Default for OctreeSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Octree {
    pub fn root_index() -> NodeIdx {
        NodeIdx::from_usize(0)
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::root_index()]
    }

    pub fn bounding_box(&self) -> &WorldBox {
        &self.root().bounding_box
    }

    pub fn node(&self, index: NodeIdx) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &IndexVec<NodeIdx, Node> {
        &self.nodes
    }

    pub fn settings(&self) -> &OctreeSettings {
        &self.settings
    }

    /// Number of primitives the tree was built from, including excluded ones.
    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    /// Primitives left out because they were outside of the caller supplied world box.
    pub fn excluded_primitives(&self) -> usize {
        self.excluded_primitives
    }

    /// Primitive references of a leaf node, empty slice for inner nodes.
    pub fn leaf_primitives(&self, node: &Node) -> &[PrimitiveIdx] {
        match &node.content {
            NodeContent::Leaf { primitives } => &self.primitive_references[primitives.clone()],
            NodeContent::Inner { .. } => &[],
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// Leaf containing the point, None if the point is outside of the tree.
    /// Points on a split plane resolve to the upper octant.
    pub fn find_leaf(&self, point: &WorldPoint) -> Option<NodeIdx> {
        if !self.bounding_box().contains_point(point) {
            return None;
        }

        let mut index = Self::root_index();
        loop {
            let node = &self.nodes[index];
            match &node.content {
                NodeContent::Leaf { .. } => return Some(index),
                NodeContent::Inner { children } => {
                    let octant = Octant::containing(&node.bounding_box.center(), point);
                    index = children[octant.index()];
                }
            }
        }
    }
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf { .. })
    }

    pub fn children(&self) -> Option<&[NodeIdx; Octant::COUNT]> {
        match &self.content {
            NodeContent::Leaf { .. } => None,
            NodeContent::Inner { children } => Some(children),
        }
    }
}
