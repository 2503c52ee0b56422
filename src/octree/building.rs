use std::{array, time::Instant};

use index_vec::IndexVec;
use log::{debug, warn};
use thiserror::Error;

use crate::{
    geometry::WorldBox,
    scene::{Object, PrimitiveIdx},
};

use super::{Node, NodeContent, NodeIdx, Octant, Octree, OctreeSettings};

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Primitive {primitive:?} has an invalid bounding box (min > max or non-finite)")]
    InvalidBound { primitive: PrimitiveIdx },

    #[error("Root bounding box has zero extent along some axis")]
    DegenerateRoot,
}

impl Octree {
    /// Builds the tree over the objects' bounding boxes.
    /// Primitive indices in the tree are indices into `objects`.
    pub fn from_objects<O: Object>(
        objects: &[O],
        settings: &OctreeSettings,
    ) -> Result<Octree, BuildError> {
        let boxes: Vec<WorldBox> = objects.iter().map(|o| o.get_bounding_box()).collect();
        Self::build(&boxes, settings)
    }

    /// Builds the tree, root box is the union of all primitive boxes.
    pub fn build(
        primitive_boxes: &[WorldBox],
        settings: &OctreeSettings,
    ) -> Result<Octree, BuildError> {
        validate_primitive_boxes(primitive_boxes)?;

        let root_box = WorldBox::from_boxes(primitive_boxes).unwrap_or_default();
        if !primitive_boxes.is_empty() && !root_box.has_volume() {
            return Err(BuildError::DegenerateRoot);
        }

        let references = (0..primitive_boxes.len())
            .map(PrimitiveIdx::from_usize)
            .collect();

        Ok(Self::build_from_references(
            primitive_boxes,
            references,
            root_box,
            settings,
        ))
    }

    /// Builds the tree with a caller supplied root box.
    /// Primitives that don't overlap the world box are left out of the tree.
    pub fn build_within(
        world_box: &WorldBox,
        primitive_boxes: &[WorldBox],
        settings: &OctreeSettings,
    ) -> Result<Octree, BuildError> {
        validate_primitive_boxes(primitive_boxes)?;

        if !world_box.is_valid() || (!primitive_boxes.is_empty() && !world_box.has_volume()) {
            return Err(BuildError::DegenerateRoot);
        }

        let references: Vec<PrimitiveIdx> = primitive_boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.overlaps(world_box))
            .map(|(i, _)| PrimitiveIdx::from_usize(i))
            .collect();

        let excluded = primitive_boxes.len() - references.len();
        if excluded > 0 {
            warn!("{excluded} primitives are outside of the world box and won't be indexed");
        }

        let mut octree =
            Self::build_from_references(primitive_boxes, references, *world_box, settings);
        octree.excluded_primitives = excluded;
        Ok(octree)
    }

    fn build_from_references(
        primitive_boxes: &[WorldBox],
        references: Vec<PrimitiveIdx>,
        root_box: WorldBox,
        settings: &OctreeSettings,
    ) -> Octree {
        let start = Instant::now();

        let mut octree = Octree {
            nodes: IndexVec::new(),
            primitive_references: Vec::new(),
            primitive_count: primitive_boxes.len(),
            excluded_primitives: 0,
            settings: *settings,
        };

        let root = octree.build_recursive(primitive_boxes, references, root_box, 0);
        assert2::debug_assert!(root == Octree::root_index());

        debug!(
            "Built octree over {} primitives in {:?}: {} nodes, {} primitive references",
            primitive_boxes.len(),
            start.elapsed(),
            octree.nodes.len(),
            octree.primitive_references.len(),
        );

        octree
    }

    fn build_recursive(
        &mut self,
        primitive_boxes: &[WorldBox],
        references: Vec<PrimitiveIdx>,
        enclosing_box: WorldBox,
        depth: u32,
    ) -> NodeIdx {
        if depth >= self.settings.max_depth
            || references.len() <= self.settings.max_primitives_per_leaf.get()
        {
            self.build_leaf(&references, enclosing_box, depth)
        } else {
            self.build_inner_node(primitive_boxes, references, enclosing_box, depth)
        }
    }

    fn build_inner_node(
        &mut self,
        primitive_boxes: &[WorldBox],
        references: Vec<PrimitiveIdx>,
        enclosing_box: WorldBox,
        depth: u32,
    ) -> NodeIdx {
        // Create placeholder node that will be overwriten later
        let node_index = self.nodes.push(Node {
            bounding_box: enclosing_box,
            depth,
            content: NodeContent::Leaf { primitives: 0..0 },
        });

        let child_boxes: [WorldBox; Octant::COUNT] =
            array::from_fn(|i| Octant::new(i as u8).child_box(&enclosing_box));

        // Straddling primitives go to every child they overlap
        let mut child_references: [Vec<PrimitiveIdx>; Octant::COUNT] = array::from_fn(|i| {
            references
                .iter()
                .copied()
                .filter(|p| primitive_boxes[p.index()].overlaps(&child_boxes[i]))
                .collect()
        });
        drop(references);

        let children = array::from_fn(|i| {
            let references = std::mem::take(&mut child_references[i]);
            self.build_recursive(primitive_boxes, references, child_boxes[i], depth + 1)
        });

        // Replace the placeholder with an actual inner node
        self.nodes[node_index].content = NodeContent::Inner { children };

        node_index
    }

    fn build_leaf(
        &mut self,
        references: &[PrimitiveIdx],
        enclosing_box: WorldBox,
        depth: u32,
    ) -> NodeIdx {
        let first = self.primitive_references.len();
        self.primitive_references.extend_from_slice(references);

        self.nodes.push(Node {
            bounding_box: enclosing_box,
            depth,
            content: NodeContent::Leaf {
                primitives: first..self.primitive_references.len(),
            },
        })
    }
}

fn validate_primitive_boxes(primitive_boxes: &[WorldBox]) -> Result<(), BuildError> {
    match primitive_boxes.iter().position(|b| !b.is_valid()) {
        Some(i) => Err(BuildError::InvalidBound {
            primitive: PrimitiveIdx::from_usize(i),
        }),
        None => Ok(()),
    }
}
