use std::fmt::Display;

use crate::util::Stats;

use super::{NodeContent, NodeIdx, Octree};

#[derive(Clone, Debug, PartialEq)]
pub struct OctreeStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    pub empty_leaf_count: usize,
    /// Depth of leaf nodes
    pub leaf_depth: Stats,
    /// Primitive references per non-empty leaf
    pub leaf_fill: Stats,
    pub primitive_count: usize,
    pub excluded_primitives: usize,
    pub primitive_references: usize,
}

impl OctreeStatistics {
    /// Average number of leaves referencing each indexed primitive.
    pub fn duplication_factor(&self) -> f32 {
        let indexed = self.primitive_count - self.excluded_primitives;
        if indexed == 0 {
            0.0
        } else {
            self.primitive_references as f32 / indexed as f32
        }
    }
}

impl Display for OctreeStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Nodes: {} ({} leaves, {} empty)",
            self.node_count, self.leaf_count, self.empty_leaf_count
        )?;
        writeln!(f, "Leaf depth: {}", self.leaf_depth)?;
        writeln!(f, "Leaf fill: {}", self.leaf_fill)?;
        write!(
            f,
            "Primitives: {} ({} excluded), {} references, duplication {:.2}",
            self.primitive_count,
            self.excluded_primitives,
            self.primitive_references,
            self.duplication_factor()
        )
    }
}

impl Octree {
    pub fn statistics(&self) -> OctreeStatistics {
        let leaf_depth: Stats = self.leaves().map(|leaf| leaf.depth as usize).collect();
        let fills = self
            .leaves()
            .map(|leaf| self.leaf_primitives(leaf).len())
            .collect::<Vec<_>>();
        let empty_leaf_count = fills.iter().filter(|&&fill| fill == 0).count();
        let leaf_fill: Stats = fills.into_iter().filter(|&fill| fill > 0).collect();

        OctreeStatistics {
            node_count: self.nodes.len(),
            leaf_count: leaf_depth.count,
            empty_leaf_count,
            leaf_depth,
            leaf_fill,
            primitive_count: self.primitive_count,
            excluded_primitives: self.excluded_primitives,
            primitive_references: self.primitive_references.len(),
        }
    }

    pub fn print_statistics(&self) {
        println!("{}", self.statistics());
    }

    pub fn print_tree(&self) {
        self.print_recursive(0, Octree::root_index());
    }

    fn print_recursive(&self, indent: usize, index: NodeIdx) {
        let node = &self.nodes[index];
        println!(
            "{}- {}{}: {:?}-{:?}",
            "  ".repeat(indent),
            if node.is_leaf() { "L" } else { "I" },
            index.index(),
            node.bounding_box.min,
            node.bounding_box.max,
        );

        match &node.content {
            NodeContent::Leaf { .. } => {
                let primitives = self.leaf_primitives(node);
                if !primitives.is_empty() {
                    println!("{}{:?}", "  ".repeat(indent + 1), primitives);
                }
            }
            NodeContent::Inner { children } => {
                for child in children {
                    self.print_recursive(indent + 1, *child);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        geometry::WorldBox,
        octree::OctreeSettings,
        scene::{Object as _, generation, primitives::Sphere},
    };
    use assert2::assert;

    #[test]
    fn single_leaf_statistics() {
        let spheres = generation::debug_layout();
        let settings = OctreeSettings::builder().max_depth(0).build();
        let statistics = Octree::from_objects(&spheres, &settings)
            .unwrap()
            .statistics();

        assert!(statistics.node_count == 1);
        assert!(statistics.leaf_count == 1);
        assert!(statistics.empty_leaf_count == 0);
        assert!(statistics.leaf_fill == Stats::from_iter([3]));
        assert!(statistics.leaf_depth == Stats::from_iter([0]));
        assert!(statistics.duplication_factor() == 1.0);
    }

    #[test]
    fn straddling_sphere_is_counted_in_every_leaf() {
        // One sphere across the root center, one per leaf forces a split
        let spheres = [
            Sphere::new([0.0, 0.0, 0.0].into(), 0.5),
            Sphere::new([1.5, 1.5, 1.5].into(), 0.1),
        ];
        let world = WorldBox::new([-2.0, -2.0, -2.0].into(), [2.0, 2.0, 2.0].into());
        let boxes = spheres.map(|s| s.get_bounding_box());
        let settings = OctreeSettings::builder()
            .max_depth(1)
            .max_primitives_per_leaf(NonZeroUsize::new(1).unwrap())
            .build();
        let statistics = Octree::build_within(&world, &boxes, &settings)
            .unwrap()
            .statistics();

        assert!(statistics.node_count == 9);
        assert!(statistics.leaf_count == 8);
        assert!(statistics.empty_leaf_count == 0);
        assert!(statistics.primitive_references == 9);
        assert!(statistics.duplication_factor() == 4.5);
        assert!(statistics.leaf_depth.min == 1);
        assert!(statistics.leaf_depth.max == 1);
    }

    #[test]
    fn display() {
        let spheres = generation::showcase(1);
        let octree = Octree::from_objects(&spheres, &OctreeSettings::default()).unwrap();
        let output = octree.statistics().to_string();

        assert!(output.contains("Nodes: "));
        assert!(output.contains("85 (0 excluded)"));
    }
}
