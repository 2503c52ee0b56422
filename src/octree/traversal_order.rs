use std::array;

use crate::geometry::WorldVector;

use super::Octant;

/// Front to back visiting order of the eight children of any node, for a single ray direction.
///
/// Along an axis where the ray moves towards negative coordinates, the upper half is entered
/// first, so the octant bit of that axis gets flipped. Enumerating the flipped codes 0..8 in
/// increasing order gives the nearest first order. Only the direction signs matter,
/// so one order serves every inner node along the ray. Zero components count as positive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraversalOrder {
    flip_mask: u8,
}

impl TraversalOrder {
    pub fn for_direction(direction: &WorldVector) -> TraversalOrder {
        let flip_mask = (0..3)
            .filter(|&axis| direction[axis] < 0.0)
            .map(|axis| Octant::AXIS_BITS[axis])
            .fold(0, |acc, bit| acc | bit);

        TraversalOrder { flip_mask }
    }

    /// Octant bits that are flipped relative to the increasing code order.
    pub fn flip_mask(&self) -> u8 {
        self.flip_mask
    }

    /// Octant visited at the given position, 0 is the nearest.
    pub fn octant_at(&self, position: usize) -> Octant {
        Octant::new(position as u8 ^ self.flip_mask)
    }

    pub fn order(&self) -> [Octant; Octant::COUNT] {
        array::from_fn(|position| self.octant_at(position))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Octant> + ExactSizeIterator {
        let order = *self;
        (0..Octant::COUNT).map(move |position| order.octant_at(position))
    }
}
