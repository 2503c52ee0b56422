use crate::geometry::{WorldBox, WorldPoint};

/// One of the eight children of a node.
///
/// The 3 bit code has bit 2 for the upper Z half, bit 1 for the upper X half and
/// bit 0 for the upper Y half. Building, traversal and flattening all go through this type,
/// so the convention lives only here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Octant(u8);

impl Octant {
    pub const COUNT: usize = 8;

    /// Bit of the octant code for each of the x, y, z axes.
    pub const AXIS_BITS: [u8; 3] = [0b010, 0b001, 0b100];

    /// Panics if the code is out of range.
    pub fn new(code: u8) -> Octant {
        assert!((code as usize) < Self::COUNT, "Octant code {code} out of range");
        Octant(code)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl DoubleEndedIterator<Item = Octant> + ExactSizeIterator {
        (0..Self::COUNT as u8).map(Octant)
    }

    /// Is this octant in the upper half along the given axis (0 = x, 1 = y, 2 = z)?
    pub fn is_upper(self, axis: usize) -> bool {
        self.0 & Self::AXIS_BITS[axis] != 0
    }

    /// Octant of a parent split at `center` that contains the point.
    /// Points on a split plane go to the upper half.
    pub fn containing(center: &WorldPoint, point: &WorldPoint) -> Octant {
        Octant(
            (0..3)
                .filter(|&axis| point[axis] >= center[axis])
                .map(|axis| Self::AXIS_BITS[axis])
                .fold(0, |acc, bit| acc | bit),
        )
    }

    /// Box of this octant when splitting the parent at its center.
    pub fn child_box(self, parent: &WorldBox) -> WorldBox {
        let center = parent.center();
        let mut child = *parent;

        for axis in 0..3 {
            if self.is_upper(axis) {
                child.min[axis] = center[axis];
            } else {
                child.max[axis] = center[axis];
            }
        }

        child
    }
}
