use std::ops::{Add, Sub};

use nalgebra::{ClosedAddAssign, ClosedDivAssign, Point, Scalar};
use num_traits::One;

use super::{FloatType, WorldBox, WorldPoint};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn with_size<S>(min: Point, size: &S) -> AABB<Point>
    where
        for<'a> &'a Point: Add<&'a S, Output = Point>,
    {
        let max = &min + size;
        AABB { min, max }
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> AABB<Point2> {
        AABB {
            min: f(&self.min),
            max: f(&self.max),
        }
    }

    pub fn zip_map<Point2, Point3, F: FnMut(&Point, &Point2) -> Point3>(
        &self,
        rhs: &AABB<Point2>,
        mut f: F,
    ) -> AABB<Point3> {
        AABB {
            min: f(&self.min, &rhs.min),
            max: f(&self.max, &rhs.max),
        }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + ClosedAddAssign + ClosedDivAssign + One, const D: usize> AABB<Point<T, D>> {
    pub fn center(&self) -> Point<T, D> {
        let two = T::one() + T::one();
        let avg_coords = (&self.min.coords + &self.max.coords) / two;
        Point::from(avg_coords)
    }
}

impl WorldBox {
    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<WorldBox> {
        points
            .into_iter()
            .map(|p| WorldBox::new(*p, *p))
            .reduce(|a, b| a.union(&b))
    }

    /// Smallest box containing all the boxes, None if the iterator is empty.
    pub fn from_boxes<'a>(boxes: impl IntoIterator<Item = &'a WorldBox>) -> Option<WorldBox> {
        boxes.into_iter().cloned().reduce(|a, b| a.union(&b))
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        WorldBox::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Min <= max on every axis and all coordinates are finite.
    /// NaNs make this false.
    pub fn is_valid(&self) -> bool {
        self.min.iter().all(|x| x.is_finite())
            && self.max.iter().all(|x| x.is_finite())
            && self.min.iter().zip(self.max.iter()).all(|(a, b)| a <= b)
    }

    /// True if the box has positive extent along all three axes.
    pub fn has_volume(&self) -> bool {
        self.size().iter().all(|x| *x > 0.0)
    }

    pub fn volume(&self) -> FloatType {
        self.size().product()
    }

    pub fn contains_point(&self, p: &WorldPoint) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }

    /// Closed interval overlap test, boxes that only touch along a face, edge or corner
    /// are overlapping.
    pub fn overlaps(&self, other: &WorldBox) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }
}

impl<Point> From<[Point; 2]> for AABB<Point> {
    fn from(value: [Point; 2]) -> Self {
        let [min, max] = value;
        AABB { min, max }
    }
}

impl<Point> From<(Point, Point)> for AABB<Point> {
    fn from(value: (Point, Point)) -> Self {
        let (min, max) = value;
        AABB { min, max }
    }
}
