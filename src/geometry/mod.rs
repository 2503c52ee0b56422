mod aabb;
mod ray_box_intersection;

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;

use thiserror::Error;

pub type FloatType = f32;

pub type WorldPoint = nalgebra::Point3<FloatType>;
pub type WorldVector = nalgebra::Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidRay {
    #[error("Ray origin has a non-finite component")]
    NonFiniteOrigin,

    #[error("Ray direction has a non-finite component")]
    NonFiniteDirection,

    #[error("Ray direction is zero")]
    ZeroDirection,
}

impl Ray {
    /// Shorthand for tests with known good input, panics if the ray is not usable.
    #[cfg(test)]
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        Self::try_new(origin, direction).expect("Ray must be finite with a non-zero direction")
    }

    /// Validates and creates a ray. This is the only place where NaNs and infinities are
    /// filtered out, everything downstream (box tests, octree traversal) assumes finite input.
    pub fn try_new(origin: WorldPoint, direction: WorldVector) -> Result<Ray, InvalidRay> {
        if !origin.iter().all(|x| x.is_finite()) {
            return Err(InvalidRay::NonFiniteOrigin);
        }
        if !direction.iter().all(|x| x.is_finite()) {
            return Err(InvalidRay::NonFiniteDirection);
        }

        // Scale to the largest component first, so that the norm can neither overflow
        // for huge directions nor underflow for tiny ones.
        let largest = direction.amax();
        if largest == 0.0 {
            return Err(InvalidRay::ZeroDirection);
        }
        let direction = direction / largest;
        let direction = direction / direction.norm();

        // Components too small to invert count as zero, the ray is parallel to that slab
        let inv_direction = direction.map(|x| {
            let inverse = 1.0 / x;
            if inverse.is_finite() {
                inverse
            } else {
                FloatType::INFINITY
            }
        });
        let direction = direction.zip_map(&inv_direction, |x, inverse| {
            if inverse.is_finite() { x } else { 0.0 }
        });

        Ok(Ray {
            origin,
            direction,
            inv_direction,
        })
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}
