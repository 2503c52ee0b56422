pub mod generation;
pub mod primitives;

use crate::geometry::{FloatType, Ray, WorldBox};

index_vec::define_index_type! {
    /// Index of a primitive in the caller's primitive store.
    pub struct PrimitiveIdx = u32;
    IMPL_RAW_CONVERSIONS = true;
}

/// Intersectable primitive stored outside of the octree.
/// The octree only keeps indices into a slice of these.
pub trait Object {
    /// Distance along the ray to the closest intersection in front of the ray origin.
    fn intersect(&self, ray: &Ray) -> Option<FloatType>;

    /// Conservative bounds, must fully contain the object.
    fn get_bounding_box(&self) -> WorldBox;
}

impl<O: Object + ?Sized> Object for &O {
    fn intersect(&self, ray: &Ray) -> Option<FloatType> {
        (**self).intersect(ray)
    }

    fn get_bounding_box(&self) -> WorldBox {
        (**self).get_bounding_box()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HitRecord {
    pub primitive: PrimitiveIdx,
    pub distance: FloatType,
}

/// Reference nearest hit query, tests every object.
pub fn nearest_hit_linear<O: Object>(objects: &[O], ray: &Ray) -> Option<HitRecord> {
    objects
        .iter()
        .enumerate()
        .filter_map(|(i, o)| {
            o.intersect(ray).map(|distance| HitRecord {
                primitive: PrimitiveIdx::from_usize(i),
                distance,
            })
        })
        .fold(None, |best: Option<HitRecord>, hit| match best {
            Some(best) if best.distance <= hit.distance => Some(best),
            _ => Some(hit),
        })
}

/// Reference any hit query, tests objects until the first hit.
pub fn any_hit_linear<O: Object>(objects: &[O], ray: &Ray) -> bool {
    objects.iter().any(|o| o.intersect(ray).is_some())
}
