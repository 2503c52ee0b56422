pub mod geometry;
pub mod octree;
pub mod scene;
mod util;
pub mod workload;

pub use geometry::{InvalidRay, Ray};
pub use octree::{BuildError, Octree, OctreeSettings};
pub use scene::{HitRecord, Object, PrimitiveIdx};
