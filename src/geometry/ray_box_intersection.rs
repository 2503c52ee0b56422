use crate::geometry::{FloatType, Ray, WorldBox};

pub trait RayIntersectionExt {
    type DistanceType;
    /// Calculate first and last ray intersection with the box
    fn intersect(&self, ray: &Ray) -> Option<(Self::DistanceType, Self::DistanceType)>;
}

/// Relative amount by which entry may exceed exit and still count as a grazing hit.
pub const GRAZE_TOLERANCE: FloatType = 1e-5;

impl RayIntersectionExt for WorldBox {
    type DistanceType = FloatType;

    /// Slab test.
    /// Returns the entry and exit distance along the ray, t_enter <= t_exit and t_exit >= 0.
    /// t_enter is negative if the ray starts inside the box.
    /// None if the ray misses the box or the box is entirely behind the ray origin.
    ///
    /// Rays grazing an edge or a corner can get an entry slightly past the exit from rounding.
    /// Crossings within `GRAZE_TOLERANCE` (relative to the distances) still count as a hit,
    /// with both distances collapsed to their midpoint.
    fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType)> {
        let mut t_enter = FloatType::NEG_INFINITY;
        let mut t_exit = FloatType::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];

            if !ray.inv_direction[axis].is_finite() {
                // Parallel to the slab, the axis either doesn't constrain the ray at all,
                // or the ray never enters the slab.
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv_direction = ray.inv_direction[axis];
            let to_min = (self.min[axis] - origin) * inv_direction;
            let to_max = (self.max[axis] - origin) * inv_direction;

            t_enter = t_enter.max(to_min.min(to_max));
            t_exit = t_exit.min(to_min.max(to_max));
        }

        if t_enter > t_exit {
            let scale = t_enter.abs().max(t_exit.abs()).max(1.0);
            if t_enter - t_exit > GRAZE_TOLERANCE * scale {
                return None;
            }
            let t = (t_enter + t_exit) / 2.0;
            t_enter = t;
            t_exit = t;
        }

        if t_exit < 0.0 {
            None
        } else {
            Some((t_enter, t_exit))
        }
    }
}

#[cfg(test)]
pub mod test {
    use assert2::{assert, let_assert};
    use test_case::{test_case, test_matrix};
    use test_strategy::proptest;

    use super::*;

    use crate::geometry::{
        Ray, WorldBox, WorldPoint, WorldVector,
        test::{NonzeroWorldVectorWrapper, WorldBoxWrapper, WorldPointWrapper},
    };

    fn test_box() -> WorldBox {
        WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into())
    }

    /// Checks cases when the ray hits the box, including some corner cases.
    #[test_matrix(
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-10.0, -1.0, 0.0]
    )]
    fn hit(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            return;
        }

        let b = test_box();

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        let temp_r = Ray::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = Ray::new(origin, d);

        let_assert!(
            Some((t1, t2)) = b.intersect(&r),
            "The ray passes through a point of the box in front of its origin"
        );

        assert!(t1 <= t2);
        assert!(t2 >= 0.0);

        let p1 = r.point_at(t1);
        let p2 = r.point_at(t2);

        assert!(point_is_on_box_surface(&p1, &b), "{p1:?} must be in {b:?}");
        assert!(point_is_on_box_surface(&p2, &b), "{p2:?} must be in {b:?}");
    }

    /// Just a manual example of ray grazing along an edge.
    #[test]
    fn hit_along_edge() {
        let r = Ray::new(
            WorldPoint::new(5.0, 5.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        assert!(test_box().intersect(&r) == Some((5.0, 10.0)))
    }

    /// Origin computed by stepping back along the ray, the entry and exit distances
    /// at the edge cross by rounding.
    #[test]
    fn graze_through_edge_after_rounding() {
        let b = test_box();
        let d = WorldVector::new(-1.0, 2.0, 0.0);
        let origin = Ray::new(WorldPoint::new(5.0, 5.0, 7.0), d).point_at(-10.0);
        let r = Ray::new(origin, d);

        let_assert!(Some((t1, t2)) = b.intersect(&r));
        assert!(t1 <= t2);
        assert!((t1 - 10.0).abs() < 1e-3);
        assert!((t2 - 10.0).abs() < 1e-3);
    }

    #[test]
    fn clear_miss_is_not_a_graze() {
        // Passes the (5, 5) edge at a distance of about 2e-3
        let d = WorldVector::new(-1.0, 2.0, 0.0);
        let origin = Ray::new(WorldPoint::new(5.0 - 2e-3, 5.0, 7.0), d).point_at(-10.0);
        let r = Ray::new(origin, d);

        assert!(test_box().intersect(&r) == None);
    }

    /// Direction component too small to invert behaves as parallel to that slab.
    #[test]
    fn tiny_component_on_slab_plane() {
        let unit_box = WorldBox::new([0.0, 0.0, 0.0].into(), [1.0, 1.0, 1.0].into());
        let r = Ray::new(WorldPoint::new(-1.0, 0.0, 0.5), WorldVector::new(1.0, 1e-39, 0.0));

        assert!(unit_box.intersect(&r) == Some((1.0, 2.0)));
    }

    #[test]
    fn origin_inside_has_negative_entry() {
        let r = Ray::new(
            WorldPoint::new(7.0, 7.0, 7.0),
            WorldVector::new(1.0, 0.0, 0.0),
        );

        assert!(test_box().intersect(&r) == Some((-2.0, 3.0)))
    }

    /// Rays that lie parallel to one axis and start outside the corresponding slab
    /// must miss, even if they move toward the box on other axes or remain unchanged.
    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "low_x_parallel_miss")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "high_x_parallel_miss")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0 ; "low_y_parallel_miss")]
    #[test_case( 7.0, 12.0,  7.0,   1.0, 0.0, 0.0 ; "high_y_parallel_miss")]
    #[test_case( 7.0,  7.0,  0.0,   1.0, 0.0, 0.0 ; "low_z_parallel_miss")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0 ; "high_z_parallel_miss")]
    #[test_case( 0.0,  4.0,  7.0,   1.0, 0.0, 1.0 ; "corner_miss")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0 ; "corner_miss2")]
    #[test_case(12.0, 12.0, 12.0,   1.0, 1.0, 1.0 ; "box_behind")]
    #[test_case( 7.0,  7.0, 11.0,   0.0, 0.0, 1.0 ; "moving_away")]
    fn only_misses(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32) {
        let r = Ray::new(WorldPoint::new(px, py, pz), WorldVector::new(dx, dy, dz));

        assert!(test_box().intersect(&r) == None);
    }

    /// Any point strictly inside the box is hit by a ray aimed at it.
    /// Flat boxes are skipped, their entry and exit distances are allowed to cross by rounding.
    #[proptest]
    fn aimed_ray_hits(
        b: WorldBoxWrapper,
        origin: WorldPointWrapper,
        #[strategy(0.01f32..0.99)] u: f32,
        #[strategy(0.01f32..0.99)] v: f32,
        #[strategy(0.01f32..0.99)] w: f32,
    ) {
        let target = b.min + b.size().component_mul(&WorldVector::new(u, v, w));
        let ray = Ray::try_new(*origin, target - *origin);
        if let (true, Ok(r)) = (b.size().min() >= 0.1, ray) {
            let_assert!(Some((t1, t2)) = b.intersect(&r));
            let distance = (target - *origin).norm();
            assert!(t1 <= distance + 1e-3);
            assert!(t2 >= distance - 1e-3);
        }
    }

    /// Intersection interval from the slab test is consistent with point containment.
    #[proptest]
    fn interval_points_are_inside(
        b: WorldBoxWrapper,
        origin: WorldPointWrapper,
        direction: NonzeroWorldVectorWrapper,
    ) {
        let r = Ray::new(*origin, *direction);
        if let Some((t1, t2)) = b.intersect(&r) {
            let t = (t1.max(0.0) + t2) / 2.0;
            let p = r.point_at(t);
            let tolerance = 1e-3;
            let grown = WorldBox::new(
                b.min - WorldVector::repeat(tolerance),
                b.max + WorldVector::repeat(tolerance),
            );
            assert!(grown.contains_point(&p), "{p:?} must be in {:?}", *b);
        }
    }

    fn point_is_on_box_surface(p: &WorldPoint, b: &WorldBox) -> bool {
        const TOLERANCE: f32 = 1e-3;

        // Check if point is within the box's bounds (inclusive, with tolerance)
        let inside_x = p.x >= b.min.x - TOLERANCE && p.x <= b.max.x + TOLERANCE;
        let inside_y = p.y >= b.min.y - TOLERANCE && p.y <= b.max.y + TOLERANCE;
        let inside_z = p.z >= b.min.z - TOLERANCE && p.z <= b.max.z + TOLERANCE;

        if !(inside_x && inside_y && inside_z) {
            return false; // outside the box entirely
        }

        let on_x_face = (p.x - b.min.x).abs() <= TOLERANCE || (p.x - b.max.x).abs() <= TOLERANCE;
        let on_y_face = (p.y - b.min.y).abs() <= TOLERANCE || (p.y - b.max.y).abs() <= TOLERANCE;
        let on_z_face = (p.z - b.min.z).abs() <= TOLERANCE || (p.z - b.max.z).abs() <= TOLERANCE;

        on_x_face || on_y_face || on_z_face
    }
}
