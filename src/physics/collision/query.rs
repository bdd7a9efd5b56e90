//! Intersection queries for points and rays vs. colliders.

use super::{Collider, ColliderShape, Ray};
use crate::math::{self as m, Unit};
use crate::physics::BodyKey;

/// A body hit by a raycast.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub body: BodyKey,
    /// Distance along the ray to the hit point.
    pub t: f64,
    pub point: m::Vec2,
    /// Surface normal at the hit point, facing towards the ray's origin.
    /// If the ray starts inside the shape, this is the reverse of the ray direction.
    pub normal: Unit<m::Vec2>,
}

/// Lines have no thickness, so queries treat them as thin rects
/// as wide as the configured point size.
fn thickened(coll: &Collider, point_size: f64) -> Collider {
    match coll.shape {
        ColliderShape::Line { hl } if point_size > 0.0 => Collider {
            shape: ColliderShape::Rect {
                hw: hl,
                hh: point_size / 2.0,
            },
            pose: coll.pose,
        },
        _ => *coll,
    }
}

/// Check whether or not a point intersects with a collider at the given world pose.
pub fn point_collider_bool(
    point: m::Vec2,
    pose: &m::Pose,
    coll: &Collider,
    point_size: f64,
) -> bool {
    let coll = thickened(coll, point_size);
    if coll.is_degenerate() {
        return false;
    }
    match coll.shape {
        ColliderShape::Circle { r } => (point - pose.translation).mag_sq() <= r * r,
        ColliderShape::Rect { hw, hh } => {
            let p_wrt_c = pose.inversed().transform_vec(point);
            p_wrt_c.x.abs() <= hw && p_wrt_c.y.abs() <= hh
        }
        _ => match coll.polygon(pose) {
            Some(poly) => {
                (0..poly.len()).all(|i| poly.normal(i).dot(point - poly.vert(i)) <= 0.0)
            }
            None => false,
        },
    }
}

/// Find the first point where a ray hits a collider at the given world pose.
///
/// Returns the distance along the ray and the surface normal.
pub fn ray_collider(
    ray: &Ray,
    pose: &m::Pose,
    coll: &Collider,
    point_size: f64,
) -> Option<(f64, Unit<m::Vec2>)> {
    let coll = thickened(coll, point_size);
    if coll.is_degenerate() {
        return None;
    }
    match coll.shape {
        ColliderShape::Circle { r } => ray_circle(ray, pose.translation, r),
        _ => ray_polygon(ray, &coll, pose),
    }
}

fn ray_circle(ray: &Ray, center: m::Vec2, r: f64) -> Option<(f64, Unit<m::Vec2>)> {
    let to_start = ray.start - center;
    let b = to_start.dot(*ray.dir);
    let c = to_start.mag_sq() - r * r;
    if c <= 0.0 {
        // starts inside
        return Some((0.0, -ray.dir));
    }
    if b > 0.0 {
        // pointing away
        return None;
    }
    let discr = b * b - c;
    if discr < 0.0 {
        return None;
    }
    let t = -b - discr.sqrt();
    if t > ray.length {
        return None;
    }
    let normal = Unit::try_new(ray.point_at(t) - center).unwrap_or(-ray.dir);
    Some((t, normal))
}

/// Cyrus-Beck clipping of the ray against the polygon's edge planes.
fn ray_polygon(ray: &Ray, coll: &Collider, pose: &m::Pose) -> Option<(f64, Unit<m::Vec2>)> {
    let poly = coll.polygon(pose)?;
    let mut lower = 0.0;
    let mut upper = ray.length;
    let mut entry_edge = None;
    for i in 0..poly.len() {
        let normal = poly.normal(i);
        let numerator = normal.dot(poly.vert(i) - ray.start);
        let denominator = normal.dot(*ray.dir);
        if denominator == 0.0 {
            if numerator < 0.0 {
                // parallel to and outside of this edge
                return None;
            }
        } else if denominator < 0.0 && numerator < lower * denominator {
            lower = numerator / denominator;
            entry_edge = Some(i);
        } else if denominator > 0.0 && numerator < upper * denominator {
            upper = numerator / denominator;
        }
        if upper < lower {
            return None;
        }
    }
    let normal = match entry_edge {
        Some(i) => Unit::new_unchecked(poly.normal(i)),
        None => -ray.dir,
    };
    Some((lower, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PoseBuilder;

    #[test]
    fn point_in_shapes() {
        let pose = PoseBuilder::new().with_position([1.0, 1.0]).build();
        let rect = Collider::new_rect(2.0, 1.0);
        assert!(point_collider_bool(m::Vec2::new(1.9, 1.4), &pose, &rect, 0.0));
        assert!(!point_collider_bool(m::Vec2::new(1.9, 1.6), &pose, &rect, 0.0));

        let tri = Collider::new_triangle(
            m::Vec2::new(0.0, 0.0),
            m::Vec2::new(2.0, 0.0),
            m::Vec2::new(0.0, 2.0),
        );
        let origin = m::Pose::identity();
        // centroid is at the origin after recentering
        assert!(point_collider_bool(m::Vec2::zero(), &origin, &tri, 0.0));
        assert!(!point_collider_bool(m::Vec2::new(1.0, 1.0), &origin, &tri, 0.0));

        let line = Collider::new_line(4.0);
        assert!(!point_collider_bool(m::Vec2::new(0.5, 0.05), &origin, &line, 0.0));
        assert!(point_collider_bool(m::Vec2::new(0.5, 0.05), &origin, &line, 0.2));
    }

    #[test]
    fn rays_vs_shapes() {
        let ray = Ray::between(m::Vec2::new(-10.0, 0.0), m::Vec2::new(10.0, 0.0)).unwrap();
        let origin = m::Pose::identity();

        let (t, normal) = ray_collider(&ray, &origin, &Collider::new_square(2.0), 0.0).unwrap();
        assert!((t - 9.0).abs() < 1e-9);
        assert!((normal.x + 1.0).abs() < 1e-9);

        let (t, normal) = ray_collider(&ray, &origin, &Collider::new_circle(1.0), 0.0).unwrap();
        assert!((t - 9.0).abs() < 1e-9);
        assert!((normal.x + 1.0).abs() < 1e-9);

        let missing = Ray::between(m::Vec2::new(-10.0, 5.0), m::Vec2::new(10.0, 5.0)).unwrap();
        assert!(ray_collider(&missing, &origin, &Collider::new_square(2.0), 0.0).is_none());
        assert!(ray_collider(&missing, &origin, &Collider::new_circle(1.0), 0.0).is_none());

        // lines are hit at their thickened surface
        let wall = Collider::new_line(4.0).with_pose(
            PoseBuilder::new().with_rotation(m::Angle::Deg(90.0)),
        );
        let (t, _) = ray_collider(&ray, &wall.pose, &wall, 0.1).unwrap();
        assert!((t - 9.95).abs() < 1e-9);
        let wall_pose = wall.pose;
        let inside = Ray::new(m::Vec2::zero(), m::Vec2::unit_x(), 1.0).unwrap();
        let (t, normal) = ray_collider(&inside, &wall_pose, &Collider::new_square(1.0), 0.0).unwrap();
        assert_eq!(t, 0.0);
        assert!((normal.x + 1.0).abs() < 1e-9);
    }
}
