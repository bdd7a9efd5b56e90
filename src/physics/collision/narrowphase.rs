//! Exact intersection tests between pairs of colliders.
//!
//! Polygons (rects, triangles and lines) are tested with the separating axis theorem
//! and get up to two contact points from clipping the incident edge against
//! the reference edge. Circles are tested by distance.

use super::collider::{Collider, ColliderShape, Polygon};
use crate::math::{self as m, Pose, Unit};
use crate::physics::BodyKey;

/// Tolerance used to prefer the first polygon's edge as the reference edge
/// so that contacts don't flip between the two bodies on consecutive frames.
const REFERENCE_EDGE_TOLERANCE: f64 = 0.0005;

/// 0-2 points of contact can occur between two 2D objects.
#[derive(Clone, Copy, Debug)]
pub enum ContactResult {
    Zero,
    One(Contact),
    Two(Contact, Contact),
}

impl ContactResult {
    pub fn iter(&self) -> ContactIterator<'_> {
        ContactIterator { cr: self, idx: 0 }
    }

    /// Execute a function on every contact in the result.
    pub fn map(self, f: impl Fn(Contact) -> Contact) -> Self {
        match self {
            ContactResult::Zero => ContactResult::Zero,
            ContactResult::One(c) => ContactResult::One(f(c)),
            ContactResult::Two(c1, c2) => ContactResult::Two(f(c1), f(c2)),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, ContactResult::Zero)
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            ContactResult::Zero => 0,
            ContactResult::One(_) => 1,
            ContactResult::Two(_, _) => 2,
        }
    }
}

/// An iterator over the contacts in a ContactResult.
pub struct ContactIterator<'a> {
    cr: &'a ContactResult,
    idx: u8,
}
impl<'a> Iterator for ContactIterator<'a> {
    type Item = &'a Contact;

    fn next(&mut self) -> Option<Self::Item> {
        self.idx += 1;
        use ContactResult::*;
        match (self.cr, self.idx - 1) {
            (Zero, _) => None,
            (One(c), 0) => Some(c),
            (One(_), _) => None,
            (Two(c1, _), 0) => Some(c1),
            (Two(_, c2), 1) => Some(c2),
            (Two(_, _), _) => None,
        }
    }
}

/// A point where two objects intersect.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    /// The normal, facing away from the first object.
    pub normal: Unit<m::Vec2>,
    /// Penetration depth along the normal.
    pub depth: f64,
    /// World-space point halfway between the two surfaces.
    pub point: m::Vec2,
}

/// Contact information for a colliding pair of bodies.
#[derive(Clone, Copy, Debug)]
pub struct Manifold {
    pub bodies: [BodyKey; 2],
    /// Contacts with normals pointing from `bodies[0]` to `bodies[1]`.
    pub contacts: ContactResult,
}

impl Manifold {
    /// The shared normal of the contacts. `None` if there are no contacts.
    pub fn normal(&self) -> Option<Unit<m::Vec2>> {
        self.contacts.iter().next().map(|c| c.normal)
    }

    /// The deepest penetration among the contacts, zero if there are none.
    pub fn depth(&self) -> f64 {
        self.contacts.iter().fold(0.0, |acc, c| acc.max(c.depth))
    }
}

/// Checks two colliders at the given world-space poses for intersection.
pub fn intersection_check(
    pose1: &Pose,
    coll1: &Collider,
    pose2: &Pose,
    coll2: &Collider,
) -> ContactResult {
    if coll1.is_degenerate() || coll2.is_degenerate() {
        return ContactResult::Zero;
    }

    use ColliderShape::*;
    match (coll1.shape, coll2.shape) {
        (Circle { r: r1 }, Circle { r: r2 }) => circle_circle(pose1, r1, pose2, r2),
        // two infinitely thin lines have no meaningful overlap
        (Line { .. }, Line { .. }) => ContactResult::Zero,
        (Circle { r }, _) => match coll2.polygon(pose2) {
            Some(poly) => flip_contacts(polygon_circle(&poly, pose1.translation, r)),
            None => ContactResult::Zero,
        },
        (_, Circle { r }) => match coll1.polygon(pose1) {
            Some(poly) => polygon_circle(&poly, pose2.translation, r),
            None => ContactResult::Zero,
        },
        _ => match (coll1.polygon(pose1), coll2.polygon(pose2)) {
            (Some(poly1), Some(poly2)) => polygon_polygon(&poly1, &poly2),
            _ => ContactResult::Zero,
        },
    }
}

fn flip_contacts(contacts: ContactResult) -> ContactResult {
    contacts.map(|c| Contact {
        normal: -c.normal,
        ..c
    })
}

//
// CIRCLE <-> CIRCLE
//

fn circle_circle(pose1: &Pose, r1: f64, pose2: &Pose, r2: f64) -> ContactResult {
    let pos1 = pose1.translation;
    let pos2 = pose2.translation;

    let dist = pos2 - pos1;
    let dist_sq = dist.mag_sq();
    let r_sum = r1 + r2;

    let (normal, depth) = if dist_sq < 0.001 {
        // same position, consider penetration to be on x axis
        (Unit::unit_x(), r_sum - dist_sq.sqrt())
    } else if dist_sq < r_sum * r_sum {
        // typical collision
        let dist_mag = dist_sq.sqrt();
        (Unit::new_unchecked(dist / dist_mag), r_sum - dist_mag)
    } else {
        return ContactResult::Zero;
    };

    ContactResult::One(Contact {
        normal,
        depth,
        point: pos1 + *normal * (r1 - depth / 2.0),
    })
}

//
// POLYGON <-> CIRCLE
//

fn polygon_circle(poly: &Polygon, center: m::Vec2, r: f64) -> ContactResult {
    // find the edge the circle center is farthest outside of
    let mut best_edge = 0;
    let mut best_sep = f64::MIN;
    for i in 0..poly.len() {
        let sep = poly.normal(i).dot(center - poly.vert(i));
        if sep > r {
            return ContactResult::Zero;
        }
        if sep > best_sep {
            best_sep = sep;
            best_edge = i;
        }
    }

    let v1 = poly.vert(best_edge);
    let v2 = poly.vert(best_edge + 1);
    let face_normal = poly.normal(best_edge);

    let contact = |normal: m::Vec2, depth: f64| {
        ContactResult::One(Contact {
            normal: Unit::new_unchecked(normal),
            depth,
            point: center - normal * (r - depth / 2.0),
        })
    };

    if best_sep < f64::EPSILON {
        // center is inside the polygon
        return contact(face_normal, r - best_sep);
    }

    // check which voronoi region of the edge the center is in
    let u1 = (center - v1).dot(v2 - v1);
    let u2 = (center - v2).dot(v1 - v2);
    let corner = if u1 <= 0.0 {
        Some(v1)
    } else if u2 <= 0.0 {
        Some(v2)
    } else {
        None
    };
    match corner {
        Some(v) => {
            let to_center = center - v;
            let dist_sq = to_center.mag_sq();
            if dist_sq > r * r {
                return ContactResult::Zero;
            }
            let dist = dist_sq.sqrt();
            let normal = if dist > f64::EPSILON {
                to_center / dist
            } else {
                face_normal
            };
            contact(normal, r - dist)
        }
        None => contact(face_normal, r - best_sep),
    }
}

//
// POLYGON <-> POLYGON
//

/// Find the edge of `poly1` with the largest separation from `poly2`.
fn max_separation(poly1: &Polygon, poly2: &Polygon) -> (usize, f64) {
    let mut best_edge = 0;
    let mut best_sep = f64::MIN;
    for i in 0..poly1.len() {
        let n = poly1.normal(i);
        let v = poly1.vert(i);
        let sep = poly2
            .verts()
            .iter()
            .map(|v2| n.dot(*v2 - v))
            .fold(f64::MAX, f64::min);
        if sep > best_sep {
            best_sep = sep;
            best_edge = i;
        }
    }
    (best_edge, best_sep)
}

/// Clip a segment to the half-plane `normal . x <= offset`.
/// Returns `None` if less than two points remain.
fn clip_segment(input: [m::Vec2; 2], normal: m::Vec2, offset: f64) -> Option<[m::Vec2; 2]> {
    let dist0 = normal.dot(input[0]) - offset;
    let dist1 = normal.dot(input[1]) - offset;

    let mut out = [input[0]; 2];
    let mut count = 0;
    if dist0 <= 0.0 {
        out[count] = input[0];
        count += 1;
    }
    if dist1 <= 0.0 {
        out[count] = input[1];
        count += 1;
    }
    if dist0 * dist1 < 0.0 && count < 2 {
        let interp = dist0 / (dist0 - dist1);
        out[count] = input[0] + (input[1] - input[0]) * interp;
        count += 1;
    }

    (count == 2).then_some(out)
}

fn polygon_polygon(poly1: &Polygon, poly2: &Polygon) -> ContactResult {
    let (edge1, sep1) = max_separation(poly1, poly2);
    if sep1 > 0.0 {
        return ContactResult::Zero;
    }
    let (edge2, sep2) = max_separation(poly2, poly1);
    if sep2 > 0.0 {
        return ContactResult::Zero;
    }

    let (ref_poly, inc_poly, ref_edge, flip) = if sep2 > sep1 + REFERENCE_EDGE_TOLERANCE {
        (poly2, poly1, edge2, true)
    } else {
        (poly1, poly2, edge1, false)
    };

    let ref_normal = ref_poly.normal(ref_edge);

    // incident edge is the one most antiparallel to the reference normal
    let inc_edge = (0..inc_poly.len())
        .map(|i| (i, inc_poly.normal(i).dot(ref_normal)))
        .fold((0, f64::MAX), |best, (i, d)| if d < best.1 { (i, d) } else { best });
    let inc_edge = inc_edge.0;
    let incident = [inc_poly.vert(inc_edge), inc_poly.vert(inc_edge + 1)];

    let v11 = ref_poly.vert(ref_edge);
    let v12 = ref_poly.vert(ref_edge + 1);
    let tangent = match Unit::try_new(v12 - v11) {
        Some(t) => t,
        None => return ContactResult::Zero,
    };

    // clip the incident edge to the side planes of the reference edge
    let clipped = clip_segment(incident, -*tangent, -tangent.dot(v11))
        .and_then(|pts| clip_segment(pts, *tangent, tangent.dot(v12)));
    let clipped = match clipped {
        Some(pts) => pts,
        None => return ContactResult::Zero,
    };

    let normal = if flip { -ref_normal } else { ref_normal };
    let front_offset = ref_normal.dot(v11);
    let mut contacts = clipped.iter().filter_map(|p| {
        let sep = ref_normal.dot(*p) - front_offset;
        (sep <= 0.0).then(|| Contact {
            normal: Unit::new_unchecked(normal),
            depth: -sep,
            // move from the incident surface halfway to the reference surface
            point: *p - ref_normal * (sep / 2.0),
        })
    });

    match (contacts.next(), contacts.next()) {
        (Some(c1), Some(c2)) => ContactResult::Two(c1, c2),
        (Some(c), None) | (None, Some(c)) => ContactResult::One(c),
        (None, None) => ContactResult::Zero,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PoseBuilder;

    fn at(x: f64, y: f64) -> Pose {
        PoseBuilder::new().with_position([x, y]).build()
    }

    #[test]
    fn stacked_rects_have_two_contacts() {
        let box1 = Collider::new_rect(2.0, 2.0);
        let box2 = Collider::new_rect(1.0, 1.0);
        let result = intersection_check(&at(0.0, 0.0), &box1, &at(0.2, 1.4), &box2);
        assert_eq!(result.len(), 2);
        for c in result.iter() {
            assert!((c.normal.y - 1.0).abs() < 1e-9, "normal should point from 1 to 2");
            assert!((c.depth - 0.1).abs() < 1e-9);
        }
        let xs: Vec<f64> = result.iter().map(|c| c.point.x).collect();
        assert!(xs.iter().any(|x| (x + 0.3).abs() < 1e-9));
        assert!(xs.iter().any(|x| (x - 0.7).abs() < 1e-9));

        // same check the other way around flips the normal
        let result = intersection_check(&at(0.2, 1.4), &box2, &at(0.0, 0.0), &box1);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| (c.normal.y + 1.0).abs() < 1e-9));
    }

    #[test]
    fn separated_shapes_dont_collide() {
        let rect = Collider::new_rect(2.0, 2.0);
        let circle = Collider::new_circle(0.5);
        let tri = Collider::new_triangle(
            m::Vec2::new(-1.0, 0.0),
            m::Vec2::new(1.0, 0.0),
            m::Vec2::new(0.0, 1.0),
        );
        assert!(intersection_check(&at(0.0, 0.0), &rect, &at(3.0, 0.0), &rect).is_empty());
        assert!(intersection_check(&at(0.0, 0.0), &rect, &at(1.6, 0.0), &circle).is_empty());
        // circle outside the corner region but inside the aabb
        assert!(intersection_check(&at(0.0, 0.0), &rect, &at(1.4, 1.4), &circle).is_empty());
        assert!(intersection_check(&at(0.0, 0.0), &tri, &at(0.0, 5.0), &rect).is_empty());
    }

    #[test]
    fn circle_against_rect_face_and_corner() {
        let rect = Collider::new_rect(2.0, 2.0);
        let circle = Collider::new_circle(0.5);

        let face = intersection_check(&at(0.0, 0.0), &rect, &at(1.3, 0.0), &circle);
        let ContactResult::One(c) = face else {
            panic!("expected one contact, got {face:?}");
        };
        assert!((c.normal.x - 1.0).abs() < 1e-9);
        assert!((c.depth - 0.2).abs() < 1e-9);

        let corner = intersection_check(&at(1.3, 1.3), &circle, &at(0.0, 0.0), &rect);
        let ContactResult::One(c) = corner else {
            panic!("expected one contact, got {corner:?}");
        };
        // normal points from the circle towards the rect corner
        assert!(c.normal.x < 0.0 && c.normal.y < 0.0);
        assert!((c.normal.x - c.normal.y).abs() < 1e-9);
    }

    #[test]
    fn circles() {
        let c1 = Collider::new_circle(1.0);
        let c2 = Collider::new_circle(1.0);
        let result = intersection_check(&at(0.0, 0.0), &c1, &at(1.5, 0.0), &c2);
        let ContactResult::One(c) = result else {
            panic!("expected one contact");
        };
        assert!((c.depth - 0.5).abs() < 1e-9);
        assert!((c.point.x - 0.75).abs() < 1e-9);
        assert!(intersection_check(&at(0.0, 0.0), &c1, &at(2.5, 0.0), &c2).is_empty());
    }

    #[test]
    fn triangle_resting_on_line() {
        let ground = Collider::new_line(10.0);
        let tri = Collider::new_triangle(
            m::Vec2::new(-1.0, -0.5),
            m::Vec2::new(1.0, -0.5),
            m::Vec2::new(0.0, 1.0),
        );
        let ColliderShape::Triangle { verts } = tri.shape else {
            panic!("not a triangle");
        };
        let lowest = verts.iter().map(|v| v.y).fold(f64::MAX, f64::min);
        // sink the flat bottom slightly below the line
        let result = intersection_check(&at(0.0, 0.0), &ground, &at(0.0, -lowest - 0.05), &tri);
        assert_eq!(result.len(), 2);
        for c in result.iter() {
            assert!((c.depth - 0.05).abs() < 1e-9);
            assert!((c.normal.y - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn degenerate_never_collides() {
        let marker = Collider::new_circle(0.0);
        let rect = Collider::new_rect(2.0, 2.0);
        assert!(intersection_check(&at(0.0, 0.0), &marker, &at(0.0, 0.0), &rect).is_empty());
        let lines = intersection_check(
            &at(0.0, 0.0),
            &Collider::new_line(2.0),
            &at(0.0, 0.0),
            &Collider::new_line(2.0),
        );
        assert!(lines.is_empty());
    }
}
