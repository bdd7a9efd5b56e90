use super::AABB;
use crate::math::{self as m, Pose};

/// Anything smaller than this is considered to have no size at all.
pub(crate) const DEGENERATE_EPSILON: f64 = 1e-9;

/// The physical shape of a body and its offset from the body's center of mass.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Collider {
    pub shape: ColliderShape,
    /// Pose of the shape relative to the body that owns it.
    #[cfg_attr(feature = "serde-types", serde(with = "m::serde_pose", default = "Pose::identity"))]
    pub pose: Pose,
}

/// The physical shape of a collider.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum ColliderShape {
    Circle {
        r: f64,
    },
    /// The rect collider stores its side lengths halved because this makes
    /// intersection tests easier.
    Rect {
        hw: f64,
        hh: f64,
    },
    /// Vertices in counterclockwise order with their centroid at the origin.
    Triangle {
        verts: [m::Vec2; 3],
    },
    /// A line segment of length `2 * hl` along the local x axis.
    /// Lines have no thickness; point and ray queries treat them as having the
    /// width configured with `PhysicsParams::point_size`.
    Line {
        hl: f64,
    },
}

impl Collider {
    fn from_shape(shape: ColliderShape) -> Self {
        Collider {
            shape,
            pose: Pose::identity(),
        }
    }

    /// Create a circle collider from a radius.
    pub fn new_circle(radius: f64) -> Self {
        Self::from_shape(ColliderShape::Circle { r: radius })
    }

    /// Create a rect collider with both sides set to the same length.
    pub fn new_square(side_length: f64) -> Self {
        Collider::new_rect(side_length, side_length)
    }

    /// Create a rect collider with two different side lengths.
    pub fn new_rect(width: f64, height: f64) -> Self {
        Self::from_shape(ColliderShape::Rect {
            hw: width / 2.0,
            hh: height / 2.0,
        })
    }

    /// Create a triangle collider from three points.
    ///
    /// The points are moved so that their centroid is at the origin
    /// and reordered to be counterclockwise if necessary.
    /// Use [`Collider::with_pose`] to offset the triangle from the body.
    pub fn new_triangle(a: m::Vec2, b: m::Vec2, c: m::Vec2) -> Self {
        let centroid = (a + b + c) / 3.0;
        let (a, b, c) = (a - centroid, b - centroid, c - centroid);
        let verts = if m::cross(b - a, c - a) < 0.0 {
            [a, c, b]
        } else {
            [a, b, c]
        };
        Self::from_shape(ColliderShape::Triangle { verts })
    }

    /// Create a line collider of the given length, centered on the origin
    /// and pointing along the x axis.
    pub fn new_line(length: f64) -> Self {
        Self::from_shape(ColliderShape::Line { hl: length / 2.0 })
    }

    /// Create a line collider going between two points in body space.
    pub fn new_segment(start: m::Vec2, end: m::Vec2) -> Self {
        let mut dir = end - start;
        // the segment is symmetric, pick the direction that doesn't turn more than
        // a quarter circle to avoid the undefined rotation between opposite vectors
        if dir.x < 0.0 || (dir.x == 0.0 && dir.y < 0.0) {
            dir = -dir;
        }
        let len = dir.mag();
        let rotation = if len > DEGENERATE_EPSILON {
            m::Rotor2::from_rotation_between(m::Vec2::unit_x(), dir / len)
        } else {
            m::Rotor2::identity()
        };
        Collider {
            shape: ColliderShape::Line { hl: len / 2.0 },
            pose: Pose::new((start + end) / 2.0, rotation),
        }
    }

    /// Set the offset of the collider from its body in a builder-like chain.
    pub fn with_pose(mut self, pose: impl Into<Pose>) -> Self {
        self.pose = pose.into();
        self
    }

    pub fn area(&self) -> f64 {
        self.shape.area()
    }

    /// Moment of inertia around the body's center of mass divided by mass.
    /// Includes the offset of the collider from the body.
    pub fn moment_of_inertia_coef(&self) -> f64 {
        self.shape.moment_of_inertia_coef() + self.pose.translation.mag_sq()
    }

    /// Shapes with no size never collide with anything.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.shape.is_degenerate()
    }

    /// Bounding box of the collider when placed at the given world-space pose.
    pub fn aabb(&self, world_pose: &Pose) -> AABB {
        match self.shape {
            ColliderShape::Circle { r } => {
                AABB::from_center(world_pose.translation, m::Vec2::new(r, r))
            }
            ColliderShape::Rect { hw, hh } => {
                // only two corners needed thanks to symmetry
                let c1 = world_pose.rotation * m::Vec2::new(hw, hh);
                let c2 = world_pose.rotation * m::Vec2::new(hw, -hh);
                let half = m::Vec2::new(c1.x.abs().max(c2.x.abs()), c1.y.abs().max(c2.y.abs()));
                AABB::from_center(world_pose.translation, half)
            }
            ColliderShape::Triangle { verts } => {
                AABB::from_points(verts.iter().map(|v| world_pose.transform_vec(*v)))
            }
            ColliderShape::Line { hl } => {
                let half = world_pose.rotation * m::Vec2::new(hl, 0.0);
                AABB::from_corners(world_pose.translation - half, world_pose.translation + half)
            }
        }
    }

    /// The collider as a convex polygon with world-space vertices,
    /// or `None` if it's a circle.
    pub(crate) fn polygon(&self, world_pose: &Pose) -> Option<Polygon> {
        match self.shape {
            ColliderShape::Circle { .. } => None,
            ColliderShape::Rect { hw, hh } => Some(Polygon::new(
                &[
                    m::Vec2::new(-hw, -hh),
                    m::Vec2::new(hw, -hh),
                    m::Vec2::new(hw, hh),
                    m::Vec2::new(-hw, hh),
                ],
                world_pose,
            )),
            ColliderShape::Triangle { verts } => Some(Polygon::new(&verts, world_pose)),
            ColliderShape::Line { hl } => Some(Polygon::new(
                &[m::Vec2::new(-hl, 0.0), m::Vec2::new(hl, 0.0)],
                world_pose,
            )),
        }
    }
}

impl ColliderShape {
    pub fn area(&self) -> f64 {
        match *self {
            ColliderShape::Circle { r } => std::f64::consts::PI * r * r,
            ColliderShape::Rect { hw, hh } => 4.0 * hw * hh,
            ColliderShape::Triangle { verts: [a, b, c] } => m::cross(b - a, c - a).abs() / 2.0,
            ColliderShape::Line { .. } => 0.0,
        }
    }

    /// Moment of inertia around the shape's own origin divided by mass.
    pub fn moment_of_inertia_coef(&self) -> f64 {
        // from https://en.wikipedia.org/wiki/List_of_moments_of_inertia
        match *self {
            ColliderShape::Circle { r } => r * r / 2.0,
            ColliderShape::Rect { hw, hh } => (hw * hw + hh * hh) / 3.0,
            // vertices relative to the centroid
            ColliderShape::Triangle { verts: [a, b, c] } => {
                (a.mag_sq() + b.mag_sq() + c.mag_sq()) / 12.0
            }
            ColliderShape::Line { hl } => hl * hl / 3.0,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        match *self {
            ColliderShape::Circle { r } => r <= DEGENERATE_EPSILON,
            ColliderShape::Rect { hw, hh } => hw <= DEGENERATE_EPSILON || hh <= DEGENERATE_EPSILON,
            ColliderShape::Triangle { .. } => self.area() <= DEGENERATE_EPSILON,
            ColliderShape::Line { hl } => hl <= DEGENERATE_EPSILON,
        }
    }

    /// Outline vertices in shape-local space in counterclockwise order,
    /// for drawing the shape. Circles are approximated with `circle_segments` points.
    pub fn vertices(&self, circle_segments: usize) -> Vec<m::Vec2> {
        match *self {
            ColliderShape::Circle { r } => {
                let segments = circle_segments.max(3);
                let step = 2.0 * std::f64::consts::PI / segments as f64;
                (0..segments)
                    .map(|i| {
                        let ang = i as f64 * step;
                        m::Vec2::new(r * ang.cos(), r * ang.sin())
                    })
                    .collect()
            }
            ColliderShape::Rect { hw, hh } => vec![
                m::Vec2::new(-hw, -hh),
                m::Vec2::new(hw, -hh),
                m::Vec2::new(hw, hh),
                m::Vec2::new(-hw, hh),
            ],
            ColliderShape::Triangle { verts } => verts.to_vec(),
            ColliderShape::Line { hl } => vec![m::Vec2::new(-hl, 0.0), m::Vec2::new(hl, 0.0)],
        }
    }
}

/// A convex polygon in world space with outward edge normals.
/// Lines are represented as two-vertex polygons whose two "edges" face opposite ways.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Polygon {
    verts: [m::Vec2; 4],
    normals: [m::Vec2; 4],
    len: usize,
}

impl Polygon {
    fn new(local_verts: &[m::Vec2], pose: &Pose) -> Self {
        let len = local_verts.len();
        let mut verts = [m::Vec2::zero(); 4];
        let mut normals = [m::Vec2::zero(); 4];
        for (i, v) in local_verts.iter().enumerate() {
            verts[i] = pose.transform_vec(*v);
        }
        for i in 0..len {
            let edge = verts[(i + 1) % len] - verts[i];
            // counterclockwise winding, so the right side is outside
            normals[i] = m::right_normal(edge).normalized();
        }
        Polygon {
            verts,
            normals,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn vert(&self, idx: usize) -> m::Vec2 {
        self.verts[idx % self.len]
    }

    #[inline]
    pub fn normal(&self, idx: usize) -> m::Vec2 {
        self.normals[idx % self.len]
    }

    pub fn verts(&self) -> &[m::Vec2] {
        &self.verts[..self.len]
    }
}
