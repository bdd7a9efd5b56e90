use crate::math::{self as m, Unit};

/// An axis-aligned bounding box.
///
/// Invariant: `min.x <= max.x` and `min.y <= max.y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    /// Create an AABB from two corner points in any order.
    pub fn from_corners(a: m::Vec2, b: m::Vec2) -> Self {
        Self {
            min: m::Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: m::Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center(center: m::Vec2, half_extents: m::Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The smallest AABB containing all the given points.
    /// Returns a zero-size box at the origin if there are no points.
    pub fn from_points(points: impl IntoIterator<Item = m::Vec2>) -> Self {
        let mut iter = points.into_iter();
        let first = match iter.next() {
            Some(p) => p,
            None => return Self::zero(),
        };
        iter.fold(Self::from_corners(first, first), |acc, p| Self {
            min: m::Vec2::new(acc.min.x.min(p.x), acc.min.y.min(p.y)),
            max: m::Vec2::new(acc.max.x.max(p.x), acc.max.y.max(p.y)),
        })
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The smallest AABB containing both `self` and `other`.
    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: m::Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: m::Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// The overlapping region of `self` and `other`, if any.
    /// Boxes that only touch at an edge count as overlapping.
    pub fn intersection(&self, other: &AABB) -> Option<AABB> {
        let min = m::Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = m::Vec2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x <= max.x && min.y <= max.y {
            Some(AABB { min, max })
        } else {
            None
        }
    }

    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Check whether `other` lies completely inside `self`.
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Grow the box by the given amount in every direction.
    #[inline]
    pub fn padded(&self, margin: f64) -> AABB {
        let pad = m::Vec2::new(margin, margin);
        AABB {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Clip a ray against the box using the slab method.
    ///
    /// Returns the ray parameters at which the ray enters and exits the box,
    /// clamped to `[0, ray.length]`, or `None` if the ray misses.
    pub fn clip_line(&self, ray: &Ray) -> Option<(f64, f64)> {
        let mut t_min: f64 = 0.0;
        let mut t_max = ray.length;
        for (start, dir, lo, hi) in [
            (ray.start.x, ray.dir.x, self.min.x, self.max.x),
            (ray.start.y, ray.dir.y, self.min.y, self.max.y),
        ] {
            if dir.abs() < f64::EPSILON {
                // parallel to this slab, must already be inside it
                if start < lo || start > hi {
                    return None;
                }
                continue;
            }
            let inv_dir = 1.0 / dir;
            let (t0, t1) = {
                let t0 = (lo - start) * inv_dir;
                let t1 = (hi - start) * inv_dir;
                if t0 <= t1 {
                    (t0, t1)
                } else {
                    (t1, t0)
                }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

/// Error when constructing a [`Ray`][self::Ray].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum RayError {
    #[error("Ray length must be finite, got {0}")]
    NonFiniteLength(f64),
    #[error("Ray length must not be negative, got {0}")]
    NegativeLength(f64),
    #[error("Ray must have a nonzero direction")]
    ZeroDirection,
    #[error("Ray start point must be finite")]
    NonFiniteStart,
}

/// A line segment with a start point, a direction and a finite length.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: m::Vec2,
    pub dir: Unit<m::Vec2>,
    pub length: f64,
}

impl Ray {
    /// Create a ray from a start point, direction (normalized here) and length.
    ///
    /// Infinite rays aren't supported because the clipping algorithm needs an end point.
    pub fn new(start: m::Vec2, dir: m::Vec2, length: f64) -> Result<Self, RayError> {
        if !length.is_finite() {
            return Err(RayError::NonFiniteLength(length));
        }
        if length < 0.0 {
            return Err(RayError::NegativeLength(length));
        }
        if !(start.x.is_finite() && start.y.is_finite()) {
            return Err(RayError::NonFiniteStart);
        }
        let dir = Unit::try_new(dir).ok_or(RayError::ZeroDirection)?;
        Ok(Self { start, dir, length })
    }

    /// Create a ray going from `start` to `end`.
    pub fn between(start: m::Vec2, end: m::Vec2) -> Result<Self, RayError> {
        let diff = end - start;
        Self::new(start, diff, diff.mag())
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> m::Vec2 {
        self.start + *self.dir * t
    }
}
