//! Types of physical constraints.

use super::BodyKey;
use crate::math as m;

use thunderdome as td;

pub(crate) mod solver;

pub mod target;
pub use target::{FixedPoint, PointerId, PointerSource, PointerTarget, TargetSource};

/// Key type to look up a constraint stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintKey(pub(crate) td::Index);

/// Errors from building a constraint with invalid parameters.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConstraintError {
    #[error("A constraint cannot attach a body to itself")]
    SelfAttachment,
    #[error("Constraint anchor must be finite, got {0:?}")]
    NonFiniteAnchor(m::Vec2),
    #[error("Constraint parameter `{name}` must be finite and non-negative, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// What the second end of a constraint is attached to.
#[derive(Debug)]
pub enum Attachment {
    /// A point on a body, given as an offset from its center of mass in the body's own frame.
    Body { key: BodyKey, anchor: m::Vec2 },
    /// A world-space point that can move on its own, like a mouse cursor.
    Target(Box<dyn TargetSource>),
}

impl Attachment {
    #[inline]
    pub fn body(key: BodyKey, anchor: m::Vec2) -> Self {
        Attachment::Body { key, anchor }
    }

    /// Attach to a point fixed in the world.
    #[inline]
    pub fn point(point: m::Vec2) -> Self {
        Attachment::Target(Box::new(FixedPoint(point)))
    }

    #[inline]
    pub fn body_key(&self) -> Option<BodyKey> {
        match self {
            Attachment::Body { key, .. } => Some(*key),
            Attachment::Target(_) => None,
        }
    }
}

/// Type-specific variables for constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintKind {
    /// Keeps the anchors at a fixed distance, like a rigid rod.
    Distance { length: f64 },
    /// Pushes the anchors towards a rest length with a damped spring force.
    Spring {
        rest_length: f64,
        stiffness: f64,
        damping: f64,
    },
    /// Pushes the relative angle of the bodies towards a rest angle with a damped spring torque.
    RotarySpring {
        rest_angle: f64,
        stiffness: f64,
        damping: f64,
    },
    /// Keeps the anchors on top of each other.
    /// Mouse and touch dragging are pivots attached to a [`PointerTarget`].
    Pivot,
}

/// A constraint restricts the relative motion of two bodies,
/// or the motion of a single body relative to a point in the world.
///
/// Create these with [`ConstraintBuilder`].
#[derive(Debug)]
pub struct Constraint {
    pub(crate) body: BodyKey,
    /// Offset from the owning body's center of mass in the body's frame.
    pub(crate) anchor: m::Vec2,
    pub(crate) attachment: Attachment,
    pub(crate) kind: ConstraintKind,
    pub(crate) max_force: f64,
    pub(crate) state: solver::SolverState,
}

impl Constraint {
    #[inline]
    pub fn body(&self) -> BodyKey {
        self.body
    }

    #[inline]
    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    #[inline]
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    #[inline]
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    /// Whether the constraint involves the given body at either end.
    pub fn involves(&self, key: BodyKey) -> bool {
        self.body == key || self.attachment.body_key() == Some(key)
    }

    /// Impulse applied by the constraint during the last tick.
    #[inline]
    pub fn last_impulse(&self) -> m::Vec2 {
        self.state.last_impulse
    }

    /// Release the attachment's target source, if any.
    /// Called once when the constraint leaves the world.
    pub(crate) fn detach(&mut self) {
        if let Attachment::Target(target) = &mut self.attachment {
            target.detach();
        }
    }
}

/// A builder that allows ergonomic construction of different constraints.
#[derive(Debug)]
pub struct ConstraintBuilder {
    body: BodyKey,
    anchor: m::Vec2,
    attachment: Option<Attachment>,
    max_force: f64,
}

impl ConstraintBuilder {
    /// Start building a constraint.
    ///
    /// An owning body is required.
    /// If you don't attach the constraint to anything else,
    /// it will be attached to the world origin.
    pub fn new(body: BodyKey) -> Self {
        Self {
            body,
            anchor: m::Vec2::zero(),
            attachment: None,
            max_force: f64::INFINITY,
        }
    }

    /// Set the anchor point of the constraint on the owning body
    /// relative to its center of mass.
    ///
    /// This has no effect on rotary springs.
    pub fn with_anchor(mut self, anchor: m::Vec2) -> Self {
        self.anchor = anchor;
        self
    }

    /// Attach the constraint to a point on another body.
    pub fn with_target_body(mut self, key: BodyKey, anchor: m::Vec2) -> Self {
        self.attachment = Some(Attachment::body(key, anchor));
        self
    }

    /// Attach the constraint to a fixed point in the world.
    pub fn with_target_point(mut self, point: m::Vec2) -> Self {
        self.attachment = Some(Attachment::point(point));
        self
    }

    /// Attach the constraint to a custom moving target.
    pub fn with_target_source(mut self, source: impl TargetSource + 'static) -> Self {
        self.attachment = Some(Attachment::Target(Box::new(source)));
        self
    }

    /// Limit the force the constraint can apply. The world's
    /// [`max_force`][crate::physics::PhysicsParams::max_force] applies on top of this.
    pub fn with_max_force(mut self, max_force: f64) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn build_distance(self, length: f64) -> Result<Constraint, ConstraintError> {
        check_param("length", length)?;
        self.build(ConstraintKind::Distance { length })
    }

    pub fn build_spring(
        self,
        rest_length: f64,
        stiffness: f64,
        damping: f64,
    ) -> Result<Constraint, ConstraintError> {
        check_param("rest_length", rest_length)?;
        check_param("stiffness", stiffness)?;
        check_param("damping", damping)?;
        self.build(ConstraintKind::Spring {
            rest_length,
            stiffness,
            damping,
        })
    }

    /// Build a rotary spring. The relative angle is the owning body's rotation
    /// minus the other body's, or minus zero when attached to a point.
    pub fn build_rotary_spring(
        self,
        rest_angle: m::Angle,
        stiffness: f64,
        damping: f64,
    ) -> Result<Constraint, ConstraintError> {
        let rest_angle = rest_angle.rad();
        if !rest_angle.is_finite() {
            return Err(ConstraintError::InvalidParameter {
                name: "rest_angle",
                value: rest_angle,
            });
        }
        check_param("stiffness", stiffness)?;
        check_param("damping", damping)?;
        self.build(ConstraintKind::RotarySpring {
            rest_angle,
            stiffness,
            damping,
        })
    }

    pub fn build_pivot(self) -> Result<Constraint, ConstraintError> {
        self.build(ConstraintKind::Pivot)
    }

    /// Build a pivot that drags the body's anchor along with the mouse.
    ///
    /// `grab_point` is used as the target until the mouse has a known position.
    pub fn build_mouse(
        self,
        source: &PointerSource,
        grab_point: m::Vec2,
    ) -> Result<Constraint, ConstraintError> {
        self.build_pointer(source, PointerId::Mouse, grab_point)
    }

    /// Build a pivot that drags the body's anchor along with one touch point.
    pub fn build_touch(
        self,
        source: &PointerSource,
        touch_id: u64,
        grab_point: m::Vec2,
    ) -> Result<Constraint, ConstraintError> {
        self.build_pointer(source, PointerId::Touch(touch_id), grab_point)
    }

    fn build_pointer(
        mut self,
        source: &PointerSource,
        id: PointerId,
        grab_point: m::Vec2,
    ) -> Result<Constraint, ConstraintError> {
        check_anchor(grab_point)?;
        self.attachment = Some(Attachment::Target(Box::new(
            source.target(id, grab_point),
        )));
        self.build(ConstraintKind::Pivot)
    }

    fn build(self, kind: ConstraintKind) -> Result<Constraint, ConstraintError> {
        check_anchor(self.anchor)?;
        if self.max_force.is_nan() || self.max_force < 0.0 {
            return Err(ConstraintError::InvalidParameter {
                name: "max_force",
                value: self.max_force,
            });
        }
        let attachment = self
            .attachment
            .unwrap_or_else(|| Attachment::point(m::Vec2::zero()));
        if let Attachment::Body { key, anchor } = &attachment {
            if *key == self.body {
                return Err(ConstraintError::SelfAttachment);
            }
            check_anchor(*anchor)?;
        }
        Ok(Constraint {
            body: self.body,
            anchor: self.anchor,
            attachment,
            kind,
            max_force: self.max_force,
            state: solver::SolverState::default(),
        })
    }
}

fn check_param(name: &'static str, value: f64) -> Result<(), ConstraintError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConstraintError::InvalidParameter { name, value })
    }
}

fn check_anchor(anchor: m::Vec2) -> Result<(), ConstraintError> {
    if anchor.x.is_finite() && anchor.y.is_finite() {
        Ok(())
    } else {
        Err(ConstraintError::NonFiniteAnchor(anchor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (BodyKey, BodyKey) {
        let mut arena = td::Arena::new();
        (BodyKey(arena.insert(())), BodyKey(arena.insert(())))
    }

    #[test]
    fn invalid_constraints_are_rejected() {
        let (a, b) = keys();
        assert_eq!(
            ConstraintBuilder::new(a)
                .with_target_body(a, m::Vec2::zero())
                .build_pivot()
                .unwrap_err(),
            ConstraintError::SelfAttachment
        );
        assert!(matches!(
            ConstraintBuilder::new(a)
                .with_target_body(b, m::Vec2::zero())
                .build_distance(-1.0),
            Err(ConstraintError::InvalidParameter { name: "length", .. })
        ));
        assert!(matches!(
            ConstraintBuilder::new(a).build_spring(1.0, f64::NAN, 0.0),
            Err(ConstraintError::InvalidParameter {
                name: "stiffness",
                ..
            })
        ));
        assert!(matches!(
            ConstraintBuilder::new(a)
                .with_anchor(m::Vec2::new(f64::INFINITY, 0.0))
                .build_pivot(),
            Err(ConstraintError::NonFiniteAnchor(_))
        ));
    }

    #[test]
    fn builder_defaults_to_world_origin() {
        let (a, b) = keys();
        let c = ConstraintBuilder::new(a).build_distance(2.0).unwrap();
        assert!(matches!(c.attachment(), Attachment::Target(_)));
        assert!(c.involves(a));
        assert!(!c.involves(b));

        let c = ConstraintBuilder::new(a)
            .with_target_body(b, m::Vec2::new(0.5, 0.0))
            .build_spring(1.0, 10.0, 0.5)
            .unwrap();
        assert!(c.involves(b));
        assert_eq!(
            c.kind(),
            ConstraintKind::Spring {
                rest_length: 1.0,
                stiffness: 10.0,
                damping: 0.5
            }
        );
    }

    #[test]
    fn mouse_constraint_registers_with_pointer() {
        let (a, _) = keys();
        let pointer = PointerSource::new();
        let mut c = ConstraintBuilder::new(a)
            .build_mouse(&pointer, m::Vec2::new(1.0, 2.0))
            .unwrap();
        assert_eq!(c.kind(), ConstraintKind::Pivot);
        assert_eq!(pointer.listener_count(PointerId::Mouse), 1);
        c.detach();
        assert_eq!(pointer.listener_count(PointerId::Mouse), 0);
    }
}
