use super::{Collider, Velocity};
use crate::math as m;

use thunderdome as td;

/// Key type to look up a body stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(crate) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things
    /// such as [`hecs`][hecs] entities.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// A collision object: something with a shape that other things can bump into,
/// and (unless static) that moves in response to forces and contacts.
#[derive(Clone, Copy, Debug)]
pub struct Body {
    /// Position and rotation of the center of mass in world space.
    pub pose: m::Pose,
    pub collider: Collider,
    pub velocity: Velocity,
    pub mass: Mass,
    pub moment_of_inertia: Mass,
    /// Force accumulated since the last tick, cleared after integration.
    pub force: m::Vec2,
    /// Torque accumulated since the last tick, cleared after integration.
    pub torque: f64,
    pub material: Material,
    /// Triggers generate manifolds but are never pushed apart from anything.
    pub is_trigger: bool,
    pub filter: CollisionFilter,
}

impl Body {
    fn with_masses(collider: Collider, mass: Mass, moment_of_inertia: Mass) -> Self {
        Self {
            pose: m::Pose::identity(),
            collider,
            velocity: Velocity::default(),
            mass,
            moment_of_inertia,
            force: m::Vec2::zero(),
            torque: 0.0,
            material: Material::default(),
            is_trigger: false,
            filter: CollisionFilter::default(),
        }
    }

    /// Dynamic bodies respond to external forces and are allowed to rotate.
    /// This constructor calculates mass and moment of inertia from the given density and
    /// collider shape.
    pub fn new_dynamic(collider: Collider, density: f64) -> Self {
        let mass = collider.area() * density;
        Self::with_masses(
            collider,
            Mass::from(mass),
            Mass::from(collider.moment_of_inertia_coef() * mass),
        )
    }

    /// Create a dynamic body with the given mass instead of using density.
    /// The collider is still required in order to compute moment of inertia.
    pub fn new_dynamic_const_mass(collider: Collider, mass: f64) -> Self {
        Self::with_masses(
            collider,
            Mass::from(mass),
            Mass::from(collider.moment_of_inertia_coef() * mass),
        )
    }

    /// A particle responds to external forces but does not rotate.
    pub fn new_particle(collider: Collider, mass: f64) -> Self {
        Self::with_masses(collider, Mass::from(mass), Mass::Infinite)
    }

    /// Static bodies have infinite mass and never move.
    pub fn new_static(collider: Collider) -> Self {
        Self::with_masses(collider, Mass::Infinite, Mass::Infinite)
    }

    /// Set the pose of the body in a builder-like chain.
    pub fn with_pose(mut self, pose: impl Into<m::Pose>) -> Self {
        self.pose = pose.into();
        self
    }

    /// Set the position of the body in a builder-like chain.
    pub fn with_position(mut self, position: impl Into<[f64; 2]>) -> Self {
        let p = position.into();
        self.pose.translation = m::Vec2::new(p[0], p[1]);
        self
    }

    /// Set the velocity of the body in a builder-like chain.
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.velocity = vel;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Turn the body into a trigger (sensor) in a builder-like chain.
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Make the body static, discarding its mass.
    pub fn make_static(&mut self) {
        self.mass = Mass::Infinite;
        self.moment_of_inertia = Mass::Infinite;
        self.velocity = Velocity::default();
        self.force = m::Vec2::zero();
        self.torque = 0.0;
    }

    /// A static body has infinite mass and moment of inertia and never moves.
    #[inline]
    pub fn is_static(&self) -> bool {
        matches!(
            (self.mass, self.moment_of_inertia),
            (Mass::Infinite, Mass::Infinite)
        )
    }

    /// A dynamic body is integrated by the dynamics space.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// World-space pose of the attached collider.
    #[inline]
    pub fn collider_pose(&self) -> m::Pose {
        self.pose * self.collider.pose
    }

    /// Accumulate a force through the center of mass.
    pub fn apply_force(&mut self, force: m::Vec2) {
        if self.is_static() {
            return;
        }
        self.force += force;
    }

    /// Accumulate a force applied at a world-space point, generating torque.
    pub fn apply_force_at(&mut self, force: m::Vec2, point: m::Vec2) {
        if self.is_static() {
            return;
        }
        self.force += force;
        self.torque += m::cross(point - self.pose.translation, force);
    }

    /// Immediately change velocity as if hit with the given impulse
    /// at the given offset from the center of mass.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: m::Vec2, offset: m::Vec2) {
        self.velocity.linear += impulse * self.mass.inv();
        self.velocity.angular += m::cross(offset, impulse) * self.moment_of_inertia.inv();
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    /// Non-positive and non-finite values are treated as infinite mass
    /// so that the inverse never becomes NaN or infinite.
    #[inline]
    fn from(mass: f64) -> Self {
        if mass > 0.0 && mass.is_finite() {
            Mass::Finite {
                mass,
                inverse: 1.0 / mass,
            }
        } else {
            Mass::Infinite
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }

    /// Get the mass, or `None` if it's infinite.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        match self {
            Mass::Finite { mass, .. } => Some(*mass),
            Mass::Infinite => None,
        }
    }
}

/// Determines how the surface of a body responds to collisions.
///
/// Each material has its own coefficients and pairs use their average.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Material {
    pub static_friction_coef: f64,
    pub dynamic_friction_coef: f64,
    pub restitution_coef: f64,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            static_friction_coef: 0.6,
            dynamic_friction_coef: 0.4,
            restitution_coef: 0.0,
        }
    }
}

impl Material {
    /// A material with no friction that bounces back with the given restitution.
    pub fn frictionless(restitution_coef: f64) -> Self {
        Material {
            static_friction_coef: 0.0,
            dynamic_friction_coef: 0.0,
            restitution_coef,
        }
    }

    #[inline]
    pub fn static_friction_with(&self, other: &Self) -> f64 {
        (self.static_friction_coef + other.static_friction_coef) / 2.0
    }

    #[inline]
    pub fn dynamic_friction_with(&self, other: &Self) -> f64 {
        (self.dynamic_friction_coef + other.dynamic_friction_coef) / 2.0
    }

    #[inline]
    pub fn restitution_with(&self, other: &Self) -> f64 {
        (self.restitution_coef + other.restitution_coef) / 2.0
    }
}

/// Controls which bodies are tested against each other.
///
/// Two bodies are tested if their layer masks share at least one bit
/// and they are not in the same non-zero group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CollisionFilter {
    pub layers: u32,
    pub group: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layers: u32::MAX,
            group: 0,
        }
    }
}

impl CollisionFilter {
    #[inline]
    pub fn can_collide_with(&self, other: &Self) -> bool {
        (self.layers & other.layers) != 0 && (self.group == 0 || self.group != other.group)
    }
}
