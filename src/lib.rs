//! A 2D physics engine: rigid bodies with a dynamic AABB tree broadphase,
//! a sequential impulse contact solver, joints and springs,
//! and particle fluids.

mod util;

pub mod math;
#[cfg(feature = "serde-types")]
pub use math::serde_pose;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod physics;
pub use physics::{
    collision::{self, Collider, ColliderShape, Contact, ContactResult, Manifold, Ray, RayHit, AABB},
    constraint::{self, Attachment, Constraint, ConstraintBuilder, ConstraintKey, ConstraintKind},
    fluid::{Fluid, FluidKey, FluidParams},
    forcefield, Body, BodyKey, CollisionFilter, Mass, Material, Physics, PhysicsError,
    PhysicsParams, PhysicsStats, Velocity,
};
