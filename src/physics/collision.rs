//! Collision detection: bounding boxes, the broadphase tree,
//! narrowphase tests, point and ray queries,
//! and the impulse solver for the contacts found.

mod aabb;
pub use aabb::{Ray, RayError, AABB};

pub mod aabb_tree;
pub use aabb_tree::AabbTree;

mod collider;
pub use collider::{Collider, ColliderShape};

mod contact;
pub use contact::ContactSolver;

pub mod narrowphase;
pub use narrowphase::{Contact, ContactResult, Manifold};

pub mod query;
pub use query::RayHit;

mod space;
pub use space::{CollisionStats, CollisionsSpace};
