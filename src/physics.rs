use crate::{math as m, util::tracy_span};

use instant::Instant;
use std::time::Duration;
use thunderdome as td;

//

mod body;
pub use body::{Body, BodyKey, CollisionFilter, Mass, Material};

pub mod collision;
pub use collision::{
    Collider, ColliderShape, CollisionsSpace, Contact, ContactResult, Manifold, Ray, RayError,
    RayHit, AABB,
};

pub mod constraint;
pub use constraint::{
    Attachment, Constraint, ConstraintBuilder, ConstraintError, ConstraintKey, ConstraintKind,
    PointerId, PointerSource, TargetSource,
};

mod dynamics;
pub use dynamics::DynamicsSpace;

pub mod fluid;
pub use fluid::{Fluid, FluidKey, FluidParams};

pub mod forcefield;
pub use forcefield::ForceField;

pub mod hecs_sync;
pub use hecs_sync::{HecsSyncManager, HecsSyncOptions};

mod params;
pub use params::{PhysicsParams, TreeParams};

//

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: m::Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: m::Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }

    pub fn apply_to_pose(&self, dt: f64, mut pose: m::Pose) -> m::Pose {
        let scaled = *self * dt;
        pose.append_translation(scaled.linear);
        pose.prepend_rotation(m::Angle::Rad(scaled.angular).into());
        pose
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

/// Errors from operations on the physics world.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum PhysicsError {
    #[error("No body with key {0:?} exists in the physics world")]
    UnknownBody(BodyKey),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

/// Snapshot of what happened during the last tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhysicsStats {
    pub collision_time: Duration,
    pub dynamics_time: Duration,
    pub fluid_time: Duration,
    pub body_count: usize,
    pub dynamic_body_count: usize,
    pub constraint_count: usize,
    pub particle_count: usize,
    pub tree_height: usize,
    pub tree_leaves: usize,
    /// Bodies reinserted into the tree during the last update.
    pub tree_reinsertions: usize,
    pub tree_total_insertions: usize,
    pub pair_count: usize,
    pub collision_count: usize,
    pub trigger_count: usize,
}

/// The physics world. Owns every body, constraint and fluid,
/// and moves them forward in time with [`tick`][Self::tick].
pub struct Physics {
    bodies: td::Arena<Body>,
    collisions: CollisionsSpace,
    dynamics: DynamicsSpace,
    fluids: td::Arena<Fluid>,
    params: PhysicsParams,
    stats: PhysicsStats,
}

impl Default for Physics {
    fn default() -> Self {
        Self::new(PhysicsParams::default())
    }
}

impl Physics {
    pub fn new(params: PhysicsParams) -> Self {
        Physics {
            bodies: td::Arena::new(),
            collisions: CollisionsSpace::new(),
            dynamics: DynamicsSpace::new(),
            fluids: td::Arena::new(),
            params,
            stats: PhysicsStats::default(),
        }
    }

    //
    // bodies
    //

    pub fn add_body(&mut self, body: Body) -> BodyKey {
        let key = BodyKey(self.bodies.insert(body));
        self.collisions.add_body(key, &body, &self.params);
        log::debug!("Added body {:?}", key);
        key
    }

    pub fn add_bodies(&mut self, bodies: impl IntoIterator<Item = Body>) -> Vec<BodyKey> {
        bodies.into_iter().map(|body| self.add_body(body)).collect()
    }

    /// Add a body that never moves, regardless of the mass it was created with.
    pub fn add_collision_obj(&mut self, mut body: Body) -> BodyKey {
        body.make_static();
        self.add_body(body)
    }

    /// Remove a body along with every constraint attached to it.
    /// If the body is a fluid particle, it also leaves the fluid.
    /// Returns the body if it still existed.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<Body> {
        let body = self.bodies.remove(key.0)?;
        self.collisions.remove_body(key);
        for (_, fluid) in self.fluids.iter_mut() {
            if fluid.remove_particle(key) {
                break;
            }
        }
        let removed = self.dynamics.remove_constraints_of(key);
        if removed > 0 {
            log::debug!("Removed {} constraints along with body {:?}", removed, key);
        }
        Some(body)
    }

    #[inline]
    pub fn get_body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    /// Mutably access a body. Changes to the pose take effect in the next tick.
    #[inline]
    pub fn get_body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key.0)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.bodies.iter().map(|(i, b)| (BodyKey(i), b))
    }

    //
    // constraints
    //

    /// Add a constraint to the world. Fails if a body it refers to doesn't exist.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintKey, PhysicsError> {
        for key in std::iter::once(constraint.body()).chain(constraint.attachment().body_key()) {
            if !self.bodies.contains(key.0) {
                log::warn!("Rejected constraint referring to missing body {:?}", key);
                return Err(PhysicsError::UnknownBody(key));
            }
        }
        let key = self.dynamics.add_constraint(constraint);
        log::debug!("Added constraint {:?}", key);
        Ok(key)
    }

    /// Remove a constraint. Returns the constraint if it still existed.
    ///
    /// Constraints also disappear when a body they're attached to is removed.
    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Option<Constraint> {
        self.dynamics.remove_constraint(key)
    }

    #[inline]
    pub fn get_constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.dynamics.constraint(key)
    }

    //
    // fluids
    //

    pub fn add_fluid(&mut self, fluid: Fluid) -> FluidKey {
        FluidKey(self.fluids.insert(fluid))
    }

    /// Remove a fluid and all of its particles,
    /// including constraints attached to the particles.
    pub fn remove_fluid(&mut self, key: FluidKey) -> Option<Fluid> {
        let fluid = self.fluids.remove(key.0)?;
        for particle in fluid.particles() {
            self.remove_body(particle.body);
        }
        Some(fluid)
    }

    #[inline]
    pub fn get_fluid(&self, key: FluidKey) -> Option<&Fluid> {
        self.fluids.get(key.0)
    }

    /// Add a particle to a fluid. Returns `false` if the fluid is full or doesn't exist.
    pub fn add_particle(&mut self, fluid: FluidKey, position: impl Into<[f64; 2]>) -> bool {
        let Some(f) = self.fluids.get_mut(fluid.0) else {
            return false;
        };
        if f.is_full() {
            log::debug!("Fluid {:?} is full, particle not added", fluid);
            return false;
        }
        let position: [f64; 2] = position.into();
        let body = f.particle_body(m::Vec2::from(position));
        let key = BodyKey(self.bodies.insert(body));
        self.collisions.add_body(key, &body, &self.params);
        f.push_particle(key)
    }

    //
    // queries
    //

    /// Find every body whose collider contains the given point.
    pub fn pick(&mut self, point: impl Into<[f64; 2]>) -> Vec<BodyKey> {
        let point: [f64; 2] = point.into();
        self.collisions
            .pick(m::Vec2::from(point), &self.bodies, self.params.point_size)
    }

    /// Find every body the ray hits, closest first.
    pub fn raycast(&mut self, ray: &Ray) -> Vec<RayHit> {
        self.collisions
            .raycast(ray, &self.bodies, self.params.point_size)
    }

    /// Find every body whose bounding box intersects the given one.
    pub fn query_aabb(&mut self, aabb: &AABB) -> Vec<BodyKey> {
        self.collisions.query_aabb(aabb)
    }

    /// Contacts between solid bodies found in the last tick.
    #[inline]
    pub fn collision_manifolds(&self) -> &[Manifold] {
        self.collisions.collision_manifolds()
    }

    /// Contacts involving triggers found in the last tick.
    #[inline]
    pub fn trigger_manifolds(&self) -> &[Manifold] {
        self.collisions.trigger_manifolds()
    }

    //
    // parameters
    //

    pub fn set_gravity(&mut self, gravity: impl Into<[f64; 2]>) {
        let g: [f64; 2] = gravity.into();
        self.params.gravity = m::Vec2::from(g);
    }

    #[inline]
    pub fn gravity(&self) -> m::Vec2 {
        self.params.gravity
    }

    /// Set an acceleration field applied to dynamic bodies on top of gravity.
    pub fn set_forcefield(&mut self, field: impl ForceField + 'static) {
        self.dynamics.set_forcefield(field);
    }

    #[inline]
    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut PhysicsParams {
        &mut self.params
    }

    #[inline]
    pub fn stats(&self) -> &PhysicsStats {
        &self.stats
    }

    //
    // stepping
    //

    /// Detect and resolve collisions, solve constraints, move bodies and update fluids.
    pub fn tick(&mut self, dt: f64) {
        if !(dt > 0.0 && dt.is_finite()) {
            log::warn!("Ignoring physics tick with invalid timestep {}", dt);
            return;
        }
        let _span = tracy_span!("physics tick", "tick");

        let start = Instant::now();
        self.collisions.step(&mut self.bodies, &self.params);
        self.stats.collision_time = start.elapsed();

        let start = Instant::now();
        self.dynamics
            .step(&mut self.bodies, self.collisions.contacts_mut(), &self.params, dt);
        self.stats.dynamics_time = start.elapsed();

        let start = Instant::now();
        for (_, fluid) in self.fluids.iter_mut() {
            fluid.step(&mut self.bodies, dt);
        }
        self.stats.fluid_time = start.elapsed();

        self.update_stats();
    }

    fn update_stats(&mut self) {
        let coll = self.collisions.stats();
        let tree = self.collisions.tree();
        self.stats = PhysicsStats {
            body_count: self.bodies.len(),
            dynamic_body_count: self.bodies.iter().filter(|(_, b)| b.is_dynamic()).count(),
            constraint_count: self.dynamics.constraint_count(),
            particle_count: self.fluids.iter().map(|(_, f)| f.len()).sum(),
            tree_height: tree.height(),
            tree_leaves: tree.leaf_count(),
            tree_reinsertions: coll.reinsertions,
            tree_total_insertions: tree.total_insertions(),
            pair_count: coll.pair_count,
            collision_count: coll.collision_count,
            trigger_count: coll.trigger_count,
            ..self.stats
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_g() -> Physics {
        Physics::new(PhysicsParams::default().with_gravity([0.0, 0.0]))
    }

    fn total_momentum(physics: &Physics) -> m::Vec2 {
        physics
            .bodies()
            .filter_map(|(_, b)| b.mass.value().map(|mass| b.velocity.linear * mass))
            .fold(m::Vec2::zero(), |acc, p| acc + p)
    }

    #[test]
    fn collisions_conserve_momentum() {
        let mut physics = zero_g();
        let ball = |x: f64, vx: f64| {
            Body::new_dynamic(Collider::new_circle(0.5), 1.0)
                .with_position([x, 0.0])
                .with_velocity(Velocity {
                    linear: m::Vec2::new(vx, 0.0),
                    angular: 0.0,
                })
                .with_material(Material::frictionless(1.0))
        };
        let a = physics.add_body(ball(-2.0, 3.0));
        let b = physics.add_body(ball(2.0, -1.0));
        let before = total_momentum(&physics);

        let mut collided = false;
        for _ in 0..120 {
            physics.tick(1.0 / 60.0);
            collided |= physics.stats().collision_count > 0;
            let after = total_momentum(&physics);
            assert!((after - before).mag() < 1e-6);
        }
        assert!(collided);
        // they bounced off each other
        let (va, vb) = (
            physics.get_body(a).unwrap().velocity.linear.x,
            physics.get_body(b).unwrap().velocity.linear.x,
        );
        assert!(va < vb);
    }

    #[test]
    fn static_bodies_never_move() {
        let mut physics = Physics::default();
        let ground_pose = m::PoseBuilder::new()
            .with_position([0.0, -1.0])
            .with_rotation(m::Angle::Deg(10.0))
            .build();
        let ground = physics.add_collision_obj(
            Body::new_dynamic(Collider::new_rect(10.0, 1.0), 1.0).with_pose(ground_pose),
        );
        physics.add_bodies((0..5).map(|i| {
            Body::new_dynamic(Collider::new_square(0.5), 1.0).with_position([i as f64 - 2.0, 1.0])
        }));

        for _ in 0..180 {
            if let Some(body) = physics.get_body_mut(ground) {
                body.apply_force(m::Vec2::new(1000.0, 1000.0));
                body.apply_impulse(m::Vec2::new(10.0, 0.0), m::Vec2::unit_y());
            }
            physics.tick(1.0 / 60.0);
            let body = physics.get_body(ground).unwrap();
            assert_eq!(body.pose, ground_pose);
            assert_eq!(body.velocity, Velocity::default());
        }
        assert!(physics.stats().collision_count > 0);
    }

    #[test]
    fn distance_constraint_converges_monotonically() {
        let mut physics = zero_g();
        let body = physics
            .add_body(Body::new_dynamic(Collider::new_circle(0.25), 1.0).with_position([7.0, 0.0]));
        let constraint = ConstraintBuilder::new(body)
            .with_target_point(m::Vec2::zero())
            .build_distance(5.0)
            .unwrap();
        physics.add_constraint(constraint).unwrap();

        let error = |physics: &Physics| {
            (physics.get_body(body).unwrap().pose.translation.mag() - 5.0).abs()
        };
        let mut last_error = error(&physics);
        assert!((last_error - 2.0).abs() < 1e-12);
        for _ in 0..120 {
            physics.tick(1.0 / 60.0);
            let err = error(&physics);
            assert!(err <= last_error + 1e-12);
            last_error = err;
        }
        assert!(last_error < 1e-3);
    }

    #[test]
    fn distance_between_two_bodies_converges_monotonically() {
        let mut physics = zero_g();
        let a = physics.add_body(Body::new_dynamic(Collider::new_circle(0.25), 1.0));
        let b = physics
            .add_body(Body::new_dynamic(Collider::new_circle(0.25), 1.0).with_position([7.0, 0.0]));
        physics
            .add_constraint(
                ConstraintBuilder::new(a)
                    .with_target_body(b, m::Vec2::zero())
                    .build_distance(5.0)
                    .unwrap(),
            )
            .unwrap();

        let positions = |physics: &Physics| {
            (
                physics.get_body(a).unwrap().pose.translation,
                physics.get_body(b).unwrap().pose.translation,
            )
        };
        let error = |physics: &Physics| {
            let (pa, pb) = positions(physics);
            ((pb - pa).mag() - 5.0).abs()
        };
        let mut last_error = error(&physics);
        for _ in 0..120 {
            physics.tick(1.0 / 60.0);
            let err = error(&physics);
            assert!(err <= last_error + 1e-12);
            last_error = err;
            // equal masses meet in the middle
            let (pa, pb) = positions(&physics);
            assert!(((pa.x + pb.x) / 2.0 - 3.5).abs() < 1e-9);
        }
        assert!(last_error < 1e-3);
    }

    #[test]
    fn resting_body_comes_to_rest() {
        let mut physics = Physics::default();
        let ground = physics.add_collision_obj(
            Body::new_static(Collider::new_rect(10.0, 1.0)).with_position([0.0, -0.5]),
        );
        let boxx = physics
            .add_body(Body::new_dynamic(Collider::new_square(1.0), 1.0).with_position([0.0, 0.5]));
        for _ in 0..120 {
            physics.tick(1.0 / 60.0);
        }
        let body = physics.get_body(boxx).unwrap();
        // gravity is cancelled within the same tick, not one tick later
        assert!(body.velocity.linear.y.abs() < 0.01, "{:?}", body.velocity);
        assert!((body.pose.translation.y - 0.5).abs() < 0.02);
        // the ground carries exactly the box's weight, including the remembered part
        let impulse = physics.collisions.contacts().normal_impulse_between(ground, boxx);
        assert!((impulse - 9.81 / 60.0).abs() < 0.01, "{impulse}");
    }

    #[test]
    fn stacked_boxes_stay_upright() {
        let mut physics = Physics::default();
        physics.add_collision_obj(
            Body::new_static(Collider::new_rect(20.0, 1.0)).with_position([0.0, -0.5]),
        );
        let boxes = physics.add_bodies(
            (0..5).map(|i| {
                Body::new_dynamic(Collider::new_square(1.0), 1.0).with_position([0.0, i as f64 + 0.5])
            }),
        );
        for _ in 0..600 {
            physics.tick(1.0 / 60.0);
        }
        for (i, key) in boxes.iter().enumerate() {
            let pose = physics.get_body(*key).unwrap().pose;
            let angle = m::Angle::from(pose.rotation).rad();
            assert!(pose.translation.x.abs() < 0.1, "box {i} drifted to {:?}", pose.translation);
            assert!((pose.translation.y - (i as f64 + 0.5)).abs() < 0.1, "box {i} at {:?}", pose.translation);
            assert!(angle.abs() < 0.1, "box {i} tilted to {angle}");
        }
    }

    #[test]
    fn raycast_against_rect() {
        let mut physics = Physics::default();
        let rect = physics.add_collision_obj(Body::new_static(Collider::new_square(2.0)));

        let hits = physics.raycast(
            &Ray::between(m::Vec2::new(-10.0, 0.0), m::Vec2::new(10.0, 0.0)).unwrap(),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, rect);
        assert!((hits[0].t - 9.0).abs() < 1e-9);

        let misses = physics.raycast(
            &Ray::between(m::Vec2::new(-10.0, 5.0), m::Vec2::new(10.0, 5.0)).unwrap(),
        );
        assert!(misses.is_empty());
    }

    #[test]
    fn raycast_hits_are_sorted() {
        let mut physics = Physics::default();
        let far = physics
            .add_collision_obj(Body::new_static(Collider::new_circle(0.5)).with_position([5.0, 0.0]));
        let near = physics
            .add_collision_obj(Body::new_static(Collider::new_circle(0.5)).with_position([1.0, 0.0]));
        let hits = physics.raycast(&Ray::new(m::Vec2::new(-1.0, 0.0), m::Vec2::unit_x(), 20.0).unwrap());
        itertools::assert_equal(hits.iter().map(|h| h.body), [near, far]);
    }

    #[test]
    fn pick_circle_at_origin() {
        let mut physics = Physics::default();
        let circle = physics.add_body(Body::new_dynamic(Collider::new_circle(1.0), 1.0));
        physics.add_body(Body::new_dynamic(Collider::new_circle(1.0), 1.0).with_position([5.0, 0.0]));
        assert_eq!(physics.pick([0.0, 0.0]), vec![circle]);
        assert!(physics.pick([2.5, 0.0]).is_empty());
    }

    #[test]
    fn fluid_capacity() {
        let mut physics = Physics::default();
        let fluid = physics.add_fluid(Fluid::new(FluidParams {
            max_particles: 5,
            ..Default::default()
        }));
        let added = (0..6)
            .filter(|i| physics.add_particle(fluid, [*i as f64 * 0.2, 0.0]))
            .count();
        assert_eq!(added, 5);
        physics.tick(1.0 / 60.0);
        assert_eq!(physics.stats().particle_count, 5);
        assert_eq!(physics.stats().body_count, 5);

        let removed = physics.remove_fluid(fluid).unwrap();
        assert_eq!(removed.len(), 5);
        assert_eq!(physics.bodies().count(), 0);
        assert!(physics.remove_fluid(fluid).is_none());
        assert!(!physics.add_particle(fluid, [0.0, 0.0]));
    }

    #[test]
    fn removing_fluid_removes_particle_constraints() {
        let mut physics = zero_g();
        let fluid = physics.add_fluid(Fluid::new(FluidParams::default()));
        assert!(physics.add_particle(fluid, [0.0, 0.0]));
        let particle = physics.get_fluid(fluid).unwrap().particles()[0].body;
        let pointer = PointerSource::new();
        let mouse = physics
            .add_constraint(
                ConstraintBuilder::new(particle)
                    .build_mouse(&pointer, m::Vec2::zero())
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(pointer.listener_count(PointerId::Mouse), 1);

        physics.remove_fluid(fluid);
        assert!(physics.get_constraint(mouse).is_none());
        assert_eq!(pointer.listener_count(PointerId::Mouse), 0);
        physics.tick(1.0 / 60.0);
        assert_eq!(physics.stats().constraint_count, 0);
        assert_eq!(physics.stats().body_count, 0);
    }

    #[test]
    fn removing_particle_body_frees_fluid_capacity() {
        let mut physics = zero_g();
        let fluid = physics.add_fluid(Fluid::new(FluidParams {
            max_particles: 2,
            ..Default::default()
        }));
        assert!(physics.add_particle(fluid, [0.0, 0.0]));
        assert!(physics.add_particle(fluid, [1.0, 0.0]));
        assert!(!physics.add_particle(fluid, [2.0, 0.0]));

        let particle = physics.get_fluid(fluid).unwrap().particles()[0].body;
        assert!(physics.remove_body(particle).is_some());
        assert_eq!(physics.get_fluid(fluid).unwrap().len(), 1);
        assert!(physics.add_particle(fluid, [2.0, 0.0]));
        physics.tick(1.0 / 60.0);
        assert_eq!(physics.stats().particle_count, 2);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut physics = Physics::default();
        let a = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        let b = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        let c = physics
            .add_constraint(
                ConstraintBuilder::new(a)
                    .with_target_body(b, m::Vec2::zero())
                    .build_distance(1.0)
                    .unwrap(),
            )
            .unwrap();

        assert!(physics.remove_body(b).is_some());
        assert!(physics.remove_body(b).is_none());
        // the constraint went with the body
        assert!(physics.get_constraint(c).is_none());
        assert!(physics.remove_constraint(c).is_none());
        physics.tick(1.0 / 60.0);
        assert_eq!(physics.stats().body_count, 1);
        assert_eq!(physics.stats().tree_leaves, 1);
    }

    #[test]
    fn constraints_on_missing_bodies_are_rejected() {
        let mut physics = Physics::default();
        let a = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        let gone = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        physics.remove_body(gone);

        let pointer = PointerSource::new();
        let mouse = ConstraintBuilder::new(gone)
            .build_mouse(&pointer, m::Vec2::zero())
            .unwrap();
        assert_eq!(physics.add_constraint(mouse).unwrap_err(), PhysicsError::UnknownBody(gone));
        // the rejected constraint let go of the pointer
        assert_eq!(pointer.listener_count(PointerId::Mouse), 0);

        let spring = ConstraintBuilder::new(a)
            .with_target_body(gone, m::Vec2::zero())
            .build_spring(1.0, 1.0, 0.0)
            .unwrap();
        assert!(matches!(
            physics.add_constraint(spring),
            Err(PhysicsError::UnknownBody(_))
        ));
    }

    #[test]
    fn mouse_drags_body() {
        let mut physics = zero_g();
        let body = physics.add_body(Body::new_dynamic(Collider::new_square(1.0), 1.0));
        let pointer = PointerSource::new();
        pointer.set_position(PointerId::Mouse, m::Vec2::new(3.0, 0.0));
        let key = physics
            .add_constraint(
                ConstraintBuilder::new(body)
                    .build_mouse(&pointer, m::Vec2::zero())
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(pointer.listener_count(PointerId::Mouse), 1);

        for _ in 0..120 {
            physics.tick(1.0 / 60.0);
        }
        let pos = physics.get_body(body).unwrap().pose.translation;
        assert!((pos - m::Vec2::new(3.0, 0.0)).mag() < 0.1);

        physics.remove_constraint(key);
        assert_eq!(pointer.listener_count(PointerId::Mouse), 0);
    }

    #[test]
    fn invalid_timestep_is_ignored() {
        let mut physics = Physics::default();
        let body = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        physics.tick(0.0);
        physics.tick(f64::NAN);
        assert_eq!(physics.get_body(body).unwrap().pose, m::Pose::identity());
    }

    #[test]
    fn forcefield_applies_on_top_of_gravity() {
        let mut physics = Physics::new(PhysicsParams::default().with_gravity([0.0, -1.0]));
        physics.set_forcefield(forcefield::Sum(
            forcefield::Gravity(m::Vec2::new(2.0, 0.0)),
            forcefield::NoneField,
        ));
        let body = physics.add_body(Body::new_dynamic(Collider::new_circle(0.5), 1.0));
        physics.tick(0.5);
        let vel = physics.get_body(body).unwrap().velocity.linear;
        assert!((vel - m::Vec2::new(1.0, -0.5)).mag() < 1e-12);
    }

    #[test]
    fn params_are_tunable_at_runtime() {
        let mut physics = Physics::default();
        physics.set_gravity([0.0, -1.0]);
        physics.params_mut().velocity_iterations = 2;
        assert_eq!(physics.gravity(), m::Vec2::new(0.0, -1.0));
        assert_eq!(physics.params().velocity_iterations, 2);
    }
}
