//! Sequential impulse resolution of contacts between solid bodies.
//!
//! Contacts found by the collision step are prepared once per tick
//! and then solved together with user constraints by the dynamics step,
//! after external forces have been applied. Accumulated impulses
//! carry over to the next tick for contacts that persist.

use super::narrowphase::Manifold;
use crate::{
    math as m,
    physics::{Body, BodyKey, PhysicsParams},
};

use std::collections::HashMap;
use thunderdome as td;

/// Normal velocity below which contacts don't bounce,
/// so that resting bodies settle instead of vibrating.
const RESTITUTION_VELOCITY_THRESHOLD: f64 = 0.5;
/// Tangential velocity below which the static friction coefficient is used.
const STATIC_FRICTION_VELOCITY_THRESHOLD: f64 = 0.05;
/// How far a contact point may move between ticks and still count as the same contact.
const PERSISTENT_CONTACT_DISTANCE: f64 = 0.1;

/// A manifold prepared for impulse resolution.
#[derive(Clone, Copy, Debug)]
struct ContactConstraint {
    bodies: [BodyKey; 2],
    normal: m::Vec2,
    tangent: m::Vec2,
    static_friction: f64,
    dynamic_friction: f64,
    points: [ContactPoint; 2],
    point_count: usize,
    /// Positions of the bodies when the contact was found,
    /// used to estimate remaining penetration during position correction.
    start_positions: [m::Vec2; 2],
}

#[derive(Clone, Copy, Debug, Default)]
struct ContactPoint {
    /// World-space position, used to recognize the same contact next tick.
    position: m::Vec2,
    /// Offsets from each body's center of mass to the contact point.
    offsets: [m::Vec2; 2],
    depth: f64,
    normal_mass: f64,
    tangent_mass: f64,
    /// Target normal velocity from restitution.
    bias: f64,
    normal_impulse: f64,
    tangent_impulse: f64,
}

/// Resolves contacts with accumulated, warm-started impulses.
#[derive(Clone, Debug, Default)]
pub struct ContactSolver {
    contacts: Vec<ContactConstraint>,
    previous: Vec<ContactConstraint>,
    previous_lookup: HashMap<[BodyKey; 2], usize>,
}

impl ContactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of manifolds currently being resolved.
    #[inline]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Total normal impulse applied between two bodies during the last solve.
    /// Zero if they weren't in contact.
    pub fn normal_impulse_between(&self, a: BodyKey, b: BodyKey) -> f64 {
        self.contacts
            .iter()
            .filter(|c| c.bodies == [a, b] || c.bodies == [b, a])
            .flat_map(|c| c.points[..c.point_count].iter())
            .map(|p| p.normal_impulse)
            .sum()
    }

    /// Set up contact constraints for the given manifolds and apply the impulses
    /// remembered from contacts that also existed last tick.
    pub(crate) fn prepare(
        &mut self,
        manifolds: &[Manifold],
        bodies: &mut td::Arena<Body>,
        params: &PhysicsParams,
    ) {
        std::mem::swap(&mut self.contacts, &mut self.previous);
        self.contacts.clear();
        self.previous_lookup.clear();
        self.previous_lookup.extend(
            self.previous
                .iter()
                .enumerate()
                .map(|(idx, c)| (c.bodies, idx)),
        );

        for manifold in manifolds {
            let (body_a, body_b) = match (
                bodies.get(manifold.bodies[0].0),
                bodies.get(manifold.bodies[1].0),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let normal = match manifold.normal() {
                Some(n) => *n,
                None => continue,
            };
            let tangent = m::right_normal(normal);
            let restitution = body_a.material.restitution_with(&body_b.material);
            let (inv_mass_a, inv_mass_b) = (body_a.mass.inv(), body_b.mass.inv());
            let (inv_inertia_a, inv_inertia_b) = (
                body_a.moment_of_inertia.inv(),
                body_b.moment_of_inertia.inv(),
            );

            // impulses are along the normal from the first body to the second,
            // so they keep their meaning if the pair comes out of the broadphase swapped
            let [key_a, key_b] = manifold.bodies;
            let previous = self
                .previous_lookup
                .get(&[key_a, key_b])
                .or_else(|| self.previous_lookup.get(&[key_b, key_a]))
                .map(|&idx| &self.previous[idx]);

            let mut points = [ContactPoint::default(); 2];
            let mut point_count = 0;
            for contact in manifold.contacts.iter() {
                let offsets = [
                    contact.point - body_a.pose.translation,
                    contact.point - body_b.pose.translation,
                ];
                let effective_mass = |axis: m::Vec2| {
                    let rn_a = m::cross(offsets[0], axis);
                    let rn_b = m::cross(offsets[1], axis);
                    let k = inv_mass_a
                        + inv_mass_b
                        + inv_inertia_a * rn_a * rn_a
                        + inv_inertia_b * rn_b * rn_b;
                    if k > 0.0 {
                        1.0 / k
                    } else {
                        0.0
                    }
                };

                let rel_vel = body_b.velocity.point_velocity(offsets[1])
                    - body_a.velocity.point_velocity(offsets[0]);
                let normal_vel = rel_vel.dot(normal);
                let bias = if normal_vel < -RESTITUTION_VELOCITY_THRESHOLD {
                    -restitution * normal_vel
                } else {
                    0.0
                };

                let (normal_impulse, tangent_impulse) = previous
                    .and_then(|prev| matching_point(prev, contact.point))
                    .map_or((0.0, 0.0), |p| {
                        (
                            p.normal_impulse * params.constraint_warming,
                            p.tangent_impulse * params.constraint_warming,
                        )
                    });

                points[point_count] = ContactPoint {
                    position: contact.point,
                    offsets,
                    depth: contact.depth,
                    normal_mass: effective_mass(normal),
                    tangent_mass: effective_mass(tangent),
                    bias,
                    normal_impulse,
                    tangent_impulse,
                };
                point_count += 1;
            }

            self.contacts.push(ContactConstraint {
                bodies: manifold.bodies,
                normal,
                tangent,
                static_friction: body_a.material.static_friction_with(&body_b.material),
                dynamic_friction: body_a.material.dynamic_friction_with(&body_b.material),
                points,
                point_count,
                start_positions: [body_a.pose.translation, body_b.pose.translation],
            });
        }

        // warm start
        for constraint in &self.contacts {
            let (body_a, body_b) = match bodies.get2_mut(constraint.bodies[0].0, constraint.bodies[1].0) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            for point in &constraint.points[..constraint.point_count] {
                let impulse = constraint.normal * point.normal_impulse
                    + constraint.tangent * point.tangent_impulse;
                apply_impulse_pair(body_a, body_b, impulse, point.offsets[0], point.offsets[1]);
            }
        }
    }

    /// One sequential impulse pass over every contact.
    pub(crate) fn solve_velocities(&mut self, bodies: &mut td::Arena<Body>) {
        for constraint in &mut self.contacts {
            let (body_a, body_b) = match bodies.get2_mut(constraint.bodies[0].0, constraint.bodies[1].0) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let normal = constraint.normal;
            let tangent = constraint.tangent;

            for point in &mut constraint.points[..constraint.point_count] {
                let [r_a, r_b] = point.offsets;

                // normal impulse, accumulated value kept non-negative
                let rel_vel = body_b.velocity.point_velocity(r_b) - body_a.velocity.point_velocity(r_a);
                let normal_vel = rel_vel.dot(normal);
                let lambda = point.normal_mass * (point.bias - normal_vel);
                let new_impulse = (point.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - point.normal_impulse;
                point.normal_impulse = new_impulse;
                apply_impulse_pair(body_a, body_b, normal * lambda, r_a, r_b);

                // friction bounded by the normal impulse
                let rel_vel = body_b.velocity.point_velocity(r_b) - body_a.velocity.point_velocity(r_a);
                let tangent_vel = rel_vel.dot(tangent);
                let friction_coef = if tangent_vel.abs() < STATIC_FRICTION_VELOCITY_THRESHOLD {
                    constraint.static_friction
                } else {
                    constraint.dynamic_friction
                };
                let max_friction = friction_coef * point.normal_impulse;
                let lambda = -point.tangent_mass * tangent_vel;
                let new_impulse =
                    (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - point.tangent_impulse;
                point.tangent_impulse = new_impulse;
                apply_impulse_pair(body_a, body_b, tangent * lambda, r_a, r_b);
            }
        }
    }

    /// Push penetrating bodies apart directly, without touching velocities
    /// so that no energy is added.
    pub(crate) fn correct_positions(&mut self, bodies: &mut td::Arena<Body>, params: &PhysicsParams) {
        for constraint in &self.contacts {
            let (body_a, body_b) = match bodies.get2_mut(constraint.bodies[0].0, constraint.bodies[1].0) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let inv_mass_sum = body_a.mass.inv() + body_b.mass.inv();
            if inv_mass_sum <= 0.0 {
                continue;
            }
            let moved = (body_b.pose.translation - constraint.start_positions[1])
                - (body_a.pose.translation - constraint.start_positions[0]);
            let depth = constraint.points[..constraint.point_count]
                .iter()
                .fold(0.0_f64, |acc, p| acc.max(p.depth))
                - moved.dot(constraint.normal);

            let correction_mag = (depth - params.contact_slop).max(0.0) / inv_mass_sum
                * params.position_correction;
            let correction = constraint.normal * correction_mag;
            body_a.pose.translation -= correction * body_a.mass.inv();
            body_b.pose.translation += correction * body_b.mass.inv();
        }
    }
}

fn matching_point(prev: &ContactConstraint, position: m::Vec2) -> Option<&ContactPoint> {
    prev.points[..prev.point_count]
        .iter()
        .map(|p| (p, (p.position - position).mag_sq()))
        .filter(|(_, dist_sq)| *dist_sq < PERSISTENT_CONTACT_DISTANCE * PERSISTENT_CONTACT_DISTANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

#[inline]
fn apply_impulse_pair(a: &mut Body, b: &mut Body, impulse: m::Vec2, r_a: m::Vec2, r_b: m::Vec2) {
    a.apply_impulse(-impulse, r_a);
    b.apply_impulse(impulse, r_b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{
        collision::narrowphase::{Contact, ContactResult},
        Collider,
    };

    fn resting_box() -> (td::Arena<Body>, [BodyKey; 2], Manifold) {
        let mut bodies = td::Arena::new();
        let ground = BodyKey(bodies.insert(Body::new_static(Collider::new_rect(4.0, 1.0))));
        let boxx = BodyKey(bodies.insert(
            Body::new_dynamic(Collider::new_square(1.0), 1.0).with_position([0.0, 0.99]),
        ));
        let contact = |x: f64| Contact {
            normal: m::Unit::unit_y(),
            depth: 0.01,
            point: m::Vec2::new(x, 0.495),
        };
        let manifold = Manifold {
            bodies: [ground, boxx],
            contacts: ContactResult::Two(contact(-0.5), contact(0.5)),
        };
        (bodies, [ground, boxx], manifold)
    }

    #[test]
    fn impulses_carry_over_between_ticks() {
        let params = PhysicsParams::default();
        let (mut bodies, [ground, boxx], manifold) = resting_box();
        let mut solver = ContactSolver::new();

        // box falling with one tick's worth of gravity
        bodies[boxx.0].velocity.linear.y = -0.5;
        solver.prepare(&[manifold], &mut bodies, &params);
        for _ in 0..50 {
            solver.solve_velocities(&mut bodies);
        }
        let first = solver.normal_impulse_between(ground, boxx);
        assert!((first - 0.5).abs() < 1e-6);
        assert!(bodies[boxx.0].velocity.linear.y.abs() < 1e-6);

        // next tick starts from the scaled impulse instead of zero
        bodies[boxx.0].velocity.linear.y = 0.0;
        solver.prepare(&[manifold], &mut bodies, &params);
        assert!((solver.normal_impulse_between(boxx, ground) - first * params.constraint_warming).abs() < 1e-9);
        assert!(bodies[boxx.0].velocity.linear.y > 0.0);

        // contacts that went away don't leave anything behind
        solver.prepare(&[], &mut bodies, &params);
        assert!(solver.is_empty());
        assert_eq!(solver.normal_impulse_between(ground, boxx), 0.0);
    }

    #[test]
    fn distant_contacts_start_from_zero() {
        let params = PhysicsParams::default();
        let (mut bodies, [ground, boxx], manifold) = resting_box();
        let mut solver = ContactSolver::new();
        bodies[boxx.0].velocity.linear.y = -0.5;
        solver.prepare(&[manifold], &mut bodies, &params);
        solver.solve_velocities(&mut bodies);

        let moved = Manifold {
            contacts: manifold.contacts.map(|c| Contact {
                point: c.point + m::Vec2::new(0.0, 1.0),
                ..c
            }),
            ..manifold
        };
        solver.prepare(&[moved], &mut bodies, &params);
        assert_eq!(solver.normal_impulse_between(ground, boxx), 0.0);
    }
}
