use super::{
    collision::ContactSolver,
    constraint::solver::{self, SolverBody},
    forcefield::{ForceField, NoneField},
    Attachment, Body, BodyKey, Constraint, ConstraintKey, PhysicsParams,
};
use crate::{math as m, util::tracy_span};

use thunderdome as td;

/// Owns the user constraints and moves bodies according to forces and velocities.
pub struct DynamicsSpace {
    constraints: td::Arena<Constraint>,
    forcefield: Box<dyn ForceField>,
}

impl Default for DynamicsSpace {
    fn default() -> Self {
        Self {
            constraints: td::Arena::new(),
            forcefield: Box::new(NoneField),
        }
    }
}

impl DynamicsSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the extra acceleration field applied on top of gravity.
    pub fn set_forcefield(&mut self, field: impl ForceField + 'static) {
        self.forcefield = Box::new(field);
    }

    pub(crate) fn add_constraint(&mut self, constraint: Constraint) -> ConstraintKey {
        ConstraintKey(self.constraints.insert(constraint))
    }

    pub(crate) fn remove_constraint(&mut self, key: ConstraintKey) -> Option<Constraint> {
        let mut constraint = self.constraints.remove(key.0)?;
        constraint.detach();
        Some(constraint)
    }

    /// Remove every constraint involving the given body, returning how many were removed.
    pub(crate) fn remove_constraints_of(&mut self, body: BodyKey) -> usize {
        let mut removed = 0;
        self.constraints.retain(|_, c| {
            if c.involves(body) {
                c.detach();
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    #[inline]
    pub fn constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key.0)
    }

    #[inline]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintKey, &Constraint)> {
        self.constraints.iter().map(|(i, c)| (ConstraintKey(i), c))
    }

    /// Integrate forces into velocities, solve contacts and constraints,
    /// and integrate velocities into poses.
    pub fn step(
        &mut self,
        bodies: &mut td::Arena<Body>,
        contacts: &mut ContactSolver,
        params: &PhysicsParams,
        dt: f64,
    ) {
        let _span = tracy_span!("dynamics step", "step");

        let lin_damping = 1.0 / (1.0 + dt * params.linear_damping);
        let ang_damping = 1.0 / (1.0 + dt * params.angular_damping);
        for (_, body) in bodies.iter_mut() {
            if body.is_static() {
                continue;
            }
            let mut accel = body.force * body.mass.inv();
            // gravity and fields only act on things that have mass
            if body.mass.value().is_some() {
                accel += params.gravity + self.forcefield.value_at(body.pose.translation);
            }
            body.velocity.linear += accel * dt;
            body.velocity.angular += body.torque * body.moment_of_inertia.inv() * dt;
            body.velocity.linear *= lin_damping;
            body.velocity.angular *= ang_damping;
        }

        self.solve_velocities(bodies, contacts, params, dt);

        for (_, body) in bodies.iter_mut() {
            if body.is_static() {
                continue;
            }
            body.pose = body.velocity.apply_to_pose(dt, body.pose);
            body.force = m::Vec2::zero();
            body.torque = 0.0;
        }

        let _span = tracy_span!("correct positions", "step");
        for _ in 0..params.position_iterations {
            contacts.correct_positions(bodies, params);
        }
    }

    /// Each velocity pass solves contacts first, then constraints.
    fn solve_velocities(
        &mut self,
        bodies: &mut td::Arena<Body>,
        contacts: &mut ContactSolver,
        params: &PhysicsParams,
        dt: f64,
    ) {
        let _span = tracy_span!("solve velocities", "solve_velocities");

        for (_, c) in self.constraints.iter_mut() {
            c.refresh_target();
            let Some(mut working) = gather(bodies, c) else {
                continue;
            };
            solver::pre_solve(c, &mut working, params, dt);
            scatter(bodies, c, &working);
        }
        for _ in 0..params.velocity_iterations {
            contacts.solve_velocities(bodies);
            for (_, c) in self.constraints.iter_mut() {
                let Some(mut working) = gather(bodies, c) else {
                    continue;
                };
                solver::solve(c, &mut working);
                scatter(bodies, c, &working);
            }
        }
        for (_, c) in self.constraints.iter_mut() {
            solver::post_solve(c, params);
        }
    }
}

/// Copy the bodies a constraint acts on into solver form.
/// `None` if a body has been removed.
fn gather(bodies: &td::Arena<Body>, c: &Constraint) -> Option<[SolverBody; 2]> {
    let a = SolverBody::from_body(bodies.get(c.body.0)?);
    let b = match &c.attachment {
        Attachment::Body { key, .. } => SolverBody::from_body(bodies.get(key.0)?),
        Attachment::Target(_) => SolverBody::fixed(c.state.target_point),
    };
    Some([a, b])
}

fn scatter(bodies: &mut td::Arena<Body>, c: &Constraint, working: &[SolverBody; 2]) {
    if let Some(body) = bodies.get_mut(c.body.0) {
        if body.is_dynamic() {
            body.velocity = working[0].velocity;
        }
    }
    if let Attachment::Body { key, .. } = &c.attachment {
        if let Some(body) = bodies.get_mut(key.0) {
            if body.is_dynamic() {
                body.velocity = working[1].velocity;
            }
        }
    }
}
