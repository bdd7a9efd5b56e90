//! Sequential impulse solver for user constraints.
//!
//! Each tick a constraint goes through `pre_solve` once (computing effective masses
//! and bias velocities, and applying the warm start impulse),
//! `solve` once per velocity iteration, and `post_solve` once at the end.

use super::{Attachment, Constraint, ConstraintKind};
use crate::{
    math::{self as m, Angle},
    physics::{Body, PhysicsParams, Velocity},
};

/// Working copy of the parts of a body the solver needs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolverBody {
    pub position: m::Vec2,
    pub rotation: m::Rotor2,
    pub velocity: Velocity,
    pub inv_mass: f64,
    pub inv_inertia: f64,
}

impl SolverBody {
    pub fn from_body(body: &Body) -> Self {
        Self {
            position: body.pose.translation,
            rotation: body.pose.rotation,
            velocity: body.velocity,
            inv_mass: body.mass.inv(),
            inv_inertia: body.moment_of_inertia.inv(),
        }
    }

    /// An immovable point, used for target attachments.
    pub fn fixed(position: m::Vec2) -> Self {
        Self {
            position,
            rotation: m::Rotor2::identity(),
            velocity: Velocity::default(),
            inv_mass: 0.0,
            inv_inertia: 0.0,
        }
    }

    #[inline]
    fn apply_impulse(&mut self, impulse: m::Vec2, offset: m::Vec2) {
        self.velocity.linear += impulse * self.inv_mass;
        self.velocity.angular += m::cross(offset, impulse) * self.inv_inertia;
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SolverState {
    /// Anchors rotated to world orientation.
    r: [m::Vec2; 2],
    last_rotations: Option<[m::Rotor2; 2]>,
    /// Latest position of a target attachment.
    pub target_point: m::Vec2,
    n: m::Vec2,
    n_mass: f64,
    k: [f64; 4],
    bias: m::Vec2,
    acc_impulse: m::Vec2,
    target_vrn: f64,
    v_coef: f64,
    max_impulse: f64,
    pub last_impulse: m::Vec2,
}

impl Constraint {
    /// Poll the target source for its current position. Called once per tick before `pre_solve`.
    pub(crate) fn refresh_target(&mut self) {
        if let Attachment::Target(source) = &mut self.attachment {
            self.state.target_point = source.current_target();
        }
    }
}

#[inline]
fn apply_impulses(bodies: &mut [SolverBody; 2], r: &[m::Vec2; 2], impulse: m::Vec2) {
    bodies[0].apply_impulse(-impulse, r[0]);
    bodies[1].apply_impulse(impulse, r[1]);
}

#[inline]
fn relative_velocity(bodies: &[SolverBody; 2], r: &[m::Vec2; 2]) -> m::Vec2 {
    bodies[1].velocity.point_velocity(r[1]) - bodies[0].velocity.point_velocity(r[0])
}

/// Inverse of the effective mass along a direction.
fn k_scalar(bodies: &[SolverBody; 2], r: &[m::Vec2; 2], n: m::Vec2) -> f64 {
    let rcn = [m::cross(r[0], n), m::cross(r[1], n)];
    bodies[0].inv_mass
        + bodies[1].inv_mass
        + bodies[0].inv_inertia * rcn[0] * rcn[0]
        + bodies[1].inv_inertia * rcn[1] * rcn[1]
}

/// Effective mass matrix for point-to-point constraints, row-major.
/// All zeroes if the matrix is singular.
fn k_tensor(bodies: &[SolverBody; 2], r: &[m::Vec2; 2]) -> [f64; 4] {
    let m_sum = bodies[0].inv_mass + bodies[1].inv_mass;
    let (mut k11, mut k12, mut k21, mut k22) = (m_sum, 0.0, 0.0, m_sum);
    for (body, r) in bodies.iter().zip(r) {
        let rxsq = r.x * r.x * body.inv_inertia;
        let rysq = r.y * r.y * body.inv_inertia;
        let rnxy = -r.x * r.y * body.inv_inertia;
        k11 += rysq;
        k12 += rnxy;
        k21 += rnxy;
        k22 += rxsq;
    }
    let det = k11 * k22 - k12 * k21;
    if det == 0.0 || !det.is_finite() {
        return [0.0; 4];
    }
    let det_inv = 1.0 / det;
    [k22 * det_inv, -k12 * det_inv, -k21 * det_inv, k11 * det_inv]
}

#[inline]
fn mat_mul(k: &[f64; 4], v: m::Vec2) -> m::Vec2 {
    m::Vec2::new(k[0] * v.x + k[1] * v.y, k[2] * v.x + k[3] * v.y)
}

/// Direction and length of the vector between the world-space anchors.
/// The direction is zero if the anchors overlap.
fn anchor_delta(bodies: &[SolverBody; 2], r: &[m::Vec2; 2]) -> (m::Vec2, f64) {
    let delta = (bodies[1].position + r[1]) - (bodies[0].position + r[0]);
    let dist = delta.mag();
    let n = if dist > 0.0 {
        delta / dist
    } else {
        m::Vec2::zero()
    };
    (n, dist)
}

pub(crate) fn pre_solve(
    c: &mut Constraint,
    bodies: &mut [SolverBody; 2],
    params: &PhysicsParams,
    dt: f64,
) {
    let local_anchors = [
        c.anchor,
        match &c.attachment {
            Attachment::Body { anchor, .. } => *anchor,
            Attachment::Target(_) => m::Vec2::zero(),
        },
    ];
    let rotations = [bodies[0].rotation, bodies[1].rotation];
    let st = &mut c.state;
    // anchors follow the bodies' rotation since the last tick
    match st.last_rotations {
        None => {
            st.r = [rotations[0] * local_anchors[0], rotations[1] * local_anchors[1]];
        }
        Some(last) => {
            for i in 0..2 {
                let mut delta = rotations[i] * last[i].reversed();
                delta.normalize();
                st.r[i] = delta * st.r[i];
            }
        }
    }
    st.last_rotations = Some(rotations);
    st.max_impulse = c.max_force.min(params.max_force) * dt;

    let bias_coef = -params.error_bias / dt;
    match c.kind {
        ConstraintKind::Distance { length } => {
            let (n, dist) = anchor_delta(bodies, &st.r);
            st.n = n;
            st.n_mass = inverse_or_zero(k_scalar(bodies, &st.r, n));
            st.bias.x = (bias_coef * (dist - length)).clamp(-params.max_bias, params.max_bias);
            apply_impulses(bodies, &st.r, n * st.acc_impulse.x);
        }
        ConstraintKind::Spring {
            rest_length,
            stiffness,
            damping,
        } => {
            let (n, dist) = anchor_delta(bodies, &st.r);
            let k = k_scalar(bodies, &st.r, n);
            st.n = n;
            st.n_mass = inverse_or_zero(k);
            st.target_vrn = 0.0;
            st.v_coef = 1.0 - (-damping * dt * k).exp();
            let j_spring =
                ((rest_length - dist) * stiffness * dt).clamp(-st.max_impulse, st.max_impulse);
            st.acc_impulse = m::Vec2::new(j_spring, 0.0);
            apply_impulses(bodies, &st.r, n * j_spring);
        }
        ConstraintKind::RotarySpring {
            rest_angle,
            stiffness,
            damping,
        } => {
            let moment = bodies[0].inv_inertia + bodies[1].inv_inertia;
            st.n_mass = inverse_or_zero(moment);
            st.target_vrn = 0.0;
            st.v_coef = 1.0 - (-damping * dt * moment).exp();
            let error = Angle::from(
                rotations[0] * rotations[1].reversed() * m::Rotor2::from_angle(rest_angle).reversed(),
            )
            .rad();
            let j_spring = (error * stiffness * dt).clamp(-st.max_impulse, st.max_impulse);
            st.acc_impulse = m::Vec2::new(j_spring, 0.0);
            bodies[0].velocity.angular -= j_spring * bodies[0].inv_inertia;
            bodies[1].velocity.angular += j_spring * bodies[1].inv_inertia;
        }
        ConstraintKind::Pivot => {
            st.k = k_tensor(bodies, &st.r);
            let delta = (bodies[1].position + st.r[1]) - (bodies[0].position + st.r[0]);
            st.bias = m::clamp_mag(delta * bias_coef, params.max_bias);
            apply_impulses(bodies, &st.r, st.acc_impulse);
        }
    }
}

pub(crate) fn solve(c: &mut Constraint, bodies: &mut [SolverBody; 2]) {
    let st = &mut c.state;
    match c.kind {
        ConstraintKind::Distance { .. } => {
            let vrn = relative_velocity(bodies, &st.r).dot(st.n);
            let jn = (st.bias.x - vrn) * st.n_mass;
            let old = st.acc_impulse.x;
            st.acc_impulse.x = (old + jn).clamp(-st.max_impulse, st.max_impulse);
            apply_impulses(bodies, &st.r, st.n * (st.acc_impulse.x - old));
        }
        ConstraintKind::Spring { .. } => {
            let vrn = relative_velocity(bodies, &st.r).dot(st.n);
            let v_damp = (st.target_vrn - vrn) * st.v_coef;
            st.target_vrn = vrn + v_damp;
            let j_damp = v_damp * st.n_mass;
            st.acc_impulse.x += j_damp;
            apply_impulses(bodies, &st.r, st.n * j_damp);
        }
        ConstraintKind::RotarySpring { .. } => {
            let wrn = bodies[0].velocity.angular - bodies[1].velocity.angular;
            let w_damp = (st.target_vrn - wrn) * st.v_coef;
            st.target_vrn = wrn + w_damp;
            let j_damp = w_damp * st.n_mass;
            st.acc_impulse.x += j_damp;
            bodies[0].velocity.angular += j_damp * bodies[0].inv_inertia;
            bodies[1].velocity.angular -= j_damp * bodies[1].inv_inertia;
        }
        ConstraintKind::Pivot => {
            let vr = relative_velocity(bodies, &st.r);
            let j = mat_mul(&st.k, st.bias - vr);
            let old = st.acc_impulse;
            st.acc_impulse = m::clamp_mag(old + j, st.max_impulse);
            apply_impulses(bodies, &st.r, st.acc_impulse - old);
        }
    }
}

/// Record the tick's impulse and decay what is carried over as the next tick's warm start.
pub(crate) fn post_solve(c: &mut Constraint, params: &PhysicsParams) {
    let st = &mut c.state;
    st.last_impulse = match c.kind {
        ConstraintKind::Pivot => st.acc_impulse,
        _ => st.n * st.acc_impulse.x,
    };
    match c.kind {
        ConstraintKind::Distance { .. } | ConstraintKind::Pivot => {
            st.acc_impulse *= params.constraint_warming;
        }
        // springs recompute their impulse from scratch every tick
        ConstraintKind::Spring { .. } | ConstraintKind::RotarySpring { .. } => {
            st.acc_impulse = m::Vec2::zero();
        }
    }
}

#[inline]
fn inverse_or_zero(k: f64) -> f64 {
    if k > 0.0 && k.is_finite() {
        1.0 / k
    } else {
        0.0
    }
}
