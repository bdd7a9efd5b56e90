//! Particle fluids simulated with double density relaxation
//! (Clavet et al. 2005, "Particle-based Viscoelastic Fluid Simulation").
//!
//! Every particle is also a non-rotating body in the physics world,
//! so fluids collide with rigid bodies through the ordinary contact solver.
//! Particles of the same fluid share a collision group and only interact
//! with each other through the pressure computed here.

use super::{Body, BodyKey, Collider, CollisionFilter, Material};
use crate::{math as m, util::tracy_span};

use thunderdome as td;

mod kdtree;
use kdtree::KdTree;

/// Key type to look up a fluid stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FluidKey(pub(crate) td::Index);

#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct FluidParams {
    /// Density the pressure pushes towards, in kernel-weighted neighbor counts.
    pub rest_density: f64,
    /// Radius within which particles affect each other.
    pub smoothing_radius: f64,
    /// Pressure per unit of density over the rest density.
    pub stiffness: f64,
    /// Pressure per unit of near-density. Keeps particles from clumping.
    pub stiffness_near: f64,
    pub particle_radius: f64,
    pub particle_mass: f64,
    pub max_particles: usize,
    /// Collision group of every particle. Should be nonzero
    /// so that particles don't run the contact solver against each other.
    pub collision_group: u32,
    pub collision_layers: u32,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            rest_density: 3.0,
            smoothing_radius: 0.5,
            stiffness: 20.0,
            stiffness_near: 50.0,
            particle_radius: 0.08,
            particle_mass: 0.05,
            max_particles: 1000,
            collision_group: 1,
            collision_layers: u32::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub body: BodyKey,
    /// Density as of the last tick.
    pub density: f64,
    pub near_density: f64,
}

/// A pool of fluid particles.
///
/// Create one, register it with [`Physics::add_fluid`][crate::physics::Physics::add_fluid]
/// and fill it with [`Physics::add_particle`][crate::physics::Physics::add_particle].
#[derive(Clone, Debug)]
pub struct Fluid {
    pub params: FluidParams,
    particles: Vec<Particle>,
    tree: KdTree,
    positions: Vec<m::Vec2>,
    neighbors: Vec<usize>,
}

impl Fluid {
    pub fn new(params: FluidParams) -> Self {
        Self {
            params,
            particles: Vec::with_capacity(params.max_particles),
            tree: KdTree::default(),
            positions: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.params.max_particles
    }

    /// The body that represents a new particle at the given position.
    pub(crate) fn particle_body(&self, position: m::Vec2) -> Body {
        Body::new_particle(
            Collider::new_circle(self.params.particle_radius),
            self.params.particle_mass,
        )
        .with_position(position)
        .with_material(Material::frictionless(0.0))
        .with_filter(CollisionFilter {
            layers: self.params.collision_layers,
            group: self.params.collision_group,
        })
    }

    /// Register a particle body. Returns `false` if the fluid is at capacity.
    pub(crate) fn push_particle(&mut self, body: BodyKey) -> bool {
        if self.is_full() {
            return false;
        }
        self.particles.push(Particle {
            body,
            density: 0.0,
            near_density: 0.0,
        });
        true
    }

    /// Forget the particle represented by the given body.
    /// Returns `false` if the body isn't a particle of this fluid.
    pub(crate) fn remove_particle(&mut self, body: BodyKey) -> bool {
        match self.particles.iter().position(|p| p.body == body) {
            Some(idx) => {
                self.particles.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Push particles apart or together according to pressure,
    /// and move the bodies accordingly.
    pub(crate) fn step(&mut self, bodies: &mut td::Arena<Body>, dt: f64) {
        let _span = tracy_span!("fluid step", "step");

        // particles removed as bodies disappear with them
        self.particles.retain(|p| bodies.contains(p.body.0));
        if self.particles.is_empty() {
            return;
        }

        self.positions.clear();
        self.positions.extend(
            self.particles
                .iter()
                .map(|p| bodies[p.body.0].pose.translation),
        );
        self.tree.rebuild(self.positions.iter().copied());
        log::trace!("fluid tree rebuilt with {} particles", self.tree.len());

        let h = self.params.smoothing_radius;
        if !(h > 0.0) {
            return;
        }
        let dt_sq = dt * dt;
        for i in 0..self.particles.len() {
            let pos_i = self.positions[i];
            self.neighbors.clear();
            self.tree.within_radius(pos_i, h, &mut self.neighbors);

            let mut density = 0.0;
            let mut near_density = 0.0;
            for &j in &self.neighbors {
                if j == i {
                    continue;
                }
                let q = (self.positions[j] - pos_i).mag() / h;
                if q < 1.0 {
                    let one_minus_q = 1.0 - q;
                    density += one_minus_q * one_minus_q;
                    near_density += one_minus_q * one_minus_q * one_minus_q;
                }
            }
            self.particles[i].density = density;
            self.particles[i].near_density = near_density;

            let pressure = self.params.stiffness * (density - self.params.rest_density);
            let pressure_near = self.params.stiffness_near * near_density;
            let mut displacement = m::Vec2::zero();
            for &j in &self.neighbors {
                if j == i {
                    continue;
                }
                let offset = self.positions[j] - pos_i;
                let dist = offset.mag();
                let q = dist / h;
                if q >= 1.0 || dist == 0.0 {
                    continue;
                }
                let one_minus_q = 1.0 - q;
                let d = (offset / dist)
                    * (dt_sq * (pressure * one_minus_q + pressure_near * one_minus_q * one_minus_q));
                self.positions[j] += d / 2.0;
                displacement -= d / 2.0;
            }
            self.positions[i] += displacement;
        }

        for (particle, new_pos) in self.particles.iter().zip(&self.positions) {
            let body = &mut bodies[particle.body.0];
            let delta = *new_pos - body.pose.translation;
            body.pose.translation = *new_pos;
            body.velocity.linear += delta / dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fluid_with_particles(params: FluidParams, positions: &[m::Vec2]) -> (Fluid, td::Arena<Body>) {
        let mut fluid = Fluid::new(params);
        let mut bodies = td::Arena::new();
        for pos in positions {
            let key = BodyKey(bodies.insert(fluid.particle_body(*pos)));
            assert!(fluid.push_particle(key));
        }
        (fluid, bodies)
    }

    #[test]
    fn capacity_is_enforced() {
        let mut fluid = Fluid::new(FluidParams {
            max_particles: 3,
            ..Default::default()
        });
        let mut bodies = td::Arena::new();
        let results: Vec<bool> = (0..4)
            .map(|i| {
                let key = BodyKey(bodies.insert(fluid.particle_body(m::Vec2::new(i as f64, 0.0))));
                fluid.push_particle(key)
            })
            .collect();
        assert_eq!(results, vec![true, true, true, false]);
        assert_eq!(fluid.len(), 3);
        assert!(fluid.is_full());
    }

    #[test]
    fn removing_a_particle_frees_capacity() {
        let params = FluidParams {
            max_particles: 2,
            ..Default::default()
        };
        let (mut fluid, mut bodies) =
            fluid_with_particles(params, &[m::Vec2::zero(), m::Vec2::new(1.0, 0.0)]);
        assert!(fluid.is_full());
        let first = fluid.particles()[0].body;
        assert!(fluid.remove_particle(first));
        assert!(!fluid.remove_particle(first));
        assert!(!fluid.is_full());

        let key = BodyKey(bodies.insert(fluid.particle_body(m::Vec2::new(2.0, 0.0))));
        assert!(fluid.push_particle(key));
        assert_eq!(fluid.len(), 2);
    }

    #[test]
    fn compressed_particles_spread_out() {
        let params = FluidParams {
            rest_density: 0.0,
            ..Default::default()
        };
        let (mut fluid, mut bodies) =
            fluid_with_particles(params, &[m::Vec2::new(0.0, 0.0), m::Vec2::new(0.1, 0.0)]);
        fluid.step(&mut bodies, 1.0 / 60.0);

        let [a, b] = [fluid.particles()[0].body, fluid.particles()[1].body];
        let (pa, pb) = (bodies[a.0].pose.translation, bodies[b.0].pose.translation);
        assert!(pb.x - pa.x > 0.1);
        // pushed apart symmetrically, so momentum stays zero
        let momentum = bodies[a.0].velocity.linear + bodies[b.0].velocity.linear;
        assert!(momentum.mag() < 1e-9);
        assert!(fluid.particles()[0].density > 0.0);
    }

    #[test]
    fn removed_bodies_leave_the_fluid() {
        let (mut fluid, mut bodies) = fluid_with_particles(
            FluidParams::default(),
            &[m::Vec2::zero(), m::Vec2::new(5.0, 0.0)],
        );
        let gone = fluid.particles()[0].body;
        bodies.remove(gone.0);
        fluid.step(&mut bodies, 1.0 / 60.0);
        assert_eq!(fluid.len(), 1);
        // lone particles have nothing pushing them
        let remaining = fluid.particles()[0].body;
        assert_eq!(bodies[remaining.0].pose.translation, m::Vec2::new(5.0, 0.0));
    }

    #[test]
    fn overlapping_particles_dont_produce_nan() {
        let (mut fluid, mut bodies) =
            fluid_with_particles(FluidParams::default(), &[m::Vec2::zero(), m::Vec2::zero()]);
        fluid.step(&mut bodies, 1.0 / 60.0);
        for p in fluid.particles() {
            let pos = bodies[p.body.0].pose.translation;
            assert!(pos.x.is_finite() && pos.y.is_finite());
        }
    }
}
