use crate::math as m;

/// Tunable parameters of the physics world.
///
/// All of these can be changed between ticks through
/// [`Physics::params_mut`][crate::physics::Physics::params_mut].
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PhysicsParams {
    /// Constant acceleration applied to every dynamic body.
    pub gravity: m::Vec2,
    /// Number of sequential impulse passes over contacts and constraints per tick.
    /// More iterations give stiffer stacks and joints at a linear cost.
    pub velocity_iterations: usize,
    /// Number of passes of positional correction for contacts per tick.
    pub position_iterations: usize,
    /// Fraction of last tick's accumulated constraint impulse that is applied
    /// at the start of the next tick. Should be below 1.
    pub constraint_warming: f64,
    /// Upper bound for the speed at which constraints correct positional error.
    pub max_bias: f64,
    /// Upper bound for the force a constraint can apply. Infinite by default.
    pub max_force: f64,
    /// Fraction of a hard constraint's positional error corrected per tick.
    pub error_bias: f64,
    /// Penetration allowed between colliding bodies before positional correction kicks in.
    /// Some slop keeps resting contacts from jittering.
    pub contact_slop: f64,
    /// Fraction of the penetration beyond the slop corrected per position iteration.
    pub position_correction: f64,
    /// Thickness given to line colliders in point and ray queries.
    pub point_size: f64,
    /// Linear velocity lost per second to air friction, as a fraction.
    pub linear_damping: f64,
    /// Angular velocity lost per second to air friction, as a fraction.
    pub angular_damping: f64,
    pub tree: TreeParams,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            gravity: m::Vec2::new(0.0, -9.81),
            velocity_iterations: 10,
            position_iterations: 3,
            constraint_warming: 0.8,
            max_bias: 100.0,
            max_force: f64::INFINITY,
            error_bias: 0.2,
            contact_slop: 0.005,
            position_correction: 0.4,
            point_size: 0.1,
            linear_damping: 0.0,
            angular_damping: 0.0,
            tree: TreeParams::default(),
        }
    }
}

impl PhysicsParams {
    pub fn with_gravity(mut self, gravity: impl Into<[f64; 2]>) -> Self {
        let g = gravity.into();
        self.gravity = m::Vec2::new(g[0], g[1]);
        self
    }

    pub fn with_velocity_iterations(mut self, iterations: usize) -> Self {
        self.velocity_iterations = iterations;
        self
    }

    pub fn with_position_iterations(mut self, iterations: usize) -> Self {
        self.position_iterations = iterations;
        self
    }

    pub fn with_constraint_warming(mut self, warming: f64) -> Self {
        self.constraint_warming = warming;
        self
    }

    pub fn with_max_bias(mut self, max_bias: f64) -> Self {
        self.max_bias = max_bias;
        self
    }

    pub fn with_max_force(mut self, max_force: f64) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_point_size(mut self, point_size: f64) -> Self {
        self.point_size = point_size;
        self
    }

    /// Set linear and angular air friction.
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_tree_params(mut self, tree: TreeParams) -> Self {
        self.tree = tree;
        self
    }
}

/// Parameters controlling how much extra room the AABB tree gives moving bodies.
///
/// Each leaf of the tree stores a box bigger than its body by a margin
/// proportional to the body's speed, so that it doesn't need to be reinserted
/// every time the body moves. Bigger margins mean fewer reinsertions but more
/// candidate pairs for the narrowphase.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TreeParams {
    /// Seconds of movement at the current speed the margin should cover.
    pub margin_scale: f64,
    pub margin_min: f64,
    pub margin_max: f64,
    /// Margins are only recomputed when the new value differs from the old by more than this.
    pub margin_slop: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            margin_scale: 0.1,
            margin_min: 0.05,
            margin_max: 2.0,
            margin_slop: 0.1,
        }
    }
}

impl TreeParams {
    /// The margin a body with the given velocity should have.
    #[inline]
    pub fn margin_for(&self, velocity: m::Vec2) -> f64 {
        (velocity.x.abs().max(velocity.y.abs()) * self.margin_scale)
            .clamp(self.margin_min, self.margin_max.max(self.margin_min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "serde-types")]
    fn partial_config_fills_in_defaults() {
        let params: PhysicsParams = ron::from_str(
            "(velocity_iterations: 4, point_size: 0.5, tree: (margin_min: 0.2))",
        )
        .expect("valid params");
        assert_eq!(params.velocity_iterations, 4);
        assert_eq!(params.position_iterations, 3);
        assert_eq!(params.point_size, 0.5);
        assert_eq!(params.tree.margin_min, 0.2);
        assert_eq!(params.tree.margin_max, TreeParams::default().margin_max);
        assert_eq!(params.gravity, m::Vec2::new(0.0, -9.81));
    }

    #[test]
    fn margin_is_clamped() {
        let tree = TreeParams::default();
        assert_eq!(tree.margin_for(m::Vec2::zero()), tree.margin_min);
        assert_eq!(tree.margin_for(m::Vec2::new(0.0, -1000.0)), tree.margin_max);
        assert!((tree.margin_for(m::Vec2::new(5.0, 2.0)) - 0.5).abs() < 1e-12);
    }
}
