use super::{
    contact::ContactSolver,
    narrowphase::{intersection_check, Manifold},
    query::{point_collider_bool, ray_collider, RayHit},
    AabbTree, Ray, AABB,
};
use crate::{
    math as m,
    physics::{Body, BodyKey, PhysicsParams},
    util::tracy_span,
};

use thunderdome as td;

/// Counters from the most recent collision step.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollisionStats {
    pub pair_count: usize,
    pub collision_count: usize,
    pub trigger_count: usize,
    pub reinsertions: usize,
}

/// Owns the broadphase tree and finds contacts between bodies.
#[derive(Clone, Debug, Default)]
pub struct CollisionsSpace {
    tree: AabbTree,
    pairs: Vec<[BodyKey; 2]>,
    collision_manifolds: Vec<Manifold>,
    trigger_manifolds: Vec<Manifold>,
    contacts: ContactSolver,
    query_buf: Vec<BodyKey>,
    stats: CollisionStats,
}

impl CollisionsSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a body's bounds.
    pub fn add_body(&mut self, key: BodyKey, body: &Body, params: &PhysicsParams) {
        let aabb = body.collider.aabb(&body.collider_pose());
        self.tree
            .insert(key, aabb, body.velocity.linear, &params.tree);
    }

    /// Stop tracking a body. Returns `false` if it wasn't tracked.
    pub fn remove_body(&mut self, key: BodyKey) -> bool {
        self.tree.remove(key)
    }

    pub fn contains(&self, key: BodyKey) -> bool {
        self.tree.contains(key)
    }

    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Contacts prepared by the last step, to be resolved by the dynamics step.
    pub fn contacts(&self) -> &ContactSolver {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut ContactSolver {
        &mut self.contacts
    }

    /// Manifolds between solid bodies found during the last step.
    pub fn collision_manifolds(&self) -> &[Manifold] {
        &self.collision_manifolds
    }

    /// Manifolds involving at least one trigger found during the last step.
    pub fn trigger_manifolds(&self) -> &[Manifold] {
        &self.trigger_manifolds
    }

    /// Find collisions between the given bodies and prepare them for resolution.
    ///
    /// Impulses remembered from contacts that persist since the last step
    /// are applied to the bodies here.
    pub fn step(&mut self, bodies: &mut td::Arena<Body>, params: &PhysicsParams) {
        let _span = tracy_span!("collision step", "step");

        self.stats.reinsertions = {
            let _span = tracy_span!("update tree", "step");
            self.tree.update(&params.tree, |key| {
                bodies
                    .get(key.0)
                    .map(|b| (b.collider.aabb(&b.collider_pose()), b.velocity.linear))
            })
        };
        log::trace!("{} tree reinsertions", self.stats.reinsertions);

        {
            let _span = tracy_span!("broadphase", "step");
            self.tree.collect_pairs(&mut self.pairs);
        }

        {
            let _span = tracy_span!("narrowphase", "step");
            self.find_manifolds(bodies);
        }

        self.stats.pair_count = self.pairs.len();
        self.stats.collision_count = self.collision_manifolds.len();
        self.stats.trigger_count = self.trigger_manifolds.len();

        let _span = tracy_span!("prepare contacts", "step");
        self.contacts
            .prepare(&self.collision_manifolds, bodies, params);
    }

    fn find_manifolds(&mut self, bodies: &td::Arena<Body>) {
        self.collision_manifolds.clear();
        self.trigger_manifolds.clear();

        for &[key_a, key_b] in &self.pairs {
            let (body_a, body_b) = match (bodies.get(key_a.0), bodies.get(key_b.0)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            if body_a.is_static() && body_b.is_static() {
                continue;
            }
            if !body_a.filter.can_collide_with(&body_b.filter) {
                continue;
            }

            let contacts = intersection_check(
                &body_a.collider_pose(),
                &body_a.collider,
                &body_b.collider_pose(),
                &body_b.collider,
            );
            if contacts.is_empty() {
                continue;
            }
            let manifold = Manifold {
                bodies: [key_a, key_b],
                contacts,
            };
            if body_a.is_trigger || body_b.is_trigger {
                self.trigger_manifolds.push(manifold);
            } else {
                self.collision_manifolds.push(manifold);
            }
        }
    }

    /// Find all bodies whose collider contains the given point.
    pub fn pick(
        &mut self,
        point: m::Vec2,
        bodies: &td::Arena<Body>,
        point_size: f64,
    ) -> Vec<BodyKey> {
        self.query_buf.clear();
        self.tree.query_point(point, point_size / 2.0, &mut self.query_buf);
        self.query_buf
            .iter()
            .copied()
            .filter(|key| {
                bodies.get(key.0).map_or(false, |body| {
                    point_collider_bool(point, &body.collider_pose(), &body.collider, point_size)
                })
            })
            .collect()
    }

    /// Find all bodies the ray hits, sorted by distance along the ray.
    pub fn raycast(&mut self, ray: &Ray, bodies: &td::Arena<Body>, point_size: f64) -> Vec<RayHit> {
        self.query_buf.clear();
        self.tree.query_ray(ray, point_size / 2.0, &mut self.query_buf);
        let mut hits: Vec<RayHit> = self
            .query_buf
            .iter()
            .filter_map(|key| {
                let body = bodies.get(key.0)?;
                let (t, normal) =
                    ray_collider(ray, &body.collider_pose(), &body.collider, point_size)?;
                Some(RayHit {
                    body: *key,
                    t,
                    point: ray.point_at(t),
                    normal,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        hits
    }

    /// Find all bodies whose bounding boxes intersect the given box.
    pub fn query_aabb(&mut self, aabb: &AABB) -> Vec<BodyKey> {
        self.query_buf.clear();
        self.tree.query_aabb(aabb, &mut self.query_buf);
        self.query_buf.clone()
    }
}
