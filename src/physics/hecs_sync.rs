use crate::{
    math as m,
    physics::{BodyKey, Physics},
};

use thunderdome as td;

#[derive(Clone, Copy, Debug)]
pub struct HecsSyncOptions {
    pub hecs_to_physics: bool,
    pub physics_to_hecs: bool,
    pub autodelete: bool,
}

impl HecsSyncOptions {
    #[inline]
    pub fn both_ways() -> Self {
        Self {
            hecs_to_physics: true,
            physics_to_hecs: true,
            autodelete: true,
        }
    }

    #[inline]
    pub fn hecs_to_physics_only() -> Self {
        Self {
            hecs_to_physics: true,
            physics_to_hecs: false,
            autodelete: true,
        }
    }
}

/// Automatically syncs body poses between a [`hecs`][hecs] world
/// and a [`Physics`][super::Physics] world.
///
/// Entities are linked to bodies by a [`BodyKey`] component
/// and their pose is stored in a [`Pose`][crate::math::Pose] component.
#[derive(Default, Debug)]
pub struct HecsSyncManager {
    /// If set, automatically uses these options to register all hecs entities
    /// with [`BodyKey`] components that haven't been registered manually. None by default.
    pub default_opts: Option<HecsSyncOptions>,
    body_entity_map: td::Arena<(hecs::Entity, HecsSyncOptions)>,
}

impl HecsSyncManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn new_autosync(opts: HecsSyncOptions) -> Self {
        Self {
            default_opts: Some(opts),
            ..Self::default()
        }
    }

    #[inline]
    pub fn register_body(&mut self, body: BodyKey, entity: hecs::Entity, opts: HecsSyncOptions) {
        self.body_entity_map.insert_at(body.0, (entity, opts));
    }

    /// Sync data from a hecs world to the physics world.
    /// Call before [`Physics::tick`][Physics::tick].
    pub fn sync_hecs_to_physics(&mut self, physics: &mut Physics, hecs_world: &mut hecs::World) {
        if let Some(opts) = self.default_opts {
            for (entity, body_key) in hecs_world.query_mut::<&BodyKey>() {
                if !self.body_entity_map.contains(body_key.0) {
                    self.body_entity_map.insert_at(body_key.0, (entity, opts));
                }
            }
        }
        let mut despawned = Vec::new();
        for (index, (entity, opts)) in self.body_entity_map.iter() {
            if !hecs_world.contains(*entity) {
                if opts.autodelete {
                    despawned.push(index);
                }
                continue;
            }
            if !opts.hecs_to_physics {
                continue;
            }
            let (Ok(pose), Some(body)) = (
                hecs_world.query_one_mut::<&m::Pose>(*entity),
                physics.get_body_mut(BodyKey(index)),
            ) else {
                continue;
            };
            body.pose = *pose;
        }

        for index in despawned {
            self.body_entity_map.remove(index);
            physics.remove_body(BodyKey(index));
            log::debug!("Removed body {:?} of a despawned entity", BodyKey(index));
        }
    }

    /// Sync data from a physics world to a hecs world.
    /// Call after [`Physics::tick`][Physics::tick].
    pub fn sync_physics_to_hecs(&mut self, physics: &Physics, hecs_world: &mut hecs::World) {
        for (body_key, (entity, opts)) in self.body_entity_map.iter() {
            if !opts.physics_to_hecs {
                continue;
            }
            let Some(body) = physics.get_body(BodyKey(body_key)) else {
                continue;
            };
            let Ok(pose) = hecs_world.query_one_mut::<&mut m::Pose>(*entity) else {
                continue;
            };
            *pose = body.pose;
        }
    }
}
