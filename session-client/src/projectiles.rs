//! Projectiles with a bounded lifetime. Used for the own shots and for the mirrors of the peer shots.

use crate::arena;
use protocol::{PROJECTILE_LIFETIME_SECS, ProjectileId, ProjectileRecord, ShipInfo};
use std::collections::HashMap;

pub const SHOT_COLOR: &str = "rgb(255, 186, 77)";
pub const SHOT_LENGTH: f32 = 40.0;
pub const SHOT_WIDTH: f32 = 8.0;
/// Units per tick.
pub const SHOT_SPEED: f32 = 7.0;
pub const SHOT_DAMAGE: f32 = 14.0;
/// Minimum time between two own shots.
pub const FIRE_COOLDOWN_SECS: f32 = 0.25;

/// A fresh shot leaving the ship along its heading.
pub fn shot_from(ship: &ShipInfo, id: ProjectileId) -> ProjectileRecord {
    ProjectileRecord {
        id,
        color: SHOT_COLOR.to_string(),
        length: SHOT_LENGTH,
        width: SHOT_WIDTH,
        angle: ship.angle,
        speed: SHOT_SPEED,
        damage: SHOT_DAMAGE,
        x: ship.x,
        y: ship.y,
    }
}

/// The live projectiles and the time each one has left.
#[derive(Default)]
pub struct ProjectileSet {
    projectiles: Vec<ProjectileRecord>,
    remaining: HashMap<ProjectileId, f32>,
}

impl ProjectileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the projectile and schedules its removal after the fixed lifetime.
    /// A projectile with an id that is already there replaces the old one.
    pub fn add(&mut self, projectile: ProjectileRecord) {
        self.projectiles.retain(|p| p.id != projectile.id);
        self.remaining.insert(projectile.id, PROJECTILE_LIFETIME_SECS);
        self.projectiles.push(projectile);
    }

    /// Removing an absent id is a no-op and returns false.
    pub fn remove(&mut self, id: ProjectileId) -> bool {
        self.remaining.remove(&id);
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id != id);
        before != self.projectiles.len()
    }

    /// Moves all projectiles and drops the ones that lived long enough. Returns the dropped ids.
    pub fn advance(&mut self, scale: f32, delta_time: f32) -> Vec<ProjectileId> {
        for projectile in self.projectiles.iter_mut() {
            let (x, y) = arena::step(
                projectile.x,
                projectile.y,
                projectile.angle,
                projectile.speed * scale,
            );
            (projectile.x, projectile.y) = arena::wrap(x, y);
        }

        let mut expired = Vec::new();
        self.projectiles.retain(|p| {
            let Some(left) = self.remaining.get_mut(&p.id) else {
                return true;
            };
            *left -= delta_time;
            if *left > 0.0 {
                return true;
            }
            expired.push(p.id);
            false
        });
        for id in &expired {
            self.remaining.remove(id);
        }
        expired
    }

    pub fn projectiles(&self) -> &[ProjectileRecord] {
        &self.projectiles
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
        self.remaining.clear();
    }
}
