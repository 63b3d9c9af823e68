//! Applies what the peer sends onto the local shadow objects: the shadow ship, the mirrored
//! projectiles and (through the [`HazardAuthority`]) the hazard list.
//!
//! Everything here is last write wins. A late packet can rewind the shadow ship for a moment,
//! the next one fixes it again.

use crate::authority::HazardAuthority;
use crate::projectiles::ProjectileSet;
use protocol::{ProjectileRecord, ServerEvent, ShipInfo};
use rand::Rng;

#[derive(Default)]
pub struct Reconciler {
    /// The ship of the peer, created on the first position we hear of.
    shadow: Option<ShipInfo>,
    /// The shots of the peer. They expire on their own, a lost removal can not leak them.
    mirrors: ProjectileSet,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shadow(&self) -> Option<&ShipInfo> {
        self.shadow.as_ref()
    }

    pub fn mirrored_projectiles(&self) -> &[ProjectileRecord] {
        self.mirrors.projectiles()
    }

    /// Applies one gameplay event. Pairing events are not our business and get ignored.
    pub fn apply(&mut self, event: ServerEvent, hazards: &mut HazardAuthority, rng: &mut impl Rng) {
        match event {
            ServerEvent::PlayerJoined(info) | ServerEvent::PlayerMoving(info) => {
                if self.shadow.is_none() {
                    tracing::debug!("Shadow ship created.");
                }
                self.shadow = Some(info);
            }
            ServerEvent::PlayerLeft(_) => self.peer_left(),
            ServerEvent::UpdateAsteroids(records) => hazards.replace_mirror(records),
            ServerEvent::RemoteShoot(projectile) => self.mirrors.add(projectile),
            ServerEvent::BulletDestroyed(id) => {
                self.mirrors.remove(id);
            }
            ServerEvent::AsteroidDestroyed(id) => hazards.destroy(id, rng),
            other => tracing::debug!(?other, "Not a gameplay event."),
        }
    }

    /// Moves the mirrored projectiles and lets the old ones expire.
    pub fn advance(&mut self, scale: f32, delta_time: f32) {
        let expired = self.mirrors.advance(scale, delta_time);
        if !expired.is_empty() {
            tracing::trace!(?expired, "Mirrored projectiles expired.");
        }
    }

    /// Drops everything we know about the peer.
    pub fn peer_left(&mut self) {
        self.shadow = None;
        self.mirrors.clear();
    }
}
