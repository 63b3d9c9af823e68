//! The authoritative hazard (asteroid) simulation. Only the host, or a solo player, runs it.
//!
//! Hazards drift in a straight line and wrap at the arena edges. A destroyed hazard breaks
//! into `floor(radius / 15)` smaller ones, if that gives more than one fragment.

use crate::arena::{self, ARENA_HEIGHT, ARENA_WIDTH};
use protocol::{HazardId, HazardRecord};
use rand::Rng;
use std::f32::consts::TAU;

/// Amount of hazards a fresh field starts with.
pub const INITIAL_HAZARD_COUNT: usize = 8;
/// Smallest radius a spawned hazard gets, also the size unit for splitting.
pub const MIN_HAZARD_RADIUS: f32 = 15.0;
/// Random radius on top of the minimum.
pub const HAZARD_RADIUS_SPREAD: f32 = 70.0;
/// Random speed on top of 1 unit per tick.
pub const HAZARD_SPEED_SPREAD: f32 = 2.0;
/// Free space around the centre where the ships start.
const SPAWN_CLEARANCE: f32 = 100.0;

#[derive(Debug, Default)]
pub struct HazardField {
    hazards: Vec<HazardRecord>,
    /// The actor counter, ids are never reused.
    next_id: u32,
}

impl HazardField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes over a mirrored list, so play continues from what the host showed last.
    pub fn from_records(hazards: Vec<HazardRecord>) -> Self {
        // The ids come off the wire, the counter wraps instead of overflowing.
        let next_id = hazards
            .iter()
            .map(|h| h.id.0.wrapping_add(1))
            .max()
            .unwrap_or(0);
        HazardField { hazards, next_id }
    }

    /// Fills the field with randomly placed hazards, keeping the centre free.
    pub fn populate(&mut self, rng: &mut impl Rng, count: usize) {
        let (cx, cy) = arena::centre();
        for _ in 0..count {
            let radius = (rng.gen_range(0.0..HAZARD_RADIUS_SPREAD) + MIN_HAZARD_RADIUS).floor();
            let (x, y) = loop {
                let x = rng.gen_range(0.0..ARENA_WIDTH).floor();
                let y = rng.gen_range(0.0..ARENA_HEIGHT).floor();
                if arena::distance(x, y, cx, cy) >= radius + SPAWN_CLEARANCE {
                    break (x, y);
                }
            };
            self.spawn(rng, x, y, radius);
        }
    }

    fn spawn(&mut self, rng: &mut impl Rng, x: f32, y: f32, radius: f32) -> HazardId {
        let id = HazardId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.hazards.push(HazardRecord {
            id,
            x,
            y,
            radius,
            angle: rng.gen_range(0.0..TAU),
            speed: rng.gen_range(0.0..HAZARD_SPEED_SPREAD) + 1.0,
        });
        id
    }

    /// Moves every hazard one step.
    pub fn advance(&mut self, scale: f32) {
        for hazard in self.hazards.iter_mut() {
            let (x, y) = arena::step(hazard.x, hazard.y, hazard.angle, hazard.speed * scale);
            (hazard.x, hazard.y) = arena::wrap(x, y);
        }
    }

    /// Removes the hazard and spawns its fragments. Returns false if the id was not there.
    pub fn destroy(&mut self, id: HazardId, rng: &mut impl Rng) -> bool {
        let Some(index) = self.hazards.iter().position(|h| h.id == id) else {
            return false;
        };
        let destroyed = self.hazards.remove(index);

        let fragments = (destroyed.radius / MIN_HAZARD_RADIUS).floor() as usize;
        if fragments > 1 {
            tracing::trace!(id = destroyed.id.0, fragments, "Hazard splits.");
            let radius = destroyed.radius / fragments as f32;
            for _ in 0..fragments {
                self.spawn(rng, destroyed.x, destroyed.y, radius);
            }
        }
        true
    }

    pub fn hazards(&self) -> &[HazardRecord] {
        &self.hazards
    }

    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }
}

/// The first hazard a circle of the given size at the given place overlaps.
pub fn first_hit(hazards: &[HazardRecord], x: f32, y: f32, width: f32) -> Option<HazardId> {
    hazards
        .iter()
        .find(|h| arena::distance(h.x, h.y, x, y) < width / 2.0 + h.radius)
        .map(|h| h.id)
}
