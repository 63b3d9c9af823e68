//! Who owns the hazard field. The host runs the simulation and broadcasts the full list every
//! tick, the guest only shows what it got last. This is the one place the session branches on
//! the [`Role`].

use crate::hazards::{HazardField, INITIAL_HAZARD_COUNT};
use protocol::{HazardId, HazardRecord, Role};
use rand::Rng;

#[derive(Debug)]
pub enum HazardAuthority {
    /// We simulate the hazards ourselves.
    Authoritative(HazardField),
    /// A plain copy of the last host broadcast, without any physics.
    Mirror(Vec<HazardRecord>),
}

impl HazardAuthority {
    /// A fresh populated field for the host, an empty mirror for the guest.
    pub fn for_role(role: Role, rng: &mut impl Rng) -> Self {
        match role {
            Role::Host => HazardAuthority::fresh_field(rng),
            Role::Guest => HazardAuthority::Mirror(Vec::new()),
        }
    }

    pub fn fresh_field(rng: &mut impl Rng) -> Self {
        let mut field = HazardField::new();
        field.populate(rng, INITIAL_HAZARD_COUNT);
        HazardAuthority::Authoritative(field)
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self, HazardAuthority::Authoritative(_))
    }

    pub fn hazards(&self) -> &[HazardRecord] {
        match self {
            HazardAuthority::Authoritative(field) => field.hazards(),
            HazardAuthority::Mirror(records) => records,
        }
    }

    /// Advances the field if we own it and returns the list to broadcast. A mirror returns `None`.
    pub fn tick(&mut self, scale: f32) -> Option<Vec<HazardRecord>> {
        match self {
            HazardAuthority::Authoritative(field) => {
                field.advance(scale);
                Some(field.hazards().to_vec())
            }
            HazardAuthority::Mirror(_) => None,
        }
    }

    /// Full list replace from a host broadcast. Ignored while we are the authority.
    pub fn replace_mirror(&mut self, records: Vec<HazardRecord>) {
        match self {
            HazardAuthority::Mirror(mirror) => *mirror = records,
            HazardAuthority::Authoritative(_) => {
                tracing::warn!("Hazard broadcast received while authoritative, ignored.");
            }
        }
    }

    /// The authority splits, the mirror only removes and waits for the next broadcast.
    /// An unknown id is a no-op.
    pub fn destroy(&mut self, id: HazardId, rng: &mut impl Rng) {
        match self {
            HazardAuthority::Authoritative(field) => {
                field.destroy(id, rng);
            }
            HazardAuthority::Mirror(mirror) => mirror.retain(|h| h.id != id),
        }
    }

    /// Turns a mirror into a field of its own, used when the host went away.
    pub fn promote(&mut self) {
        if let HazardAuthority::Mirror(mirror) = self {
            let records = std::mem::take(mirror);
            *self = HazardAuthority::Authoritative(HazardField::from_records(records));
        }
    }
}
