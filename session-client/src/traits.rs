//! The two seams of the session.
//!
//! ```text
//! LocalSimulation -> PeerSession -> Link -> Relay Server -> Link -> PeerSession
//! ```
//!
//! - [`LocalSimulation`]: the own ship and the input that drives it. Rendering and key polling
//!   live behind it, the session only asks for the public state.
//! - [`Link`]: the transport to the relay. The websocket [`crate::connection::Connection`] in
//!   production, an in-memory queue in tests.

use protocol::{ClientEvent, ServerEvent, ShipInfo};

/// The part of the game that runs purely local: the own ship.
pub trait LocalSimulation {
    /// The current public state of the own ship, as it gets sent to the peer.
    fn ship(&self) -> ShipInfo;

    /// Integrates the own ship by one step. `scale` is 1.0 for one tick of the 20 ms ticker.
    fn advance_ship(&mut self, scale: f32);

    /// Gets polled once per update, returning true fires a projectile if the cooldown allows it.
    fn wants_to_fire(&mut self) -> bool;

    /// The own ship ran into a hazard while not damaged.
    fn ship_struck(&mut self);
}

/// The connection to the relay server.
pub trait Link {
    /// Fire and forget, there is no delivery guarantee.
    fn send(&mut self, event: ClientEvent);

    /// Drains everything that arrived since the last poll.
    /// An error means the link is gone and carries the reason.
    fn poll(&mut self) -> Result<Vec<ServerEvent>, String>;
}
