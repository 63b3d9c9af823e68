//! Client side of the two player sessions.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      PeerSession                         │
//! │  ┌─────────────────┐  ┌────────────┐  ┌───────────────┐  │
//! │  │ LocalSimulation │  │ Reconciler │  │HazardAuthority│  │
//! │  │   (own ship)    │  │  (shadows) │  │ field/mirror  │  │
//! │  └─────────────────┘  └────────────┘  └───────────────┘  │
//! └───────────────────────────┬──────────────────────────────┘
//!                             │ Link (websocket)
//!                             ▼
//!                      ┌─────────────┐
//!                      │Relay Server │
//!                      └─────────────┘
//! ```
//!
//! The host of a room owns the hazards and broadcasts them every tick, both peers own their
//! ship and their projectiles. Hit detection runs locally on each side.

pub mod arena;
pub mod authority;
pub mod connection;
pub mod hazards;
pub mod projectiles;
pub mod reconciler;
pub mod session;
pub mod traits;

pub use session::{PeerSession, SessionError, SessionState};
pub use traits::{Link, LocalSimulation};
