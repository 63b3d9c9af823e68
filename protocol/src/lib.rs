//! The ids for messages that we use. They will be used consistent across the relay server and the clients.
//! Also contains the records that get replicated between the two peers of a room and the structures
//! for hosting and joining a room.
//!
//! Every frame on the wire is one tag byte followed by a postcard payload. The relay only ever
//! looks at the tag byte of gameplay frames, see [`relayed_tag`].

mod event;

pub use event::{ClientEvent, ServerEvent, WireError, split_frame};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The buffer sizes for the channels for intra VPS communication.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// The maximum amount of players in one room.
pub const ROOM_CAPACITY: usize = 2;

/// Time in seconds a projectile lives, before its owner removes it.
pub const PROJECTILE_LIFETIME_SECS: f32 = 1.5;

// Client -> Server.

/// Asks the relay for a fresh room id. No payload.
pub const REQUEST_ROOM_ID: u8 = 0;
/// Opens the room as host. Followed by the [`RoomId`].
pub const HOST_GAME: u8 = 1;
/// Joins an existing room. Followed by a [`JoinRequest`].
pub const JOIN_GAME: u8 = 2;
/// Own ship update. Followed by [`ShipInfo`], relayed as [`PLAYER_MOVING`].
pub const MOVE: u8 = 3;
/// Full hazard list from the host. Followed by a list of [`HazardRecord`], relayed as [`ASTEROIDS_UPDATED`].
pub const UPDATE_ASTEROIDS: u8 = 4;
/// A projectile got fired. Followed by [`ProjectileRecord`], relayed as [`REMOTE_SHOOT`].
pub const SHOOT: u8 = 5;
/// A projectile is gone. Followed by [`ProjectileId`], relayed as [`BULLET_DESTROYED`].
pub const DESTROY_BULLET: u8 = 6;
/// A hazard got destroyed. Followed by [`HazardId`], relayed as [`ASTEROID_DESTROYED`].
pub const DESTROY_ASTEROID: u8 = 7;
/// The client leaves intentionally, no payload.
pub const CLIENT_LEAVES: u8 = 8;

// Server -> Client

/// Answer to [`REQUEST_ROOM_ID`], followed by the [`RoomId`].
pub const ROOM_ID_GENERATED: u8 = 0;
/// Answer to [`HOST_GAME`], followed by [`PairingStatus`].
pub const HOST_STATUS: u8 = 1;
/// Answer to [`JOIN_GAME`], followed by [`PairingStatus`].
pub const JOIN_STATUS: u8 = 2;
/// Another player joined the room, followed by the raw info of the [`JoinRequest`].
pub const PLAYER_JOINED: u8 = 3;
/// The peer ship moved, followed by [`ShipInfo`].
pub const PLAYER_MOVING: u8 = 4;
/// The host hazard list, followed by a list of [`HazardRecord`].
pub const ASTEROIDS_UPDATED: u8 = 5;
/// The peer fired, followed by [`ProjectileRecord`].
pub const REMOTE_SHOOT: u8 = 6;
/// A peer projectile is gone, followed by [`ProjectileId`].
pub const BULLET_DESTROYED: u8 = 7;
/// A hazard got destroyed by the peer, followed by [`HazardId`].
pub const ASTEROID_DESTROYED: u8 = 8;
/// The peer left, followed by its [`ConnectionId`].
pub const PLAYER_LEFT: u8 = 9;
/// Error text of the relay, followed by the string.
pub const SERVER_ERROR: u8 = 10;

/// Failure texts the relay reports in a [`PairingStatus::Failure`].
pub mod failure {
    pub const ROOM_NOT_FOUND: &str = "Room not found";
    pub const ROOM_FULL: &str = "Room is full";
    pub const ROOM_ALREADY_HOSTED: &str = "Room already hosted";
    pub const ALREADY_IN_ROOM: &str = "Already in a room";
    pub const MALFORMED_HOST: &str = "Malformed host request";
    pub const MALFORMED_JOIN: &str = "Malformed join request";
}

/// Maps a client gameplay tag onto the tag the other room member receives.
/// Returns `None` for everything that is not plain relay traffic.
pub fn relayed_tag(client_tag: u8) -> Option<u8> {
    match client_tag {
        MOVE => Some(PLAYER_MOVING),
        UPDATE_ASTEROIDS => Some(ASTEROIDS_UPDATED),
        SHOOT => Some(REMOTE_SHOOT),
        DESTROY_BULLET => Some(BULLET_DESTROYED),
        DESTROY_ASTEROID => Some(ASTEROID_DESTROYED),
        _ => None,
    }
}

/// Short human typeable room code. Treated as an opaque string everywhere.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(code: impl Into<String>) -> Self {
        RoomId(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        RoomId(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one live websocket connection on the relay.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The part a player has in its room. The host owns the hazard field, the guest mirrors it.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Role {
    Host,
    Guest,
}

/// Id of a hazard, handed out by the actor counter of the host.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HazardId(pub u32);

/// Id of a projectile. The serial is only unique for the firing peer, so the owner is part of the id.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProjectileId {
    pub owner: Role,
    pub serial: u32,
}

/// The public state of a ship as it gets sent to the peer.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct ShipInfo {
    pub x: f32,
    pub y: f32,
    /// Heading in radians, 0 points up.
    pub angle: f32,
    /// Turn rate in degrees per tick.
    pub move_angle: f32,
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    /// The ship is recovering from a crash and can not be hit.
    pub damaged: bool,
    /// Blink state while damaged.
    pub visible: bool,
}

/// A hazard (asteroid) as it gets replicated from the host.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct HazardRecord {
    pub id: HazardId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub angle: f32,
    pub speed: f32,
}

/// A projectile as it gets sent with a shot.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ProjectileRecord {
    pub id: ProjectileId,
    pub color: String,
    pub length: f32,
    pub width: f32,
    pub angle: f32,
    pub speed: f32,
    pub damage: f32,
    pub x: f32,
    pub y: f32,
}

/// The join request. This struct is used on the server and on the client.
#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct JoinRequest {
    /// Which room do we want to join.
    pub room_id: RoomId,
    /// Postcard encoded [`ShipInfo`] of the joiner. The relay hands it on untouched.
    pub info: Vec<u8>,
}

/// The answer on a host or join attempt.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum PairingStatus {
    Success { room_id: RoomId },
    Failure { message: String },
}

impl PairingStatus {
    pub fn failure(message: &str) -> Self {
        PairingStatus::Failure {
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PairingStatus::Success { .. })
    }
}
