//! Typed view on the frames. Clients encode and decode whole events, the relay only decodes the
//! few control frames it has to understand.

use crate::*;
use bytes::{BufMut, Bytes, BytesMut};
use postcard::{from_bytes, to_stdvec};
use serde::Serialize;

/// Everything that can go wrong when reading or writing a frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("empty frame")]
    Empty,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("malformed payload: {0}")]
    Payload(#[from] postcard::Error),
}

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    RequestRoomId,
    HostGame(RoomId),
    JoinGame { room_id: RoomId, info: ShipInfo },
    Move(ShipInfo),
    UpdateAsteroids(Vec<HazardRecord>),
    Shoot(ProjectileRecord),
    DestroyBullet(ProjectileId),
    DestroyAsteroid(HazardId),
    Leave,
}

/// Events the relay delivers to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    RoomIdGenerated(RoomId),
    HostStatus(PairingStatus),
    JoinStatus(PairingStatus),
    PlayerJoined(ShipInfo),
    PlayerMoving(ShipInfo),
    UpdateAsteroids(Vec<HazardRecord>),
    RemoteShoot(ProjectileRecord),
    BulletDestroyed(ProjectileId),
    AsteroidDestroyed(HazardId),
    PlayerLeft(ConnectionId),
    ServerError(String),
}

/// Splits a frame into its tag and the payload behind it.
pub fn split_frame(frame: &[u8]) -> Result<(u8, &[u8]), WireError> {
    match frame.split_first() {
        Some((tag, payload)) => Ok((*tag, payload)),
        None => Err(WireError::Empty),
    }
}

fn frame<T: Serialize>(tag: u8, payload: &T) -> Result<Bytes, WireError> {
    let raw = to_stdvec(payload)?;
    let mut msg = BytesMut::with_capacity(1 + raw.len());
    msg.put_u8(tag);
    msg.put_slice(&raw);
    Ok(msg.freeze())
}

fn bare(tag: u8) -> Bytes {
    Bytes::copy_from_slice(&[tag])
}

impl ClientEvent {
    pub fn encode(&self) -> Result<Bytes, WireError> {
        match self {
            ClientEvent::RequestRoomId => Ok(bare(REQUEST_ROOM_ID)),
            ClientEvent::HostGame(room_id) => frame(HOST_GAME, room_id),
            ClientEvent::JoinGame { room_id, info } => {
                let request = JoinRequest {
                    room_id: room_id.clone(),
                    info: to_stdvec(info)?,
                };
                frame(JOIN_GAME, &request)
            }
            ClientEvent::Move(ship) => frame(MOVE, ship),
            ClientEvent::UpdateAsteroids(hazards) => frame(UPDATE_ASTEROIDS, hazards),
            ClientEvent::Shoot(projectile) => frame(SHOOT, projectile),
            ClientEvent::DestroyBullet(id) => frame(DESTROY_BULLET, id),
            ClientEvent::DestroyAsteroid(id) => frame(DESTROY_ASTEROID, id),
            ClientEvent::Leave => Ok(bare(CLIENT_LEAVES)),
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let (tag, payload) = split_frame(raw)?;
        let event = match tag {
            REQUEST_ROOM_ID => ClientEvent::RequestRoomId,
            HOST_GAME => ClientEvent::HostGame(from_bytes(payload)?),
            JOIN_GAME => {
                let request: JoinRequest = from_bytes(payload)?;
                ClientEvent::JoinGame {
                    room_id: request.room_id,
                    info: from_bytes(&request.info)?,
                }
            }
            MOVE => ClientEvent::Move(from_bytes(payload)?),
            UPDATE_ASTEROIDS => ClientEvent::UpdateAsteroids(from_bytes(payload)?),
            SHOOT => ClientEvent::Shoot(from_bytes(payload)?),
            DESTROY_BULLET => ClientEvent::DestroyBullet(from_bytes(payload)?),
            DESTROY_ASTEROID => ClientEvent::DestroyAsteroid(from_bytes(payload)?),
            CLIENT_LEAVES => ClientEvent::Leave,
            other => return Err(WireError::UnknownTag(other)),
        };
        Ok(event)
    }
}

impl ServerEvent {
    pub fn encode(&self) -> Result<Bytes, WireError> {
        match self {
            ServerEvent::RoomIdGenerated(room_id) => frame(ROOM_ID_GENERATED, room_id),
            ServerEvent::HostStatus(status) => frame(HOST_STATUS, status),
            ServerEvent::JoinStatus(status) => frame(JOIN_STATUS, status),
            ServerEvent::PlayerJoined(ship) => frame(PLAYER_JOINED, ship),
            ServerEvent::PlayerMoving(ship) => frame(PLAYER_MOVING, ship),
            ServerEvent::UpdateAsteroids(hazards) => frame(ASTEROIDS_UPDATED, hazards),
            ServerEvent::RemoteShoot(projectile) => frame(REMOTE_SHOOT, projectile),
            ServerEvent::BulletDestroyed(id) => frame(BULLET_DESTROYED, id),
            ServerEvent::AsteroidDestroyed(id) => frame(ASTEROID_DESTROYED, id),
            ServerEvent::PlayerLeft(id) => frame(PLAYER_LEFT, id),
            ServerEvent::ServerError(text) => frame(SERVER_ERROR, text),
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, WireError> {
        let (tag, payload) = split_frame(raw)?;
        let event = match tag {
            ROOM_ID_GENERATED => ServerEvent::RoomIdGenerated(from_bytes(payload)?),
            HOST_STATUS => ServerEvent::HostStatus(from_bytes(payload)?),
            JOIN_STATUS => ServerEvent::JoinStatus(from_bytes(payload)?),
            PLAYER_JOINED => ServerEvent::PlayerJoined(from_bytes(payload)?),
            PLAYER_MOVING => ServerEvent::PlayerMoving(from_bytes(payload)?),
            ASTEROIDS_UPDATED => ServerEvent::UpdateAsteroids(from_bytes(payload)?),
            REMOTE_SHOOT => ServerEvent::RemoteShoot(from_bytes(payload)?),
            BULLET_DESTROYED => ServerEvent::BulletDestroyed(from_bytes(payload)?),
            ASTEROID_DESTROYED => ServerEvent::AsteroidDestroyed(from_bytes(payload)?),
            PLAYER_LEFT => ServerEvent::PlayerLeft(from_bytes(payload)?),
            SERVER_ERROR => ServerEvent::ServerError(from_bytes(payload)?),
            other => return Err(WireError::UnknownTag(other)),
        };
        Ok(event)
    }
}
