//! This module does the whole pairing thing.
//! The general protocol of getting into a room is:
//! Client -> Relay: request-room-id.            Relay -> Client: room-id-generated (nothing reserved yet).
//! Client -> Relay: host-game with the room id. Relay -> Client: host-status.
//! Client -> Relay: join-game with id and info. Relay -> Client: join-status, Relay -> Host: player-joined.
//!
//! A failed attempt leaves the connection where it was, retrying is up to the client.
//! The teardown on disconnect lives here as well, as it is the reverse of the pairing.

use crate::directory::{Player, SessionDirectory};
use crate::lobby::{AppState, generate_room_id};
use bytes::{BufMut, BytesMut};
use postcard::from_bytes;
use protocol::{
    ConnectionId, JoinRequest, PLAYER_JOINED, PairingStatus, Role, RoomId, ServerEvent, failure,
};

/// Hands out a room id, that is currently not in use. The room itself only gets created on hosting.
pub async fn request_room_id(state: &AppState, connection_id: ConnectionId) {
    let lobby = state.lobby.lock().await;
    let room_id = generate_room_id(
        &mut rand::thread_rng(),
        state.config.room_id_length,
        &lobby.directory,
    );
    tracing::info!(connection = %connection_id, room = %room_id, "Room id generated.");
    lobby.send_event(connection_id, &ServerEvent::RoomIdGenerated(room_id));
}

/// Opens the room with the connection as its host.
pub async fn host_game(state: &AppState, connection_id: ConnectionId, payload: &[u8]) {
    let mut lobby = state.lobby.lock().await;
    let status = match from_bytes::<RoomId>(payload) {
        Ok(room_id) => seat_host(&mut lobby.directory, connection_id, room_id),
        Err(error) => {
            tracing::warn!(connection = %connection_id, ?error, "Failed to parse host request.");
            PairingStatus::failure(failure::MALFORMED_HOST)
        }
    };
    lobby.send_event(connection_id, &ServerEvent::HostStatus(status));
}

fn seat_host(
    directory: &mut SessionDirectory,
    connection_id: ConnectionId,
    room_id: RoomId,
) -> PairingStatus {
    if directory.room_of(connection_id).is_some() {
        return PairingStatus::failure(failure::ALREADY_IN_ROOM);
    }
    if directory.host_of(&room_id).is_some() {
        // User error no need for error tracing.
        return PairingStatus::failure(failure::ROOM_ALREADY_HOSTED);
    }
    if directory.add_player_to_room(Player::new(connection_id, Role::Host), &room_id) {
        tracing::info!(connection = %connection_id, room = %room_id, "Player is hosting room.");
        PairingStatus::Success { room_id }
    } else {
        PairingStatus::failure(failure::ROOM_FULL)
    }
}

/// Seats the connection as guest in an existing room and tells the other member about it.
pub async fn join_game(state: &AppState, connection_id: ConnectionId, payload: &[u8]) {
    let request = match from_bytes::<JoinRequest>(payload) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(connection = %connection_id, ?error, "Failed to parse join request.");
            let lobby = state.lobby.lock().await;
            lobby.send_event(
                connection_id,
                &ServerEvent::JoinStatus(PairingStatus::failure(failure::MALFORMED_JOIN)),
            );
            return;
        }
    };

    let mut lobby = state.lobby.lock().await;
    let status = seat_guest(&mut lobby.directory, connection_id, request.room_id);
    let success = status.is_success();
    lobby.send_event(connection_id, &ServerEvent::JoinStatus(status));

    if success {
        // The info is handed on as is, the relay does not interpret it.
        let mut msg = BytesMut::with_capacity(1 + request.info.len());
        msg.put_u8(PLAYER_JOINED);
        msg.put_slice(&request.info);
        lobby.send_to_others(connection_id, msg.freeze());
    }
}

fn seat_guest(
    directory: &mut SessionDirectory,
    connection_id: ConnectionId,
    room_id: RoomId,
) -> PairingStatus {
    if directory.room_of(connection_id).is_some() {
        return PairingStatus::failure(failure::ALREADY_IN_ROOM);
    }
    // Checked first, so a failed join never creates the room.
    if !directory.contains_room(&room_id) {
        return PairingStatus::failure(failure::ROOM_NOT_FOUND);
    }
    if directory.add_player_to_room(Player::new(connection_id, Role::Guest), &room_id) {
        PairingStatus::Success { room_id }
    } else {
        PairingStatus::failure(failure::ROOM_FULL)
    }
}

/// Cleanup when a connection goes away. The other member gets a player-left. A leaving host takes
/// the room with it, a leaving guest only frees its slot.
pub async fn disconnect(state: &AppState, connection_id: ConnectionId) {
    let mut lobby = state.lobby.lock().await;
    lobby.unregister(connection_id);

    let Some(player) = lobby
        .directory
        .player_by_connection_id(connection_id)
        .cloned()
    else {
        tracing::info!(connection = %connection_id, "User disconnected.");
        return;
    };

    let Some(room_id) = player.room.as_ref() else {
        lobby.directory.forget_player(connection_id);
        tracing::info!(connection = %connection_id, "User disconnected.");
        return;
    };

    if let Ok(frame) = ServerEvent::PlayerLeft(connection_id).encode() {
        lobby.send_to_others(connection_id, frame);
    }

    lobby
        .directory
        .remove_player_from_room(connection_id, room_id);
    let now_empty = lobby
        .directory
        .room(room_id)
        .is_some_and(|room| room.is_empty());
    if player.is_hosting() || now_empty {
        lobby.directory.remove_room(room_id);
    }
    tracing::info!(connection = %connection_id, room = %room_id, "User disconnected.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_host_is_refused() {
        let mut directory = SessionDirectory::new();
        let room_id = RoomId::from("ABC123");
        assert!(seat_host(&mut directory, ConnectionId(1), room_id.clone()).is_success());

        assert_eq!(
            seat_host(&mut directory, ConnectionId(2), room_id.clone()),
            PairingStatus::failure(failure::ROOM_ALREADY_HOSTED)
        );
        assert_eq!(directory.room(&room_id).unwrap().players().len(), 1);
    }

    #[test]
    fn test_seated_connection_cannot_pair_twice() {
        let mut directory = SessionDirectory::new();
        assert!(seat_host(&mut directory, ConnectionId(1), RoomId::from("A")).is_success());

        assert_eq!(
            seat_guest(&mut directory, ConnectionId(1), RoomId::from("A")),
            PairingStatus::failure(failure::ALREADY_IN_ROOM)
        );
        assert_eq!(
            seat_host(&mut directory, ConnectionId(1), RoomId::from("B")),
            PairingStatus::failure(failure::ALREADY_IN_ROOM)
        );
        assert!(!directory.contains_room(&RoomId::from("B")));
    }

    #[tokio::test]
    async fn test_disconnect_of_host_removes_room() {
        let state = AppState::new(crate::config::RelayConfig::default());
        let (host, _host_inlet) = state.connect().await;
        let (guest, mut guest_inlet) = state.connect().await;
        let room_id = RoomId::from("HOST01");
        {
            let mut lobby = state.lobby.lock().await;
            assert!(seat_host(&mut lobby.directory, host, room_id.clone()).is_success());
            assert!(seat_guest(&mut lobby.directory, guest, room_id.clone()).is_success());
        }

        disconnect(&state, host).await;

        let frame = guest_inlet.try_recv().unwrap();
        assert_eq!(
            ServerEvent::decode(&frame).unwrap(),
            ServerEvent::PlayerLeft(host)
        );
        let lobby = state.lobby.lock().await;
        assert!(!lobby.directory.contains_room(&room_id));
        assert!(lobby.directory.player_by_connection_id(host).is_none());
        assert!(lobby.directory.room_of(guest).is_none());
    }

    #[tokio::test]
    async fn test_disconnect_of_last_guest_removes_room() {
        let state = AppState::new(crate::config::RelayConfig::default());
        let (guest, _inlet) = state.connect().await;
        let room_id = RoomId::from("LONELY");
        {
            let mut lobby = state.lobby.lock().await;
            lobby.directory.create_room(&room_id);
            assert!(seat_guest(&mut lobby.directory, guest, room_id.clone()).is_success());
        }

        disconnect(&state, guest).await;

        let lobby = state.lobby.lock().await;
        assert!(!lobby.directory.contains_room(&room_id));
        assert!(lobby.directory.player_by_connection_id(guest).is_none());
    }

    #[test]
    fn test_join_unknown_room_creates_nothing() {
        let mut directory = SessionDirectory::new();
        assert_eq!(
            seat_guest(&mut directory, ConnectionId(3), RoomId::from("ZZZ999")),
            PairingStatus::failure(failure::ROOM_NOT_FOUND)
        );
        assert_eq!(directory.room_count(), 0);
        assert_eq!(directory.player_count(), 0);
    }
}
