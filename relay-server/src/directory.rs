//! The session directory: which rooms exist, who sits in them and which player belongs to which
//! connection.
//!
//! The directory itself is plain data without any locking. It is owned by the [`crate::lobby::Lobby`],
//! which sits behind one mutex, so every operation here runs to completion before the next one
//! starts. That is what keeps the capacity check and the insertion in
//! [`SessionDirectory::add_player_to_room`] atomic.

use protocol::{ConnectionId, ROOM_CAPACITY, Role, RoomId};
use std::collections::HashMap;

/// A player as the relay sees it. One per connection, never shared.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub role: Role,
    /// The room the player sits in, `None` after the room got torn down.
    pub room: Option<RoomId>,
}

impl Player {
    pub fn new(connection_id: ConnectionId, role: Role) -> Self {
        Player {
            connection_id,
            role,
            room: None,
        }
    }

    pub fn is_hosting(&self) -> bool {
        self.role == Role::Host
    }
}

/// The description of the room, the players play in. It only knows the membership, the player
/// records themselves live in the directory.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    /// Members in join order.
    players: Vec<ConnectionId>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Room {
            id,
            players: Vec::with_capacity(ROOM_CAPACITY),
        }
    }

    pub fn players(&self) -> &[ConnectionId] {
        &self.players
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= ROOM_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// All members except the given one.
    pub fn others(&self, connection_id: ConnectionId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players
            .iter()
            .copied()
            .filter(move |member| *member != connection_id)
    }
}

/// Maps room ids to rooms and connection ids to players.
#[derive(Default, Debug)]
pub struct SessionDirectory {
    rooms: HashMap<RoomId, Room>,
    players: HashMap<ConnectionId, Player>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty room, does nothing if the room is already there.
    pub fn create_room(&mut self, room_id: &RoomId) {
        if !self.rooms.contains_key(room_id) {
            self.rooms.insert(room_id.clone(), Room::new(room_id.clone()));
            tracing::info!(room = %room_id, "Room created.");
        }
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Seats the player in the room, creating the room if needed.
    /// Returns false without touching anything if the room is already full.
    pub fn add_player_to_room(&mut self, mut player: Player, room_id: &RoomId) -> bool {
        self.create_room(room_id);
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };

        if room.is_full() {
            tracing::info!(
                room = %room_id,
                player = %player.connection_id,
                "Room is full, cannot add player."
            );
            return false;
        }

        room.players.push(player.connection_id);
        player.room = Some(room_id.clone());
        tracing::info!(room = %room_id, player = %player.connection_id, role = ?player.role, "Player joined room.");
        self.players.insert(player.connection_id, player);
        true
    }

    /// Takes the player out of the room (if it is in there) and always out of the player index.
    pub fn remove_player_from_room(&mut self, connection_id: ConnectionId, room_id: &RoomId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            let before = room.players.len();
            room.players.retain(|member| *member != connection_id);
            if room.players.len() != before {
                tracing::info!(room = %room_id, player = %connection_id, "Player left room.");
            }
        }
        self.players.remove(&connection_id);
    }

    /// Drops a player that no longer sits in any room from the index.
    pub fn forget_player(&mut self, connection_id: ConnectionId) {
        self.players.remove(&connection_id);
    }

    /// Deletes the room and clears the room reference of everyone still seated in it.
    pub fn remove_room(&mut self, room_id: &RoomId) {
        let Some(room) = self.rooms.remove(room_id) else {
            return;
        };
        for member in room.players {
            if let Some(player) = self.players.get_mut(&member) {
                player.room = None;
            }
        }
        tracing::info!(room = %room_id, "Room removed.");
    }

    pub fn player_by_connection_id(&self, connection_id: ConnectionId) -> Option<&Player> {
        self.players.get(&connection_id)
    }

    /// The room the connection currently sits in.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&Room> {
        let room_id = self.players.get(&connection_id)?.room.as_ref()?;
        self.rooms.get(room_id)
    }

    /// The hosting member of a room, if it still has one.
    pub fn host_of(&self, room_id: &RoomId) -> Option<ConnectionId> {
        self.rooms.get(room_id)?.players.iter().copied().find(|member| {
            self.players
                .get(member)
                .is_some_and(|player| player.is_hosting())
        })
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[cfg(test)]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}
