//! This module holds the shared state of the relay.
//! It provides:
//! - [`Lobby`]: The session directory together with the outbound channel of every connection
//! - [`AppState`]: The lobby behind its mutex, the configuration and the connection id counter
//! - [`generate_room_id`]: Allocation of fresh room codes

use crate::config::RelayConfig;
use crate::directory::SessionDirectory;
use bytes::Bytes;
use protocol::{CHANNEL_BUFFER_SIZE, ConnectionId, RoomId, ServerEvent};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Characters a room id is made of.
const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The directory plus the outlets to reach the connections. Both are mutated together under one lock.
#[derive(Default)]
pub struct Lobby {
    pub directory: SessionDirectory,
    /// The sender to push frames to the websocket of a connection.
    outlets: HashMap<ConnectionId, mpsc::Sender<Bytes>>, // Clone-able no Mutex!
}

impl Lobby {
    pub fn register(&mut self, connection_id: ConnectionId, outlet: mpsc::Sender<Bytes>) {
        self.outlets.insert(connection_id, outlet);
    }

    pub fn unregister(&mut self, connection_id: ConnectionId) {
        self.outlets.remove(&connection_id);
    }

    /// Checks if the connection still has an open outlet.
    pub fn is_alive(&self, connection_id: ConnectionId) -> bool {
        self.outlets
            .get(&connection_id)
            .is_some_and(|outlet| !outlet.is_closed())
    }

    /// Pushes a frame to one connection. Fire and forget, a full or closed outlet drops the frame.
    pub fn send_to(&self, connection_id: ConnectionId, frame: Bytes) -> bool {
        let Some(outlet) = self.outlets.get(&connection_id) else {
            tracing::debug!(connection = %connection_id, "No outlet for connection, frame dropped.");
            return false;
        };
        match outlet.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection = %connection_id, "Outlet full, frame dropped.");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection = %connection_id, "Outlet closed, frame dropped.");
                false
            }
        }
    }

    /// Encodes and sends an event to one connection.
    pub fn send_event(&self, connection_id: ConnectionId, event: &ServerEvent) -> bool {
        match event.encode() {
            Ok(frame) => self.send_to(connection_id, frame),
            Err(error) => {
                tracing::error!(?error, "Could not encode server event.");
                false
            }
        }
    }

    /// Pushes a frame to every other member of the room the sender sits in.
    /// Returns the amount of members reached.
    pub fn send_to_others(&self, sender: ConnectionId, frame: Bytes) -> usize {
        let Some(room) = self.directory.room_of(sender) else {
            return 0;
        };
        room.others(sender)
            .filter(|member| self.send_to(*member, frame.clone()))
            .count()
    }

    /// Removes all rooms none of whose members can be reached anymore.
    /// This is a fallback, things should be handled by the disconnect logic.
    pub fn sweep_dead_rooms(&mut self) -> usize {
        let dead: Vec<(RoomId, Vec<ConnectionId>)> = self
            .directory
            .rooms()
            .filter(|room| !room.players().iter().any(|member| self.is_alive(*member)))
            .map(|room| (room.id.clone(), room.players().to_vec()))
            .collect();

        for (room_id, members) in &dead {
            tracing::info!(room = %room_id, "Removing dead room.");
            for member in members {
                self.directory.remove_player_from_room(*member, room_id);
            }
            self.directory.remove_room(room_id);
        }
        dead.len()
    }
}

/// The application state.
pub struct AppState {
    /// The lobby, every pairing and relay step holds this lock from check to insert.
    pub lobby: Mutex<Lobby>,
    pub config: RelayConfig,
    next_connection_id: AtomicU64,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        AppState {
            lobby: Mutex::new(Lobby::default()),
            config,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Hands out a connection id and registers the outlet for it.
    /// The receiver has to be drained into the websocket.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<Bytes>) {
        let connection_id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let (outlet, inlet) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.lobby.lock().await.register(connection_id, outlet);
        tracing::info!(connection = %connection_id, "New connection.");
        (connection_id, inlet)
    }
}

/// Draws a room id that no live room uses.
pub fn generate_room_id(rng: &mut impl Rng, length: usize, directory: &SessionDirectory) -> RoomId {
    loop {
        let code: String = (0..length)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        let room_id = RoomId::new(code);
        if !directory.contains_room(&room_id) {
            return room_id;
        }
        tracing::debug!(room = %room_id, "Generated room id collides, drawing again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Player;
    use protocol::Role;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_room_id_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let room_id = generate_room_id(&mut rng, 6, &SessionDirectory::new());
        assert_eq!(room_id.as_str().len(), 6);
        assert!(
            room_id
                .as_str()
                .bytes()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_room_id_skips_live_rooms() {
        let mut directory = SessionDirectory::new();
        let taken = generate_room_id(&mut StdRng::seed_from_u64(42), 4, &directory);
        directory.add_player_to_room(Player::new(ConnectionId(1), Role::Host), &taken);

        // Same seed draws the taken code first and has to draw again.
        let fresh = generate_room_id(&mut StdRng::seed_from_u64(42), 4, &directory);
        assert_ne!(fresh, taken);
    }

    #[tokio::test]
    async fn test_sweep_removes_rooms_without_live_members() {
        let state = AppState::new(RelayConfig::default());
        let (alive, _alive_inlet) = state.connect().await;
        let (dead, dead_inlet) = state.connect().await;
        drop(dead_inlet);

        let mut lobby = state.lobby.lock().await;
        lobby
            .directory
            .add_player_to_room(Player::new(alive, Role::Host), &RoomId::from("LIVE"));
        lobby
            .directory
            .add_player_to_room(Player::new(dead, Role::Host), &RoomId::from("DEAD"));

        assert_eq!(lobby.sweep_dead_rooms(), 1);
        assert!(lobby.directory.contains_room(&RoomId::from("LIVE")));
        assert!(!lobby.directory.contains_room(&RoomId::from("DEAD")));
        assert!(lobby.directory.player_by_connection_id(dead).is_none());
    }
}
