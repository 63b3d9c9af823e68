//! The peer session takes care of the pairing with the relay and of everything that crosses the
//! wire while playing. This is the core entry point of the client.
//!
//! # Frontend Integration
//!
//! Create the session before entering the game loop and call [`PeerSession::update`] at the
//! beginning of each frame.
//!
//! - While **Idle** or **Refused**: show the room UI, call [`PeerSession::host_game`] or
//!   [`PeerSession::join_game`]
//! - While **Hosting** or **Joined**: draw the own ship, the shadow ship, the hazards and both
//!   projectile lists
//! - While **Disconnected**: show the reason, play continues solo on the last hazard field
//!
//! ```text
//! let mut session = PeerSession::connect(MyShip::new(), "ws://127.0.0.1:3000/ws")?;
//! loop {
//!     session.update(get_frame_time());
//!     draw(session.simulation(), session.shadow(), session.hazards());
//!     next_frame().await
//! }
//! ```

use crate::authority::HazardAuthority;
use crate::connection::Connection;
use crate::hazards::first_hit;
use crate::projectiles::{FIRE_COOLDOWN_SECS, ProjectileSet, shot_from};
use crate::reconciler::Reconciler;
use crate::traits::{Link, LocalSimulation};
use protocol::{
    ClientEvent, HazardId, HazardRecord, PairingStatus, ProjectileId, ProjectileRecord, Role,
    RoomId, ServerEvent, ShipInfo,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// The per tick velocities are meant for a 20 ms ticker, so one second is 50 ticks.
pub const TICKS_PER_SECOND: f32 = 50.0;

/// Session lifecycle states.
///
/// ```text
/// Idle -> RequestingId -> AwaitingHostStatus -> Hosting
///   |                                        \-> Refused
///   \---> AwaitingJoinStatus ----------------> Joined
///                                            \-> Refused
/// Joined --(host left)--> Idle
/// any --(link lost / leave)--> Disconnected
/// ```
#[derive(Clone, PartialEq, Debug)]
pub enum SessionState {
    /// Solo play without any relay.
    Offline,
    /// Connected to the relay, not in a room.
    Idle,
    /// Waiting for the relay to hand out a room id.
    RequestingId,
    /// The host request is out.
    AwaitingHostStatus,
    /// The join request is out.
    AwaitingJoinStatus,
    /// We own the room and the hazard field.
    Hosting { room_id: RoomId },
    /// We sit in the room of somebody else and mirror its hazards.
    Joined { room_id: RoomId },
    /// The last host or join attempt failed. Behaves like `Idle` for a retry.
    Refused { message: String },
    /// The relay connection is gone.
    Disconnected { reason: String },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("no relay connection")]
    NoLink,
    #[error("pairing is not possible while {0:?}")]
    Busy(SessionState),
    #[error("could not connect: {0}")]
    Connect(String),
}

/// The central coordinator between the local simulation, the shared hazards and the relay.
pub struct PeerSession<Sim: LocalSimulation, L: Link> {
    simulation: Sim,
    link: Option<L>,
    state: SessionState,
    hazards: HazardAuthority,
    reconciler: Reconciler,
    /// The shots we fired ourselves.
    own_projectiles: ProjectileSet,
    /// Seconds until the next shot is allowed.
    cooldown: f32,
    next_serial: u32,
    /// Own role for the projectile ids. Solo play counts as host.
    role: Role,
    rng: StdRng,
}

impl<Sim: LocalSimulation> PeerSession<Sim, Connection> {
    /// Opens the websocket to the relay. The session starts `Idle` with a solo field.
    pub fn connect(simulation: Sim, url: &str) -> Result<Self, SessionError> {
        let connection = Connection::open(url).map_err(SessionError::Connect)?;
        Ok(Self::new(simulation, Some(connection), StdRng::from_entropy()))
    }
}

impl<Sim: LocalSimulation, L: Link> PeerSession<Sim, L> {
    /// With a link the session starts `Idle`, without one `Offline`.
    pub fn new(simulation: Sim, link: Option<L>, mut rng: StdRng) -> Self {
        let state = if link.is_some() {
            SessionState::Idle
        } else {
            SessionState::Offline
        };
        PeerSession {
            simulation,
            link,
            state,
            hazards: HazardAuthority::fresh_field(&mut rng),
            reconciler: Reconciler::new(),
            own_projectiles: ProjectileSet::new(),
            cooldown: 0.0,
            next_serial: 0,
            role: Role::Host,
            rng,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn simulation(&self) -> &Sim {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Sim {
        &mut self.simulation
    }

    pub fn link_mut(&mut self) -> Option<&mut L> {
        self.link.as_mut()
    }

    pub fn hazards(&self) -> &[HazardRecord] {
        self.hazards.hazards()
    }

    pub fn is_hazard_authority(&self) -> bool {
        self.hazards.is_authoritative()
    }

    pub fn shadow(&self) -> Option<&ShipInfo> {
        self.reconciler.shadow()
    }

    pub fn own_projectiles(&self) -> &[ProjectileRecord] {
        self.own_projectiles.projectiles()
    }

    pub fn mirrored_projectiles(&self) -> &[ProjectileRecord] {
        self.reconciler.mirrored_projectiles()
    }

    fn is_paired(&self) -> bool {
        matches!(
            self.state,
            SessionState::Hosting { .. } | SessionState::Joined { .. }
        )
    }

    fn check_ready_for_pairing(&self) -> Result<(), SessionError> {
        if self.link.is_none() {
            return Err(SessionError::NoLink);
        }
        match self.state {
            SessionState::Idle | SessionState::Refused { .. } => Ok(()),
            _ => Err(SessionError::Busy(self.state.clone())),
        }
    }

    /// Asks the relay for a room id, the host request follows automatically once it arrives.
    pub fn host_game(&mut self) -> Result<(), SessionError> {
        self.check_ready_for_pairing()?;
        self.send(ClientEvent::RequestRoomId);
        self.state = SessionState::RequestingId;
        Ok(())
    }

    /// Joins the room of somebody else, handing over the current state of the own ship.
    pub fn join_game(&mut self, room_id: RoomId) -> Result<(), SessionError> {
        self.check_ready_for_pairing()?;
        let info = self.simulation.ship();
        self.send(ClientEvent::JoinGame { room_id, info });
        self.state = SessionState::AwaitingJoinStatus;
        Ok(())
    }

    /// Gracefully leaves the relay. Play continues solo on the hazards we see right now.
    /// No-op without a link.
    pub fn leave(&mut self) {
        if self.link.is_none() {
            return;
        }
        self.send(ClientEvent::Leave);
        self.mark_disconnected("Left the session".to_string());
    }

    /// Advances the session by one frame:
    /// 1. Applies everything the relay delivered
    /// 2. Moves the own ship, the hazards (if we own them) and all projectiles
    /// 3. Fires if asked and allowed
    /// 4. Checks the own ship and the own projectiles against the hazards
    /// 5. Sends the own ship and, as host, the full hazard list
    pub fn update(&mut self, delta_time: f32) {
        let scale = delta_time * TICKS_PER_SECOND;

        self.receive_events();

        self.simulation.advance_ship(scale);
        if let Some(broadcast) = self.hazards.tick(scale)
            && matches!(self.state, SessionState::Hosting { .. })
        {
            self.send(ClientEvent::UpdateAsteroids(broadcast));
        }
        for expired in self.own_projectiles.advance(scale, delta_time) {
            self.send_if_paired(ClientEvent::DestroyBullet(expired));
        }
        self.reconciler.advance(scale, delta_time);

        self.cooldown = (self.cooldown - delta_time).max(0.0);
        if self.simulation.wants_to_fire() && self.cooldown <= 0.0 {
            self.fire();
        }

        self.check_projectile_hits();
        self.check_ship_hit();

        self.send_if_paired(ClientEvent::Move(self.simulation.ship()));
    }

    fn fire(&mut self) {
        let id = ProjectileId {
            owner: self.role,
            serial: self.next_serial,
        };
        self.next_serial += 1;
        let shot = shot_from(&self.simulation.ship(), id);
        self.own_projectiles.add(shot.clone());
        self.cooldown = FIRE_COOLDOWN_SECS;
        self.send_if_paired(ClientEvent::Shoot(shot));
    }

    fn check_projectile_hits(&mut self) {
        let shots: Vec<(ProjectileId, f32, f32, f32)> = self
            .own_projectiles
            .projectiles()
            .iter()
            .map(|p| (p.id, p.x, p.y, p.width))
            .collect();
        for (id, x, y, width) in shots {
            if let Some(hazard) = first_hit(self.hazards.hazards(), x, y, width) {
                tracing::trace!(?id, hazard = hazard.0, "Projectile hit.");
                self.own_projectiles.remove(id);
                self.send_if_paired(ClientEvent::DestroyBullet(id));
                self.destroy_hazard(hazard);
            }
        }
    }

    fn check_ship_hit(&mut self) {
        let ship = self.simulation.ship();
        if ship.damaged {
            return;
        }
        if let Some(hazard) = first_hit(self.hazards.hazards(), ship.x, ship.y, ship.width) {
            tracing::debug!(hazard = hazard.0, "Ship struck.");
            self.simulation.ship_struck();
            self.destroy_hazard(hazard);
        }
    }

    fn destroy_hazard(&mut self, id: HazardId) {
        self.hazards.destroy(id, &mut self.rng);
        self.send_if_paired(ClientEvent::DestroyAsteroid(id));
    }

    fn receive_events(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match link.poll() {
            Ok(events) => {
                for event in events {
                    self.handle_event(event);
                }
            }
            Err(reason) => self.mark_disconnected(reason),
        }
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RoomIdGenerated(room_id) => {
                if self.state == SessionState::RequestingId {
                    self.send(ClientEvent::HostGame(room_id));
                    self.state = SessionState::AwaitingHostStatus;
                } else {
                    tracing::warn!(state = ?self.state, "Unexpected room id.");
                }
            }
            ServerEvent::HostStatus(status) => {
                if self.state != SessionState::AwaitingHostStatus {
                    tracing::warn!(state = ?self.state, "Unexpected host status.");
                    return;
                }
                match status {
                    PairingStatus::Success { room_id } => {
                        tracing::info!(room = %room_id, "Hosting room.");
                        self.enter_room(Role::Host);
                        self.state = SessionState::Hosting { room_id };
                    }
                    PairingStatus::Failure { message } => self.refuse(message),
                }
            }
            ServerEvent::JoinStatus(status) => {
                if self.state != SessionState::AwaitingJoinStatus {
                    tracing::warn!(state = ?self.state, "Unexpected join status.");
                    return;
                }
                match status {
                    PairingStatus::Success { room_id } => {
                        tracing::info!(room = %room_id, "Joined room.");
                        self.enter_room(Role::Guest);
                        self.state = SessionState::Joined { room_id };
                    }
                    PairingStatus::Failure { message } => self.refuse(message),
                }
            }
            ServerEvent::PlayerLeft(connection_id) => {
                tracing::info!(peer = %connection_id, "Peer left.");
                self.reconciler.peer_left();
                if matches!(self.state, SessionState::Joined { .. }) {
                    // The host took the room with it, we continue on our own.
                    self.hazards.promote();
                    self.role = Role::Host;
                    self.state = SessionState::Idle;
                }
            }
            ServerEvent::ServerError(reason) => self.mark_disconnected(reason),
            gameplay => self
                .reconciler
                .apply(gameplay, &mut self.hazards, &mut self.rng),
        }
    }

    fn enter_room(&mut self, role: Role) {
        self.role = role;
        self.hazards = HazardAuthority::for_role(role, &mut self.rng);
        self.reconciler.peer_left();
        self.own_projectiles.clear();
    }

    fn refuse(&mut self, message: String) {
        tracing::info!(%message, "Pairing refused.");
        self.state = SessionState::Refused { message };
    }

    /// Global function to mark the end of the link and drop the connection.
    fn mark_disconnected(&mut self, reason: String) {
        tracing::info!(%reason, "Relay connection ended.");
        self.link = None; // Drops sender + receiver, closes connection
        self.reconciler.peer_left();
        self.hazards.promote();
        self.role = Role::Host;
        self.state = SessionState::Disconnected { reason };
    }

    fn send(&mut self, event: ClientEvent) {
        if let Some(link) = self.link.as_mut() {
            link.send(event);
        }
    }

    fn send_if_paired(&mut self, event: ClientEvent) {
        if self.is_paired() {
            self.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ConnectionId, failure};

    #[derive(Default)]
    struct MemoryLink {
        sent: Vec<ClientEvent>,
        inbox: Vec<ServerEvent>,
        broken: Option<String>,
    }

    impl Link for MemoryLink {
        fn send(&mut self, event: ClientEvent) {
            self.sent.push(event);
        }

        fn poll(&mut self) -> Result<Vec<ServerEvent>, String> {
            if let Some(reason) = self.broken.take() {
                return Err(reason);
            }
            Ok(std::mem::take(&mut self.inbox))
        }
    }

    struct Pilot {
        ship: ShipInfo,
        trigger: bool,
        struck: u32,
    }

    impl Pilot {
        fn at(x: f32, y: f32) -> Self {
            Pilot {
                ship: ShipInfo {
                    x,
                    y,
                    width: 40.0,
                    height: 40.0,
                    visible: true,
                    ..ShipInfo::default()
                },
                trigger: false,
                struck: 0,
            }
        }
    }

    impl LocalSimulation for Pilot {
        fn ship(&self) -> ShipInfo {
            self.ship.clone()
        }

        fn advance_ship(&mut self, _scale: f32) {}

        fn wants_to_fire(&mut self) -> bool {
            std::mem::take(&mut self.trigger)
        }

        fn ship_struck(&mut self) {
            self.struck += 1;
            self.ship.damaged = true;
        }
    }

    type TestSession = PeerSession<Pilot, MemoryLink>;

    fn session() -> TestSession {
        PeerSession::new(
            Pilot::at(960.0, 540.0),
            Some(MemoryLink::default()),
            StdRng::seed_from_u64(5),
        )
    }

    fn deliver(session: &mut TestSession, event: ServerEvent) {
        session.link_mut().unwrap().inbox.push(event);
        session.update(0.02);
    }

    fn take_sent(session: &mut TestSession) -> Vec<ClientEvent> {
        std::mem::take(&mut session.link_mut().unwrap().sent)
    }

    fn joined_session(hazards: Vec<HazardRecord>) -> TestSession {
        let mut session = session();
        session.join_game(RoomId::from("ABC123")).unwrap();
        deliver(
            &mut session,
            ServerEvent::JoinStatus(PairingStatus::Success {
                room_id: RoomId::from("ABC123"),
            }),
        );
        deliver(&mut session, ServerEvent::UpdateAsteroids(hazards));
        take_sent(&mut session);
        session
    }

    fn hazard(id: u32, x: f32, y: f32, radius: f32) -> HazardRecord {
        HazardRecord {
            id: HazardId(id),
            x,
            y,
            radius,
            angle: 0.0,
            speed: 0.0,
        }
    }

    #[test]
    fn test_host_handshake_and_broadcast() {
        let mut session = session();
        session.host_game().unwrap();
        assert_eq!(take_sent(&mut session), vec![ClientEvent::RequestRoomId]);
        assert_eq!(session.state(), &SessionState::RequestingId);

        deliver(
            &mut session,
            ServerEvent::RoomIdGenerated(RoomId::from("QWE123")),
        );
        assert_eq!(
            take_sent(&mut session),
            vec![ClientEvent::HostGame(RoomId::from("QWE123"))]
        );
        assert_eq!(session.state(), &SessionState::AwaitingHostStatus);

        deliver(
            &mut session,
            ServerEvent::HostStatus(PairingStatus::Success {
                room_id: RoomId::from("QWE123"),
            }),
        );
        assert!(matches!(session.state(), SessionState::Hosting { .. }));
        assert!(session.is_hazard_authority());

        let sent = take_sent(&mut session);
        assert!(sent.iter().any(|e| matches!(e, ClientEvent::UpdateAsteroids(list) if !list.is_empty())));
        assert!(sent.iter().any(|e| matches!(e, ClientEvent::Move(_))));
    }

    fn hosting_session() -> TestSession {
        let mut session = session();
        session.host_game().unwrap();
        deliver(&mut session, ServerEvent::RoomIdGenerated(RoomId::from("AAA111")));
        deliver(
            &mut session,
            ServerEvent::HostStatus(PairingStatus::Success {
                room_id: RoomId::from("AAA111"),
            }),
        );
        take_sent(&mut session);
        session
    }

    fn broadcast(sent: &[ClientEvent]) -> Option<&Vec<HazardRecord>> {
        sent.iter().find_map(|e| match e {
            ClientEvent::UpdateAsteroids(list) => Some(list),
            _ => None,
        })
    }

    #[test]
    fn test_host_keeps_room_when_guest_leaves() {
        let mut session = hosting_session();
        deliver(&mut session, ServerEvent::PlayerJoined(Pilot::at(5.0, 5.0).ship));
        assert!(session.shadow().is_some());
        take_sent(&mut session);

        deliver(&mut session, ServerEvent::PlayerLeft(ConnectionId(2)));

        assert_eq!(
            session.state(),
            &SessionState::Hosting {
                room_id: RoomId::from("AAA111")
            }
        );
        assert!(session.shadow().is_none());
        assert!(session.is_hazard_authority());
        let sent = take_sent(&mut session);
        assert_eq!(broadcast(&sent).map(Vec::as_slice), Some(session.hazards()));
    }

    #[test]
    fn test_host_splits_hazard_destroyed_by_guest() {
        let mut session = hosting_session();
        let before = session.hazards().to_vec();
        let target = before
            .iter()
            .max_by(|a, b| a.radius.total_cmp(&b.radius))
            .unwrap()
            .clone();
        let highest_id = before.iter().map(|h| h.id.0).max().unwrap();
        let fragments = (target.radius / 15.0).floor() as usize;

        deliver(&mut session, ServerEvent::AsteroidDestroyed(target.id));

        let sent = take_sent(&mut session);
        let list = broadcast(&sent).unwrap();
        assert!(list.iter().all(|h| h.id != target.id));
        let fresh: Vec<&HazardRecord> = list.iter().filter(|h| h.id.0 > highest_id).collect();
        if fragments > 1 {
            assert_eq!(fresh.len(), fragments);
            assert_eq!(list.len(), before.len() - 1 + fragments);
        } else {
            assert!(fresh.is_empty());
            assert_eq!(list.len(), before.len() - 1);
        }
    }

    #[test]
    fn test_refused_join_allows_retry() {
        let mut session = session();
        session.join_game(RoomId::from("ZZZ999")).unwrap();
        assert!(matches!(
            take_sent(&mut session).as_slice(),
            [ClientEvent::JoinGame { room_id, .. }] if room_id.as_str() == "ZZZ999"
        ));

        deliver(
            &mut session,
            ServerEvent::JoinStatus(PairingStatus::failure(failure::ROOM_NOT_FOUND)),
        );
        assert_eq!(
            session.state(),
            &SessionState::Refused {
                message: failure::ROOM_NOT_FOUND.to_string()
            }
        );
        // Nothing gets sent while not paired.
        assert!(take_sent(&mut session).is_empty());

        assert!(session.join_game(RoomId::from("ABC123")).is_ok());
        assert_eq!(
            session.join_game(RoomId::from("ABC123")),
            Err(SessionError::Busy(SessionState::AwaitingJoinStatus))
        );
    }

    #[test]
    fn test_offline_session_plays_solo() {
        let mut session: TestSession = PeerSession::new(
            Pilot::at(960.0, 540.0),
            None,
            StdRng::seed_from_u64(1),
        );
        assert_eq!(session.host_game(), Err(SessionError::NoLink));
        let before = session.hazards().to_vec();
        session.update(0.02);
        assert_eq!(session.state(), &SessionState::Offline);
        assert_ne!(session.hazards(), before.as_slice());
    }

    #[test]
    fn test_guest_mirrors_and_never_broadcasts_hazards() {
        let mut session = joined_session(vec![hazard(1, 100.0, 100.0, 20.0)]);
        assert!(!session.is_hazard_authority());

        session.update(0.02);
        assert_eq!(session.hazards(), &[hazard(1, 100.0, 100.0, 20.0)]);
        let sent = take_sent(&mut session);
        assert!(!sent.iter().any(|e| matches!(e, ClientEvent::UpdateAsteroids(_))));
        assert!(sent.iter().any(|e| matches!(e, ClientEvent::Move(_))));
    }

    #[test]
    fn test_host_leaving_promotes_mirror() {
        let mut session = joined_session(vec![hazard(1, 100.0, 100.0, 60.0)]);
        deliver(&mut session, ServerEvent::PlayerMoving(Pilot::at(5.0, 5.0).ship));
        assert!(session.shadow().is_some());

        deliver(&mut session, ServerEvent::PlayerLeft(ConnectionId(1)));

        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.shadow().is_none());
        assert!(session.is_hazard_authority());
        assert_eq!(session.hazards()[0].id, HazardId(1));
    }

    #[test]
    fn test_own_shot_destroys_mirrored_hazard() {
        // Straight above the ship, out of reach of the ship itself.
        let mut session = joined_session(vec![hazard(3, 960.0, 440.0, 10.0)]);
        session.simulation_mut().trigger = true;

        let mut sent = Vec::new();
        for _ in 0..20 {
            if session.hazards().is_empty() {
                break;
            }
            session.update(0.02);
            sent.extend(take_sent(&mut session));
        }

        assert!(session.hazards().is_empty());
        assert!(session.own_projectiles().is_empty());
        let shot = ProjectileId {
            owner: Role::Guest,
            serial: 0,
        };
        assert!(sent.iter().any(|e| matches!(e, ClientEvent::Shoot(p) if p.id == shot)));
        assert!(sent.contains(&ClientEvent::DestroyBullet(shot)));
        assert!(sent.contains(&ClientEvent::DestroyAsteroid(HazardId(3))));
    }

    #[test]
    fn test_ship_collision_only_while_undamaged() {
        let mut session = joined_session(Vec::new());
        deliver(
            &mut session,
            ServerEvent::UpdateAsteroids(vec![
                hazard(1, 960.0, 540.0, 10.0),
                hazard(2, 970.0, 540.0, 10.0),
            ]),
        );
        session.update(0.02);

        // One hit, the ship is damaged afterwards and passes through the second hazard.
        assert_eq!(session.simulation().struck, 1);
        assert_eq!(session.hazards(), &[hazard(2, 970.0, 540.0, 10.0)]);
        assert!(take_sent(&mut session).contains(&ClientEvent::DestroyAsteroid(HazardId(1))));
    }

    #[test]
    fn test_fire_cooldown() {
        let mut session = hosting_session();

        let mut shots = 0;
        for _ in 0..10 {
            session.simulation_mut().trigger = true;
            session.update(0.02);
            shots += take_sent(&mut session)
                .iter()
                .filter(|e| matches!(e, ClientEvent::Shoot(_)))
                .count();
        }
        assert_eq!(shots, 1);
    }

    #[test]
    fn test_leave_sends_notice_and_drops_link() {
        let mut session = joined_session(Vec::new());
        session.leave();
        assert_eq!(
            session.state(),
            &SessionState::Disconnected {
                reason: "Left the session".to_string()
            }
        );
        assert!(session.link_mut().is_none());
        // A second leave has nothing left to do.
        session.leave();
    }

    #[test]
    fn test_server_error_disconnects_with_reason() {
        let mut session = joined_session(Vec::new());
        deliver(
            &mut session,
            ServerEvent::ServerError("Illegal Command from client".to_string()),
        );
        assert_eq!(
            session.state(),
            &SessionState::Disconnected {
                reason: "Illegal Command from client".to_string()
            }
        );
        assert!(session.link_mut().is_none());
    }

    #[test]
    fn test_lost_link_disconnects() {
        let mut session = joined_session(Vec::new());
        session.link_mut().unwrap().broken = Some("Connection closed by server".to_string());
        session.update(0.02);

        assert_eq!(
            session.state(),
            &SessionState::Disconnected {
                reason: "Connection closed by server".to_string()
            }
        );
        assert!(session.link_mut().is_none());
        assert!(session.is_hazard_authority());
    }
}
