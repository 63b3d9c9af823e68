//! A headless pilot for manual end to end checks against a running relay.
//! It flies in circles, fires once a second and logs what happens to the session.

use clap::Parser;
use protocol::{RoomId, ShipInfo};
use session_client::arena;
use session_client::{LocalSimulation, PeerSession, SessionState};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(20);
/// Ticks the ship stays damaged after a crash.
const RECOVERY_TICKS: u32 = 75;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Websocket url of the relay
    #[arg(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Open a room and wait for a guest
    #[arg(long, conflicts_with = "join")]
    host: bool,

    /// Join the room with this id
    #[arg(long)]
    join: Option<String>,

    /// Stop after this many seconds, runs forever if not given
    #[arg(short, long)]
    seconds: Option<u64>,
}

struct Drone {
    ship: ShipInfo,
    ticks: u32,
    recovery: u32,
    crashes: u32,
}

impl Drone {
    fn new() -> Self {
        let (x, y) = arena::centre();
        Drone {
            ship: ShipInfo {
                x,
                y,
                speed: 3.0,
                move_angle: 2.0,
                width: 40.0,
                height: 40.0,
                visible: true,
                ..ShipInfo::default()
            },
            ticks: 0,
            recovery: 0,
            crashes: 0,
        }
    }
}

impl LocalSimulation for Drone {
    fn ship(&self) -> ShipInfo {
        self.ship.clone()
    }

    fn advance_ship(&mut self, scale: f32) {
        let ship = &mut self.ship;
        ship.angle += ship.move_angle.to_radians() * scale;
        let (x, y) = arena::step(ship.x, ship.y, ship.angle, ship.speed * scale);
        (ship.x, ship.y) = arena::wrap(x, y);

        if self.recovery > 0 {
            self.recovery -= 1;
            ship.visible = self.recovery % 10 < 5;
            if self.recovery == 0 {
                ship.damaged = false;
                ship.visible = true;
            }
        }
        self.ticks += 1;
    }

    fn wants_to_fire(&mut self) -> bool {
        self.ticks % 50 == 0
    }

    fn ship_struck(&mut self) {
        self.crashes += 1;
        self.ship.damaged = true;
        self.recovery = RECOVERY_TICKS;
        tracing::info!(crashes = self.crashes, "Drone crashed.");
    }
}

fn main() {
    tracing_subscriber::fmt().compact().init();
    let args = Args::parse();

    let mut session = match PeerSession::connect(Drone::new(), &args.url) {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(%error, "Could not start the session.");
            std::process::exit(1);
        }
    };

    let pairing = match &args.join {
        Some(room) => session.join_game(RoomId::new(room.as_str())),
        None if args.host => session.host_game(),
        None => Ok(()),
    };
    if let Err(error) = pairing {
        tracing::error!(%error, "Pairing failed.");
        std::process::exit(1);
    }

    let limit = args.seconds.map(|s| s * 1000 / TICK.as_millis() as u64);
    let mut last_state = session.state().clone();
    let mut tick: u64 = 0;
    while limit.is_none_or(|limit| tick < limit) {
        session.update(TICK.as_secs_f32());
        if session.state() != &last_state {
            last_state = session.state().clone();
            tracing::info!(state = ?last_state, "Session state changed.");
            if matches!(last_state, SessionState::Disconnected { .. }) {
                break;
            }
        }
        if tick % 250 == 0 {
            tracing::debug!(
                hazards = session.hazards().len(),
                shots = session.own_projectiles().len(),
                peer = session.shadow().is_some(),
                "Drone status."
            );
        }
        tick += 1;
        std::thread::sleep(TICK);
    }
    session.leave();
}
