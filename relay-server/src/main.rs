use anyhow::Context;
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use relay_server::config::{DEFAULT_CONFIG_FILE, load_config};
use relay_server::lobby::AppState;
use relay_server::message_relay::websocket;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
/// Activates error tracing, loads the configuration, spawns a watch dog task to eliminate eventual dead rooms,
/// then it sets up the routing system to serve the web sockets, the enlist page and the static files.
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true) // Modul-Path (e.g. relay_server::message_relay)
                .with_thread_ids(true) // Thread-ID (helpful for Tokio)
                .with_thread_names(true), // Thread-Name
        )
        .init();

    let config_path =
        std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let config = load_config(&config_path)
        .await
        .with_context(|| format!("Initial load error of {config_path}"))?;
    let address = config.socket_addr()?;
    let static_dir = config.static_dir.clone();
    let sweep_interval = config.sweep_interval_secs;

    let app_state = Arc::new(AppState::new(config));
    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            cleanup_dead_rooms(&watchdog_state).await;
        }
    });

    let index_file = format!("{static_dir}/index.html");
    let app = Router::new()
        .route("/enlist", get(enlist_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
        .fallback_service(ServeDir::new(&static_dir).not_found_service(ServeFile::new(index_file)));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Could not bind {address}"))?;
    tracing::info!(%address, "Relay listening.");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs over all rooms and checks if their members are disconnected from the server.
/// If so, it cleans them up. This is a fallback solution things should be handled internally otherwise.
async fn cleanup_dead_rooms(state: &Arc<AppState>) {
    let removed = state.lobby.lock().await.sweep_dead_rooms();
    if removed > 0 {
        tracing::info!(removed, "Dead rooms swept.");
    }
}

/// Generates a list with the current rooms, the amount of players and if the room still has its host.
async fn enlist_handler(State(state): State<Arc<AppState>>) -> String {
    let lobby = state.lobby.lock().await;
    lobby
        .directory
        .rooms()
        .map(|room| {
            let host = lobby.directory.host_of(&room.id);
            format!(
                "Room: {:<30}  Players: {:03} Host: {} is alive: {}",
                room.id,
                room.players().len(),
                host.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                room.players().iter().any(|member| lobby.is_alive(*member))
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// This function gets immediately called and upgrades the web response to a web socket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}
