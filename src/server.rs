use crate::config::{ServerSettings, WorldData};
use crate::engine::Engine;
use crate::game::engine_task;
use crate::net::ws_handler;
use crate::session::Session;
use crate::state::AppState;

use axum::{Router, routing::get};
use std::{io::Result, sync::Arc};
use tokio::sync::mpsc;

/// Sets up env, tracing output, and the panic hook for a server process.
/// Library embedders and tests may skip this and install their own.
pub fn init_tracing() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves one session on an already-bound listener with an already-built
/// engine. Runs until the listener fails.
pub async fn run<E: Engine>(
    listener: tokio::net::TcpListener,
    mut engine: E,
    settings: ServerSettings,
) -> Result<()> {
    let address = listener.local_addr()?;

    let session = Arc::new(Session::new());

    // Join/leave/chat commands funnel into the engine task; deaths flow back
    // on a dedicated channel registered once, before the first tick.
    let (command_tx, command_rx) = mpsc::channel(settings.command_channel_capacity);
    let (death_tx, death_rx) = mpsc::unbounded_channel();
    engine.on_player_death(death_tx);

    // Spawn the tick loop. It owns the engine from here on.
    tokio::spawn(engine_task(
        engine,
        session.clone(),
        command_rx,
        death_rx,
        settings.tick_interval,
    ));

    let state = Arc::new(AppState {
        session,
        command_tx,
        outbound_channel_capacity: settings.outbound_channel_capacity,
    });

    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

/// Builds the engine from static world/config documents, then serves.
/// Malformed configuration is fatal and aborts startup before the listener
/// accepts anything.
pub async fn run_with_world_data<E: Engine>(
    listener: tokio::net::TcpListener,
    world: &WorldData,
    settings: ServerSettings,
) -> Result<()> {
    let engine = E::from_world_data(&world.config, &world.worlds).map_err(|error| {
        tracing::error!(error = %error, "engine rejected configuration");
        std::io::Error::other(format!("engine rejected configuration: {error}"))
    })?;
    run(listener, engine, settings).await
}
