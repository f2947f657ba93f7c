use crate::engine::Engine;
use crate::protocol::EngineCommand;
use crate::session::Session;
use crate::utils::{log_throttle_start, should_log};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Drives the simulation: sole owner of the engine instance.
///
/// Every engine call is funneled through this task, so `update` never
/// overlaps itself or a join/leave/chat. The interval measures elapsed time
/// and `Delay` reschedules after a slow cycle completes, so ticks never
/// overlap and never burst to catch up.
pub async fn engine_task<E: Engine>(
    mut engine: E,
    session: Arc<Session>,
    mut command_rx: mpsc::Receiver<EngineCommand>,
    mut death_rx: mpsc::UnboundedReceiver<u64>,
    tick_interval: Duration,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut deaths_open = true;
    let mut full_outbound_log = log_throttle_start();

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(command) => apply_command(&mut engine, &session, command),
                    // Every sender is gone; the server is shutting down.
                    None => break,
                }
            }

            death = death_rx.recv(), if deaths_open => {
                match death {
                    Some(player_id) => handle_death(&mut engine, &session, player_id),
                    None => deaths_open = false,
                }
            }

            _ = interval.tick() => {
                // Apply anything still queued before this cycle's snapshot.
                while let Ok(command) = command_rx.try_recv() {
                    apply_command(&mut engine, &session, command);
                }
                run_tick(&mut engine, &session, &mut death_rx, &mut full_outbound_log);
            }
        }
    }
}

fn apply_command<E: Engine>(engine: &mut E, session: &Session, command: EngineCommand) {
    match command {
        EngineCommand::Join {
            player_id,
            session_token,
        } => match engine.join(&session_token, player_id) {
            Ok(()) => info!(player_id, "player joined"),
            Err(error) => {
                // Unrecoverable for this player only; the session survives.
                warn!(player_id, error = %error, "engine rejected join; closing connection");
                session.close(player_id);
            }
        },
        EngineCommand::Leave { player_id } => {
            info!(player_id, "player left");
            engine.leave(player_id);
        }
        EngineCommand::Chat { sender_id, text } => {
            engine.chat_message(&text, sender_id);
        }
    }
}

/// Death notifications run the ordinary close path from this side: entries go
/// first, then the engine leave. The dropped outbound sender makes the
/// connection task close the socket.
fn handle_death<E: Engine>(engine: &mut E, session: &Session, player_id: u64) {
    info!(player_id, "engine reported player death; closing connection");
    if session.close(player_id) {
        engine.leave(player_id);
    }
}

/// One tick cycle: input snapshot, single engine update, broadcast pass.
fn run_tick<E: Engine>(
    engine: &mut E,
    session: &Session,
    death_rx: &mut mpsc::UnboundedReceiver<u64>,
    full_outbound_log: &mut Instant,
) {
    let snapshots = session.snapshot_inputs();
    for (player_id, input) in &snapshots {
        engine.input(*player_id, input);
    }

    let mut packages = engine.update();

    // Deaths surfaced by this update take effect before the broadcast pass
    // and before the next snapshot.
    while let Ok(player_id) = death_rx.try_recv() {
        handle_death(engine, session, player_id);
    }

    for (player_id, outbound) in session.broadcast_targets() {
        let Some(package) = packages.remove(&player_id) else {
            // No package for this player this tick.
            continue;
        };
        if package.is_empty() {
            // Explicit "nothing changed".
            continue;
        }
        match outbound.try_send(package) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // A slow consumer never stalls the tick; shed this package.
                if should_log(full_outbound_log) {
                    warn!(player_id, "outbound channel full; dropping package");
                }
            }
            // Connection is tearing down; its close path handles cleanup.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
