use crate::dispatch;
use crate::protocol::{ClientMessage, EngineCommand};
use crate::session::{OpenedConnection, Package, Session};
use crate::state::AppState;
use crate::utils::{log_throttle_start, should_log};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connection lifecycle failures that end the client loop.
#[derive(Debug)]
enum NetError {
    /// The engine task is gone; no connection can make progress.
    CommandChannelClosed,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Register the connection before anything awaits: identity and input
    // record exist from the first inbound frame on.
    let OpenedConnection {
        conn_id,
        outbound_rx,
    } = state.session.open(state.outbound_channel_capacity);
    info!(conn_id, "client connected");

    let mut ctx = ConnCtx {
        conn_id,
        command_tx: state.command_tx.clone(),
        outbound_rx,
        msgs_in: 0,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,
        invalid_frames: 0,
        last_invalid_frame_log: log_throttle_start(),
    };

    let result = run_client_loop(&mut socket, &mut ctx, &state.session).await;

    // Exactly one caller runs the leave path; a death notification may have
    // removed the entries already.
    if state.session.close(conn_id)
        && ctx
            .command_tx
            .send(EngineCommand::Leave { player_id: conn_id })
            .await
            .is_err()
    {
        warn!(conn_id, "engine command channel closed during disconnect");
    }

    debug!(
        conn_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_frames = ctx.invalid_frames,
        "connection stats"
    );
    info!(conn_id, "client disconnected");

    if let Err(error) = result {
        warn!(conn_id, error = ?error, "client loop exited with error");
    }
}

struct ConnCtx {
    conn_id: u64,
    command_tx: mpsc::Sender<EngineCommand>,
    outbound_rx: mpsc::Receiver<Package>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    invalid_frames: u32,
    last_invalid_frame_log: Instant,
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
    session: &Session,
) -> Result<(), NetError> {
    let conn_id = ctx.conn_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        command_tx,
        outbound_rx,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_frames,
        last_invalid_frame_log,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true when the connection must be torn down
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming(
                    incoming,
                    conn_id,
                    session,
                    command_tx,
                    msgs_in,
                    bytes_in,
                    invalid_frames,
                    last_invalid_frame_log,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing package from the tick broadcaster
            package = outbound_rx.recv() => {
                match package {
                    Some(package) => {
                        let bytes = package.len();
                        match socket.send(Message::Binary(package.into())).await {
                            Ok(()) => {
                                *msgs_out += 1;
                                *bytes_out += bytes as u64;
                                false
                            }
                            Err(error) => {
                                // A failed send is a close; cleanup runs after the loop.
                                debug!(conn_id, error = %error, "package send failed");
                                true
                            }
                        }
                    }
                    // Session entry removed server-side (death); close the socket.
                    None => true,
                }
            }
        };

        if disconnect {
            if let Err(error) = socket.close().await {
                debug!(conn_id, error = %error, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming(
    incoming: Option<Result<Message, axum::Error>>,
    conn_id: u64,
    session: &Session,
    command_tx: &mpsc::Sender<EngineCommand>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_frames: &mut u32,
    last_invalid_frame_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            *msgs_in += 1;
            *bytes_in += text.len() as u64;

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    dispatch::apply(session, command_tx, conn_id, msg)
                        .await
                        .map_err(|_| NetError::CommandChannelClosed)?;
                    Ok(LoopControl::Continue)
                }
                Err(error) => {
                    // Malformed frames are dropped; the connection stays open.
                    *invalid_frames += 1;
                    if should_log(last_invalid_frame_log) {
                        warn!(
                            conn_id,
                            bytes = text.len(),
                            error = %error,
                            "failed to parse client message"
                        );
                    }
                    Ok(LoopControl::Continue)
                }
            }
        }
        Some(Ok(Message::Binary(_))) => {
            // Inbound traffic is JSON text; anything else counts as malformed.
            *invalid_frames += 1;
            if should_log(last_invalid_frame_log) {
                warn!(conn_id, "binary frame ignored");
            }
            Ok(LoopControl::Continue)
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(LoopControl::Continue),
        Some(Ok(Message::Close(_))) => Ok(LoopControl::Disconnect),
        Some(Err(error)) => {
            warn!(conn_id, error = %error, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => Ok(LoopControl::Disconnect),
    }
}
