use crate::input::{AbilitySlot, InputState};
use crate::protocol::{ClientMessage, EngineCommand};
use crate::session::Session;
use tokio::sync::mpsc;
use tracing::debug;

/// Dispatch failures the connection loop must react to. Everything else is
/// dropped here without touching the connection.
#[derive(Debug)]
pub enum DispatchError {
    /// The engine task is gone; the connection cannot make progress.
    CommandChannelClosed,
}

/// Applies one decoded message for the given sender.
///
/// Input mutations land in the session immediately and are visible to the
/// next tick. Chat and join are not part of the continuous input vector, so
/// they are forwarded to the engine task right away instead of waiting for a
/// tick boundary.
pub async fn apply(
    session: &Session,
    command_tx: &mpsc::Sender<EngineCommand>,
    conn_id: u64,
    msg: ClientMessage,
) -> Result<(), DispatchError> {
    if let Some(text) = msg.message {
        send_command(
            command_tx,
            EngineCommand::Chat {
                sender_id: conn_id,
                text,
            },
        )
        .await?;
    }

    if let Some(key) = msg.key_down.as_deref() {
        apply_key(session, conn_id, key, true);
    }

    if let Some(key) = msg.key_up.as_deref() {
        apply_key(session, conn_id, key, false);
    }

    if let Some(payload) = msg.init {
        // A string payload doubles as display name and join token; anything
        // else joins with the name set so far.
        let name = payload.as_str().map(str::to_owned);
        if let Some(session_token) = session.begin_join(conn_id, name) {
            send_command(
                command_tx,
                EngineCommand::Join {
                    player_id: conn_id,
                    session_token,
                },
            )
            .await?;
        } else {
            debug!(conn_id, "init ignored; already joined or connection gone");
        }
    }

    if let Some([x, y]) = msg.mouse_pos {
        mutate_input(session, conn_id, |input| {
            input.set_mouse_pos_x(x);
            input.set_mouse_pos_y(y);
        });
    }

    if let Some(enable) = msg.mouse_enable {
        mutate_input(session, conn_id, |input| input.set_mouse_enable(enable));
    }

    if let Some(slot) = msg.ability.as_deref() {
        match AbilitySlot::from_name(slot) {
            Some(slot) => {
                mutate_input(session, conn_id, |input| input.set_ability(slot, true));
            }
            None => debug!(conn_id, slot, "unknown ability slot ignored"),
        }
    }

    Ok(())
}

fn apply_key(session: &Session, conn_id: u64, key: &str, pressed: bool) {
    match key {
        "down" => mutate_input(session, conn_id, |input| input.set_down(pressed)),
        "left" => mutate_input(session, conn_id, |input| input.set_left(pressed)),
        "right" => mutate_input(session, conn_id, |input| input.set_right(pressed)),
        "up" => mutate_input(session, conn_id, |input| input.set_up(pressed)),
        "shift" => mutate_input(session, conn_id, |input| input.set_shift(pressed)),
        _ => debug!(conn_id, key, "unknown key name ignored"),
    }
}

fn mutate_input<F>(session: &Session, conn_id: u64, mutate: F)
where
    F: FnOnce(&mut InputState),
{
    if !session.apply_input(conn_id, mutate) {
        // Connection already gone; drop the message.
        debug!(conn_id, "input for unknown connection dropped");
    }
}

async fn send_command(
    command_tx: &mpsc::Sender<EngineCommand>,
    command: EngineCommand,
) -> Result<(), DispatchError> {
    command_tx
        .send(command)
        .await
        .map_err(|_| DispatchError::CommandChannelClosed)
}
