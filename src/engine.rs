use crate::input::InputState;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Notification sink handed to the engine for asynchronous player deaths.
/// The engine pushes the dead player's identity; the session layer reacts by
/// force-closing that connection.
pub type DeathSender = mpsc::UnboundedSender<u64>;

/// Boundary to the authoritative simulation engine.
///
/// The engine's own concurrency contract is unknown, so the session layer
/// treats it as single-threaded: one task owns the instance and every call
/// goes through that task, with `update` never overlapping another call.
pub trait Engine: Send + Sized + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Builds the engine once from the raw config document and world
    /// definition documents. Malformed configuration fails construction and
    /// aborts server startup.
    fn from_world_data(config: &str, worlds: &[String]) -> Result<Self, Self::Error>;

    /// Admits a player into the simulation. Duplicate-admission behavior is
    /// engine-defined; an error here is unrecoverable for that player only.
    fn join(&mut self, session_token: &str, player_id: u64) -> Result<(), Self::Error>;

    /// Removes a player. Safe to call for an unknown id.
    fn leave(&mut self, player_id: u64);

    /// Records a player's intent for the next update; does not advance time.
    fn input(&mut self, player_id: u64, input: &InputState);

    /// Side-channel chat event, not part of the input vector.
    fn chat_message(&mut self, text: &str, sender_id: u64);

    /// Advances the simulation one tick and returns the per-player packages.
    /// An empty payload means "nothing to send this tick".
    fn update(&mut self) -> HashMap<u64, Vec<u8>>;

    /// Registers the single asynchronous death notification sink. Called once
    /// at startup before the first tick.
    fn on_player_death(&mut self, deaths: DeathSender);
}
