use serde::Deserialize;

/// One decoded inbound frame.
///
/// Clients pack any subset of these keys into a single JSON object, so every
/// field is optional and unknown keys are ignored. Key and ability names stay
/// raw strings; dispatch decides which names it recognizes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    /// Chat text, forwarded to the engine tagged with the sender.
    pub message: Option<String>,
    /// Key release naming one of down/left/right/up/shift.
    pub key_up: Option<String>,
    /// Key press naming one of down/left/right/up/shift.
    pub key_down: Option<String>,
    /// Join request; a string payload doubles as display name and join token.
    pub init: Option<serde_json::Value>,
    /// Absolute mouse position as an `[x, y]` pair.
    pub mouse_pos: Option<[f64; 2]>,
    /// Whether mouse steering is active.
    pub mouse_enable: Option<bool>,
    /// One-shot ability trigger naming a slot.
    pub ability: Option<String>,
}

/// Commands funneled into the engine task, which owns all engine calls.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Join { player_id: u64, session_token: String },
    Leave { player_id: u64 },
    Chat { sender_id: u64, text: String },
}
