use crate::protocol::EngineCommand;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared handles every connection task gets from the router.
#[derive(Clone)]
pub struct AppState {
    /// Connection table + input registry for this session.
    pub session: Arc<Session>,
    /// Join/leave/chat commands flowing into the engine task.
    pub command_tx: mpsc::Sender<EngineCommand>,
    /// Capacity of each connection's outbound package channel.
    pub outbound_channel_capacity: usize,
}
