use crate::input::{InputRegistry, InputState};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Opaque per-player payload produced by the engine for one tick.
pub type Package = Vec<u8>;

/// Everything the connection task needs after registration.
pub struct OpenedConnection {
    pub conn_id: u64,
    /// Packages the broadcaster queues for this connection. The channel
    /// closing means the session entry is gone and the socket must close.
    pub outbound_rx: mpsc::Receiver<Package>,
}

#[derive(Debug)]
struct ConnectionHandle {
    outbound: mpsc::Sender<Package>,
    /// False until an `init` message is accepted; guards duplicate joins.
    joined: bool,
    /// Display name, settable via the `init` payload. Defaults empty.
    name: String,
}

#[derive(Debug, Default)]
struct SessionInner {
    next_id: u64,
    connections: HashMap<u64, ConnectionHandle>,
    inputs: InputRegistry,
}

/// Owned state for one running session: the connection table and the input
/// registry under a single lock, so the tick never observes an input record
/// whose connection is gone.
///
/// The lock is held only for short, non-awaiting critical sections.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session state lock poisoned")
    }

    /// Registers a new connection: allocates the next identity and creates
    /// its input record in the same critical section. The player is not in
    /// the simulation until an `init` message arrives.
    pub fn open(&self, outbound_capacity: usize) -> OpenedConnection {
        let (outbound, outbound_rx) = mpsc::channel(outbound_capacity);
        let mut inner = self.locked();
        let conn_id = inner.next_id;
        inner.next_id += 1;
        inner.connections.insert(
            conn_id,
            ConnectionHandle {
                outbound,
                joined: false,
                name: String::new(),
            },
        );
        inner.inputs.create(conn_id);
        OpenedConnection {
            conn_id,
            outbound_rx,
        }
    }

    /// Removes the connection and its input record together. Returns whether
    /// the entries were still present, so exactly one caller runs the leave
    /// path. Dropping the outbound sender is the close signal for the
    /// connection task.
    pub fn close(&self, conn_id: u64) -> bool {
        let mut inner = self.locked();
        let present = inner.connections.remove(&conn_id).is_some();
        inner.inputs.remove(conn_id);
        present
    }

    /// Marks the connection joined and returns the token to join the engine
    /// with. `None` means the connection is already joined (or gone) and no
    /// engine join may be issued. A string `init` payload becomes both the
    /// display name and the token.
    pub fn begin_join(&self, conn_id: u64, name: Option<String>) -> Option<String> {
        let mut inner = self.locked();
        let handle = inner.connections.get_mut(&conn_id)?;
        if handle.joined {
            return None;
        }
        handle.joined = true;
        if let Some(name) = name {
            handle.name = name;
        }
        Some(handle.name.clone())
    }

    /// Applies one input mutation in place. Returns false when the
    /// connection is already gone, in which case the message is dropped.
    pub fn apply_input<F>(&self, conn_id: u64, mutate: F) -> bool
    where
        F: FnOnce(&mut InputState),
    {
        let mut inner = self.locked();
        match inner.inputs.get_mut(conn_id) {
            Some(state) => {
                mutate(state);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every input record for the current tick; one-shot flags
    /// are consumed in the same critical section.
    pub fn snapshot_inputs(&self) -> Vec<(u64, InputState)> {
        self.locked().inputs.snapshot_for_tick()
    }

    /// The live connection table for one broadcast pass.
    pub fn broadcast_targets(&self) -> Vec<(u64, mpsc::Sender<Package>)> {
        self.locked()
            .connections
            .iter()
            .map(|(id, handle)| (*id, handle.outbound.clone()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.locked().connections.len()
    }
}
