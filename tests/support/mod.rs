#![allow(dead_code)]

// Shared primitives for booting a scripted-engine server across integration tests.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sync_server::input::InputState;
use sync_server::{DeathSender, Engine, ServerSettings};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

/// Tick interval for test servers; fast enough to keep polling loops short.
pub const TEST_TICK: Duration = Duration::from_millis(10);

/// How long polling helpers wait before declaring a property violated.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Every call the server made into the engine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Join { token: String, player_id: u64 },
    Leave { player_id: u64 },
    Input { player_id: u64, input: InputState },
    Chat { sender_id: u64, text: String },
    Update,
}

#[derive(Default)]
struct EngineShared {
    calls: Vec<EngineCall>,
    // Queued per-player packages; one is consumed per update call.
    packages: HashMap<u64, Vec<Vec<u8>>>,
    deaths: Option<DeathSender>,
}

/// Scripted engine: records every call and returns pre-queued packages.
/// Clones share state, so tests keep one handle while the server owns another.
#[derive(Clone, Default)]
pub struct FakeEngine {
    shared: Arc<Mutex<EngineShared>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Update))
            .count()
    }

    /// Queues a package the next update call will return for this player.
    pub fn queue_package(&self, player_id: u64, package: Vec<u8>) {
        self.shared
            .lock()
            .unwrap()
            .packages
            .entry(player_id)
            .or_default()
            .push(package);
    }

    /// Emits a death notification through the sink the server registered.
    pub fn kill(&self, player_id: u64) {
        let shared = self.shared.lock().unwrap();
        shared
            .deaths
            .as_ref()
            .expect("server should have registered the death sink")
            .send(player_id)
            .expect("engine task should be alive");
    }

    /// Polls the recorded calls until the predicate holds; panics after the
    /// wait timeout so failures surface with the observed call log.
    pub async fn wait_for<F>(&self, what: &str, mut predicate: F) -> Vec<EngineCall>
    where
        F: FnMut(&[EngineCall]) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let calls = self.calls();
            if predicate(&calls) {
                return calls;
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for {what}; engine saw {calls:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Waits until the engine has run at least `count` more update calls.
    pub async fn wait_for_updates(&self, count: usize) {
        let target = self.update_count() + count;
        self.wait_for("tick updates", |calls| {
            calls
                .iter()
                .filter(|call| matches!(call, EngineCall::Update))
                .count()
                >= target
        })
        .await;
    }
}

impl Engine for FakeEngine {
    type Error = std::io::Error;

    fn from_world_data(config: &str, worlds: &[String]) -> Result<Self, Self::Error> {
        // The scripted engine validates its documents the way a real one
        // would reject malformed configuration.
        serde_json::from_str::<serde_json::Value>(config).map_err(std::io::Error::other)?;
        for world in worlds {
            serde_json::from_str::<serde_json::Value>(world).map_err(std::io::Error::other)?;
        }
        Ok(Self::default())
    }

    fn join(&mut self, session_token: &str, player_id: u64) -> Result<(), Self::Error> {
        self.shared.lock().unwrap().calls.push(EngineCall::Join {
            token: session_token.to_string(),
            player_id,
        });
        Ok(())
    }

    fn leave(&mut self, player_id: u64) {
        self.shared
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::Leave { player_id });
    }

    fn input(&mut self, player_id: u64, input: &InputState) {
        self.shared.lock().unwrap().calls.push(EngineCall::Input {
            player_id,
            input: input.clone(),
        });
    }

    fn chat_message(&mut self, text: &str, sender_id: u64) {
        self.shared.lock().unwrap().calls.push(EngineCall::Chat {
            sender_id,
            text: text.to_string(),
        });
    }

    fn update(&mut self) -> HashMap<u64, Vec<u8>> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(EngineCall::Update);
        let mut out = HashMap::new();
        for (player_id, queue) in shared.packages.iter_mut() {
            if !queue.is_empty() {
                out.insert(*player_id, queue.remove(0));
            }
        }
        out
    }

    fn on_player_death(&mut self, deaths: DeathSender) {
        self.shared.lock().unwrap().deaths = Some(deaths);
    }
}

/// Boots a server on an ephemeral port with a fresh scripted engine and a
/// fast test tick. Returns the ws URL and the shared engine handle.
pub async fn start_server() -> (String, FakeEngine) {
    let engine = FakeEngine::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");

    let settings = ServerSettings {
        tick_interval: TEST_TICK,
        ..ServerSettings::default()
    };
    tokio::spawn(sync_server::run(listener, engine.clone(), settings));

    (format!("ws://{addr}/ws"), engine)
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect(url: &str) -> WsClient {
    let (client, _response) = connect_async(url).await.expect("websocket connect");
    client
}

pub async fn send_frame(client: &mut WsClient, frame: &str) {
    client
        .send(tungstenite::Message::text(frame))
        .await
        .expect("send frame");
}

/// Receives the next binary frame, skipping control frames. `None` means the
/// connection closed or nothing arrived within the wait.
pub async fn recv_binary(client: &mut WsClient, wait: Duration) -> Option<Vec<u8>> {
    tokio::time::timeout(wait, async {
        while let Some(frame) = client.next().await {
            match frame {
                Ok(tungstenite::Message::Binary(payload)) => return Some(payload.to_vec()),
                Ok(tungstenite::Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    })
    .await
    .unwrap_or(None)
}

/// True once the server side closes the connection.
pub async fn wait_for_close(client: &mut WsClient, wait: Duration) -> bool {
    tokio::time::timeout(wait, async {
        loop {
            match client.next().await {
                Some(Ok(tungstenite::Message::Close(_))) | Some(Err(_)) | None => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap_or(false)
}
