pub mod config;
pub mod dispatch;
pub mod engine;
pub mod game;
pub mod input;
pub mod net;
pub mod protocol;
pub mod session;
pub mod state;

mod server;
mod utils;

pub use config::{ServerSettings, WorldData};
pub use engine::{DeathSender, Engine};
pub use server::{init_tracing, run, run_with_world_data};
