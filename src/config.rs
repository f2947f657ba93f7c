use std::{env, fs, io, path::Path, time::Duration};

// Runtime/server constants (not engine tuning).

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

/// Tick interval with an env override for local tuning.
pub fn tick_interval() -> Duration {
    env::var("SYNC_TICK_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(TICK_INTERVAL)
}

/// Runtime knobs for one server instance.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Fixed cadence of the simulation tick.
    pub tick_interval: Duration,
    /// Capacity for join/leave/chat commands flowing into the engine task.
    pub command_channel_capacity: usize,
    /// Per-connection capacity for outbound packages.
    pub outbound_channel_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_interval: tick_interval(),
            command_channel_capacity: COMMAND_CHANNEL_CAPACITY,
            outbound_channel_capacity: OUTBOUND_CHANNEL_CAPACITY,
        }
    }
}

/// Static configuration documents handed to the engine at startup.
///
/// The raw JSON strings are preserved; only the engine interprets them.
#[derive(Debug, Clone)]
pub struct WorldData {
    pub config: String,
    pub worlds: Vec<String>,
}

impl WorldData {
    /// Loads `config.json` plus every world definition under `worlds/` from
    /// the given directory. World files are loaded in name order so engine
    /// construction is deterministic.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let config = fs::read_to_string(dir.join("config.json"))?;

        let mut paths: Vec<_> = fs::read_dir(dir.join("worlds"))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut worlds = Vec::with_capacity(paths.len());
        for path in paths {
            worlds.push(fs::read_to_string(path)?);
        }

        Ok(Self { config, worlds })
    }
}
