use crate::chunk::EofPolicy;
use crate::constants::*;
use crate::format::MeanMode;
use crate::utils::{available_workers, env_parse, env_var_truthy};
use crate::worker::ChunkPolicy;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Producer thread, worker pool and reducer joined by bounded channels.
    #[default]
    Streaming,
    /// Map the whole file and parse newline-aligned slices on a rayon pool.
    Mmap,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Streaming => "streaming",
            Strategy::Mmap => "mmap",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(Strategy::Streaming),
            "mmap" => Ok(Strategy::Mmap),
            other => Err(format!("unknown strategy {:?} (expected streaming or mmap)", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub input: PathBuf,
    pub dump_path: PathBuf,
    pub chunk_bytes: usize,
    pub workers: usize,
    pub queue_cap: usize,
    pub eof: EofPolicy,
    pub chunk_policy: ChunkPolicy,
    pub mean: MeanMode,
    pub strategy: Strategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            dump_path: PathBuf::from(DEFAULT_DUMP_PATH),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            workers: available_workers(),
            queue_cap: DEFAULT_QUEUE_CAP,
            eof: EofPolicy::default(),
            chunk_policy: ChunkPolicy::default(),
            mean: MeanMode::default(),
            strategy: Strategy::default(),
        }
    }
}

impl Settings {
    /// Defaults overridden by any `BRC_*` variables that are set and parse.
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Ok(v) = std::env::var(ENV_INPUT) {
            s.input = v.into();
        }
        if let Ok(v) = std::env::var(ENV_DUMP_PATH) {
            s.dump_path = v.into();
        }
        if let Some(v) = env_parse(ENV_CHUNK_BYTES) {
            s.chunk_bytes = v;
        }
        if let Some(v) = env_parse(ENV_WORKERS) {
            s.workers = v;
        }
        if let Some(v) = env_parse(ENV_QUEUE_CAP) {
            s.queue_cap = v;
        }
        if let Some(v) = env_parse(ENV_STRATEGY) {
            s.strategy = v;
        }
        if env_var_truthy(ENV_STRICT_EOF) {
            s.eof = EofPolicy::Strict;
        }
        if env_var_truthy(ENV_LAST_VALUE_WINS) {
            s.chunk_policy = ChunkPolicy::LastValueWins;
        }
        if env_var_truthy(ENV_ROUND_MEAN) {
            s.mean = MeanMode::HalfAwayFromZero;
        }
        s.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.chunk_bytes = self.chunk_bytes.max(1);
        self.workers = self.workers.max(1);
        self.queue_cap = self.queue_cap.max(1);
        self
    }
}
