//! Centralized environment variable names and default values for brc runtime tuning.

// Environment variable names
pub const ENV_INPUT: &str = "BRC_INPUT";
pub const ENV_DUMP_PATH: &str = "BRC_DUMP_PATH";
pub const ENV_CHUNK_BYTES: &str = "BRC_CHUNK_BYTES";
pub const ENV_WORKERS: &str = "BRC_WORKERS";
pub const ENV_QUEUE_CAP: &str = "BRC_QUEUE_CAP";
pub const ENV_STRICT_EOF: &str = "BRC_STRICT_EOF";
pub const ENV_LAST_VALUE_WINS: &str = "BRC_LAST_VALUE_WINS";
pub const ENV_ROUND_MEAN: &str = "BRC_ROUND_MEAN";
pub const ENV_STRATEGY: &str = "BRC_STRATEGY";

pub const DEFAULT_INPUT: &str = "measurements.txt";
/// Raw bytes of the chunk holding a malformed record land here; overwritten every failing run.
pub const DEFAULT_DUMP_PATH: &str = "error.txt";
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024 * 1024; // 64 MiB per physical read
// Partial tables in flight between workers and the reducer
pub const DEFAULT_QUEUE_CAP: usize = 16;
// Chunks buffered per worker ahead of parsing
pub const CHUNK_QUEUE_PER_WORKER: usize = 2;
// Slices per worker when splitting a mapped file
pub const MMAP_SLICES_PER_WORKER: usize = 4;
