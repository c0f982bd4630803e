pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Nonces handed to rayon per round of parallel search.
pub const PARALLEL_BATCH: u64 = 1 << 16;
/// How often (in nonces) the sequential search polls its cancel flag.
pub const CANCEL_POLL_INTERVAL: u64 = 4096;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
