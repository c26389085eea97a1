pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ZERO_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];

/// Fixed timestamp baked into the genesis block so every ledger shares it.
pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000;

pub const TX_ID_BYTES: usize = 8;
pub const REWARD_SENDER: &str = "network";
pub const DEFAULT_MINER: &str = "miner-reward";
pub const DEFAULT_BLOCK_REWARD: f64 = 1.0;
pub const DEFAULT_MAX_TXS: usize = 10;
pub const DEFAULT_DIFFICULTY_HEX_DIGITS: u32 = 3;

/// Hardest difficulties a 32-byte hash can still meet.
pub const MAX_ZERO_BITS: u32 = (HASH_SIZE * BYTE) as u32;
pub const MAX_ZERO_HEX_DIGITS: u32 = HASH_HEX_SIZE as u32;

/// How many nonces the proof-of-work loop tries between stop-signal polls.
pub const STOP_CHECK_INTERVAL: u64 = 4096;
