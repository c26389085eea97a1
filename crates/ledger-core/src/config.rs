use crate::constants::{
    DEFAULT_BLOCK_REWARD, DEFAULT_DIFFICULTY_HEX_DIGITS, DEFAULT_MAX_TXS, DEFAULT_MINER,
    REWARD_SENDER,
};
use crate::pow::Difficulty;
use serde::{Deserialize, Serialize};

/// Knobs for a single ledger instance.
///
/// Defaults: three leading zero hex digits, a reward of `1.0` paid from
/// `"network"` to `"miner-reward"`, and at most ten transactions per block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Predicate every newly mined block hash must satisfy.
    pub difficulty: Difficulty,
    /// Amount paid by the reward transaction at the head of each block.
    pub block_reward: f64,
    /// Synthetic sender of reward transactions. Reserved: user submissions from it are rejected.
    pub reward_sender: String,
    /// Reward recipient when a mine request names none.
    pub default_miner: String,
    /// Transactions drained per block when a mine request names no limit.
    pub default_max_txs: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::ZeroHexDigits(DEFAULT_DIFFICULTY_HEX_DIGITS),
            block_reward: DEFAULT_BLOCK_REWARD,
            reward_sender: REWARD_SENDER.to_string(),
            default_miner: DEFAULT_MINER.to_string(),
            default_max_txs: DEFAULT_MAX_TXS,
        }
    }
}

/// Per-request mining options; anything left out falls back to [`LedgerConfig`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MineParams {
    /// Upper bound on drained transactions. Zero or negative drains everything pending.
    pub max_txs: Option<i64>,
    /// Reward recipient.
    pub miner: Option<String>,
}

impl MineParams {
    /// Returns `(max_txs, miner)` where a `max_txs` of zero means "all pending".
    pub fn resolve(&self, config: &LedgerConfig) -> (usize, String) {
        let max_txs = match self.max_txs {
            None => config.default_max_txs,
            Some(n) if n <= 0 => 0,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let miner = match self.miner.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => config.default_miner.clone(),
        };
        (max_txs, miner)
    }
}
