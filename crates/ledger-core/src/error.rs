use crate::pow::Difficulty;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("chain integrity violation at block {index}: {violation}")]
    ChainIntegrityViolation { index: u64, violation: Violation },

    #[error("stale tip: candidate block {candidate} no longer extends tip {tip}")]
    StaleTip { candidate: u64, tip: u64 },

    #[error("hash computation failed: {0}")]
    HashComputation(#[from] serde_json::Error),

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("nonce space exhausted without meeting the difficulty target")]
    NonceSpaceExhausted,
}

/// The individual check a block failed when it was appended or re-validated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("expected index {expected}, found {found}")]
    IndexMismatch { expected: u64, found: u64 },

    #[error("previous hash {found} does not match tip hash {expected}")]
    PreviousHashMismatch { expected: String, found: String },

    #[error("stored hash does not match the recomputed hash")]
    HashMismatch,

    #[error("merkle root does not commit to the block's transactions")]
    MerkleMismatch,

    #[error("hash does not satisfy {0}")]
    InsufficientWork(Difficulty),

    #[error("block was mined at {found} but the ledger requires {expected}")]
    DifficultyMismatch {
        expected: Difficulty,
        found: Difficulty,
    },

    #[error("transaction {0} is already committed")]
    DuplicateTransaction(String),

    #[error("reward transaction found outside the first slot")]
    MisplacedReward,

    #[error("genesis block does not match the fixed genesis content")]
    BadGenesis,

    #[error("chain is empty")]
    EmptyChain,
}

impl Violation {
    /// Linkage failures mean the block was built on a tip that has since moved.
    pub fn is_linkage(&self) -> bool {
        matches!(
            self,
            Violation::IndexMismatch { .. } | Violation::PreviousHashMismatch { .. }
        )
    }
}

impl LedgerError {
    pub(crate) fn integrity(index: u64, violation: Violation) -> Self {
        LedgerError::ChainIntegrityViolation { index, violation }
    }
}
