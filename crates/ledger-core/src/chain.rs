use crate::config::LedgerConfig;
use crate::constants::{GENESIS_TIMESTAMP, REWARD_SENDER, ZERO_HASH};
use crate::error::{LedgerError, Result, Violation};
use crate::mempool::Mempool;
use crate::pow::Difficulty;
use crate::{block_hash, merkle_root, Block, BlockHeader, Hash};
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{info, warn};

/// Fixed index-0 block: no transactions, zeroed previous hash and a
/// difficulty nothing can fail, so it carries no proof-of-work.
pub fn genesis_block() -> Block {
    let header = BlockHeader {
        index: 0,
        timestamp: GENESIS_TIMESTAMP,
        previous_hash: ZERO_HASH,
        merkle_root: ZERO_HASH,
        difficulty: Difficulty::ZeroBits(0),
        nonce: 0,
    };
    Block {
        hash: block_hash(&header),
        header,
        txs: vec![],
    }
}

#[derive(Debug)]
struct ChainState {
    blocks: Vec<Block>,
    committed: HashSet<String>,
}

/// Append-only, hash-linked block sequence.
#[derive(Debug)]
pub struct Ledger {
    state: RwLock<ChainState>,
    difficulty: RwLock<Difficulty>,
    reward_sender: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

impl Ledger {
    pub fn new(difficulty: Difficulty, reward_sender: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(ChainState {
                blocks: vec![genesis_block()],
                committed: HashSet::new(),
            }),
            difficulty: RwLock::new(difficulty),
            reward_sender: reward_sender.into(),
        }
    }

    /// Ledger paying rewards from the default `"network"` sender.
    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self::new(difficulty, REWARD_SENDER)
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.difficulty, config.reward_sender.clone())
    }

    pub fn difficulty(&self) -> Difficulty {
        *self.difficulty.read()
    }

    /// Blocks appended from now on must be mined at `difficulty`. Committed
    /// blocks keep validating against the difficulty stored in them.
    pub fn set_difficulty(&self, difficulty: Difficulty) {
        let mut current = self.difficulty.write();
        let previous = *current;
        if previous != difficulty {
            info!(from = %previous, to = %difficulty, "difficulty changed");
            *current = difficulty;
        }
    }

    pub fn reward_sender(&self) -> &str {
        &self.reward_sender
    }

    pub fn tip(&self) -> Block {
        let state = self.state.read();
        state.blocks[state.blocks.len() - 1].clone()
    }

    /// Chain length including genesis.
    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// Never true: genesis is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().blocks.clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let i = usize::try_from(index).ok()?;
        self.state.read().blocks.get(i).cloned()
    }

    pub fn is_committed(&self, tx_id: &str) -> bool {
        self.state.read().committed.contains(tx_id)
    }

    /// The only mutation path. The block must extend the current tip, carry
    /// a correct hash and meet the active difficulty; otherwise nothing changes.
    pub fn append(&self, block: Block) -> Result<()> {
        let required = self.difficulty();
        let mut state = self.state.write();
        let tip = &state.blocks[state.blocks.len() - 1];

        let checked = check_linkage(&block, tip)
            .and_then(|_| check_block(&block, &self.reward_sender))
            .and_then(|_| {
                if block.header.difficulty == required {
                    Ok(())
                } else {
                    Err(Violation::DifficultyMismatch {
                        expected: required,
                        found: block.header.difficulty,
                    })
                }
            })
            .and_then(|_| check_unseen(&block, &state.committed));
        if let Err(violation) = checked {
            warn!(index = block.header.index, %violation, "rejected block");
            return Err(LedgerError::integrity(block.header.index, violation));
        }

        state
            .committed
            .extend(block.txs.iter().map(|tx| tx.id.clone()));
        info!(
            index = block.header.index,
            nonce = block.header.nonce,
            txs = block.txs.len(),
            hash = %block.hash_hex(),
            "block appended"
        );
        state.blocks.push(block);
        Ok(())
    }

    /// Sum of committed flows for `address`, plus pending ones when a mempool
    /// is given. The two locks are taken one after the other, never together.
    pub fn balance_of(&self, address: &str, pending: Option<&Mempool>) -> f64 {
        let committed: f64 = {
            let state = self.state.read();
            state
                .blocks
                .iter()
                .flat_map(|b| b.txs.iter())
                .map(|tx| tx.net_flow(address))
                .sum()
        };
        committed + pending.map_or(0.0, |pool| pool.pending_flow(address))
    }

    /// Re-check every block from genesis forward.
    pub fn validate_chain(&self) -> Result<()> {
        let state = self.state.read();
        validate_blocks(&state.blocks, &self.reward_sender)
    }
}

/// Validate a whole block sequence: fixed genesis, linkage, hashes, each
/// block's own stored difficulty, reward placement and transaction uniqueness.
pub fn validate_blocks(blocks: &[Block], reward_sender: &str) -> Result<()> {
    let Some(first) = blocks.first() else {
        return Err(LedgerError::integrity(0, Violation::EmptyChain));
    };
    if *first != genesis_block() {
        return Err(LedgerError::integrity(0, Violation::BadGenesis));
    }

    let mut seen = HashSet::new();
    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        check_linkage(block, prev)
            .and_then(|_| check_block(block, reward_sender))
            .and_then(|_| check_unseen(block, &seen))
            .map_err(|v| LedgerError::integrity(block.header.index, v))?;
        seen.extend(block.txs.iter().map(|tx| tx.id.clone()));
    }
    Ok(())
}

fn check_linkage(block: &Block, prev: &Block) -> std::result::Result<(), Violation> {
    let expected = prev.header.index + 1;
    if block.header.index != expected {
        return Err(Violation::IndexMismatch {
            expected,
            found: block.header.index,
        });
    }
    if block.header.previous_hash != prev.hash {
        return Err(Violation::PreviousHashMismatch {
            expected: hex::encode(prev.hash),
            found: hex::encode(block.header.previous_hash),
        });
    }
    Ok(())
}

/// Checks that depend only on the block itself.
fn check_block(block: &Block, reward_sender: &str) -> std::result::Result<(), Violation> {
    if block.hash != block.compute_hash() {
        return Err(Violation::HashMismatch);
    }
    if !block.header.difficulty.is_met_by(&block.hash) {
        return Err(Violation::InsufficientWork(block.header.difficulty));
    }
    let merkle: Hash = merkle_root(&block.txs).map_err(|_| Violation::MerkleMismatch)?;
    if merkle != block.header.merkle_root {
        return Err(Violation::MerkleMismatch);
    }
    if block
        .txs
        .iter()
        .skip(1)
        .any(|tx| tx.from == reward_sender)
    {
        return Err(Violation::MisplacedReward);
    }
    Ok(())
}

fn check_unseen(block: &Block, committed: &HashSet<String>) -> std::result::Result<(), Violation> {
    let mut in_block = HashSet::new();
    for tx in &block.txs {
        if committed.contains(&tx.id) || !in_block.insert(tx.id.as_str()) {
            return Err(Violation::DuplicateTransaction(tx.id.clone()));
        }
    }
    Ok(())
}
