use crate::chain::Ledger;
use crate::config::{LedgerConfig, MineParams};
use crate::constants::ZERO_HASH;
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::pow::{self, CancelToken};
use crate::{merkle_root, Block, BlockHeader, Transaction};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Drives one block from mempool to ledger: drain, build on the tip, search
/// for a nonce outside every lock, then append.
#[derive(Clone, Debug)]
pub struct MiningCoordinator {
    ledger: Arc<Ledger>,
    mempool: Arc<Mempool>,
    config: LedgerConfig,
    shutdown: CancelToken,
}

impl MiningCoordinator {
    pub fn new(ledger: Arc<Ledger>, mempool: Arc<Mempool>, config: LedgerConfig) -> Self {
        Self {
            ledger,
            mempool,
            config,
            shutdown: CancelToken::new(),
        }
    }

    /// Fresh ledger and mempool wired to `config`.
    pub fn from_config(config: LedgerConfig) -> Self {
        let ledger = Arc::new(Ledger::from_config(&config));
        let mempool = Arc::new(Mempool::new(config.reward_sender.clone()));
        Self::new(ledger, mempool, config)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Token that aborts every search this coordinator (and its clones) runs.
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn submit(&self, from: &str, to: &str, amount: f64) -> Result<Transaction> {
        let tx = Transaction::new(from, to, amount);
        self.submit_transaction(tx.clone())?;
        Ok(tx)
    }

    /// Queue an already-built transaction. Ids that are pending or already
    /// in a block are rejected.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        if self.ledger.is_committed(&tx.id) {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {} is already committed",
                tx.id
            )));
        }
        self.mempool.submit(tx)
    }

    /// Pending-inclusive balance.
    pub fn balance(&self, address: &str) -> f64 {
        self.ledger.balance_of(address, Some(&self.mempool))
    }

    /// Mine one block end to end. On any failure the drained transactions go
    /// back to the front of the mempool; the reward is dropped.
    pub fn mine(&self, params: &MineParams) -> Result<Block> {
        let started = Instant::now();
        let candidate = self.prepare(params)?;
        let sealed = self.seal(candidate)?;
        let block = self.commit(sealed)?;
        info!(
            index = block.header.index,
            nonce = block.header.nonce,
            txs = block.txs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mined block {}",
            block.hash_hex()
        );
        Ok(block)
    }

    /// Drain the mempool, put a reward in front and build an unsealed block on the current tip.
    pub fn prepare(&self, params: &MineParams) -> Result<Block> {
        let (max_txs, miner) = params.resolve(&self.config);
        let drained = self.mempool.drain(max_txs);
        let drained = self.drop_committed(drained);

        let reward = Transaction::new(
            self.config.reward_sender.clone(),
            miner,
            self.config.block_reward,
        );
        let mut txs = Vec::with_capacity(drained.len() + 1);
        txs.push(reward);
        txs.extend(drained);

        let tip = self.ledger.tip();
        let merkle = match merkle_root(&txs) {
            Ok(root) => root,
            Err(e) => {
                self.mempool.requeue_front(txs.split_off(1));
                return Err(e);
            }
        };
        let header = BlockHeader::new(
            tip.header.index + 1,
            tip.hash,
            merkle,
            self.ledger.difficulty(),
        );
        Ok(Block {
            header,
            txs,
            hash: ZERO_HASH,
        })
    }

    /// Run proof-of-work on `candidate`. Stops early on shutdown or when the
    /// ledger's difficulty no longer matches the candidate's.
    pub fn seal(&self, candidate: Block) -> Result<Block> {
        let target = candidate.header.difficulty;
        let ledger = &self.ledger;
        let shutdown = &self.shutdown;
        let stop = || shutdown.is_cancelled() || ledger.difficulty() != target;

        match pow::search(candidate.header, &stop) {
            Ok((nonce, hash)) => {
                let mut block = candidate;
                block.header.nonce = nonce;
                block.hash = hash;
                Ok(block)
            }
            Err(e) => {
                warn!(index = candidate.header.index, error = %e, "proof-of-work aborted");
                self.release(candidate);
                Err(e)
            }
        }
    }

    /// Append a sealed block. A linkage failure means another miner got there
    /// first and is reported as [`LedgerError::StaleTip`].
    pub fn commit(&self, block: Block) -> Result<Block> {
        match self.ledger.append(block.clone()) {
            Ok(()) => Ok(block),
            Err(LedgerError::ChainIntegrityViolation { index, violation })
                if violation.is_linkage() =>
            {
                let tip = self.ledger.tip().header.index;
                warn!(candidate = index, tip, "stale tip, returning transactions to mempool");
                self.release(block);
                Err(LedgerError::StaleTip {
                    candidate: index,
                    tip,
                })
            }
            Err(e) => {
                self.release(block);
                Err(e)
            }
        }
    }

    /// Give an unmined block's user transactions back to the mempool. Slot 0
    /// is always the reward and is discarded.
    fn release(&self, block: Block) {
        let returned = self.drop_committed(block.txs.into_iter().skip(1).collect());
        self.mempool.requeue_front(returned);
    }

    /// Transactions that made it into a block in the meantime are never mined again.
    fn drop_committed(&self, txs: Vec<Transaction>) -> Vec<Transaction> {
        let (committed, fresh): (Vec<_>, Vec<_>) = txs
            .into_iter()
            .partition(|tx| self.ledger.is_committed(&tx.id));
        for tx in &committed {
            warn!(id = %tx.id, "discarding already committed transaction");
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::Difficulty;

    fn coordinator() -> MiningCoordinator {
        MiningCoordinator::from_config(LedgerConfig {
            difficulty: Difficulty::ZeroBits(4),
            ..LedgerConfig::default()
        })
    }

    #[test]
    fn prepare_puts_reward_first_and_builds_on_tip() {
        let c = coordinator();
        let tx = c.submit("alice", "bob", 5.0).unwrap();
        let candidate = c
            .prepare(&MineParams {
                max_txs: None,
                miner: Some("carol".into()),
            })
            .unwrap();
        assert_eq!(candidate.header.index, 1);
        assert_eq!(candidate.header.previous_hash, c.ledger().tip().hash);
        assert_eq!(candidate.txs.len(), 2);
        assert_eq!(candidate.txs[0].from, "network");
        assert_eq!(candidate.txs[0].to, "carol");
        assert_eq!(candidate.txs[0].amount, 1.0);
        assert_eq!(candidate.txs[1], tx);
        assert!(c.mempool().is_empty());
    }

    #[test]
    fn shutdown_aborts_search_and_requeues() {
        let c = coordinator();
        c.submit("alice", "bob", 5.0).unwrap();
        c.submit("bob", "carol", 1.0).unwrap();
        let before = c.mempool().snapshot();

        c.shutdown_token().cancel();
        let err = c.mine(&MineParams::default()).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled));
        assert_eq!(c.mempool().snapshot(), before);
        assert_eq!(c.ledger().len(), 1);
    }

    #[test]
    fn difficulty_change_aborts_in_flight_candidate() {
        let c = coordinator();
        c.submit("alice", "bob", 5.0).unwrap();
        let candidate = c.prepare(&MineParams::default()).unwrap();
        c.ledger().set_difficulty(Difficulty::ZeroBits(5));
        let err = c.seal(candidate).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled));
        assert_eq!(c.mempool().len(), 1);

        let block = c.mine(&MineParams::default()).unwrap();
        assert_eq!(block.header.difficulty, Difficulty::ZeroBits(5));
        assert!(c.ledger().validate_chain().is_ok());
    }

    #[test]
    fn committed_transaction_cannot_be_resubmitted() {
        let c = coordinator();
        let tx = c.submit("alice", "bob", 5.0).unwrap();
        c.mine(&MineParams::default()).unwrap();

        let err = c.submit_transaction(tx.clone()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert!(c.mempool().is_empty());
    }

    #[test]
    fn committed_transaction_in_mempool_does_not_block_mining() {
        let c = coordinator();
        let tx = c.submit("alice", "bob", 5.0).unwrap();
        c.mine(&MineParams::default()).unwrap();

        // The mempool alone cannot see the ledger.
        c.mempool().submit(tx.clone()).unwrap();
        let next = c.submit("carol", "dave", 1.0).unwrap();

        let block = c.mine(&MineParams::default()).unwrap();
        assert_eq!(&block.txs[1..], &[next]);
        assert!(c.mempool().is_empty());
        assert_eq!(c.ledger().balance_of("bob", None), 5.0);
        assert!(c.ledger().validate_chain().is_ok());
    }

    #[test]
    fn release_drops_transactions_committed_by_the_winner() {
        let c = coordinator();
        let tx = c.submit("alice", "bob", 5.0).unwrap();
        let first = c.prepare(&MineParams::default()).unwrap();
        c.mempool().submit(tx.clone()).unwrap();
        let second = c.prepare(&MineParams::default()).unwrap();
        assert_eq!(second.txs[1], tx);

        let first = c.seal(first).unwrap();
        let second = c.seal(second).unwrap();
        c.commit(first).unwrap();
        let err = c.commit(second).unwrap_err();
        assert!(matches!(err, LedgerError::StaleTip { .. }));
        assert!(c.mempool().is_empty());

        let block = c.mine(&MineParams::default()).unwrap();
        assert_eq!(block.txs.len(), 1);
    }

    #[test]
    fn release_drops_reward_by_position() {
        let ledger = Arc::new(Ledger::with_difficulty(Difficulty::ZeroBits(4)));
        // Mempool and config disagree on the reward sender name.
        let mempool = Arc::new(Mempool::new("faucet"));
        let config = LedgerConfig {
            difficulty: Difficulty::ZeroBits(4),
            ..LedgerConfig::default()
        };
        let c = MiningCoordinator::new(ledger, mempool, config);
        let tx = c.submit("alice", "bob", 5.0).unwrap();
        let candidate = c.prepare(&MineParams::default()).unwrap();
        c.shutdown_token().cancel();
        assert!(c.seal(candidate).is_err());
        assert_eq!(c.mempool().snapshot(), vec![tx]);
    }

    #[test]
    fn balance_includes_pending() {
        let c = coordinator();
        c.submit("alice", "bob", 5.0).unwrap();
        assert_eq!(c.balance("bob"), 5.0);
        c.mine(&MineParams::default()).unwrap();
        assert_eq!(c.balance("bob"), 5.0);
        assert_eq!(c.balance("miner-reward"), 1.0);
    }
}
