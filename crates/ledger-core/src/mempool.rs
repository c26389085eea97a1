use crate::constants::REWARD_SENDER;
use crate::error::{LedgerError, Result};
use crate::Transaction;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// FIFO queue of transactions waiting to be mined.
#[derive(Debug)]
pub struct Mempool {
    pending: Mutex<VecDeque<Transaction>>,
    reserved_sender: String,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(REWARD_SENDER)
    }
}

impl Mempool {
    /// `reserved_sender` is the reward sender; nobody else may spend from it.
    pub fn new(reserved_sender: impl Into<String>) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            reserved_sender: reserved_sender.into(),
        }
    }

    pub fn validate(&self, tx: &Transaction) -> Result<()> {
        let reject = |msg: &str| -> Result<()> { Err(LedgerError::InvalidTransaction(msg.to_string())) };
        if tx.id.trim().is_empty() {
            return reject("id must not be empty");
        }
        if tx.from.trim().is_empty() {
            return reject("sender must not be empty");
        }
        if tx.to.trim().is_empty() {
            return reject("recipient must not be empty");
        }
        if !tx.amount.is_finite() || tx.amount <= 0.0 {
            return reject("amount must be a positive number");
        }
        if tx.from == self.reserved_sender {
            return reject("sender address is reserved for mining rewards");
        }
        Ok(())
    }

    /// Validate and enqueue. A transaction whose id is already pending is rejected.
    pub fn submit(&self, tx: Transaction) -> Result<()> {
        self.validate(&tx)?;
        let mut pending = self.pending.lock();
        if pending.iter().any(|p| p.id == tx.id) {
            return Err(LedgerError::InvalidTransaction(format!(
                "transaction {} is already pending",
                tx.id
            )));
        }
        debug!(id = %tx.id, from = %tx.from, to = %tx.to, amount = tx.amount, "transaction queued");
        pending.push_back(tx);
        Ok(())
    }

    /// Build a fresh transaction, queue it, and hand back what was queued.
    pub fn submit_new(&self, from: &str, to: &str, amount: f64) -> Result<Transaction> {
        let tx = Transaction::new(from, to, amount);
        self.submit(tx.clone())?;
        Ok(tx)
    }

    /// Remove and return up to `max` transactions from the front.
    /// `max == 0` takes everything.
    pub fn drain(&self, max: usize) -> Vec<Transaction> {
        let mut pending = self.pending.lock();
        let n = if max == 0 || max > pending.len() {
            pending.len()
        } else {
            max
        };
        let taken: Vec<Transaction> = pending.drain(..n).collect();
        debug!(taken = taken.len(), left = pending.len(), "mempool drained");
        taken
    }

    /// Put previously drained transactions back at the front, keeping their order.
    pub fn requeue_front(&self, txs: Vec<Transaction>) {
        if txs.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        debug!(count = txs.len(), "requeueing transactions");
        for tx in txs.into_iter().rev() {
            pending.push_front(tx);
        }
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.lock().iter().any(|tx| tx.id == id)
    }

    /// Net effect of pending transactions on `address`.
    pub fn pending_flow(&self, address: &str) -> f64 {
        self.pending
            .lock()
            .iter()
            .map(|tx| tx.net_flow(address))
            .sum()
    }
}
