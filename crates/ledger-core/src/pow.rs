use crate::constants::{BYTE, MAX_ZERO_BITS, STOP_CHECK_INTERVAL};
use crate::error::{LedgerError, Result};
use crate::{block_hash, Block, BlockHeader, Hash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The predicate a block hash has to satisfy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Difficulty {
    /// At least this many leading zero bits.
    ZeroBits(u32),
    /// The hex encoding starts with at least this many `0` characters.
    ZeroHexDigits(u32),
}

impl Difficulty {
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        count_leading_zero_bits(hash) >= self.required_zero_bits()
    }

    /// A hex digit is four aligned bits, so both predicates reduce to a bit count.
    pub fn required_zero_bits(&self) -> u32 {
        match *self {
            Difficulty::ZeroBits(bits) => bits,
            Difficulty::ZeroHexDigits(digits) => digits.saturating_mul(4),
        }
    }

    /// False when no hash could ever meet the predicate.
    pub fn is_satisfiable(&self) -> bool {
        self.required_zero_bits() <= MAX_ZERO_BITS
    }

    pub(crate) fn to_bytes(self) -> [u8; 5] {
        let (tag, value) = match self {
            Difficulty::ZeroBits(v) => (0u8, v),
            Difficulty::ZeroHexDigits(v) => (1u8, v),
        };
        let mut out = [0u8; 5];
        out[0] = tag;
        out[1..].copy_from_slice(&value.to_le_bytes());
        out
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::ZeroBits(n) => write!(f, "{n} leading zero bits"),
            Difficulty::ZeroHexDigits(n) => write!(f, "{n} leading zero hex digits"),
        }
    }
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += BYTE as u32;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// Polled by the nonce loop; returning `true` aborts the search.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl<F: Fn() -> bool> StopSignal for F {
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl StopSignal for CancelToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

/// Find the first nonce, counting up from zero, whose header hash meets `header.difficulty`.
pub fn search(header: BlockHeader, stop: &impl StopSignal) -> Result<(u64, Hash)> {
    search_from(header, 0, stop)
}

/// Same as [`search`] but starting at `start`. Fails with `NonceSpaceExhausted`
/// instead of wrapping past `u64::MAX`.
pub fn search_from(
    mut header: BlockHeader,
    start: u64,
    stop: &impl StopSignal,
) -> Result<(u64, Hash)> {
    let mut nonce = start;
    loop {
        if (nonce - start) % STOP_CHECK_INTERVAL == 0 && stop.should_stop() {
            debug!(index = header.index, nonce, "proof-of-work search stopped");
            return Err(LedgerError::MiningCancelled);
        }
        header.nonce = nonce;
        let hash = block_hash(&header);
        if header.difficulty.is_met_by(&hash) {
            return Ok((nonce, hash));
        }
        nonce = nonce
            .checked_add(1)
            .ok_or(LedgerError::NonceSpaceExhausted)?;
    }
}

/// Seal `block` in place of its nonce and hash.
pub fn mine_block(mut block: Block, stop: &impl StopSignal) -> Result<Block> {
    let (nonce, hash) = search(block.header, stop)?;
    block.header.nonce = nonce;
    block.hash = hash;
    Ok(block)
}
