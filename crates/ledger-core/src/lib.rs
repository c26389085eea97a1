pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod mempool;
pub mod mine;
pub mod pow;

pub use chain::{genesis_block, validate_blocks, Ledger};
pub use config::{LedgerConfig, MineParams};
pub use error::{LedgerError, Result, Violation};
pub use mempool::Mempool;
pub use mine::MiningCoordinator;
pub use pow::{CancelToken, Difficulty, StopSignal};

use constants::{HASH_SIZE, TX_ID_BYTES, ZERO_HASH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Hash = [u8; HASH_SIZE];

/// Seconds since the unix epoch; a clock set before 1970 reads as zero.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp: u64,
}

impl Transaction {
    /// Stamp a new transaction with a random identifier and the current time.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: f64) -> Self {
        Self {
            id: hex::encode(rand::random::<[u8; TX_ID_BYTES]>()),
            from: from.into(),
            to: to.into(),
            amount,
            timestamp: unix_now(),
        }
    }

    /// Signed contribution of this transaction to `address`'s balance.
    pub fn net_flow(&self, address: &str) -> f64 {
        let mut delta = 0.0;
        if self.to == address {
            delta += self.amount;
        }
        if self.from == address {
            delta -= self.amount;
        }
        delta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: u64,
    #[serde(with = "hex_hash")]
    pub previous_hash: Hash,
    #[serde(with = "hex_hash")]
    pub merkle_root: Hash,
    pub difficulty: Difficulty,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn new(
        index: u64,
        previous_hash: Hash,
        merkle_root: Hash,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            index,
            timestamp: unix_now(),
            previous_hash,
            merkle_root,
            difficulty,
            nonce: 0,
        }
    }

    /// Canonical byte layout fed to the block hash.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + HASH_SIZE + HASH_SIZE + 8 + 8 + 5);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&self.merkle_root);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty.to_bytes());
        bytes
    }
}

/// SHA-256 of the header's canonical bytes. Pure: equal headers always give equal digests.
pub fn block_hash(header: &BlockHeader) -> Hash {
    sha256(&[header.hash_bytes().as_slice()])
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    #[serde(rename = "transactions")]
    pub txs: Vec<Transaction>,
    #[serde(with = "hex_hash")]
    pub hash: Hash,
}

impl Block {
    /// An unsealed block: nonce 0 and an all-zero hash until proof-of-work fills them in.
    pub fn candidate(
        index: u64,
        previous_hash: Hash,
        txs: Vec<Transaction>,
        difficulty: Difficulty,
    ) -> Result<Self> {
        let merkle = merkle_root(&txs)?;
        Ok(Self {
            header: BlockHeader::new(index, previous_hash, merkle, difficulty),
            txs,
            hash: ZERO_HASH,
        })
    }

    pub fn compute_hash(&self) -> Hash {
        block_hash(&self.header)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Order-preserving commitment to a transaction list. Leaves hash each
/// transaction's JSON form; odd levels pair the last node with itself.
pub fn merkle_root(txs: &[Transaction]) -> Result<Hash> {
    if txs.is_empty() {
        return Ok(ZERO_HASH);
    }
    let mut level = txs
        .iter()
        .map(|t| -> Result<Hash> { Ok(sha256(&[serde_json::to_vec(t)?.as_slice()])) })
        .collect::<Result<Vec<Hash>>>()?;

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let a = &pair[0];
                let b = pair.get(1).unwrap_or(a);
                sha256(&[a, b])
            })
            .collect();
    }
    Ok(level[0])
}

/// Serde adapter that renders a [`Hash`] as lowercase hex.
pub mod hex_hash {
    use super::{Hash, HASH_SIZE};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; HASH_SIZE];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}
