use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Previous-hash marker carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Usage,
}

/// A single token transfer recorded in the ledger. Immutable once created;
/// owned by the block it is eventually sealed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub timestamp: f64,
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, amount: f64, kind: TxKind) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            kind,
            timestamp: epoch_seconds(),
        }
    }
}

/// An immutable, sealed batch of transactions plus linkage and
/// proof-of-work metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
}

impl Block {
    /// SHA-256 over an explicit, fixed field ordering. Two fields-equal
    /// blocks hash identically regardless of how they were constructed.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.timestamp.to_bits().to_le_bytes());
        for tx in &self.transactions {
            // struct field order is fixed by declaration, so this is deterministic
            hasher.update(serde_json::to_string(tx).unwrap().as_bytes());
        }
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the digest carries `difficulty` leading zero hex characters.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.compute_hash().starts_with(&"0".repeat(difficulty))
    }
}

/// Seconds since epoch, sub-second precision.
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}
