//! The ledger store: an append-only, hash-chained sequence of sealed blocks
//! plus the pending-transaction buffer feeding the next seal.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::block::{epoch_seconds, Block, Transaction, TxKind, GENESIS_PREV_HASH};
use crate::error::LedgerError;
use crate::storage;

/// Number of leading zero hex characters a sealed block's digest must carry.
pub const DEFAULT_DIFFICULTY: usize = 3;

pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    ledger_path: PathBuf,
    difficulty: usize,
}

impl Ledger {
    /// Open the ledger at `path`. An existing file is loaded in full and the
    /// chain re-verified (linkage, contiguity, proof-of-work) before anything
    /// is trusted; a missing file gets a freshly sealed, persisted genesis
    /// block.
    pub fn open(path: impl AsRef<Path>, difficulty: usize) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let mut ledger = Self {
            chain: Vec::new(),
            pending: Vec::new(),
            ledger_path: path.clone(),
            difficulty,
        };

        if path.exists() {
            ledger.chain = storage::load_chain(&path)?;
            ledger.verify()?;
            info!("loaded {} block(s) from {}", ledger.chain.len(), path.display());
        } else {
            ledger.seal_block()?;
            info!("created fresh ledger at {}", path.display());
        }

        Ok(ledger)
    }

    /// Append a transaction to the pending buffer. Persisted state is not
    /// touched until the next seal. Rejects negative and non-finite amounts.
    pub fn record_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: f64,
        kind: TxKind,
    ) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.pending.push(Transaction::new(sender, recipient, amount, kind));
        Ok(())
    }

    /// Seal the entire pending buffer into one new block: link it to the
    /// current last block, run the nonce search, append, persist the whole
    /// chain. On a persistence failure the chain and the pending buffer are
    /// rolled back so memory and disk stay in agreement.
    pub fn seal_block(&mut self) -> Result<Block, LedgerError> {
        let previous_hash = match self.chain.last() {
            Some(last) => last.compute_hash(),
            None => GENESIS_PREV_HASH.to_string(),
        };

        let mut block = Block {
            index: self.chain.len() as u64,
            timestamp: epoch_seconds(),
            transactions: std::mem::take(&mut self.pending),
            previous_hash,
            nonce: 0,
        };
        proof_of_work(&mut block, self.difficulty);
        debug!(
            "sealed block {} with {} transaction(s), nonce {}",
            block.index,
            block.transactions.len(),
            block.nonce
        );

        self.chain.push(block.clone());
        if let Err(e) = storage::save_chain(&self.ledger_path, &self.chain) {
            self.chain.pop();
            self.pending = block.transactions;
            return Err(e);
        }
        Ok(block)
    }

    /// The most recently sealed block. The chain always holds at least the
    /// genesis block once opened.
    pub fn last_block(&self) -> &Block {
        self.chain.last().unwrap()
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Walk the whole chain recomputing digests: genesis shape, index
    /// contiguity, previous-hash linkage and proof-of-work. Fails on the
    /// first inconsistency.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let genesis = self
            .chain
            .first()
            .ok_or_else(|| LedgerError::InvalidChain("empty chain".to_string()))?;
        if genesis.index != 0 || genesis.previous_hash != GENESIS_PREV_HASH {
            return Err(LedgerError::InvalidChain("malformed genesis block".to_string()));
        }

        for pair in self.chain.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if cur.index != prev.index + 1 {
                return Err(LedgerError::InvalidChain(format!(
                    "block {} does not follow block {}",
                    cur.index, prev.index
                )));
            }
            if cur.previous_hash != prev.compute_hash() {
                return Err(LedgerError::InvalidChain(format!(
                    "block {} previous_hash does not match block {}",
                    cur.index, prev.index
                )));
            }
        }

        for block in &self.chain {
            if !block.meets_difficulty(self.difficulty) {
                return Err(LedgerError::InvalidChain(format!(
                    "block {} fails proof-of-work",
                    block.index
                )));
            }
        }

        Ok(())
    }
}

/// Brute-force nonce search: re-serialize and re-hash the full block per
/// attempt, from nonce 0 upward, until the digest meets the difficulty
/// target. Single-threaded, runs to completion.
fn proof_of_work(block: &mut Block, difficulty: usize) {
    let target = "0".repeat(difficulty);
    block.nonce = 0;
    while !block.compute_hash().starts_with(&target) {
        block.nonce += 1;
    }
}
