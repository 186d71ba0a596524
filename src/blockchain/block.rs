use crate::error::LedgerError;
use crate::miner::{meets_difficulty, CancelFlag, CANCEL_CHECK_INTERVAL};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "None";

/// Format of `Block::timestamp`.
pub const BLOCK_TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

pub fn block_timestamp() -> String {
    chrono::Local::now().format(BLOCK_TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    #[serde(default)]
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    pub fn new(index: u64, timestamp: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let mut block = Block {
            index,
            timestamp: timestamp.into(),
            transactions,
            previous_hash: String::new(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Links the block to its predecessor and refreshes the hash.
    pub fn set_previous_hash(&mut self, previous_hash: impl Into<String>) {
        self.previous_hash = previous_hash.into();
        self.hash = self.compute_hash();
    }

    /// Hex SHA-256 over index, previous hash, timestamp, the canonical
    /// serialization of each transaction in order, and the nonce.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let mut update = |field: &[u8]| {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        };

        update(&self.index.to_le_bytes());
        update(self.previous_hash.as_bytes());
        update(self.timestamp.as_bytes());
        update(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            update(tx.serialize().to_string().as_bytes());
        }
        update(&self.nonce.to_le_bytes());

        hex::encode(hasher.finalize())
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Brute-forces the nonce until the hash has `difficulty` leading zero hex
    /// characters. Returns the number of hashes computed.
    pub fn mine(&mut self, difficulty: usize) -> u64 {
        let mut attempts = 0;
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;
        }
        attempts
    }

    /// Like [`Block::mine`], but gives up once `cancel` is raised.
    pub fn mine_cancellable(
        &mut self,
        difficulty: usize,
        cancel: &CancelFlag,
    ) -> Result<u64, LedgerError> {
        let mut attempts = 0u64;
        while !self.meets_difficulty(difficulty) {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(LedgerError::MiningCancelled);
            }
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;
        }
        Ok(attempts)
    }

    /// True iff every transaction verifies; verification errors count as invalid.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|tx| matches!(tx.verify(), Ok(true)))
    }
}
