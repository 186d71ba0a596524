use crate::blockchain::block::{block_timestamp, Block, GENESIS_PREVIOUS_HASH};
use crate::config::LedgerConfig;
use crate::crypto::SignerCredential;
use crate::error::LedgerError;
use crate::miner::{mine_batch, CancelFlag, MinedBatch};
use crate::network::normalize_peer_address;
use crate::transaction::Transaction;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Receiver of the seed transaction in the genesis block.
pub const GENESIS_RECEIVER: &str = "genesis";
pub const GENESIS_AMOUNT: u64 = 10;

/// Everything a worker needs to mine the pending pool without holding the ledger.
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub pending: Vec<Transaction>,
    pub base_hash: String,
    pub next_index: u64,
    pub block_size: usize,
    pub difficulty: usize,
}

impl MiningJob {
    pub fn run(&self, cancel: &CancelFlag) -> Result<MinedBatch, LedgerError> {
        mine_batch(
            &self.pending,
            &self.base_hash,
            self.next_index,
            self.block_size,
            self.difficulty,
            cancel,
        )
    }
}

/// The local replica: a hash-linked chain, the pending pool and the known peers.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    difficulty: usize,
    block_size: usize,
    miner_reward: u64,
    peers: BTreeSet<String>,
}

impl Ledger {
    /// Creates a ledger holding only the genesis block.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;

        Ok(Ledger {
            chain: vec![Self::create_genesis_block()],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            block_size: config.block_size,
            miner_reward: config.miner_reward,
            peers: BTreeSet::new(),
        })
    }

    fn create_genesis_block() -> Block {
        let seed = Transaction::reward(GENESIS_RECEIVER, GENESIS_AMOUNT);
        let mut genesis = Block::new(0, block_timestamp(), vec![seed]);
        genesis.set_previous_hash(GENESIS_PREVIOUS_HASH);
        genesis
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a ledger holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // The chain is created with a genesis block and only ever replaced by
        // a non-empty chain.
        &self.chain[self.chain.len() - 1]
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn miner_reward(&self) -> u64 {
        self.miner_reward
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    /// Normalizes `address` to `host:port` and records it. Re-registering is a no-op.
    pub fn register_peer(&mut self, address: &str) -> Result<String, LedgerError> {
        let peer = normalize_peer_address(address)?;
        if self.peers.insert(peer.clone()) {
            info!(peer = %peer, "registered peer");
        }
        Ok(peer)
    }

    /// Signs, verifies and queues a transfer.
    ///
    /// Returns the index of the block the transaction is expected to land in.
    /// This is only a hint: batching may place it in a later block.
    pub fn add_transaction(
        &mut self,
        sender: &str,
        receiver: &str,
        amount: u64,
        credential: &dyn SignerCredential,
        signer_identity: &str,
    ) -> Result<u64, LedgerError> {
        if sender.is_empty() || receiver.is_empty() || amount == 0 {
            return Err(LedgerError::Validation("Invalid transaction".to_string()));
        }

        let mut transaction = Transaction::new(sender, receiver, amount);
        transaction.sign(credential, signer_identity)?;

        if !transaction.verify()? {
            return Err(LedgerError::Signature(
                "Transaction signature does not match sender".to_string(),
            ));
        }

        debug!(digest = %transaction.digest_hex(), amount, "queued transaction");
        self.pending_transactions.push(transaction);
        Ok(self.chain.len() as u64 + 1)
    }

    fn ensure_minable(&self) -> Result<(), LedgerError> {
        if self.pending_transactions.len() <= 1 {
            return Err(LedgerError::Validation(
                "Not enough transactions to mine! (Must be > 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// Snapshot of the pending pool and tip for off-lock mining.
    pub fn mining_job(&self) -> Result<MiningJob, LedgerError> {
        self.ensure_minable()?;
        Ok(MiningJob {
            pending: self.pending_transactions.clone(),
            base_hash: self.last_block().hash.clone(),
            next_index: self.chain.len() as u64,
            block_size: self.block_size,
            difficulty: self.difficulty,
        })
    }

    /// Mines the whole pending pool in place and queues the miner's reward.
    ///
    /// Returns the number of blocks appended.
    pub fn mine_pending_transactions(&mut self, miner_identity: &str) -> Result<usize, LedgerError> {
        let batch = self.mining_job()?.run(&CancelFlag::new())?;
        self.commit_mined(batch, miner_identity)
    }

    /// Appends blocks mined from an earlier [`Ledger::mining_job`] snapshot.
    ///
    /// Fails with `StaleTip` if the chain moved in the meantime. Transactions
    /// queued after the snapshot stay pending, ahead of the new reward.
    pub fn commit_mined(
        &mut self,
        batch: MinedBatch,
        miner_identity: &str,
    ) -> Result<usize, LedgerError> {
        if batch.base_hash != self.last_block().hash
            || batch.consumed > self.pending_transactions.len()
        {
            return Err(LedgerError::StaleTip);
        }

        let appended = batch.blocks.len();
        self.chain.extend(batch.blocks);

        let mut remaining = self.pending_transactions.split_off(batch.consumed);
        remaining.push(Transaction::reward(miner_identity, self.miner_reward));
        self.pending_transactions = remaining;

        info!(
            blocks = appended,
            height = self.chain.len(),
            attempts = batch.attempts,
            "committed mined blocks"
        );
        Ok(appended)
    }

    /// Replaces the local chain with `candidate` if it is strictly longer and valid.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() || !Self::is_valid_chain(&candidate) {
            return false;
        }

        info!(
            old_length = self.chain.len(),
            new_length = candidate.len(),
            "replacing local chain"
        );
        self.chain = candidate;
        true
    }
}
