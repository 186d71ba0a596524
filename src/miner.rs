//! Proof-of-work search
//!
//! Mining a pending pool is split from committing it so that the CPU-bound
//! search can run on a worker without holding the ledger lock. A
//! [`CancelFlag`] lets consensus preempt an in-flight search.

use crate::blockchain::block::{block_timestamp, Block};
use crate::error::LedgerError;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// How many hashes are computed between two checks of the cancel flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Shared, clonable cancellation signal for a mining job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Whether `hash` starts with `difficulty` zero hex characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Blocks mined from a snapshot of the pending pool.
#[derive(Debug, Clone)]
pub struct MinedBatch {
    /// Hash of the chain tip the batch was built on.
    pub base_hash: String,
    /// Number of pending transactions the batch consumed, from the front of the pool.
    pub consumed: usize,
    pub blocks: Vec<Block>,
    pub attempts: u64,
}

/// Slices `pending` into blocks of at most `block_size` transactions and
/// mines them in sequence, each one chained to the block before it.
pub fn mine_batch(
    pending: &[Transaction],
    base_hash: &str,
    next_index: u64,
    block_size: usize,
    difficulty: usize,
    cancel: &CancelFlag,
) -> Result<MinedBatch, LedgerError> {
    if block_size == 0 {
        return Err(LedgerError::Validation(
            "block size must be greater than zero".to_string(),
        ));
    }

    let mut blocks = Vec::with_capacity(pending.len().div_ceil(block_size));
    let mut previous_hash = base_hash.to_string();
    let mut attempts = 0;

    for (offset, slice) in pending.chunks(block_size).enumerate() {
        let mut block = Block::new(next_index + offset as u64, block_timestamp(), slice.to_vec());
        block.set_previous_hash(previous_hash);
        attempts += block.mine_cancellable(difficulty, cancel)?;

        debug!(
            index = block.index,
            nonce = block.nonce,
            transactions = block.transactions.len(),
            "mined block"
        );

        previous_hash = block.hash.clone();
        blocks.push(block);
    }

    Ok(MinedBatch {
        base_hash: base_hash.to_string(),
        consumed: pending.len(),
        blocks,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewards(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| Transaction::reward(format!("miner-{i}"), 1))
            .collect()
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0ab", 2));
        assert!(meets_difficulty("abc", 0));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn test_batch_chains_blocks_in_order() {
        let pending = rewards(7);
        let batch = mine_batch(&pending, "tip", 4, 3, 1, &CancelFlag::new()).unwrap();

        let sizes: Vec<_> = batch.blocks.iter().map(|b| b.transactions.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batch.consumed, 7);
        assert_eq!(batch.blocks[0].previous_hash, "tip");
        assert_eq!(batch.blocks[0].index, 4);
        for pair in batch.blocks.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        assert!(batch.blocks.iter().all(|b| b.meets_difficulty(1)));
    }

    #[test]
    fn test_batch_preserves_arrival_order() {
        let pending = rewards(5);
        let batch = mine_batch(&pending, "tip", 1, 2, 1, &CancelFlag::new()).unwrap();
        let flattened: Vec<_> = batch
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter().cloned())
            .collect();
        assert_eq!(flattened, pending);
    }

    #[test]
    fn test_cancelled_batch_returns_error() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = mine_batch(&rewards(2), "tip", 1, 10, 64, &cancel);
        assert_eq!(result.unwrap_err(), LedgerError::MiningCancelled);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let result = mine_batch(&rewards(2), "tip", 1, 0, 1, &CancelFlag::new());
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
