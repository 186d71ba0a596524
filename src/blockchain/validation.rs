use crate::blockchain::block::Block;
use crate::blockchain::chain::Ledger;
use tracing::debug;

impl Ledger {
    /// Checks a candidate chain block by block.
    ///
    /// The first block is trusted as-is. Every later block must carry only
    /// verifying transactions, store the hash its fields produce, and point at
    /// its predecessor's hash. An empty candidate is never valid.
    pub fn is_valid_chain(candidate: &[Block]) -> bool {
        let Some(mut previous) = candidate.first() else {
            return false;
        };

        for block in &candidate[1..] {
            if !block.has_valid_transactions() {
                debug!(index = block.index, "block carries an invalid transaction");
                return false;
            }

            if block.hash != block.compute_hash() {
                debug!(index = block.index, "stored hash does not match block contents");
                return false;
            }

            if block.previous_hash != previous.hash {
                debug!(index = block.index, "block is not linked to its predecessor");
                return false;
            }

            previous = block;
        }

        true
    }
}
