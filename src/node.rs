//! A running replica: one shared [`Ledger`] plus the workers that mutate it.
//!
//! Every mutation takes the ledger's write lock, so adds, mining commits,
//! peer registration and chain replacement are serialized while readers see
//! the last committed state. Proof-of-work runs on a blocking worker with the
//! lock released; a chain replacement cancels it.

use crate::blockchain::{ChainResponse, Ledger};
use crate::config::Config;
use crate::consensus::{ChainSource, ConsensusResolver, Resolution};
use crate::crypto::SignerCredential;
use crate::error::LedgerError;
use crate::miner::CancelFlag;
use crate::network::HttpChainSource;
use crate::transaction::Transaction;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The newest block produced by a mining run.
#[derive(Debug, Clone, Serialize)]
pub struct MinedBlockSummary {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: String,
    pub previous_hash: String,
    pub hash: String,
    /// Blocks appended by this run.
    pub blocks_mined: usize,
}

pub struct Node<S = HttpChainSource> {
    ledger: Arc<RwLock<Ledger>>,
    resolver: ConsensusResolver<S>,
    identifier: String,
    active_job: Mutex<Option<CancelFlag>>,
    blocks_mined: AtomicU64,
}

/// Clears the node's active mining slot when the run ends, however it ends.
struct JobGuard<'a> {
    slot: &'a Mutex<Option<CancelFlag>>,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Node<HttpChainSource> {
    /// Builds a node from configuration, registering the bootstrap peers.
    pub fn from_config(config: &Config, identifier: impl Into<String>) -> Result<Self, LedgerError> {
        let mut ledger = Ledger::new(&config.ledger)?;
        for peer in &config.network.bootstrap_peers {
            ledger.register_peer(peer)?;
        }

        let timeout = config.network.fetch_timeout();
        Ok(Node::new(
            ledger,
            ConsensusResolver::new(HttpChainSource::new(timeout), timeout),
            identifier,
        ))
    }
}

impl<S: ChainSource> Node<S> {
    pub fn new(ledger: Ledger, resolver: ConsensusResolver<S>, identifier: impl Into<String>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            resolver,
            identifier: identifier.into(),
            active_job: Mutex::new(None),
            blocks_mined: AtomicU64::new(0),
        }
    }

    /// Identity credited with mining rewards earned by this node.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        Arc::clone(&self.ledger)
    }

    pub fn is_mining(&self) -> bool {
        self.active_job
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    pub async fn pending_count(&self) -> usize {
        self.ledger.read().await.pending_transactions().len()
    }

    pub async fn add_transaction<C: SignerCredential + Sync>(
        &self,
        sender: &str,
        receiver: &str,
        amount: u64,
        credential: &C,
        signer_identity: &str,
    ) -> Result<u64, LedgerError> {
        let mut ledger = self.ledger.write().await;
        ledger.add_transaction(sender, receiver, amount, credential, signer_identity)
    }

    pub async fn get_chain(&self) -> ChainResponse {
        self.ledger.read().await.serialize_chain()
    }

    pub async fn register_peer(&self, address: &str) -> Result<String, LedgerError> {
        self.ledger.write().await.register_peer(address)
    }

    pub async fn peers(&self) -> Vec<String> {
        self.ledger.read().await.peers().iter().cloned().collect()
    }

    /// Mines the pending pool on a blocking worker and commits the result.
    ///
    /// Only one run may be active at a time. The run fails with
    /// `MiningCancelled` or `StaleTip` if consensus replaced the chain first.
    pub async fn mine(&self, miner_identity: &str) -> Result<MinedBlockSummary, LedgerError> {
        let cancel = CancelFlag::new();
        let _guard = {
            let mut slot = self.active_job.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_some() {
                return Err(LedgerError::MiningInProgress);
            }
            *slot = Some(cancel.clone());
            JobGuard {
                slot: &self.active_job,
            }
        };

        let job = {
            let ledger = self.ledger.read().await;
            if ledger.pending_transactions().is_empty() {
                return Err(LedgerError::Validation("No transactions to mine".to_string()));
            }
            ledger.mining_job()?
        };

        info!(
            pending = job.pending.len(),
            difficulty = job.difficulty,
            "mining started"
        );
        let batch = tokio::task::spawn_blocking(move || job.run(&cancel))
            .await
            .map_err(|e| {
                warn!(error = %e, "mining worker failed");
                LedgerError::MiningCancelled
            })??;

        let mut ledger = self.ledger.write().await;
        let appended = ledger.commit_mined(batch, miner_identity)?;
        self.blocks_mined.fetch_add(appended as u64, Ordering::Relaxed);

        let last = ledger.last_block();
        Ok(MinedBlockSummary {
            index: last.index,
            transactions: last.transactions.clone(),
            timestamp: last.timestamp.clone(),
            previous_hash: last.previous_hash.clone(),
            hash: last.hash.clone(),
            blocks_mined: appended,
        })
    }

    /// Reconciles with every registered peer; see [`ConsensusResolver`].
    ///
    /// Peers are fetched without holding the ledger lock. The replacement
    /// re-checks length under the write lock, so a chain that grew in the
    /// meantime is never shortened.
    pub async fn resolve_conflicts(&self) -> Resolution {
        let (local_length, peers) = {
            let ledger = self.ledger.read().await;
            (ledger.len(), ledger.peers().clone())
        };

        let winner = self.resolver.select_best(local_length, &peers).await;

        let mut ledger = self.ledger.write().await;
        let replaced = match winner {
            Some(winner) => {
                let replaced = ledger.replace_chain(winner.chain);
                if replaced {
                    info!(peer = %winner.peer, length = ledger.len(), "chain replaced by peer");
                    self.cancel_mining();
                }
                replaced
            }
            None => false,
        };

        Resolution {
            replaced,
            chain: ledger.chain().to_vec(),
        }
    }

    fn cancel_mining(&self) {
        if let Some(cancel) = self
            .active_job
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            info!("cancelling in-flight mining run");
            cancel.cancel();
        }
    }
}
