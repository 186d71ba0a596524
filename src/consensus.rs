//! Longest-valid-chain consensus
//!
//! A peer chain wins only if it is strictly longer than the best seen so far
//! and passes [`Ledger::is_valid_chain`]. Peers are evaluated in ascending
//! identifier order, so among equally long winners the smallest identifier
//! is kept and the outcome does not depend on fetch timing.

use crate::blockchain::{Block, ChainResponse, Ledger};
use crate::error::LedgerError;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Transport used to ask a peer for its chain.
pub trait ChainSource: Send + Sync + 'static {
    fn fetch_chain(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<ChainResponse, LedgerError>> + Send;
}

/// A peer chain that beat the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChain {
    pub peer: String,
    pub chain: Vec<Block>,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Resolution {
    pub replaced: bool,
    pub chain: Vec<Block>,
}

pub struct ConsensusResolver<S> {
    source: Arc<S>,
    fetch_timeout: Duration,
}

impl<S: ChainSource> ConsensusResolver<S> {
    pub fn new(source: S, fetch_timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            fetch_timeout,
        }
    }

    /// Fetches every peer concurrently, each under its own timeout.
    ///
    /// Peers that fail, time out or send an inconsistent response are logged
    /// and left out; they never fail the pass.
    async fn fetch_all(&self, peers: &BTreeSet<String>) -> BTreeMap<String, ChainResponse> {
        let mut fetches = JoinSet::new();
        for peer in peers {
            let source = Arc::clone(&self.source);
            let peer = peer.clone();
            let timeout = self.fetch_timeout;
            fetches.spawn(async move {
                let outcome = tokio::time::timeout(timeout, source.fetch_chain(&peer)).await;
                (peer, outcome)
            });
        }

        let mut responses = BTreeMap::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((peer, Ok(Ok(response)))) => {
                    if response.is_consistent() {
                        responses.insert(peer, response);
                    } else {
                        warn!(
                            peer = %peer,
                            advertised = response.length,
                            sent = response.chain.len(),
                            "peer length does not match its chain; skipping"
                        );
                    }
                }
                Ok((peer, Ok(Err(e)))) => warn!(peer = %peer, error = %e, "chain fetch failed; skipping"),
                Ok((peer, Err(_))) => warn!(peer = %peer, timeout = ?self.fetch_timeout, "chain fetch timed out; skipping"),
                Err(e) => warn!(error = %e, "chain fetch task failed"),
            }
        }
        responses
    }

    /// Picks the longest valid peer chain that is strictly longer than `local_length`.
    pub async fn select_best(
        &self,
        local_length: usize,
        peers: &BTreeSet<String>,
    ) -> Option<PeerChain> {
        let mut best_length = local_length;
        let mut best = None;

        for (peer, response) in self.fetch_all(peers).await {
            if response.length <= best_length {
                debug!(peer = %peer, length = response.length, best_length, "peer chain not longer");
                continue;
            }
            if !Ledger::is_valid_chain(&response.chain) {
                warn!(peer = %peer, length = response.length, "peer chain failed validation");
                continue;
            }
            best_length = response.length;
            best = Some(PeerChain {
                peer,
                chain: response.chain,
            });
        }

        best
    }

    /// Runs one resolution pass against `ledger`'s own peer set.
    pub async fn resolve_conflicts(&self, ledger: &mut Ledger) -> Resolution {
        let peers = ledger.peers().clone();
        let replaced = match self.select_best(ledger.len(), &peers).await {
            Some(winner) => {
                info!(peer = %winner.peer, length = winner.chain.len(), "adopting peer chain");
                ledger.replace_chain(winner.chain)
            }
            None => false,
        };

        Resolution {
            replaced,
            chain: ledger.chain().to_vec(),
        }
    }
}
