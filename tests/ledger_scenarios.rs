//! End-to-end ledger behaviour: mining, validation, wire round trips and consensus.

use hashledger::blockchain::{decode_chain, encode_chain, ChainResponse, GENESIS_PREVIOUS_HASH};
use hashledger::config::LedgerConfig;
use hashledger::consensus::{ChainSource, ConsensusResolver};
use hashledger::crypto::{KeyPair, SignerCredential};
use hashledger::{Block, Ledger, LedgerError};
use std::collections::HashMap;
use std::time::Duration;

fn new_ledger(block_size: usize) -> Ledger {
    Ledger::new(&LedgerConfig {
        difficulty: 2,
        block_size,
        miner_reward: 50,
    })
    .expect("valid ledger config")
}

fn queue_transfers(ledger: &mut Ledger, keypair: &KeyPair, count: u64) {
    let identity = keypair.public_identity();
    for amount in 1..=count {
        ledger
            .add_transaction(&identity, "receiver", amount, keypair, &identity)
            .expect("transfer accepted");
    }
}

/// Serves canned chains keyed by peer id; unknown peers are unreachable.
struct StaticPeers(HashMap<String, ChainResponse>);

impl ChainSource for StaticPeers {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, LedgerError> {
        self.0
            .get(peer)
            .cloned()
            .ok_or_else(|| LedgerError::Network(format!("{peer} unreachable")))
    }
}

fn chain_with_blocks(total_length: usize) -> Vec<Block> {
    let mut ledger = new_ledger(1);
    queue_transfers(&mut ledger, &KeyPair::generate(), (total_length - 1) as u64);
    ledger.mine_pending_transactions("miner").unwrap();
    assert_eq!(ledger.len(), total_length);
    ledger.chain().to_vec()
}

#[test]
fn genesis_invariant() {
    let ledger = new_ledger(10);
    assert_eq!(ledger.len(), 1);
    let genesis = &ledger.chain()[0];
    assert_eq!(genesis.index, 0);
    assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
    assert_eq!(genesis.hash, genesis.compute_hash());
}

#[test]
fn scenario_not_enough_transactions() {
    let mut ledger = new_ledger(10);
    let err = ledger.mine_pending_transactions("miner").unwrap_err();
    assert!(matches!(err, LedgerError::Validation(ref msg) if msg.contains("Not enough transactions")));

    queue_transfers(&mut ledger, &KeyPair::generate(), 1);
    let err = ledger.mine_pending_transactions("miner").unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.pending_transactions().len(), 1);
}

#[test]
fn scenario_three_transactions_one_block() {
    let mut ledger = new_ledger(10);
    queue_transfers(&mut ledger, &KeyPair::generate(), 3);

    ledger.mine_pending_transactions("miner-7").unwrap();

    assert_eq!(ledger.len(), 2);
    let block = ledger.last_block();
    assert_eq!(block.index, 1);
    assert_eq!(block.transactions.len(), 3);
    assert!(block.hash.starts_with("00"));
    assert_eq!(block.hash, block.compute_hash());

    let pending = ledger.pending_transactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sender, hashledger::REWARD_SENDER);
    assert_eq!(pending[0].receiver, "miner-7");
    assert_eq!(pending[0].amount, 50);
}

#[test]
fn scenario_twenty_five_transactions_three_blocks() {
    let mut ledger = new_ledger(10);
    queue_transfers(&mut ledger, &KeyPair::generate(), 25);

    ledger.mine_pending_transactions("miner").unwrap();

    assert_eq!(ledger.len(), 4);
    let sizes: Vec<_> = ledger.chain()[1..]
        .iter()
        .map(|b| b.transactions.len())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);

    for (i, pair) in ledger.chain().windows(2).enumerate() {
        assert_eq!(pair[1].index, i as u64 + 1);
        assert_eq!(pair[1].previous_hash, pair[0].hash);
        assert!(pair[1].meets_difficulty(2));
    }

    // Arrival order is preserved across the slices.
    let amounts: Vec<_> = ledger.chain()[1..]
        .iter()
        .flat_map(|b| b.transactions.iter().map(|tx| tx.amount))
        .collect();
    assert_eq!(amounts, (1..=25).collect::<Vec<_>>());
    assert!(Ledger::is_valid_chain(ledger.chain()));
}

#[test]
fn scenario_mutated_amount_invalidates_chain() {
    let mut ledger = new_ledger(10);
    queue_transfers(&mut ledger, &KeyPair::generate(), 3);
    ledger.mine_pending_transactions("miner").unwrap();

    let mut chain = ledger.chain().to_vec();
    assert!(Ledger::is_valid_chain(&chain));

    chain[1].transactions[1].amount = 1_000_000;
    assert_ne!(chain[1].hash, chain[1].compute_hash());
    assert!(!Ledger::is_valid_chain(&chain));
}

#[test]
fn signing_restriction() {
    let mut ledger = new_ledger(10);
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let result = ledger.add_transaction(
        &alice.public_identity(),
        "carol",
        10,
        &alice,
        &bob.public_identity(),
    );
    assert!(matches!(result, Err(LedgerError::Signature(_))));
    assert!(ledger.pending_transactions().is_empty());
}

#[test]
fn serialization_round_trip_keeps_hashes() {
    let mut ledger = new_ledger(2);
    queue_transfers(&mut ledger, &KeyPair::generate(), 5);
    ledger.mine_pending_transactions("miner").unwrap();

    let decoded = decode_chain(&encode_chain(ledger.chain()).unwrap()).unwrap();
    assert_eq!(decoded.len(), ledger.len());
    for (original, restored) in ledger.chain().iter().zip(&decoded) {
        assert_eq!(restored.index, original.index);
        assert_eq!(restored.previous_hash, original.previous_hash);
        assert_eq!(restored.hash, original.hash);
    }
}

#[tokio::test]
async fn scenario_longer_valid_peer_wins_over_longer_invalid_peer() {
    let chain_a = chain_with_blocks(8);

    let mut chain_b = chain_with_blocks(10);
    // A corrupted signature in the middle of an otherwise well-formed chain.
    let forged = &mut chain_b[5];
    forged.transactions[0].signature = Some(vec![3u8; 64]);
    forged.hash = forged.compute_hash();
    assert!(!Ledger::is_valid_chain(&chain_b));

    let peers = StaticPeers(HashMap::from([
        ("a:5000".to_string(), ChainResponse::new(chain_a.clone())),
        ("b:5000".to_string(), ChainResponse::new(chain_b.clone())),
    ]));
    let resolver = ConsensusResolver::new(peers, Duration::from_secs(1));

    let mut local = new_ledger(10);
    local.register_peer("http://a:5000").unwrap();
    local.register_peer("http://b:5000").unwrap();
    let resolution = resolver.resolve_conflicts(&mut local).await;
    assert!(resolution.replaced);
    assert_eq!(local.chain(), chain_a.as_slice());

    // With only B registered nothing changes.
    let peers = StaticPeers(HashMap::from([(
        "b:5000".to_string(),
        ChainResponse::new(chain_b),
    )]));
    let resolver = ConsensusResolver::new(peers, Duration::from_secs(1));
    let mut local = new_ledger(10);
    local.register_peer("b:5000").unwrap();
    let before = local.chain().to_vec();
    let resolution = resolver.resolve_conflicts(&mut local).await;
    assert!(!resolution.replaced);
    assert_eq!(local.chain(), before.as_slice());
}

#[tokio::test]
async fn consensus_never_shortens() {
    let short = chain_with_blocks(3);
    let peers = StaticPeers(HashMap::from([(
        "short:1".to_string(),
        ChainResponse::new(short),
    )]));
    let resolver = ConsensusResolver::new(peers, Duration::from_secs(1));

    let mut local = new_ledger(1);
    queue_transfers(&mut local, &KeyPair::generate(), 4);
    local.mine_pending_transactions("miner").unwrap();
    local.register_peer("short:1").unwrap();
    local.register_peer("missing:1").unwrap();

    let resolution = resolver.resolve_conflicts(&mut local).await;
    assert!(!resolution.replaced);
    assert_eq!(local.len(), 5);
}
