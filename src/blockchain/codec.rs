//! Wire representation of a chain as served by a peer's chain endpoint.
//!
//! `{"length": n, "chain": [block, ...]}` where each block carries `index`,
//! `timestamp`, `transactions`, `previous_hash`, `nonce` and `hash`.

use crate::blockchain::block::Block;
use crate::blockchain::chain::Ledger;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

#[derive(Deserialize)]
struct RawChainResponse {
    chain: Vec<serde_json::Value>,
    length: usize,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }

    /// Parses a peer's response body.
    pub fn from_json(body: &str) -> Result<Self, LedgerError> {
        let raw: RawChainResponse = serde_json::from_str(body)?;
        Ok(Self {
            chain: decode_chain(&raw.chain)?,
            length: raw.length,
        })
    }

    /// Whether the advertised length matches the blocks actually sent.
    pub fn is_consistent(&self) -> bool {
        self.length == self.chain.len()
    }
}

/// Rebuilds blocks from their serialized form.
///
/// The incoming `hash` and `previous_hash` are taken as-is; nothing is
/// recomputed or checked here. Run [`Ledger::is_valid_chain`] before trusting
/// the result.
pub fn decode_chain(serialized_blocks: &[serde_json::Value]) -> Result<Vec<Block>, LedgerError> {
    serialized_blocks
        .iter()
        .enumerate()
        .map(|(position, value)| {
            Block::deserialize(value)
                .map_err(|e| LedgerError::Codec(format!("block {}: {}", position, e)))
        })
        .collect()
}

/// Serializes blocks into their wire form.
pub fn encode_chain(chain: &[Block]) -> Result<Vec<serde_json::Value>, LedgerError> {
    chain
        .iter()
        .map(|block| serde_json::to_value(block).map_err(LedgerError::from))
        .collect()
}

impl Ledger {
    pub fn serialize_chain(&self) -> ChainResponse {
        ChainResponse::new(self.chain().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::crypto::{KeyPair, SignerCredential};

    fn mined_ledger() -> Ledger {
        let mut ledger = Ledger::new(&LedgerConfig {
            difficulty: 1,
            block_size: 2,
            miner_reward: 50,
        })
        .unwrap();
        let keypair = KeyPair::generate();
        let identity = keypair.public_identity();
        for amount in 1..=3 {
            ledger
                .add_transaction(&identity, "bob", amount, &keypair, &identity)
                .unwrap();
        }
        ledger.mine_pending_transactions("miner").unwrap();
        ledger
    }

    #[test]
    fn test_round_trip_preserves_linkage() {
        let ledger = mined_ledger();
        let encoded = encode_chain(ledger.chain()).unwrap();
        let decoded = decode_chain(&encoded).unwrap();

        assert_eq!(decoded.len(), ledger.len());
        for (original, restored) in ledger.chain().iter().zip(&decoded) {
            assert_eq!(restored.index, original.index);
            assert_eq!(restored.previous_hash, original.previous_hash);
            assert_eq!(restored.hash, original.hash);
        }
        assert!(Ledger::is_valid_chain(&decoded));
    }

    #[test]
    fn test_decode_trusts_incoming_hashes() {
        let ledger = mined_ledger();
        let mut encoded = encode_chain(ledger.chain()).unwrap();
        encoded[1]["hash"] = serde_json::json!("forged");

        let decoded = decode_chain(&encoded).unwrap();
        assert_eq!(decoded[1].hash, "forged");
        assert!(!Ledger::is_valid_chain(&decoded));
    }

    #[test]
    fn test_wire_shape() {
        let ledger = mined_ledger();
        let value = serde_json::to_value(ledger.serialize_chain()).unwrap();

        assert_eq!(value["length"], 3);
        let block = &value["chain"][1];
        for key in ["index", "timestamp", "transactions", "previous_hash", "nonce", "hash"] {
            assert!(block.get(key).is_some(), "missing {key}");
        }
        let tx = &block["transactions"][0];
        for key in ["sender", "receiver", "amount", "signature", "timestamp"] {
            assert!(tx.get(key).is_some(), "missing {key}");
        }
        assert!(tx["signature"].is_string());
    }

    #[test]
    fn test_from_json_reports_bad_block() {
        let body = r#"{"length": 1, "chain": [{"index": 0}]}"#;
        let err = ChainResponse::from_json(body).unwrap_err();
        assert!(err.to_string().contains("block 0"));
    }

    #[test]
    fn test_from_json_parses_served_chain() {
        let ledger = mined_ledger();
        let body = serde_json::to_string(&ledger.serialize_chain()).unwrap();
        let response = ChainResponse::from_json(&body).unwrap();

        assert!(response.is_consistent());
        assert_eq!(response.chain, ledger.chain());
    }

    #[test]
    fn test_missing_nonce_defaults_to_zero() {
        let body = serde_json::json!([{
            "index": 0,
            "timestamp": "01/01/2024, 00:00:00",
            "transactions": [],
            "previous_hash": "None",
            "hash": "abc"
        }]);
        let decoded = decode_chain(body.as_array().unwrap()).unwrap();
        assert_eq!(decoded[0].nonce, 0);
    }
}
