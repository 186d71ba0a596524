/// Transaction types for hashledger
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sender identity reserved for miner rewards; such transactions carry no signature.
pub const REWARD_SENDER: &str = "Miner Rewards";

/// A single value transfer between two identities.
///
/// The serde representation is the canonical form: it is what peers exchange
/// on the wire and what block hashing consumes, with the signature hex-encoded
/// (or `null` when unsigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    #[serde(with = "signature_hex", default)]
    pub signature: Option<Vec<u8>>,
    /// Unix milliseconds.
    #[serde(default = "now_millis")]
    pub timestamp: i64,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Transaction {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: u64) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            signature: None,
            timestamp: now_millis(),
        }
    }

    /// Reward transaction crediting `miner` with `amount`.
    pub fn reward(miner: impl Into<String>, amount: u64) -> Self {
        Self::new(REWARD_SENDER, miner, amount)
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    /// SHA-256 over sender, receiver, amount and timestamp.
    ///
    /// Every field is length-prefixed, so `("ab", "c")` and `("a", "bc")` never collide.
    pub fn compute_digest(&self) -> [u8; 32] {
        let amount = self.amount.to_le_bytes();
        let timestamp = self.timestamp.to_le_bytes();
        let fields: [&[u8]; 4] = [
            self.sender.as_bytes(),
            self.receiver.as_bytes(),
            &amount,
            &timestamp,
        ];

        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.finalize().into()
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.compute_digest())
    }

    /// The canonical JSON object for this transaction. Keys serialize in sorted
    /// order, so the rendered string is stable and safe to hash.
    pub fn serialize(&self) -> serde_json::Value {
        serde_json::json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
            "signature": self.signature.as_ref().map(hex::encode),
            "timestamp": self.timestamp,
        })
    }
}

mod signature_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sig: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match sig {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|hex_sig| hex::decode(hex_sig).map_err(serde::de::Error::custom))
            .transpose()
    }
}
