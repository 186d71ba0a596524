//! Error types for hashledger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Caller supplied incomplete data, or the ledger is not in a state that allows the operation.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Signing on behalf of another identity, or a signature that does not verify.
    #[error("Signature error: {0}")]
    Signature(String),
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Mining was cancelled")]
    MiningCancelled,
    #[error("Mining is already in progress")]
    MiningInProgress,
    /// The chain tip moved while a batch was being mined off-lock.
    #[error("Chain tip changed while mining; mined blocks discarded")]
    StaleTip,
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
