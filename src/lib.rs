//! hashledger - a minimal proof-of-work ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`transaction`] - Signed value transfers
//! - [`blockchain`] - Blocks, the ledger, chain validation and the wire codec
//! - [`miner`] - Cancellable proof-of-work search
//!
//! ## Consensus
//! - [`consensus`] - Longest-valid-chain resolution against peers
//!
//! ## Cryptography
//! - [`crypto`] - Signer credentials and verification (secp256k1)
//!
//! ## Networking & Integration
//! - [`network`] - Peer addressing and HTTP chain transport
//! - [`node`] - Shared ledger, mining worker and consensus preemption
//! - [`api`] - HTTP routes
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod miner;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Networking & Integration
// ============================================================================
pub mod network;
pub mod node;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use blockchain::{Block, ChainResponse, Ledger};
pub use consensus::{ChainSource, ConsensusResolver, Resolution};
pub use crypto::{KeyPair, SignerCredential};
pub use error::LedgerError;
pub use node::Node;
pub use transaction::{Transaction, REWARD_SENDER};
