//! Blocks, the ledger that chains them, and chain validation.

pub mod block;
pub mod chain;
pub mod codec;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use codec::*;
