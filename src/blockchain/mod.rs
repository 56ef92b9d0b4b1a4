// Blockchain module
//
// This module contains the ledger engine:
// - Transaction structure and id derivation
// - Signature verification
// - Block structure and proof of work sealing
// - Wallet ledger
// - Chain with mempool, admission and mining
// - JSON document storage
// - Ledger service tying them together

pub mod block;
pub mod chain;
pub mod crypto;
pub mod ledger;
pub mod storage;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use block::Block;
pub use chain::LedgerError;
pub use crypto::KeyPair;
pub use ledger::{Ledger, TransferRequest};
pub use transaction::{Transaction, TxStatus};
