use std::time::Instant;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Character a sealed hash must start with, repeated `difficulty` times
pub const POW_TARGET_SYMBOL: char = '0';

/// Previous hash recorded by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2025-11-25T00:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block
    pub hash: String,

    /// Proof of work counter
    pub nonce: u64,

    /// Transactions sealed into this block, in mempool order
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new unsealed block with nonce 0
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - Creation time of the block
    /// * `transactions` - The list of transactions to include in the block
    /// * `previous_hash` - The hash of the previous block
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            transactions,
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Creates the genesis block, sealed at the given difficulty
    pub fn genesis(difficulty: usize) -> Self {
        let timestamp = Utc
            .with_ymd_and_hms(2025, 11, 25, 0, 0, 0)
            .single()
            .unwrap_or_default();

        let mut block = Block::new(0, timestamp, Vec::new(), GENESIS_PREVIOUS_HASH.to_string());
        block.seal(difficulty);
        block
    }

    /// Calculates the hash of the block
    ///
    /// The digest is the hex SHA-256 of
    /// `index|timestamp|previousHash|nonce` followed by
    /// `|id|sender|receiver|amount|timestamp` for every transaction in
    /// order, with the block timestamp in RFC 3339 (nanoseconds, `Z`) and
    /// amounts fixed to 8 decimal places.
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(
            format!(
                "{}|{}|{}|{}",
                self.index,
                self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                self.previous_hash,
                self.nonce,
            )
            .as_bytes(),
        );

        for tx in &self.transactions {
            hasher.update(
                format!(
                    "|{}|{}|{}|{:.8}|{}",
                    tx.id, tx.sender, tx.receiver, tx.amount, tx.timestamp
                )
                .as_bytes(),
            );
        }

        hex::encode(hasher.finalize())
    }

    /// Checks if the stored hash satisfies the proof of work target
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    /// Searches nonces until the hash meets the difficulty target
    ///
    /// Unbounded. Difficulty 0 returns immediately.
    pub fn seal(&mut self, difficulty: usize) {
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        debug_assert_eq!(self.hash, self.calculate_hash(), "sealed hash must match digest");
    }

    /// Seals like [`Block::seal`] but gives up once `deadline` has passed
    ///
    /// Returns `false` on overrun; the block must then be discarded.
    pub fn seal_before(&mut self, difficulty: usize, deadline: Instant) -> bool {
        while !self.meets_difficulty(difficulty) {
            if Instant::now() >= deadline {
                return false;
            }

            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        debug_assert_eq!(self.hash, self.calculate_hash(), "sealed hash must match digest");
        true
    }
}

fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.chars().take(difficulty).all(|c| c == POW_TARGET_SYMBOL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_block() -> Block {
        let transactions = vec![
            Transaction::with_timestamp("WALLET_100001", "WALLET_100002", 10.0, 1),
            Transaction::with_timestamp("WALLET_100002", "WALLET_100003", 20.0, 2),
        ];

        Block::new(1, Utc::now(), transactions, "previous_hash".to_string())
    }

    #[test]
    fn test_new_block() {
        let block = sample_block();

        assert_eq!(block.index, 1);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.hash, block.calculate_hash());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(0);

        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.hash, Block::genesis(0).hash);
    }

    #[test]
    fn test_every_field_changes_hash() {
        let block = sample_block();
        let original = block.calculate_hash();

        let mut changed = block.clone();
        changed.index += 1;
        assert_ne!(changed.calculate_hash(), original);

        let mut changed = block.clone();
        changed.timestamp = changed.timestamp + chrono::Duration::milliseconds(1);
        assert_ne!(changed.calculate_hash(), original);

        let mut changed = block.clone();
        changed.previous_hash.push('x');
        assert_ne!(changed.calculate_hash(), original);

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.calculate_hash(), original);

        let mut changed = block.clone();
        changed.transactions[0].amount = 11.0;
        assert_ne!(changed.calculate_hash(), original);

        let mut changed = block;
        changed.transactions.swap(0, 1);
        assert_ne!(changed.calculate_hash(), original);
    }

    #[test]
    fn test_seal_difficulty_zero_is_immediate() {
        let mut block = sample_block();
        let before = block.hash.clone();
        block.seal(0);

        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, before);
    }

    #[test]
    fn test_seal_meets_target() {
        let mut block = sample_block();
        block.seal(2);

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn test_seal_before_gives_up_after_deadline() {
        let mut block = sample_block();
        let sealed = block.seal_before(64, Instant::now());

        assert!(!sealed);
        assert!(!block.meets_difficulty(64));
    }

    #[test]
    fn test_seal_before_succeeds_within_deadline() {
        let mut block = sample_block();

        assert!(block.seal_before(1, Instant::now() + Duration::from_secs(30)));
        assert!(block.hash.starts_with('0'));
    }
}
