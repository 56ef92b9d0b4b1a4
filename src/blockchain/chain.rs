use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use super::block::Block;
use super::storage::StorageError;
use super::transaction::Transaction;
use super::wallet::WalletLedger;
use crate::config::ChainConfig;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("No pending transactions to mine")]
    EmptyMempool,

    #[error("Chain integrity violated at block {index}")]
    ChainIntegrityViolation { index: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Mining exceeded its deadline of {0:?}")]
    MiningTimeout(Duration),

    #[error("Block {index} no longer extends the chain tip")]
    StaleBlock { index: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A block candidate that is sealed without access to the chain
#[derive(Debug, Clone)]
pub struct MiningJob {
    block: Block,
    difficulty: usize,
    deadline: Option<Duration>,
}

impl MiningJob {
    /// Runs the proof of work search
    pub fn seal(mut self) -> Result<Block, LedgerError> {
        let started = Instant::now();

        match self.deadline {
            Some(limit) => {
                if !self.block.seal_before(self.difficulty, started + limit) {
                    warn!("Discarding block {}: sealing exceeded {:?}", self.block.index, limit);
                    return Err(LedgerError::MiningTimeout(limit));
                }
            }
            None => self.block.seal(self.difficulty),
        }

        debug!(
            "Sealed block {} at difficulty {} in {:?}",
            self.block.index,
            self.difficulty,
            started.elapsed()
        );
        Ok(self.block)
    }
}

/// The ordered sequence of sealed blocks plus the mempool
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Admitted transactions waiting for the next block, in admission order
    mempool: Vec<Transaction>,

    /// Number of leading target symbols required in a block hash
    difficulty: usize,

    /// Amount paid to the miner of each block
    mining_reward: f64,

    /// Upper bound on sealing time, unbounded when `None`
    mining_deadline: Option<Duration>,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    pub fn new(config: &ChainConfig) -> Self {
        Blockchain {
            chain: vec![Block::genesis(config.difficulty)],
            mempool: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            mining_deadline: config.mining_deadline(),
        }
    }

    /// Restores a blockchain from persisted blocks
    ///
    /// An empty list yields a fresh genesis block. Blocks are kept as
    /// stored; integrity is reported by [`Blockchain::check_integrity`].
    pub fn from_blocks(blocks: Vec<Block>, config: &ChainConfig) -> Self {
        if blocks.is_empty() {
            return Self::new(config);
        }

        Blockchain {
            chain: blocks,
            mempool: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            mining_deadline: config.mining_deadline(),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        // the chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn mempool(&self) -> &[Transaction] {
        &self.mempool
    }

    /// Adds a transaction to the mempool if the sender can afford it
    ///
    /// The sender's effective balance (confirmed minus already pending
    /// outgoing amounts) must cover the amount, so several queued transfers
    /// cannot jointly overspend one confirmed balance.
    pub fn admit(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let available = self.effective_balance_of(&transaction.sender);

        if available < transaction.amount {
            warn!(
                "Rejected transaction {} from {}: effective balance {} below {}",
                transaction.id, transaction.sender, available, transaction.amount
            );
            return Err(LedgerError::InsufficientFunds {
                required: transaction.amount,
                available,
            });
        }

        debug!("Admitted transaction {} to the mempool", transaction.id);
        self.mempool.push(transaction);
        Ok(())
    }

    /// Builds the next block from every pending transaction plus a reward
    ///
    /// The block still has to be sealed with [`MiningJob::seal`] and then
    /// handed back to [`Blockchain::commit_block`].
    pub fn prepare_block(&self, miner_address: &str) -> Result<MiningJob, LedgerError> {
        if self.mempool.is_empty() {
            return Err(LedgerError::EmptyMempool);
        }

        let mut transactions = self.mempool.clone();
        transactions.push(Transaction::reward(miner_address, self.mining_reward));
        for tx in &mut transactions {
            tx.confirm();
        }

        let block = Block::new(
            self.chain.len() as u64,
            Utc::now(),
            transactions,
            self.last_block().hash.clone(),
        );

        Ok(MiningJob {
            block,
            difficulty: self.difficulty,
            deadline: self.mining_deadline,
        })
    }

    /// Appends a block sealed from [`Blockchain::prepare_block`]
    ///
    /// The block must still extend the tip and carry the oldest pending
    /// transactions; anything admitted while it was sealed stays pending.
    /// Balance deltas are applied to `wallets` (the reward's system sender
    /// is never debited). On any error nothing is changed.
    pub fn commit_block(&mut self, block: Block, wallets: &mut WalletLedger) -> Result<(), LedgerError> {
        let pending = block.transactions.len().saturating_sub(1);

        let extends_tip =
            block.index == self.chain.len() as u64 && block.previous_hash == self.last_block().hash;
        let ends_with_reward = block.transactions.last().map_or(false, Transaction::is_reward);
        let drains_mempool = pending > 0
            && pending <= self.mempool.len()
            && block.transactions[..pending]
                .iter()
                .zip(&self.mempool)
                .all(|(sealed, queued)| sealed.id == queued.id);

        if !(extends_tip && ends_with_reward && drains_mempool) {
            warn!("Discarding block {}: chain moved on while it was sealed", block.index);
            return Err(LedgerError::StaleBlock { index: block.index });
        }

        if block.hash != block.calculate_hash() || !block.meets_difficulty(self.difficulty) {
            return Err(LedgerError::ChainIntegrityViolation { index: block.index });
        }

        for tx in &block.transactions {
            if !tx.is_reward() {
                wallets.debit(&tx.sender, tx.amount);
            }
            wallets.credit(&tx.receiver, tx.amount);
        }

        self.mempool.drain(..pending);
        info!(
            "Mined block {} with {} transactions (nonce {})",
            block.index,
            block.transactions.len(),
            block.nonce
        );
        self.chain.push(block);

        Ok(())
    }

    /// Prepares, seals and commits a block in one step
    #[cfg(test)]
    pub fn mine(&mut self, miner_address: &str, wallets: &mut WalletLedger) -> Result<Block, LedgerError> {
        let block = self.prepare_block(miner_address)?.seal()?;
        self.commit_block(block.clone(), wallets)?;
        Ok(block)
    }

    /// Appends a single confirmed settlement record without proof of work
    ///
    /// Skips admission checks; the caller has already authorized the
    /// movement and adjusted the wallet ledger itself.
    pub fn add_confirmed_transaction(&mut self, mut transaction: Transaction) -> Block {
        transaction.confirm();

        let mut block = Block::new(
            self.chain.len() as u64,
            Utc::now(),
            vec![transaction],
            self.last_block().hash.clone(),
        );
        block.seal(0);

        info!("Recorded settlement block {}", block.index);
        self.chain.push(block.clone());
        block
    }

    /// Checks hash links and stored digests, reporting the first bad block
    pub fn check_integrity(&self) -> Result<(), LedgerError> {
        for pair in self.chain.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);

            if current.hash != current.calculate_hash() || current.previous_hash != previous.hash {
                return Err(LedgerError::ChainIntegrityViolation {
                    index: current.index,
                });
            }
        }

        Ok(())
    }

    /// Validates the blockchain
    pub fn is_valid(&self) -> bool {
        self.check_integrity().is_ok()
    }

    /// Sums every confirmed credit and debit of an address across the chain
    pub fn balance_of(&self, address: &str) -> f64 {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .fold(0.0, |mut balance, tx| {
                if tx.sender == address {
                    balance -= tx.amount;
                }
                if tx.receiver == address {
                    balance += tx.amount;
                }
                balance
            })
    }

    /// Sum of amounts the address is sending in the mempool
    pub fn pending_outgoing(&self, address: &str) -> f64 {
        self.mempool
            .iter()
            .filter(|tx| tx.sender == address)
            .map(|tx| tx.amount)
            .sum()
    }

    /// Confirmed balance minus pending outgoing amounts
    pub fn effective_balance_of(&self, address: &str) -> f64 {
        let confirmed = self.balance_of(address);
        let pending = self.pending_outgoing(address);

        debug!(
            "Balance of {}: confirmed {}, pending out {}, effective {}",
            address,
            confirmed,
            pending,
            confirmed - pending
        );

        confirmed - pending
    }

    /// A page of blocks starting at `offset`
    pub fn block_range(&self, limit: usize, offset: usize) -> &[Block] {
        if offset >= self.chain.len() {
            return &[];
        }

        let end = offset.saturating_add(limit).min(self.chain.len());
        &self.chain[offset..end]
    }

    pub fn block_by_index(&self, index: u64) -> Result<&Block, LedgerError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.chain.get(i))
            .ok_or_else(|| LedgerError::NotFound(format!("block {}", index)))
    }

    /// Finds a transaction, most recent first: the mempool, then blocks from the tip
    pub fn transaction_by_id(&self, id: &str) -> Result<&Transaction, LedgerError> {
        self.mempool
            .iter()
            .rev()
            .chain(self.chain.iter().rev().flat_map(|block| block.transactions.iter().rev()))
            .find(|tx| tx.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", id)))
    }

    /// Every transaction touching an address: pending first, then blocks newest first
    pub fn transactions_for_wallet(&self, address: &str) -> Vec<Transaction> {
        self.mempool
            .iter()
            .chain(self.chain.iter().rev().flat_map(|block| block.transactions.iter()))
            .filter(|tx| tx.involves(address))
            .cloned()
            .collect()
    }

    /// Up to `limit` recent transactions
    ///
    /// Confirmed transactions are collected from the newest block back;
    /// pending transactions are then prepended while room remains.
    pub fn latest_transactions(&self, limit: usize) -> Vec<Transaction> {
        let mut latest: Vec<Transaction> = self
            .chain
            .iter()
            .rev()
            .flat_map(|block| block.transactions.iter())
            .take(limit)
            .cloned()
            .collect();

        for tx in &self.mempool {
            if latest.len() >= limit {
                break;
            }
            latest.insert(0, tx.clone());
        }

        latest
    }
}
