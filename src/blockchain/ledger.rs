use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};

use super::block::Block;
use super::chain::{Blockchain, LedgerError, MiningJob};
use super::crypto::verify_signature;
use super::storage::LedgerStorage;
use super::transaction::{canonical_message, Transaction, FIAT_ADDRESS};
use super::wallet::WalletLedger;
use crate::config::Config;
use crate::ramp::MockRamp;

/// Sealing attempts before a repeatedly stale block is reported
pub const MAX_MINING_ATTEMPTS: usize = 3;

/// A transfer as submitted by a client, fields already extracted
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: String,
    pub receiver: String,
    /// Amount exactly as submitted; it is part of the signed message
    pub amount: String,
    pub signature: String,
    pub pub_key_pem: Option<String>,
}

/// Result of initializing a wallet for an identity
#[derive(Debug, Clone, PartialEq)]
pub struct WalletInit {
    pub address: String,
    pub balance: f64,
    pub pub_key_bound: bool,
}

/// Result of a fiat buy or sell
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub wallet: String,
    pub coin: f64,
    pub usd: f64,
    pub new_balance: f64,
}

/// The ledger service: chain, wallet ledger and their documents
///
/// Every mutating call persists the documents it touched before
/// returning. Callers sharing a `Ledger` must serialize access.
#[derive(Debug)]
pub struct Ledger {
    blockchain: Blockchain,
    wallets: WalletLedger,
    ramp: MockRamp,
    storage: Option<LedgerStorage>,
}

impl Ledger {
    /// Creates an in-memory ledger that never touches disk
    #[cfg(test)]
    pub fn in_memory(config: &Config) -> Self {
        Ledger {
            blockchain: Blockchain::new(&config.chain),
            wallets: WalletLedger::new(),
            ramp: MockRamp::new(&config.ramp),
            storage: None,
        }
    }

    /// Loads both documents from the configured paths
    ///
    /// Missing documents start a fresh chain or an empty wallet ledger and
    /// are written immediately. A broken hash link is reported, not repaired.
    pub fn open(config: &Config) -> Result<Self, LedgerError> {
        let storage = LedgerStorage::new(&config.storage.chain_path, &config.storage.wallet_path);

        let blockchain = match storage.load_chain()? {
            Some(blocks) => Blockchain::from_blocks(blocks, &config.chain),
            None => {
                info!("No chain at {}, creating genesis block", storage.chain_path().display());
                let blockchain = Blockchain::new(&config.chain);
                storage.save_chain(blockchain.blocks())?;
                blockchain
            }
        };

        let wallets = match storage.load_wallets()? {
            Some(wallets) => wallets,
            None => {
                info!("No wallets at {}, starting empty", storage.wallet_path().display());
                let wallets = WalletLedger::new();
                storage.save_wallets(&wallets)?;
                wallets
            }
        };

        if let Err(err) = blockchain.check_integrity() {
            warn!("Loaded chain failed verification: {}", err);
        }

        Ok(Ledger {
            blockchain,
            wallets,
            ramp: MockRamp::new(&config.ramp),
            storage: Some(storage),
        })
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn wallets(&self) -> &WalletLedger {
        &self.wallets
    }

    pub fn ramp(&self) -> &MockRamp {
        &self.ramp
    }

    /// Writes a candidate state, chain document first
    ///
    /// If the wallet document cannot be written the previous chain
    /// document is put back, so disk keeps matching `self`.
    fn persist(&self, blockchain: &Blockchain, wallets: &WalletLedger) -> Result<(), LedgerError> {
        let storage = match &self.storage {
            Some(storage) => storage,
            None => return Ok(()),
        };

        storage.save_chain(blockchain.blocks())?;

        if let Err(err) = storage.save_wallets(wallets) {
            if let Err(restore) = storage.save_chain(self.blockchain.blocks()) {
                error!("Failed to restore chain document after wallet write error: {}", restore);
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Persists a candidate state and adopts it only once it is on disk
    fn commit(&mut self, blockchain: Blockchain, wallets: WalletLedger) -> Result<(), LedgerError> {
        self.persist(&blockchain, &wallets)?;
        self.blockchain = blockchain;
        self.wallets = wallets;
        Ok(())
    }

    fn commit_wallets(&mut self, wallets: WalletLedger) -> Result<(), LedgerError> {
        if let Some(storage) = &self.storage {
            storage.save_wallets(&wallets)?;
        }
        self.wallets = wallets;
        Ok(())
    }

    /// Writes both documents
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.persist(&self.blockchain, &self.wallets)
    }

    /// Gets or creates the wallet of an identity, optionally binding a key
    pub fn init_wallet(&mut self, identity: &str, pub_key_pem: Option<&str>) -> Result<WalletInit, LedgerError> {
        let mut wallets = self.wallets.clone();
        let address = wallets.get_or_create(identity);

        let pub_key = pub_key_pem.filter(|pem| !pem.trim().is_empty());
        if let Some(pem) = pub_key {
            wallets.bind_public_key(&address, pem);
        }
        self.commit_wallets(wallets)?;

        Ok(WalletInit {
            balance: self.wallets.balance(&address),
            address,
            pub_key_bound: pub_key.is_some(),
        })
    }

    /// Binds or replaces the verification key of a wallet
    pub fn bind_public_key(&mut self, address: &str, pem: &str) -> Result<(), LedgerError> {
        let mut wallets = self.wallets.clone();
        wallets.bind_public_key(address, pem);
        self.commit_wallets(wallets)
    }

    /// Authenticates a transfer and admits it to the mempool
    ///
    /// Returns the admitted transaction and the sender's new effective
    /// balance.
    pub fn submit_transfer(&mut self, request: TransferRequest) -> Result<(Transaction, f64), LedgerError> {
        let amount = parse_amount(&request.amount)?;

        for address in [&request.sender, &request.receiver] {
            if !self.wallets.exists(address) {
                warn!("Rejected transfer: unknown wallet {}", address);
                return Err(LedgerError::UnknownWallet(address.clone()));
            }
        }

        if self.wallets.public_key(&request.sender).is_none() {
            if let Some(pem) = request.pub_key_pem.as_deref().filter(|pem| !pem.trim().is_empty()) {
                info!("Binding submitted public key to {}", request.sender);
                self.bind_public_key(&request.sender, pem)?;
            }
        }

        let pub_key = match self.wallets.public_key(&request.sender) {
            Some(pem) => pem.to_string(),
            None => {
                return Err(LedgerError::InvalidSignature(format!(
                    "no public key bound to {}",
                    request.sender
                )))
            }
        };

        let message = canonical_message(&request.sender, &request.receiver, &request.amount);
        if !verify_signature(&pub_key, &message, &request.signature) {
            warn!("Rejected transfer from {}: signature check failed", request.sender);
            return Err(LedgerError::InvalidSignature(format!(
                "signature does not match {}",
                message
            )));
        }

        let transaction = Transaction::new(request.sender.as_str(), request.receiver.as_str(), amount)
            .with_authorization(request.signature, pub_key);

        self.blockchain.admit(transaction.clone())?;

        let new_balance = self.blockchain.effective_balance_of(&transaction.sender);
        Ok((transaction, new_balance))
    }

    /// Snapshots the mempool into a block candidate
    ///
    /// Sealing the returned job needs no access to the ledger.
    pub fn prepare_block(&self, miner_address: &str) -> Result<MiningJob, LedgerError> {
        self.blockchain.prepare_block(miner_address)
    }

    /// Appends a sealed block once both documents are written
    pub fn commit_block(&mut self, block: Block) -> Result<Block, LedgerError> {
        let mut blockchain = self.blockchain.clone();
        let mut wallets = self.wallets.clone();
        blockchain.commit_block(block.clone(), &mut wallets)?;

        self.commit(blockchain, wallets)?;
        Ok(block)
    }

    /// Mines the mempool into a new block while holding the ledger
    #[cfg(test)]
    pub fn mine(&mut self, miner_address: &str) -> Result<Block, LedgerError> {
        let block = self.prepare_block(miner_address)?.seal()?;
        self.commit_block(block)
    }

    /// Records a fiat settlement on the chain and the wallet ledger in one commit
    fn settle(&mut self, wallet: &str, transaction: Transaction, delta: f64) -> Result<(), LedgerError> {
        let mut blockchain = self.blockchain.clone();
        let mut wallets = self.wallets.clone();

        blockchain.add_confirmed_transaction(transaction);
        wallets.update_balance(wallet, delta);

        self.commit(blockchain, wallets)
    }

    /// Charges a card and credits the equivalent coins to a wallet
    pub fn buy(&mut self, wallet: &str, usd: f64, card_number: &str) -> Result<Settlement, LedgerError> {
        if !usd.is_finite() || usd <= 0.0 {
            return Err(LedgerError::InvalidAmount(format!("invalid USD amount {}", usd)));
        }

        if !self.wallets.exists(wallet) {
            return Err(LedgerError::UnknownWallet(wallet.to_string()));
        }

        if !self.ramp.charge_card(card_number, usd) {
            return Err(LedgerError::PaymentDeclined("card charge failed".to_string()));
        }

        let coin = self.ramp.usd_to_coin(usd);
        self.settle(wallet, Transaction::new(FIAT_ADDRESS, wallet, coin), coin)?;

        Ok(Settlement {
            wallet: wallet.to_string(),
            coin,
            usd,
            new_balance: self.wallets.balance(wallet),
        })
    }

    /// Pays out the USD value of coins and debits them from a wallet
    pub fn sell(&mut self, wallet: &str, coin: f64, bank_account: &str) -> Result<Settlement, LedgerError> {
        if !coin.is_finite() || coin <= 0.0 {
            return Err(LedgerError::InvalidAmount(format!("invalid coin amount {}", coin)));
        }

        if !self.wallets.exists(wallet) {
            return Err(LedgerError::UnknownWallet(wallet.to_string()));
        }

        let available = self.blockchain.effective_balance_of(wallet);
        if available < coin {
            return Err(LedgerError::InsufficientFunds {
                required: coin,
                available,
            });
        }

        let usd = self.ramp.coin_to_usd(coin);
        if !self.ramp.send_to_bank(bank_account, usd) {
            return Err(LedgerError::PaymentDeclined("bank payout failed".to_string()));
        }

        self.settle(wallet, Transaction::new(wallet, FIAT_ADDRESS, coin), -coin)?;

        Ok(Settlement {
            wallet: wallet.to_string(),
            coin,
            usd,
            new_balance: self.wallets.balance(wallet),
        })
    }
}

/// Locks a shared ledger, recovering the state if a holder panicked
pub fn lock(ledger: &Mutex<Ledger>) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mines against a shared ledger without holding it while sealing
///
/// The lock is taken to snapshot the mempool and again to commit. A block
/// that went stale in between is mined again, up to `MAX_MINING_ATTEMPTS`
/// times.
pub fn mine_shared(ledger: &Mutex<Ledger>, miner_address: &str) -> Result<Block, LedgerError> {
    let mut attempt = 1;

    loop {
        let job = lock(ledger).prepare_block(miner_address)?;
        let block = job.seal()?;

        let committed = lock(ledger).commit_block(block);
        match committed {
            Err(LedgerError::StaleBlock { index }) if attempt < MAX_MINING_ATTEMPTS => {
                info!("Block {} went stale, mining again (attempt {})", index, attempt + 1);
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn parse_amount(raw: &str) -> Result<f64, LedgerError> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(format!("'{}' is not a number", raw)))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(LedgerError::InvalidAmount(format!("amount must be positive, got {}", raw)));
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::KeyPair;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.chain.difficulty = 1;
        config.storage.chain_path = dir.path().join("blockchain.json");
        config.storage.wallet_path = dir.path().join("wallets.json");
        config
    }

    fn transfer(keys: &KeyPair, sender: &str, receiver: &str, amount: &str) -> TransferRequest {
        TransferRequest {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount: amount.to_string(),
            signature: keys.sign(&canonical_message(sender, receiver, amount)),
            pub_key_pem: None,
        }
    }

    /// Ledger with a funded sender "a" (100 coins, key bound) and receiver "b"
    fn funded_ledger(config: &Config) -> (Ledger, KeyPair, String, String) {
        let mut ledger = Ledger::open(config).unwrap();
        let keys = KeyPair::generate();
        let pem = keys.public_key_pem().unwrap();

        let a = ledger.init_wallet("a", Some(&pem)).unwrap().address;
        let b = ledger.init_wallet("b", None).unwrap().address;
        ledger.buy(&a, 1000.0, "4242-4242-4242-4242").unwrap();

        (ledger, keys, a, b)
    }

    #[test]
    fn test_open_creates_documents() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let ledger = Ledger::open(&config).unwrap();

        assert!(config.storage.chain_path.exists());
        assert!(config.storage.wallet_path.exists());
        assert_eq!(ledger.blockchain().len(), 1);
    }

    #[test]
    fn test_submit_and_mine() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);

        assert_eq!(ledger.blockchain().balance_of(&a), 100.0);

        let (tx, new_balance) = ledger.submit_transfer(transfer(&keys, &a, &b, "40")).unwrap();
        assert_eq!(new_balance, 60.0);
        assert_eq!(tx.amount, 40.0);
        assert!(tx.signature.is_some());
        assert!(tx.pub_key_pem.is_some());

        let block = ledger.mine(&b).unwrap();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(ledger.blockchain().balance_of(&a), 60.0);
        assert_eq!(ledger.blockchain().balance_of(&b), 42.0);
        assert_eq!(ledger.wallets().balance(&a), 60.0);
    }

    #[test]
    fn test_raw_signature_accepted() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);

        let mut request = transfer(&keys, &a, &b, "12.5");
        request.signature = keys.sign_raw(&canonical_message(&a, &b, "12.5"));

        assert!(ledger.submit_transfer(request).is_ok());
    }

    #[test]
    fn test_rejections() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);

        let unknown = ledger.submit_transfer(transfer(&keys, &a, "WALLET_000000", "1"));
        assert!(matches!(unknown, Err(LedgerError::UnknownWallet(w)) if w == "WALLET_000000"));

        let forged = ledger.submit_transfer(transfer(&KeyPair::generate(), &a, &b, "1"));
        assert!(matches!(forged, Err(LedgerError::InvalidSignature(_))));

        // signed "1" but submitted "1.0"
        let mut altered = transfer(&keys, &a, &b, "1");
        altered.amount = "1.0".to_string();
        assert!(matches!(ledger.submit_transfer(altered), Err(LedgerError::InvalidSignature(_))));

        let unbound = ledger.submit_transfer(transfer(&keys, &b, &a, "1"));
        assert!(matches!(unbound, Err(LedgerError::InvalidSignature(_))));

        let too_much = ledger.submit_transfer(transfer(&keys, &a, &b, "100.5"));
        assert!(matches!(too_much, Err(LedgerError::InsufficientFunds { .. })));

        for bad in ["abc", "0", "-5", "NaN", "inf"] {
            let result = ledger.submit_transfer(transfer(&keys, &a, &b, bad));
            assert!(matches!(result, Err(LedgerError::InvalidAmount(_))), "accepted {}", bad);
        }

        assert!(ledger.blockchain().mempool().is_empty());
    }

    #[test]
    fn test_submitted_key_is_bound_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, _, a, b) = funded_ledger(&config);
        let keys = KeyPair::generate();
        let pem = keys.public_key_pem().unwrap();

        // b has no key yet; the submitted one is bound
        let mut request = transfer(&keys, &b, &a, "1");
        request.pub_key_pem = Some(pem.clone());
        let result = ledger.submit_transfer(request);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.wallets().public_key(&b), Some(pem.as_str()));

        // a already has a key; a different submitted key is ignored
        let intruder = KeyPair::generate();
        let mut request = transfer(&intruder, &a, &b, "1");
        request.pub_key_pem = Some(intruder.public_key_pem().unwrap());
        assert!(matches!(ledger.submit_transfer(request), Err(LedgerError::InvalidSignature(_))));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);
        ledger.submit_transfer(transfer(&keys, &a, &b, "25.125")).unwrap();
        ledger.mine(&b).unwrap();

        let reopened = Ledger::open(&config).unwrap();

        assert_eq!(reopened.blockchain().blocks(), ledger.blockchain().blocks());
        assert_eq!(reopened.wallets(), ledger.wallets());
        assert!(reopened.blockchain().is_valid());
        for address in [&a, &b] {
            assert_eq!(
                reopened.blockchain().balance_of(address),
                ledger.blockchain().balance_of(address)
            );
        }
        assert_eq!(reopened.wallets().wallet_of("a"), Some(a.as_str()));
    }

    #[test]
    fn test_buy_and_sell() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, _, a, _) = funded_ledger(&config);

        let declined = ledger.buy(&a, 10.0, "4000-0000-0000-0000");
        assert!(matches!(declined, Err(LedgerError::PaymentDeclined(_))));
        assert!(matches!(ledger.buy(&a, 10.0, ""), Err(LedgerError::PaymentDeclined(_))));
        assert!(matches!(ledger.buy("WALLET_000000", 10.0, "4242"), Err(LedgerError::UnknownWallet(_))));
        assert!(matches!(ledger.buy(&a, -1.0, "4242"), Err(LedgerError::InvalidAmount(_))));

        let sold = ledger.sell(&a, 30.0, "DE89370400440532013000").unwrap();
        assert!((sold.usd - 300.0).abs() < 1e-9);
        assert_eq!(sold.new_balance, 70.0);
        assert_eq!(ledger.blockchain().balance_of(&a), 70.0);

        let oversell = ledger.sell(&a, 70.5, "DE89370400440532013000");
        assert!(matches!(oversell, Err(LedgerError::InsufficientFunds { .. })));
        assert!(matches!(ledger.sell(&a, 1.0, ""), Err(LedgerError::PaymentDeclined(_))));
        assert!(ledger.blockchain().is_valid());
    }

    /// A directory squatting on the temp path makes the next write fail
    fn block_writes(path: &std::path::Path) -> std::path::PathBuf {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::create_dir(&tmp).unwrap();
        tmp
    }

    fn stored_chain_len(config: &Config) -> usize {
        LedgerStorage::new(&config.storage.chain_path, &config.storage.wallet_path)
            .load_chain()
            .unwrap()
            .unwrap()
            .len()
    }

    #[test]
    fn test_failed_chain_write_leaves_ledger_unchanged() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);
        ledger.submit_transfer(transfer(&keys, &a, &b, "40")).unwrap();
        let chain_before = ledger.blockchain().blocks().to_vec();
        let wallets_before = ledger.wallets().clone();

        let blocker = block_writes(&config.storage.chain_path);
        let result = ledger.mine(&b);

        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_eq!(ledger.blockchain().blocks(), chain_before.as_slice());
        assert_eq!(ledger.blockchain().mempool().len(), 1);
        assert_eq!(ledger.wallets(), &wallets_before);
        assert_eq!(stored_chain_len(&config), chain_before.len());

        std::fs::remove_dir(blocker).unwrap();
        ledger.mine(&b).unwrap();
        assert_eq!(ledger.wallets().balance(&b), 42.0);
        assert_eq!(stored_chain_len(&config), chain_before.len() + 1);
    }

    #[test]
    fn test_failed_wallet_write_restores_chain_document() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);
        ledger.submit_transfer(transfer(&keys, &a, &b, "40")).unwrap();
        let len_before = ledger.blockchain().len();

        block_writes(&config.storage.wallet_path);
        assert!(matches!(ledger.mine(&b), Err(LedgerError::Storage(_))));

        assert_eq!(ledger.blockchain().len(), len_before);
        assert_eq!(ledger.blockchain().mempool().len(), 1);
        assert_eq!(stored_chain_len(&config), len_before);
    }

    #[test]
    fn test_failed_settlement_write_keeps_balances() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, _, a, _) = funded_ledger(&config);
        let len_before = ledger.blockchain().len();

        block_writes(&config.storage.chain_path);

        assert!(matches!(
            ledger.buy(&a, 10.0, "4242-4242-4242-4242"),
            Err(LedgerError::Storage(_))
        ));
        assert!(matches!(
            ledger.sell(&a, 10.0, "DE89370400440532013000"),
            Err(LedgerError::Storage(_))
        ));
        assert_eq!(ledger.blockchain().len(), len_before);
        assert_eq!(ledger.wallets().balance(&a), 100.0);
        assert_eq!(ledger.blockchain().balance_of(&a), 100.0);

        let reopened = Ledger::open(&config).unwrap();
        assert_eq!(reopened.wallets().balance(&a), 100.0);
        assert_eq!(reopened.blockchain().balance_of(&a), 100.0);
    }

    #[test]
    fn test_open_reports_tampered_chain() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (mut ledger, keys, a, b) = funded_ledger(&config);
        ledger.submit_transfer(transfer(&keys, &a, &b, "40")).unwrap();
        ledger.mine(&b).unwrap();
        drop(ledger);

        let raw = std::fs::read_to_string(&config.storage.chain_path).unwrap();
        let mut document: serde_json::Value = serde_json::from_str(&raw).unwrap();
        document[2]["transactions"][0]["amount"] = serde_json::json!(4.0);
        std::fs::write(&config.storage.chain_path, document.to_string()).unwrap();

        let reopened = Ledger::open(&config).unwrap();

        assert_eq!(reopened.blockchain().len(), 3);
        assert!(!reopened.blockchain().is_valid());
        assert!(matches!(
            reopened.blockchain().check_integrity(),
            Err(LedgerError::ChainIntegrityViolation { index: 2 })
        ));
    }

    #[test]
    fn test_shared_mining_releases_lock_while_sealing() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        let (ledger, keys, a, b) = funded_ledger(&config);
        drop(ledger);

        // stored blocks are not resealed, so only the next block pays for this
        config.chain.difficulty = 64;
        config.chain.mining_deadline_ms = Some(1500);
        let mut ledger = Ledger::open(&config).unwrap();
        ledger.submit_transfer(transfer(&keys, &a, &b, "40")).unwrap();
        let shared = std::sync::Arc::new(Mutex::new(ledger));

        let miner = std::sync::Arc::clone(&shared);
        let miner_address = b.clone();
        let handle = std::thread::spawn(move || mine_shared(&miner, &miner_address));
        std::thread::sleep(std::time::Duration::from_millis(100));

        {
            let ledger = shared.try_lock().unwrap();
            assert_eq!(ledger.blockchain().mempool().len(), 1);
        }

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(LedgerError::MiningTimeout(_))));
        assert_eq!(lock(&shared).blockchain().mempool().len(), 1);
        assert_eq!(lock(&shared).blockchain().len(), 2);
    }

    #[test]
    fn test_in_memory_ledger_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let mut ledger = Ledger::in_memory(&config);

        ledger.init_wallet("a", None).unwrap();
        ledger.flush().unwrap();

        assert!(!config.storage.chain_path.exists());
        assert!(!config.storage.wallet_path.exists());
    }
}
