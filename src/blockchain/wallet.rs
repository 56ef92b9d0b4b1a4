use std::collections::BTreeMap;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix of every address the wallet ledger allocates
pub const WALLET_PREFIX: &str = "WALLET_";

/// Maps external identities to wallets, and wallets to balances and keys
///
/// Serializes directly as the wallet document:
/// `{users, balances, pubkeys}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletLedger {
    /// External identity to wallet address
    #[serde(default)]
    users: BTreeMap<String, String>,

    /// Wallet address to stored balance
    #[serde(default)]
    balances: BTreeMap<String, f64>,

    /// Wallet address to bound PEM public key
    #[serde(default)]
    pubkeys: BTreeMap<String, String>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the wallet for an identity, allocating one on first request
    pub fn get_or_create(&mut self, identity: &str) -> String {
        if let Some(address) = self.wallet_of(identity) {
            return address.to_string();
        }

        let address = self.generate_address();
        self.users.insert(identity.to_string(), address.clone());
        self.balances.insert(address.clone(), 0.0);

        info!("Created wallet {} for user {}", address, identity);
        address
    }

    /// Gets the wallet already allocated to an identity
    pub fn wallet_of(&self, identity: &str) -> Option<&str> {
        self.users.get(identity).map(String::as_str)
    }

    /// Draws `WALLET_` plus six digits until an unused address is found
    fn generate_address(&self) -> String {
        let mut rng = rand::thread_rng();

        loop {
            let candidate = format!("{}{}", WALLET_PREFIX, rng.gen_range(100_000..=999_999));
            if !self.balances.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Gets the stored balance, zero for unknown addresses
    pub fn balance(&self, address: &str) -> f64 {
        self.balances.get(address).copied().unwrap_or(0.0)
    }

    /// Adjusts the stored balance by `delta`
    ///
    /// No non-negativity check; unknown addresses are created.
    pub fn update_balance(&mut self, address: &str, delta: f64) {
        *self.balances.entry(address.to_string()).or_insert(0.0) += delta;
    }

    pub fn credit(&mut self, address: &str, amount: f64) {
        self.update_balance(address, amount);
    }

    pub fn debit(&mut self, address: &str, amount: f64) {
        self.update_balance(address, -amount);
    }

    /// Checks the address follows the wallet format and has a balance entry
    pub fn exists(&self, address: &str) -> bool {
        address.starts_with(WALLET_PREFIX) && self.balances.contains_key(address)
    }

    /// Binds or replaces the verification key of an address
    ///
    /// Carriage returns are stripped. Creates the address with a zero
    /// balance if it was not known.
    pub fn bind_public_key(&mut self, address: &str, pem: &str) {
        self.balances.entry(address.to_string()).or_insert(0.0);
        self.pubkeys.insert(address.to_string(), strip_carriage_returns(pem));
    }

    pub fn public_key(&self, address: &str) -> Option<&str> {
        self.pubkeys.get(address).map(String::as_str)
    }

    /// All addresses with a balance entry
    #[cfg(test)]
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.balances.keys().map(String::as_str)
    }

    /// Re-applies normalization to keys read from an older document
    pub(crate) fn normalize_keys(&mut self) {
        for pem in self.pubkeys.values_mut() {
            *pem = strip_carriage_returns(pem);
        }
    }
}

fn strip_carriage_returns(pem: &str) -> String {
    pem.chars().filter(|&c| c != '\r').collect()
}
