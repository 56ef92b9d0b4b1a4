use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Sender of mining reward transactions
pub const SYSTEM_ADDRESS: &str = "SYSTEM";

/// Counterparty of fiat buy/sell settlement records
pub const FIAT_ADDRESS: &str = "FIAT";

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Admitted to the mempool, not yet sealed into a block
    #[default]
    Pending,

    /// Sealed into a block
    Confirmed,
}

/// Represents a transfer of coins between two wallets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// SHA-256 digest of `sender|receiver|amount|timestamp`
    pub id: String,

    /// Sender's wallet address
    pub sender: String,

    /// Receiver's wallet address
    pub receiver: String,

    /// Amount being transferred
    pub amount: f64,

    /// Pending or confirmed
    #[serde(default)]
    pub status: TxStatus,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Base64 signature over the canonical message, if the sender signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// PEM public key the signature was checked against
    #[serde(
        default,
        rename = "pubKeyPem",
        skip_serializing_if = "Option::is_none"
    )]
    pub pub_key_pem: Option<String>,
}

impl Transaction {
    /// Creates a new pending transaction stamped with the current time
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, amount: f64) -> Self {
        Self::with_timestamp(sender, receiver, amount, Utc::now().timestamp_millis())
    }

    /// Creates a new pending transaction with an explicit timestamp
    pub fn with_timestamp(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        timestamp: i64,
    ) -> Self {
        let sender = sender.into();
        let receiver = receiver.into();
        let id = generate_id(&sender, &receiver, amount, timestamp);

        Transaction {
            id,
            sender,
            receiver,
            amount,
            status: TxStatus::Pending,
            timestamp,
            signature: None,
            pub_key_pem: None,
        }
    }

    /// Creates the mining reward transaction paid by the system to a miner
    pub fn reward(miner: impl Into<String>, amount: f64) -> Self {
        Self::new(SYSTEM_ADDRESS, miner, amount)
    }

    /// Attaches the signature and key the transaction was authorized with
    pub fn with_authorization(mut self, signature: String, pub_key_pem: String) -> Self {
        self.signature = Some(signature);
        self.pub_key_pem = Some(pub_key_pem);
        self
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender == SYSTEM_ADDRESS
    }

    #[cfg(test)]
    pub fn is_confirmed(&self) -> bool {
        self.status == TxStatus::Confirmed
    }

    /// Checks if the transaction touches the given address on either side
    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.receiver == address
    }

    /// Marks the transaction as sealed into a block
    pub(crate) fn confirm(&mut self) {
        self.status = TxStatus::Confirmed;
    }
}

/// Derives a transaction id
///
/// The id is the hex SHA-256 digest of `sender|receiver|amount|timestamp`
/// with the amount fixed to 8 decimal places. Two transfers with the same
/// parties and amount created within the same millisecond share an id.
pub fn generate_id(sender: &str, receiver: &str, amount: f64, timestamp: i64) -> String {
    let canonical = format!("{}|{}|{:.8}|{}", sender, receiver, amount, timestamp);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Builds the message a sender must sign to authorize a transfer
///
/// The amount is used exactly as the client submitted it, so the signed
/// bytes match what the client saw.
pub fn canonical_message(sender: &str, receiver: &str, amount: &str) -> String {
    format!("{}|{}|{}", sender, receiver, amount)
}
