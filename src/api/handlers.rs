use std::sync::Mutex;

use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::ledger::{lock, mine_shared};
use crate::blockchain::{Block, KeyPair, Ledger, LedgerError, Transaction, TransferRequest};

/// Shared ledger state; one lock serializes every mutation
pub type LedgerData = web::Data<Mutex<Ledger>>;

/// Maps a ledger error to a JSON failure response
fn error_response(err: &LedgerError) -> HttpResponse {
    let body = serde_json::json!({
        "success": false,
        "message": err.to_string(),
    });

    match err {
        LedgerError::NotFound(_) => HttpResponse::NotFound().json(body),
        LedgerError::Storage(_) => {
            error!("Storage failure: {}", err);
            HttpResponse::InternalServerError().json(body)
        }
        _ => HttpResponse::BadRequest().json(body),
    }
}

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(ledger: LedgerData) -> impl Responder {
    let ledger = lock(&ledger);
    let blockchain = ledger.blockchain();

    HttpResponse::Ok().json(ChainResponse {
        length: blockchain.len(),
        chain: blockchain.blocks().to_vec(),
        is_valid: blockchain.is_valid(),
    })
}

/// Check if the blockchain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    HttpResponse::Ok().json(lock(&ledger).blockchain().is_valid())
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/mempool",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = [Transaction])
    )
)]
pub async fn get_mempool(ledger: LedgerData) -> impl Responder {
    let mempool: Vec<Transaction> = lock(&ledger).blockchain().mempool().to_vec();
    HttpResponse::Ok().json(mempool)
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's wallet address
    pub sender: String,

    /// The receiver's wallet address
    pub receiver: String,

    /// The amount, exactly as it was signed
    pub amount: String,

    /// Base64 ECDSA P-256 signature over `sender|receiver|amount`
    pub signature: String,

    /// Public key to bind if the sender has none yet
    #[serde(default, rename = "pubKeyPem")]
    pub pub_key_pem: Option<String>,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,

    /// The sender's effective balance after admission
    pub new_balance: f64,
}

/// Submit a signed transaction
///
/// Verifies the signature and admits the transaction to the mempool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction added to the mempool", body = TransactionResponse),
        (status = 400, description = "Unknown wallet, invalid signature or insufficient funds")
    )
)]
pub async fn new_transaction(ledger: LedgerData, req: web::Json<TransactionRequest>) -> impl Responder {
    let req = req.into_inner();
    let request = TransferRequest {
        sender: req.sender,
        receiver: req.receiver,
        amount: req.amount,
        signature: req.signature,
        pub_key_pem: req.pub_key_pem,
    };

    match lock(&ledger).submit_transfer(request) {
        Ok((transaction, new_balance)) => HttpResponse::Created().json(TransactionResponse {
            success: true,
            message: "Transaction added successfully".to_string(),
            transaction_id: transaction.id,
            new_balance,
        }),
        Err(err) => error_response(&err),
    }
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The miner's address
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub success: bool,
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Mine a new block
///
/// Seals every pending transaction plus the miner's reward into a block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "No pending transactions, or mining timed out"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(ledger: LedgerData, req: web::Json<MineRequest>) -> impl Responder {
    let miner_address = req.into_inner().miner_address;

    // proof of work is CPU bound; keep it off the async workers
    let mined = web::block(move || mine_shared(&ledger, &miner_address)).await;

    match mined {
        Ok(Ok(block)) => HttpResponse::Ok().json(MineResponse {
            success: true,
            message: "Block mined successfully".to_string(),
            block,
        }),
        Ok(Err(err)) => error_response(&err),
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Mining task failed",
            }))
        }
    }
}

/// Chain-derived balance of a wallet
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub success: bool,
    pub wallet_address: String,

    /// Sum of confirmed transactions
    pub balance: f64,

    /// Confirmed balance minus pending outgoing amounts
    pub effective_balance: f64,
}

/// Get the confirmed balance of a wallet
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Balance computed from the chain", body = BalanceResponse)
    )
)]
pub async fn get_balance(ledger: LedgerData, address: web::Path<String>) -> impl Responder {
    let address = address.into_inner();
    let ledger = lock(&ledger);
    let blockchain = ledger.blockchain();

    HttpResponse::Ok().json(BalanceResponse {
        success: true,
        balance: blockchain.balance_of(&address),
        effective_balance: blockchain.effective_balance_of(&address),
        wallet_address: address,
    })
}

/// Request for the wallet init endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletInitRequest {
    /// External user identity
    pub user_id: String,

    /// Public key to bind to the wallet
    #[serde(default, rename = "pubKeyPem")]
    pub pub_key_pem: Option<String>,
}

/// Response for the wallet init endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletInitResponse {
    pub success: bool,
    pub wallet: String,
    pub balance: f64,

    /// Coins credited per US dollar
    #[serde(rename = "basePrice")]
    pub base_price: f64,

    #[serde(rename = "pubKeyBound")]
    pub pub_key_bound: bool,
}

/// Get or create the wallet of a user
#[utoipa::path(
    post,
    path = "/api/v1/wallet/init",
    request_body = WalletInitRequest,
    responses(
        (status = 200, description = "Wallet ready", body = WalletInitResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn init_wallet(ledger: LedgerData, req: web::Json<WalletInitRequest>) -> impl Responder {
    let mut ledger = lock(&ledger);

    match ledger.init_wallet(&req.user_id, req.pub_key_pem.as_deref()) {
        Ok(init) => HttpResponse::Ok().json(WalletInitResponse {
            success: true,
            wallet: init.address,
            balance: init.balance,
            base_price: ledger.ramp().coin_per_usd(),
            pub_key_bound: init.pub_key_bound,
        }),
        Err(err) => error_response(&err),
    }
}

/// Get the stored wallet ledger balance
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{address}",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Stored wallet balance")
    )
)]
pub async fn get_wallet_balance(ledger: LedgerData, address: web::Path<String>) -> impl Responder {
    let balance = lock(&ledger).wallets().balance(&address);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "balance": balance,
    }))
}

/// Get every transaction touching a wallet, newest first
#[utoipa::path(
    get,
    path = "/api/v1/wallet/{address}/history",
    params(
        ("address" = String, Path, description = "Wallet address")
    ),
    responses(
        (status = 200, description = "Pending transactions first, then confirmed ones newest first")
    )
)]
pub async fn get_wallet_history(ledger: LedgerData, address: web::Path<String>) -> impl Responder {
    let transactions = lock(&ledger).blockchain().transactions_for_wallet(&address);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "transactions": transactions,
    }))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlocksQuery {
    /// Maximum number of blocks (default 50)
    pub limit: Option<usize>,

    /// Index of the first block (default 0)
    pub offset: Option<usize>,
}

/// Get a page of blocks
#[utoipa::path(
    get,
    path = "/api/v1/blocks",
    params(BlocksQuery),
    responses(
        (status = 200, description = "Blocks in index order", body = [Block])
    )
)]
pub async fn get_blocks(ledger: LedgerData, query: web::Query<BlocksQuery>) -> impl Responder {
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    HttpResponse::Ok().json(lock(&ledger).blockchain().block_range(limit, offset))
}

/// Get a block by index
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index}",
    params(
        ("index" = u64, Path, description = "Block index")
    ),
    responses(
        (status = 200, description = "The block", body = Block),
        (status = 404, description = "No block at that index")
    )
)]
pub async fn get_block(ledger: LedgerData, index: web::Path<u64>) -> impl Responder {
    match lock(&ledger).blockchain().block_by_index(index.into_inner()) {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(err) => error_response(&err),
    }
}

/// Get a transaction by id
#[utoipa::path(
    get,
    path = "/api/v1/tx/{id}",
    params(
        ("id" = String, Path, description = "Transaction id")
    ),
    responses(
        (status = 200, description = "The transaction", body = Transaction),
        (status = 404, description = "No transaction with that id")
    )
)]
pub async fn get_transaction(ledger: LedgerData, id: web::Path<String>) -> impl Responder {
    match lock(&ledger).blockchain().transaction_by_id(&id) {
        Ok(transaction) => HttpResponse::Ok().json(transaction),
        Err(err) => error_response(&err),
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestQuery {
    /// Maximum number of transactions (default 20)
    pub limit: Option<usize>,
}

/// Get the latest transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/latest",
    params(LatestQuery),
    responses(
        (status = 200, description = "Pending transactions, then confirmed ones newest first", body = [Transaction])
    )
)]
pub async fn get_latest_transactions(ledger: LedgerData, query: web::Query<LatestQuery>) -> impl Responder {
    let limit = query.limit.unwrap_or(20);
    HttpResponse::Ok().json(lock(&ledger).blockchain().latest_transactions(limit))
}

/// Request for the buy endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BuyRequest {
    pub wallet: String,
    pub usd: f64,
    #[serde(rename = "cardNumber")]
    pub card_number: String,
}

/// Response for the buy endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BuyResponse {
    pub success: bool,
    pub message: String,
    pub wallet: String,
    pub credited: f64,
    pub usd_charged: f64,
    pub new_balance: f64,
}

/// Buy coins with a (mock) card payment
#[utoipa::path(
    post,
    path = "/api/v1/buy",
    request_body = BuyRequest,
    responses(
        (status = 200, description = "Coins credited", body = BuyResponse),
        (status = 400, description = "Invalid amount, unknown wallet or declined card")
    )
)]
pub async fn buy(ledger: LedgerData, req: web::Json<BuyRequest>) -> impl Responder {
    match lock(&ledger).buy(&req.wallet, req.usd, &req.card_number) {
        Ok(settlement) => HttpResponse::Ok().json(BuyResponse {
            success: true,
            message: "Purchase successful (mock)".to_string(),
            wallet: settlement.wallet,
            credited: settlement.coin,
            usd_charged: settlement.usd,
            new_balance: settlement.new_balance,
        }),
        Err(err) => error_response(&err),
    }
}

/// Request for the sell endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SellRequest {
    pub wallet: String,
    pub amount: f64,
    #[serde(rename = "bankAccount")]
    pub bank_account: String,
}

/// Response for the sell endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SellResponse {
    pub success: bool,
    pub message: String,
    pub wallet: String,
    pub debited: f64,
    pub usd_sent: f64,
    pub new_balance: f64,
}

/// Sell coins for a (mock) bank payout
#[utoipa::path(
    post,
    path = "/api/v1/sell",
    request_body = SellRequest,
    responses(
        (status = 200, description = "Coins debited", body = SellResponse),
        (status = 400, description = "Invalid amount, unknown wallet, insufficient funds or failed payout")
    )
)]
pub async fn sell(ledger: LedgerData, req: web::Json<SellRequest>) -> impl Responder {
    match lock(&ledger).sell(&req.wallet, req.amount, &req.bank_account) {
        Ok(settlement) => HttpResponse::Ok().json(SellResponse {
            success: true,
            message: "Sell executed (mock)".to_string(),
            wallet: settlement.wallet,
            debited: settlement.coin,
            usd_sent: settlement.usd,
            new_balance: settlement.new_balance,
        }),
        Err(err) => error_response(&err),
    }
}

/// Response for the key generation endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct KeyPairResponse {
    /// SPKI PEM public key to bind to a wallet
    #[serde(rename = "pubKeyPem")]
    pub pub_key_pem: String,

    /// The private scalar (hex encoded)
    pub private_key: String,
}

/// Generate a signing keypair
///
/// Creates a new random P-256 keypair for clients without native crypto
///
/// The private key is returned once and never stored by the node
#[utoipa::path(
    post,
    path = "/api/v1/keys/new",
    responses(
        (status = 201, description = "Keypair created successfully", body = KeyPairResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_keypair() -> impl Responder {
    let keys = KeyPair::generate();

    match keys.public_key_pem() {
        Ok(pub_key_pem) => HttpResponse::Created().json(KeyPairResponse {
            pub_key_pem,
            private_key: hex::encode(keys.export_secret_key()),
        }),
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "message": format!("Failed to create keypair: {}", err),
        })),
    }
}
