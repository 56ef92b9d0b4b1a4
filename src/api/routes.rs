use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/mempool", web::get().to(handlers::get_mempool))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/transactions/latest", web::get().to(handlers::get_latest_transactions))
            .route("/mine", web::post().to(handlers::mine_block))
            .route("/balance/{address}", web::get().to(handlers::get_balance))
            .route("/wallet/init", web::post().to(handlers::init_wallet))
            .route("/wallet/balance/{address}", web::get().to(handlers::get_wallet_balance))
            .route("/wallet/{address}/history", web::get().to(handlers::get_wallet_history))
            .route("/blocks", web::get().to(handlers::get_blocks))
            .route("/blocks/{index}", web::get().to(handlers::get_block))
            .route("/tx/{id}", web::get().to(handlers::get_transaction))
            .route("/buy", web::post().to(handlers::buy))
            .route("/sell", web::post().to(handlers::sell))
            .route("/keys/new", web::post().to(handlers::create_keypair))
    );
}
