use std::sync::{Mutex, PoisonError};

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use anyhow::Context;
use log::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;
mod ramp;

use blockchain::Ledger;
use config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::validate_chain,
        api::handlers::get_mempool,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::get_balance,
        api::handlers::init_wallet,
        api::handlers::get_wallet_balance,
        api::handlers::get_wallet_history,
        api::handlers::get_blocks,
        api::handlers::get_block,
        api::handlers::get_transaction,
        api::handlers::get_latest_transactions,
        api::handlers::buy,
        api::handlers::sell,
        api::handlers::create_keypair
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::TxStatus,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineRequest,
            api::handlers::MineResponse,
            api::handlers::BalanceResponse,
            api::handlers::WalletInitRequest,
            api::handlers::WalletInitResponse,
            api::handlers::BuyRequest,
            api::handlers::BuyResponse,
            api::handlers::SellRequest,
            api::handlers::SellResponse,
            api::handlers::KeyPairResponse
        )
    ),
    tags(
        (name = "ledger", description = "Coin ledger API endpoints")
    ),
    info(
        title = "Coin Ledger API",
        version = "1.0.0",
        description = "A single-node proof of work coin ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().context("failed to load configuration")?;

    let ledger = Ledger::open(&config).context("failed to open ledger documents")?;
    info!(
        "Loaded chain of {} blocks (difficulty {}, reward {})",
        ledger.blockchain().len(),
        ledger.blockchain().difficulty(),
        ledger.blockchain().mining_reward()
    );
    let ledger = web::Data::new(Mutex::new(ledger));

    let host = config.server.host.clone();
    let port = config.server.port;
    let client_url = config.server.client_url.clone();

    info!("Starting HTTP server at http://{}:{}", host, port);

    let app_ledger = ledger.clone();
    HttpServer::new(move || {
        // Only the configured client may call the API from a browser
        let cors = Cors::default()
            .allowed_origin(&client_url)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(app_ledger.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("failed to bind {}:{}", host, port))?
    .run()
    .await?;

    let ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
    match ledger.flush() {
        Ok(()) => info!("Ledger documents flushed"),
        Err(err) => error!("Failed to flush ledger documents: {}", err),
    }

    Ok(())
}
