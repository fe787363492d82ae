//! Vote Cart Backend
//!
//! HTTP API server that plans and executes batched attestation votes.
//! Runs against an in-memory simulated protocol seeded at startup.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vote_cart_backend::api::{self, AppState};
use vote_cart_backend::config::AppConfig;
use vote_cart_backend::engine::chain::SharedClient;
use vote_cart_backend::engine::session::{SessionManager, StoreBackend};
use vote_cart_backend::engine::transport::ThrottledClient;
use vote_cart_backend::sandbox::simulator::SimulatedProtocol;

/// Predicates every claim is made with
const PREDICATES: &[&str] = &["represented_by", "embodies"];

const FOUNDERS: &[&str] = &["Ada Lovelace", "Satoshi Nakamoto", "Grace Hopper"];

/// Totems that already stand for a founder at startup
const SEEDED_CLAIMS: &[(&str, &str, &str)] = &[
    ("Ada Lovelace", "represented_by", "Owl"),
    ("Satoshi Nakamoto", "represented_by", "Phoenix"),
    ("Grace Hopper", "embodies", "Compass"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    tracing::info!(
        "Config: slippage {} bps, batch ceiling {}, {} confirmation(s)",
        config.slippage_bps,
        config.max_batch_size,
        config.confirmations
    );

    // Simulated protocol with the shared vocabulary pre-created
    let simulator = Arc::new(SimulatedProtocol::with_defaults());
    let seeded = simulator.seed_defaults(PREDICATES, FOUNDERS);
    for (founder, predicate, totem) in SEEDED_CLAIMS {
        let s = simulator.seed_atom(founder);
        let p = simulator.seed_atom(predicate);
        let o = simulator.seed_atom(totem);
        simulator.seed_triple(s, p, o, true);
    }
    tracing::info!(
        "Simulated protocol ready: {} atoms, {} claims",
        seeded.atoms.len(),
        SEEDED_CLAIMS.len()
    );
    for (label, id) in &seeded.atoms {
        tracing::info!("  {:<18} {}", label, id);
    }

    let client: SharedClient = Arc::new(ThrottledClient::new(
        simulator.clone(),
        config.retry_policy(),
        config.min_call_interval(),
    ));

    let session_manager = Arc::new(SessionManager::new(StoreBackend::Directory {
        root: config.cart_store_dir.clone(),
        prefix: config.cart_key_prefix.clone(),
    }));
    tracing::info!("Carts persist under {}", config.cart_store_dir.display());

    let addr = config.bind_addr;
    let state = AppState::new(session_manager, client, Some(simulator), config);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api::router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    tracing::info!("Starting server on {}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET    /health                               - Health check");
    tracing::info!("  POST   /api/session                          - Open a session for a wallet");
    tracing::info!("  GET    /api/session/:id                      - Get session info");
    tracing::info!("  GET    /api/cart/:session_id                 - List founder carts");
    tracing::info!("  POST   /api/cart/:session_id/items           - Add a vote");
    tracing::info!("  PATCH  /api/cart/:session_id/items/:item_id  - Change a vote amount");
    tracing::info!("  DELETE /api/cart/:session_id/items/:item_id  - Remove a vote");
    tracing::info!("  POST   /api/cart/:session_id/clear[/:subject] - Clear carts");
    tracing::info!("  POST   /api/curves/availability              - Curves open for a vote");
    tracing::info!("  POST   /api/plan                             - Plan a founder's cart");
    tracing::info!("  POST   /api/execute                          - Execute one or all carts");
    tracing::info!("  GET    /api/balance/:session_id              - Wallet balance");
    tracing::info!("  POST   /api/faucet                           - Mint into a session wallet");
    tracing::info!("  GET    /api/config                           - Protocol costs and settings");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
