//! API endpoints for the vote cart service

use alloy_primitives::utils::format_ether;
use alloy_primitives::U256;
use axum::{
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

mod balance;
mod cart;
mod plan;
mod session;
mod system;

use crate::config::AppConfig;
use crate::engine::chain::SharedClient;
use crate::engine::planner::BatchPlanner;
use crate::engine::session::{SessionManager, VoteSession};
use crate::sandbox::simulator::SimulatedProtocol;
use crate::types::{ApiError, ApiResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub client: SharedClient,
    pub planner: BatchPlanner,
    /// Present only when running against the in-memory chain (enables the faucet)
    pub simulator: Option<Arc<SimulatedProtocol>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        session_manager: Arc<SessionManager>,
        client: SharedClient,
        simulator: Option<Arc<SimulatedProtocol>>,
        config: AppConfig,
    ) -> Self {
        let planner = BatchPlanner::new(client.clone(), config.planner_settings());
        Self {
            session_manager,
            client,
            planner,
            simulator,
            config: Arc::new(config),
        }
    }

    /// Look up a session or answer 404
    pub(crate) async fn session(&self, id: &str) -> ApiResult<Arc<RwLock<VoteSession>>> {
        self.session_manager
            .get_session(id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))
    }
}

/// A wei amount with its human-readable form
#[derive(Debug, Clone, Serialize)]
pub struct Amount {
    pub wei: String,
    pub human: String,
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self {
            wei: value.to_string(),
            human: format_ether(value),
        }
    }
}

/// Create the API router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        // Session management
        .route("/session", post(session::create_session))
        .route("/session/:id", get(session::get_session))
        // Carts
        .route("/cart/:session_id", get(cart::get_carts))
        .route("/cart/:session_id/items", post(cart::add_item))
        .route(
            "/cart/:session_id/items/:item_id",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/cart/:session_id/clear", post(cart::clear_all))
        .route("/cart/:session_id/clear/:subject_id", post(cart::clear_founder))
        // Planning and execution
        .route("/curves/availability", post(plan::curve_availability))
        .route("/plan", post(plan::plan))
        .route("/execute", post(plan::execute))
        // Wallet operations
        .route("/balance/:session_id", get(balance::get_balance))
        .route("/faucet", post(balance::faucet))
        // Protocol costs and planner settings
        .route("/config", get(system::get_config))
        .with_state(state)
}
