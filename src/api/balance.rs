//! Balance and faucet endpoints

use alloy_primitives::U256;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{Amount, AppState};
use crate::engine::types::{decimal, Owner};
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub session_id: String,
    pub owner: Owner,
    pub balance: Amount,
    /// What the session's carts would deposit, before protocol costs
    pub cart_total: Amount,
}

#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub session_id: String,
    /// Amount in wei
    #[serde(with = "decimal")]
    pub amount: U256,
}

#[derive(Debug, Serialize)]
pub struct FaucetResponse {
    pub success: bool,
    pub new_balance: Amount,
}

/// GET /api/balance/:session_id - Wallet balance for a session
pub async fn get_balance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let session_arc = state.session(&session_id).await?;
    let (owner, cart_total) = {
        let session = session_arc.read().await;
        (session.owner, session.carts.total())
    };

    let balance = state.client.balance_of(owner).await?;

    Ok(Json(BalanceResponse {
        session_id,
        owner,
        balance: balance.into(),
        cart_total: cart_total.into(),
    }))
}

/// POST /api/faucet - Mint native tokens to a session wallet (simulated chain only)
pub async fn faucet(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> ApiResult<Json<FaucetResponse>> {
    let simulator = state
        .simulator
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Faucet is only available on the simulated chain".into()))?;

    if req.amount.is_zero() {
        return Err(ApiError::BadRequest("Faucet amount must be positive".into()));
    }

    let owner = state.session(&req.session_id).await?.read().await.owner;
    let new_balance = simulator.mint(owner, req.amount);
    tracing::info!("Faucet: minted {} wei to {}", req.amount, owner);

    Ok(Json(FaucetResponse {
        success: true,
        new_balance: new_balance.into(),
    }))
}
