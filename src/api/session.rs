//! Session management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{Amount, AppState};
use crate::engine::types::Owner;
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub owner: Owner,
    pub created_at: u64,
    pub founders: usize,
    pub items: usize,
    pub cart_total: Amount,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub owner: Owner,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// POST /api/session - Open a session for a wallet, restoring its saved carts
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session_id = state
        .session_manager
        .create_session(req.owner)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create session: {}", e)))?;

    let session_arc = state.session(&session_id).await?;
    let session = session_arc.read().await;

    Ok(Json(SessionResponse {
        session_id,
        owner: session.owner,
        created_at: unix_now(),
        founders: session.carts.founders().len(),
        items: session.carts.item_count(),
        cart_total: session.carts.total().into(),
    }))
}

/// GET /api/session/:id - Get session info
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session_arc = state.session(&id).await?;
    let session = session_arc.read().await;

    let elapsed_secs = session.created_at.elapsed().as_secs();

    Ok(Json(SessionResponse {
        session_id: id,
        owner: session.owner,
        created_at: unix_now().saturating_sub(elapsed_secs),
        founders: session.carts.founders().len(),
        items: session.carts.item_count(),
        cart_total: session.carts.total().into(),
    }))
}
