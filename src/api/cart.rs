//! Cart endpoints

use alloy_primitives::U256;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{Amount, AppState};
use crate::engine::cart::{CartItemDraft, MultiCart, VoteCart, VoteCartItem};
use crate::engine::error::CartError;
use crate::engine::types::{decimal, TermId};
use crate::types::ApiResult;

#[derive(Debug, Serialize)]
pub struct CartView {
    pub subject_id: TermId,
    pub subject_name: String,
    pub items: Vec<VoteCartItem>,
    pub total: Amount,
}

impl From<&VoteCart> for CartView {
    fn from(cart: &VoteCart) -> Self {
        Self {
            subject_id: cart.subject_id,
            subject_name: cart.subject_name.clone(),
            items: cart.items.clone(),
            total: cart.total().into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartsResponse {
    pub session_id: String,
    pub carts: Vec<CartView>,
    pub item_count: usize,
    pub total: Amount,
}

impl CartsResponse {
    fn new(session_id: String, carts: &MultiCart) -> Self {
        Self {
            session_id,
            carts: carts.carts().map(CartView::from).collect(),
            item_count: carts.item_count(),
            total: carts.total().into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub subject_id: TermId,
    pub subject_name: String,
    #[serde(flatten)]
    pub item: CartItemDraft,
}

#[derive(Debug, Serialize)]
pub struct AddItemResponse {
    pub item_id: String,
    pub cart: CartView,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub subject_id: TermId,
    #[serde(with = "decimal")]
    pub amount: U256,
}

#[derive(Debug, Deserialize)]
pub struct SubjectQuery {
    pub subject_id: TermId,
}

/// GET /api/cart/:session_id - All founder carts with totals
pub async fn get_carts(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CartsResponse>> {
    let session_arc = state.session(&session_id).await?;
    let session = session_arc.read().await;
    Ok(Json(CartsResponse::new(session_id, &session.carts)))
}

/// POST /api/cart/:session_id/items - Add an item (or replace the amount of the same slot)
pub async fn add_item(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<Json<AddItemResponse>> {
    let session_arc = state.session(&session_id).await?;
    let mut session = session_arc.write().await;

    let item_id = session.add_item(req.subject_id, &req.subject_name, req.item)?;
    let cart = session
        .carts
        .get(&req.subject_id)
        .map(CartView::from)
        .ok_or(CartError::FounderNotFound(req.subject_id))?;

    tracing::debug!("session {}: added item {} for {}", session_id, item_id, req.subject_id);
    Ok(Json(AddItemResponse { item_id, cart }))
}

/// PATCH /api/cart/:session_id/items/:item_id - Change an item's amount
pub async fn update_item(
    State(state): State<AppState>,
    Path((session_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<CartsResponse>> {
    let session_arc = state.session(&session_id).await?;
    let mut session = session_arc.write().await;
    session.update_amount(&req.subject_id, &item_id, req.amount)?;
    Ok(Json(CartsResponse::new(session_id, &session.carts)))
}

/// DELETE /api/cart/:session_id/items/:item_id?subject_id=
pub async fn remove_item(
    State(state): State<AppState>,
    Path((session_id, item_id)): Path<(String, String)>,
    Query(query): Query<SubjectQuery>,
) -> ApiResult<Json<CartsResponse>> {
    let session_arc = state.session(&session_id).await?;
    let mut session = session_arc.write().await;
    session.remove_item(&query.subject_id, &item_id)?;
    Ok(Json(CartsResponse::new(session_id, &session.carts)))
}

/// POST /api/cart/:session_id/clear - Empty every founder cart
pub async fn clear_all(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CartsResponse>> {
    let session_arc = state.session(&session_id).await?;
    let mut session = session_arc.write().await;
    session.clear()?;
    Ok(Json(CartsResponse::new(session_id, &session.carts)))
}

/// POST /api/cart/:session_id/clear/:subject_id - Empty one founder's cart
pub async fn clear_founder(
    State(state): State<AppState>,
    Path((session_id, subject_id)): Path<(String, TermId)>,
) -> ApiResult<Json<CartsResponse>> {
    let session_arc = state.session(&session_id).await?;
    let mut session = session_arc.write().await;
    session.clear_founder(&subject_id)?;
    Ok(Json(CartsResponse::new(session_id, &session.carts)))
}
