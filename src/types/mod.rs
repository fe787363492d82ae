//! Shared types and error handling

use alloy_primitives::utils::format_ether;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::engine::error::{
    CartError, ExecutionError, PlanError, StoreError, TransportError, ValidationError,
};

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is valid but contradicts chain state (e.g. claim exists)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Insufficient balance: {message}")]
    InsufficientBalance {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict { .. } => (StatusCode::CONFLICT, "CLAIM_EXISTS"),
            ApiError::InsufficientBalance { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_BALANCE")
            }
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let error = self.to_string();
        let details = match self {
            ApiError::Conflict { details, .. } | ApiError::InsufficientBalance { details, .. } => {
                details
            }
            _ => None,
        };

        let body = Json(ErrorResponse {
            error,
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(format!("Cart store failed: {}", e))
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<PlanError> for ApiError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Validation(v) => v.into(),
            PlanError::ClaimExists {
                subject_id,
                predicate_id,
                object_id,
                triple_id,
            } => ApiError::Conflict {
                message: format!("claim already exists as triple {}", triple_id),
                details: Some(serde_json::json!({
                    "subject_id": subject_id,
                    "predicate_id": predicate_id,
                    "object_id": object_id,
                    "triple_id": triple_id,
                })),
            },
            PlanError::InsufficientBalance {
                required,
                available,
                deficit,
            } => ApiError::InsufficientBalance {
                message: format!(
                    "need {} ETH, have {} ETH",
                    format_ether(required),
                    format_ether(available)
                ),
                details: Some(serde_json::json!({
                    "required": required.to_string(),
                    "available": available.to_string(),
                    "deficit": deficit.to_string(),
                    "deficit_human": format_ether(deficit),
                })),
            },
            PlanError::Transport(t) => t.into(),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound(_) | CartError::FounderNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            CartError::Validation(v) => v.into(),
            CartError::Store(s) => s.into(),
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Planning(p) => p.into(),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
