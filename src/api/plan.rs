//! Planning, execution and curve availability endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::{Amount, AppState};
use crate::engine::curves::CurveAvailability;
use crate::engine::error::{ExecutionError, ValidationError};
use crate::engine::executor::{
    BatchExecutor, ExecutionEvent, ExecutionReport, ExecutorState, StepOutcome,
};
use crate::engine::planner::BatchPlan;
use crate::engine::types::{CurveId, Direction, Ref, TermId};
use crate::types::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub session_id: String,
    pub subject_id: TermId,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub session_id: String,
    pub step_count: usize,
    pub estimated_steps: usize,
    pub required_total: Amount,
    pub balance: Amount,
    pub plan: BatchPlan,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub session_id: String,
    /// One founder, or every founder in the session when absent
    #[serde(default)]
    pub subject_id: Option<TermId>,
}

#[derive(Debug, Serialize)]
pub struct FounderResult {
    pub subject_id: TermId,
    pub subject_name: String,
    pub success: bool,
    pub state: ExecutorState,
    pub total_steps: usize,
    pub tx_count: usize,
    pub steps: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionReport> for FounderResult {
    fn from(report: ExecutionReport) -> Self {
        Self {
            success: report.is_success(),
            tx_count: report.tx_count(),
            subject_id: report.subject_id,
            subject_name: report.subject_name,
            state: report.state,
            total_steps: report.total_steps,
            steps: report.steps,
            error: report.error.map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub session_id: String,
    pub success: bool,
    pub results: Vec<FounderResult>,
    pub completed: Vec<TermId>,
    pub remaining: Vec<TermId>,
    pub events: Vec<ExecutionEvent>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub session_id: String,
    pub subject_id: TermId,
    pub predicate: Ref,
    pub totem: Ref,
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    #[serde(flatten)]
    pub availability: CurveAvailability,
    /// Curve to offer by default, if any is open
    pub preferred_curve: Option<CurveId>,
}

/// POST /api/plan - Plan one founder's cart without submitting anything
pub async fn plan(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> ApiResult<Json<PlanResponse>> {
    let session_arc = state.session(&req.session_id).await?;
    let session = session_arc.read().await;

    let cart = session
        .carts
        .get(&req.subject_id)
        .ok_or(ValidationError::EmptyCart)?;
    let plan = state.planner.plan(session.owner, cart).await?;

    Ok(Json(PlanResponse {
        session_id: req.session_id,
        step_count: plan.step_count(),
        estimated_steps: plan.estimated_steps,
        required_total: plan.required_total.into(),
        balance: plan.balance.into(),
        plan,
    }))
}

/// A run that never got past planning surfaces as the typed planning error
fn planning_error(report: &ExecutionReport) -> Option<ApiError> {
    match &report.error {
        Some(ExecutionError::Planning(e)) if report.steps.is_empty() => Some(e.clone().into()),
        _ => None,
    }
}

/// POST /api/execute - Plan and run one founder's cart, or all of them
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteResponse>> {
    let session_arc = state.session(&req.session_id).await?;
    let mut session = session_arc.write().await;
    let owner = session.owner;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let executor = BatchExecutor::new(
        state.client.clone(),
        state.planner.clone(),
        state.config.confirmations,
    )
    .with_events(tx);

    let (carts, store) = session.carts_and_store();
    let (reports, completed, remaining) = match req.subject_id {
        Some(subject_id) => {
            let report = executor.execute_founder(owner, carts, store, subject_id).await;
            if let Some(err) = planning_error(&report) {
                return Err(err);
            }
            let (completed, remaining) = if report.is_success() {
                (vec![subject_id], Vec::new())
            } else {
                (Vec::new(), vec![subject_id])
            };
            (vec![report], completed, remaining)
        }
        None => {
            if carts.is_empty() {
                return Err(ValidationError::EmptyCart.into());
            }
            let multi = executor.execute_all(owner, carts, store).await;
            if let [only] = multi.reports.as_slice() {
                if let Some(err) = planning_error(only) {
                    return Err(err);
                }
            }
            (multi.reports, multi.completed, multi.remaining)
        }
    };
    drop(executor);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    tracing::info!(
        "session {}: executed {} founder(s), {} remaining",
        req.session_id,
        completed.len(),
        remaining.len()
    );

    Ok(Json(ExecuteResponse {
        session_id: req.session_id,
        success: remaining.is_empty(),
        results: reports.into_iter().map(FounderResult::from).collect(),
        completed,
        remaining,
        events,
    }))
}

/// POST /api/curves/availability - Which curves a prospective vote may use
pub async fn curve_availability(
    State(state): State<AppState>,
    Json(req): Json<AvailabilityRequest>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let session_arc = state.session(&req.session_id).await?;
    let session = session_arc.read().await;

    let availability = state
        .planner
        .curve_availability(
            session.owner,
            session.carts.get(&req.subject_id),
            req.subject_id,
            req.predicate.resolve().id,
            req.totem.resolve().id,
            req.direction,
        )
        .await?;

    Ok(Json(AvailabilityResponse {
        preferred_curve: availability.preferred_curve(),
        availability,
    }))
}
