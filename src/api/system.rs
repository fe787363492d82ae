//! Protocol configuration endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::{Amount, AppState};
use crate::engine::amount_math::fee_adjusted_minimum;
use crate::engine::planner::PlannerSettings;
use crate::engine::types::ContractConfig;
use crate::types::ApiResult;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub contract: ContractConfig,
    /// Smallest deposit that clears the minimum after the entry fee
    pub effective_min_deposit: Amount,
    pub planner: PlannerSettings,
    pub confirmations: u64,
    pub simulated: bool,
}

/// GET /api/config - Active contract costs and planner settings
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<ConfigResponse>> {
    let contract = state.client.contract_config().await?;

    Ok(Json(ConfigResponse {
        effective_min_deposit: fee_adjusted_minimum(contract.min_deposit, contract.entry_fee_bps)
            .into(),
        contract,
        planner: *state.planner.settings(),
        confirmations: state.config.confirmations,
        simulated: state.simulator.is_some(),
    }))
}
