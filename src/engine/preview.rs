//! Contract preview client
//!
//! Prices deposits and redeems with one multicall per batch. Previews never
//! fail the caller: a reverted element becomes zero, and a transport failure
//! becomes an all-zero vector of the same length. An all-zero vector means
//! "no estimate available", not "nothing to deposit".

use alloy_primitives::U256;

use super::amount_math::apply_slippage;
use super::chain::SharedClient;
use super::types::{CurveId, TermId};

#[derive(Clone)]
pub struct ContractPreviewClient {
    client: SharedClient,
    slippage_bps: u16,
}

impl ContractPreviewClient {
    pub fn new(client: SharedClient, slippage_bps: u16) -> Self {
        Self {
            client,
            slippage_bps,
        }
    }

    pub fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    /// Expected shares per element
    pub async fn preview_deposit(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        amounts: &[U256],
    ) -> Vec<U256> {
        if !same_len(term_ids, curve_ids, amounts) {
            tracing::warn!(
                "preview_deposit called with mismatched arrays ({}, {}, {}); no estimate",
                term_ids.len(),
                curve_ids.len(),
                amounts.len()
            );
            return vec![U256::ZERO; term_ids.len()];
        }
        if term_ids.is_empty() {
            return Vec::new();
        }
        let result = self
            .client
            .preview_deposit(term_ids, curve_ids, amounts)
            .await;
        flatten("preview_deposit", term_ids.len(), result)
    }

    /// Expected assets per element
    pub async fn preview_redeem(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[U256],
    ) -> Vec<U256> {
        if !same_len(term_ids, curve_ids, shares) {
            tracing::warn!(
                "preview_redeem called with mismatched arrays ({}, {}, {}); no estimate",
                term_ids.len(),
                curve_ids.len(),
                shares.len()
            );
            return vec![U256::ZERO; term_ids.len()];
        }
        if term_ids.is_empty() {
            return Vec::new();
        }
        let result = self
            .client
            .preview_redeem(term_ids, curve_ids, shares)
            .await;
        flatten("preview_redeem", term_ids.len(), result)
    }

    /// Slippage-protected minimum shares for a deposit batch
    pub async fn calculate_min_shares(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        amounts: &[U256],
    ) -> Vec<U256> {
        self.preview_deposit(term_ids, curve_ids, amounts)
            .await
            .into_iter()
            .map(|v| apply_slippage(v, self.slippage_bps))
            .collect()
    }

    /// Slippage-protected minimum assets for a redeem batch
    pub async fn calculate_min_assets(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[U256],
    ) -> Vec<U256> {
        self.preview_redeem(term_ids, curve_ids, shares)
            .await
            .into_iter()
            .map(|v| apply_slippage(v, self.slippage_bps))
            .collect()
    }
}

/// True when a non-empty preview vector carries no information
pub fn is_unavailable(results: &[U256]) -> bool {
    !results.is_empty() && results.iter().all(|v| v.is_zero())
}

fn same_len<A, B, C>(a: &[A], b: &[B], c: &[C]) -> bool {
    a.len() == b.len() && a.len() == c.len()
}

fn flatten(
    op: &str,
    expected_len: usize,
    result: Result<Vec<Option<U256>>, super::error::TransportError>,
) -> Vec<U256> {
    match result {
        Ok(values) if values.len() == expected_len => {
            let failed = values.iter().filter(|v| v.is_none()).count();
            if failed > 0 {
                tracing::debug!("{}: {} of {} elements reverted", op, failed, expected_len);
            }
            values.into_iter().map(|v| v.unwrap_or_default()).collect()
        }
        Ok(values) => {
            tracing::warn!(
                "{}: multicall returned {} results for {} inputs; no estimate",
                op,
                values.len(),
                expected_len
            );
            vec![U256::ZERO; expected_len]
        }
        Err(e) => {
            tracing::warn!("{} unavailable, degrading to zero estimates: {}", op, e);
            vec![U256::ZERO; expected_len]
        }
    }
}
