//! Redeem orchestration
//!
//! Builds redeem calls from live share balances. Cached shares from the cart
//! or the planning snapshot are only used to tell a stale position apart
//! from one that was never there.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::chain::{ContractCall, SharedClient};
use super::error::TransportError;
use super::planner::{chunk_batch_arrays, BlockingGuard, RedeemTarget};
use super::preview::ContractPreviewClient;
use super::types::{decimal, CurveId, Owner, TermId, VaultKey};

/// A position the caller expected but the chain no longer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalePosition {
    pub term_id: TermId,
    pub curve_id: CurveId,
    #[serde(with = "decimal")]
    pub expected_shares: U256,
}

/// Redeem calls ready to submit, plus what was left out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedeemBatch {
    pub calls: Vec<ContractCall>,
    pub redeemed: Vec<(VaultKey, U256)>,
    pub skipped: Vec<StalePosition>,
}

impl RedeemBatch {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[derive(Clone)]
pub struct RedeemOrchestrator {
    client: SharedClient,
    preview: ContractPreviewClient,
    max_batch_size: usize,
}

impl RedeemOrchestrator {
    pub fn new(client: SharedClient, preview: ContractPreviewClient, max_batch_size: usize) -> Self {
        Self {
            client,
            preview,
            max_batch_size,
        }
    }

    /// Redeem every target in full, at the share balance the chain reports
    /// now. Targets with no live shares are skipped with a warning.
    pub async fn build_redeem_batch(
        &self,
        owner: Owner,
        targets: &[RedeemTarget],
    ) -> Result<RedeemBatch, TransportError> {
        let mut batch = RedeemBatch::default();
        if targets.is_empty() {
            return Ok(batch);
        }
        let keys: Vec<VaultKey> = targets
            .iter()
            .map(|t| VaultKey::new(t.term_id, t.curve_id))
            .collect();
        let live = self.client.get_positions(owner, &keys).await?;

        let (mut term_ids, mut curve_ids, mut shares) = (Vec::new(), Vec::new(), Vec::new());
        for (target, live_shares) in targets.iter().zip(live) {
            if live_shares.is_zero() {
                tracing::warn!(
                    "Skipping stale position {} ({}): expected {} shares, chain has none",
                    target.term_id,
                    target.curve_id.as_str(),
                    target.cached_shares
                );
                batch.skipped.push(StalePosition {
                    term_id: target.term_id,
                    curve_id: target.curve_id,
                    expected_shares: target.cached_shares,
                });
                continue;
            }
            if live_shares != target.cached_shares && !target.cached_shares.is_zero() {
                tracing::debug!(
                    "position {} ({}) moved from {} to {} shares since planning",
                    target.term_id,
                    target.curve_id.as_str(),
                    target.cached_shares,
                    live_shares
                );
            }
            term_ids.push(target.term_id);
            curve_ids.push(target.curve_id);
            shares.push(live_shares);
            batch
                .redeemed
                .push((VaultKey::new(target.term_id, target.curve_id), live_shares));
        }
        if term_ids.is_empty() {
            return Ok(batch);
        }

        let min_assets = self
            .preview
            .calculate_min_assets(&term_ids, &curve_ids, &shares)
            .await;
        let chunks = chunk_batch_arrays(&term_ids, &curve_ids, &shares, &min_assets, self.max_batch_size)
            .map_err(|e| TransportError::Reverted(e.to_string()))?;
        batch.calls = chunks
            .into_iter()
            .map(|c| ContractCall::RedeemBatch {
                term_ids: c.term_ids,
                curve_ids: c.curve_ids,
                shares: c.values,
                min_assets: c.min_values,
            })
            .collect();
        Ok(batch)
    }

    /// Redeem whatever the owner holds in `keys`, e.g. the seed deposit of a
    /// vault initialisation
    pub async fn redeem_all(&self, owner: Owner, keys: &[VaultKey]) -> Result<RedeemBatch, TransportError> {
        let targets: Vec<RedeemTarget> = keys
            .iter()
            .map(|k| RedeemTarget {
                term_id: k.term_id,
                curve_id: k.curve_id,
                cached_shares: U256::ZERO,
            })
            .collect();
        self.build_redeem_batch(owner, &targets).await
    }

    /// Before AGAINST deposits: find the owner's FOR positions on exactly the
    /// curves being deposited into and redeem them. No FOR shares means
    /// nothing blocks, which is not stale state.
    pub async fn redeem_blocking_for_positions(
        &self,
        owner: Owner,
        guards: &[BlockingGuard],
    ) -> Result<RedeemBatch, TransportError> {
        if guards.is_empty() {
            return Ok(RedeemBatch::default());
        }
        let keys: Vec<VaultKey> = guards
            .iter()
            .map(|g| VaultKey::new(g.triple_id, g.curve_id))
            .collect();
        let live = self.client.get_positions(owner, &keys).await?;
        let blocking: Vec<RedeemTarget> = keys
            .iter()
            .zip(live)
            .filter(|(_, shares)| !shares.is_zero())
            .map(|(k, shares)| RedeemTarget {
                term_id: k.term_id,
                curve_id: k.curve_id,
                cached_shares: shares,
            })
            .collect();
        if !blocking.is_empty() {
            tracing::info!(
                "{} FOR position(s) block AGAINST deposits; redeeming first",
                blocking.len()
            );
        }
        self.build_redeem_batch(owner, &blocking).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::simulator::SimulatedProtocol;
    use alloy_primitives::Address;
    use std::sync::Arc;

    fn owner() -> Owner {
        Address::repeat_byte(0x07)
    }

    fn setup() -> (Arc<SimulatedProtocol>, RedeemOrchestrator, TermId) {
        let sim = Arc::new(SimulatedProtocol::with_defaults());
        let (s, p, o) = (sim.seed_atom("s"), sim.seed_atom("p"), sim.seed_atom("o"));
        let t = sim.seed_triple(s, p, o, true);
        let client: SharedClient = sim.clone();
        let orchestrator = RedeemOrchestrator::new(
            client.clone(),
            ContractPreviewClient::new(client, 100),
            2,
        );
        (sim, orchestrator, t)
    }

    #[tokio::test]
    async fn test_stale_positions_are_skipped_not_fatal() {
        let (sim, orchestrator, t) = setup();
        sim.seed_position(owner(), t, CurveId::Linear, U256::from(900u64));

        let targets = [
            RedeemTarget {
                term_id: t,
                curve_id: CurveId::Linear,
                cached_shares: U256::from(500u64),
            },
            RedeemTarget {
                term_id: t,
                curve_id: CurveId::Progressive,
                cached_shares: U256::from(300u64),
            },
        ];
        let batch = orchestrator.build_redeem_batch(owner(), &targets).await.unwrap();

        // live balance wins over the cached one
        assert_eq!(batch.redeemed, vec![(VaultKey::new(t, CurveId::Linear), U256::from(900u64))]);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].curve_id, CurveId::Progressive);
        assert_eq!(batch.calls.len(), 1);
    }

    #[tokio::test]
    async fn test_blocking_redeem_is_scoped_to_one_curve() {
        let (sim, orchestrator, t) = setup();
        sim.seed_position(owner(), t, CurveId::Linear, U256::from(100u64));
        sim.seed_position(owner(), t, CurveId::Progressive, U256::from(200u64));

        let batch = orchestrator
            .redeem_blocking_for_positions(
                owner(),
                &[BlockingGuard {
                    triple_id: t,
                    curve_id: CurveId::Progressive,
                }],
            )
            .await
            .unwrap();
        assert_eq!(
            batch.redeemed,
            vec![(VaultKey::new(t, CurveId::Progressive), U256::from(200u64))]
        );
        assert!(batch.skipped.is_empty());

        let ContractCall::RedeemBatch { term_ids, curve_ids, .. } = &batch.calls[0] else {
            panic!("expected redeemBatch");
        };
        assert_eq!(term_ids, &vec![t]);
        assert_eq!(curve_ids, &vec![CurveId::Progressive]);
    }

    #[tokio::test]
    async fn test_nothing_blocking_builds_nothing() {
        let (_sim, orchestrator, t) = setup();
        let batch = orchestrator
            .redeem_blocking_for_positions(
                owner(),
                &[BlockingGuard {
                    triple_id: t,
                    curve_id: CurveId::Linear,
                }],
            )
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(batch.skipped.is_empty());
    }
}
