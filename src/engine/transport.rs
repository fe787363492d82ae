//! Rate-limited call channel
//!
//! Every outbound call goes through one `ThrottledClient`. Calls are
//! serialised, spaced by a minimum interval, and retried only when the
//! provider answers `RateLimited`. Everything else passes through untouched.

use alloy_primitives::U256;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::chain::{ContractCall, ProtocolClient, SharedClient, TxReceipt};
use super::error::TransportError;
use super::types::{ContractConfig, CurveId, Owner, TermId, TxHash, VaultKey, VaultState};

/// Backoff for rate-limit retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Serialising, pacing wrapper around a `ProtocolClient`
pub struct ThrottledClient {
    inner: SharedClient,
    policy: RetryPolicy,
    min_interval: Duration,
    /// Held for the whole call; guards the time of the last call
    last_call: Mutex<Option<Instant>>,
}

impl ThrottledClient {
    pub fn new(inner: SharedClient, policy: RetryPolicy, min_interval: Duration) -> Self {
        Self {
            inner,
            policy,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    async fn call<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, TransportError>> + Send,
        T: Send,
    {
        let mut last = self.last_call.lock().await;
        let mut attempt = 0u32;
        loop {
            if let Some(prev) = *last {
                let ready_at = prev + self.min_interval;
                if ready_at > Instant::now() {
                    tokio::time::sleep_until(ready_at).await;
                }
            }
            *last = Some(Instant::now());

            match f().await {
                Err(TransportError::RateLimited) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "{} rate limited, retry {}/{} in {:?}",
                        op,
                        attempt,
                        self.policy.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl ProtocolClient for ThrottledClient {
    async fn contract_config(&self) -> Result<ContractConfig, TransportError> {
        self.call("contract_config", move || self.inner.contract_config())
            .await
    }

    async fn terms_exist(&self, ids: &[TermId]) -> Result<Vec<bool>, TransportError> {
        self.call("terms_exist", move || self.inner.terms_exist(ids))
            .await
    }

    async fn balance_of(&self, owner: Owner) -> Result<U256, TransportError> {
        self.call("balance_of", move || self.inner.balance_of(owner))
            .await
    }

    async fn get_vaults(&self, keys: &[VaultKey]) -> Result<Vec<VaultState>, TransportError> {
        self.call("get_vaults", move || self.inner.get_vaults(keys))
            .await
    }

    async fn get_shares(
        &self,
        owner: Owner,
        term_id: TermId,
        curve_id: CurveId,
    ) -> Result<U256, TransportError> {
        self.call("get_shares", move || {
            self.inner.get_shares(owner, term_id, curve_id)
        })
        .await
    }

    async fn get_positions(
        &self,
        owner: Owner,
        keys: &[VaultKey],
    ) -> Result<Vec<U256>, TransportError> {
        self.call("get_positions", move || self.inner.get_positions(owner, keys))
            .await
    }

    async fn preview_deposit(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        amounts: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError> {
        self.call("preview_deposit", move || {
            self.inner.preview_deposit(term_ids, curve_ids, amounts)
        })
        .await
    }

    async fn preview_redeem(
        &self,
        term_ids: &[TermId],
        curve_ids: &[CurveId],
        shares: &[U256],
    ) -> Result<Vec<Option<U256>>, TransportError> {
        self.call("preview_redeem", move || {
            self.inner.preview_redeem(term_ids, curve_ids, shares)
        })
        .await
    }

    async fn submit(&self, owner: Owner, call: &ContractCall) -> Result<TxHash, TransportError> {
        self.call("submit", move || self.inner.submit(owner, call))
            .await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        confirmations: u64,
    ) -> Result<TxReceipt, TransportError> {
        self.call("wait_for_receipt", move || {
            self.inner.wait_for_receipt(tx_hash, confirmations)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::simulator::SimulatedProtocol;
    use std::sync::Arc;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let sim = Arc::new(SimulatedProtocol::with_defaults());
        sim.rate_limit_next(2);
        let client = ThrottledClient::new(
            sim.clone(),
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            Duration::ZERO,
        );
        let config = client.contract_config().await;
        assert!(config.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_policy() {
        let sim = Arc::new(SimulatedProtocol::with_defaults());
        sim.rate_limit_next(5);
        let client = ThrottledClient::new(sim.clone(), RetryPolicy::none(), Duration::ZERO);
        assert_eq!(
            client.contract_config().await,
            Err(TransportError::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let sim = Arc::new(SimulatedProtocol::with_defaults());
        sim.set_unreachable(true);
        let client = ThrottledClient::new(sim.clone(), RetryPolicy::default(), Duration::ZERO);
        let err = client.balance_of(Owner::ZERO).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
