//! Progressive vault initialisation gate
//!
//! An AGAINST deposit on the progressive curve needs the triple's progressive
//! FOR vault to hold shares. If it is empty the deposit takes three calls:
//! seed the FOR side with a minimal deposit, redeem that seed, then deposit
//! AGAINST. The check reads the vault contract directly; indexer views of a
//! fully redeemed vault can show zero while ghost shares remain on-chain.

use std::collections::HashMap;
use std::time::Duration;

use super::chain::SharedClient;
use super::error::TransportError;
use super::types::{CurveId, Direction, TermId, VaultKey};

/// Calls needed for one deposit in `direction` on `curve_id`
pub fn required_step_count(direction: Direction, curve_id: CurveId, is_initialized: bool) -> u8 {
    if direction == Direction::Oppose && curve_id == CurveId::Progressive && !is_initialized {
        3
    } else {
        1
    }
}

#[derive(Clone)]
pub struct VaultInitGate {
    client: SharedClient,
}

impl VaultInitGate {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    /// `total_shares > 0` on the vault, read from the contract
    pub async fn is_initialized(&self, term_id: TermId, curve_id: CurveId) -> Result<bool, TransportError> {
        let vaults = self
            .client
            .get_vaults(&[VaultKey::new(term_id, curve_id)])
            .await?;
        Ok(vaults.first().is_some_and(|v| !v.total_shares.is_zero()))
    }

    /// Initialisation status for many vaults in one multicall
    pub async fn statuses(&self, keys: &[VaultKey]) -> Result<HashMap<VaultKey, bool>, TransportError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let vaults = self.client.get_vaults(keys).await?;
        Ok(keys
            .iter()
            .zip(vaults)
            .map(|(k, v)| (*k, !v.total_shares.is_zero()))
            .collect())
    }

    /// Re-read a vault after an initialising call until it reports shares.
    ///
    /// Triggered by the executor once the seed deposit is confirmed; a node
    /// behind the confirming one can still serve the pre-deposit state.
    pub async fn refetch_until_initialized(
        &self,
        term_id: TermId,
        curve_id: CurveId,
        attempts: u32,
        delay: Duration,
    ) -> Result<bool, TransportError> {
        for attempt in 0..attempts.max(1) {
            if self.is_initialized(term_id, curve_id).await? {
                return Ok(true);
            }
            if attempt + 1 < attempts {
                tracing::debug!(
                    "vault {} ({}) not initialized yet, refetch {}/{}",
                    term_id,
                    curve_id.as_str(),
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(delay).await;
            }
        }
        Ok(false)
    }
}
